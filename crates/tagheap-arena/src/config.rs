//! Heap configuration parameters.

use tagheap_core::ConfigError;

use crate::tag::{DWORD, MIN_BLOCK, WORD};

/// Configuration for a [`Heap`](crate::Heap).
///
/// Controls how much the arena grows at a time and how far the default
/// host memory may grow in total. Validated by [`Heap::init`](crate::Heap::init);
/// immutable after the heap is created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeapConfig {
    /// Bytes requested from the host whenever the free list cannot satisfy
    /// an allocation (larger requests extend by exactly what they need).
    ///
    /// Default: 4096. Must be a non-zero multiple of 16.
    pub chunk_bytes: usize,

    /// Hard upper bound on the arena size for [`VecMemory`](crate::VecMemory).
    ///
    /// Default: 20 MiB. Growth past this limit fails with `OutOfMemory`.
    pub max_heap_bytes: usize,
}

impl HeapConfig {
    /// Default extension chunk: one 4 KiB page.
    pub const DEFAULT_CHUNK_BYTES: usize = 1 << 12;

    /// Default arena limit: 20 MiB.
    pub const DEFAULT_MAX_HEAP_BYTES: usize = 20 * (1 << 20);

    /// Bytes taken by the padding word, prologue and epilogue.
    pub const SENTINEL_BYTES: usize = 4 * WORD;

    /// Create a config with default values.
    pub fn new() -> Self {
        Self {
            chunk_bytes: Self::DEFAULT_CHUNK_BYTES,
            max_heap_bytes: Self::DEFAULT_MAX_HEAP_BYTES,
        }
    }

    /// Set the extension chunk size.
    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes;
        self
    }

    /// Set the arena limit.
    pub fn with_max_heap_bytes(mut self, max_heap_bytes: usize) -> Self {
        self.max_heap_bytes = max_heap_bytes;
        self
    }

    /// Chunk size in words, the unit [`Arena::extend`](crate::Arena::extend) takes.
    pub fn chunk_words(&self) -> usize {
        self.chunk_bytes / WORD
    }

    /// Check the config for values the heap cannot work with.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::BadChunkSize`] if `chunk_bytes` is zero, not a
    ///   multiple of 16, or smaller than the minimum block.
    /// - [`ConfigError::LimitTooSmall`] if `max_heap_bytes` cannot hold the
    ///   sentinels plus one chunk.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_bytes < MIN_BLOCK || self.chunk_bytes % DWORD != 0 {
            return Err(ConfigError::BadChunkSize {
                chunk_bytes: self.chunk_bytes,
                align: DWORD,
            });
        }
        let minimum = Self::SENTINEL_BYTES + self.chunk_bytes;
        if self.max_heap_bytes < minimum {
            return Err(ConfigError::LimitTooSmall {
                max_heap_bytes: self.max_heap_bytes,
                minimum,
            });
        }
        Ok(())
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(HeapConfig::default().validate().is_ok());
        assert_eq!(HeapConfig::default().chunk_words(), 512);
    }

    #[test]
    fn unaligned_chunk_rejected() {
        let config = HeapConfig::new().with_chunk_bytes(100);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadChunkSize { chunk_bytes: 100, .. })
        ));
    }

    #[test]
    fn zero_chunk_rejected() {
        let config = HeapConfig::new().with_chunk_bytes(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn limit_must_fit_first_chunk() {
        let config = HeapConfig::new()
            .with_chunk_bytes(4096)
            .with_max_heap_bytes(4096);
        assert_eq!(
            config.validate(),
            Err(ConfigError::LimitTooSmall {
                max_heap_bytes: 4096,
                minimum: 4096 + 32,
            })
        );
    }
}
