//! Error types for the tagheap allocator.
//!
//! Runtime failure has exactly one cause, the host refusing to grow the
//! arena. Configuration mistakes are reported separately so they can be
//! caught before a heap exists.

use std::error::Error;
use std::fmt;

/// Errors raised by arena growth and heap initialisation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapError {
    /// The host memory primitive refused to grow the arena.
    OutOfMemory {
        /// Number of bytes the arena asked for.
        requested: usize,
        /// Current arena size in bytes when the request was refused.
        limit: usize,
    },
    /// The heap configuration was rejected before the arena was created.
    Config(ConfigError),
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { requested, limit } => {
                write!(
                    f,
                    "out of memory: requested {requested} bytes with arena at {limit} bytes"
                )
            }
            Self::Config(e) => write!(f, "invalid heap config: {e}"),
        }
    }
}

impl Error for HeapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for HeapError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Errors from validating a heap configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The extension chunk is zero or not a multiple of the alignment unit.
    BadChunkSize {
        /// The configured chunk size in bytes.
        chunk_bytes: usize,
        /// The required alignment unit in bytes.
        align: usize,
    },
    /// The heap limit cannot hold the sentinel blocks plus one chunk.
    LimitTooSmall {
        /// The configured limit in bytes.
        max_heap_bytes: usize,
        /// The smallest limit that can be initialised.
        minimum: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadChunkSize { chunk_bytes, align } => {
                write!(
                    f,
                    "chunk size {chunk_bytes} must be a non-zero multiple of {align}"
                )
            }
            Self::LimitTooSmall {
                max_heap_bytes,
                minimum,
            } => {
                write!(
                    f,
                    "heap limit {max_heap_bytes} bytes is below the minimum of {minimum} bytes"
                )
            }
        }
    }
}

impl Error for ConfigError {}
