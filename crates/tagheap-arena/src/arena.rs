//! The growable arena underneath the heap.
//!
//! An [`Arena`] is the only component that talks to the [`HostMemory`]
//! growth primitive. Everything above it addresses memory by byte offset
//! through the word accessors here, so every access is bounds-checked.

use log::debug;
use tagheap_core::{HeapError, HostMemory};

use crate::memory::VecMemory;
use crate::tag::WORD;

/// A single contiguous byte range `[0, limit)` that only ever grows.
pub struct Arena<M: HostMemory = VecMemory> {
    memory: M,
}

impl<M: HostMemory> Arena<M> {
    /// Wrap a host memory segment.
    pub fn new(memory: M) -> Self {
        Self { memory }
    }

    /// Grow the arena by at least `min_words` words.
    ///
    /// The word count is rounded up to an even number so the new break
    /// stays double-word aligned. Returns the offset where the new region
    /// starts (the previous limit).
    ///
    /// # Errors
    ///
    /// [`HeapError::OutOfMemory`] if the host refuses. The arena is left
    /// exactly as it was.
    pub fn extend(&mut self, min_words: usize) -> Result<usize, HeapError> {
        let limit = self.limit();
        let oom = |requested| HeapError::OutOfMemory { requested, limit };
        let words = min_words
            .checked_add(min_words % 2)
            .ok_or_else(|| oom(usize::MAX))?;
        let bytes = words.checked_mul(WORD).ok_or_else(|| oom(usize::MAX))?;
        match self.memory.grow(bytes) {
            Some(start) => {
                debug!("arena extended by {bytes} bytes at {start:#x}");
                Ok(start)
            }
            None => Err(oom(bytes)),
        }
    }

    /// Grow by the few bytes needed to move the break onto a multiple of
    /// `align` (a power of two). No-op when it is already there.
    ///
    /// # Errors
    ///
    /// [`HeapError::OutOfMemory`] if the host refuses the padding.
    pub fn align_break(&mut self, align: usize) -> Result<(), HeapError> {
        let limit = self.limit();
        let pad = limit.wrapping_neg() & (align - 1);
        if pad == 0 {
            return Ok(());
        }
        match self.memory.grow(pad) {
            Some(_) => {
                debug!("arena break {limit:#x} padded by {pad} bytes");
                Ok(())
            }
            None => Err(HeapError::OutOfMemory {
                requested: pad,
                limit,
            }),
        }
    }

    /// Current arena size in bytes.
    pub fn limit(&self) -> usize {
        self.memory.brk()
    }

    /// Read the word at byte offset `at`.
    ///
    /// # Panics
    ///
    /// Panics if `at + 8` exceeds the arena limit.
    pub fn read_word(&self, at: usize) -> u64 {
        let mut buf = [0u8; WORD];
        buf.copy_from_slice(&self.memory.bytes()[at..at + WORD]);
        u64::from_le_bytes(buf)
    }

    /// Write `value` as the word at byte offset `at`.
    ///
    /// # Panics
    ///
    /// Panics if `at + 8` exceeds the arena limit.
    pub fn write_word(&mut self, at: usize, value: u64) {
        self.memory.bytes_mut()[at..at + WORD].copy_from_slice(&value.to_le_bytes());
    }

    /// Shared view of `len` bytes starting at `start`.
    pub fn bytes(&self, start: usize, len: usize) -> &[u8] {
        &self.memory.bytes()[start..start + len]
    }

    /// Mutable view of `len` bytes starting at `start`.
    pub fn bytes_mut(&mut self, start: usize, len: usize) -> &mut [u8] {
        &mut self.memory.bytes_mut()[start..start + len]
    }

    /// Copy `len` bytes from `src` to `dst`. The ranges may overlap.
    pub fn copy_within(&mut self, src: usize, dst: usize, len: usize) {
        self.memory.bytes_mut().copy_within(src..src + len, dst);
    }

    /// The host memory backing this arena.
    pub fn memory(&self) -> &M {
        &self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena(max: usize) -> Arena {
        Arena::new(VecMemory::new(max))
    }

    #[test]
    fn align_break_pads_to_boundary() {
        let mut a = arena(1024);
        a.align_break(16).unwrap();
        assert_eq!(a.limit(), 0);
        a.memory.grow(5).unwrap();
        a.align_break(16).unwrap();
        assert_eq!(a.limit(), 16);
        assert_eq!(a.extend(2).unwrap(), 16);
    }

    #[test]
    fn align_break_refused_reports_padding() {
        let mut a = arena(20);
        a.memory.grow(19).unwrap();
        let err = a.align_break(16).unwrap_err();
        assert_eq!(
            err,
            HeapError::OutOfMemory {
                requested: 13,
                limit: 19
            }
        );
        assert_eq!(a.limit(), 19);
    }

    #[test]
    fn extend_rounds_odd_word_counts_up() {
        let mut a = arena(1024);
        assert_eq!(a.extend(3).unwrap(), 0);
        assert_eq!(a.limit(), 32);
        assert_eq!(a.extend(2).unwrap(), 32);
        assert_eq!(a.limit(), 48);
    }

    #[test]
    fn extend_failure_reports_request_and_leaves_limit() {
        let mut a = arena(64);
        a.extend(4).unwrap();
        a.write_word(8, 0xfeed);
        let err = a.extend(8).unwrap_err();
        assert_eq!(
            err,
            HeapError::OutOfMemory {
                requested: 64,
                limit: 32
            }
        );
        assert_eq!(a.limit(), 32);
        assert_eq!(a.read_word(8), 0xfeed);
    }

    #[test]
    fn word_round_trip_is_little_endian() {
        let mut a = arena(64);
        a.extend(2).unwrap();
        a.write_word(8, 0x0102_0304_0506_0708);
        assert_eq!(a.read_word(8), 0x0102_0304_0506_0708);
        assert_eq!(a.bytes(8, 1), &[0x08]);
    }

    #[test]
    #[should_panic]
    fn read_past_limit_panics() {
        let mut a = arena(64);
        a.extend(2).unwrap();
        let _ = a.read_word(16);
    }

    #[test]
    fn copy_within_moves_bytes() {
        let mut a = arena(64);
        a.extend(4).unwrap();
        a.bytes_mut(0, 4).copy_from_slice(&[1, 2, 3, 4]);
        a.copy_within(0, 16, 4);
        assert_eq!(a.bytes(16, 4), &[1, 2, 3, 4]);
    }
}
