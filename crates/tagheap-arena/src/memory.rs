//! Default host memory: a bounded, growable `Vec<u8>`.
//!
//! [`VecMemory`] plays the role of the process data segment. Growth
//! appends zeroed bytes up to a hard limit and is refused past it,
//! which is how out-of-memory is produced in tests and benches.

use tagheap_core::HostMemory;

/// A `Vec<u8>`-backed [`HostMemory`] with a fixed byte limit.
///
/// The vector only ever grows. Offsets handed out earlier remain valid
/// because the allocator addresses bytes by offset, never by address,
/// so a reallocation of the backing `Vec` is invisible to it.
#[derive(Debug)]
pub struct VecMemory {
    /// Granted bytes. `data.len()` is the break.
    data: Vec<u8>,
    /// Growth past this many bytes is refused.
    max_bytes: usize,
}

impl VecMemory {
    /// Create an empty segment that may grow to `max_bytes`.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            data: Vec::new(),
            max_bytes,
        }
    }

    /// The configured growth limit in bytes.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Bytes still available before the limit.
    pub fn remaining(&self) -> usize {
        self.max_bytes - self.data.len()
    }
}

impl HostMemory for VecMemory {
    fn grow(&mut self, delta: usize) -> Option<usize> {
        let old = self.data.len();
        let new_len = old.checked_add(delta)?;
        if new_len > self.max_bytes {
            return None;
        }
        self.data.try_reserve(delta).ok()?;
        self.data.resize(new_len, 0);
        Some(old)
    }

    fn brk(&self) -> usize {
        self.data.len()
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
