//! Host memory fixtures.
//!
//! - [`GatedMemory`] — a bounded `Vec<u8>` segment whose growth can be
//!   switched off from the test through a [`GrowthGate`] handle, after the
//!   memory has been moved into a heap.

use std::cell::Cell;
use std::rc::Rc;

use tagheap_core::HostMemory;

#[derive(Debug, Default)]
struct GateState {
    /// `None` = unlimited, `Some(n)` = n more grants.
    grants_left: Cell<Option<usize>>,
    grants: Cell<usize>,
    refusals: Cell<usize>,
}

/// Test-side control for a [`GatedMemory`].
#[derive(Clone, Debug)]
pub struct GrowthGate {
    state: Rc<GateState>,
}

impl GrowthGate {
    /// Allow unlimited growth (up to the byte limit).
    pub fn open(&self) {
        self.state.grants_left.set(None);
    }

    /// Refuse every further growth request.
    pub fn close(&self) {
        self.state.grants_left.set(Some(0));
    }

    /// Grant exactly `n` more growth requests, then refuse.
    pub fn allow(&self, n: usize) {
        self.state.grants_left.set(Some(n));
    }

    /// Growth requests granted so far.
    pub fn grants(&self) -> usize {
        self.state.grants.get()
    }

    /// Growth requests refused so far.
    pub fn refusals(&self) -> usize {
        self.state.refusals.get()
    }
}

/// A `Vec<u8>` host memory whose growth is controlled by a [`GrowthGate`].
#[derive(Debug)]
pub struct GatedMemory {
    data: Vec<u8>,
    max_bytes: usize,
    state: Rc<GateState>,
}

impl GatedMemory {
    /// Create an open memory limited to `max_bytes`, plus its gate.
    pub fn new(max_bytes: usize) -> (Self, GrowthGate) {
        let state = Rc::new(GateState::default());
        let gate = GrowthGate {
            state: Rc::clone(&state),
        };
        let mem = Self {
            data: Vec::new(),
            max_bytes,
            state,
        };
        (mem, gate)
    }

    fn refuse(&self) -> Option<usize> {
        self.state.refusals.set(self.state.refusals.get() + 1);
        None
    }
}

impl HostMemory for GatedMemory {
    fn grow(&mut self, delta: usize) -> Option<usize> {
        let left = self.state.grants_left.get();
        if left == Some(0) {
            return self.refuse();
        }
        let old = self.data.len();
        let new_len = match old.checked_add(delta) {
            Some(n) if n <= self.max_bytes => n,
            _ => return self.refuse(),
        };
        if self.data.try_reserve(delta).is_err() {
            return self.refuse();
        }
        self.data.resize(new_len, 0);
        self.state.grants_left.set(left.map(|n| n - 1));
        self.state.grants.set(self.state.grants.get() + 1);
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
