//! Strongly-typed payload handles.

use std::fmt;

/// A pointer to the payload of an allocated block.
///
/// The value is a byte offset from the arena base, not a machine address.
/// Offsets stay valid for the lifetime of the heap because the arena never
/// moves. A `HeapPtr` is only meaningful for the heap that returned it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapPtr(pub usize);

impl HeapPtr {
    /// The payload offset in bytes from the arena base.
    pub fn offset(self) -> usize {
        self.0
    }

    /// Whether the offset is a multiple of `align`.
    pub fn is_aligned_to(self, align: usize) -> bool {
        align != 0 && self.0 % align == 0
    }
}

impl fmt::Display for HeapPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<usize> for HeapPtr {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_is_hex_offset() {
        assert_eq!(HeapPtr(32).to_string(), "0x20");
    }

    #[test]
    fn zero_alignment_is_never_satisfied() {
        assert!(!HeapPtr(0).is_aligned_to(0));
    }

    proptest! {
        #[test]
        fn alignment_matches_modulo(off in 0usize..1 << 20, shift in 0u32..6) {
            let align = 1usize << shift;
            prop_assert_eq!(HeapPtr(off).is_aligned_to(align), off % align == 0);
        }
    }
}
