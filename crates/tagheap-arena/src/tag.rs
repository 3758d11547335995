//! Boundary tags and block address arithmetic.
//!
//! This module is the only place the binary block format is defined.
//!
//! ```text
//!            header                          footer
//!          ┌────────┬──────────────────────┬────────┐
//!  block:  │ size|a │ payload ...          │ size|a │
//!          └────────┴──────────────────────┴────────┘
//!                   ▲ bp (16-byte aligned)
//!
//!  free:   │ size|0 │ pred │ succ │ ...    │ size|0 │
//! ```
//!
//! A tag is one little-endian `u64`. Block sizes are multiples of 16, so
//! the low four bits are free; bit 0 is the allocated flag.
//!
//! Addresses here are payload offsets (`bp`), as in the classic layout:
//! the header sits one word before `bp`, the footer one double-word
//! before the next block's payload.

use std::fmt;

use tagheap_core::HostMemory;

use crate::arena::Arena;

/// Width of a boundary tag or a free-list link, in bytes.
pub const WORD: usize = 8;

/// Alignment unit. Every payload offset and block size is a multiple.
pub const DWORD: usize = 2 * WORD;

/// Bytes of header plus footer carried by every block.
pub const OVERHEAD: usize = DWORD;

/// Smallest legal block: header, two link words, footer.
pub const MIN_BLOCK: usize = 2 * DWORD;

const FLAG_MASK: u64 = (DWORD - 1) as u64;
const ALLOC_BIT: u64 = 1;

/// An encoded `(size, allocated)` pair as stored in a header or footer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundaryTag(u64);

impl BoundaryTag {
    /// Encode a block size and allocated flag.
    ///
    /// `size` must be a multiple of [`DWORD`]; the low bits are reserved.
    #[inline]
    pub fn pack(size: usize, allocated: bool) -> Self {
        debug_assert_eq!(size % DWORD, 0, "block size {size} is not aligned");
        Self(size as u64 | if allocated { ALLOC_BIT } else { 0 })
    }

    /// Reinterpret a raw word read from the arena.
    #[inline]
    pub fn from_word(word: u64) -> Self {
        Self(word)
    }

    /// The raw word to store in the arena.
    #[inline]
    pub fn word(self) -> u64 {
        self.0
    }

    /// Block size in bytes, header and footer included.
    #[inline]
    pub fn size(self) -> usize {
        (self.0 & !FLAG_MASK) as usize
    }

    /// Whether the block is allocated.
    #[inline]
    pub fn is_allocated(self) -> bool {
        self.0 & ALLOC_BIT != 0
    }
}

impl fmt::Debug for BoundaryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}:{}]",
            self.size(),
            if self.is_allocated() { 'a' } else { 'f' }
        )
    }
}

/// Round `n` up to the next multiple of [`DWORD`], or `None` on overflow.
#[inline]
pub fn align_up(n: usize) -> Option<usize> {
    n.checked_add(DWORD - 1).map(|v| v & !(DWORD - 1))
}

/// Block size needed to serve a request of `payload` bytes.
///
/// Small requests get [`MIN_BLOCK`]; larger ones are padded with
/// [`OVERHEAD`] and rounded to the alignment unit. `None` on overflow.
pub fn block_size_for(payload: usize) -> Option<usize> {
    if payload <= DWORD {
        Some(MIN_BLOCK)
    } else {
        align_up(payload.checked_add(OVERHEAD)?)
    }
}

/// Offset of the header word of the block whose payload starts at `bp`.
#[inline]
pub fn header(bp: usize) -> usize {
    bp - WORD
}

/// Read the tag stored at `at`.
#[inline]
pub fn tag_at<M: HostMemory>(arena: &Arena<M>, at: usize) -> BoundaryTag {
    BoundaryTag::from_word(arena.read_word(at))
}

/// The header tag of the block at `bp`.
#[inline]
pub fn header_tag<M: HostMemory>(arena: &Arena<M>, bp: usize) -> BoundaryTag {
    tag_at(arena, header(bp))
}

/// Offset of the footer word, derived from the block's own header size.
#[inline]
pub fn footer<M: HostMemory>(arena: &Arena<M>, bp: usize) -> usize {
    bp + header_tag(arena, bp).size() - DWORD
}

/// Payload offset of the physically next block.
#[inline]
pub fn next_block<M: HostMemory>(arena: &Arena<M>, bp: usize) -> usize {
    bp + header_tag(arena, bp).size()
}

/// Payload offset of the physically previous block, read from its footer.
#[inline]
pub fn prev_block<M: HostMemory>(arena: &Arena<M>, bp: usize) -> usize {
    bp - tag_at(arena, bp - DWORD).size()
}

/// Write matching header and footer tags for a block of `size` bytes at `bp`.
///
/// The header is written first so the footer lands where the new size says.
pub fn write_block<M: HostMemory>(arena: &mut Arena<M>, bp: usize, size: usize, allocated: bool) {
    let tag = BoundaryTag::pack(size, allocated);
    arena.write_word(header(bp), tag.word());
    arena.write_word(bp + size - DWORD, tag.word());
}
