//! Explicit doubly linked free list embedded in free block payloads.
//!
//! The first payload word of a free block holds the predecessor link and
//! the second holds the successor link. Links are arena offsets; `0`
//! means "none" (offset 0 is the padding word, never a payload).
//!
//! The list owns no memory of its own: it is the head offset plus a
//! node count, and every operation reads or writes link words through
//! the [`Arena`]. Callers must [`remove`](FreeList::remove) a block
//! before rewriting its tags, because a block's payload is reused for
//! other data once it leaves the list.

use tagheap_core::HostMemory;

use crate::arena::Arena;
use crate::tag::WORD;

const NIL: u64 = 0;

fn decode(link: u64) -> Option<usize> {
    (link != NIL).then_some(link as usize)
}

fn encode(link: Option<usize>) -> u64 {
    link.map_or(NIL, |bp| bp as u64)
}

/// Predecessor of the free block at `bp`.
pub fn pred<M: HostMemory>(arena: &Arena<M>, bp: usize) -> Option<usize> {
    decode(arena.read_word(bp))
}

/// Successor of the free block at `bp`.
pub fn succ<M: HostMemory>(arena: &Arena<M>, bp: usize) -> Option<usize> {
    decode(arena.read_word(bp + WORD))
}

fn set_pred<M: HostMemory>(arena: &mut Arena<M>, bp: usize, link: Option<usize>) {
    arena.write_word(bp, encode(link));
}

fn set_succ<M: HostMemory>(arena: &mut Arena<M>, bp: usize, link: Option<usize>) {
    arena.write_word(bp + WORD, encode(link));
}

/// Head-insertion free list over blocks in one arena.
#[derive(Debug, Default)]
pub struct FreeList {
    head: Option<usize>,
    len: usize,
}

impl FreeList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload offset of the first block, if any.
    pub fn head(&self) -> Option<usize> {
        self.head
    }

    /// Number of blocks on the list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Insert the block at `bp` at the head. O(1).
    pub fn push_front<M: HostMemory>(&mut self, arena: &mut Arena<M>, bp: usize) {
        set_pred(arena, bp, None);
        set_succ(arena, bp, self.head);
        if let Some(old) = self.head {
            set_pred(arena, old, Some(bp));
        }
        self.head = Some(bp);
        self.len += 1;
    }

    /// Unlink the block at `bp`. O(1).
    ///
    /// `bp` must currently be on this list.
    pub fn remove<M: HostMemory>(&mut self, arena: &mut Arena<M>, bp: usize) {
        match (pred(arena, bp), succ(arena, bp)) {
            // Sole node.
            (None, None) => self.head = None,
            // Head.
            (None, Some(next)) => {
                self.head = Some(next);
                set_pred(arena, next, None);
            }
            // Tail.
            (Some(prev), None) => set_succ(arena, prev, None),
            // Interior.
            (Some(prev), Some(next)) => {
                set_succ(arena, prev, Some(next));
                set_pred(arena, next, Some(prev));
            }
        }
        self.len -= 1;
    }

    /// Walk the list in order, head first.
    ///
    /// Each call starts a fresh walk. On a corrupted list with a cycle the
    /// iterator does not terminate; bound it with [`len`](Self::len).
    pub fn iter<'a, M: HostMemory>(&self, arena: &'a Arena<M>) -> FreeIter<'a, M> {
        FreeIter {
            arena,
            next: self.head,
        }
    }
}

/// Iterator over free block payload offsets. See [`FreeList::iter`].
pub struct FreeIter<'a, M: HostMemory> {
    arena: &'a Arena<M>,
    next: Option<usize>,
}

impl<M: HostMemory> Iterator for FreeIter<'_, M> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let bp = self.next?;
        self.next = succ(self.arena, bp);
        Some(bp)
    }
}
