//! Heap consistency checker.
//!
//! [`Heap::check`] walks every block from the prologue to the epilogue
//! and then walks the free list, collecting every broken invariant it
//! sees instead of stopping at the first. It is a debugging and testing
//! aid and is never called from allocation paths.

use std::fmt;

use indexmap::IndexSet;
use tagheap_core::HostMemory;

use crate::free_list::{pred, succ};
use crate::heap::Heap;
use crate::tag::{footer, header, header_tag, tag_at, BoundaryTag, DWORD, MIN_BLOCK, WORD};

/// A single broken heap invariant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    /// The prologue block is not a 16-byte allocated block with a matching footer.
    BadPrologue {
        /// The prologue header found.
        header: BoundaryTag,
    },
    /// The walk ended on something other than a zero-sized allocated
    /// header in the last word of the arena.
    BadEpilogue {
        /// Payload offset where the walk stopped.
        bp: usize,
        /// The tag found there.
        tag: BoundaryTag,
    },
    /// A payload offset is not 16-byte aligned.
    Misaligned {
        /// The offending payload offset.
        bp: usize,
    },
    /// A block is smaller than the minimum block size.
    TooSmall {
        /// Payload offset of the block.
        bp: usize,
        /// Its recorded size.
        size: usize,
    },
    /// A block extends past the end of the arena.
    Overrun {
        /// Payload offset of the block.
        bp: usize,
        /// Its recorded size.
        size: usize,
        /// The arena limit.
        limit: usize,
    },
    /// Header and footer disagree.
    TagMismatch {
        /// Payload offset of the block.
        bp: usize,
        /// Header tag.
        header: BoundaryTag,
        /// Footer tag.
        footer: BoundaryTag,
    },
    /// Two physically adjacent blocks are both free.
    AdjacentFree {
        /// The first of the pair.
        bp: usize,
        /// The block right after it.
        next: usize,
    },
    /// A free block seen on the walk is missing from the free list.
    NotOnFreeList {
        /// Payload offset of the block.
        bp: usize,
    },
    /// The free list holds something that is not a free block.
    NotFree {
        /// The listed offset.
        bp: usize,
    },
    /// The free list visits the same block twice (duplicate or cycle).
    Duplicate {
        /// The repeated offset.
        bp: usize,
    },
    /// A node's predecessor link does not point at the node before it.
    BrokenBackLink {
        /// The node with the bad link.
        bp: usize,
        /// The node actually before it in list order.
        expected: Option<usize>,
        /// The predecessor stored in the node.
        found: Option<usize>,
    },
    /// The list's node count disagrees with the number of nodes walked.
    LengthMismatch {
        /// Nodes reached by walking.
        walked: usize,
        /// Count maintained by the list.
        recorded: usize,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadPrologue { header } => write!(f, "bad prologue header {header:?}"),
            Self::BadEpilogue { bp, tag } => write!(f, "bad epilogue {tag:?} at {bp:#x}"),
            Self::Misaligned { bp } => write!(f, "{bp:#x} is not doubleword aligned"),
            Self::TooSmall { bp, size } => {
                write!(f, "block at {bp:#x} is {size} bytes, below {MIN_BLOCK}")
            }
            Self::Overrun { bp, size, limit } => {
                write!(f, "block at {bp:#x} of {size} bytes runs past limit {limit:#x}")
            }
            Self::TagMismatch { bp, header, footer } => {
                write!(f, "header {header:?} does not match footer {footer:?} at {bp:#x}")
            }
            Self::AdjacentFree { bp, next } => {
                write!(f, "adjacent free blocks at {bp:#x} and {next:#x}")
            }
            Self::NotOnFreeList { bp } => write!(f, "free block at {bp:#x} is not on the free list"),
            Self::NotFree { bp } => write!(f, "free list entry {bp:#x} is not a free block"),
            Self::Duplicate { bp } => write!(f, "free list visits {bp:#x} twice"),
            Self::BrokenBackLink {
                bp,
                expected,
                found,
            } => write!(
                f,
                "free list node {bp:#x} has pred {found:x?}, expected {expected:x?}"
            ),
            Self::LengthMismatch { walked, recorded } => {
                write!(f, "free list walked {walked} nodes but records {recorded}")
            }
        }
    }
}

/// The outcome of [`Heap::check`].
#[derive(Clone, Debug, Default)]
pub struct CheckReport {
    /// Every violation found, in discovery order.
    pub violations: Vec<Violation>,
    /// Blocks walked between the sentinels.
    pub blocks: usize,
    /// Free blocks among them.
    pub free_blocks: usize,
}

impl CheckReport {
    /// Whether no violations were found.
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} blocks ({} free), {} violations",
            self.blocks,
            self.free_blocks,
            self.violations.len()
        )?;
        for v in &self.violations {
            write!(f, "\n  {v}")?;
        }
        Ok(())
    }
}

impl<M: HostMemory> Heap<M> {
    /// Walk the heap and report every broken invariant.
    pub fn check(&self) -> CheckReport {
        let mut report = CheckReport::default();
        let arena = self.arena();
        let limit = arena.limit();

        let pro = self.prologue();
        let pro_tag = header_tag(arena, pro);
        if pro_tag != BoundaryTag::pack(DWORD, true) || tag_at(arena, pro) != pro_tag {
            report.violations.push(Violation::BadPrologue { header: pro_tag });
        }

        let mut all = IndexSet::new();
        let mut free = IndexSet::new();
        let mut prev_free: Option<usize> = None;
        let mut bp = self.first_block();
        loop {
            if header(bp) + WORD > limit {
                report.violations.push(Violation::Overrun {
                    bp,
                    size: 0,
                    limit,
                });
                break;
            }
            let tag = header_tag(arena, bp);
            let size = tag.size();
            if size == 0 {
                if !tag.is_allocated() || header(bp) + WORD != limit {
                    report.violations.push(Violation::BadEpilogue { bp, tag });
                }
                break;
            }
            if bp % DWORD != 0 {
                report.violations.push(Violation::Misaligned { bp });
            }
            if size < MIN_BLOCK {
                report.violations.push(Violation::TooSmall { bp, size });
            }
            // The next header must fit, so the block ends one word short of the limit.
            let end = match bp.checked_add(size) {
                Some(end) if end <= limit => end,
                _ => {
                    report.violations.push(Violation::Overrun { bp, size, limit });
                    break;
                }
            };
            let foot = tag_at(arena, footer(arena, bp));
            if foot != tag {
                report.violations.push(Violation::TagMismatch {
                    bp,
                    header: tag,
                    footer: foot,
                });
            }

            all.insert(bp);
            if tag.is_allocated() {
                prev_free = None;
            } else {
                if let Some(prev) = prev_free {
                    report
                        .violations
                        .push(Violation::AdjacentFree { bp: prev, next: bp });
                }
                free.insert(bp);
                prev_free = Some(bp);
            }
            bp = end;
        }
        report.blocks = all.len();
        report.free_blocks = free.len();

        let list = self.free_list();
        let mut listed = IndexSet::new();
        let mut expected_pred = None;
        let mut cursor = list.head();
        while let Some(node) = cursor {
            if !listed.insert(node) {
                report.violations.push(Violation::Duplicate { bp: node });
                break;
            }
            if !free.contains(&node) {
                report.violations.push(Violation::NotFree { bp: node });
                // Links can only be followed from something that is a block.
                if !all.contains(&node) {
                    break;
                }
            }
            let found = pred(arena, node);
            if found != expected_pred {
                report.violations.push(Violation::BrokenBackLink {
                    bp: node,
                    expected: expected_pred,
                    found,
                });
            }
            expected_pred = Some(node);
            cursor = succ(arena, node);
        }
        for &bp in &free {
            if !listed.contains(&bp) {
                report.violations.push(Violation::NotOnFreeList { bp });
            }
        }
        if listed.len() != list.len() {
            report.violations.push(Violation::LengthMismatch {
                walked: listed.len(),
                recorded: list.len(),
            });
        }
        report
    }
}
