//! Block-level introspection: the heap dump and summary statistics.

use std::fmt;

use tagheap_core::HostMemory;

use crate::arena::Arena;
use crate::heap::Heap;
use crate::tag::{header, header_tag, BoundaryTag, OVERHEAD, WORD};

/// One block as seen by a walk of the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Payload offset.
    pub offset: usize,
    /// Block size in bytes, tags included.
    pub size: usize,
    /// Whether the block is allocated.
    pub allocated: bool,
}

impl BlockInfo {
    /// Payload bytes inside the block.
    pub fn payload_len(&self) -> usize {
        self.size - OVERHEAD
    }
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#x}: {:?}",
            self.offset,
            BoundaryTag::pack(self.size, self.allocated)
        )
    }
}

/// Iterator over the blocks between the prologue and the epilogue.
///
/// Stops at the epilogue, or early if a header would lie outside the
/// arena (only possible on a corrupted heap).
pub struct Blocks<'a, M: HostMemory> {
    arena: &'a Arena<M>,
    bp: usize,
}

impl<M: HostMemory> Iterator for Blocks<'_, M> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let limit = self.arena.limit();
        if header(self.bp) + WORD > limit {
            return None;
        }
        let tag = header_tag(self.arena, self.bp);
        if tag.size() == 0 {
            return None;
        }
        // A block running past the arena ends the walk.
        let end = self.bp.checked_add(tag.size()).filter(|&end| end <= limit)?;
        let info = BlockInfo {
            offset: self.bp,
            size: tag.size(),
            allocated: tag.is_allocated(),
        };
        self.bp = end;
        Some(info)
    }
}

/// Summary of block usage across the whole arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Arena size in bytes, sentinels included.
    pub heap_bytes: usize,
    /// Number of allocated blocks.
    pub allocated_blocks: usize,
    /// Bytes in allocated blocks, tags included.
    pub allocated_bytes: usize,
    /// Number of free blocks.
    pub free_blocks: usize,
    /// Bytes in free blocks, tags included.
    pub free_bytes: usize,
    /// Size of the largest free block, 0 if none.
    pub largest_free: usize,
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "heap {} bytes: {} allocated ({} bytes), {} free ({} bytes, largest {})",
            self.heap_bytes,
            self.allocated_blocks,
            self.allocated_bytes,
            self.free_blocks,
            self.free_bytes,
            self.largest_free
        )
    }
}

impl<M: HostMemory> Heap<M> {
    /// Walk the blocks in address order.
    pub fn blocks(&self) -> Blocks<'_, M> {
        Blocks {
            arena: self.arena(),
            bp: self.first_block(),
        }
    }

    /// Count blocks and bytes by state.
    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            heap_bytes: self.heap_size(),
            ..HeapStats::default()
        };
        for block in self.blocks() {
            if block.allocated {
                stats.allocated_blocks += 1;
                stats.allocated_bytes += block.size;
            } else {
                stats.free_blocks += 1;
                stats.free_bytes += block.size;
                stats.largest_free = stats.largest_free.max(block.size);
            }
        }
        stats
    }

    /// One line per block, then the epilogue, in the classic dump format.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for block in self.blocks() {
            out.push_str(&block.to_string());
            out.push('\n');
        }
        out.push_str(&format!("{:#x}: EOL\n", self.heap_size()));
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::config::HeapConfig;
    use crate::heap::Heap;
    use crate::tag::header;

    #[test]
    fn blocks_walk_in_address_order() {
        let mut h = Heap::init(HeapConfig::default()).unwrap();
        let a = h.allocate(16).unwrap();
        let b = h.allocate(100).unwrap();
        let blocks: Vec<_> = h.blocks().collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].offset, a.offset());
        assert_eq!(blocks[1].offset, b.offset());
        assert!(blocks[0].allocated && blocks[1].allocated && !blocks[2].allocated);
        assert_eq!(blocks[1].payload_len(), h.usable_size(b));
        assert_eq!(blocks.iter().map(|b| b.size).sum::<usize>(), 4096);
    }

    #[test]
    fn stats_account_for_every_byte() {
        let mut h = Heap::init(HeapConfig::default()).unwrap();
        let a = h.allocate(200).unwrap();
        let _b = h.allocate(50).unwrap();
        h.free(a);
        let s = h.stats();
        assert_eq!(s.allocated_blocks, 1);
        assert_eq!(s.free_blocks, 2);
        assert_eq!(s.allocated_bytes + s.free_bytes + 32, s.heap_bytes);
        assert_eq!(s.largest_free, 4096 - 224 - 80);
    }

    #[test]
    fn walk_stops_at_a_block_past_the_arena() {
        let mut h = Heap::init(HeapConfig::default()).unwrap();
        let a = h.allocate(32).unwrap();
        let b = h.allocate(32).unwrap();
        h.parts_mut().0.write_word(header(b.offset()), u64::MAX - 14);
        let blocks: Vec<_> = h.blocks().collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].offset, a.offset());
        let s = h.stats();
        assert_eq!(s.allocated_blocks, 1);
        assert_eq!(s.free_blocks, 0);
    }

    #[test]
    fn dump_ends_with_epilogue() {
        let h = Heap::init(HeapConfig::default()).unwrap();
        let dump = h.dump();
        assert_eq!(dump, "0x20: [4096:f]\n0x1020: EOL\n");
    }
}
