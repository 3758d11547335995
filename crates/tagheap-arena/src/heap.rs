//! The allocator: best-fit placement, splitting, and coalescing.
//!
//! A [`Heap`] owns one [`Arena`] and one [`FreeList`]. Every block state
//! change goes through `place` (free to allocated), [`free`](Heap::free)
//! (allocated to free) or `coalesce` (free to a larger free block), and
//! each of those updates free-list membership in the same step.
//!
//! # Arena layout after `init`
//!
//! ```text
//! offset  0      8         16        24        32
//!         ┌──────┬─────────┬─────────┬─────────┬──────────────┬─────────┐
//!         │ pad  │ pro hdr │ pro ftr │ hdr     │ first chunk  │ epi hdr │
//!         │      │ [16:a]  │ [16:a]  │ [n:f]   │ ...  ftr     │ [0:a]   │
//!         └──────┴─────────┴─────────┴─────────┴──────────────┴─────────┘
//!                          ▲ prologue bp      ▲ first payload (32)
//! ```

use log::{debug, trace, warn};
use tagheap_core::{HeapError, HeapPtr, HostMemory};

use crate::arena::Arena;
use crate::config::HeapConfig;
use crate::free_list::FreeList;
use crate::memory::VecMemory;
use crate::tag::{
    block_size_for, header, header_tag, next_block, prev_block, tag_at, write_block,
    BoundaryTag, DWORD, MIN_BLOCK, OVERHEAD, WORD,
};

/// A boundary-tag heap with an explicit free list.
///
/// Pointers handed out are [`HeapPtr`] payload offsets, always multiples
/// of 16. Payload bytes are reached through [`payload`](Heap::payload)
/// and [`payload_mut`](Heap::payload_mut).
///
/// # Caller contract
///
/// `free` and `reallocate` must only receive live pointers returned by
/// this heap. Double frees, foreign pointers and use after free are not
/// detected on the hot path. They cannot break memory safety (all access
/// is bounds-checked) but will corrupt the heap's bookkeeping or panic.
/// [`check`](Heap::check) finds the damage.
pub struct Heap<M: HostMemory = VecMemory> {
    arena: Arena<M>,
    free: FreeList,
    config: HeapConfig,
    /// Payload offset of the prologue block.
    prologue: usize,
}

impl Heap<VecMemory> {
    /// Create a heap over a fresh [`VecMemory`] limited to
    /// `config.max_heap_bytes`.
    ///
    /// # Errors
    ///
    /// [`HeapError::Config`] for an invalid config, or
    /// [`HeapError::OutOfMemory`] if the sentinels or the first chunk
    /// cannot be obtained.
    pub fn init(config: HeapConfig) -> Result<Self, HeapError> {
        let memory = VecMemory::new(config.max_heap_bytes);
        Self::init_with(memory, config)
    }
}

impl<M: HostMemory> Heap<M> {
    /// Create a heap over caller-supplied host memory.
    ///
    /// The memory should be empty. A break that is not 16-byte aligned is
    /// padded up to the next boundary first. `config.max_heap_bytes` is not
    /// enforced here, the host decides when to refuse growth.
    ///
    /// # Errors
    ///
    /// As for [`Heap::init`].
    pub fn init_with(memory: M, config: HeapConfig) -> Result<Self, HeapError> {
        config.validate()?;
        let mut arena = Arena::new(memory);
        arena.align_break(DWORD)?;
        let start = arena.extend(4)?;

        let prologue = BoundaryTag::pack(DWORD, true).word();
        arena.write_word(start, 0);
        arena.write_word(start + WORD, prologue);
        arena.write_word(start + 2 * WORD, prologue);
        arena.write_word(start + 3 * WORD, BoundaryTag::pack(0, true).word());

        let mut heap = Self {
            arena,
            free: FreeList::new(),
            prologue: start + DWORD,
            config,
        };
        heap.extend_heap(heap.config.chunk_words())?;
        debug!(
            "heap initialised: {} bytes, chunk {} bytes",
            heap.heap_size(),
            heap.config.chunk_bytes
        );
        Ok(heap)
    }

    /// Allocate a block with at least `size` usable payload bytes.
    ///
    /// Returns `None` for `size == 0`, and when the arena cannot grow to
    /// satisfy the request. A failed allocation leaves the heap unchanged.
    pub fn allocate(&mut self, size: usize) -> Option<HeapPtr> {
        if size == 0 {
            return None;
        }
        let Some(asize) = block_size_for(size) else {
            warn!("allocate({size}): request overflows the block size");
            return None;
        };

        if let Some(bp) = self.find_fit(asize) {
            self.place(bp, asize);
            return Some(HeapPtr(bp));
        }

        let extend = asize.max(self.config.chunk_bytes);
        match self.extend_heap(extend / WORD) {
            Ok(bp) => {
                self.place(bp, asize);
                Some(HeapPtr(bp))
            }
            Err(e) => {
                warn!("allocate({size}) failed: {e}");
                None
            }
        }
    }

    /// Release the block at `ptr` and merge it with free neighbours.
    pub fn free(&mut self, ptr: HeapPtr) {
        let bp = ptr.offset();
        let tag = header_tag(&self.arena, bp);
        debug_assert!(tag.is_allocated(), "free of unallocated block at {ptr}");
        write_block(&mut self.arena, bp, tag.size(), false);
        self.coalesce(bp);
    }

    /// Resize an allocation by moving it.
    ///
    /// - `ptr == None` behaves as [`allocate`](Self::allocate).
    /// - `size == 0` frees `ptr` and returns `None`.
    /// - Otherwise a new block is allocated, the first
    ///   `min(size, usable_size(ptr))` bytes are copied, and `ptr` is
    ///   freed. If the new allocation fails, `None` is returned and `ptr`
    ///   stays live and unchanged.
    ///
    /// The block is always relocated, even when it could grow in place.
    pub fn reallocate(&mut self, ptr: Option<HeapPtr>, size: usize) -> Option<HeapPtr> {
        let Some(old) = ptr else {
            return self.allocate(size);
        };
        if size == 0 {
            self.free(old);
            return None;
        }
        let new = self.allocate(size)?;
        let copy = size.min(self.usable_size(old));
        self.arena.copy_within(old.offset(), new.offset(), copy);
        self.free(old);
        Some(new)
    }

    /// Usable payload bytes of the block at `ptr`.
    ///
    /// At least the size originally requested; larger when the request was
    /// rounded up or the block was not split.
    pub fn usable_size(&self, ptr: HeapPtr) -> usize {
        header_tag(&self.arena, ptr.offset()).size() - OVERHEAD
    }

    /// The payload bytes of a live allocation.
    pub fn payload(&self, ptr: HeapPtr) -> &[u8] {
        let len = self.usable_size(ptr);
        self.arena.bytes(ptr.offset(), len)
    }

    /// Mutable payload bytes of a live allocation.
    pub fn payload_mut(&mut self, ptr: HeapPtr) -> &mut [u8] {
        let len = self.usable_size(ptr);
        self.arena.bytes_mut(ptr.offset(), len)
    }

    /// Current arena size in bytes.
    pub fn heap_size(&self) -> usize {
        self.arena.limit()
    }

    /// The configuration this heap was created with.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// The host memory backing the arena.
    pub fn memory(&self) -> &M {
        self.arena.memory()
    }

    pub(crate) fn arena(&self) -> &Arena<M> {
        &self.arena
    }

    pub(crate) fn free_list(&self) -> &FreeList {
        &self.free
    }

    #[cfg(test)]
    pub(crate) fn parts_mut(&mut self) -> (&mut Arena<M>, &mut FreeList) {
        (&mut self.arena, &mut self.free)
    }

    /// Payload offset of the prologue block.
    pub(crate) fn prologue(&self) -> usize {
        self.prologue
    }

    /// Payload offset of the first block after the prologue.
    pub(crate) fn first_block(&self) -> usize {
        self.prologue + DWORD
    }

    /// Grow the arena by `words` words and turn the new region into a free
    /// block, merged with a trailing free block if there is one.
    ///
    /// The old epilogue header becomes the new block's header and a new
    /// epilogue is written at the end. Returns the merged block.
    fn extend_heap(&mut self, words: usize) -> Result<usize, HeapError> {
        let bp = self.arena.extend(words)?;
        let size = self.arena.limit() - bp;
        write_block(&mut self.arena, bp, size, false);
        self.arena
            .write_word(header(bp + size), BoundaryTag::pack(0, true).word());
        Ok(self.coalesce(bp))
    }

    /// Best fit: the smallest free block of at least `asize` bytes, first
    /// encountered on ties.
    fn find_fit(&self, asize: usize) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for bp in self.free.iter(&self.arena) {
            let size = header_tag(&self.arena, bp).size();
            if size < asize || best.is_some_and(|(_, s)| s <= size) {
                continue;
            }
            best = Some((bp, size));
            if size == asize {
                break;
            }
        }
        best.map(|(bp, _)| bp)
    }

    /// Allocate `asize` bytes from the front of the free block at `bp`,
    /// splitting off the remainder when it can stand as a block.
    fn place(&mut self, bp: usize, asize: usize) {
        let csize = header_tag(&self.arena, bp).size();
        self.free.remove(&mut self.arena, bp);
        if csize - asize >= MIN_BLOCK {
            write_block(&mut self.arena, bp, asize, true);
            let rest = bp + asize;
            write_block(&mut self.arena, rest, csize - asize, false);
            self.free.push_front(&mut self.arena, rest);
            trace!("place {asize} at {bp:#x}, split {} at {rest:#x}", csize - asize);
        } else {
            write_block(&mut self.arena, bp, csize, true);
            trace!("place {asize} at {bp:#x} using whole {csize}");
        }
    }

    /// Merge the free block at `bp` (not yet on the list) with free
    /// physical neighbours and push the result on the list.
    ///
    /// Neighbours leave the list before any tag is rewritten. Returns the
    /// payload offset of the merged block.
    fn coalesce(&mut self, bp: usize) -> usize {
        let prev_alloc = tag_at(&self.arena, bp - DWORD).is_allocated();
        let next = next_block(&self.arena, bp);
        let next_alloc = header_tag(&self.arena, next).is_allocated();
        let mut size = header_tag(&self.arena, bp).size();

        let merged = match (prev_alloc, next_alloc) {
            (true, true) => bp,
            (true, false) => {
                self.free.remove(&mut self.arena, next);
                size += header_tag(&self.arena, next).size();
                write_block(&mut self.arena, bp, size, false);
                bp
            }
            (false, true) => {
                let prev = prev_block(&self.arena, bp);
                self.free.remove(&mut self.arena, prev);
                size += header_tag(&self.arena, prev).size();
                write_block(&mut self.arena, prev, size, false);
                prev
            }
            (false, false) => {
                let prev = prev_block(&self.arena, bp);
                self.free.remove(&mut self.arena, prev);
                self.free.remove(&mut self.arena, next);
                size += header_tag(&self.arena, prev).size();
                size += header_tag(&self.arena, next).size();
                write_block(&mut self.arena, prev, size, false);
                prev
            }
        };
        if !(prev_alloc && next_alloc) {
            trace!("coalesce {bp:#x} into {merged:#x} ({size} bytes)");
        }
        self.free.push_front(&mut self.arena, merged);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagheap_test_utils::{check_pattern, fill_pattern, GatedMemory};

    fn heap() -> Heap {
        Heap::init(HeapConfig::default()).unwrap()
    }

    fn assert_consistent<M: HostMemory>(heap: &Heap<M>) {
        let report = heap.check();
        assert!(report.is_consistent(), "{report}");
    }

    #[test]
    fn init_leaves_one_free_chunk() {
        let h = heap();
        assert_eq!(h.heap_size(), 32 + 4096);
        assert_eq!(h.free_list().len(), 1);
        assert_eq!(h.free_list().head(), Some(32));
        assert_eq!(header_tag(h.arena(), 32).size(), 4096);
        assert_consistent(&h);
    }

    #[test]
    fn init_rejects_invalid_config() {
        let err = Heap::init(HeapConfig::new().with_chunk_bytes(24)).err();
        assert!(matches!(err, Some(HeapError::Config(_))));
    }

    #[test]
    fn init_fails_when_first_chunk_refused() {
        let (mem, gate) = GatedMemory::new(1 << 20);
        gate.allow(1);
        let err = Heap::init_with(mem, HeapConfig::default()).err();
        assert!(matches!(err, Some(HeapError::OutOfMemory { .. })));
    }

    #[test]
    fn unaligned_host_break_is_padded() {
        let (mut mem, _gate) = GatedMemory::new(1 << 20);
        mem.grow(5).unwrap();
        let mut h = Heap::init_with(mem, HeapConfig::default()).unwrap();
        assert_eq!(h.prologue(), 32);
        assert_eq!(h.heap_size(), 48 + 4096);
        let p = h.allocate(24).unwrap();
        assert_eq!(p.offset(), 48);
        assert!(h.allocate(100).unwrap().is_aligned_to(16));
        assert_consistent(&h);
    }

    #[test]
    fn accessors_expose_config_and_host() {
        let config = HeapConfig::default().with_max_heap_bytes(1 << 16);
        let h = Heap::init(config.clone()).unwrap();
        assert_eq!(h.config(), &config);
        assert_eq!(h.memory().max_bytes(), 1 << 16);
        assert_eq!(h.memory().remaining(), (1 << 16) - h.heap_size());
    }

    #[test]
    fn allocate_zero_is_none() {
        let mut h = heap();
        assert_eq!(h.allocate(0), None);
        assert_consistent(&h);
    }

    #[test]
    fn allocations_are_aligned_and_disjoint() {
        let mut h = heap();
        let a = h.allocate(1).unwrap();
        let b = h.allocate(17).unwrap();
        let c = h.allocate(100).unwrap();
        for p in [a, b, c] {
            assert!(p.is_aligned_to(16));
        }
        assert!(a.offset() + h.usable_size(a) <= b.offset());
        assert!(b.offset() + h.usable_size(b) <= c.offset());
        assert_consistent(&h);
    }

    #[test]
    fn split_leaves_remainder_on_free_list() {
        let mut h = heap();
        let a = h.allocate(32).unwrap();
        assert_eq!(a.offset(), 32);
        assert_eq!(h.usable_size(a), 32);
        assert_eq!(h.free_list().head(), Some(32 + 48));
        assert_eq!(header_tag(h.arena(), 80).size(), 4096 - 48);
        assert_consistent(&h);
    }

    #[test]
    fn small_remainder_is_not_split() {
        let mut h = Heap::init(HeapConfig::new().with_chunk_bytes(64)).unwrap();
        // 64-byte chunk, request needs 48: remainder 16 < MIN_BLOCK.
        let a = h.allocate(32).unwrap();
        assert_eq!(h.usable_size(a), 64 - OVERHEAD);
        assert!(h.free_list().is_empty());
        assert_consistent(&h);
    }

    #[test]
    fn free_reuses_smallest_sufficient_block() {
        let mut h = heap();
        let a = h.allocate(32).unwrap();
        let _b = h.allocate(64).unwrap();
        let size = h.heap_size();
        h.free(a);
        let c = h.allocate(16).unwrap();
        assert_eq!(c, a);
        assert_eq!(h.heap_size(), size);
        assert_consistent(&h);
    }

    #[test]
    fn best_fit_prefers_smaller_block_over_list_order() {
        let mut h = heap();
        let big = h.allocate(200).unwrap();
        let _g1 = h.allocate(16).unwrap();
        let small = h.allocate(40).unwrap();
        let _g2 = h.allocate(16).unwrap();
        h.free(small);
        h.free(big);
        // Head of the list is now `big`, but `small` fits more tightly.
        let p = h.allocate(40).unwrap();
        assert_eq!(p, small);
        assert_consistent(&h);
    }

    #[test]
    fn best_fit_tie_goes_to_list_head() {
        let mut h = heap();
        let a = h.allocate(64).unwrap();
        let _g1 = h.allocate(16).unwrap();
        let b = h.allocate(64).unwrap();
        let _g2 = h.allocate(16).unwrap();
        h.free(a);
        h.free(b);
        assert_eq!(h.free_list().head(), Some(b.offset()));
        assert_eq!(h.allocate(64), Some(b));
        assert_eq!(h.allocate(64), Some(a));
        assert_consistent(&h);
    }

    #[test]
    fn coalesce_with_next() {
        let mut h = heap();
        let a = h.allocate(16).unwrap();
        let b = h.allocate(16).unwrap();
        let _c = h.allocate(16).unwrap();
        h.free(b);
        h.free(a);
        assert_eq!(header_tag(h.arena(), a.offset()).size(), 64);
        assert_consistent(&h);
    }

    #[test]
    fn coalesce_with_prev() {
        let mut h = heap();
        let a = h.allocate(16).unwrap();
        let b = h.allocate(16).unwrap();
        let _c = h.allocate(16).unwrap();
        h.free(a);
        h.free(b);
        assert_eq!(header_tag(h.arena(), a.offset()).size(), 64);
        assert_eq!(h.free_list().head(), Some(a.offset()));
        assert_consistent(&h);
    }

    #[test]
    fn coalesce_both_sides_restores_single_chunk() {
        let mut h = heap();
        let a = h.allocate(16).unwrap();
        let b = h.allocate(16).unwrap();
        let c = h.allocate(16).unwrap();
        h.free(a);
        h.free(c);
        h.free(b);
        assert_eq!(h.free_list().len(), 1);
        assert_eq!(header_tag(h.arena(), 32).size(), 4096);
        assert_consistent(&h);
    }

    #[test]
    fn large_request_extends_by_exact_size() {
        let mut h = heap();
        let before = h.heap_size();
        let p = h.allocate(10_000).unwrap();
        assert!(h.usable_size(p) >= 10_000);
        // The trailing free chunk merges with the extension and is split
        // back off, so the arena grows by exactly the block size.
        assert_eq!(h.heap_size() - before, 10_016);
        assert_eq!(header_tag(h.arena(), p.offset() + 10_016).size(), 4096);
        assert_consistent(&h);
    }

    #[test]
    fn failed_growth_leaves_heap_untouched() {
        let (mem, gate) = GatedMemory::new(1 << 20);
        let mut h = Heap::init_with(mem, HeapConfig::default()).unwrap();
        let a = h.allocate(100).unwrap();
        fill_pattern(h.payload_mut(a), 7);
        let size = h.heap_size();
        let free_before = h.free_list().len();

        gate.close();
        assert_eq!(h.allocate(100_000), None);
        assert_eq!(h.heap_size(), size);
        assert_eq!(h.free_list().len(), free_before);
        assert!(check_pattern(&h.payload(a)[..100], 7));
        assert_consistent(&h);

        gate.open();
        assert!(h.allocate(100_000).is_some());
        assert_consistent(&h);
    }

    #[test]
    fn out_of_memory_at_limit() {
        let config = HeapConfig::new().with_max_heap_bytes(32 + 4096);
        let mut h = Heap::init(config).unwrap();
        assert!(h.allocate(4000).is_some());
        assert_eq!(h.allocate(4000), None);
        assert_consistent(&h);
    }

    #[test]
    fn request_beyond_host_capacity_is_none() {
        let mut h = Heap::init(HeapConfig::default().with_max_heap_bytes(usize::MAX)).unwrap();
        let size = h.heap_size();
        assert_eq!(h.allocate(usize::MAX / 2 + 1024), None);
        assert_eq!(h.heap_size(), size);
        assert!(h.allocate(64).is_some());
        assert_consistent(&h);
    }

    #[test]
    fn overflowing_request_is_none() {
        let mut h = heap();
        assert_eq!(h.allocate(usize::MAX), None);
        assert_consistent(&h);
    }

    #[test]
    fn reallocate_null_allocates() {
        let mut h = heap();
        let p = h.reallocate(None, 10).unwrap();
        let mut g = heap();
        assert_eq!(Some(p), g.allocate(10));
    }

    #[test]
    fn reallocate_zero_frees() {
        let mut h = heap();
        let p = h.allocate(64).unwrap();
        assert_eq!(h.reallocate(Some(p), 0), None);
        assert_eq!(h.free_list().len(), 1);
        assert_consistent(&h);
    }

    #[test]
    fn reallocate_preserves_prefix_when_growing() {
        let mut h = heap();
        let p = h.allocate(40).unwrap();
        fill_pattern(&mut h.payload_mut(p)[..40], 3);
        let q = h.reallocate(Some(p), 400).unwrap();
        assert_ne!(p, q);
        assert!(check_pattern(&h.payload(q)[..40], 3));
        assert_consistent(&h);
    }

    #[test]
    fn reallocate_preserves_prefix_when_shrinking() {
        let mut h = heap();
        let p = h.allocate(400).unwrap();
        fill_pattern(&mut h.payload_mut(p)[..400], 9);
        let q = h.reallocate(Some(p), 20).unwrap();
        assert!(check_pattern(&h.payload(q)[..20], 9));
        assert_consistent(&h);
    }

    #[test]
    fn reallocate_failure_keeps_original() {
        let (mem, gate) = GatedMemory::new(1 << 20);
        let mut h = Heap::init_with(mem, HeapConfig::default()).unwrap();
        let p = h.allocate(64).unwrap();
        fill_pattern(&mut h.payload_mut(p)[..64], 5);
        gate.close();
        assert_eq!(h.reallocate(Some(p), 50_000), None);
        assert!(check_pattern(&h.payload(p)[..64], 5));
        h.free(p);
        assert_consistent(&h);
    }

    #[test]
    fn alloc_free_loop_reaches_steady_state() {
        let mut h = heap();
        let mut size_after_second = 0;
        for i in 0..1000 {
            let p = h.allocate(64).unwrap();
            h.free(p);
            if i == 1 {
                size_after_second = h.heap_size();
            }
            assert!(i < 2 || h.heap_size() == size_after_second);
        }
        assert_consistent(&h);
    }

    #[test]
    fn independent_heaps_are_isolated() {
        let mut h1 = heap();
        let mut h2 = heap();
        let a = h1.allocate(64).unwrap();
        let b = h2.allocate(64).unwrap();
        assert_eq!(a, b);
        h1.payload_mut(a).fill(0xAA);
        assert!(h2.payload(b).iter().all(|&x| x != 0xAA));
    }
}
