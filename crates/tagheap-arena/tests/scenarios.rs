//! Integration test: end-to-end allocator scenarios through the public API.

use tagheap_arena::{Heap, HeapConfig, HeapError, Violation};
use tagheap_test_utils::{check_pattern, fill_pattern, GatedMemory};

fn heap() -> Heap {
    Heap::init(HeapConfig::default()).unwrap()
}

#[test]
fn freed_block_is_reused_without_growth() {
    let mut h = heap();
    let a = h.allocate(32).unwrap();
    let b = h.allocate(64).unwrap();
    let size = h.heap_size();
    h.free(a);
    let c = h.allocate(16).unwrap();
    assert_eq!(c, a);
    assert_ne!(c, b);
    assert_eq!(h.heap_size(), size);
    assert!(h.check().is_consistent());
}

#[test]
fn null_and_zero_edge_cases() {
    let mut h = heap();
    assert_eq!(h.allocate(0), None);

    let p = h.reallocate(None, 10).unwrap();
    assert!(p.is_aligned_to(16));
    assert!(h.usable_size(p) >= 10);

    assert_eq!(h.reallocate(Some(p), 0), None);
    let stats = h.stats();
    assert_eq!(stats.allocated_blocks, 0);
    assert_eq!(stats.free_blocks, 1);
}

#[test]
fn thousand_alloc_free_cycles_do_not_grow() {
    let mut h = heap();
    let mut settled = None;
    for i in 0..1000 {
        let p = h.allocate(64).unwrap();
        h.free(p);
        match settled {
            None if i >= 1 => settled = Some(h.heap_size()),
            Some(size) => assert_eq!(h.heap_size(), size, "grew on iteration {i}"),
            None => {}
        }
    }
    assert!(h.check().is_consistent());
}

#[test]
fn growth_merges_with_trailing_free_block() {
    let mut h = Heap::init(HeapConfig::default().with_chunk_bytes(256)).unwrap();
    let a = h.allocate(100).unwrap();
    // Leaves a free tail smaller than the next request.
    let b = h.allocate(500).unwrap();
    assert!(b > a);
    let stats = h.stats();
    assert_eq!(stats.free_blocks, 1);
    assert!(h.check().is_consistent());
}

#[test]
fn many_live_allocations_keep_their_contents() {
    let mut h = heap();
    let ptrs: Vec<_> = (1..200)
        .map(|i| {
            let p = h.allocate(i * 3).unwrap();
            fill_pattern(&mut h.payload_mut(p)[..i * 3], i as u64);
            (p, i)
        })
        .collect();
    for &(p, _) in ptrs.iter().step_by(2) {
        h.free(p);
    }
    for &(p, i) in ptrs.iter().skip(1).step_by(2) {
        assert!(check_pattern(&h.payload(p)[..i * 3], i as u64));
    }
    assert!(h.check().is_consistent());
}

#[test]
fn init_failure_is_reported() {
    let (mem, gate) = GatedMemory::new(1 << 16);
    gate.close();
    match Heap::init_with(mem, HeapConfig::default()) {
        Err(HeapError::OutOfMemory { requested, limit }) => {
            assert_eq!(requested, 32);
            assert_eq!(limit, 0);
        }
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("init should fail"),
    }
}

#[test]
fn exhausted_host_returns_none_then_recovers_after_free() {
    let config = HeapConfig::default()
        .with_chunk_bytes(1024)
        .with_max_heap_bytes(32 + 4096);
    let mut h = Heap::init(config).unwrap();
    let mut held = Vec::new();
    while let Some(p) = h.allocate(200) {
        held.push(p);
    }
    assert!(!held.is_empty());
    assert_eq!(h.heap_size(), 32 + 4096);
    assert!(h.check().is_consistent());

    h.free(held[0]);
    assert!(h.allocate(200).is_some());
}

#[test]
fn independent_instances_do_not_share_state() {
    let mut a = heap();
    let mut b = heap();
    for _ in 0..10 {
        a.allocate(1000).unwrap();
    }
    assert!(a.heap_size() > b.heap_size());
    let p = b.allocate(1000).unwrap();
    assert_eq!(p.offset(), 32);
}

#[test]
fn corrupted_link_is_detected_by_checker() {
    let mut h = heap();
    let a = h.allocate(64).unwrap();
    let _guard = h.allocate(64).unwrap();
    h.free(a);
    // Use after free: scribble over the free block's link words.
    h.payload_mut(a)[..16].fill(0);
    let report = h.check();
    assert!(!report.is_consistent());
    assert!(report
        .violations
        .iter()
        .any(|v| matches!(v, Violation::NotOnFreeList { .. })));
}
