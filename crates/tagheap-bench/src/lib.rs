//! Synthetic allocation workloads for benchmarking tagheap.
//!
//! Every generator is deterministic in its seed, so a benchmark run can be
//! reproduced exactly:
//!
//! - [`churn_profile`]: random alloc/free/realloc mix over a bounded id pool
//! - [`fragmentation_profile`]: alternating small and large blocks, small
//!   ones freed, then larger requests that cannot reuse the holes
//! - [`realloc_growth_profile`]: a few buffers grown step by step

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tagheap_trace::{Trace, TraceOp};

/// Uniform-ish value in `lo..=hi`.
fn between(rng: &mut ChaCha8Rng, lo: usize, hi: usize) -> usize {
    lo + (rng.next_u64() % (hi - lo + 1) as u64) as usize
}

/// Random mix of allocations, frees and reallocations.
///
/// Draws `num_ops` ops over `num_ids` ids. Sizes are skewed small: three
/// in four requests are at most 128 bytes, the rest up to `max_size`.
/// Every block still live at the end is freed, so the trace is longer
/// than `num_ops` by the number of survivors.
pub fn churn_profile(seed: u64, num_ids: usize, num_ops: usize, max_size: usize) -> Trace {
    if num_ids == 0 {
        return Trace::from_ops(Vec::new());
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut live = vec![false; num_ids];
    let mut ops = Vec::with_capacity(num_ops + num_ids);
    let max_size = max_size.max(129);

    for _ in 0..num_ops {
        let id = between(&mut rng, 0, num_ids - 1);
        let size = if rng.next_u64() % 4 == 0 {
            between(&mut rng, 129, max_size)
        } else {
            between(&mut rng, 1, 128)
        };
        let op = if !live[id] {
            live[id] = true;
            TraceOp::Alloc { id, size }
        } else if rng.next_u64() % 3 == 0 {
            TraceOp::Realloc { id, size }
        } else {
            live[id] = false;
            TraceOp::Free { id }
        };
        ops.push(op);
    }
    for id in (0..num_ids).filter(|&id| live[id]) {
        ops.push(TraceOp::Free { id });
    }
    Trace::from_ops(ops)
}

/// Fragmentation stress: `pairs` small/large pairs, small ones freed, then
/// one large request per pair that the small holes cannot hold.
pub fn fragmentation_profile(seed: u64, pairs: usize) -> Trace {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut ops = Vec::with_capacity(pairs * 6);
    let small = |rng: &mut ChaCha8Rng| between(rng, 8, 64);
    let large = |rng: &mut ChaCha8Rng| between(rng, 256, 1024);

    for i in 0..pairs {
        ops.push(TraceOp::Alloc {
            id: 2 * i,
            size: small(&mut rng),
        });
        ops.push(TraceOp::Alloc {
            id: 2 * i + 1,
            size: large(&mut rng),
        });
    }
    for i in 0..pairs {
        ops.push(TraceOp::Free { id: 2 * i });
    }
    for i in 0..pairs {
        ops.push(TraceOp::Alloc {
            id: 2 * i,
            size: large(&mut rng) + 1024,
        });
    }
    for id in 0..2 * pairs {
        ops.push(TraceOp::Free { id });
    }
    Trace::from_ops(ops)
}

/// `buffers` buffers each reallocated `steps` times, growing by a random
/// 16..=256 bytes per step, then freed.
pub fn realloc_growth_profile(seed: u64, buffers: usize, steps: usize) -> Trace {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut sizes: Vec<usize> = (0..buffers).map(|_| between(&mut rng, 16, 64)).collect();
    let mut ops: Vec<TraceOp> = sizes
        .iter()
        .enumerate()
        .map(|(id, &size)| TraceOp::Alloc { id, size })
        .collect();

    for _ in 0..steps {
        for (id, size) in sizes.iter_mut().enumerate() {
            *size += between(&mut rng, 16, 256);
            ops.push(TraceOp::Realloc { id, size: *size });
        }
    }
    for id in 0..buffers {
        ops.push(TraceOp::Free { id });
    }
    Trace::from_ops(ops)
}
