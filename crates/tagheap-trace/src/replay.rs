//! Validating trace replay.
//!
//! [`replay`] drives a [`Heap`] through a [`Trace`] and checks every
//! pointer the heap hands out:
//!
//! - non-null for non-zero requests;
//! - 16-byte aligned;
//! - payload inside the arena;
//! - disjoint from every other live payload;
//! - contents intact until the block is freed or moved.
//!
//! Live payloads are filled with a byte pattern derived from the id and
//! the op that produced them, so a block overwritten by a neighbour is
//! caught the next time it is touched.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, warn};
use tagheap_arena::tag::{DWORD, MIN_BLOCK};
use tagheap_arena::Heap;
use tagheap_core::{HeapPtr, HostMemory};

use crate::error::TraceError;
use crate::types::{Trace, TraceOp};

/// Knobs for [`replay`].
#[derive(Clone, Debug, Default)]
pub struct ReplayOptions {
    /// Run the full consistency checker after every op.
    pub check_each_op: bool,
}

impl ReplayOptions {
    /// Options with the per-op consistency check switched on.
    pub fn checked() -> Self {
        Self {
            check_each_op: true,
        }
    }
}

/// Outcome of a successful replay.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayReport {
    /// Ops executed.
    pub ops: usize,
    /// Largest total of requested payload bytes live at once.
    pub peak_live_bytes: usize,
    /// Arena size after the last op.
    pub heap_bytes: usize,
    /// Wall-clock time spent in the replay loop.
    pub elapsed: Duration,
}

impl ReplayReport {
    /// Peak live payload bytes over final arena size, in `[0, 1]`.
    pub fn utilization(&self) -> f64 {
        if self.heap_bytes == 0 {
            return 0.0;
        }
        self.peak_live_bytes as f64 / self.heap_bytes as f64
    }

    /// Ops per second, or 0 when the replay was too fast to time.
    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.ops as f64 / secs
    }
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ops, peak {} B live, heap {} B, util {:.1}%, {:.0} ops/s",
            self.ops,
            self.peak_live_bytes,
            self.heap_bytes,
            self.utilization() * 100.0,
            self.ops_per_sec()
        )
    }
}

#[derive(Clone, Copy, Debug)]
struct LiveBlock {
    /// `None` for a zero-byte allocation.
    ptr: Option<HeapPtr>,
    size: usize,
    seed: u64,
}

fn pattern_byte(seed: u64, i: usize) -> u8 {
    (seed.wrapping_add(i as u64).wrapping_mul(0x2545_F491_4F6C_DD1D) >> 56) as u8
}

fn seed_for(id: usize, op: usize) -> u64 {
    ((id as u64) << 32) ^ op as u64
}

struct Replayer<'h, M: HostMemory> {
    heap: &'h mut Heap<M>,
    /// Live blocks by id.
    live: BTreeMap<usize, LiveBlock>,
    /// Payload start -> (payload end, id).
    ranges: BTreeMap<usize, (usize, usize)>,
    live_bytes: usize,
    peak_live_bytes: usize,
}

impl<M: HostMemory> Replayer<'_, M> {
    fn take_live(&mut self, op: usize, id: usize) -> Result<LiveBlock, TraceError> {
        let block = self
            .live
            .remove(&id)
            .ok_or(TraceError::UnknownId { op, id })?;
        if let Some(ptr) = block.ptr {
            self.ranges.remove(&ptr.offset());
        }
        self.live_bytes -= block.size;
        Ok(block)
    }

    fn verify(
        &self,
        op: usize,
        id: usize,
        block: &LiveBlock,
        len: usize,
    ) -> Result<(), TraceError> {
        let Some(ptr) = block.ptr else {
            return Ok(());
        };
        let bytes = &self.heap.payload(ptr)[..len];
        match bytes
            .iter()
            .enumerate()
            .position(|(i, &b)| b != pattern_byte(block.seed, i))
        {
            Some(index) => Err(TraceError::Corrupted { op, id, index }),
            None => Ok(()),
        }
    }

    /// Validate a freshly returned pointer, fill it and record it as live.
    ///
    /// `moved_from` is the block a reallocation copied from; its pattern
    /// must survive in the common prefix.
    fn admit(
        &mut self,
        op: usize,
        id: usize,
        ptr: Option<HeapPtr>,
        size: usize,
        moved_from: Option<LiveBlock>,
    ) -> Result<(), TraceError> {
        let seed = seed_for(id, op);
        let ptr = match (ptr, size) {
            (None, 0) => None,
            (None, _) => return Err(TraceError::AllocFailed { op, size }),
            (Some(ptr), _) => {
                self.validate_placement(op, id, ptr, size)?;
                if let Some(old) = moved_from {
                    let kept = LiveBlock {
                        ptr: Some(ptr),
                        ..old
                    };
                    self.verify(op, id, &kept, size.min(old.size))?;
                }
                for (i, b) in self.heap.payload_mut(ptr)[..size].iter_mut().enumerate() {
                    *b = pattern_byte(seed, i);
                }
                self.ranges.insert(ptr.offset(), (ptr.offset() + size, id));
                Some(ptr)
            }
        };
        self.live.insert(id, LiveBlock { ptr, size, seed });
        self.live_bytes += size;
        self.peak_live_bytes = self.peak_live_bytes.max(self.live_bytes);
        Ok(())
    }

    fn validate_placement(
        &self,
        op: usize,
        id: usize,
        ptr: HeapPtr,
        size: usize,
    ) -> Result<(), TraceError> {
        let start = ptr.offset();
        if !ptr.is_aligned_to(DWORD) {
            return Err(TraceError::Misaligned { op, offset: start });
        }
        let heap_bytes = self.heap.heap_size();
        let in_bounds = start >= MIN_BLOCK
            && start
                .checked_add(size)
                .is_some_and(|end| end <= heap_bytes)
            && self.heap.usable_size(ptr) >= size;
        if !in_bounds {
            return Err(TraceError::OutOfBounds {
                op,
                offset: start,
                size,
                heap_bytes,
            });
        }
        let end = start + size;
        let before = self.ranges.range(..=start).next_back();
        let after = self.ranges.range(start..).next();
        for (&other_start, &(other_end, other)) in before.into_iter().chain(after) {
            if other_start < end && start < other_end {
                return Err(TraceError::Overlap { op, id, other });
            }
        }
        Ok(())
    }

    fn step(&mut self, op: usize, trace_op: TraceOp) -> Result<(), TraceError> {
        match trace_op {
            TraceOp::Alloc { id, size } => {
                if self.live.contains_key(&id) {
                    return Err(TraceError::IdInUse { op, id });
                }
                let ptr = self.heap.allocate(size);
                self.admit(op, id, ptr, size, None)
            }
            TraceOp::Realloc { id, size } => {
                let old = self.take_live(op, id)?;
                self.verify(op, id, &old, old.size)?;
                let ptr = self.heap.reallocate(old.ptr, size);
                if size == 0 {
                    // Resizing to zero frees the block and retires the id.
                    return Ok(());
                }
                self.admit(op, id, ptr, size, Some(old))
            }
            TraceOp::Free { id } => {
                let old = self.take_live(op, id)?;
                self.verify(op, id, &old, old.size)?;
                if let Some(ptr) = old.ptr {
                    self.heap.free(ptr);
                }
                Ok(())
            }
        }
    }
}

/// Replay `trace` against `heap`, validating every returned pointer.
///
/// Stops at the first failure. Blocks still live at the end are verified
/// and left allocated.
pub fn replay<M: HostMemory>(
    trace: &Trace,
    heap: &mut Heap<M>,
    options: &ReplayOptions,
) -> Result<ReplayReport, TraceError> {
    let num_ids = trace.header.num_ids;
    let mut replayer = Replayer {
        heap,
        live: BTreeMap::new(),
        ranges: BTreeMap::new(),
        live_bytes: 0,
        peak_live_bytes: 0,
    };

    let start = Instant::now();
    for (op, &trace_op) in trace.ops.iter().enumerate() {
        if trace_op.id() >= num_ids {
            return Err(TraceError::UnknownId {
                op,
                id: trace_op.id(),
            });
        }
        replayer.step(op, trace_op)?;
        if options.check_each_op {
            let report = replayer.heap.check();
            if !report.is_consistent() {
                warn!("op {op} ({trace_op}) left the heap inconsistent:\n{report}");
                return Err(TraceError::Inconsistent {
                    op,
                    violations: report.violations,
                });
            }
        }
    }
    let elapsed = start.elapsed();

    let ops = trace.ops.len();
    for (&id, block) in &replayer.live {
        replayer.verify(ops, id, block, block.size)?;
    }

    let report = ReplayReport {
        ops,
        peak_live_bytes: replayer.peak_live_bytes,
        heap_bytes: replayer.heap.heap_size(),
        elapsed,
    };
    debug!("replay finished: {report}");
    Ok(report)
}
