//! Error types for trace parsing and replay.

use std::fmt;
use std::io;

use tagheap_arena::Violation;
use tagheap_core::HeapError;

/// Errors that can occur while reading, writing or replaying a trace.
#[derive(Debug)]
pub enum TraceError {
    /// An I/O error occurred during read or write.
    Io(io::Error),
    /// The heap to replay against could not be set up.
    Heap(HeapError),
    /// A line could not be parsed.
    Parse {
        /// 1-based line number.
        line: usize,
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// An op names an id outside `0..num_ids`.
    IdOutOfRange {
        /// 1-based line number.
        line: usize,
        /// The id found.
        id: usize,
        /// The id count declared in the header.
        num_ids: usize,
    },
    /// The number of ops differs from the header.
    CountMismatch {
        /// Op count declared in the header.
        expected: usize,
        /// Ops actually present.
        found: usize,
    },
    /// A free or realloc names an id with no live block.
    UnknownId {
        /// 0-based op index.
        op: usize,
        /// The id.
        id: usize,
    },
    /// An alloc names an id that already has a live block.
    IdInUse {
        /// 0-based op index.
        op: usize,
        /// The id.
        id: usize,
    },
    /// The heap returned null for a non-zero request.
    AllocFailed {
        /// 0-based op index.
        op: usize,
        /// Requested payload bytes.
        size: usize,
    },
    /// A returned payload is not 16-byte aligned.
    Misaligned {
        /// 0-based op index.
        op: usize,
        /// The payload offset.
        offset: usize,
    },
    /// A returned payload does not fit inside the arena.
    OutOfBounds {
        /// 0-based op index.
        op: usize,
        /// The payload offset.
        offset: usize,
        /// Requested payload bytes.
        size: usize,
        /// Arena size at the time.
        heap_bytes: usize,
    },
    /// A returned payload overlaps another live payload.
    Overlap {
        /// 0-based op index.
        op: usize,
        /// The id just placed.
        id: usize,
        /// The live id it collides with.
        other: usize,
    },
    /// A live payload no longer holds the bytes written to it.
    Corrupted {
        /// 0-based op index at which the damage was seen.
        op: usize,
        /// The damaged id.
        id: usize,
        /// First mismatching byte index.
        index: usize,
    },
    /// The consistency checker found violations after an op.
    Inconsistent {
        /// 0-based op index.
        op: usize,
        /// What the checker reported.
        violations: Vec<Violation>,
    },
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Heap(e) => write!(f, "heap error: {e}"),
            Self::Parse { line, detail } => write!(f, "line {line}: {detail}"),
            Self::IdOutOfRange { line, id, num_ids } => {
                write!(f, "line {line}: id {id} outside 0..{num_ids}")
            }
            Self::CountMismatch { expected, found } => {
                write!(f, "header declares {expected} ops, trace has {found}")
            }
            Self::UnknownId { op, id } => write!(f, "op {op}: id {id} is not live"),
            Self::IdInUse { op, id } => write!(f, "op {op}: id {id} is already live"),
            Self::AllocFailed { op, size } => {
                write!(f, "op {op}: allocation of {size} bytes failed")
            }
            Self::Misaligned { op, offset } => {
                write!(f, "op {op}: payload {offset:#x} is not 16-byte aligned")
            }
            Self::OutOfBounds {
                op,
                offset,
                size,
                heap_bytes,
            } => write!(
                f,
                "op {op}: payload {offset:#x}+{size} lies outside the {heap_bytes}-byte heap"
            ),
            Self::Overlap { op, id, other } => {
                write!(f, "op {op}: payload of id {id} overlaps id {other}")
            }
            Self::Corrupted { op, id, index } => {
                write!(f, "op {op}: payload of id {id} corrupted at byte {index}")
            }
            Self::Inconsistent { op, violations } => {
                write!(f, "op {op}: heap inconsistent ({} violations)", violations.len())?;
                if let Some(first) = violations.first() {
                    write!(f, ", first: {first}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for TraceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Heap(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TraceError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<HeapError> for TraceError {
    fn from(e: HeapError) -> Self {
        Self::Heap(e)
    }
}
