//! Data types for allocation traces.

use std::fmt;

/// The four header values at the top of a trace file.
///
/// # Examples
///
/// ```
/// use tagheap_trace::TraceHeader;
///
/// let header = TraceHeader {
///     suggested_heap_bytes: 20_000,
///     num_ids: 2,
///     num_ops: 4,
///     weight: 1,
/// };
/// assert_eq!(header.to_string(), "20000\n2\n4\n1");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceHeader {
    /// Heap size the trace author expected to need. Informational only.
    pub suggested_heap_bytes: usize,
    /// Number of distinct block ids; every op id is below this.
    pub num_ids: usize,
    /// Number of ops in the trace.
    pub num_ops: usize,
    /// Scoring weight. Informational only.
    pub weight: u32,
}

impl fmt::Display for TraceHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{}\n{}\n{}",
            self.suggested_heap_bytes, self.num_ids, self.num_ops, self.weight
        )
    }
}

/// A single trace operation on block `id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceOp {
    /// `a <id> <bytes>`: allocate a new block for `id`.
    Alloc {
        /// Block id.
        id: usize,
        /// Requested payload bytes.
        size: usize,
    },
    /// `r <id> <bytes>`: resize the live block for `id`.
    Realloc {
        /// Block id.
        id: usize,
        /// New payload bytes.
        size: usize,
    },
    /// `f <id>`: free the live block for `id`.
    Free {
        /// Block id.
        id: usize,
    },
}

impl TraceOp {
    /// The block id this op touches.
    pub fn id(&self) -> usize {
        match *self {
            Self::Alloc { id, .. } | Self::Realloc { id, .. } | Self::Free { id } => id,
        }
    }
}

impl fmt::Display for TraceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alloc { id, size } => write!(f, "a {id} {size}"),
            Self::Realloc { id, size } => write!(f, "r {id} {size}"),
            Self::Free { id } => write!(f, "f {id}"),
        }
    }
}

/// A parsed trace: header plus ops in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trace {
    /// Header values.
    pub header: TraceHeader,
    /// Ops in replay order.
    pub ops: Vec<TraceOp>,
}

impl Trace {
    /// Build a trace from ops, deriving the header.
    ///
    /// `num_ids` is one past the largest id used; the suggested heap size
    /// is the sum of all allocation sizes, weight 1.
    pub fn from_ops(ops: Vec<TraceOp>) -> Self {
        let num_ids = ops.iter().map(|op| op.id() + 1).max().unwrap_or(0);
        let suggested_heap_bytes = ops
            .iter()
            .map(|op| match *op {
                TraceOp::Alloc { size, .. } | TraceOp::Realloc { size, .. } => size,
                TraceOp::Free { .. } => 0,
            })
            .sum();
        Self {
            header: TraceHeader {
                suggested_heap_bytes,
                num_ids,
                num_ops: ops.len(),
                weight: 1,
            },
            ops,
        }
    }
}
