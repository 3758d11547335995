//! Allocation traces for tagheap.
//!
//! Reads, writes and replays the classic text trace format used to drive
//! allocator test suites, checking every pointer the heap returns.
//!
//! # Architecture
//!
//! - [`read_trace`] / [`parse_trace`] decode a trace, validating ids and
//!   the op count against the header
//! - [`write_trace`] encodes a [`Trace`] back to text
//! - [`replay`] runs a trace against a [`Heap`](tagheap_arena::Heap) and
//!   produces a [`ReplayReport`] with utilization and throughput
//!
//! # Format
//!
//! ```text
//! <suggested heap bytes> <id count> <op count> <weight>
//! a <id> <bytes>     allocate
//! r <id> <bytes>     reallocate
//! f <id>             free
//! ```
//!
//! Blank lines and `#` comments are ignored.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod parse;
pub mod replay;
pub mod types;

pub use error::TraceError;
pub use parse::{parse_trace, read_trace, write_trace};
pub use replay::{replay, ReplayOptions, ReplayReport};
pub use types::{Trace, TraceHeader, TraceOp};
