//! tagheap: a boundary-tag heap allocator over a single growable arena.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the tagheap sub-crates. Blocks carry size/allocated tags at both ends,
//! free blocks are threaded on an explicit doubly linked list, requests are
//! placed best-fit and freed blocks merge with free neighbours immediately.
//!
//! # Quick start
//!
//! ```rust
//! use tagheap::prelude::*;
//!
//! let mut heap = Heap::init(HeapConfig::default()).unwrap();
//!
//! let p = heap.allocate(100).unwrap();
//! assert!(p.is_aligned_to(16));
//! heap.payload_mut(p)[..5].copy_from_slice(b"hello");
//!
//! // Reallocation moves the block and keeps the prefix.
//! let q = heap.reallocate(Some(p), 4000).unwrap();
//! assert_eq!(&heap.payload(q)[..5], b"hello");
//!
//! heap.free(q);
//! assert!(heap.check().is_consistent());
//! assert_eq!(heap.stats().allocated_blocks, 0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tagheap-core` | `HeapPtr`, errors, the `HostMemory` trait |
//! | [`arena`] | `tagheap-arena` | `Heap`, block tags, free list, checker, stats |
//! | [`trace`] | `tagheap-trace` | Trace parsing and validating replay |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and the host memory trait (`tagheap-core`).
///
/// Contains [`types::HeapPtr`], [`types::HeapError`],
/// [`types::ConfigError`] and [`types::HostMemory`].
pub use tagheap_core as types;

/// The allocator and its building blocks (`tagheap-arena`).
///
/// [`arena::Heap`] is the entry point; [`arena::tag`] and
/// [`arena::free_list`] expose the block layout for diagnostics.
pub use tagheap_arena as arena;

/// Allocation traces (`tagheap-trace`).
///
/// Parse traces with [`trace::read_trace`] and drive a heap through them
/// with [`trace::replay`].
pub use tagheap_trace as trace;

/// Common imports for typical tagheap usage.
///
/// ```rust
/// use tagheap::prelude::*;
/// ```
pub mod prelude {
    // Allocator
    pub use tagheap_arena::{Heap, HeapConfig, VecMemory};

    // Diagnostics
    pub use tagheap_arena::{BlockInfo, CheckReport, HeapStats, Violation};

    // Core types and errors
    pub use tagheap_core::{ConfigError, HeapError, HeapPtr, HostMemory};

    // Traces
    pub use tagheap_trace::{replay, ReplayOptions, ReplayReport, Trace, TraceError, TraceOp};
}
