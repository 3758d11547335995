//! Boundary-tag heap allocation over a single growable arena.
//!
//! Implements `allocate`/`free`/`reallocate` with an explicit free list,
//! best-fit placement, block splitting and immediate coalescing. All
//! memory is addressed by byte offset into the arena; the crate contains
//! no `unsafe` code.
//!
//! # Architecture
//!
//! ```text
//! Heap (allocator: search, place, coalesce)
//! ├── FreeList (head offset; links live in free payloads)
//! ├── tag (boundary-tag codec + neighbour arithmetic)
//! └── Arena (word/byte access, growth)
//!     └── HostMemory (VecMemory by default, grows like sbrk)
//! ```
//!
//! # Invariants
//!
//! After every public operation:
//!
//! - every block size is a multiple of 16 and at least 32 bytes;
//! - header and footer of every block agree;
//! - no two physically adjacent blocks are free;
//! - the free list holds exactly the free blocks, once each;
//! - live payloads never overlap each other or the sentinels.
//!
//! [`Heap::check`] verifies all of them.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod arena;
pub mod check;
pub mod config;
pub mod free_list;
pub mod heap;
pub mod memory;
pub mod stats;
pub mod tag;

// Public re-exports for the primary API surface.
pub use arena::Arena;
pub use check::{CheckReport, Violation};
pub use config::HeapConfig;
pub use free_list::FreeList;
pub use heap::Heap;
pub use memory::VecMemory;
pub use stats::{BlockInfo, HeapStats};
pub use tagheap_core::{HeapError, HeapPtr, HostMemory};
