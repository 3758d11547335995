//! Core types and traits for the tagheap allocator.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the pieces shared by every other crate in the workspace: the
//! [`HeapPtr`] payload handle, the error types, and the [`HostMemory`]
//! growth primitive that backs an arena.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod traits;

pub use error::{ConfigError, HeapError};
pub use id::HeapPtr;
pub use traits::HostMemory;
