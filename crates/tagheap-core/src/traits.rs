//! The host memory-growth primitive.

/// A monotonically growing byte segment supplied by the host.
///
/// This is the `sbrk`-style seam between the allocator and whatever owns
/// the real memory. Implementations never shrink and never move bytes
/// that were already granted: an offset below [`brk`](HostMemory::brk)
/// stays valid for the lifetime of the value.
pub trait HostMemory {
    /// Grow the segment by `delta` bytes.
    ///
    /// Returns the previous break (the offset where the new region
    /// starts), or `None` if the host refuses. A refusal must leave the
    /// segment exactly as it was.
    fn grow(&mut self, delta: usize) -> Option<usize>;

    /// Current break: the number of bytes granted so far.
    fn brk(&self) -> usize;

    /// All granted bytes, `[0, brk)`.
    fn bytes(&self) -> &[u8];

    /// Mutable access to all granted bytes, `[0, brk)`.
    fn bytes_mut(&mut self) -> &mut [u8];
}
