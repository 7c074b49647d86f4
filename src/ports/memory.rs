//! Guest physical memory port
//!
//! DMA transfers move bytes between guest physical memory and the
//! device buffers. The host provides the two copy primitives; the
//! device never interprets guest addresses itself.

/// Trait for host-provided guest memory access.
pub trait GuestMemory {
    /// Copy `dst.len()` bytes out of guest memory starting at `src_addr`.
    fn copy_from_guest(&mut self, src_addr: u32, dst: &mut [u8]);

    /// Copy `src` into guest memory starting at `dst_addr`.
    fn copy_to_guest(&mut self, dst_addr: u32, src: &[u8]);
}
