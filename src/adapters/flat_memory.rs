//! Flat guest memory
//!
//! A single contiguous allocation standing in for the console's
//! physical RAM. Out-of-range DMA clips to the valid region and logs,
//! matching how the device treats every other guest mistake: no
//! panic, no corruption.

use log::error;

use crate::ports::GuestMemory;

pub struct FlatMemory {
    mem: Vec<u8>,
}

impl FlatMemory {
    pub fn new(size: usize) -> Self {
        Self { mem: vec![0; size] }
    }

    pub fn write(&mut self, addr: u32, data: &[u8]) {
        self.copy_to_guest(addr, data);
    }

    pub fn read(&mut self, addr: u32, len: usize) -> Vec<u8> {
        let mut out = vec![0; len];
        self.copy_from_guest(addr, &mut out);
        out
    }

    fn clipped_range(&self, addr: u32, len: usize) -> Option<(usize, usize)> {
        let start = addr as usize;
        if start >= self.mem.len() {
            error!("DMA outside guest memory: {addr:#010x}+{len}");
            return None;
        }
        let end = (start + len).min(self.mem.len());
        if end - start < len {
            error!("DMA clipped at end of guest memory: {addr:#010x}+{len}");
        }
        Some((start, end))
    }
}

impl GuestMemory for FlatMemory {
    fn copy_from_guest(&mut self, src_addr: u32, dst: &mut [u8]) {
        if let Some((start, end)) = self.clipped_range(src_addr, dst.len()) {
            dst[..end - start].copy_from_slice(&self.mem[start..end]);
        }
    }

    fn copy_to_guest(&mut self, dst_addr: u32, src: &[u8]) {
        if let Some((start, end)) = self.clipped_range(dst_addr, src.len()) {
            self.mem[start..end].copy_from_slice(&src[..end - start]);
        }
    }
}
