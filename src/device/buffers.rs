//! Bounded byte buffers with guest-visible positions
//!
//! Three shapes, all `BUF_SIZE` bytes:
//! - `LineAccumulator` — the AT command line under construction, with
//!   an overflow latch that turns the finished line into `"ERROR"`
//! - `DrainWindow` — a fill-then-drain window (AT responses, socket
//!   input); both cursors snap back to zero the moment it empties
//! - `StagingBuffer` — bytes queued for one transmit
//!
//! The `pos`/`end` counters are not implementation detail: the guest
//! reads them through PENDING_AT_* and RECV_PENDING_*, so overflow
//! handling must drop bytes without ever disturbing them.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::domain::BUF_SIZE;

/// AT command line accumulator (`cmd_buf` / `cmd_pos`).
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "LineSnapshot", into = "LineSnapshot")]
pub struct LineAccumulator {
    buf: [u8; BUF_SIZE],
    pos: u16,
    overflow: bool,
}

impl Default for LineAccumulator {
    fn default() -> Self {
        Self {
            buf: [0; BUF_SIZE],
            pos: 0,
            overflow: false,
        }
    }
}

impl LineAccumulator {
    /// Append one byte; a full buffer latches the overflow flag and
    /// drops the byte.
    pub fn push(&mut self, b: u8) {
        if usize::from(self.pos) >= BUF_SIZE {
            warn!("AT command buffer overflow, dropping byte {b:#04x}");
            self.overflow = true;
            return;
        }
        self.buf[usize::from(self.pos)] = b;
        self.pos += 1;
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf[..usize::from(self.pos)]
    }

    /// Accumulated length, exposed via PENDING_AT_CMD.
    pub fn pending(&self) -> u16 {
        self.pos
    }

    pub fn overflowed(&self) -> bool {
        self.overflow
    }

    pub fn reset(&mut self) {
        self.pos = 0;
        self.overflow = false;
    }
}

#[derive(Serialize, Deserialize)]
struct LineSnapshot {
    data: Vec<u8>,
    overflow: bool,
}

impl From<LineAccumulator> for LineSnapshot {
    fn from(acc: LineAccumulator) -> Self {
        Self {
            data: acc.bytes().to_vec(),
            overflow: acc.overflow,
        }
    }
}

impl From<LineSnapshot> for LineAccumulator {
    fn from(snap: LineSnapshot) -> Self {
        let mut acc = LineAccumulator::default();
        for &b in snap.data.iter().take(BUF_SIZE) {
            acc.push(b);
        }
        acc.overflow = snap.overflow;
        acc
    }
}

/// Fill-then-drain window (`buf` / `pos` / `end`).
///
/// Invariant: `0 <= pos <= end <= BUF_SIZE`, and `pos == end` implies
/// both are zero.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "WindowSnapshot", into = "WindowSnapshot")]
pub struct DrainWindow {
    buf: [u8; BUF_SIZE],
    pos: u16,
    end: u16,
}

impl Default for DrainWindow {
    fn default() -> Self {
        Self {
            buf: [0; BUF_SIZE],
            pos: 0,
            end: 0,
        }
    }
}

impl DrainWindow {
    /// Undrained byte count (`end - pos`).
    pub fn pending(&self) -> u16 {
        self.end - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.end
    }

    /// Room left for appending.
    pub fn free(&self) -> usize {
        BUF_SIZE - usize::from(self.end)
    }

    /// Append a whole slice, or drop it entirely if it does not fit.
    pub fn push_slice(&mut self, data: &[u8]) {
        if data.len() > self.free() {
            warn!(
                "buffer overflow: dropping {} bytes ({} free)",
                data.len(),
                self.free()
            );
            return;
        }
        let start = usize::from(self.end);
        self.buf[start..start + data.len()].copy_from_slice(data);
        self.end += data.len() as u16;
    }

    /// Append one byte, or drop it if full.
    pub fn push_byte(&mut self, b: u8) {
        if self.free() == 0 {
            warn!("buffer overflow: dropping byte {b:#04x}");
            return;
        }
        self.buf[usize::from(self.end)] = b;
        self.end += 1;
    }

    /// Drain one byte. An empty window yields 0 and stays put.
    pub fn pop(&mut self) -> u8 {
        if self.is_empty() {
            return 0;
        }
        let b = self.buf[usize::from(self.pos)];
        self.pos += 1;
        if self.pos == self.end {
            self.pos = 0;
            self.end = 0;
        }
        b
    }

    /// Drain into `out`, zero-filling past the available bytes.
    pub fn drain_into(&mut self, out: &mut [u8]) {
        for slot in out.iter_mut() {
            *slot = self.pop();
        }
    }

    /// The writable tail, for direct receives.
    pub fn tail_mut(&mut self) -> &mut [u8] {
        &mut self.buf[usize::from(self.end)..]
    }

    /// Commit `n` bytes previously written through `tail_mut`.
    pub fn advance_end(&mut self, n: usize) {
        let n = n.min(self.free());
        self.end += n as u16;
    }

    pub fn reset(&mut self) {
        self.pos = 0;
        self.end = 0;
    }
}

#[derive(Serialize, Deserialize)]
struct WindowSnapshot {
    pos: u16,
    data: Vec<u8>,
}

impl From<DrainWindow> for WindowSnapshot {
    fn from(w: DrainWindow) -> Self {
        Self {
            pos: w.pos,
            data: w.buf[..usize::from(w.end)].to_vec(),
        }
    }
}

impl From<WindowSnapshot> for DrainWindow {
    fn from(snap: WindowSnapshot) -> Self {
        let mut w = DrainWindow::default();
        let len = snap.data.len().min(BUF_SIZE);
        w.buf[..len].copy_from_slice(&snap.data[..len]);
        w.end = len as u16;
        w.pos = snap.pos.min(w.end);
        if w.pos == w.end {
            w.reset();
        }
        w
    }
}

/// Bytes staged for the next transmit (`out_buf` / `out_pos`).
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "StagingSnapshot", into = "StagingSnapshot")]
pub struct StagingBuffer {
    buf: [u8; BUF_SIZE],
    pos: u16,
}

impl Default for StagingBuffer {
    fn default() -> Self {
        Self {
            buf: [0; BUF_SIZE],
            pos: 0,
        }
    }
}

impl StagingBuffer {
    pub fn push_slice(&mut self, data: &[u8]) {
        let free = BUF_SIZE - usize::from(self.pos);
        if data.len() > free {
            warn!(
                "staging buffer overflow: dropping {} bytes ({free} free)",
                data.len()
            );
            return;
        }
        let start = usize::from(self.pos);
        self.buf[start..start + data.len()].copy_from_slice(data);
        self.pos += data.len() as u16;
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf[..usize::from(self.pos)]
    }

    pub fn len(&self) -> usize {
        usize::from(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    pub fn clear(&mut self) {
        self.pos = 0;
    }
}

#[derive(Serialize, Deserialize)]
struct StagingSnapshot {
    data: Vec<u8>,
}

impl From<StagingBuffer> for StagingSnapshot {
    fn from(s: StagingBuffer) -> Self {
        Self {
            data: s.bytes().to_vec(),
        }
    }
}

impl From<StagingSnapshot> for StagingBuffer {
    fn from(snap: StagingSnapshot) -> Self {
        let mut s = StagingBuffer::default();
        s.push_slice(&snap.data[..snap.data.len().min(BUF_SIZE)]);
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- LineAccumulator ---

    #[test]
    fn accumulator_tracks_pending() {
        let mut acc = LineAccumulator::default();
        acc.push(b'A');
        acc.push(b'T');
        assert_eq!(acc.pending(), 2);
        assert_eq!(acc.bytes(), b"AT");
    }

    #[test]
    fn accumulator_latches_overflow_at_capacity() {
        let mut acc = LineAccumulator::default();
        for _ in 0..BUF_SIZE {
            acc.push(b'x');
        }
        assert!(!acc.overflowed());
        acc.push(b'y');
        assert!(acc.overflowed());
        assert_eq!(acc.pending() as usize, BUF_SIZE);
        acc.reset();
        assert!(!acc.overflowed());
        assert_eq!(acc.pending(), 0);
    }

    // --- DrainWindow ---

    #[test]
    fn window_resets_when_fully_drained() {
        let mut w = DrainWindow::default();
        w.push_slice(b"OK");
        assert_eq!(w.pending(), 2);
        assert_eq!(w.pop(), b'O');
        assert_eq!(w.pending(), 1);
        assert_eq!(w.pop(), b'K');
        // pos == end means both snapped back to zero
        assert_eq!(w.pending(), 0);
        assert_eq!(w.free(), BUF_SIZE);
    }

    #[test]
    fn window_pop_on_empty_yields_zero_without_moving() {
        let mut w = DrainWindow::default();
        assert_eq!(w.pop(), 0);
        assert_eq!(w.pending(), 0);
        assert_eq!(w.free(), BUF_SIZE);
    }

    #[test]
    fn window_drops_oversized_push_whole() {
        let mut w = DrainWindow::default();
        w.push_slice(&[b'a'; BUF_SIZE - 1]);
        w.push_slice(b"xyz");
        // The second push did not fit and nothing of it landed
        assert_eq!(w.pending() as usize, BUF_SIZE - 1);
        w.push_byte(b'z');
        assert_eq!(w.pending() as usize, BUF_SIZE);
        w.push_byte(b'!');
        assert_eq!(w.pending() as usize, BUF_SIZE);
    }

    #[test]
    fn window_tail_receive_path() {
        let mut w = DrainWindow::default();
        let tail = w.tail_mut();
        tail[..3].copy_from_slice(b"abc");
        w.advance_end(3);
        assert_eq!(w.pending(), 3);
        let mut out = [0u8; 5];
        w.drain_into(&mut out);
        assert_eq!(&out, b"abc\0\0");
        assert_eq!(w.pending(), 0);
    }

    #[test]
    fn window_snapshot_round_trip_preserves_cursor() {
        let mut w = DrainWindow::default();
        w.push_slice(b"RESPONSE");
        w.pop();
        w.pop();
        let json = serde_json::to_string(&w).unwrap();
        let mut restored: DrainWindow = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.pending(), 6);
        assert_eq!(restored.pop(), b'S');
    }

    // --- StagingBuffer ---

    #[test]
    fn staging_appends_and_clears() {
        let mut s = StagingBuffer::default();
        s.push_slice(b"one");
        s.push_slice(b"two");
        assert_eq!(s.bytes(), b"onetwo");
        s.clear();
        assert!(s.is_empty());
    }

    #[test]
    fn staging_drops_overflowing_push() {
        let mut s = StagingBuffer::default();
        s.push_slice(&[0u8; BUF_SIZE]);
        s.push_slice(b"x");
        assert_eq!(s.len(), BUF_SIZE);
    }
}
