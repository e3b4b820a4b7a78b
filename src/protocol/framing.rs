//! Frame accumulator for length-prefixed packets on a byte stream
//!
//! Accumulates bytes until the count announced by the leading length byte
//! has arrived.

use crate::config::protocol::{HEADER_LEN, MAX_FRAME_SIZE};
use heapless::Vec;

/// Accumulates incoming bytes and extracts complete frames.
///
/// The first byte of every frame is its total length. A length byte too
/// small to cover the header cannot start a frame and is skipped, which
/// lets the accumulator fall back into step after line noise.
pub struct FrameAccumulator {
    buffer: Vec<u8, MAX_FRAME_SIZE>,
}

impl FrameAccumulator {
    /// Create a new empty frame accumulator.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Push a byte into the accumulator.
    ///
    /// Returns `Some(frame)` once the announced length has been received.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8, MAX_FRAME_SIZE>> {
        if self.buffer.is_empty() && (byte as usize) < HEADER_LEN {
            log::trace!("Frame: skipping invalid length byte {}", byte);
            return None;
        }

        // Capacity covers the largest length a byte can announce
        let _ = self.buffer.push(byte);

        if self.buffer.len() == self.buffer[0] as usize {
            return Some(core::mem::take(&mut self.buffer));
        }

        None
    }

    /// Reset the accumulator, discarding any partial frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Returns true if the buffer is empty (no partial frame in progress).
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the current number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
