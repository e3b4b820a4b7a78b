//! Length-prefixed packet framing
//!
//! # Wire Format
//!
//! ```text
//! [length: u8][type: u8][payload: [u8; length - 2]]
//! ```
//!
//! The length byte counts itself and the type byte. The same frame is used
//! on the radio and on the serial link, so a relay forwards it untouched.

use crate::config::protocol::{HEADER_LEN, MAX_ERROR_TEXT, MAX_FRAME_SIZE};
use core::fmt::{Debug, Write};
use heapless::{String, Vec};

/// Largest payload a frame can carry
pub const MAX_FRAME_PAYLOAD: usize = MAX_FRAME_SIZE - HEADER_LEN;

/// Kind of payload carried by a frame
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    /// UTF-8 error report
    Error = 0,
    /// Telemetry record
    Bulk = 1,
    /// Signal strength of the last received packet, i16 BE
    Rssi = 2,
    /// Waypoint update
    Joystick = 3,
    /// Altitude setpoint update
    Throttle = 4,
}

impl PayloadType {
    /// Try to convert a byte to a PayloadType
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Error),
            1 => Some(Self::Bulk),
            2 => Some(Self::Rssi),
            3 => Some(Self::Joystick),
            4 => Some(Self::Throttle),
            _ => None,
        }
    }
}

/// Framing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Zero-length input
    EmptyPacket,
    /// Declared length disagrees with the bytes present
    MalformedPacket,
    /// Type byte outside the known payload types
    UnknownType(u8),
    /// Payload does not fit behind a one-byte length
    PayloadTooLarge,
}

/// Decoded frame borrowing its payload from the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub payload_type: PayloadType,
    pub payload: &'a [u8],
}

/// Frame a payload
pub fn encode(
    payload_type: PayloadType,
    payload: &[u8],
) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(FrameError::PayloadTooLarge);
    }
    Ok(build(payload_type, payload))
}

/// Unframe a complete packet
///
/// The packet must hold exactly one frame: trailing or missing bytes are
/// reported as `MalformedPacket`.
pub fn decode(packet: &[u8]) -> Result<Frame<'_>, FrameError> {
    let (&length, rest) = packet.split_first().ok_or(FrameError::EmptyPacket)?;

    if length as usize != packet.len() || packet.len() < HEADER_LEN {
        return Err(FrameError::MalformedPacket);
    }

    let payload_type = PayloadType::from_byte(rest[0]).ok_or(FrameError::UnknownType(rest[0]))?;

    Ok(Frame {
        payload_type,
        payload: &rest[1..],
    })
}

/// Error frame with the text `error while <context>: <error>`
///
/// Text beyond the error buffer is cut off.
pub fn error_frame(context: &str, error: &impl Debug) -> Vec<u8, MAX_FRAME_SIZE> {
    let mut text: String<MAX_ERROR_TEXT> = String::new();
    let _ = write!(text, "error while {}: {:?}", context, error);
    build(PayloadType::Error, text.as_bytes())
}

/// Rssi frame for a packet received at `rssi` dBm
pub fn rssi_frame(rssi: i16) -> Vec<u8, MAX_FRAME_SIZE> {
    build(PayloadType::Rssi, &rssi.to_be_bytes())
}

/// Build a frame whose payload is known to fit
pub(crate) fn build(payload_type: PayloadType, payload: &[u8]) -> Vec<u8, MAX_FRAME_SIZE> {
    let payload = &payload[..payload.len().min(MAX_FRAME_PAYLOAD)];
    let mut frame = Vec::new();
    let _ = frame.push((payload.len() + HEADER_LEN) as u8);
    let _ = frame.push(payload_type as u8);
    let _ = frame.extend_from_slice(payload);
    frame
}
