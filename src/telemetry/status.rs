//! Telemetry status record and its fixed-width codec
//!
//! # Layouts
//!
//! All fields are big-endian. Floats use their IEEE-754 bit patterns.
//!
//! ```text
//! compact  (11): [status: u8][battery: u16][speed: f32][altitude: f32]
//! extended (29): [status: u8][battery: u32][speed: f32][altitude: f32]
//!                [latitude: f64][longitude: f64]
//! ```
//!
//! Battery percentage is clamped to [0, 100] and scaled onto the full range
//! of its unsigned field, rounding to nearest.

/// Size of the compact record
pub const COMPACT_LEN: usize = 11;

/// Size of the extended record
pub const EXTENDED_LEN: usize = 29;

/// Flight phase reported by the aircraft
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlightStatus {
    #[default]
    None = 0,
    Idle = 1,
    ReadyForTakeoff = 2,
    Flying = 3,
    Circling = 4,
    Landing = 5,
}

impl FlightStatus {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Idle),
            2 => Some(Self::ReadyForTakeoff),
            3 => Some(Self::Flying),
            4 => Some(Self::Circling),
            5 => Some(Self::Landing),
            _ => None,
        }
    }
}

/// Status codec errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer size does not match the layout
    InvalidLength { expected: usize, actual: usize },
    /// Status byte outside the known flight phases
    UnknownStatus(u8),
}

/// Geographic position in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// Telemetry record shared between the sensor and link tasks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryStatus {
    pub status: FlightStatus,
    /// Battery charge in percent
    pub battery: f32,
    pub speed: f32,
    pub altitude: f32,
    /// `None` until the first fix; sent as 0.0/0.0 in the extended record
    pub position: Option<Position>,
}

impl TelemetryStatus {
    pub const fn new() -> Self {
        Self {
            status: FlightStatus::None,
            battery: 0.0,
            speed: 0.0,
            altitude: 0.0,
            position: None,
        }
    }

    /// Encode without position, 2-byte battery
    pub fn to_compact(&self) -> [u8; COMPACT_LEN] {
        let mut buf = [0u8; COMPACT_LEN];
        buf[0] = self.status as u8;
        buf[1..3].copy_from_slice(&battery_to_u16(self.battery).to_be_bytes());
        buf[3..7].copy_from_slice(&self.speed.to_be_bytes());
        buf[7..11].copy_from_slice(&self.altitude.to_be_bytes());
        buf
    }

    /// Encode with position, 4-byte battery
    pub fn to_extended(&self) -> [u8; EXTENDED_LEN] {
        let position = self.position.unwrap_or(Position {
            latitude: 0.0,
            longitude: 0.0,
        });

        let mut buf = [0u8; EXTENDED_LEN];
        buf[0] = self.status as u8;
        buf[1..5].copy_from_slice(&battery_to_u32(self.battery).to_be_bytes());
        buf[5..9].copy_from_slice(&self.speed.to_be_bytes());
        buf[9..13].copy_from_slice(&self.altitude.to_be_bytes());
        buf[13..21].copy_from_slice(&position.latitude.to_be_bytes());
        buf[21..29].copy_from_slice(&position.longitude.to_be_bytes());
        buf
    }

    pub fn from_compact(buf: &[u8]) -> Result<Self, CodecError> {
        check_length(buf, COMPACT_LEN)?;
        Ok(Self {
            status: status_from_byte(buf[0])?,
            battery: battery_from_u16(u16::from_be_bytes([buf[1], buf[2]])),
            speed: f32::from_be_bytes(be_array(&buf[3..7])),
            altitude: f32::from_be_bytes(be_array(&buf[7..11])),
            position: None,
        })
    }

    /// Decode an extended record; a 0.0/0.0 position reads back as `None`
    pub fn from_extended(buf: &[u8]) -> Result<Self, CodecError> {
        check_length(buf, EXTENDED_LEN)?;

        let latitude = f64::from_be_bytes(be_array(&buf[13..21]));
        let longitude = f64::from_be_bytes(be_array(&buf[21..29]));
        let position = (latitude != 0.0 || longitude != 0.0).then_some(Position {
            latitude,
            longitude,
        });

        Ok(Self {
            status: status_from_byte(buf[0])?,
            battery: battery_from_u32(u32::from_be_bytes(be_array(&buf[1..5]))),
            speed: f32::from_be_bytes(be_array(&buf[5..9])),
            altitude: f32::from_be_bytes(be_array(&buf[9..13])),
            position,
        })
    }
}

impl Default for TelemetryStatus {
    fn default() -> Self {
        Self::new()
    }
}

fn check_length(buf: &[u8], expected: usize) -> Result<(), CodecError> {
    if buf.len() != expected {
        return Err(CodecError::InvalidLength {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

fn status_from_byte(byte: u8) -> Result<FlightStatus, CodecError> {
    FlightStatus::from_byte(byte).ok_or(CodecError::UnknownStatus(byte))
}

/// Copy a slice whose length the caller has already checked
fn be_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut array = [0u8; N];
    array.copy_from_slice(bytes);
    array
}

fn scale_percentage(percent: f32, max: f64) -> f64 {
    // NaN fails both comparisons and ends up as 0
    let clamped = if percent > 100.0 {
        100.0
    } else if percent > 0.0 {
        percent as f64
    } else {
        0.0
    };
    clamped / 100.0 * max + 0.5
}

pub fn battery_to_u16(percent: f32) -> u16 {
    scale_percentage(percent, u16::MAX as f64) as u16
}

pub fn battery_from_u16(raw: u16) -> f32 {
    (raw as f64 / u16::MAX as f64 * 100.0) as f32
}

pub fn battery_to_u32(percent: f32) -> u32 {
    scale_percentage(percent, u32::MAX as f64) as u32
}

pub fn battery_from_u32(raw: u32) -> f32 {
    (raw as f64 / u32::MAX as f64 * 100.0) as f32
}
