//! Control frames sent from the ground to the aircraft
//!
//! # Payloads
//!
//! ```text
//! Joystick: [latitude: f64 BE][longitude: f64 BE]   waypoint
//! Throttle: [altitude: f32 BE]                      altitude setpoint
//! ```

use crate::config::protocol::MAX_FRAME_SIZE;
use crate::protocol::packet::{build, Frame, PayloadType};
use crate::telemetry::shared::SharedTargets;
use crate::telemetry::status::Position;
use heapless::Vec;

const WAYPOINT_LEN: usize = 16;
const ALTITUDE_LEN: usize = 4;

/// Control payload errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// Payload size does not match the frame type
    InvalidLength,
    /// Waypoint with a zero latitude or longitude
    NullPosition,
}

/// Navigation targets the flight controller steers towards
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlightTargets {
    pub waypoint: Option<Position>,
    pub altitude_setpoint: Option<f32>,
}

impl FlightTargets {
    pub const fn new() -> Self {
        Self {
            waypoint: None,
            altitude_setpoint: None,
        }
    }
}

/// Decoded control frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlUpdate {
    Waypoint(Position),
    AltitudeSetpoint(f32),
}

impl ControlUpdate {
    /// Interpret a frame; frames of other types yield `Ok(None)`
    pub fn from_frame(frame: &Frame<'_>) -> Result<Option<Self>, ControlError> {
        match frame.payload_type {
            PayloadType::Joystick => {
                let payload: &[u8; WAYPOINT_LEN] = frame
                    .payload
                    .try_into()
                    .map_err(|_| ControlError::InvalidLength)?;
                let mut latitude = [0u8; 8];
                let mut longitude = [0u8; 8];
                latitude.copy_from_slice(&payload[..8]);
                longitude.copy_from_slice(&payload[8..]);

                let position = Position {
                    latitude: f64::from_be_bytes(latitude),
                    longitude: f64::from_be_bytes(longitude),
                };
                // Only reachable by an unset field on the sender's side
                if position.latitude == 0.0 || position.longitude == 0.0 {
                    return Err(ControlError::NullPosition);
                }
                Ok(Some(Self::Waypoint(position)))
            }
            PayloadType::Throttle => {
                let payload: [u8; ALTITUDE_LEN] = frame
                    .payload
                    .try_into()
                    .map_err(|_| ControlError::InvalidLength)?;
                Ok(Some(Self::AltitudeSetpoint(f32::from_be_bytes(payload))))
            }
            _ => Ok(None),
        }
    }

    /// Frame the update for transmission
    pub fn encode(&self) -> Vec<u8, MAX_FRAME_SIZE> {
        match self {
            Self::Waypoint(position) => {
                let mut payload = [0u8; WAYPOINT_LEN];
                payload[..8].copy_from_slice(&position.latitude.to_be_bytes());
                payload[8..].copy_from_slice(&position.longitude.to_be_bytes());
                build(PayloadType::Joystick, &payload)
            }
            Self::AltitudeSetpoint(altitude) => {
                build(PayloadType::Throttle, &altitude.to_be_bytes())
            }
        }
    }

    /// Store the update in the shared targets
    pub fn apply(&self, targets: &SharedTargets) {
        targets.update(|current| match *self {
            Self::Waypoint(position) => current.waypoint = Some(position),
            Self::AltitudeSetpoint(altitude) => current.altitude_setpoint = Some(altitude),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::decode;
    use crate::telemetry::shared::Shared;

    #[test]
    fn test_waypoint_frame() {
        let update = ControlUpdate::Waypoint(Position {
            latitude: 50.1,
            longitude: 14.4,
        });
        let frame = update.encode();

        assert_eq!(frame[0], 18);
        assert_eq!(frame[1], PayloadType::Joystick as u8);
        assert_eq!(&frame[2..10], &50.1f64.to_be_bytes());

        let decoded = ControlUpdate::from_frame(&decode(&frame).unwrap()).unwrap();
        assert_eq!(decoded, Some(update));
    }

    #[test]
    fn test_altitude_frame() {
        let frame = ControlUpdate::AltitudeSetpoint(85.0).encode();
        assert_eq!(frame.as_slice(), &[6, 4, 0x42, 0xAA, 0x00, 0x00]);

        let decoded = ControlUpdate::from_frame(&decode(&frame).unwrap()).unwrap();
        assert_eq!(decoded, Some(ControlUpdate::AltitudeSetpoint(85.0)));
    }

    #[test]
    fn test_null_position_rejected() {
        let frame = ControlUpdate::Waypoint(Position {
            latitude: 0.0,
            longitude: 14.4,
        })
        .encode();

        let result = ControlUpdate::from_frame(&decode(&frame).unwrap());
        assert_eq!(result, Err(ControlError::NullPosition));
    }

    #[test]
    fn test_wrong_payload_length() {
        let frame = Frame {
            payload_type: PayloadType::Throttle,
            payload: &[0x42, 0xAA],
        };
        assert_eq!(
            ControlUpdate::from_frame(&frame),
            Err(ControlError::InvalidLength)
        );
    }

    #[test]
    fn test_other_frames_ignored() {
        let frame = Frame {
            payload_type: PayloadType::Bulk,
            payload: &[1, 2, 3],
        };
        assert_eq!(ControlUpdate::from_frame(&frame), Ok(None));
    }

    #[test]
    fn test_apply_updates_targets() {
        let targets = Shared::new(FlightTargets::new());

        ControlUpdate::AltitudeSetpoint(120.0).apply(&targets);
        ControlUpdate::Waypoint(Position {
            latitude: 50.1,
            longitude: 14.4,
        })
        .apply(&targets);

        let snapshot = targets.snapshot();
        assert_eq!(snapshot.altitude_setpoint, Some(120.0));
        assert_eq!(snapshot.waypoint.map(|p| p.latitude), Some(50.1));
    }
}
