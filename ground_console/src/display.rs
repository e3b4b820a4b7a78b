//! Rendering of frames received from the relay.

use colored::Colorize;

use picofly_link::protocol::{decode, ControlUpdate, Frame, PayloadType};
use picofly_link::telemetry::status::{COMPACT_LEN, EXTENDED_LEN};
use picofly_link::telemetry::TelemetryStatus;

/// One line of human-readable output for a frame
pub fn describe(frame: &Frame<'_>) -> String {
    match frame.payload_type {
        PayloadType::Bulk => match decode_telemetry(frame.payload) {
            Some(status) => describe_telemetry(&status),
            None => format!("telemetry: unreadable record {:02x?}", frame.payload),
        },
        PayloadType::Rssi => match <[u8; 2]>::try_from(frame.payload) {
            Ok(bytes) => format!("rssi: {} dBm", i16::from_be_bytes(bytes)),
            Err(_) => format!("rssi: bad payload {:02x?}", frame.payload),
        },
        PayloadType::Error => {
            format!("relay error: {}", String::from_utf8_lossy(frame.payload))
        }
        PayloadType::Joystick | PayloadType::Throttle => match ControlUpdate::from_frame(frame) {
            Ok(Some(update)) => format!("control: {:?}", update),
            Ok(None) => format!("control: {:02x?}", frame.payload),
            Err(e) => format!("control: rejected ({:?})", e),
        },
    }
}

/// Bulk records come in either width
fn decode_telemetry(payload: &[u8]) -> Option<TelemetryStatus> {
    match payload.len() {
        EXTENDED_LEN => TelemetryStatus::from_extended(payload).ok(),
        COMPACT_LEN => TelemetryStatus::from_compact(payload).ok(),
        _ => None,
    }
}

fn describe_telemetry(status: &TelemetryStatus) -> String {
    let position = match status.position {
        Some(p) => format!("{:.6}, {:.6}", p.latitude, p.longitude),
        None => "no fix".to_string(),
    };
    format!(
        "telemetry: {:?} | battery {:.1}% | alt {:.1} m | speed {:.1} m/s | {}",
        status.status, status.battery, status.altitude, status.speed, position
    )
}

/// Print a raw frame from the serial link
pub fn print_frame(raw: &[u8]) {
    match decode(raw) {
        Ok(frame) => {
            let line = describe(&frame);
            match frame.payload_type {
                PayloadType::Bulk => println!("{}", line.green()),
                PayloadType::Rssi => println!("{}", line.dimmed()),
                PayloadType::Error => println!("{}", line.red()),
                PayloadType::Joystick | PayloadType::Throttle => println!("{}", line.cyan()),
            }
        }
        Err(e) => println!("{} {:?} {:02x?}", "noise:".yellow(), e, raw),
    }
}
