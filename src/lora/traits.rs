//! LoRa radio trait for abstraction and testability
//!
//! This trait defines the half-duplex operations the telemetry and relay
//! tasks need, allowing the SX127x driver to be swapped with a mock for testing.

use crate::config::protocol::MAX_PACKET_SIZE;
use core::future::Future;
use heapless::Vec;

/// Rejected modem parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Bandwidth other than 125, 250 or 500 kHz
    Bandwidth,
    /// Coding rate other than 4/5..4/8
    CodingRate,
    /// Spreading factor outside 6..=12
    SpreadingFactor,
    /// LNA gain level outside G1..=G5
    LnaGain,
    /// LNA boost outside 0..=3
    LnaBoost,
    /// PA max power above 7 or output power above 15
    TxPower,
}

/// Errors that can occur during LoRa operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoraError {
    /// SPI transaction failed
    Bus,
    /// Chip-select, reset or DIO line could not be driven or read
    Pin,
    /// Unsupported modem parameter, rejected before any register write
    Configuration(ConfigError),
    /// RegVersion did not hold the expected chip ID
    DeviceNotFound { version: u8 },
    /// TxDone did not latch before the deadline
    TransmitTimeout,
    /// No packet before the deadline, or the chip reported RxTimeout
    ReceiveTimeout,
    /// Received packet failed its payload CRC
    CrcError,
    /// Payload does not fit in the TX half of the FIFO
    PayloadTooLarge,
    /// Chip holds more bytes than the caller accepts
    PacketTooLarge { length: u8 },
}

impl LoraError {
    /// Whether a link loop may log the error and carry on with the next cycle
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LoraError::TransmitTimeout
                | LoraError::ReceiveTimeout
                | LoraError::CrcError
                | LoraError::PayloadTooLarge
                | LoraError::PacketTooLarge { .. }
        )
    }
}

impl From<ConfigError> for LoraError {
    fn from(error: ConfigError) -> Self {
        LoraError::Configuration(error)
    }
}

/// Received packet with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct RxPacket {
    /// Bytes streamed out of the FIFO
    pub data: Vec<u8, MAX_PACKET_SIZE>,
    /// Packet RSSI in dBm
    pub rssi: i16,
}

/// Abstract LoRa radio interface for testability
///
/// The radio is half-duplex: callers hold it exclusively and never issue a
/// transmit and a receive at the same time. After any error the mode of the
/// transceiver is unknown and the caller should call [`LoraRadio::set_standby`].
pub trait LoraRadio {
    /// Transmit a payload, waiting at most `timeout_ms` for TxDone
    fn transmit(&mut self, payload: &[u8], timeout_ms: u32)
        -> impl Future<Output = Result<(), LoraError>>;

    /// Listen for a single packet of at most `max_len` bytes
    fn receive(
        &mut self,
        max_len: usize,
        timeout_ms: u32,
    ) -> impl Future<Output = Result<RxPacket, LoraError>>;

    /// Set the radio to standby mode
    fn set_standby(&mut self) -> impl Future<Output = Result<(), LoraError>>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(LoraError::TransmitTimeout.is_recoverable());
        assert!(LoraError::ReceiveTimeout.is_recoverable());
        assert!(LoraError::CrcError.is_recoverable());
        assert!(LoraError::PacketTooLarge { length: 200 }.is_recoverable());

        assert!(!LoraError::Bus.is_recoverable());
        assert!(!LoraError::DeviceNotFound { version: 0 }.is_recoverable());
        assert!(!LoraError::Configuration(ConfigError::Bandwidth).is_recoverable());
    }
}
