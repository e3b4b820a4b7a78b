//! Hardware configuration constants for the ESP32-S3 with an SX1278 (Ra-02) module

/// SPI pins for LoRa module
pub mod spi {
    pub const SCLK: u8 = 7;
    pub const MISO: u8 = 8;
    pub const MOSI: u8 = 9;
    /// The SX127x accepts up to 10 MHz on its SPI port
    pub const FREQUENCY_MHZ: u32 = 10;
}

/// LoRa control pins
pub mod lora_pins {
    pub const NSS: u8 = 41;
    pub const NRST: u8 = 42;
    pub const DIO0: u8 = 39;
}

/// Default LoRa configuration
pub mod lora_defaults {
    /// 70 cm ISM band
    pub const FREQUENCY_HZ: u32 = 433_360_000;
    pub const BANDWIDTH_HZ: u32 = 125_000;
    pub const SPREADING_FACTOR: u8 = 7;
    /// Coding rate 4/5
    pub const CODING_RATE: u8 = 5;
    pub const PREAMBLE_LENGTH: u16 = 8;
    /// Private network sync word (chip reset value)
    pub const SYNC_WORD: u8 = 0x12;
    pub const RX_TIMEOUT_MS: u32 = 250;
    /// PA_BOOST output, MaxPower 0, OutputPower 9
    pub const PA_BOOST: bool = true;
    pub const MAX_POWER: u8 = 0;
    pub const OUTPUT_POWER: u8 = 9;
}

/// FIFO layout: TX takes the lower half, RX the upper half
pub mod fifo {
    pub const TX_BASE_ADDR: u8 = 0x00;
    pub const RX_BASE_ADDR: u8 = 0x80;
    /// Largest payload that fits in one half of the 256-byte FIFO
    pub const MAX_PAYLOAD: usize = 127;
}

/// Timing constants
pub mod timing {
    /// Reset line is held low, then high, for this long
    pub const RESET_PULSE_MS: u32 = 10;
    /// IRQ flag polling interval
    pub const POLL_INTERVAL_MS: u32 = 5;
    /// Deadline for a single transmission to complete
    pub const TX_TIMEOUT_MS: u32 = 2_000;
    /// Receive window opened after every telemetry transmission
    pub const RX_WINDOW_MS: u32 = 800;
    /// Pause between sensor fixes
    pub const FIX_INTERVAL_MS: u32 = 200;
    /// Pause after a radio error that is not a timeout
    pub const ERROR_BACKOFF_MS: u32 = 500;
    /// Link statistics are logged once every this many cycles
    pub const STATS_LOG_CYCLES: u32 = 100;
}

/// Serial configuration
pub mod serial {
    pub const BAUD_RATE: u32 = 115200;
    pub const READ_CHUNK: usize = 64;
}

/// Protocol constants
pub mod protocol {
    /// Bytes taken by the length and type header
    pub const HEADER_LEN: usize = 2;

    /// Largest frame the one-byte length field can describe
    pub const MAX_FRAME_SIZE: usize = 255;

    /// Largest buffer handed to the radio on receive
    pub const MAX_PACKET_SIZE: usize = 256;

    /// Capacity of formatted error text
    pub const MAX_ERROR_TEXT: usize = 96;
}
