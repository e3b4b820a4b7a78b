//! LoRa modem parameters and their register encodings
//!
//! The parameter domains are small and closed, so each one maps to its
//! register bits through a fixed table that is searched in both directions.

use crate::config::lora_defaults;
use crate::lora::registers::field;
use crate::lora::traits::ConfigError;
use core::fmt;

/// Crystal frequency of the SX127x reference oscillator
pub const FXOSC_HZ: u64 = 32_000_000;

/// Largest value of the 10-bit symbol timeout field
pub const MAX_SYMBOL_TIMEOUT: u16 = 0x3FF;

/// Signal bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bandwidth {
    Khz125,
    Khz250,
    Khz500,
}

/// (bandwidth, Hz, RegModemConfig1 bits 7:4)
const BANDWIDTH_TABLE: [(Bandwidth, u32, u8); 3] = [
    (Bandwidth::Khz125, 125_000, 0x70),
    (Bandwidth::Khz250, 250_000, 0x80),
    (Bandwidth::Khz500, 500_000, 0x90),
];

impl Bandwidth {
    pub fn from_hz(hz: u32) -> Result<Self, ConfigError> {
        BANDWIDTH_TABLE
            .iter()
            .find(|(_, table_hz, _)| *table_hz == hz)
            .map(|(bw, _, _)| *bw)
            .ok_or(ConfigError::Bandwidth)
    }

    pub fn hz(self) -> u32 {
        self.entry().1
    }

    pub fn register_bits(self) -> u8 {
        self.entry().2
    }

    /// Reverse lookup from RegModemConfig1; other bits are ignored
    pub fn from_register(value: u8) -> Option<Self> {
        let bits = value & field::BANDWIDTH_MASK;
        BANDWIDTH_TABLE
            .iter()
            .find(|(_, _, table_bits)| *table_bits == bits)
            .map(|(bw, _, _)| *bw)
    }

    fn entry(self) -> (Bandwidth, u32, u8) {
        BANDWIDTH_TABLE[self as usize]
    }
}

/// Forward error correction rate 4/x
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingRate {
    Cr4_5,
    Cr4_6,
    Cr4_7,
    Cr4_8,
}

/// (coding rate, denominator, RegModemConfig1 bits 3:1, label)
const CODING_RATE_TABLE: [(CodingRate, u8, u8, &str); 4] = [
    (CodingRate::Cr4_5, 5, 0x02, "4/5"),
    (CodingRate::Cr4_6, 6, 0x04, "4/6"),
    (CodingRate::Cr4_7, 7, 0x06, "4/7"),
    (CodingRate::Cr4_8, 8, 0x08, "4/8"),
];

impl CodingRate {
    /// Build from the denominator of 4/x
    pub fn from_denominator(denominator: u8) -> Result<Self, ConfigError> {
        CODING_RATE_TABLE
            .iter()
            .find(|entry| entry.1 == denominator)
            .map(|entry| entry.0)
            .ok_or(ConfigError::CodingRate)
    }

    pub fn denominator(self) -> u8 {
        CODING_RATE_TABLE[self as usize].1
    }

    pub fn register_bits(self) -> u8 {
        CODING_RATE_TABLE[self as usize].2
    }

    pub fn label(self) -> &'static str {
        CODING_RATE_TABLE[self as usize].3
    }

    /// Reverse lookup from RegModemConfig1; other bits are ignored
    pub fn from_register(value: u8) -> Option<Self> {
        let bits = value & field::CODING_RATE_MASK;
        CODING_RATE_TABLE
            .iter()
            .find(|entry| entry.2 == bits)
            .map(|entry| entry.0)
    }
}

impl fmt::Display for CodingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Spreading factor, 6..=12
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpreadingFactor(u8);

impl SpreadingFactor {
    pub fn new(sf: u8) -> Result<Self, ConfigError> {
        if (6..=12).contains(&sf) {
            Ok(Self(sf))
        } else {
            Err(ConfigError::SpreadingFactor)
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// RegModemConfig2 bits 7:4
    pub fn register_bits(self) -> u8 {
        self.0 << 4
    }

    /// Raw spreading factor field of RegModemConfig2
    pub fn from_register(value: u8) -> u8 {
        (value & field::SPREADING_FACTOR_MASK) >> 4
    }
}

/// LNA gain, G1 being the highest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LnaGain {
    G1,
    G2,
    G3,
    G4,
    G5,
}

const LNA_GAIN_TABLE: [LnaGain; 5] = [
    LnaGain::G1,
    LnaGain::G2,
    LnaGain::G3,
    LnaGain::G4,
    LnaGain::G5,
];

impl LnaGain {
    /// Build from the gain level number, 1..=5
    pub fn from_level(level: u8) -> Result<Self, ConfigError> {
        match level {
            1..=5 => Ok(LNA_GAIN_TABLE[level as usize - 1]),
            _ => Err(ConfigError::LnaGain),
        }
    }

    pub fn level(self) -> u8 {
        self as u8 + 1
    }

    /// RegLna bits 7:5
    pub fn register_bits(self) -> u8 {
        self.level() << 5
    }
}

/// Complete modem configuration
///
/// Held by the driver as a single value so the fields used to derive the
/// symbol timeout always match what was written to the chip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModemConfig {
    pub frequency_hz: u32,
    pub bandwidth: Bandwidth,
    pub coding_rate: CodingRate,
    pub spreading_factor: SpreadingFactor,
    pub crc_enabled: bool,
    pub low_data_rate_optimize: bool,
    pub agc_enabled: bool,
    pub lna_gain: LnaGain,
    /// LNA boost, 0..=3
    pub lna_boost: u8,
    pub preamble_length: u16,
    pub sync_word: u8,
    /// Receive timeout in symbols, 10 bits
    pub symbol_timeout: u16,
}

impl Default for ModemConfig {
    fn default() -> Self {
        let mut config = Self {
            frequency_hz: lora_defaults::FREQUENCY_HZ,
            bandwidth: Bandwidth::from_hz(lora_defaults::BANDWIDTH_HZ)
                .unwrap_or(Bandwidth::Khz125),
            coding_rate: CodingRate::from_denominator(lora_defaults::CODING_RATE)
                .unwrap_or(CodingRate::Cr4_5),
            spreading_factor: SpreadingFactor::new(lora_defaults::SPREADING_FACTOR)
                .unwrap_or(SpreadingFactor(7)),
            crc_enabled: true,
            low_data_rate_optimize: false,
            agc_enabled: true,
            lna_gain: LnaGain::G3,
            lna_boost: 1,
            preamble_length: lora_defaults::PREAMBLE_LENGTH,
            sync_word: lora_defaults::SYNC_WORD,
            symbol_timeout: 0,
        };
        config.symbol_timeout = config.symbol_timeout_for(lora_defaults::RX_TIMEOUT_MS);
        config
    }
}

impl ModemConfig {
    /// Symbol duration Ts = 2^SF / BW, in microseconds
    pub fn symbol_duration_us(&self) -> u32 {
        ((1_000_000u64 << self.spreading_factor.value()) / self.bandwidth.hz() as u64) as u32
    }

    /// Symbols covering `timeout_ms`, rounded up and clamped to the 10-bit field
    pub fn symbol_timeout_for(&self, timeout_ms: u32) -> u16 {
        // ceil((t / 1000) / (2^SF / BW)) = ceil(t * BW / (1000 * 2^SF))
        let numerator = timeout_ms as u64 * self.bandwidth.hz() as u64;
        let denominator = 1000u64 << self.spreading_factor.value();
        let symbols = numerator.div_ceil(denominator);
        symbols.min(MAX_SYMBOL_TIMEOUT as u64) as u16
    }
}

/// 24-bit FRF register value for a carrier frequency
pub fn frf_from_hz(hz: u32) -> u32 {
    ((hz as u64 * (1 << 19)) / FXOSC_HZ) as u32
}

/// Carrier frequency for a 24-bit FRF register value
pub fn hz_from_frf(frf: u32) -> u32 {
    ((frf as u64 * FXOSC_HZ) >> 19) as u32
}

/// Semantic read-back of the modem registers, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub frequency_hz: u32,
    /// `None` when the register holds a bandwidth this driver never writes
    pub bandwidth: Option<Bandwidth>,
    pub spreading_factor: u8,
    pub coding_rate: Option<CodingRate>,
    pub sync_word: u8,
    pub preamble_length: u16,
    pub crc_enabled: bool,
    pub low_data_rate_optimize: bool,
    pub lna_gain: u8,
    pub lna_boost: u8,
}

impl fmt::Display for ConfigSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Freq:{}|BW:{}|SF:{}|CR:",
            self.frequency_hz,
            self.bandwidth.map(Bandwidth::hz).unwrap_or(0),
            self.spreading_factor
        )?;
        match self.coding_rate {
            Some(cr) => write!(f, "{}", cr)?,
            None => f.write_str("?")?,
        }
        write!(
            f,
            "|SW:0x{:02X}|PL:{}|CRC:{}|LDRO:{}|LNA:{}/{}",
            self.sync_word,
            self.preamble_length,
            self.crc_enabled,
            self.low_data_rate_optimize,
            self.lna_gain,
            self.lna_boost
        )
    }
}
