//! SX127x register map (LoRa mode, silicon revision 0x12)
//!
//! Addresses and bit layouts follow the SX1276/77/78 datasheet. Only one
//! revision is supported; the symbol-timeout LSB lives at 0x1F and the
//! preamble length at 0x20/0x21.

/// Register addresses
pub mod reg {
    pub const FIFO: u8 = 0x00;
    pub const OP_MODE: u8 = 0x01;
    pub const FRF_MSB: u8 = 0x06;
    pub const FRF_MID: u8 = 0x07;
    pub const FRF_LSB: u8 = 0x08;
    pub const PA_CONFIG: u8 = 0x09;
    pub const OCP: u8 = 0x0B;
    pub const LNA: u8 = 0x0C;
    pub const FIFO_ADDR_PTR: u8 = 0x0D;
    pub const FIFO_TX_BASE_ADDR: u8 = 0x0E;
    pub const FIFO_RX_BASE_ADDR: u8 = 0x0F;
    pub const FIFO_RX_CURRENT_ADDR: u8 = 0x10;
    pub const IRQ_FLAGS: u8 = 0x12;
    pub const RX_NB_BYTES: u8 = 0x13;
    pub const PKT_RSSI_VALUE: u8 = 0x1A;
    pub const MODEM_CONFIG_1: u8 = 0x1D;
    pub const MODEM_CONFIG_2: u8 = 0x1E;
    pub const SYMB_TIMEOUT_LSB: u8 = 0x1F;
    pub const PREAMBLE_MSB: u8 = 0x20;
    pub const PREAMBLE_LSB: u8 = 0x21;
    pub const PAYLOAD_LENGTH: u8 = 0x22;
    pub const MAX_PAYLOAD_LENGTH: u8 = 0x23;
    pub const MODEM_CONFIG_3: u8 = 0x26;
    pub const SYNC_WORD: u8 = 0x39;
    pub const DIO_MAPPING_1: u8 = 0x40;
    pub const VERSION: u8 = 0x42;
}

/// Expected content of RegVersion
pub const CHIP_VERSION: u8 = 0x12;

/// Bit 7 of RegOpMode selects LoRa (long range) mode
pub const LONG_RANGE_MODE: u8 = 0x80;

/// Write marker set in the address byte of a write transaction
pub const WRITE_FLAG: u8 = 0x80;

/// IRQ flag bits of RegIrqFlags (write 1 to clear)
pub mod irq {
    pub const RX_TIMEOUT: u8 = 0x80;
    pub const RX_DONE: u8 = 0x40;
    pub const PAYLOAD_CRC_ERROR: u8 = 0x20;
    pub const VALID_HEADER: u8 = 0x10;
    pub const TX_DONE: u8 = 0x08;
    pub const CAD_DONE: u8 = 0x04;
    pub const FHSS_CHANGE_CHANNEL: u8 = 0x02;
    pub const CAD_DETECTED: u8 = 0x01;
    pub const ALL: u8 = 0xFF;
}

/// DIO0 function (bits 7:6 of RegDioMapping1)
pub mod dio0 {
    pub const RX_DONE: u8 = 0x00;
    pub const TX_DONE: u8 = 0x40;
    pub const CAD_DONE: u8 = 0x80;
}

/// Bit fields of the modem configuration registers
pub mod field {
    /// RegModemConfig1: bandwidth in bits 7:4
    pub const BANDWIDTH_MASK: u8 = 0xF0;
    /// RegModemConfig1: coding rate in bits 3:1
    pub const CODING_RATE_MASK: u8 = 0x0E;
    /// RegModemConfig2: spreading factor in bits 7:4
    pub const SPREADING_FACTOR_MASK: u8 = 0xF0;
    /// RegModemConfig2: payload CRC on
    pub const RX_PAYLOAD_CRC_ON: u8 = 0x04;
    /// RegModemConfig2: symbol timeout bits 9:8 (bit 2 belongs to the CRC flag)
    pub const SYMB_TIMEOUT_MSB_MASK: u8 = 0x03;
    /// RegModemConfig3: low data rate optimize
    pub const LOW_DATA_RATE_OPTIMIZE: u8 = 0x08;
    /// RegModemConfig3: LNA gain set by the internal AGC loop
    pub const AGC_AUTO_ON: u8 = 0x04;
    /// RegLna: gain in bits 7:5
    pub const LNA_GAIN_MASK: u8 = 0xE0;
    /// RegLna: high-frequency boost in bits 1:0
    pub const LNA_BOOST_MASK: u8 = 0x03;
    /// RegOcp: over-current protection on
    pub const OCP_ON: u8 = 0x20;
    /// RegOcp: trim for 100 mA
    pub const OCP_TRIM_100MA: u8 = 0x0B;
    /// RegPaConfig: PA_BOOST output select
    pub const PA_SELECT: u8 = 0x80;
    /// RegDioMapping1: DIO0 function in bits 7:6
    pub const DIO0_MASK: u8 = 0xC0;
    /// RegOcp: trim in bits 4:0
    pub const OCP_TRIM_MASK: u8 = 0x1F;
}

/// Transceiver operating modes (bits 2:0 of RegOpMode)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    Sleep = 0x00,
    Standby = 0x01,
    FsTx = 0x02,
    Tx = 0x03,
    FsRx = 0x04,
    RxContinuous = 0x05,
    RxSingle = 0x06,
    Cad = 0x07,
}

impl RadioMode {
    /// Value written to RegOpMode, LoRa bit included
    pub fn op_mode(self) -> u8 {
        LONG_RANGE_MODE | self as u8
    }

    /// Decode the mode bits of RegOpMode
    pub fn from_op_mode(value: u8) -> Self {
        match value & 0x07 {
            0x00 => Self::Sleep,
            0x01 => Self::Standby,
            0x02 => Self::FsTx,
            0x03 => Self::Tx,
            0x04 => Self::FsRx,
            0x05 => Self::RxContinuous,
            0x06 => Self::RxSingle,
            _ => Self::Cad,
        }
    }
}
