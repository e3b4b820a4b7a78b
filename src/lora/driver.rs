//! SX127x LoRa driver
//!
//! Drives an SX1276/77/78 through its register interface to implement the
//! LoraRadio trait. Register access, completion waiting and timing are all
//! injected, so the driver runs unchanged against the simulated chip in tests.

use crate::config::protocol::MAX_PACKET_SIZE;
use crate::config::{fifo, timing};
use crate::lora::bus::RegisterBus;
use crate::lora::completion::Completion;
use crate::lora::modem::{
    frf_from_hz, hz_from_frf, Bandwidth, CodingRate, ConfigSnapshot, LnaGain, ModemConfig,
    SpreadingFactor, MAX_SYMBOL_TIMEOUT,
};
use crate::lora::registers::{dio0, field, irq, reg, RadioMode, CHIP_VERSION};
use crate::lora::traits::{ConfigError, LoraError, LoraRadio, RxPacket};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use heapless::Vec;

/// RSSI offset for the low-frequency (433 MHz) RF port
const RSSI_OFFSET_LF: i16 = 164;

/// SX127x LoRa driver
///
/// Holds the register bus, the reset line, a completion strategy and a delay
/// source. The active modem configuration is tracked as one value so the
/// symbol timeout is always derived from what the chip was given.
pub struct Sx127xDriver<B, Rst, C, D> {
    bus: B,
    reset: Rst,
    completion: C,
    delay: D,
    config: ModemConfig,
    mode: RadioMode,
}

impl<B, Rst, C, D> Sx127xDriver<B, Rst, C, D>
where
    B: RegisterBus,
    Rst: OutputPin,
    C: Completion,
    D: DelayNs,
{
    /// Create a new SX127x driver; nothing is written until [`Self::init`]
    pub fn new(bus: B, reset: Rst, completion: C, delay: D) -> Self {
        Self {
            bus,
            reset,
            completion,
            delay,
            config: ModemConfig::default(),
            mode: RadioMode::Sleep,
        }
    }

    /// Configuration last written to the chip
    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Mode last requested from the chip
    pub fn mode(&self) -> RadioMode {
        self.mode
    }

    /// Pulse the reset line; the chip comes back in Sleep
    pub async fn reset(&mut self) -> Result<(), LoraError> {
        self.reset.set_low().map_err(|_| LoraError::Pin)?;
        self.delay.delay_ms(timing::RESET_PULSE_MS).await;
        self.reset.set_high().map_err(|_| LoraError::Pin)?;
        self.delay.delay_ms(timing::RESET_PULSE_MS).await;
        self.mode = RadioMode::Sleep;
        Ok(())
    }

    /// Reset, identify and configure the chip, leaving it in Standby
    pub async fn init(&mut self, config: &ModemConfig) -> Result<(), LoraError> {
        self.reset().await?;

        let version = self.bus.read_register(reg::VERSION).await?;
        if version != CHIP_VERSION {
            log::warn!("LoRa: unexpected chip version 0x{:02X}", version);
            return Err(LoraError::DeviceNotFound { version });
        }

        // The LoRa bit can only be changed in Sleep
        self.set_mode(RadioMode::Sleep).await?;
        self.set_mode(RadioMode::Standby).await?;

        self.apply_config(config).await?;

        self.bus
            .write_register(reg::FIFO_TX_BASE_ADDR, fifo::TX_BASE_ADDR)
            .await?;
        self.bus
            .write_register(reg::FIFO_RX_BASE_ADDR, fifo::RX_BASE_ADDR)
            .await?;
        self.bus
            .write_register(reg::MAX_PAYLOAD_LENGTH, fifo::MAX_PAYLOAD as u8)
            .await?;
        self.clear_irq_flags().await?;

        log::info!("LoRa: SX127x ready (version 0x{:02X})", version);
        Ok(())
    }

    /// Write every modem parameter through its validated setter
    pub async fn apply_config(&mut self, config: &ModemConfig) -> Result<(), LoraError> {
        let config = *config;
        self.set_bandwidth(config.bandwidth.hz()).await?;
        self.set_coding_rate(config.coding_rate.denominator()).await?;
        self.set_spreading_factor(config.spreading_factor.value())
            .await?;
        self.set_low_data_rate_optimize(config.low_data_rate_optimize)
            .await?;
        self.set_agc(config.agc_enabled).await?;
        self.set_symbol_timeout(config.symbol_timeout).await?;
        self.set_lna(config.lna_gain.level(), config.lna_boost)
            .await?;
        self.set_crc(config.crc_enabled).await?;
        self.set_preamble_length(config.preamble_length).await?;
        self.set_sync_word(config.sync_word).await?;
        self.set_frequency(config.frequency_hz).await
    }

    /// Write RegOpMode, keeping the LoRa bit set
    pub async fn set_mode(&mut self, mode: RadioMode) -> Result<(), LoraError> {
        self.bus.write_register(reg::OP_MODE, mode.op_mode()).await?;
        self.mode = mode;
        Ok(())
    }

    /// Read-modify-write of the bits selected by `mask`
    async fn update_bits(&mut self, addr: u8, mask: u8, bits: u8) -> Result<(), LoraError> {
        let current = self.bus.read_register(addr).await?;
        self.bus
            .write_register(addr, (current & !mask) | (bits & mask))
            .await
    }

    async fn set_flag(&mut self, addr: u8, flag: u8, enabled: bool) -> Result<(), LoraError> {
        let bits = if enabled { flag } else { 0 };
        self.update_bits(addr, flag, bits).await
    }

    async fn clear_irq_flags(&mut self) -> Result<(), LoraError> {
        self.bus.write_register(reg::IRQ_FLAGS, irq::ALL).await
    }

    /// Signal bandwidth in Hz: 125 000, 250 000 or 500 000
    pub async fn set_bandwidth(&mut self, hz: u32) -> Result<(), LoraError> {
        let bandwidth = Bandwidth::from_hz(hz)?;
        self.update_bits(
            reg::MODEM_CONFIG_1,
            field::BANDWIDTH_MASK,
            bandwidth.register_bits(),
        )
        .await?;
        self.config.bandwidth = bandwidth;
        Ok(())
    }

    /// Coding rate 4/`denominator`, denominator 5..=8
    pub async fn set_coding_rate(&mut self, denominator: u8) -> Result<(), LoraError> {
        let coding_rate = CodingRate::from_denominator(denominator)?;
        self.update_bits(
            reg::MODEM_CONFIG_1,
            field::CODING_RATE_MASK,
            coding_rate.register_bits(),
        )
        .await?;
        self.config.coding_rate = coding_rate;
        Ok(())
    }

    pub async fn set_spreading_factor(&mut self, sf: u8) -> Result<(), LoraError> {
        let spreading_factor = SpreadingFactor::new(sf)?;
        self.update_bits(
            reg::MODEM_CONFIG_2,
            field::SPREADING_FACTOR_MASK,
            spreading_factor.register_bits(),
        )
        .await?;
        self.config.spreading_factor = spreading_factor;
        Ok(())
    }

    pub async fn set_crc(&mut self, enabled: bool) -> Result<(), LoraError> {
        self.set_flag(reg::MODEM_CONFIG_2, field::RX_PAYLOAD_CRC_ON, enabled)
            .await?;
        self.config.crc_enabled = enabled;
        Ok(())
    }

    pub async fn set_low_data_rate_optimize(&mut self, enabled: bool) -> Result<(), LoraError> {
        self.set_flag(reg::MODEM_CONFIG_3, field::LOW_DATA_RATE_OPTIMIZE, enabled)
            .await?;
        self.config.low_data_rate_optimize = enabled;
        Ok(())
    }

    pub async fn set_agc(&mut self, enabled: bool) -> Result<(), LoraError> {
        self.set_flag(reg::MODEM_CONFIG_3, field::AGC_AUTO_ON, enabled)
            .await?;
        self.config.agc_enabled = enabled;
        Ok(())
    }

    /// LNA gain level 1..=5 (G1 highest) and boost 0..=3
    pub async fn set_lna(&mut self, level: u8, boost: u8) -> Result<(), LoraError> {
        let gain = LnaGain::from_level(level)?;
        if boost > field::LNA_BOOST_MASK {
            return Err(ConfigError::LnaBoost.into());
        }
        self.update_bits(
            reg::LNA,
            field::LNA_GAIN_MASK | field::LNA_BOOST_MASK,
            gain.register_bits() | boost,
        )
        .await?;
        self.config.lna_gain = gain;
        self.config.lna_boost = boost;
        Ok(())
    }

    pub async fn set_preamble_length(&mut self, symbols: u16) -> Result<(), LoraError> {
        let [msb, lsb] = symbols.to_be_bytes();
        self.bus.write_register(reg::PREAMBLE_MSB, msb).await?;
        self.bus.write_register(reg::PREAMBLE_LSB, lsb).await?;
        self.config.preamble_length = symbols;
        Ok(())
    }

    pub async fn set_sync_word(&mut self, sync_word: u8) -> Result<(), LoraError> {
        self.bus.write_register(reg::SYNC_WORD, sync_word).await?;
        self.config.sync_word = sync_word;
        Ok(())
    }

    /// Carrier frequency in Hz, truncated to the 61 Hz FRF step
    pub async fn set_frequency(&mut self, hz: u32) -> Result<(), LoraError> {
        let [_, msb, mid, lsb] = frf_from_hz(hz).to_be_bytes();
        self.bus.write_register(reg::FRF_MSB, msb).await?;
        self.bus.write_register(reg::FRF_MID, mid).await?;
        self.bus.write_register(reg::FRF_LSB, lsb).await?;
        self.config.frequency_hz = hz;
        Ok(())
    }

    /// Raw receive timeout in symbols, clamped to 10 bits
    pub async fn set_symbol_timeout(&mut self, symbols: u16) -> Result<(), LoraError> {
        let symbols = symbols.min(MAX_SYMBOL_TIMEOUT);
        let [msb, lsb] = symbols.to_be_bytes();
        self.bus.write_register(reg::SYMB_TIMEOUT_LSB, lsb).await?;
        self.update_bits(reg::MODEM_CONFIG_2, field::SYMB_TIMEOUT_MSB_MASK, msb)
            .await?;
        self.config.symbol_timeout = symbols;
        Ok(())
    }

    /// Receive timeout for RxSingle, derived from the current SF and bandwidth
    ///
    /// Returns the number of symbols written.
    pub async fn set_receive_timeout(&mut self, timeout_ms: u32) -> Result<u16, LoraError> {
        let symbols = self.config.symbol_timeout_for(timeout_ms);
        self.set_symbol_timeout(symbols).await?;
        Ok(symbols)
    }

    /// PA output stage: PA_BOOST select, max power 0..=7, output power 0..=15
    pub async fn set_tx_power(
        &mut self,
        pa_boost: bool,
        max_power: u8,
        output_power: u8,
    ) -> Result<(), LoraError> {
        if max_power > 7 || output_power > 15 {
            return Err(ConfigError::TxPower.into());
        }
        let select = if pa_boost { field::PA_SELECT } else { 0 };
        self.bus
            .write_register(reg::PA_CONFIG, select | (max_power << 4) | output_power)
            .await
    }

    /// Over-current protection, trimmed to 100 mA when enabled
    pub async fn set_ocp(&mut self, enabled: bool) -> Result<(), LoraError> {
        if enabled {
            self.bus
                .write_register(reg::OCP, field::OCP_ON | field::OCP_TRIM_100MA)
                .await
        } else {
            self.update_bits(reg::OCP, field::OCP_ON, 0).await
        }
    }

    /// RSSI of the last received packet in dBm
    pub async fn packet_rssi(&mut self) -> Result<i16, LoraError> {
        let raw = self.bus.read_register(reg::PKT_RSSI_VALUE).await?;
        Ok(raw as i16 - RSSI_OFFSET_LF)
    }

    /// Read the modem registers back into semantic values
    ///
    /// Diagnostic only; the chip is left untouched.
    pub async fn format_config(&mut self) -> Result<ConfigSnapshot, LoraError> {
        let frf = u32::from_be_bytes([
            0,
            self.bus.read_register(reg::FRF_MSB).await?,
            self.bus.read_register(reg::FRF_MID).await?,
            self.bus.read_register(reg::FRF_LSB).await?,
        ]);
        let config_1 = self.bus.read_register(reg::MODEM_CONFIG_1).await?;
        let config_2 = self.bus.read_register(reg::MODEM_CONFIG_2).await?;
        let config_3 = self.bus.read_register(reg::MODEM_CONFIG_3).await?;
        let sync_word = self.bus.read_register(reg::SYNC_WORD).await?;
        let preamble_length = u16::from_be_bytes([
            self.bus.read_register(reg::PREAMBLE_MSB).await?,
            self.bus.read_register(reg::PREAMBLE_LSB).await?,
        ]);
        let lna = self.bus.read_register(reg::LNA).await?;

        Ok(ConfigSnapshot {
            frequency_hz: hz_from_frf(frf),
            bandwidth: Bandwidth::from_register(config_1),
            spreading_factor: SpreadingFactor::from_register(config_2),
            coding_rate: CodingRate::from_register(config_1),
            sync_word,
            preamble_length,
            crc_enabled: config_2 & field::RX_PAYLOAD_CRC_ON != 0,
            low_data_rate_optimize: config_3 & field::LOW_DATA_RATE_OPTIMIZE != 0,
            lna_gain: (lna & field::LNA_GAIN_MASK) >> 5,
            lna_boost: lna & field::LNA_BOOST_MASK,
        })
    }

    async fn map_dio0(&mut self, function: u8) -> Result<(), LoraError> {
        self.update_bits(reg::DIO_MAPPING_1, field::DIO0_MASK, function)
            .await
    }
}

impl<B, Rst, C, D> LoraRadio for Sx127xDriver<B, Rst, C, D>
where
    B: RegisterBus,
    Rst: OutputPin,
    C: Completion,
    D: DelayNs,
{
    async fn transmit(&mut self, payload: &[u8], timeout_ms: u32) -> Result<(), LoraError> {
        if payload.len() > fifo::MAX_PAYLOAD {
            return Err(LoraError::PayloadTooLarge);
        }

        self.set_mode(RadioMode::Standby).await?;
        self.clear_irq_flags().await?;

        self.bus
            .write_register(reg::FIFO_ADDR_PTR, fifo::TX_BASE_ADDR)
            .await?;
        for &byte in payload {
            self.bus.write_register(reg::FIFO, byte).await?;
        }
        self.bus
            .write_register(reg::PAYLOAD_LENGTH, payload.len() as u8)
            .await?;

        self.map_dio0(dio0::TX_DONE).await?;
        self.set_mode(RadioMode::Tx).await?;

        let flags = self
            .completion
            .wait_for_irq(&mut self.bus, irq::TX_DONE, timeout_ms)
            .await?;
        if flags.is_none() {
            log::debug!("LoRa TX: no TxDone after {} ms", timeout_ms);
            return Err(LoraError::TransmitTimeout);
        }

        self.clear_irq_flags().await?;
        self.set_mode(RadioMode::Standby).await
    }

    async fn receive(&mut self, max_len: usize, timeout_ms: u32) -> Result<RxPacket, LoraError> {
        if self.mode != RadioMode::Standby {
            self.set_mode(RadioMode::Standby).await?;
        }
        self.clear_irq_flags().await?;

        self.bus
            .write_register(reg::FIFO_ADDR_PTR, fifo::RX_BASE_ADDR)
            .await?;
        // The chip stops waiting for a preamble after this many symbols
        self.set_receive_timeout(timeout_ms).await?;
        self.map_dio0(dio0::RX_DONE).await?;
        self.set_mode(RadioMode::RxSingle).await?;

        let mask = irq::RX_DONE | irq::PAYLOAD_CRC_ERROR | irq::RX_TIMEOUT;
        let Some(flags) = self
            .completion
            .wait_for_irq(&mut self.bus, mask, timeout_ms)
            .await?
        else {
            log::debug!("LoRa RX: nothing within {} ms", timeout_ms);
            return Err(LoraError::ReceiveTimeout);
        };

        // RxSingle falls back to Standby by itself once an event is latched
        self.mode = RadioMode::Standby;

        if flags & irq::PAYLOAD_CRC_ERROR != 0 {
            self.clear_irq_flags().await?;
            return Err(LoraError::CrcError);
        }
        if flags & irq::RX_TIMEOUT != 0 {
            self.clear_irq_flags().await?;
            return Err(LoraError::ReceiveTimeout);
        }

        let length = self.bus.read_register(reg::RX_NB_BYTES).await?;
        if length as usize > max_len.min(MAX_PACKET_SIZE) {
            self.clear_irq_flags().await?;
            return Err(LoraError::PacketTooLarge { length });
        }

        let start = self.bus.read_register(reg::FIFO_RX_CURRENT_ADDR).await?;
        self.bus.write_register(reg::FIFO_ADDR_PTR, start).await?;

        let mut data = Vec::new();
        for _ in 0..length {
            let byte = self.bus.read_register(reg::FIFO).await?;
            // Capacity checked against `length` above
            let _ = data.push(byte);
        }

        let rssi = self.packet_rssi().await?;
        self.clear_irq_flags().await?;

        Ok(RxPacket { data, rssi })
    }

    async fn set_standby(&mut self) -> Result<(), LoraError> {
        self.set_mode(RadioMode::Standby).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lora::bus::mock::{Access, Inbound, MockChip, MockNss, MockReset, MockSpi};
    use crate::lora::bus::SpiRegisterBus;
    use crate::lora::completion::mock::MockDelay;
    use crate::lora::completion::{EdgeCompletion, PollingCompletion};
    use futures::executor::block_on;

    type TestDriver = Sx127xDriver<
        SpiRegisterBus<MockSpi, MockNss>,
        MockReset,
        PollingCompletion<MockDelay>,
        MockDelay,
    >;

    fn driver(chip: &MockChip, delay: &MockDelay) -> TestDriver {
        Sx127xDriver::new(
            SpiRegisterBus::new(chip.spi(), chip.nss()),
            chip.reset_pin(),
            PollingCompletion::new(delay.clone()),
            delay.clone(),
        )
    }

    fn ready_driver(chip: &MockChip, delay: &MockDelay) -> TestDriver {
        let mut radio = driver(chip, delay);
        block_on(radio.init(&ModemConfig::default())).unwrap();
        chip.take_log();
        radio
    }

    #[test]
    fn test_init_sequence() {
        let chip = MockChip::new();
        let delay = MockDelay::new();
        let mut radio = driver(&chip, &delay);

        block_on(radio.init(&ModemConfig::default())).unwrap();

        assert_eq!(chip.state().reset_levels, [false, true]);
        assert_eq!(delay.elapsed_ms(), 20);

        let log = chip.take_log();
        assert_eq!(log[0], Access::Read(reg::VERSION));
        assert_eq!(log[1], Access::Write(reg::OP_MODE, 0x80));
        assert_eq!(log[2], Access::Write(reg::OP_MODE, 0x81));

        assert_eq!(chip.mode(), RadioMode::Standby);
        assert_eq!(radio.mode(), RadioMode::Standby);
        assert_eq!(chip.register(reg::MODEM_CONFIG_1), 0x72);
        // SF7, CRC on, symbol timeout 245 fits in the LSB
        assert_eq!(chip.register(reg::MODEM_CONFIG_2), 0x74);
        assert_eq!(chip.register(reg::SYMB_TIMEOUT_LSB), 245);
        assert_eq!(chip.register(reg::MODEM_CONFIG_3), 0x04);
        assert_eq!(chip.register(reg::LNA), 0x61);
        assert_eq!(chip.register(reg::FRF_MSB), 0x6C);
        assert_eq!(chip.register(reg::FRF_MID), 0x57);
        assert_eq!(chip.register(reg::FRF_LSB), 0x0A);
        assert_eq!(chip.register(reg::FIFO_RX_BASE_ADDR), 0x80);
        assert_eq!(chip.register(reg::MAX_PAYLOAD_LENGTH), 127);
        assert_eq!(chip.register(reg::IRQ_FLAGS), 0);
    }

    #[test]
    fn test_init_rejects_unknown_chip() {
        let chip = MockChip::new();
        chip.set_register(reg::VERSION, 0x22);
        let mut radio = driver(&chip, &MockDelay::new());

        let result = block_on(radio.init(&ModemConfig::default()));

        assert_eq!(result, Err(LoraError::DeviceNotFound { version: 0x22 }));
        assert_eq!(chip.take_log(), [Access::Read(reg::VERSION)]);
    }

    #[test]
    fn test_transmit() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());

        block_on(radio.transmit(&[0x05, 0x01, 0xAA, 0xBB, 0xCC], 2000)).unwrap();

        let log = chip.take_log();
        assert_eq!(log[0], Access::Write(reg::OP_MODE, 0x81));
        assert_eq!(log[1], Access::Write(reg::IRQ_FLAGS, 0xFF));
        assert_eq!(log[2], Access::Write(reg::FIFO_ADDR_PTR, 0x00));
        assert_eq!(chip.state().transmitted, [vec![0x05, 0x01, 0xAA, 0xBB, 0xCC]]);
        assert_eq!(chip.register(reg::PAYLOAD_LENGTH), 5);
        assert_eq!(chip.register(reg::DIO_MAPPING_1), dio0::TX_DONE);
        assert_eq!(chip.register(reg::IRQ_FLAGS), 0);
        assert_eq!(chip.mode(), RadioMode::Standby);
    }

    #[test]
    fn test_transmit_payload_limit() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());

        let result = block_on(radio.transmit(&[0u8; 128], 2000));
        assert_eq!(result, Err(LoraError::PayloadTooLarge));
        assert!(chip.take_log().is_empty());

        block_on(radio.transmit(&[0u8; 127], 2000)).unwrap();
        assert_eq!(chip.state().transmitted[0].len(), 127);
    }

    #[test]
    fn test_transmit_timeout() {
        let chip = MockChip::new();
        let delay = MockDelay::new();
        let mut radio = ready_driver(&chip, &delay);
        chip.state().tx_completes = false;
        let before = delay.elapsed_ms();

        let result = block_on(radio.transmit(&[0x01, 0x02], 100));

        assert_eq!(result, Err(LoraError::TransmitTimeout));
        assert_eq!(delay.elapsed_ms() - before, 100);
        assert!(chip.state().transmitted.is_empty());
    }

    #[test]
    fn test_receive() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());
        chip.set_inbound(Inbound::Packet {
            data: vec![0x04, 0x02, 0xFF, 0xC0],
            offset: 0,
        });

        let packet = block_on(radio.receive(255, 250)).unwrap();

        assert_eq!(packet.data.as_slice(), &[0x04, 0x02, 0xFF, 0xC0]);
        assert_eq!(packet.rssi, 100 - 164);
        assert_eq!(chip.register(reg::IRQ_FLAGS), 0);
        assert_eq!(chip.register(reg::DIO_MAPPING_1), dio0::RX_DONE);
        let log = chip.take_log();
        assert!(log.contains(&Access::Write(reg::OP_MODE, 0x86)));
    }

    #[test]
    fn test_receive_at_reported_address() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());
        chip.set_inbound(Inbound::Packet {
            data: vec![0x03, 0x01, 0x7E],
            offset: 0x20,
        });

        let packet = block_on(radio.receive(255, 250)).unwrap();

        assert_eq!(packet.data.as_slice(), &[0x03, 0x01, 0x7E]);
        let log = chip.take_log();
        assert!(log.contains(&Access::Write(reg::FIFO_ADDR_PTR, 0xA0)));
    }

    #[test]
    fn test_receive_crc_error_skips_fifo() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());
        chip.set_inbound(Inbound::Corrupted(vec![0x03, 0x01, 0x00]));

        let result = block_on(radio.receive(255, 250));

        assert_eq!(result, Err(LoraError::CrcError));
        let log = chip.take_log();
        assert!(!MockChip::logged_read(&log, reg::FIFO));
        assert!(!MockChip::logged_read(&log, reg::RX_NB_BYTES));
        assert_eq!(chip.register(reg::IRQ_FLAGS), 0);
    }

    #[test]
    fn test_receive_symbol_timeout() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());
        chip.set_inbound(Inbound::SymbolTimeout);

        let result = block_on(radio.receive(255, 250));

        assert_eq!(result, Err(LoraError::ReceiveTimeout));
        assert_eq!(chip.register(reg::IRQ_FLAGS), 0);
    }

    #[test]
    fn test_receive_deadline() {
        let chip = MockChip::new();
        let delay = MockDelay::new();
        let mut radio = ready_driver(&chip, &delay);
        let before = delay.elapsed_ms();

        let result = block_on(radio.receive(255, 300));

        assert_eq!(result, Err(LoraError::ReceiveTimeout));
        assert_eq!(delay.elapsed_ms() - before, 300);
        // Mode is unknown after a deadline, so the next receive forces Standby
        assert_eq!(radio.mode(), RadioMode::RxSingle);
        chip.take_log();
        let _ = block_on(radio.receive(255, 0));
        assert_eq!(chip.take_log()[0], Access::Write(reg::OP_MODE, 0x81));
    }

    #[test]
    fn test_receive_window_sets_symbol_timeout() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());
        chip.set_inbound(Inbound::Packet {
            data: vec![0x03, 0x01, 0x55],
            offset: 0,
        });

        block_on(radio.receive(255, 800)).unwrap();

        // 800 ms at SF7/125 kHz is 782 symbols, 0x30E
        assert_eq!(radio.config().symbol_timeout, 782);
        assert_eq!(chip.register(reg::SYMB_TIMEOUT_LSB), 0x0E);
        assert_eq!(chip.register(reg::MODEM_CONFIG_2) & 0x03, 0x03);
        // SF7 and CRC bits untouched
        assert_eq!(chip.register(reg::MODEM_CONFIG_2) & !0x03, 0x74);
    }

    #[test]
    fn test_receive_packet_too_large() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());
        chip.set_inbound(Inbound::Packet {
            data: vec![0xAB; 10],
            offset: 0,
        });

        let result = block_on(radio.receive(4, 250));

        assert_eq!(result, Err(LoraError::PacketTooLarge { length: 10 }));
        assert!(!MockChip::logged_read(&chip.take_log(), reg::FIFO));
    }

    #[test]
    fn test_invalid_parameters_write_nothing() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());

        block_on(async {
            assert_eq!(
                radio.set_bandwidth(62_500).await,
                Err(LoraError::Configuration(ConfigError::Bandwidth))
            );
            assert_eq!(
                radio.set_coding_rate(9).await,
                Err(LoraError::Configuration(ConfigError::CodingRate))
            );
            assert_eq!(
                radio.set_spreading_factor(13).await,
                Err(LoraError::Configuration(ConfigError::SpreadingFactor))
            );
            assert_eq!(
                radio.set_lna(6, 0).await,
                Err(LoraError::Configuration(ConfigError::LnaGain))
            );
            assert_eq!(
                radio.set_lna(1, 4).await,
                Err(LoraError::Configuration(ConfigError::LnaBoost))
            );
            assert_eq!(
                radio.set_tx_power(true, 8, 0).await,
                Err(LoraError::Configuration(ConfigError::TxPower))
            );
        });

        assert!(chip.take_log().is_empty());
        assert_eq!(radio.config(), &ModemConfig::default());
    }

    #[test]
    fn test_setters_preserve_neighbouring_bits() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());
        // Implicit header mode bit
        chip.set_register(reg::MODEM_CONFIG_1, 0x73);
        // SF7, CRC on, symbol timeout MSB 3
        chip.set_register(reg::MODEM_CONFIG_2, 0x77);

        block_on(async {
            radio.set_bandwidth(500_000).await.unwrap();
            assert_eq!(chip.register(reg::MODEM_CONFIG_1), 0x93);
            radio.set_coding_rate(8).await.unwrap();
            assert_eq!(chip.register(reg::MODEM_CONFIG_1), 0x99);

            radio.set_spreading_factor(12).await.unwrap();
            assert_eq!(chip.register(reg::MODEM_CONFIG_2), 0xC7);
            radio.set_crc(false).await.unwrap();
            assert_eq!(chip.register(reg::MODEM_CONFIG_2), 0xC3);
        });
    }

    #[test]
    fn test_receive_timeout_split_across_registers() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());

        block_on(async {
            let symbols = radio.set_receive_timeout(250).await.unwrap();
            assert_eq!(symbols, 245);

            radio.set_spreading_factor(6).await.unwrap();
            radio.set_bandwidth(500_000).await.unwrap();
            let symbols = radio.set_receive_timeout(10_000).await.unwrap();
            assert_eq!(symbols, 1023);
        });

        assert_eq!(chip.register(reg::SYMB_TIMEOUT_LSB), 0xFF);
        // SF6, CRC still on, timeout bits 9:8 set
        assert_eq!(chip.register(reg::MODEM_CONFIG_2), 0x67);
        assert_eq!(radio.config().symbol_timeout, 1023);
    }

    #[test]
    fn test_tx_power_and_ocp() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());

        block_on(async {
            radio.set_tx_power(true, 0, 9).await.unwrap();
            assert_eq!(chip.register(reg::PA_CONFIG), 0x89);
            radio.set_tx_power(false, 7, 15).await.unwrap();
            assert_eq!(chip.register(reg::PA_CONFIG), 0x7F);

            radio.set_ocp(true).await.unwrap();
            assert_eq!(chip.register(reg::OCP), 0x2B);
            radio.set_ocp(false).await.unwrap();
            assert_eq!(chip.register(reg::OCP), 0x0B);
        });
    }

    #[test]
    fn test_format_config_reads_back_every_setting() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());

        block_on(async {
            for bandwidth in [125_000, 250_000, 500_000] {
                for denominator in 5..=8 {
                    for sf in 6..=12 {
                        radio.set_bandwidth(bandwidth).await.unwrap();
                        radio.set_coding_rate(denominator).await.unwrap();
                        radio.set_spreading_factor(sf).await.unwrap();

                        let snapshot = radio.format_config().await.unwrap();
                        assert_eq!(snapshot.bandwidth.map(Bandwidth::hz), Some(bandwidth));
                        assert_eq!(
                            snapshot.coding_rate.map(CodingRate::denominator),
                            Some(denominator)
                        );
                        assert_eq!(snapshot.spreading_factor, sf);
                    }
                }
            }
        });
    }

    #[test]
    fn test_format_config_is_read_only() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());

        let snapshot = block_on(radio.format_config()).unwrap();

        assert!(chip
            .take_log()
            .iter()
            .all(|access| matches!(access, Access::Read(_))));
        assert_eq!(
            snapshot.to_string(),
            "Freq:433359985|BW:125000|SF:7|CR:4/5|SW:0x12|PL:8|CRC:true|LDRO:false|LNA:3/1"
        );
    }

    #[test]
    fn test_format_config_unknown_bandwidth() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());
        chip.set_register(reg::MODEM_CONFIG_1, 0x60);

        let snapshot = block_on(radio.format_config()).unwrap();

        assert_eq!(snapshot.bandwidth, None);
        assert_eq!(snapshot.coding_rate, None);
        assert!(snapshot.to_string().contains("|BW:0|SF:7|CR:?|"));
    }

    #[test]
    fn test_bus_failure_aborts_transmit() {
        let chip = MockChip::new();
        let mut radio = ready_driver(&chip, &MockDelay::new());
        let done = chip.state().transfers;
        chip.state().fail_after = Some(done + 3);

        let result = block_on(radio.transmit(&[1, 2, 3, 4], 2000));

        assert_eq!(result, Err(LoraError::Bus));
        assert!(!chip.state().nss_low);
        assert!(chip.state().transmitted.is_empty());
    }

    #[test]
    fn test_edge_completion() {
        let chip = MockChip::new();
        let delay = MockDelay::new();
        let mut radio = Sx127xDriver::new(
            SpiRegisterBus::new(chip.spi(), chip.nss()),
            chip.reset_pin(),
            EdgeCompletion::new(chip.dio0(), delay.clone()),
            delay.clone(),
        );

        block_on(async {
            radio.init(&ModemConfig::default()).await.unwrap();

            radio.transmit(&[0x03, 0x01, 0x42], 2000).await.unwrap();
            assert_eq!(chip.state().transmitted.len(), 1);

            chip.set_inbound(Inbound::Packet {
                data: vec![0x03, 0x01, 0x24],
                offset: 0,
            });
            let packet = radio.receive(255, 250).await.unwrap();
            assert_eq!(packet.data.as_slice(), &[0x03, 0x01, 0x24]);

            assert_eq!(
                radio.receive(255, 250).await,
                Err(LoraError::ReceiveTimeout)
            );
        });
    }
}
