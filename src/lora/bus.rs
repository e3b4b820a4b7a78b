//! Register access over SPI
//!
//! Every register access is one chip-select-scoped two-byte SPI transaction:
//! `[address | rw][data]`. The select line is released on every exit path.

use crate::lora::registers::WRITE_FLAG;
use crate::lora::traits::LoraError;
use core::future::Future;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;

/// Single-register access to the transceiver
pub trait RegisterBus {
    /// Read one register
    fn read_register(&mut self, addr: u8) -> impl Future<Output = Result<u8, LoraError>>;

    /// Write one register
    fn write_register(&mut self, addr: u8, value: u8)
        -> impl Future<Output = Result<(), LoraError>>;
}

/// SX127x register bus on a shared SPI peripheral with manual NSS control
pub struct SpiRegisterBus<Spi, Nss> {
    spi: Spi,
    nss: Nss,
}

impl<Spi, Nss> SpiRegisterBus<Spi, Nss>
where
    Spi: SpiBus,
    Nss: OutputPin,
{
    /// Create a register bus; NSS should already be driven high
    pub fn new(spi: Spi, nss: Nss) -> Self {
        Self { spi, nss }
    }

    /// Run one framed transfer with NSS asserted
    async fn transaction(&mut self, frame: &mut [u8; 2]) -> Result<(), LoraError> {
        self.nss.set_low().map_err(|_| LoraError::Pin)?;

        let result = match self.spi.transfer_in_place(frame).await {
            Ok(()) => self.spi.flush().await,
            Err(e) => Err(e),
        };

        // Release before reporting, whatever the transfer did
        let released = self.nss.set_high();

        result.map_err(|_| LoraError::Bus)?;
        released.map_err(|_| LoraError::Pin)
    }
}

impl<Spi, Nss> RegisterBus for SpiRegisterBus<Spi, Nss>
where
    Spi: SpiBus,
    Nss: OutputPin,
{
    async fn read_register(&mut self, addr: u8) -> Result<u8, LoraError> {
        let mut frame = [addr & !WRITE_FLAG, 0x00];
        self.transaction(&mut frame).await?;
        Ok(frame[1])
    }

    async fn write_register(&mut self, addr: u8, value: u8) -> Result<(), LoraError> {
        let mut frame = [addr | WRITE_FLAG, value];
        self.transaction(&mut frame).await
    }
}
