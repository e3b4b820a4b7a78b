//! Waiting for transceiver events
//!
//! TxDone and RxDone can be observed by polling RegIrqFlags or by waiting
//! for DIO0 to go high. Both strategies bound the wait by a deadline and
//! return the latched flags, leaving the decision to the driver.

use crate::config::timing::POLL_INTERVAL_MS;
use crate::lora::bus::RegisterBus;
use crate::lora::registers::reg;
use crate::lora::traits::LoraError;
use core::future::Future;
use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;

/// Strategy for waiting on an IRQ flag
pub trait Completion {
    /// Wait until any flag in `mask` is latched or the deadline is reached
    ///
    /// The deadline is `timeout_ms` of waiting. Polling counts only its own
    /// sleeps, so register reads stretch the wall-clock wait slightly past
    /// `timeout_ms`.
    ///
    /// Returns the full content of RegIrqFlags when a masked flag was seen,
    /// `None` on deadline. Flags are not cleared.
    fn wait_for_irq<B: RegisterBus>(
        &mut self,
        bus: &mut B,
        mask: u8,
        timeout_ms: u32,
    ) -> impl Future<Output = Result<Option<u8>, LoraError>>;
}

/// Polls RegIrqFlags at a fixed interval
pub struct PollingCompletion<D> {
    delay: D,
    interval_ms: u32,
}

impl<D: DelayNs> PollingCompletion<D> {
    pub fn new(delay: D) -> Self {
        Self::with_interval(delay, POLL_INTERVAL_MS)
    }

    pub fn with_interval(delay: D, interval_ms: u32) -> Self {
        Self {
            delay,
            interval_ms: interval_ms.max(1),
        }
    }
}

impl<D: DelayNs> Completion for PollingCompletion<D> {
    async fn wait_for_irq<B: RegisterBus>(
        &mut self,
        bus: &mut B,
        mask: u8,
        timeout_ms: u32,
    ) -> Result<Option<u8>, LoraError> {
        // Elapsed time is the sum of the sleeps; register reads are negligible
        let mut waited_ms = 0u32;
        loop {
            let flags = bus.read_register(reg::IRQ_FLAGS).await?;
            if flags & mask != 0 {
                return Ok(Some(flags));
            }
            if waited_ms >= timeout_ms {
                return Ok(None);
            }
            self.delay.delay_ms(self.interval_ms).await;
            waited_ms = waited_ms.saturating_add(self.interval_ms);
        }
    }
}

/// Waits for DIO0 to rise, bounded by a timer
///
/// DIO0 must be mapped to the awaited event before the wait starts.
pub struct EdgeCompletion<P, D> {
    dio0: P,
    delay: D,
}

impl<P: Wait, D: DelayNs> EdgeCompletion<P, D> {
    pub fn new(dio0: P, delay: D) -> Self {
        Self { dio0, delay }
    }
}

impl<P: Wait, D: DelayNs> Completion for EdgeCompletion<P, D> {
    async fn wait_for_irq<B: RegisterBus>(
        &mut self,
        bus: &mut B,
        mask: u8,
        timeout_ms: u32,
    ) -> Result<Option<u8>, LoraError> {
        match select(self.dio0.wait_for_high(), self.delay.delay_ms(timeout_ms)).await {
            Either::First(edge) => edge.map_err(|_| LoraError::Pin)?,
            Either::Second(()) => {}
        }

        // RxTimeout is not routed to DIO0, so the deadline path still checks the flags
        let flags = bus.read_register(reg::IRQ_FLAGS).await?;
        Ok((flags & mask != 0).then_some(flags))
    }
}

#[cfg(test)]
pub mod mock {
    //! Delay that returns immediately and records the requested time

    use core::cell::Cell;
    use embedded_hal_async::delay::DelayNs;
    use std::rc::Rc;

    /// Clones share one elapsed-time counter
    #[derive(Clone, Default)]
    pub struct MockDelay {
        elapsed_ns: Rc<Cell<u64>>,
    }

    impl MockDelay {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn elapsed_ms(&self) -> u64 {
            self.elapsed_ns.get() / 1_000_000
        }
    }

    impl DelayNs for MockDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.elapsed_ns.set(self.elapsed_ns.get() + ns as u64);
        }

        async fn delay_ms(&mut self, ms: u32) {
            self.elapsed_ns
                .set(self.elapsed_ns.get() + ms as u64 * 1_000_000);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockDelay;
    use super::*;
    use crate::lora::bus::mock::MockChip;
    use crate::lora::bus::SpiRegisterBus;
    use crate::lora::registers::irq;

    #[test]
    fn test_polling_returns_latched_flags() {
        let chip = MockChip::new();
        chip.set_register(reg::IRQ_FLAGS, irq::TX_DONE);
        let mut bus = SpiRegisterBus::new(chip.spi(), chip.nss());
        let delay = MockDelay::new();
        let mut completion = PollingCompletion::new(delay.clone());

        let flags = futures::executor::block_on(completion.wait_for_irq(
            &mut bus,
            irq::TX_DONE,
            100,
        ))
        .unwrap();

        assert_eq!(flags, Some(irq::TX_DONE));
        assert_eq!(delay.elapsed_ms(), 0);
        // Flags are left for the caller to clear
        assert_eq!(chip.register(reg::IRQ_FLAGS), irq::TX_DONE);
    }

    #[test]
    fn test_polling_deadline() {
        let chip = MockChip::new();
        let mut bus = SpiRegisterBus::new(chip.spi(), chip.nss());
        let delay = MockDelay::new();
        let mut completion = PollingCompletion::new(delay.clone());

        let flags = futures::executor::block_on(completion.wait_for_irq(
            &mut bus,
            irq::TX_DONE,
            20,
        ))
        .unwrap();

        assert_eq!(flags, None);
        assert_eq!(delay.elapsed_ms(), 20);
        // One read per interval plus the initial one
        assert_eq!(chip.take_log().len(), 5);
    }

    #[test]
    fn test_polling_ignores_unmasked_flags() {
        let chip = MockChip::new();
        chip.set_register(reg::IRQ_FLAGS, irq::VALID_HEADER);
        let mut bus = SpiRegisterBus::new(chip.spi(), chip.nss());
        let mut completion = PollingCompletion::with_interval(MockDelay::new(), 10);

        let flags = futures::executor::block_on(completion.wait_for_irq(
            &mut bus,
            irq::RX_DONE,
            10,
        ))
        .unwrap();

        assert_eq!(flags, None);
    }

    #[test]
    fn test_edge_completion_on_dio0() {
        let chip = MockChip::new();
        chip.set_register(reg::IRQ_FLAGS, irq::RX_DONE);
        let mut bus = SpiRegisterBus::new(chip.spi(), chip.nss());
        let mut completion = EdgeCompletion::new(chip.dio0(), MockDelay::new());

        let flags = futures::executor::block_on(completion.wait_for_irq(
            &mut bus,
            irq::RX_DONE | irq::RX_TIMEOUT,
            250,
        ))
        .unwrap();

        assert_eq!(flags, Some(irq::RX_DONE));
    }

    #[test]
    fn test_edge_completion_deadline_reads_timeout_flag() {
        let chip = MockChip::new();
        chip.set_register(reg::IRQ_FLAGS, irq::RX_TIMEOUT);
        let mut bus = SpiRegisterBus::new(chip.spi(), chip.nss());
        let delay = MockDelay::new();
        let mut completion = EdgeCompletion::new(chip.dio0(), delay.clone());

        let flags = futures::executor::block_on(completion.wait_for_irq(
            &mut bus,
            irq::RX_DONE | irq::RX_TIMEOUT,
            250,
        ))
        .unwrap();

        assert_eq!(flags, Some(irq::RX_TIMEOUT));
        assert_eq!(delay.elapsed_ms(), 250);
    }

    #[test]
    fn test_edge_completion_deadline_without_flags() {
        let chip = MockChip::new();
        let mut bus = SpiRegisterBus::new(chip.spi(), chip.nss());
        let mut completion = EdgeCompletion::new(chip.dio0(), MockDelay::new());

        let flags = futures::executor::block_on(completion.wait_for_irq(
            &mut bus,
            irq::TX_DONE,
            100,
        ))
        .unwrap();

        assert_eq!(flags, None);
    }
}
