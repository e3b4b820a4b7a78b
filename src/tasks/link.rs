//! Aircraft side of the telemetry link
//!
//! Each cycle sends the current status record and then listens for a control
//! frame from the ground. The radio is owned by the link, which keeps
//! transmit and receive strictly sequential on the half-duplex channel.

use embedded_hal_async::delay::DelayNs;

use crate::config::protocol::MAX_PACKET_SIZE;
use crate::config::timing;
use crate::lora::traits::{LoraError, LoraRadio, RxPacket};
use crate::protocol::control::ControlUpdate;
use crate::protocol::packet::{build, decode, PayloadType};
use crate::telemetry::shared::{SharedStatus, SharedTargets};

/// Counters kept across cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub packets_sent: u32,
    pub controls_applied: u32,
    pub receive_timeouts: u32,
    pub transmit_timeouts: u32,
    /// Radio errors other than timeouts
    pub radio_errors: u32,
    /// Inbound frames that failed framing or control validation
    pub rejected_frames: u32,
}

/// Telemetry transmit/receive cycle over an owned radio
pub struct TelemetryLink<'a, R: LoraRadio> {
    radio: R,
    status: &'a SharedStatus,
    targets: &'a SharedTargets,
    stats: LinkStats,
    /// Set after any radio error; the mode of the chip is unknown until Standby
    needs_standby: bool,
}

impl<'a, R: LoraRadio> TelemetryLink<'a, R> {
    pub fn new(radio: R, status: &'a SharedStatus, targets: &'a SharedTargets) -> Self {
        Self {
            radio,
            status,
            targets,
            stats: LinkStats::default(),
            needs_standby: false,
        }
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Send one status record and open one receive window
    ///
    /// Returns the control update applied during this cycle, if any. Radio
    /// errors are counted and returned; bad inbound frames are counted and
    /// dropped.
    pub async fn cycle(&mut self) -> Result<Option<ControlUpdate>, LoraError> {
        if self.needs_standby {
            self.radio.set_standby().await.map_err(|e| self.fail(e))?;
            self.needs_standby = false;
        }

        // Lock held for the copy only
        let record = self.status.snapshot().to_extended();
        let frame = build(PayloadType::Bulk, &record);

        self.radio
            .transmit(&frame, timing::TX_TIMEOUT_MS)
            .await
            .map_err(|e| self.fail(e))?;
        self.stats.packets_sent += 1;

        let packet = self
            .radio
            .receive(MAX_PACKET_SIZE, timing::RX_WINDOW_MS)
            .await
            .map_err(|e| self.fail(e))?;

        Ok(self.handle_packet(&packet))
    }

    fn handle_packet(&mut self, packet: &RxPacket) -> Option<ControlUpdate> {
        let frame = match decode(&packet.data) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Link: dropping frame ({:?}, RSSI {})", e, packet.rssi);
                self.stats.rejected_frames += 1;
                return None;
            }
        };

        match ControlUpdate::from_frame(&frame) {
            Ok(Some(update)) => {
                update.apply(self.targets);
                self.stats.controls_applied += 1;
                log::info!("Link: applied {:?} (RSSI {})", update, packet.rssi);
                Some(update)
            }
            Ok(None) => {
                log::debug!("Link: ignoring {:?} frame", frame.payload_type);
                None
            }
            Err(e) => {
                log::warn!("Link: rejected {:?} frame ({:?})", frame.payload_type, e);
                self.stats.rejected_frames += 1;
                None
            }
        }
    }

    fn fail(&mut self, error: LoraError) -> LoraError {
        self.needs_standby = true;
        match error {
            LoraError::ReceiveTimeout => {
                self.stats.receive_timeouts += 1;
                log::debug!("Link: receive window closed empty");
            }
            LoraError::TransmitTimeout => {
                self.stats.transmit_timeouts += 1;
                log::warn!("Link: transmit timed out");
            }
            other => {
                self.stats.radio_errors += 1;
                log::warn!("Link: radio error {:?}", other);
            }
        }
        error
    }
}

/// Task that runs telemetry cycles forever
///
/// Timeouts lead straight into the next cycle; other errors back off first
/// so a dead bus does not spin.
pub async fn telemetry_task<R: LoraRadio, D: DelayNs>(
    mut link: TelemetryLink<'static, R>,
    mut delay: D,
) -> ! {
    let mut cycles: u32 = 0;
    loop {
        if let Err(e) = link.cycle().await {
            if !matches!(e, LoraError::ReceiveTimeout | LoraError::TransmitTimeout) {
                delay.delay_ms(timing::ERROR_BACKOFF_MS).await;
            }
        }

        cycles = cycles.wrapping_add(1);
        if cycles % timing::STATS_LOG_CYCLES == 0 {
            log::info!("Link: {:?}", link.stats());
        }
    }
}
