//! Ground station relay between a serial host and the radio
//!
//! Frames are forwarded in both directions without being reinterpreted.
//! Uplink bytes from the host are cut into frames by a reader task and queued;
//! the relay drains the queue between downlink receive windows, like the
//! aircraft link never transmitting and receiving at the same time.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embedded_io_async::{Read, Write};
use heapless::Vec;

use crate::config::protocol::{MAX_FRAME_SIZE, MAX_PACKET_SIZE};
use crate::config::{serial, timing};
use crate::lora::traits::{LoraError, LoraRadio};
use crate::protocol::framing::FrameAccumulator;
use crate::protocol::packet::{decode, error_frame, rssi_frame};

/// Frames waiting for the radio
pub const UPLINK_QUEUE_LEN: usize = 4;

/// One frame as carried on either side
pub type RawFrame = Vec<u8, MAX_FRAME_SIZE>;

/// Queue between the serial reader and the relay
pub type UplinkChannel = Channel<CriticalSectionRawMutex, RawFrame, UPLINK_QUEUE_LEN>;

/// Type alias for the uplink queue sender
pub type UplinkSender<'a> = Sender<'a, CriticalSectionRawMutex, RawFrame, UPLINK_QUEUE_LEN>;

/// Type alias for the uplink queue receiver
pub type UplinkReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, RawFrame, UPLINK_QUEUE_LEN>;

/// Counters kept by the relay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub frames_down: u32,
    pub frames_up: u32,
    pub errors_reported: u32,
}

/// Bridges the serial host and the radio
pub struct GroundRelay<'a, R: LoraRadio, W: Write> {
    radio: R,
    writer: W,
    uplink: UplinkReceiver<'a>,
    stats: RelayStats,
    needs_standby: bool,
}

impl<'a, R: LoraRadio, W: Write> GroundRelay<'a, R, W> {
    pub fn new(radio: R, writer: W, uplink: UplinkReceiver<'a>) -> Self {
        Self {
            radio,
            writer,
            uplink,
            stats: RelayStats::default(),
            needs_standby: false,
        }
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    /// One receive window followed by draining the uplink queue
    ///
    /// Radio problems are reported to the host as error frames; only a
    /// failing serial write is returned.
    pub async fn cycle(&mut self) -> Result<(), W::Error> {
        if self.needs_standby {
            match self.radio.set_standby().await {
                Ok(()) => self.needs_standby = false,
                Err(e) => self.report("entering standby", e).await?,
            }
        }

        match self.radio.receive(MAX_PACKET_SIZE, timing::RX_WINDOW_MS).await {
            Ok(packet) => match decode(&packet.data) {
                Ok(frame) => {
                    log::debug!(
                        "Relay: {:?} frame down, {} bytes, RSSI {}",
                        frame.payload_type,
                        packet.data.len(),
                        packet.rssi
                    );
                    self.writer.write_all(&packet.data).await?;
                    self.writer.write_all(&rssi_frame(packet.rssi)).await?;
                    self.writer.flush().await?;
                    self.stats.frames_down += 1;
                }
                Err(e) => {
                    log::warn!("Relay: undecodable packet ({:?})", e);
                    self.writer.write_all(&error_frame("decoding", &e)).await?;
                    self.writer.flush().await?;
                    self.stats.errors_reported += 1;
                }
            },
            Err(LoraError::ReceiveTimeout) => {}
            Err(e) => {
                self.needs_standby = true;
                self.report("receiving", e).await?;
            }
        }

        while let Ok(frame) = self.uplink.try_receive() {
            match self.radio.transmit(&frame, timing::TX_TIMEOUT_MS).await {
                Ok(()) => {
                    log::debug!("Relay: frame up, {} bytes", frame.len());
                    self.stats.frames_up += 1;
                }
                Err(e) => {
                    self.needs_standby = true;
                    self.report("transmitting", e).await?;
                }
            }
        }

        Ok(())
    }

    async fn report(&mut self, context: &str, error: LoraError) -> Result<(), W::Error> {
        log::warn!("Relay: error while {}: {:?}", context, error);
        self.stats.errors_reported += 1;
        self.writer.write_all(&error_frame(context, &error)).await?;
        self.writer.flush().await
    }
}

/// Read one chunk from the host and queue every complete, valid frame
///
/// Returns the number of bytes read.
pub async fn read_uplink_chunk<Rd: Read>(
    reader: &mut Rd,
    accumulator: &mut FrameAccumulator,
    sender: &UplinkSender<'_>,
) -> Result<usize, Rd::Error> {
    let mut buf = [0u8; serial::READ_CHUNK];
    let n = reader.read(&mut buf).await?;

    for &byte in &buf[..n] {
        if let Some(frame) = accumulator.push(byte) {
            if let Err(e) = decode(&frame) {
                log::warn!("Relay: dropping host frame ({:?})", e);
                continue;
            }
            sender.send(frame).await;
        }
    }

    Ok(n)
}

/// Task that reads uplink frames from the host
pub async fn uplink_reader_task<Rd: Read>(mut reader: Rd, sender: UplinkSender<'static>) -> ! {
    let mut accumulator = FrameAccumulator::new();
    loop {
        if let Err(e) = read_uplink_chunk(&mut reader, &mut accumulator, &sender).await {
            log::warn!("Relay: serial read failed ({:?})", e);
            accumulator.reset();
        }
    }
}

/// Task that runs relay cycles forever
pub async fn ground_relay_task<R: LoraRadio, W: Write>(mut relay: GroundRelay<'static, R, W>) -> ! {
    loop {
        if let Err(e) = relay.cycle().await {
            log::warn!("Relay: serial write failed ({:?})", e);
        }
    }
}
