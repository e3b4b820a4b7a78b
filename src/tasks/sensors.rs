//! Sensor task feeding the shared telemetry record

use core::fmt::Debug;
use core::future::Future;
use embedded_hal_async::delay::DelayNs;

use crate::config::timing;
use crate::telemetry::shared::SharedStatus;
use crate::telemetry::status::Position;

/// Navigation solution from the GPS receiver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Metres above sea level
    pub altitude: f32,
    /// Ground speed in m/s
    pub speed: f32,
}

/// Source of navigation fixes
pub trait FixSource {
    type Error: Debug;

    /// Wait for the next fix
    fn read_fix(&mut self) -> impl Future<Output = Result<NavigationFix, Self::Error>>;
}

/// Copy a fix into the shared status record
pub fn record_fix(status: &SharedStatus, fix: &NavigationFix) {
    status.update(|current| {
        current.position = Some(Position {
            latitude: fix.latitude,
            longitude: fix.longitude,
        });
        current.altitude = fix.altitude;
        current.speed = fix.speed;
    });
}

/// Read one fix and record it; read failures are logged and skipped
pub async fn sensor_cycle<S: FixSource>(source: &mut S, status: &SharedStatus) -> bool {
    match source.read_fix().await {
        Ok(fix) => {
            record_fix(status, &fix);
            true
        }
        Err(e) => {
            log::warn!("Sensors: fix read failed ({:?})", e);
            false
        }
    }
}

/// Task that keeps the shared record up to date
pub async fn sensor_task<S: FixSource, D: DelayNs>(
    mut source: S,
    status: &'static SharedStatus,
    mut delay: D,
) -> ! {
    loop {
        sensor_cycle(&mut source, status).await;
        delay.delay_ms(timing::FIX_INTERVAL_MS).await;
    }
}
