//! Records shared between tasks
//!
//! Each record sits behind a critical-section mutex and is only ever copied
//! in or out, so the lock is never held across an await point.

use core::cell::Cell;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::protocol::control::FlightTargets;
use crate::telemetry::status::TelemetryStatus;

/// Copy-in/copy-out guarded value
pub struct Shared<T: Copy> {
    inner: Mutex<CriticalSectionRawMutex, Cell<T>>,
}

impl<T: Copy> Shared<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(Cell::new(value)),
        }
    }

    /// Copy of the current value
    pub fn snapshot(&self) -> T {
        self.inner.lock(|cell| cell.get())
    }

    /// Modify the value in place under the lock
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.inner.lock(|cell| {
            let mut value = cell.get();
            f(&mut value);
            cell.set(value);
        });
    }

    pub fn replace(&self, value: T) -> T {
        self.inner.lock(|cell| cell.replace(value))
    }
}

/// Telemetry written by the sensor task, read by the link task
pub type SharedStatus = Shared<TelemetryStatus>;

/// Targets written by the link task from control frames
pub type SharedTargets = Shared<FlightTargets>;
