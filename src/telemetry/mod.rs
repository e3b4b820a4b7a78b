pub mod shared;
pub mod status;

pub use shared::{Shared, SharedStatus, SharedTargets};
pub use status::{CodecError, FlightStatus, Position, TelemetryStatus};
