//! Embassy tasks module
//!
//! Contains the async tasks for both ends of the link. They are generic over
//! the radio, serial and delay traits so they run against mocks on the host.

pub mod link;
pub mod relay;
pub mod sensors;

pub use link::{telemetry_task, LinkStats, TelemetryLink};
pub use relay::{
    ground_relay_task, uplink_reader_task, GroundRelay, UplinkChannel, UplinkReceiver,
    UplinkSender,
};
pub use sensors::{record_fix, sensor_task, FixSource, NavigationFix};
