pub mod control;
pub mod framing;
pub mod packet;

pub use control::{ControlError, ControlUpdate, FlightTargets};
pub use framing::FrameAccumulator;
pub use packet::{decode, encode, error_frame, rssi_frame, Frame, FrameError, PayloadType};
