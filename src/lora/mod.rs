pub mod bus;
pub mod completion;
pub mod driver;
pub mod modem;
pub mod registers;
pub mod traits;

pub use bus::{RegisterBus, SpiRegisterBus};
pub use completion::{Completion, EdgeCompletion, PollingCompletion};
pub use driver::Sx127xDriver;
pub use modem::{ConfigSnapshot, ModemConfig};
pub use registers::RadioMode;
pub use traits::{ConfigError, LoraError, LoraRadio, RxPacket};
