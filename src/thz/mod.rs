//! The thz module contains the components responsible for the core THZ
//! protocol implementation: the frame codec, the serial transport and the
//! request/response transaction engine.

pub mod frame;
pub mod protocol;
pub mod serial;
pub mod serial_mock;

pub use frame::{FrameDecoder, ThzFrame};
pub use serial::{SerialConfig, ThzDeviceHandle, ThzPort};
