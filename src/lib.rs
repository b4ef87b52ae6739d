//! # thz-rs - A Rust Crate for THZ Heat-Pump Controller Telemetry
//!
//! The thz-rs crate talks to a serial-attached THZ/LWZ heat-pump controller
//! and persists scalar readings to a filesystem spool for later ingestion
//! by an external metering system.
//!
//! ## Features
//!
//! - Connect to the controller's service port over a raw serial line
//! - Byte-stuffed, checksummed request/response framing with strict error
//!   classification
//! - Liveness probing and a full request/acknowledge/response/acknowledge
//!   transaction engine, serialized across processes by an advisory lock
//! - Fixed-point decoding of telemetry values at configured payload offsets
//! - A monitor loop posting readings to spool marker files on configurable
//!   triggers
//! - Support for logging and error handling
//!
//! ## Usage
//!
//! ```no_run
//! use thz_rs::{connect, init_logger, ThzError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ThzError> {
//!     init_logger();
//!     let mut handle = connect("/dev/ttyUSB0").await?;
//!     if handle.ping().await? {
//!         let payload = handle.request(0xFB, None).await?;
//!         println!("{} payload bytes", payload.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod payload;
pub mod poller;
pub mod spool;
pub mod thz;
pub mod util;

pub use crate::error::ThzError;
pub use crate::logging::{init_logger, log_info};

// Core protocol types
pub use thz::frame::{FrameDecoder, ThzFrame};
pub use thz::serial::{SerialConfig, ThzDeviceHandle, ThzPort};

// Monitor layer
pub use config::{load_config, parse_config, MonitorConfig};
pub use payload::{fixed_point, ReadingDef};
pub use poller::Monitor;
pub use spool::spool_value;

/// Connect to a THZ controller via serial port.
///
/// # Arguments
/// * `port` - Serial port path (e.g., "/dev/ttyUSB0")
///
/// # Returns
/// * `Ok(ThzDeviceHandle)` - Connected device handle for communication
/// * `Err(ThzError)` - Connection failed
pub async fn connect(port: &str) -> Result<ThzDeviceHandle, ThzError> {
    ThzDeviceHandle::connect(port).await
}
