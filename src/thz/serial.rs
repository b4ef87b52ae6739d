//! # THZ Serial Transport
//!
//! This module owns the serial line: it opens and reopens the device in raw
//! mode, arbitrates exclusive access across cooperating processes via an
//! advisory lock on the device fd, and exposes byte-level read/write
//! primitives with a bounded wait per read attempt.

use crate::constants::{BAUD_RATE, READ_TIMEOUT, REOPEN_BACKOFF, SETTLE_TIME};
use crate::error::ThzError;
use crate::util::hex::format_hex_compact;
use log::{debug, info, trace, warn};
use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};
use std::io;
use std::os::unix::io::AsRawFd;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::SerialPortBuilderExt;

/// Configuration for the serial connection.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baudrate: u32,
    /// Ceiling on every blocking byte read.
    pub read_timeout: Duration,
    /// Pause between closing and reopening the device.
    pub settle_time: Duration,
    /// Backoff between failed open attempts.
    pub reopen_backoff: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            baudrate: BAUD_RATE,
            read_timeout: READ_TIMEOUT,
            settle_time: SETTLE_TIME,
            reopen_backoff: REOPEN_BACKOFF,
        }
    }
}

/// Trait for byte-level port operations, including the advisory lock that
/// arbitrates exclusive access to the physical line.
#[async_trait::async_trait]
pub trait ThzPort: AsyncReadExt + AsyncWriteExt + Unpin + Send {
    async fn flush_port(&mut self) -> Result<(), io::Error>;

    /// Block until the exclusive advisory lock on the channel is held.
    async fn lock_exclusive(&self) -> Result<(), ThzError>;

    /// Take the lock only if it is free; [`ThzError::LockUnavailable`]
    /// when another process holds it.
    fn try_lock_exclusive(&self) -> Result<(), ThzError>;

    /// Release the advisory lock. Failure is logged, never propagated.
    fn unlock(&self);
}

#[async_trait::async_trait]
impl ThzPort for tokio_serial::SerialStream {
    async fn flush_port(&mut self) -> Result<(), io::Error> {
        AsyncWriteExt::flush(self).await
    }

    async fn lock_exclusive(&self) -> Result<(), ThzError> {
        let fd = self.as_raw_fd();
        tokio::task::spawn_blocking(move || flock(fd, FlockArg::LockExclusive))
            .await
            .map_err(|e| ThzError::Io(e.to_string()))?
            .map_err(|e| ThzError::Io(format!("lock failed: {e}")))
    }

    fn try_lock_exclusive(&self) -> Result<(), ThzError> {
        match flock(self.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => Ok(()),
            Err(e) if e == Errno::EWOULDBLOCK => Err(ThzError::LockUnavailable),
            Err(e) => Err(ThzError::Io(format!("lock failed: {e}"))),
        }
    }

    fn unlock(&self) {
        if let Err(e) = flock(self.as_raw_fd(), FlockArg::Unlock) {
            warn!("unlock failed: {e}");
        }
    }
}

/// Represents a handle to the THZ serial connection, encapsulating the port
/// and its timing configuration.
pub struct ThzDeviceHandle<P: ThzPort = tokio_serial::SerialStream> {
    port: P,
    config: SerialConfig,
}

impl ThzDeviceHandle<tokio_serial::SerialStream> {
    /// Establishes a connection to the serial port using the provided port
    /// name, with default settings (raw 8N1 at 115200 baud).
    pub async fn connect(port_name: &str) -> Result<Self, ThzError> {
        Self::connect_with_config(port_name, SerialConfig::default()).await
    }

    /// Establishes a connection with custom config.
    pub async fn connect_with_config(
        port_name: &str,
        config: SerialConfig,
    ) -> Result<Self, ThzError> {
        let port = Self::open_port(port_name, &config)?;
        Ok(ThzDeviceHandle { port, config })
    }

    /// Opens the device, retrying indefinitely with backoff.
    ///
    /// This mirrors the collector's reopen policy: the call does not return
    /// failure; it blocks until the device can be opened.
    pub async fn open_retrying(port_name: &str, config: SerialConfig) -> Self {
        loop {
            info!("opening {port_name}");
            match Self::open_port(port_name, &config) {
                Ok(port) => {
                    info!("opened {port_name}");
                    return ThzDeviceHandle { port, config };
                }
                Err(e) => {
                    warn!(
                        "could not open {port_name} (retry in {}s): {e}",
                        config.reopen_backoff.as_secs()
                    );
                    tokio::time::sleep(config.reopen_backoff).await;
                }
            }
        }
    }

    /// Reopens the device, blocking until it comes back. The old descriptor
    /// is dropped when the replacement is in place.
    pub async fn reopen(&mut self, port_name: &str) {
        debug!("reopening {port_name}");
        tokio::time::sleep(self.config.settle_time).await;
        loop {
            info!("opening {port_name}");
            match Self::open_port(port_name, &self.config) {
                Ok(port) => {
                    self.port = port;
                    info!("opened {port_name}");
                    return;
                }
                Err(e) => {
                    warn!(
                        "could not open {port_name} (retry in {}s): {e}",
                        self.config.reopen_backoff.as_secs()
                    );
                    tokio::time::sleep(self.config.reopen_backoff).await;
                }
            }
        }
    }

    fn open_port(
        port_name: &str,
        config: &SerialConfig,
    ) -> Result<tokio_serial::SerialStream, ThzError> {
        use tokio_serial::SerialPort;

        let port = tokio_serial::new(port_name, config.baudrate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .timeout(config.read_timeout)
            .open_native_async()
            .map_err(|e| ThzError::SerialPortError(e.to_string()))?;
        // discard whatever accumulated on the line while we were away
        port.clear(tokio_serial::ClearBuffer::Input)
            .map_err(|e| ThzError::SerialPortError(e.to_string()))?;
        Ok(port)
    }
}

impl<P: ThzPort> ThzDeviceHandle<P> {
    /// Wraps an already-open port, e.g. a mock port in tests.
    pub fn with_port(port: P, config: SerialConfig) -> Self {
        ThzDeviceHandle { port, config }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Waits up to the configured read timeout for one byte.
    ///
    /// Returns exactly one byte, or [`ThzError::Timeout`] when nothing
    /// arrived, or [`ThzError::Eof`] when the channel reports
    /// end-of-stream.
    pub async fn read_byte(&mut self) -> Result<u8, ThzError> {
        let mut byte = [0u8; 1];
        let n = timeout(self.config.read_timeout, self.port.read(&mut byte))
            .await
            .map_err(|_| ThzError::Timeout)?
            .map_err(|e| ThzError::Io(e.to_string()))?;
        if n == 0 {
            return Err(ThzError::Eof);
        }
        trace!("rx byte: {:02x}", byte[0]);
        Ok(byte[0])
    }

    /// Best-effort blocking write of the whole buffer.
    pub async fn write_bytes(&mut self, data: &[u8]) -> Result<(), ThzError> {
        debug!("tx: {} ({})", format_hex_compact(data), data.len());
        self.port
            .write_all(data)
            .await
            .map_err(|e| ThzError::Io(e.to_string()))?;
        self.port
            .flush_port()
            .await
            .map_err(|e| ThzError::Io(e.to_string()))
    }

    /// Block until the exclusive lock on the line is held.
    pub async fn lock(&self) -> Result<(), ThzError> {
        self.port.lock_exclusive().await
    }

    /// Non-blocking lock attempt; used by the liveness probe so it yields
    /// to a concurrent full transaction.
    pub fn try_lock(&self) -> Result<(), ThzError> {
        self.port.try_lock_exclusive()
    }

    pub fn unlock(&self) {
        self.port.unlock()
    }
}
