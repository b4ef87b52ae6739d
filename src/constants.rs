//! THZ Protocol Constants
//!
//! This module defines the reserved control octets, command bytes and
//! sizing/timing constants of the THZ serial protocol.

use std::time::Duration;

/// Start-of-header octet opening every frame.
pub const SOH: u8 = 0x01;

/// Probe octet; also the second byte of the ready acknowledgement.
pub const STX: u8 = 0x02;

/// End-of-transmission octet closing every frame.
pub const ETX: u8 = 0x03;

/// Acknowledge octet (part of the controller's control set).
pub const ACK: u8 = 0x06;

/// Data-link-escape octet; frame escape marker and acknowledgement lead byte.
pub const DLE: u8 = 0x10;

/// Secondary escape marker appearing in reply payloads.
pub const ESC2: u8 = 0x2B;

/// Companion byte expected after [`ESC2`]; carries no information.
pub const ESC2_COMPANION: u8 = 0x18;

/// Direction byte of a read ("get") request and of a successful reply.
pub const DIR_GET: u8 = 0x00;

/// Direction byte of a write ("set") request.
pub const DIR_SET: u8 = 0x80;

/// Reply status reporting a checksum error in our request.
pub const STATUS_BAD_CHECKSUM: u8 = 0x02;

/// Position of the checksum byte within a frame, counted from SOH.
pub const CHECKSUM_POS: usize = 2;

/// Shortest structurally valid frame: SOH, direction, checksum, command, DLE, ETX.
pub const MIN_FRAME_LEN: usize = 6;

/// Hard upper bound on a decoded frame before the transaction is aborted.
pub const MAX_FRAME_LEN: usize = 1024;

/// Bulk telemetry read command.
pub const CMD_READ_ALL: u8 = 0xFB;

/// Firmware version query command (2-byte reply, 2 decimals).
pub const CMD_FIRMWARE_VERSION: u8 = 0xFD;

/// Line speed of the controller's service port.
pub const BAUD_RATE: u32 = 115_200;

/// Ceiling on every blocking byte read.
pub const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Settle time between closing and reopening the device.
pub const SETTLE_TIME: Duration = Duration::from_secs(1);

/// Backoff between failed attempts to open the device.
pub const REOPEN_BACKOFF: Duration = Duration::from_secs(10);

/// Number of probe bytes a ping transmits before giving up.
pub const PING_ATTEMPTS: u32 = 5;
