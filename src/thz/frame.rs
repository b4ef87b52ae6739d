//! # THZ Frame Codec
//!
//! This module turns a logical request (a command byte plus optional
//! payload) into the on-wire escaped byte sequence with checksum and
//! terminator, and turns an on-wire sequence back into a logical payload.
//!
//! A frame on the wire looks like
//!
//! ```text
//! SOH direction checksum payload... DLE ETX
//! ```
//!
//! where payload bytes equal to DLE or the secondary escape marker 0x2B are
//! expanded into two-byte escape sequences before transmission and collapsed
//! back on reception. The checksum is the byte sum over every frame byte
//! except the checksum position itself, computed on the unescaped logical
//! bytes.
//!
//! Decoding is incremental: [`FrameDecoder`] consumes one byte at a time,
//! which matches the transport's bounded single-byte reads, and classifies
//! every framing violation as a distinct [`ThzError`].

use crate::constants::{
    CHECKSUM_POS, DIR_GET, DIR_SET, DLE, ESC2, ESC2_COMPANION, ETX, MAX_FRAME_LEN, MIN_FRAME_LEN,
    SOH, STATUS_BAD_CHECKSUM,
};
use crate::error::ThzError;
use bytes::{BufMut, BytesMut};
use log::warn;

/// A structurally validated reply frame.
///
/// `payload` holds everything between the checksum byte and the terminator,
/// including the echoed command byte in the first position.
#[derive(Debug, PartialEq, Eq)]
pub struct ThzFrame {
    pub direction: u8,
    pub checksum: u8,
    pub payload: Vec<u8>,
}

/// Byte sum over the frame, skipping the checksum position.
pub fn checksum(frame: &[u8]) -> u8 {
    let mut sum: u8 = 0;
    for (i, byte) in frame.iter().enumerate() {
        if i == CHECKSUM_POS {
            continue;
        }
        sum = sum.wrapping_add(*byte);
    }
    sum
}

/// Pack a read request.
///
/// Read frames are short fixed frames and carry no stuffed payload:
/// `SOH 00 <chk> <cmd> DLE ETX`.
pub fn pack_get_frame(command: u8) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(MIN_FRAME_LEN);
    buf.put_u8(SOH);
    buf.put_u8(DIR_GET);
    buf.put_u8(0);
    buf.put_u8(command);
    buf[CHECKSUM_POS] = checksum(&buf);
    buf.put_u8(DLE);
    buf.put_u8(ETX);
    buf.to_vec()
}

/// Pack a write request with payload.
///
/// The checksum covers the unescaped logical bytes; stuffing is applied to
/// the payload afterwards: a literal DLE is doubled, a literal 0x2B gains
/// its 0x18 companion.
pub fn pack_set_frame(command: u8, payload: &[u8]) -> Vec<u8> {
    let mut chk = SOH.wrapping_add(DIR_SET).wrapping_add(command);
    for byte in payload {
        chk = chk.wrapping_add(*byte);
    }

    let mut buf = BytesMut::with_capacity(MIN_FRAME_LEN + payload.len() * 2);
    buf.put_u8(SOH);
    buf.put_u8(DIR_SET);
    buf.put_u8(chk);
    buf.put_u8(command);
    for &byte in payload {
        buf.put_u8(byte);
        if byte == DLE {
            buf.put_u8(DLE);
        } else if byte == ESC2 {
            buf.put_u8(ESC2_COMPANION);
        }
    }
    buf.put_u8(DLE);
    buf.put_u8(ETX);
    buf.to_vec()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// No escape marker pending.
    Normal,
    /// Previous byte was DLE.
    Escape,
    /// Previous byte was the secondary escape marker; its companion is next.
    Skip,
}

/// Incremental decoder collapsing escape sequences until the frame
/// terminator is found.
///
/// The collapsed buffer retains the full raw frame (header, checksum and
/// trailing `DLE ETX` included) so the checksum can be verified over exactly
/// the bytes the peer summed.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    state: DecodeState,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        FrameDecoder {
            buf: BytesMut::with_capacity(MAX_FRAME_LEN),
            state: DecodeState::Normal,
        }
    }

    /// Feed one raw wire byte.
    ///
    /// Returns `Ok(true)` once the terminator has been consumed, `Ok(false)`
    /// while more bytes are needed.
    pub fn push(&mut self, byte: u8) -> Result<bool, ThzError> {
        if self.buf.len() >= MAX_FRAME_LEN {
            return Err(ThzError::FrameTooLong(self.buf.len()));
        }
        match self.state {
            DecodeState::Escape => {
                if byte == DLE {
                    // escaped DLE collapses to the one already buffered
                    self.state = DecodeState::Normal;
                    Ok(false)
                } else if byte == ETX {
                    self.buf.put_u8(ETX);
                    self.state = DecodeState::Normal;
                    Ok(true)
                } else {
                    Err(ThzError::BadEscape(byte))
                }
            }
            DecodeState::Skip => {
                if byte != ESC2_COMPANION {
                    warn!("bad character after 0x2b: {byte:02x}");
                }
                self.state = DecodeState::Normal;
                Ok(false)
            }
            DecodeState::Normal => {
                if byte == DLE {
                    self.state = DecodeState::Escape;
                } else if byte == ESC2 {
                    self.state = DecodeState::Skip;
                }
                self.buf.put_u8(byte);
                Ok(false)
            }
        }
    }

    /// The collapsed raw frame accumulated so far.
    pub fn raw(&self) -> &[u8] {
        &self.buf
    }

    /// Validate the completed frame and extract its payload.
    pub fn into_frame(self) -> Result<ThzFrame, ThzError> {
        parse_frame(&self.buf)
    }
}

/// Validate a collapsed raw frame and extract the payload.
///
/// Checks run in the same order the peer would notice them: structure,
/// peer-reported status, terminator, checksum.
pub fn parse_frame(raw: &[u8]) -> Result<ThzFrame, ThzError> {
    if raw.len() < MIN_FRAME_LEN || raw[0] != SOH {
        return Err(ThzError::InvalidHeader);
    }
    let direction = raw[1];
    if direction == STATUS_BAD_CHECKSUM {
        return Err(ThzError::PeerChecksumError);
    }
    if direction != DIR_GET {
        return Err(ThzError::PeerCommandError(direction));
    }
    if raw[raw.len() - 2] != DLE || raw[raw.len() - 1] != ETX {
        return Err(ThzError::MissingTerminator);
    }
    let expected = raw[CHECKSUM_POS];
    let calculated = checksum(&raw[..raw.len() - 2]);
    if expected != calculated {
        return Err(ThzError::ChecksumMismatch {
            expected,
            calculated,
        });
    }
    Ok(ThzFrame {
        direction,
        checksum: expected,
        payload: raw[CHECKSUM_POS + 1..raw.len() - 2].to_vec(),
    })
}
