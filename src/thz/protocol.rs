//! # THZ Protocol Engine
//!
//! Drives one full request/response transaction over the transport using
//! the frame codec: liveness probing, request transmission, the two-phase
//! acknowledgement handshake, byte-by-byte response collection and the
//! post-transaction acknowledgement.
//!
//! Neither the engine nor the codec retries internally; every failure is
//! returned to the caller as a distinct [`ThzError`]. The exception is the
//! probe loop in [`ThzDeviceHandle::ping`], because a single missed probe
//! byte is expected noise on this link.

use crate::constants::{DLE, PING_ATTEMPTS, STX};
use crate::error::ThzError;
use crate::thz::frame::{pack_get_frame, pack_set_frame, FrameDecoder};
use crate::thz::serial::{ThzDeviceHandle, ThzPort};
use crate::util::hex::format_hex_compact;
use log::{debug, warn};

/// Represents the states a transaction passes through.
///
/// The engine holds no state between calls; this exists for trace logging
/// and to document the per-transaction lifecycle.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TransactionState {
    Idle,
    LockHeld,
    SentRequest,
    AwaitAck,
    AckSent,
    Receiving,
    Validating,
    Done,
    Failed,
}

fn trace_state(state: TransactionState) {
    debug!("transaction: {state:?}");
}

impl<P: ThzPort> ThzDeviceHandle<P> {
    /// Probe the peer for liveness without running a full transaction.
    ///
    /// Acquires the lock non-blocking and yields (`Ok(false)`) if another
    /// transaction is in progress. Transmits a single probe byte up to five
    /// times, each followed by a bounded wait for any reply byte.
    pub async fn ping(&mut self) -> Result<bool, ThzError> {
        match self.try_lock() {
            Ok(()) => {}
            Err(ThzError::LockUnavailable) => {
                debug!("ping: line locked elsewhere, yielding");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
        let result = self.probe().await;
        self.unlock();
        result
    }

    async fn probe(&mut self) -> Result<bool, ThzError> {
        for attempt in 1..=PING_ATTEMPTS {
            self.write_bytes(&[STX]).await?;
            match self.read_byte().await {
                Ok(reply) => {
                    debug!("ping reply {reply:02x} (attempt {attempt})");
                    return Ok(true);
                }
                Err(ThzError::Timeout) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    /// Run one request/response transaction and return the reply payload.
    ///
    /// A request without payload is a read; with payload it is a write and
    /// the payload is transmitted byte-stuffed. The echoed command byte is
    /// stripped from the returned payload. The lock is released on every
    /// exit path; retries are the caller's responsibility.
    pub async fn request(
        &mut self,
        command: u8,
        payload: Option<&[u8]>,
    ) -> Result<Vec<u8>, ThzError> {
        trace_state(TransactionState::Idle);
        self.lock().await?;
        trace_state(TransactionState::LockHeld);
        let result = self.transact(command, payload).await;
        self.unlock();
        trace_state(match &result {
            Ok(_) => TransactionState::Done,
            Err(_) => TransactionState::Failed,
        });
        result
    }

    async fn transact(
        &mut self,
        command: u8,
        payload: Option<&[u8]>,
    ) -> Result<Vec<u8>, ThzError> {
        let frame = match payload {
            Some(data) => pack_set_frame(command, data),
            None => pack_get_frame(command),
        };
        self.write_bytes(&frame).await?;
        trace_state(TransactionState::SentRequest);

        // the peer announces readiness with DLE STX
        trace_state(TransactionState::AwaitAck);
        let first = self.read_ack_byte().await?;
        let second = self.read_ack_byte().await?;
        if first != DLE || second != STX {
            return Err(ThzError::BadAck(first, second));
        }
        self.write_bytes(&[DLE]).await?;
        trace_state(TransactionState::AckSent);

        trace_state(TransactionState::Receiving);
        let mut decoder = FrameDecoder::new();
        loop {
            let byte = match self.read_byte().await {
                Ok(byte) => byte,
                Err(e) => {
                    debug!(
                        "rx so far: {} ({})",
                        format_hex_compact(decoder.raw()),
                        decoder.raw().len()
                    );
                    return Err(e);
                }
            };
            if decoder.push(byte)? {
                break;
            }
        }

        trace_state(TransactionState::Validating);
        debug!(
            "rx: {} ({})",
            format_hex_compact(decoder.raw()),
            decoder.raw().len()
        );
        let frame = decoder.into_frame()?;

        // failure here is logged but does not invalidate the decoded payload
        if !self.confirm().await {
            warn!("post-transaction acknowledgement failed");
        }

        let mut data = frame.payload;
        data.remove(0); // echoed command byte
        Ok(data)
    }

    /// One byte of the ready acknowledgement; a timeout here is a
    /// handshake violation, not a plain read timeout.
    async fn read_ack_byte(&mut self) -> Result<u8, ThzError> {
        self.read_byte().await.map_err(|e| match e {
            ThzError::Timeout => ThzError::AckTimeout,
            other => other,
        })
    }

    /// Post-transaction acknowledgement: send DLE STX, expect DLE back.
    async fn confirm(&mut self) -> bool {
        if let Err(e) = self.write_bytes(&[DLE, STX]).await {
            warn!("ack failed: {e}");
            return false;
        }
        match self.read_byte().await {
            Ok(DLE) => {
                debug!("ack ok");
                true
            }
            Ok(other) => {
                warn!("ack failed: got {other:02x}");
                false
            }
            Err(e) => {
                warn!("ack failed: {e}");
                false
            }
        }
    }
}
