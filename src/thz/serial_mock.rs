//! Mock serial port implementation for testing
//!
//! This module provides a mock port that scripts the peer's side of a THZ
//! conversation without requiring actual hardware. Clones share buffers and
//! the advisory-lock flag, so lock contention between two handles is
//! testable in-process.
//!
//! Unlike a pipe, an empty receive queue does not read as end-of-stream:
//! the transport distinguishes `Timeout` from `Eof`, so the mock stalls
//! (`Poll::Pending`) until data is queued or EOF is signalled explicitly.

use crate::constants::{DIR_GET, DLE, ESC2, ESC2_COMPANION, ETX, SOH, STX};
use crate::error::ThzError;
use crate::thz::serial::ThzPort;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Mock serial port that simulates the controller's side of the line.
#[derive(Clone, Default)]
pub struct MockSerialPort {
    /// Data written to the port (outgoing).
    tx_buffer: Arc<Mutex<Vec<u8>>>,
    /// Data to be read from the port (incoming).
    rx_buffer: Arc<Mutex<VecDeque<u8>>>,
    /// Simulated error for the next read or write.
    next_error: Arc<Mutex<Option<io::Error>>>,
    /// When set, an empty receive queue reads as end-of-stream.
    eof: Arc<Mutex<bool>>,
    /// Shared advisory-lock flag.
    lock_held: Arc<Mutex<bool>>,
    /// Reader parked on an empty queue.
    read_waker: Arc<Mutex<Option<Waker>>>,
}

impl MockSerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes to be read from the port.
    pub fn queue_rx_data(&self, data: &[u8]) {
        self.rx_buffer.lock().unwrap().extend(data);
        self.wake_reader();
    }

    /// Queue the peer's ready acknowledgement.
    pub fn queue_ready_ack(&self) {
        self.queue_rx_data(&[DLE, STX]);
    }

    /// Queue a reply frame with the given status and logical payload
    /// (escape stuffing applied), `payload[0]` being the echoed command.
    pub fn queue_reply(&self, status: u8, payload: &[u8]) {
        self.queue_rx_data(&encode_reply(status, payload));
    }

    /// Script a complete successful transaction: ready-ack, reply frame
    /// echoing `command` with `data`, and the final acknowledgement byte.
    pub fn queue_transaction(&self, command: u8, data: &[u8]) {
        self.queue_ready_ack();
        let mut payload = Vec::with_capacity(data.len() + 1);
        payload.push(command);
        payload.extend_from_slice(data);
        self.queue_reply(DIR_GET, &payload);
        self.queue_rx_data(&[DLE]);
    }

    /// Get data that was written to the port.
    pub fn get_tx_data(&self) -> Vec<u8> {
        self.tx_buffer.lock().unwrap().clone()
    }

    /// Clear all buffers.
    pub fn clear(&self) {
        self.tx_buffer.lock().unwrap().clear();
        self.rx_buffer.lock().unwrap().clear();
    }

    /// Set an error to be returned on the next operation.
    pub fn set_next_error(&self, error: io::Error) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    /// Make an empty receive queue read as end-of-stream.
    pub fn set_eof(&self) {
        *self.eof.lock().unwrap() = true;
        self.wake_reader();
    }

    fn wake_reader(&self) {
        if let Some(waker) = self.read_waker.lock().unwrap().take() {
            waker.wake();
        }
    }
}

/// Build the wire form of a reply frame: header, checksum over the
/// unescaped bytes, stuffed payload, terminator.
pub fn encode_reply(status: u8, payload: &[u8]) -> Vec<u8> {
    let mut chk = SOH.wrapping_add(status);
    for byte in payload {
        chk = chk.wrapping_add(*byte);
    }
    let mut wire = vec![SOH, status, chk];
    for &byte in payload {
        wire.push(byte);
        if byte == DLE {
            wire.push(DLE);
        } else if byte == ESC2 {
            wire.push(ESC2_COMPANION);
        }
    }
    wire.push(DLE);
    wire.push(ETX);
    wire
}

impl AsyncRead for MockSerialPort {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Poll::Ready(Err(error));
        }

        let mut rx = self.rx_buffer.lock().unwrap();
        let available = rx.len().min(buf.remaining());
        if available > 0 {
            let data: Vec<u8> = rx.drain(..available).collect();
            buf.put_slice(&data);
            return Poll::Ready(Ok(()));
        }
        if *self.eof.lock().unwrap() {
            // zero-byte read signals end-of-stream
            return Poll::Ready(Ok(()));
        }
        *self.read_waker.lock().unwrap() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl AsyncWrite for MockSerialPort {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Poll::Ready(Err(error));
        }
        self.tx_buffer.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait::async_trait]
impl ThzPort for MockSerialPort {
    async fn flush_port(&mut self) -> Result<(), io::Error> {
        Ok(())
    }

    async fn lock_exclusive(&self) -> Result<(), ThzError> {
        loop {
            {
                let mut held = self.lock_held.lock().unwrap();
                if !*held {
                    *held = true;
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn try_lock_exclusive(&self) -> Result<(), ThzError> {
        let mut held = self.lock_held.lock().unwrap();
        if *held {
            Err(ThzError::LockUnavailable)
        } else {
            *held = true;
            Ok(())
        }
    }

    fn unlock(&self) {
        *self.lock_held.lock().unwrap() = false;
    }
}
