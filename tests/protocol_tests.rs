//! Transaction-level tests for the protocol engine, run against the mock
//! serial port.

use std::time::Duration;
use thz_rs::constants::{CMD_FIRMWARE_VERSION, DIR_GET, DLE, STX};
use thz_rs::error::ThzError;
use thz_rs::thz::serial_mock::MockSerialPort;
use thz_rs::{fixed_point, SerialConfig, ThzDeviceHandle, ThzPort};
use tokio::time::Instant;

fn test_config() -> SerialConfig {
    SerialConfig {
        read_timeout: Duration::from_millis(50),
        settle_time: Duration::from_millis(1),
        reopen_backoff: Duration::from_millis(1),
        ..SerialConfig::default()
    }
}

fn handle_for(mock: &MockSerialPort) -> ThzDeviceHandle<MockSerialPort> {
    ThzDeviceHandle::with_port(mock.clone(), test_config())
}

/// A firmware query with a 2-byte reply decodes to 46.60 at two decimals.
#[tokio::test]
async fn test_firmware_query_roundtrip() {
    let mock = MockSerialPort::new();
    mock.queue_transaction(CMD_FIRMWARE_VERSION, &[0x12, 0x34]);

    let mut handle = handle_for(&mock);
    let data = handle.request(CMD_FIRMWARE_VERSION, None).await.unwrap();
    assert_eq!(data, vec![0x12, 0x34]);

    let version = fixed_point(&data, 2).unwrap();
    assert_eq!(format!("{version:.2}"), "46.60");

    // request frame, ack-of-ready, post-transaction ack
    let tx = mock.get_tx_data();
    assert_eq!(
        tx,
        vec![0x01, 0x00, 0xFE, 0xFD, 0x10, 0x03, DLE, DLE, STX]
    );
}

/// A write request goes out stuffed and runs the same transaction cycle.
#[tokio::test]
async fn test_set_request_on_wire() {
    let mock = MockSerialPort::new();
    mock.queue_transaction(0x0A, &[]);

    let mut handle = handle_for(&mock);
    let reply = handle.request(0x0A, Some(&[0x10])).await.unwrap();
    assert!(reply.is_empty());

    let tx = mock.get_tx_data();
    // SOH 80 chk cmd DLE DLE (stuffed payload) DLE ETX
    assert_eq!(&tx[..8], &[0x01, 0x80, 0x9B, 0x0A, 0x10, 0x10, 0x10, 0x03]);
}

/// A ready acknowledgement other than DLE STX aborts the transaction
/// before the ack-of-ready byte is written.
#[tokio::test]
async fn test_bad_ack_aborts_without_ack_byte() {
    let mock = MockSerialPort::new();
    mock.queue_rx_data(&[DLE, DLE]); // second byte should be STX

    let mut handle = handle_for(&mock);
    let result = handle.request(0xFB, None).await;
    assert!(matches!(result, Err(ThzError::BadAck(0x10, 0x10))));

    // only the 6-byte request frame went out
    assert_eq!(mock.get_tx_data().len(), 6);
}

/// No ready acknowledgement at all is an AckTimeout, not a plain Timeout.
#[tokio::test]
async fn test_ack_timeout() {
    let mock = MockSerialPort::new();
    let mut handle = handle_for(&mock);
    let result = handle.request(0xFB, None).await;
    assert!(matches!(result, Err(ThzError::AckTimeout)));
}

/// A reply with status 0x02 reports the peer's checksum NAK regardless of
/// the frame's own checksum validity.
#[tokio::test]
async fn test_peer_checksum_nak() {
    let mock = MockSerialPort::new();
    mock.queue_ready_ack();
    mock.queue_rx_data(&[0x01, 0x02, 0xFF, 0xFB, 0x10, 0x03]);

    let mut handle = handle_for(&mock);
    let result = handle.request(0xFB, None).await;
    assert!(matches!(result, Err(ThzError::PeerChecksumError)));
}

/// A malformed escape sequence mid-frame aborts the transaction.
#[tokio::test]
async fn test_decode_error_aborts() {
    let mock = MockSerialPort::new();
    mock.queue_ready_ack();
    mock.queue_rx_data(&[0x01, 0x00, 0xFC, 0xFB, 0x10, 0x55]);

    let mut handle = handle_for(&mock);
    let result = handle.request(0xFB, None).await;
    assert!(matches!(result, Err(ThzError::BadEscape(0x55))));
}

/// Loss of the final acknowledgement does not invalidate the payload.
#[tokio::test]
async fn test_post_ack_failure_keeps_payload() {
    let mock = MockSerialPort::new();
    mock.queue_ready_ack();
    mock.queue_reply(DIR_GET, &[0xFB, 0xAA, 0xBB]);
    // final DLE deliberately not queued

    let mut handle = handle_for(&mock);
    let data = handle.request(0xFB, None).await.unwrap();
    assert_eq!(data, vec![0xAA, 0xBB]);
}

/// End-of-stream surfaces as Eof, not Timeout.
#[tokio::test]
async fn test_eof_propagates() {
    let mock = MockSerialPort::new();
    mock.set_eof();

    let mut handle = handle_for(&mock);
    let result = handle.request(0xFB, None).await;
    assert!(matches!(result, Err(ThzError::Eof)));
}

/// A single answered probe makes ping succeed.
#[tokio::test]
async fn test_ping_ok() {
    let mock = MockSerialPort::new();
    mock.queue_rx_data(&[DLE]);

    let mut handle = handle_for(&mock);
    assert!(handle.ping().await.unwrap());
    assert_eq!(mock.get_tx_data(), vec![STX]);
}

/// Five unanswered probes make ping fail.
#[tokio::test]
async fn test_ping_exhausts_probes() {
    let mock = MockSerialPort::new();
    let mut handle = handle_for(&mock);
    assert!(!handle.ping().await.unwrap());
    assert_eq!(mock.get_tx_data(), vec![STX; 5]);
}

/// Ping yields immediately when the line is locked elsewhere, without
/// waiting out the probe timeouts.
#[tokio::test]
async fn test_ping_yields_on_contention() {
    let mock = MockSerialPort::new();
    let other = mock.clone();
    other.try_lock_exclusive().unwrap();

    let started = Instant::now();
    let mut handle = handle_for(&mock);
    assert!(!handle.ping().await.unwrap());
    assert!(started.elapsed() < Duration::from_millis(40));
    assert!(mock.get_tx_data().is_empty());
}

/// A blocking lock waits until the holder releases, serializing
/// transactions on the shared line.
#[tokio::test]
async fn test_lock_serializes_access() {
    let mock = MockSerialPort::new();
    let holder = mock.clone();
    holder.try_lock_exclusive().unwrap();

    let handle = handle_for(&mock);
    let started = Instant::now();
    let waiter = tokio::spawn(async move {
        handle.lock().await.unwrap();
        let acquired_at = Instant::now();
        handle.unlock();
        acquired_at
    });

    tokio::time::sleep(Duration::from_millis(60)).await;
    holder.unlock();
    let acquired_at = waiter.await.unwrap();
    assert!(acquired_at - started >= Duration::from_millis(55));
}
