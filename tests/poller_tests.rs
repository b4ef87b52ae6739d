//! Tests for the spool writer and the posting trigger policy.

use tempfile::tempdir;
use thz_rs::error::ThzError;
use thz_rs::poller::should_trigger;
use thz_rs::spool_value;
use thz_rs::ReadingDef;

fn def(trigger: f64) -> ReadingDef {
    ReadingDef {
        pos: 0,
        name: "TAussen".into(),
        decimals: 1,
        uuid: Some("30c8a2b0-45ae-4f6c-9d9a-0001".into()),
        trigger,
    }
}

#[test]
fn test_spool_file_name() {
    let dir = tempdir().unwrap();
    let path = spool_value(dir.path(), 1700000000123, "chan-1", 46.6).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "1700000000123_chan-1_46.6"
    );
    assert!(path.exists());
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn test_spool_integral_value_has_no_fraction() {
    let dir = tempdir().unwrap();
    let path = spool_value(dir.path(), 42, "chan-1", 20.0).unwrap();
    assert_eq!(path.file_name().unwrap().to_str().unwrap(), "42_chan-1_20");
}

#[test]
fn test_spool_refuses_overwrite() {
    let dir = tempdir().unwrap();
    spool_value(dir.path(), 42, "chan-1", 1.0).unwrap();
    let second = spool_value(dir.path(), 42, "chan-1", 1.0);
    assert!(matches!(second, Err(ThzError::Spool(_))));
}

#[test]
fn test_threshold_trigger() {
    let d = def(0.5);
    assert!(!should_trigger(&d, 20.0, 20.3));
    assert!(should_trigger(&d, 20.0, 21.0));
}

#[test]
fn test_edge_trigger_zero_transition_and_crossing() {
    let d = def(-50.0);
    // zero/non-zero transitions
    assert!(should_trigger(&d, 0.0, 10.0));
    assert!(should_trigger(&d, 10.0, 0.0));
    // threshold crossings around 50
    assert!(should_trigger(&d, 40.0, 60.0));
    assert!(should_trigger(&d, 60.0, 40.0));
    // movement on one side of the threshold stays quiet
    assert!(!should_trigger(&d, 60.0, 70.0));
    assert!(!should_trigger(&d, 30.0, 40.0));
}
