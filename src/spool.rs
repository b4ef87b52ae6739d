//! Spool marker files.
//!
//! A posted reading becomes an empty file named
//! `<epoch-millis>_<uuid>_<value>` in the spool directory, picked up later
//! by the external metering importer. The file carries no contents; the
//! name is the record.

use crate::error::ThzError;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Write one spool marker. Refuses to overwrite an existing file.
pub fn spool_value(dir: &Path, ts_millis: u64, uuid: &str, value: f64) -> Result<PathBuf, ThzError> {
    let path = dir.join(format!("{ts_millis}_{uuid}_{value}"));
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| ThzError::Spool(format!("create {}: {e}", path.display())))?;
    Ok(path)
}
