// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Receipt persistence for crash recovery.
//!
//! Receipts are the only durable state: a flat directory with one JSON
//! file per live container, named by the receipt's stable hash.
//! Recovery treats the directory as a set and re-mounts whatever it
//! finds.

use std::fs;
use std::path::{Path, PathBuf};

use outpost_core::Receipt;
use thiserror::Error;
use tracing::warn;

/// Errors from receipt store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode/decode error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct ReceiptStore {
    dir: PathBuf,
}

impl ReceiptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a receipt atomically (temp file + rename). Returns the
    /// hash it was filed under.
    pub fn write(&self, receipt: &Receipt) -> Result<String, StoreError> {
        fs::create_dir_all(&self.dir)?;
        let hash = receipt.hash()?;
        let tmp = self.dir.join(format!(".{hash}.tmp"));
        fs::write(&tmp, receipt.encode()?)?;
        fs::rename(&tmp, self.dir.join(&hash))?;
        Ok(hash)
    }

    /// Unlink a receipt. Missing is not an error: removal is invoked
    /// from compensation paths that must be idempotent.
    pub fn remove(&self, receipt: &Receipt) -> Result<(), StoreError> {
        let hash = receipt.hash()?;
        match fs::remove_file(self.dir.join(&hash)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Every well-formed receipt in the directory. Malformed entries
    /// are logged and skipped, never fatal.
    pub fn list(&self) -> Result<Vec<Receipt>, StoreError> {
        let rd = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut receipts = Vec::new();
        for entry in rd.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
                continue;
            }
            match fs::read(entry.path()).map_err(StoreError::from).and_then(|bytes| {
                Receipt::decode(&bytes).map_err(StoreError::from)
            }) {
                Ok(receipt) => receipts.push(receipt),
                Err(e) => warn!(file = %name, error = %e, "skipping malformed receipt"),
            }
        }
        Ok(receipts)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
