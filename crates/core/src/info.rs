// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File metadata record shared between nodes and the wire protocol.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Stat record for a node: the answer to Walk and Stat requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    /// Unix permission bits (e.g. 0o444). Directory-ness is carried by
    /// `is_dir`, not by a mode flag.
    pub mode: u32,
    /// Last modification, seconds since the Unix epoch.
    pub modified: u64,
    pub is_dir: bool,
}

impl FileInfo {
    pub fn file(name: impl Into<String>, size: u64, mode: u32, modified: SystemTime) -> Self {
        Self { name: name.into(), size, mode, modified: unix_secs(modified), is_dir: false }
    }

    pub fn dir(name: impl Into<String>, mode: u32, modified: SystemTime) -> Self {
        Self { name: name.into(), size: 0, mode, modified: unix_secs(modified), is_dir: true }
    }
}

/// Seconds since the epoch; zero for pre-epoch times.
pub(crate) fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
