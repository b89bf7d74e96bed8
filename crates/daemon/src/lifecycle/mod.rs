// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration, startup, recovery.

mod startup;
pub use startup::{startup, Started};

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::adapters::SpawnError;
use crate::slot::Tuning;

/// Daemon configuration. Two knobs — the listen address and the mount
/// root — with everything else derived next to the mount root so the
/// startup sweep of its subdirectories never eats our own state.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address the protocol server listens on.
    pub listen: String,
    /// Directory remote trees are mounted under; one subdirectory per
    /// slot. The daemon assumes exclusive ownership.
    pub mount_root: PathBuf,
    /// Receipt directory, default `<mount-root>.receipts`.
    pub receipt_dir: PathBuf,
    /// Lock file asserting exclusive ownership, `<mount-root>.lock`.
    pub lock_path: PathBuf,
    pub tuning: Tuning,
}

impl Config {
    pub fn new(listen: impl Into<String>, mount_root: impl Into<PathBuf>) -> Self {
        let mount_root = mount_root.into();
        Self {
            listen: listen.into(),
            receipt_dir: sibling(&mount_root, "receipts"),
            lock_path: sibling(&mount_root, "lock"),
            mount_root,
            tuning: Tuning::default(),
        }
    }

    pub fn with_receipt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.receipt_dir = dir.into();
        self
    }
}

/// `<mount_root>.<suffix>`, next to the mount root.
fn sibling(mount_root: &Path, suffix: &str) -> PathBuf {
    let mut name = mount_root
        .file_name()
        .unwrap_or_else(|| OsStr::new("outpost"))
        .to_os_string();
    name.push(format!(".{suffix}"));
    mount_root.with_file_name(name)
}

/// Errors from daemon startup.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("another instance holds {0}")]
    LockFailed(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bind {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },

    #[error(transparent)]
    List(#[from] SpawnError),
}
