// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host mount helper: shells out to plan9port's `9 mount`/`9 umount`.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{MountError, Mounter};

/// Mounts remote 9P endpoints with the host's `9` helper.
#[derive(Debug, Clone, Default)]
pub struct HostMounter;

impl HostMounter {
    pub fn new() -> Self {
        Self
    }

    async fn run(cmd: &str, args: &[&str]) -> Result<(), String> {
        let status = Command::new(cmd)
            .args(args)
            .status()
            .await
            .map_err(|e| format!("{cmd}: {e}"))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("{cmd} {}: {status}", args.join(" ")))
        }
    }
}

#[async_trait]
impl Mounter for HostMounter {
    async fn mount(&self, addr: &str, path: &Path) -> Result<(), MountError> {
        tokio::fs::create_dir_all(path).await.map_err(|e| MountError::Mount(e.to_string()))?;
        let target = path.to_string_lossy();
        Self::run("9", &["mount", addr, &target]).await.map_err(MountError::Mount)
    }

    async fn unmount(&self, path: &Path) -> Result<(), MountError> {
        let target = path.to_string_lossy();
        if Self::run("9", &["umount", &target]).await.is_ok() {
            return Ok(());
        }
        // Not every host routes umount through the 9 wrapper.
        debug!(path = %target, "9 umount failed, trying plain umount");
        Self::run("umount", &[&target]).await.map_err(MountError::Unmount)
    }
}
