// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and recovery.

use std::fs::{self, File};
use std::io::Write;
use std::sync::Arc;

use fs2::FileExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{Mounter, Spawner};
use crate::listener::Listener;
use crate::server::Root;
use crate::slot::SlotDeps;
use crate::storage::ReceiptStore;

use super::{Config, LifecycleError};

/// A started daemon: the root tree and the listener, plus the token
/// that stops it.
pub struct Started {
    pub root: Arc<Root>,
    pub listener: Listener,
    pub shutdown: CancellationToken,
    // NOTE(lifetime): held to maintain the exclusive lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

/// Bring the daemon up: lock the mount root, sweep stale mounts,
/// restore slots from persisted receipts, bind the listener.
pub async fn startup(
    config: &Config,
    spawner: Arc<dyn Spawner>,
    mounter: Arc<dyn Mounter>,
) -> Result<Started, LifecycleError> {
    fs::create_dir_all(&config.mount_root)?;

    // Lock first: two daemons on one mount root corrupt each other.
    // OpenOptions avoids truncating a running daemon's PID before we
    // hold the lock.
    let mut lock_file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| LifecycleError::LockFailed(config.lock_path.clone()))?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    sweep_stale_mounts(config, mounter.as_ref()).await?;

    let store = ReceiptStore::new(&config.receipt_dir);
    let deps = Arc::new(SlotDeps {
        spawner: Arc::clone(&spawner),
        mounter,
        store,
        tuning: config.tuning.clone(),
    });
    let root = Root::new(&config.mount_root, deps);

    // Receipts are the only durable state; each one becomes a
    // mirror-only slot. A receipt that fails to mount stays in the
    // store for the operator.
    let receipts = spawner.list().await?;
    let total = receipts.len();
    let mut restored = 0usize;
    for receipt in receipts {
        let name = receipt.name.clone();
        match root.restore(receipt).await {
            Ok(()) => restored += 1,
            Err(e) => warn!(remote = %name, error = %e, "skipping receipt, left in store"),
        }
    }
    if total > 0 {
        info!(restored, total, "recovered slots from receipts");
    }

    let tcp = TcpListener::bind(&config.listen)
        .await
        .map_err(|e| LifecycleError::Bind { addr: config.listen.clone(), source: e })?;
    if let Ok(addr) = tcp.local_addr() {
        info!(%addr, mount_root = %config.mount_root.display(), "serving");
    }

    let shutdown = CancellationToken::new();
    let listener = Listener::new(tcp, Arc::clone(&root), shutdown.clone());
    Ok(Started { root, listener, shutdown, lock_file })
}

/// Best-effort cleanup of whatever a previous run left under the mount
/// root: unmount, then remove. The host may hold stale mounts that
/// neither step can fix; those are logged and left.
async fn sweep_stale_mounts(config: &Config, mounter: &dyn Mounter) -> Result<(), LifecycleError> {
    for entry in fs::read_dir(&config.mount_root)?.flatten() {
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        if let Err(e) = mounter.unmount(&path).await {
            debug!(path = %path.display(), error = %e, "stale unmount failed");
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => info!(path = %path.display(), "swept stale mount dir"),
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove stale dir"),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
