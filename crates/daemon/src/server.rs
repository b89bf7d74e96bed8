// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Root of the served tree: `clone` plus the per-slot directories.
//!
//! The root owns the id pool and the slot registry. Reading `clone`
//! atomically allocates an id, inserts a fresh slot subtree, and yields
//! `"<id>\n"`; removing a slot directory drives its machine to Closed
//! and returns the id. Restore rebuilds mirror-only slots from
//! persisted receipts at startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use outpost_core::{Dir, FsError, IdPool, Node, Receipt, Synthetic};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use crate::adapters::MountError;
use crate::slot::{Slot, SlotDeps};

/// Errors from rebuilding a slot out of a persisted receipt.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("receipt has no address")]
    NoAddr,
    #[error(transparent)]
    Mount(#[from] MountError),
    #[error(transparent)]
    Tree(#[from] FsError),
}

pub struct Root {
    dir: Arc<Dir>,
    pool: IdPool,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
    deps: Arc<SlotDeps>,
    mount_root: PathBuf,
}

impl Root {
    pub fn new(mount_root: &Path, deps: Arc<SlotDeps>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Root>| {
            let dir = Dir::new("/", 0o555);
            let hook = weak.clone();
            let clone = Synthetic::new(
                "clone",
                Box::new(move |buf| match hook.upgrade() {
                    Some(root) => root.clone_read(buf),
                    None => Err(FsError::NotExist),
                }),
            );
            let _ = dir.append(Node::Synthetic(clone));
            Root {
                dir,
                pool: IdPool::new(),
                slots: Mutex::new(HashMap::new()),
                deps,
                mount_root: mount_root.to_path_buf(),
            }
        })
    }

    pub fn dir(&self) -> &Arc<Dir> {
        &self.dir
    }

    pub fn slot(&self, name: &str) -> Option<Arc<Slot>> {
        self.slots.lock().get(name).cloned()
    }

    /// The clone hook: allocate, insert, yield. A short buffer fails
    /// the read atomically — the id goes straight back to the pool and
    /// no subtree appears.
    fn clone_read(&self, buf: &mut [u8]) -> Result<(usize, bool), FsError> {
        let id = self.pool.get();
        let payload = format!("{id}\n");
        if payload.len() > buf.len() {
            self.pool.put(id);
            return Err(FsError::ShortBuffer { need: payload.len(), got: buf.len() });
        }

        let slot = Slot::new(id, &self.mount_root, Arc::clone(&self.deps));
        if let Err(e) = self.dir.append(Node::Dir(Arc::clone(slot.dir()))) {
            self.pool.put(id);
            return Err(e);
        }
        self.slots.lock().insert(slot.name().to_string(), Arc::clone(&slot));
        info!(slot = %slot.name(), "slot allocated");

        buf[..payload.len()].copy_from_slice(payload.as_bytes());
        Ok((payload.len(), true))
    }

    /// Tear a slot down and detach its directory. Idempotent: removing
    /// an unknown name reports false and changes nothing.
    pub async fn remove_slot(&self, name: &str) -> bool {
        let slot = self.slots.lock().remove(name);
        let Some(slot) = slot else {
            return false;
        };
        slot.close().await;
        self.dir.remove(name);
        self.pool.put(slot.id());
        info!(slot = %name, "slot removed");
        true
    }

    /// Rebuild a slot from a persisted receipt: claim its recorded id
    /// (fall back to a fresh one), mount its address, and expose only
    /// `mirror/`. On failure the receipt is left in the store for the
    /// operator.
    pub async fn restore(&self, receipt: Receipt) -> Result<(), RestoreError> {
        if receipt.addr.is_empty() {
            return Err(RestoreError::NoAddr);
        }

        let id = match receipt.slot {
            Some(id) => match self.pool.claim(id) {
                Ok(()) => id,
                Err(e) => {
                    warn!(remote = %receipt.name, error = %e, "recorded slot id unavailable");
                    self.pool.get()
                }
            },
            // Receipts written before ids were recorded.
            None => self.pool.get(),
        };

        let mount_path = self.mount_root.join(id.to_string());
        if let Err(e) = self.deps.mounter.mount(&receipt.addr, &mount_path).await {
            self.pool.put(id);
            return Err(e.into());
        }

        let addr = receipt.addr.clone();
        let slot = Slot::restored(id, &self.mount_root, receipt, Arc::clone(&self.deps));
        if let Err(e) = self.dir.append(Node::Dir(Arc::clone(slot.dir()))) {
            self.pool.put(id);
            return Err(e.into());
        }
        self.slots.lock().insert(slot.name().to_string(), Arc::clone(&slot));
        info!(slot = %slot.name(), %addr, "slot restored");
        Ok(())
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
