// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake spawner and mounter with call recording, for tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use outpost_core::{Receipt, Task};
use parking_lot::Mutex;

use super::{MountError, Mounter, RemotePhase, RemoteStatus, SpawnError, Spawner};
use crate::storage::ReceiptStore;

/// One recorded spawner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnerCall {
    Spawn(String),
    Describe(String),
    Kill(String),
    List,
}

/// Scriptable in-memory [`Spawner`].
///
/// By default every spawned container reports `Running` (with the
/// configured address) on the first describe. The builders delay or
/// deny that to exercise the waiting and failure paths.
#[derive(Clone)]
pub struct FakeSpawner {
    inner: Arc<Mutex<State>>,
}

struct State {
    calls: Vec<SpawnerCall>,
    addr: String,
    running_after: u32,
    never_running: bool,
    fail_spawn: Option<String>,
    spawned: u32,
    describes: HashMap<String, u32>,
    receipts: Vec<Receipt>,
    store: Option<ReceiptStore>,
    killed: Vec<Receipt>,
}

impl Default for FakeSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(State {
                calls: Vec::new(),
                addr: "10.0.0.1:564".to_string(),
                running_after: 1,
                never_running: false,
                fail_spawn: None,
                spawned: 0,
                describes: HashMap::new(),
                receipts: Vec::new(),
                store: None,
                killed: Vec::new(),
            })),
        }
    }

    /// Address `describe` reports once a container runs.
    pub fn with_addr(self, addr: impl Into<String>) -> Self {
        self.inner.lock().addr = addr.into();
        self
    }

    /// `describe` answers `Pending` until the nth call per container.
    pub fn running_after(self, n: u32) -> Self {
        self.inner.lock().running_after = n;
        self
    }

    /// `describe` never reports `Running`.
    pub fn never_running(self) -> Self {
        self.inner.lock().never_running = true;
        self
    }

    pub fn fail_spawn(self, message: impl Into<String>) -> Self {
        self.inner.lock().fail_spawn = Some(message.into());
        self
    }

    /// Serve `list` from a receipt store instead of the preset list.
    pub fn with_store(self, store: ReceiptStore) -> Self {
        self.inner.lock().store = Some(store);
        self
    }

    /// Preset a receipt for `list`.
    pub fn push_receipt(&self, receipt: Receipt) {
        self.inner.lock().receipts.push(receipt);
    }

    pub fn calls(&self) -> Vec<SpawnerCall> {
        self.inner.lock().calls.clone()
    }

    pub fn killed(&self) -> Vec<Receipt> {
        self.inner.lock().killed.clone()
    }

    pub fn kill_count(&self) -> usize {
        self.inner.lock().killed.len()
    }

    pub fn describe_count(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, SpawnerCall::Describe(_)))
            .count()
    }
}

#[async_trait]
impl Spawner for FakeSpawner {
    async fn spawn(&self, task: &Task) -> Result<Receipt, SpawnError> {
        let mut st = self.inner.lock();
        st.calls.push(SpawnerCall::Spawn(task.id.clone()));
        if let Some(msg) = &st.fail_spawn {
            return Err(SpawnError::Spawn(msg.clone()));
        }
        let name = format!("fake-{}", st.spawned);
        st.spawned += 1;
        Ok(Receipt { name, ..Default::default() })
    }

    async fn describe(&self, receipt: &Receipt) -> Result<RemoteStatus, SpawnError> {
        let mut st = self.inner.lock();
        st.calls.push(SpawnerCall::Describe(receipt.name.clone()));
        let count = {
            let entry = st.describes.entry(receipt.name.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        if st.never_running || count < st.running_after {
            return Ok(RemoteStatus { phase: RemotePhase::Pending, addr: None });
        }
        Ok(RemoteStatus { phase: RemotePhase::Running, addr: Some(st.addr.clone()) })
    }

    async fn kill(&self, receipt: &Receipt) -> Result<(), SpawnError> {
        let mut st = self.inner.lock();
        st.calls.push(SpawnerCall::Kill(receipt.name.clone()));
        st.killed.push(receipt.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Receipt>, SpawnError> {
        let mut st = self.inner.lock();
        st.calls.push(SpawnerCall::List);
        match &st.store {
            Some(store) => store.list().map_err(|e| SpawnError::List(e.to_string())),
            None => Ok(st.receipts.clone()),
        }
    }
}

/// In-memory [`Mounter`]: a successful mount just creates the target
/// directory, so tests can drop files into it to play the remote side.
#[derive(Clone, Default)]
pub struct FakeMounter {
    inner: Arc<Mutex<MounterState>>,
}

#[derive(Default)]
struct MounterState {
    mounts: Vec<(String, PathBuf)>,
    unmounts: Vec<PathBuf>,
    fail_mount: Option<String>,
}

impl FakeMounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_mount(self, message: impl Into<String>) -> Self {
        self.inner.lock().fail_mount = Some(message.into());
        self
    }

    pub fn mounts(&self) -> Vec<(String, PathBuf)> {
        self.inner.lock().mounts.clone()
    }

    pub fn unmounts(&self) -> Vec<PathBuf> {
        self.inner.lock().unmounts.clone()
    }
}

#[async_trait]
impl Mounter for FakeMounter {
    async fn mount(&self, addr: &str, path: &Path) -> Result<(), MountError> {
        // The real helper creates the target before mounting, so a
        // failed mount still leaves a directory to clean up.
        tokio::fs::create_dir_all(path).await.map_err(|e| MountError::Mount(e.to_string()))?;
        let mut st = self.inner.lock();
        st.mounts.push((addr.to_string(), path.to_path_buf()));
        if let Some(msg) = &st.fail_mount {
            return Err(MountError::Mount(msg.clone()));
        }
        Ok(())
    }

    async fn unmount(&self, path: &Path) -> Result<(), MountError> {
        self.inner.lock().unmounts.push(path.to_path_buf());
        Ok(())
    }
}
