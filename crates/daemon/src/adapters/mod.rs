// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapters for external I/O: the cloud runtime and the host mount
//! helper. The slot machine only ever sees these traits; the concrete
//! drivers live in submodules.

pub mod host;
pub mod k8s;

pub use host::HostMounter;
pub use k8s::KubernetesSpawner;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMounter, FakeSpawner, SpawnerCall};

use std::path::Path;

use async_trait::async_trait;
use outpost_core::{Receipt, Task};
use thiserror::Error;

/// Errors from cloud runtime operations.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("describe failed: {0}")]
    Describe(String),
    #[error("kill failed: {0}")]
    Kill(String),
    #[error("list failed: {0}")]
    List(String),
}

/// Errors from the host mount helper.
#[derive(Debug, Error)]
pub enum MountError {
    #[error("mount: {0}")]
    Mount(String),
    #[error("unmount: {0}")]
    Unmount(String),
}

/// Coarse remote container phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemotePhase {
    Pending,
    Running,
    Stopped,
}

/// Answer to a `describe` call: the phase, plus the container's
/// network address once the runtime has assigned one.
#[derive(Debug, Clone)]
pub struct RemoteStatus {
    pub phase: RemotePhase,
    pub addr: Option<String>,
}

/// The cloud runtime. Two spawns of the same blob yield two independent
/// containers; `kill` is safe on an already-stopped container; `list`
/// returns every receipt this orchestrator previously persisted,
/// regardless of current container status.
#[async_trait]
pub trait Spawner: Send + Sync + 'static {
    async fn spawn(&self, task: &Task) -> Result<Receipt, SpawnError>;

    async fn describe(&self, receipt: &Receipt) -> Result<RemoteStatus, SpawnError>;

    async fn kill(&self, receipt: &Receipt) -> Result<(), SpawnError>;

    async fn list(&self) -> Result<Vec<Receipt>, SpawnError>;
}

/// The OS-level mount helper. `mount` creates the target path if
/// absent; `unmount` detaches it.
#[async_trait]
pub trait Mounter: Send + Sync + 'static {
    async fn mount(&self, addr: &str, path: &Path) -> Result<(), MountError>;

    async fn unmount(&self, path: &Path) -> Result<(), MountError>;
}
