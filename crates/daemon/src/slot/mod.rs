// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-slot orchestration: the subtree and the launch state machine.
//!
//! A slot is one numbered subtree under the root, holding `spawn`,
//! `err`, `state` and `mirror/`. Committing a task blob into `spawn`
//! launches the machine: spawn the container, wait for it to run,
//! resolve its address, mount its file service, persist the receipt,
//! and drop the receipt into the mounted tree. Every step that
//! acquires a resource pushes a compensation; any failure unwinds the
//! stack so nothing leaks.

mod progress;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use outpost_core::{Broadcast, Dir, DiskDir, Node, Plumber, Receipt, Task};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{MountError, Mounter, RemotePhase, SpawnError, Spawner};
use crate::storage::{ReceiptStore, StoreError};

use progress::Progress;

/// Timing knobs for the machine. Production uses the defaults; tests
/// shrink them.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Budget for the whole launch, measured from entry to Spawning.
    pub machine_deadline: Duration,
    /// Fresh budget for each compensation, even when the outer
    /// deadline already fired.
    pub compensation_deadline: Duration,
    /// Clamp on the describe poll interval.
    pub poll_cap: Duration,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            machine_deadline: Duration::from_secs(120),
            compensation_deadline: Duration::from_secs(5),
            poll_cap: Duration::from_secs(30),
        }
    }
}

/// Everything a slot needs to act on the world.
pub struct SlotDeps {
    pub spawner: Arc<dyn Spawner>,
    pub mounter: Arc<dyn Mounter>,
    pub store: ReceiptStore,
    pub tuning: Tuning,
}

#[derive(Debug, Error)]
enum SlotError {
    #[error("{0}")]
    Spawn(#[from] SpawnError),
    #[error("remote stopped before reaching running")]
    Stopped,
    #[error("deadline exceeded while {0}")]
    Deadline(&'static str),
    #[error("mount {addr}: {source}")]
    Mount { addr: String, source: MountError },
    #[error("persist receipt: {0}")]
    Persist(#[from] StoreError),
    #[error("write spawned file: {0}")]
    SpawnedFile(std::io::Error),
}

enum SlotState {
    Fresh,
    Spawning,
    Running { receipt: Receipt },
    Failed,
    Closing,
    Closed,
}

/// Deferred undo action, pushed when its resource is acquired and run
/// in reverse order on failure or cancellation.
enum Compensation {
    Kill(Receipt),
    Unmount(PathBuf),
    RemoveMountDir(PathBuf),
    RemoveReceipt(Receipt),
}

enum MachineOutcome {
    Done(Receipt),
    Failed(String),
    Cancelled,
}

/// Exponential describe poll schedule: `10·n²` ms, clamped.
fn poll_delay(attempt: u64, cap: Duration) -> Duration {
    let ms = 10u64.saturating_mul(attempt.saturating_mul(attempt));
    Duration::from_millis(ms).min(cap)
}

pub struct Slot {
    id: u32,
    name: String,
    dir: Arc<Dir>,
    mount_path: PathBuf,
    deps: Arc<SlotDeps>,
    /// None on restored slots, which expose only `mirror/`.
    errs: Option<Arc<Broadcast>>,
    progress: Option<Progress>,
    state: tokio::sync::Mutex<SlotState>,
    machine: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Slot {
    /// Fresh slot with the full subtree. The spawn hook holds a weak
    /// reference: the slot owns its files, never the reverse.
    pub fn new(id: u32, mount_root: &Path, deps: Arc<SlotDeps>) -> Arc<Self> {
        let name = id.to_string();
        let mount_path = mount_root.join(&name);
        let errs = Broadcast::new("err");
        let state_stream = Broadcast::new("state");

        Arc::new_cyclic(|weak: &Weak<Slot>| {
            let dir = Dir::new(&name, 0o777);
            let hook = weak.clone();
            let spawn = Plumber::new(
                "spawn",
                0,
                Box::new(move |bytes| match hook.upgrade() {
                    Some(slot) => slot.plumb(bytes),
                    None => false,
                }),
            );
            let _ = dir.append(Node::Plumber(spawn));
            let _ = dir.append(Node::Broadcast(Arc::clone(&errs)));
            let _ = dir.append(Node::Broadcast(Arc::clone(&state_stream)));
            let _ = dir.append(Node::DiskDir(DiskDir::new("mirror", &mount_path)));

            Slot {
                id,
                name: name.clone(),
                dir,
                mount_path: mount_path.clone(),
                deps: Arc::clone(&deps),
                errs: Some(Arc::clone(&errs)),
                progress: Some(Progress::new(Arc::clone(&state_stream))),
                state: tokio::sync::Mutex::new(SlotState::Fresh),
                machine: Mutex::new(None),
                cancel: CancellationToken::new(),
            }
        })
    }

    /// Slot rebuilt from a persisted receipt at startup. The caller
    /// has already mounted `receipt.addr`; the subtree exposes only
    /// `mirror/`.
    pub fn restored(id: u32, mount_root: &Path, receipt: Receipt, deps: Arc<SlotDeps>) -> Arc<Self> {
        let name = id.to_string();
        let mount_path = mount_root.join(&name);
        let dir = Dir::new(&name, 0o777);
        let _ = dir.append(Node::DiskDir(DiskDir::new("mirror", &mount_path)));
        Arc::new(Self {
            id,
            name,
            dir,
            mount_path,
            deps,
            errs: None,
            progress: None,
            state: tokio::sync::Mutex::new(SlotState::Running { receipt }),
            machine: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Arc<Dir> {
        &self.dir
    }

    pub fn mount_path(&self) -> &Path {
        &self.mount_path
    }

    /// Current machine phase, for logs and tests.
    pub async fn phase(&self) -> &'static str {
        match &*self.state.lock().await {
            SlotState::Fresh => "fresh",
            SlotState::Spawning => "spawning",
            SlotState::Running { .. } => "running",
            SlotState::Failed => "failed",
            SlotState::Closing => "closing",
            SlotState::Closed => "closed",
        }
    }

    /// Spawn-file commit hook. Decodes the blob and launches the
    /// machine on its own task; the protocol path never blocks on it.
    fn plumb(self: &Arc<Self>, bytes: &[u8]) -> bool {
        let task = match Task::decode(bytes) {
            Ok(task) => task,
            Err(e) => {
                warn!(slot = %self.name, error = %e, "rejecting task blob");
                self.report_failure(&format!("decode task: {e}"));
                return false;
            }
        };
        info!(slot = %self.name, task = %task.id, "task committed");
        let slot = Arc::clone(self);
        let handle = tokio::spawn(async move { slot.run(task).await });
        *self.machine.lock() = Some(handle);
        true
    }

    async fn run(self: Arc<Self>, task: Task) {
        {
            let mut st = self.state.lock().await;
            if !matches!(*st, SlotState::Fresh) {
                return;
            }
            *st = SlotState::Spawning;
        }

        let mut comps: Vec<Compensation> = Vec::new();
        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => MachineOutcome::Cancelled,
            result = tokio::time::timeout(
                self.deps.tuning.machine_deadline,
                self.advance(&task, &mut comps),
            ) => match result {
                Ok(Ok(receipt)) => MachineOutcome::Done(receipt),
                Ok(Err(e)) => MachineOutcome::Failed(e.to_string()),
                Err(_) => {
                    MachineOutcome::Failed(SlotError::Deadline(self.phase_label()).to_string())
                }
            },
        };

        match outcome {
            MachineOutcome::Done(receipt) => {
                let mut st = self.state.lock().await;
                if matches!(*st, SlotState::Closing | SlotState::Closed) {
                    drop(st);
                    info!(slot = %self.name, "removed during launch, rolling back");
                    self.unwind(comps).await;
                } else {
                    *st = SlotState::Running { receipt };
                    drop(st);
                    self.close_streams();
                    info!(slot = %self.name, "remote running");
                }
            }
            MachineOutcome::Failed(message) => {
                warn!(slot = %self.name, error = %message, "launch failed");
                self.unwind(comps).await;
                self.report_failure(&message);
                let mut st = self.state.lock().await;
                if !matches!(*st, SlotState::Closing | SlotState::Closed) {
                    *st = SlotState::Failed;
                }
            }
            MachineOutcome::Cancelled => {
                debug!(slot = %self.name, "launch cancelled");
                self.unwind(comps).await;
                self.report_failure("cancelled");
            }
        }
    }

    /// The forward path. Each acquired resource pushes its undo before
    /// the next await, so the stack is exact at every failure point.
    async fn advance(
        &self,
        task: &Task,
        comps: &mut Vec<Compensation>,
    ) -> Result<Receipt, SlotError> {
        self.step(1, "starting mount");

        self.step(2, "spawning");
        let mut receipt = self.deps.spawner.spawn(task).await?;
        comps.push(Compensation::Kill(receipt.clone()));

        receipt.addr = self.wait_running(&receipt).await?;
        self.step(3, "spawned");

        // The helper creates the mount directory even when the mount
        // itself fails, so its removal is armed first.
        comps.push(Compensation::RemoveMountDir(self.mount_path.clone()));
        self.deps
            .mounter
            .mount(&receipt.addr, &self.mount_path)
            .await
            .map_err(|e| SlotError::Mount { addr: receipt.addr.clone(), source: e })?;
        comps.push(Compensation::Unmount(self.mount_path.clone()));
        self.step(4, "mounted");

        self.step(5, "persisting");
        receipt.slot = Some(self.id);
        self.deps.store.write(&receipt)?;
        comps.push(Compensation::RemoveReceipt(receipt.clone()));
        self.step(6, "saved");

        self.write_spawned(&receipt)?;
        self.step(7, "done!");
        Ok(receipt)
    }

    /// Poll describe until the remote runs and has an address. The
    /// outer machine deadline bounds this loop.
    async fn wait_running(&self, receipt: &Receipt) -> Result<String, SlotError> {
        let mut attempt: u64 = 1;
        loop {
            match self.deps.spawner.describe(receipt).await {
                Ok(status) => match status.phase {
                    RemotePhase::Running => {
                        let addr = status
                            .addr
                            .filter(|a| !a.is_empty())
                            .or_else(|| Some(receipt.addr.clone()).filter(|a| !a.is_empty()));
                        if let Some(addr) = addr {
                            return Ok(addr);
                        }
                        // Running without an address yet: keep polling.
                    }
                    RemotePhase::Stopped => return Err(SlotError::Stopped),
                    RemotePhase::Pending => {}
                },
                Err(e) => debug!(slot = %self.name, error = %e, "describe failed, retrying"),
            }
            tokio::time::sleep(poll_delay(attempt, self.deps.tuning.poll_cap)).await;
            attempt += 1;
        }
    }

    /// Drop the receipt into the mounted tree so the remote's own
    /// files carry it.
    fn write_spawned(&self, receipt: &Receipt) -> Result<(), SlotError> {
        let mut bytes = receipt.encode().map_err(|e| {
            SlotError::SpawnedFile(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        bytes.push(b'\n');
        std::fs::write(self.mount_path.join("spawned"), bytes).map_err(SlotError::SpawnedFile)
    }

    /// Unwind the compensation stack, newest first. Each action gets a
    /// fresh deadline; failures are logged and never stop the rest.
    async fn unwind(&self, mut comps: Vec<Compensation>) {
        while let Some(comp) = comps.pop() {
            let deadline = self.deps.tuning.compensation_deadline;
            match tokio::time::timeout(deadline, self.compensate(&comp)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(slot = %self.name, error = %e, "compensation failed"),
                Err(_) => warn!(slot = %self.name, "compensation timed out"),
            }
        }
    }

    async fn compensate(&self, comp: &Compensation) -> Result<(), String> {
        match comp {
            Compensation::Kill(receipt) => {
                self.deps.spawner.kill(receipt).await.map_err(|e| e.to_string())
            }
            Compensation::Unmount(path) => {
                self.deps.mounter.unmount(path).await.map_err(|e| e.to_string())
            }
            Compensation::RemoveMountDir(path) => match tokio::fs::remove_dir_all(path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.to_string()),
            },
            Compensation::RemoveReceipt(receipt) => {
                self.deps.store.remove(receipt).map_err(|e| e.to_string())
            }
        }
    }

    /// Drive the slot to Closed: cancel a machine in flight, then
    /// release whatever a Running slot still holds. Idempotent.
    pub async fn close(&self) {
        let prior = {
            let mut st = self.state.lock().await;
            if matches!(*st, SlotState::Closing | SlotState::Closed) {
                return;
            }
            std::mem::replace(&mut *st, SlotState::Closing)
        };

        self.cancel.cancel();
        let machine = self.machine.lock().take();
        if let Some(handle) = machine {
            if let Err(e) = handle.await {
                warn!(slot = %self.name, error = %e, "machine task aborted");
            }
        }

        if let SlotState::Running { receipt } = prior {
            info!(slot = %self.name, remote = %receipt.name, "tearing down remote");
            let deadline = self.deps.tuning.compensation_deadline;
            let steps = [
                Compensation::Unmount(self.mount_path.clone()),
                Compensation::Kill(receipt.clone()),
                Compensation::RemoveReceipt(receipt),
                Compensation::RemoveMountDir(self.mount_path.clone()),
            ];
            for step in &steps {
                match tokio::time::timeout(deadline, self.compensate(step)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(slot = %self.name, error = %e, "teardown step failed"),
                    Err(_) => warn!(slot = %self.name, "teardown step timed out"),
                }
            }
        }

        self.close_streams();
        *self.state.lock().await = SlotState::Closed;
    }

    fn step(&self, step: u32, description: &'static str) {
        if let Some(progress) = &self.progress {
            progress.step(step, description);
        }
    }

    fn phase_label(&self) -> &'static str {
        self.progress.as_ref().map(|p| p.phase()).unwrap_or("launching")
    }

    /// One JSON error object, then both streams close.
    fn report_failure(&self, message: &str) {
        if let Some(errs) = &self.errs {
            progress::write_error(errs, message);
        }
        self.close_streams();
    }

    fn close_streams(&self) {
        if let Some(progress) = &self.progress {
            progress.close();
        }
        if let Some(errs) = &self.errs {
            errs.close();
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
