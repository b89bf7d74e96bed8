// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-on-demand file backed by a hook.
//!
//! Each open gets its own handle; each read on a handle calls the hook
//! with the client's buffer. The hook either fills the buffer (and may
//! flag the handle terminal so the next read is EOF) or fails without
//! side effects — a too-small buffer must cost the caller nothing.

use std::sync::Arc;
use std::time::SystemTime;

use crate::error::FsError;
use crate::info::FileInfo;

/// Read hook: fill `buf`, return the byte count and whether this handle
/// is done producing. Must be atomic: on error, no state consumed.
pub type ReadHook = Box<dyn Fn(&mut [u8]) -> Result<(usize, bool), FsError> + Send + Sync>;

pub struct Synthetic {
    name: String,
    modified: SystemTime,
    hook: ReadHook,
}

impl Synthetic {
    pub fn new(name: impl Into<String>, hook: ReadHook) -> Arc<Self> {
        Arc::new(Self { name: name.into(), modified: SystemTime::now(), hook })
    }

    pub fn open(self: &Arc<Self>) -> SyntheticHandle {
        SyntheticHandle { file: Arc::clone(self), done: false }
    }

    pub fn stat(&self) -> FileInfo {
        FileInfo::file(&self.name, 0, 0o444, self.modified)
    }
}

pub struct SyntheticHandle {
    file: Arc<Synthetic>,
    done: bool,
}

impl SyntheticHandle {
    pub fn read(&mut self, count: usize) -> Result<Vec<u8>, FsError> {
        if self.done {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; count];
        let (n, terminal) = (self.file.hook)(&mut buf)?;
        if terminal {
            self.done = true;
        }
        buf.truncate(n);
        Ok(buf)
    }
}

#[cfg(test)]
#[path = "synth_tests.rs"]
mod tests;
