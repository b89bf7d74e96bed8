// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-then-close input file.
//!
//! A plumber collects bytes until the client closes it, then hands the
//! accumulated blob to a hook exactly once. The hook decides whether the
//! blob is committed: returning `false` re-arms the plumber so the
//! client can keep writing and try again. Closing with nothing written
//! never fires the hook.

use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::error::FsError;
use crate::info::FileInfo;
use crate::limit::LimitBuffer;

/// Commit hook. Receives the accumulated bytes; returns whether the
/// plumber should consider itself committed.
pub type PlumbHook = Box<dyn Fn(&[u8]) -> bool + Send + Sync>;

pub struct Plumber {
    name: String,
    hook: PlumbHook,
    state: Mutex<State>,
}

struct State {
    buf: LimitBuffer,
    plumbed: bool,
    modified: SystemTime,
}

impl Plumber {
    /// `max` of zero means no write cap.
    pub fn new(name: impl Into<String>, max: usize, hook: PlumbHook) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            hook,
            state: Mutex::new(State {
                buf: LimitBuffer::new(max),
                plumbed: false,
                modified: SystemTime::now(),
            }),
        })
    }

    pub fn write(&self, p: &[u8]) -> Result<usize, FsError> {
        let mut st = self.state.lock();
        if st.plumbed {
            return Err(FsError::AlreadyPlumbed);
        }
        st.modified = SystemTime::now();
        st.buf.write(p)
    }

    /// Fire the hook if anything accumulated. The hook runs under the
    /// state lock so no write can interleave with the commit decision.
    pub fn close(&self) -> Result<(), FsError> {
        let mut st = self.state.lock();
        if st.plumbed {
            return Err(FsError::AlreadyPlumbed);
        }
        if st.buf.is_empty() {
            return Ok(());
        }
        st.plumbed = (self.hook)(st.buf.bytes());
        Ok(())
    }

    pub fn stat(&self) -> FileInfo {
        let st = self.state.lock();
        FileInfo::file(&self.name, st.buf.len() as u64, 0o222, st.modified)
    }
}

#[cfg(test)]
#[path = "plumber_tests.rs"]
mod tests;
