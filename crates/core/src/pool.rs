// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dense slot id allocation.
//!
//! Ids come back densely: `get` prefers the smallest released id before
//! minting a new one, so the tree stays `/0`, `/1`, … instead of
//! marching upward forever. `claim` pre-registers ids recovered from
//! persisted receipts at startup.

use std::collections::BTreeSet;

use parking_lot::Mutex;

use crate::error::FsError;

#[derive(Default)]
pub struct IdPool {
    inner: Mutex<State>,
}

#[derive(Default)]
struct State {
    free: BTreeSet<u32>,
    out: BTreeSet<u32>,
}

impl IdPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the smallest free id, minting `max(out)+1` (or 0) when
    /// nothing has been released.
    pub fn get(&self) -> u32 {
        let mut st = self.inner.lock();
        let id = match st.free.iter().next().copied() {
            Some(id) => {
                st.free.remove(&id);
                id
            }
            None => st.out.iter().next_back().map(|max| max + 1).unwrap_or(0),
        };
        st.out.insert(id);
        id
    }

    /// Return `id` to the pool. Ids the pool never handed out are
    /// ignored, so double-put is harmless.
    pub fn put(&self, id: u32) {
        let mut st = self.inner.lock();
        if st.out.remove(&id) {
            st.free.insert(id);
        }
    }

    /// Register `id` as held without allocating it, for recovery.
    pub fn claim(&self, id: u32) -> Result<(), FsError> {
        let mut st = self.inner.lock();
        if st.out.contains(&id) {
            return Err(FsError::AlreadyOut(id));
        }
        st.free.remove(&id);
        st.out.insert(id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
