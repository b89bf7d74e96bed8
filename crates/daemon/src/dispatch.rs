// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol adapter: maps decoded requests onto the tree.
//!
//! One [`Session`] per connection. Open handles live in the session's
//! fid table; everything path-addressed resolves fresh against the
//! root. Domain errors become error replies with their display text.

use std::collections::HashMap;
use std::sync::Arc;

use outpost_core::{create, lookup, remove, split_path, FsError, Handle, Node};
use outpost_wire::{Reply, Request};

use crate::server::Root;

pub struct Session {
    root: Arc<Root>,
    fids: HashMap<u32, Handle>,
    next_fid: u32,
}

impl Session {
    pub fn new(root: Arc<Root>) -> Self {
        Self { root, fids: HashMap::new(), next_fid: 1 }
    }

    pub async fn handle(&mut self, request: Request) -> Reply {
        match request {
            Request::Walk { path } | Request::Stat { path } => self.stat(&path),
            Request::Open { path } => self.open(&path),
            Request::Create { parent, name, mode } => self.create(&parent, &name, mode),
            Request::Remove { path } => self.remove(&path).await,
            Request::Truncate { path, size } => self.truncate(&path, size),
            // Modtime is managed internally; the request is valid noise.
            Request::Utimes { path } => match lookup(self.root.dir(), &path) {
                Ok(_) => Reply::Ok,
                Err(e) => Reply::error(e),
            },
            Request::Read { fid, count } => self.read(fid, count).await,
            Request::Write { fid, data } => self.write(fid, &data),
            Request::Clunk { fid } => self.clunk(fid),
        }
    }

    fn stat(&self, path: &str) -> Reply {
        match lookup(self.root.dir(), path).and_then(|node| node.stat()) {
            Ok(info) => Reply::Info { info },
            Err(e) => Reply::error(e),
        }
    }

    fn open(&mut self, path: &str) -> Reply {
        match lookup(self.root.dir(), path).and_then(|node| node.open()) {
            Ok(handle) => Reply::Fid { fid: self.register(handle) },
            Err(e) => Reply::error(e),
        }
    }

    fn create(&mut self, parent: &str, name: &str, mode: u32) -> Reply {
        match create(self.root.dir(), parent, name, mode).and_then(|node| node.open()) {
            Ok(handle) => Reply::Fid { fid: self.register(handle) },
            Err(e) => Reply::error(e),
        }
    }

    /// Slot directories tear their remote down on removal; everything
    /// else is a plain tree detach. Missing targets succeed.
    async fn remove(&mut self, path: &str) -> Reply {
        if let [name] = split_path(path).as_slice() {
            if self.root.remove_slot(name).await {
                return Reply::Ok;
            }
        }
        match remove(self.root.dir(), path) {
            Ok(_) => Reply::Ok,
            Err(e) => Reply::error(e),
        }
    }

    fn truncate(&self, path: &str, size: u64) -> Reply {
        let node = match lookup(self.root.dir(), path) {
            Ok(node) => node,
            Err(e) => return Reply::error(e),
        };
        match node {
            Node::Regular(f) => {
                f.truncate(size as usize);
                Reply::Ok
            }
            // Silently fine for directories.
            Node::Dir(_) | Node::DiskDir(_) => Reply::Ok,
            _ => Reply::error(FsError::NotSupported),
        }
    }

    async fn read(&mut self, fid: u32, count: u32) -> Reply {
        let Some(handle) = self.fids.get_mut(&fid) else {
            return Reply::error(format!("unknown fid {fid}"));
        };
        if handle.is_dir() {
            match handle.readdir(count as usize) {
                Ok(entries) => Reply::Entries { entries },
                Err(e) => Reply::error(e),
            }
        } else {
            match handle.read(count as usize).await {
                Ok(data) => Reply::Data { data },
                Err(e) => Reply::error(e),
            }
        }
    }

    fn write(&mut self, fid: u32, data: &[u8]) -> Reply {
        let Some(handle) = self.fids.get_mut(&fid) else {
            return Reply::error(format!("unknown fid {fid}"));
        };
        match handle.write(data) {
            Ok(count) => Reply::Count { count: count as u32 },
            Err(e) => Reply::error(e),
        }
    }

    fn clunk(&mut self, fid: u32) -> Reply {
        let Some(mut handle) = self.fids.remove(&fid) else {
            return Reply::error(format!("unknown fid {fid}"));
        };
        match handle.close() {
            Ok(()) => Reply::Ok,
            Err(e) => Reply::error(e),
        }
    }

    fn register(&mut self, handle: Handle) -> u32 {
        let fid = self.next_fid;
        self.next_fid += 1;
        self.fids.insert(fid, handle);
        fid
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
