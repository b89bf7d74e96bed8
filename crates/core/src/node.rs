// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File nodes and per-open handles.
//!
//! A [`Node`] is one entry in the served tree: a tagged variant over the
//! in-memory buffer kinds, directories, and disk mirrors. Opening a node
//! yields a [`Handle`] carrying the per-open state (read cursor,
//! broadcast subscription, synthetic terminal flag, directory offset).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::broadcast::{Broadcast, BroadcastReader};
use crate::error::FsError;
use crate::info::FileInfo;
use crate::limit::LimitBuffer;
use crate::plumber::Plumber;
use crate::synth::{Synthetic, SyntheticHandle};

/// One entry in the tree.
#[derive(Clone)]
pub enum Node {
    Plumber(Arc<Plumber>),
    Broadcast(Arc<Broadcast>),
    Synthetic(Arc<Synthetic>),
    Regular(Arc<MemFile>),
    Dir(Arc<Dir>),
    DiskDir(Arc<DiskDir>),
    Disk(Arc<DiskFile>),
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            Node::Plumber(_) => "Plumber",
            Node::Broadcast(_) => "Broadcast",
            Node::Synthetic(_) => "Synthetic",
            Node::Regular(_) => "Regular",
            Node::Dir(_) => "Dir",
            Node::DiskDir(_) => "DiskDir",
            Node::Disk(_) => "Disk",
        };
        f.debug_tuple(variant).finish()
    }
}

impl Node {
    pub fn name(&self) -> String {
        match self {
            Node::Plumber(f) => f.stat().name,
            Node::Broadcast(f) => f.stat().name,
            Node::Synthetic(f) => f.stat().name,
            Node::Regular(f) => f.name().to_string(),
            Node::Dir(d) => d.name().to_string(),
            Node::DiskDir(d) => d.name().to_string(),
            Node::Disk(f) => f.name(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Dir(_) | Node::DiskDir(_))
    }

    pub fn stat(&self) -> Result<FileInfo, FsError> {
        match self {
            Node::Plumber(f) => Ok(f.stat()),
            Node::Broadcast(f) => Ok(f.stat()),
            Node::Synthetic(f) => Ok(f.stat()),
            Node::Regular(f) => Ok(f.stat()),
            Node::Dir(d) => Ok(d.stat()),
            Node::DiskDir(d) => Ok(d.stat()),
            Node::Disk(f) => f.stat(),
        }
    }

    pub fn open(&self) -> Result<Handle, FsError> {
        match self {
            Node::Plumber(f) => Ok(Handle::Plumber(Arc::clone(f))),
            Node::Broadcast(f) => {
                Ok(Handle::Broadcast { file: Arc::clone(f), reader: f.subscribe() })
            }
            Node::Synthetic(f) => Ok(Handle::Synthetic(f.open())),
            Node::Regular(f) => Ok(Handle::Regular(f.open())),
            Node::Dir(d) => Ok(Handle::Dir(DirHandle::mem(Arc::clone(d)))),
            Node::DiskDir(d) => Ok(Handle::Dir(DirHandle::disk(Arc::clone(d)))),
            Node::Disk(f) => Ok(Handle::Disk(f.open()?)),
        }
    }

    /// Node-level close, run when the node is removed from the tree.
    /// Committing a plumber and stopping a broadcast live here; every
    /// other kind has nothing to release.
    pub fn close(&self) -> Result<(), FsError> {
        match self {
            Node::Plumber(f) => f.close(),
            Node::Broadcast(f) => {
                f.close();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn as_dir(&self) -> Option<&Arc<Dir>> {
        match self {
            Node::Dir(d) => Some(d),
            _ => None,
        }
    }

    /// Children of a directory-kind node, a fresh snapshot per call.
    pub fn list(&self) -> Result<Vec<Node>, FsError> {
        match self {
            Node::Dir(d) => Ok(d.entries()),
            Node::DiskDir(d) => Ok(d.entries()),
            _ => Err(FsError::NotADirectory(self.name())),
        }
    }
}

/// In-memory directory with uniquely named children.
pub struct Dir {
    name: String,
    perm: u32,
    state: Mutex<DirState>,
}

struct DirState {
    children: IndexMap<String, Node>,
    modified: SystemTime,
}

impl Dir {
    pub fn new(name: impl Into<String>, perm: u32) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            perm,
            state: Mutex::new(DirState { children: IndexMap::new(), modified: SystemTime::now() }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lookup(&self, name: &str) -> Option<Node> {
        self.state.lock().children.get(name).cloned()
    }

    pub fn append(&self, child: Node) -> Result<(), FsError> {
        let name = child.name();
        let mut st = self.state.lock();
        if st.children.contains_key(&name) {
            return Err(FsError::AlreadyExists(name));
        }
        st.modified = SystemTime::now();
        st.children.insert(name, child);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Option<Node> {
        let mut st = self.state.lock();
        let node = st.children.shift_remove(name);
        if node.is_some() {
            st.modified = SystemTime::now();
        }
        node
    }

    /// Snapshot of the child list; callers iterate outside the lock.
    pub fn entries(&self) -> Vec<Node> {
        self.state.lock().children.values().cloned().collect()
    }

    pub fn stat(&self) -> FileInfo {
        FileInfo::dir(&self.name, self.perm, self.state.lock().modified)
    }
}

/// Directory whose children are whatever is on disk at `path`, right
/// now. Every enumeration re-reads the directory, so files produced by
/// a mounted remote appear without any cache invalidation.
pub struct DiskDir {
    name: String,
    path: PathBuf,
    created: SystemTime,
}

impl DiskDir {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self { name: name.into(), path: path.into(), created: SystemTime::now() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Like ls: whatever cannot be read right now simply is not listed.
    pub fn entries(&self) -> Vec<Node> {
        let Ok(rd) = std::fs::read_dir(&self.path) else {
            return Vec::new();
        };
        let mut nodes = Vec::new();
        for entry in rd.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => nodes.push(Node::DiskDir(DiskDir::new(name, path))),
                Ok(_) => nodes.push(Node::Disk(DiskFile::new(path))),
                Err(_) => {}
            }
        }
        nodes
    }

    pub fn stat(&self) -> FileInfo {
        let modified =
            std::fs::metadata(&self.path).and_then(|m| m.modified()).unwrap_or(self.created);
        FileInfo::dir(&self.name, 0o555, modified)
    }
}

/// Regular file on disk, read-only through the tree.
pub struct DiskFile {
    path: PathBuf,
}

impl DiskFile {
    pub fn new(path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self { path: path.into() })
    }

    pub fn name(&self) -> String {
        self.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }

    pub fn stat(&self) -> Result<FileInfo, FsError> {
        let meta = std::fs::metadata(&self.path)?;
        let modified = meta.modified().unwrap_or_else(|_| SystemTime::now());
        Ok(FileInfo::file(self.name(), meta.len(), 0o444, modified))
    }

    /// Snapshot the contents at open time.
    pub fn open(&self) -> Result<MemHandle, FsError> {
        let data = std::fs::read(&self.path)?;
        Ok(MemHandle { file: None, snapshot: data, pos: 0 })
    }
}

/// Bounded in-memory regular file for client-created scratch files.
pub struct MemFile {
    name: String,
    mode: u32,
    state: Mutex<MemState>,
}

struct MemState {
    buf: LimitBuffer,
    modified: SystemTime,
}

impl MemFile {
    pub fn new(name: impl Into<String>, mode: u32, max: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            mode,
            state: Mutex::new(MemState { buf: LimitBuffer::new(max), modified: SystemTime::now() }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn write(&self, p: &[u8]) -> Result<usize, FsError> {
        let mut st = self.state.lock();
        st.modified = SystemTime::now();
        st.buf.write(p)
    }

    pub fn truncate(&self, size: usize) {
        let mut st = self.state.lock();
        st.modified = SystemTime::now();
        st.buf.truncate(size);
    }

    /// Reads see the contents as of the open; writes land on the file.
    pub fn open(self: &Arc<Self>) -> MemHandle {
        let snapshot = self.state.lock().buf.bytes().to_vec();
        MemHandle { file: Some(Arc::clone(self)), snapshot, pos: 0 }
    }

    pub fn stat(&self) -> FileInfo {
        let st = self.state.lock();
        FileInfo::file(&self.name, st.buf.len() as u64, self.mode, st.modified)
    }
}

/// Cursor over a byte snapshot, optionally tied to a live [`MemFile`]
/// for writes.
pub struct MemHandle {
    file: Option<Arc<MemFile>>,
    snapshot: Vec<u8>,
    pos: usize,
}

impl MemHandle {
    pub fn read(&mut self, count: usize) -> Vec<u8> {
        let end = (self.pos + count).min(self.snapshot.len());
        let out = self.snapshot[self.pos..end].to_vec();
        self.pos = end;
        out
    }

    pub fn write(&mut self, p: &[u8]) -> Result<usize, FsError> {
        match &self.file {
            Some(f) => f.write(p),
            None => Err(FsError::NotAllowed),
        }
    }
}

/// Paged directory listing. The source is re-enumerated on every call,
/// with a running offset, so a long listing pages consistently while a
/// growing directory still surfaces new entries.
pub struct DirHandle {
    source: DirSource,
    offset: usize,
}

enum DirSource {
    Mem(Arc<Dir>),
    Disk(Arc<DiskDir>),
}

impl DirHandle {
    fn mem(dir: Arc<Dir>) -> Self {
        Self { source: DirSource::Mem(dir), offset: 0 }
    }

    fn disk(dir: Arc<DiskDir>) -> Self {
        Self { source: DirSource::Disk(dir), offset: 0 }
    }

    /// Up to `max` entries past the handle's offset; empty means EOF.
    pub fn readdir(&mut self, max: usize) -> Result<Vec<FileInfo>, FsError> {
        let nodes = match &self.source {
            DirSource::Mem(d) => d.entries(),
            DirSource::Disk(d) => d.entries(),
        };
        let mut infos = Vec::new();
        for node in nodes.iter().skip(self.offset) {
            if max > 0 && infos.len() == max {
                break;
            }
            infos.push(node.stat()?);
        }
        self.offset += infos.len();
        Ok(infos)
    }
}

/// Per-open state for every node kind.
pub enum Handle {
    Plumber(Arc<Plumber>),
    Broadcast { file: Arc<Broadcast>, reader: BroadcastReader },
    Synthetic(SyntheticHandle),
    Regular(MemHandle),
    Disk(MemHandle),
    Dir(DirHandle),
}

impl Handle {
    pub fn is_dir(&self) -> bool {
        matches!(self, Handle::Dir(_))
    }

    pub async fn read(&mut self, count: usize) -> Result<Vec<u8>, FsError> {
        match self {
            // The plumber's contents are only readable by its hook.
            Handle::Plumber(_) => Err(FsError::NotAllowed),
            Handle::Broadcast { reader, .. } => reader.read(count).await,
            Handle::Synthetic(h) => h.read(count),
            Handle::Regular(h) | Handle::Disk(h) => Ok(h.read(count)),
            Handle::Dir(_) => Err(FsError::NotAllowed),
        }
    }

    pub fn write(&mut self, p: &[u8]) -> Result<usize, FsError> {
        match self {
            Handle::Plumber(f) => f.write(p),
            Handle::Broadcast { file, .. } => file.write(p),
            Handle::Synthetic(_) => Err(FsError::NotAllowed),
            Handle::Regular(h) => h.write(p),
            Handle::Disk(_) => Err(FsError::NotAllowed),
            Handle::Dir(_) => Err(FsError::NotAllowed),
        }
    }

    pub fn readdir(&mut self, max: usize) -> Result<Vec<FileInfo>, FsError> {
        match self {
            Handle::Dir(h) => h.readdir(max),
            _ => Err(FsError::NotADirectory("open file".to_string())),
        }
    }

    /// Close of the open handle (clunk). Committing a plumber happens
    /// here; broadcast subscriptions detach when the handle drops.
    pub fn close(&mut self) -> Result<(), FsError> {
        match self {
            Handle::Plumber(f) => f.close(),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
