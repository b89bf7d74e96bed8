// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path resolution over a node tree.
//!
//! Lookup is a pure function over the tree snapshot at call time;
//! concurrent appends may make two close-in-time lookups disagree,
//! which is fine.

use std::sync::Arc;

use crate::error::FsError;
use crate::node::{Dir, MemFile, Node};

/// Capacity for client-created scratch files.
pub const CREATE_FILE_MAX: usize = 2048;

/// Split on `/`, dropping empty components. The empty and `/` paths
/// both resolve to the root.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// Resolve `path` from `root` by recursive descent.
pub fn lookup(root: &Arc<Dir>, path: &str) -> Result<Node, FsError> {
    let mut node = Node::Dir(Arc::clone(root));
    for component in split_path(path) {
        node = lookup_child(&node, component)?;
    }
    Ok(node)
}

/// One descent step: `parent` must be a directory kind holding `name`.
fn lookup_child(parent: &Node, name: &str) -> Result<Node, FsError> {
    match parent {
        Node::Dir(d) => d.lookup(name).ok_or(FsError::NotExist),
        Node::DiskDir(d) => {
            d.entries().into_iter().find(|n| n.name() == name).ok_or(FsError::NotExist)
        }
        other => Err(FsError::NotADirectory(other.name())),
    }
}

/// Create a bounded in-memory file `name` under the directory at
/// `parent`. Returns the new node.
pub fn create(root: &Arc<Dir>, parent: &str, name: &str, mode: u32) -> Result<Node, FsError> {
    let parent_node = lookup(root, parent)?;
    let dir = parent_node.as_dir().ok_or_else(|| FsError::NotADirectory(parent_node.name()))?;
    let node = Node::Regular(MemFile::new(name, mode, CREATE_FILE_MAX));
    dir.append(node.clone())?;
    Ok(node)
}

/// Remove the entry at `path`: close the node, then detach it from its
/// parent. A missing target is a no-op success. Returns the detached
/// node, if any.
pub fn remove(root: &Arc<Dir>, path: &str) -> Result<Option<Node>, FsError> {
    let components = split_path(path);
    let Some((name, parents)) = components.split_last() else {
        // Refusing to remove the root.
        return Err(FsError::NotAllowed);
    };

    let mut parent = Node::Dir(Arc::clone(root));
    for component in parents {
        parent = match lookup_child(&parent, component) {
            Ok(node) => node,
            Err(FsError::NotExist) => return Ok(None),
            Err(e) => return Err(e),
        };
    }
    let dir = match parent.as_dir() {
        Some(d) => d,
        // Mirrored disk trees are not editable through the protocol.
        None if parent.is_dir() => return Err(FsError::NotSupported),
        None => return Err(FsError::NotADirectory(parent.name())),
    };

    let Some(node) = dir.lookup(name) else {
        return Ok(None);
    };
    node.close()?;
    dir.remove(name);
    Ok(Some(node))
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
