// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Requests a client may issue against the served tree.

use serde::{Deserialize, Serialize};

fn default_count() -> u32 {
    8192
}

fn default_mode() -> u32 {
    0o644
}

/// One decoded client request.
///
/// Path-addressed verbs resolve fresh on every call; `Read`, `Write`
/// and `Clunk` address a fid previously handed out by `Open` or
/// `Create`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Resolve a path, answering with its file info.
    Walk { path: String },

    /// File info for a path.
    Stat { path: String },

    /// Open the node at a path; replies with a fid.
    Open { path: String },

    /// Create an in-memory file under `parent`.
    Create {
        parent: String,
        name: String,
        #[serde(default = "default_mode")]
        mode: u32,
    },

    /// Remove the entry at a path. Missing targets succeed.
    Remove { path: String },

    /// Resize a regular file. Directories succeed silently; streaming
    /// kinds are refused.
    Truncate { path: String, size: u64 },

    /// Set timestamps. Accepted and ignored: modtime is managed
    /// internally.
    Utimes { path: String },

    /// Read from an open fid. On directories, `count` bounds the number
    /// of entries returned.
    Read {
        fid: u32,
        #[serde(default = "default_count")]
        count: u32,
    },

    /// Write to an open fid.
    Write { fid: u32, data: Vec<u8> },

    /// Close an open fid.
    Clunk { fid: u32 },
}
