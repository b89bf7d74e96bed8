// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed replies to client requests.

use outpost_core::FileInfo;
use serde::{Deserialize, Serialize};

/// One reply frame. Every domain error becomes [`Reply::Error`] with
/// the error's display text as the message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Reply {
    /// Walk and Stat answer.
    Info { info: FileInfo },

    /// Open and Create answer: the handle for Read/Write/Clunk.
    Fid { fid: u32 },

    /// Read answer for file kinds. Empty data is EOF.
    Data { data: Vec<u8> },

    /// Read answer for directories. Empty is end of listing.
    Entries { entries: Vec<FileInfo> },

    /// Write answer: bytes accepted.
    Count { count: u32 },

    Ok,

    Error { message: String },
}

impl Reply {
    pub fn error(e: impl std::fmt::Display) -> Self {
        Reply::Error { message: e.to_string() }
    }
}
