// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for file and tree operations.

use thiserror::Error;

/// Errors surfaced by nodes, handles, and tree operations.
///
/// The protocol adapter maps every variant to an error reply; the
/// message text is what clients see.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("file does not exist")]
    NotExist,

    #[error("{0}: not a directory")]
    NotADirectory(String),

    #[error("{0}: not a file")]
    NotAFile(String),

    #[error("{0}: file exists already")]
    AlreadyExists(String),

    /// The produced bytes did not fit the client buffer. Atomic: the
    /// read delivered nothing and consumed no state.
    #[error("short buffer: need {need} bytes, got {got}")]
    ShortBuffer { need: usize, got: usize },

    /// A plumber that already committed rejects further writes and closes.
    #[error("plumbed already")]
    AlreadyPlumbed,

    #[error("buffer is full")]
    Full,

    /// The reader's queue overflowed and it was disconnected.
    #[error("short write: reader queue overflowed")]
    ShortWrite,

    #[error("stream closed")]
    Closed,

    #[error("operation not supported")]
    NotSupported,

    #[error("operation not allowed")]
    NotAllowed,

    /// The id pool already tracks this id as handed out.
    #[error("{0} is already tracked by the pool")]
    AlreadyOut(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
