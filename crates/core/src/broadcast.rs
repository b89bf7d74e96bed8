// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out output stream with a replay buffer.
//!
//! Every write is delivered to each live subscriber and appended to a
//! replay buffer. A subscriber attached mid-stream is seeded with the
//! replay-so-far under the writer lock, so the bytes any reader sees are
//! always a prefix of the producer's write stream. Subscribers attached
//! after close drain the replay and hit EOF.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::FsError;
use crate::info::FileInfo;

/// Per-reader queue depth, in write-sized chunks. A reader that falls
/// further behind is disconnected and observes [`FsError::ShortWrite`].
const READER_QUEUE: usize = 64;

pub struct Broadcast {
    name: String,
    inner: Mutex<Shared>,
}

struct Shared {
    replay: Vec<u8>,
    subs: Vec<Sub>,
    closed: bool,
    modified: SystemTime,
}

struct Sub {
    tx: mpsc::Sender<Vec<u8>>,
    overflowed: Arc<AtomicBool>,
}

impl Broadcast {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            inner: Mutex::new(Shared {
                replay: Vec::new(),
                subs: Vec::new(),
                closed: false,
                modified: SystemTime::now(),
            }),
        })
    }

    /// Append to the replay buffer and fan out to every live reader.
    ///
    /// A reader whose queue is full is marked overflowed and dropped; a
    /// reader whose receiver is gone is pruned silently. Writes are
    /// serialized by the lock, which is what preserves per-reader order.
    pub fn write(&self, p: &[u8]) -> Result<usize, FsError> {
        let mut st = self.inner.lock();
        if st.closed {
            return Err(FsError::Closed);
        }
        st.modified = SystemTime::now();
        st.replay.extend_from_slice(p);
        st.subs.retain(|sub| match sub.tx.try_send(p.to_vec()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                sub.overflowed.store(true, Ordering::SeqCst);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        Ok(p.len())
    }

    /// Stop the stream. Live readers drain their queues and then see
    /// EOF; later opens replay the full buffer. Idempotent.
    pub fn close(&self) {
        let mut st = self.inner.lock();
        if st.closed {
            return;
        }
        st.closed = true;
        st.modified = SystemTime::now();
        st.subs.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Attach a reader. Seeding the replay and registering happen under
    /// the same lock as writes, so the reader misses nothing and sees
    /// nothing twice.
    pub fn subscribe(&self) -> BroadcastReader {
        let mut st = self.inner.lock();
        // One extra slot so the replay seed never counts against the queue.
        let (tx, rx) = mpsc::channel(READER_QUEUE + 1);
        let overflowed = Arc::new(AtomicBool::new(false));
        if !st.replay.is_empty() {
            // Capacity is at least one here: the channel is fresh.
            let _ = tx.try_send(st.replay.clone());
        }
        if !st.closed {
            st.subs.push(Sub { tx, overflowed: Arc::clone(&overflowed) });
        }
        // When closed, tx drops here and the reader sees EOF after the replay.
        BroadcastReader { rx, pending: Vec::new(), pos: 0, overflowed }
    }

    pub fn stat(&self) -> FileInfo {
        let st = self.inner.lock();
        FileInfo::file(&self.name, st.replay.len() as u64, 0o444, st.modified)
    }
}

/// One subscriber's view of the stream. Reads block until data arrives
/// or the stream closes; EOF is an empty result.
pub struct BroadcastReader {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
    pos: usize,
    overflowed: Arc<AtomicBool>,
}

impl BroadcastReader {
    pub async fn read(&mut self, count: usize) -> Result<Vec<u8>, FsError> {
        loop {
            if self.overflowed.load(Ordering::SeqCst) {
                return Err(FsError::ShortWrite);
            }
            if self.pos < self.pending.len() {
                let end = (self.pos + count).min(self.pending.len());
                let out = self.pending[self.pos..end].to_vec();
                self.pos = end;
                return Ok(out);
            }
            match self.rx.recv().await {
                Some(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                None => {
                    if self.overflowed.load(Ordering::SeqCst) {
                        return Err(FsError::ShortWrite);
                    }
                    return Ok(Vec::new());
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
