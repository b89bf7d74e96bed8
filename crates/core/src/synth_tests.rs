// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicU32, Ordering};

#[test]
fn terminal_read_then_eof() {
    let s = Synthetic::new(
        "clone",
        Box::new(|buf| {
            let payload = b"0\n";
            buf[..payload.len()].copy_from_slice(payload);
            Ok((payload.len(), true))
        }),
    );
    let mut h = s.open();
    assert_eq!(h.read(16).unwrap(), b"0\n");
    assert_eq!(h.read(16).unwrap(), b"");
    assert_eq!(h.read(16).unwrap(), b"");
}

#[test]
fn each_open_rearms() {
    let counter = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&counter);
    let s = Synthetic::new(
        "clone",
        Box::new(move |buf| {
            let payload = format!("{}\n", c.fetch_add(1, Ordering::SeqCst));
            buf[..payload.len()].copy_from_slice(payload.as_bytes());
            Ok((payload.len(), true))
        }),
    );
    let mut h1 = s.open();
    let mut h2 = s.open();
    assert_eq!(h1.read(16).unwrap(), b"0\n");
    assert_eq!(h2.read(16).unwrap(), b"1\n");
}

#[test]
fn short_buffer_consumes_nothing() {
    let counter = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&counter);
    let s = Synthetic::new(
        "clone",
        Box::new(move |buf| {
            let payload = b"42\n";
            if buf.len() < payload.len() {
                return Err(FsError::ShortBuffer { need: payload.len(), got: buf.len() });
            }
            c.fetch_add(1, Ordering::SeqCst);
            buf[..payload.len()].copy_from_slice(payload);
            Ok((payload.len(), true))
        }),
    );
    let mut h = s.open();
    assert!(matches!(h.read(1).unwrap_err(), FsError::ShortBuffer { .. }));
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    // A retry with a big enough buffer succeeds on the same handle.
    assert_eq!(h.read(16).unwrap(), b"42\n");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn stat_is_read_only() {
    let s = Synthetic::new("clone", Box::new(|_| Ok((0, true))));
    let info = s.stat();
    assert_eq!(info.mode, 0o444);
    assert_eq!(info.size, 0);
}
