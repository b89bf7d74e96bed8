// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn receipt(name: &str) -> Receipt {
    Receipt { addr: "10.0.0.1:564".to_string(), name: name.to_string(), ..Default::default() }
}

#[test]
fn write_files_under_hash() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ReceiptStore::new(tmp.path());
    let r = receipt("arn-x");
    let hash = store.write(&r).unwrap();
    assert_eq!(hash, r.hash().unwrap());
    assert!(tmp.path().join(&hash).exists());

    let listed = store.list().unwrap();
    assert_eq!(listed, vec![r]);
}

#[test]
fn write_then_remove_leaves_store_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ReceiptStore::new(tmp.path());
    let r = receipt("arn-x");
    store.write(&r).unwrap();
    store.remove(&r).unwrap();
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn remove_of_missing_receipt_is_ok() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ReceiptStore::new(tmp.path());
    store.remove(&receipt("never-written")).unwrap();
}

#[test]
fn write_is_idempotent_per_receipt() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ReceiptStore::new(tmp.path());
    let r = receipt("arn-x");
    store.write(&r).unwrap();
    store.write(&r).unwrap();
    assert_eq!(store.list().unwrap().len(), 1);
}

#[test]
fn list_skips_malformed_entries() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ReceiptStore::new(tmp.path());
    store.write(&receipt("good")).unwrap();
    std::fs::write(tmp.path().join("deadbeef"), b"not json").unwrap();
    std::fs::create_dir(tmp.path().join("subdir")).unwrap();

    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "good");
}

#[test]
fn list_of_missing_directory_is_empty() {
    let store = ReceiptStore::new("/nonexistent/outpost-receipts");
    assert!(store.list().unwrap().is_empty());
}
