// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapters::{FakeMounter, FakeSpawner};
use outpost_core::{lookup, FsError, Receipt};

fn config(dir: &std::path::Path) -> Config {
    Config::new("127.0.0.1:0", dir.join("mnt"))
}

#[tokio::test]
async fn startup_with_empty_store_serves_just_clone() {
    let tmp = tempfile::tempdir().unwrap();
    let started = startup(
        &config(tmp.path()),
        Arc::new(FakeSpawner::new()),
        Arc::new(FakeMounter::new()),
    )
    .await
    .unwrap();

    let names: Vec<String> =
        started.root.dir().entries().iter().map(|n| n.name()).collect();
    assert_eq!(names, vec!["clone"]);
    assert!(started.listener.local_addr().is_ok());
}

#[tokio::test]
async fn derived_paths_sit_next_to_the_mount_root() {
    let cfg = Config::new("127.0.0.1:0", "/srv/outpost");
    assert_eq!(cfg.receipt_dir, std::path::Path::new("/srv/outpost.receipts"));
    assert_eq!(cfg.lock_path, std::path::Path::new("/srv/outpost.lock"));
}

#[tokio::test]
async fn second_startup_fails_on_the_lock() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(tmp.path());
    let _held = startup(&cfg, Arc::new(FakeSpawner::new()), Arc::new(FakeMounter::new()))
        .await
        .unwrap();

    let err = startup(&cfg, Arc::new(FakeSpawner::new()), Arc::new(FakeMounter::new()))
        .await
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, LifecycleError::LockFailed(_)));
}

#[tokio::test]
async fn stale_mount_dirs_are_swept() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(tmp.path());
    let stale = cfg.mount_root.join("7");
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("leftover"), b"x").unwrap();

    let mounter = FakeMounter::new();
    let started =
        startup(&cfg, Arc::new(FakeSpawner::new()), Arc::new(mounter.clone())).await.unwrap();

    assert!(!stale.exists());
    assert_eq!(mounter.unmounts(), vec![stale]);
    drop(started);
}

#[tokio::test]
async fn restart_with_live_receipt_restores_the_slot() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(tmp.path());

    // Preload the receipt directory, as a prior run would have.
    let store = ReceiptStore::new(&cfg.receipt_dir);
    let receipt = Receipt {
        addr: "10.0.0.2:564".to_string(),
        name: "arn-y".to_string(),
        ..Default::default()
    };
    store.write(&receipt).unwrap();

    let spawner = FakeSpawner::new().with_store(store.clone());
    let mounter = FakeMounter::new();
    let started = startup(&cfg, Arc::new(spawner.clone()), Arc::new(mounter.clone()))
        .await
        .unwrap();

    // Spawner.list was consulted and id 0 went to the restored slot.
    assert!(spawner.calls().contains(&crate::adapters::SpawnerCall::List));
    let slot_dir = lookup(started.root.dir(), "/0").unwrap();
    let names: Vec<String> = slot_dir.list().unwrap().iter().map(|n| n.name()).collect();
    assert_eq!(names, vec!["mirror"]);

    let mounts = mounter.mounts();
    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].0, "10.0.0.2:564");
    assert_eq!(mounts[0].1, cfg.mount_root.join("0"));
}

#[tokio::test]
async fn receipt_that_fails_to_mount_is_left_in_place() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(tmp.path());
    let store = ReceiptStore::new(&cfg.receipt_dir);
    let receipt = Receipt {
        addr: "10.0.0.2:564".to_string(),
        name: "arn-dead".to_string(),
        ..Default::default()
    };
    store.write(&receipt).unwrap();

    let spawner = FakeSpawner::new().with_store(store.clone());
    let started = startup(
        &cfg,
        Arc::new(spawner),
        Arc::new(FakeMounter::new().fail_mount("connection refused")),
    )
    .await
    .unwrap();

    // No slot, receipt untouched for out-of-band recovery.
    assert!(matches!(lookup(started.root.dir(), "/0").unwrap_err(), FsError::NotExist));
    assert_eq!(store.list().unwrap().len(), 1);
}
