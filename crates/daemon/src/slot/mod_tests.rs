// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapters::{FakeMounter, FakeSpawner};
use yare::parameterized;

struct Fixture {
    slot: Arc<Slot>,
    spawner: FakeSpawner,
    mounter: FakeMounter,
    store: ReceiptStore,
    _mount_root: tempfile::TempDir,
}

fn fixture(spawner: FakeSpawner, mounter: FakeMounter) -> Fixture {
    let mount_root = tempfile::tempdir().unwrap();
    let store = ReceiptStore::new(mount_root.path().join("receipts"));
    let deps = Arc::new(SlotDeps {
        spawner: Arc::new(spawner.clone()),
        mounter: Arc::new(mounter.clone()),
        store: store.clone(),
        tuning: Tuning {
            machine_deadline: Duration::from_secs(5),
            compensation_deadline: Duration::from_secs(1),
            poll_cap: Duration::from_millis(20),
        },
    });
    let slot = Slot::new(0, mount_root.path(), deps);
    Fixture { slot, spawner, mounter, store, _mount_root: mount_root }
}

fn stream(slot: &Arc<Slot>, name: &str) -> Arc<Broadcast> {
    match slot.dir().lookup(name).unwrap() {
        Node::Broadcast(b) => b,
        _ => panic!("{name} is not a stream"),
    }
}

fn submit(slot: &Arc<Slot>, blob: &[u8]) {
    match slot.dir().lookup("spawn").unwrap() {
        Node::Plumber(p) => {
            if !blob.is_empty() {
                p.write(blob).unwrap();
            }
            p.close().unwrap();
        }
        _ => panic!("spawn is not a plumber"),
    }
}

async fn drain(stream: &Arc<Broadcast>) -> String {
    let mut reader = stream.subscribe();
    let mut out = Vec::new();
    loop {
        let chunk = reader.read(1024).await.unwrap();
        if chunk.is_empty() {
            break;
        }
        out.extend_from_slice(&chunk);
    }
    String::from_utf8(out).unwrap()
}

async fn wait_phase(slot: &Arc<Slot>, want: &str) {
    for _ in 0..200 {
        if slot.phase().await == want {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("slot never reached {want}, stuck at {}", slot.phase().await);
}

const TASK: &[u8] = br#"{"id":"t1","image":{"type":"docker","name":"echo64"}}"#;

#[tokio::test]
async fn happy_path_emits_progress_and_persists() {
    let f = fixture(FakeSpawner::new().running_after(3).with_addr("10.0.0.1:564"), FakeMounter::new());
    let state = stream(&f.slot, "state");
    submit(&f.slot, TASK);

    let rows: Vec<String> = drain(&state).await.lines().map(str::to_string).collect();
    assert_eq!(rows.len(), 7);
    let fractions: Vec<f64> =
        rows.iter().map(|r| r.split_once(',').unwrap().0.parse().unwrap()).collect();
    for (i, fraction) in fractions.iter().enumerate() {
        let expected = (i as f64 + 1.0) / 7.0;
        assert!((fraction - expected).abs() < 1e-9, "row {i}: {fraction}");
    }
    assert_eq!(rows[6], "1,done!");

    // The third describe reported running.
    assert_eq!(f.spawner.describe_count(), 3);

    // err closed empty.
    assert_eq!(drain(&stream(&f.slot, "err")).await, "");

    // Receipt persisted with the slot id and resolved address.
    let receipts = f.store.list().unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].addr, "10.0.0.1:564");
    assert_eq!(receipts[0].slot, Some(0));

    // Mounted at the slot's path, spawned file dropped inside.
    let mounts = f.mounter.mounts();
    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].0, "10.0.0.1:564");
    assert_eq!(mounts[0].1, f.slot.mount_path());
    assert!(f.slot.mount_path().join("spawned").exists());

    // The mirror reflects the mount path.
    let mirror = f.slot.dir().lookup("mirror").unwrap();
    let names: Vec<String> = mirror.list().unwrap().iter().map(Node::name).collect();
    assert!(names.contains(&"spawned".to_string()));

    assert_eq!(f.slot.phase().await, "running");
}

#[tokio::test]
async fn mount_failure_compensates_everything() {
    let f = fixture(FakeSpawner::new(), FakeMounter::new().fail_mount("exit status 1"));
    submit(&f.slot, TASK);

    let err = drain(&stream(&f.slot, "err")).await;
    let value: serde_json::Value = serde_json::from_str(err.trim()).unwrap();
    let message = value["error"].as_str().unwrap();
    assert!(message.contains("mount"), "unexpected error: {message}");

    wait_phase(&f.slot, "failed").await;
    assert_eq!(f.spawner.kill_count(), 1);
    assert!(!f.slot.mount_path().exists());
    assert!(f.store.list().unwrap().is_empty());
}

#[tokio::test]
async fn spawn_failure_reports_without_kill() {
    let f = fixture(FakeSpawner::new().fail_spawn("no capacity"), FakeMounter::new());
    submit(&f.slot, TASK);

    let err = drain(&stream(&f.slot, "err")).await;
    assert!(err.contains("no capacity"), "unexpected error: {err}");

    wait_phase(&f.slot, "failed").await;
    // Nothing was spawned, so nothing to kill.
    assert_eq!(f.spawner.kill_count(), 0);
}

#[tokio::test]
async fn empty_close_changes_nothing() {
    let f = fixture(FakeSpawner::new(), FakeMounter::new());
    submit(&f.slot, b"");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(f.slot.phase().await, "fresh");
    assert!(f.spawner.calls().is_empty());
}

#[tokio::test]
async fn bad_blob_reports_and_rearms() {
    let f = fixture(FakeSpawner::new(), FakeMounter::new());
    submit(&f.slot, b"not json");

    let err = drain(&stream(&f.slot, "err")).await;
    assert!(err.contains("decode task"), "unexpected error: {err}");
    assert!(f.spawner.calls().is_empty());
    assert_eq!(f.slot.phase().await, "fresh");

    // The plumber re-armed: a valid retry still launches.
    submit(&f.slot, TASK);
    wait_phase(&f.slot, "running").await;
}

#[tokio::test]
async fn removal_while_running_tears_down() {
    let f = fixture(FakeSpawner::new(), FakeMounter::new());
    submit(&f.slot, TASK);
    wait_phase(&f.slot, "running").await;

    f.slot.close().await;
    assert_eq!(f.slot.phase().await, "closed");
    assert_eq!(f.mounter.unmounts(), vec![f.slot.mount_path().to_path_buf()]);
    assert_eq!(f.spawner.kill_count(), 1);
    assert!(f.store.list().unwrap().is_empty());
    assert!(!f.slot.mount_path().exists());

    // Destruction is idempotent.
    f.slot.close().await;
    assert_eq!(f.spawner.kill_count(), 1);
}

#[tokio::test]
async fn removal_mid_flight_cancels_and_compensates() {
    let mount_root = tempfile::tempdir().unwrap();
    let spawner = FakeSpawner::new().never_running();
    let store = ReceiptStore::new(mount_root.path().join("receipts"));
    let deps = Arc::new(SlotDeps {
        spawner: Arc::new(spawner.clone()),
        mounter: Arc::new(FakeMounter::new()),
        store,
        tuning: Tuning {
            machine_deadline: Duration::from_secs(60),
            compensation_deadline: Duration::from_secs(1),
            poll_cap: Duration::from_millis(10),
        },
    });
    let slot = Slot::new(0, mount_root.path(), deps);
    submit(&slot, TASK);

    // Let the machine spawn and settle into polling.
    for _ in 0..100 {
        if !spawner.calls().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    slot.close().await;
    assert_eq!(slot.phase().await, "closed");
    // The in-flight spawn was rolled back.
    assert_eq!(spawner.kill_count(), 1);
}

#[tokio::test]
async fn never_running_hits_the_deadline() {
    let mount_root = tempfile::tempdir().unwrap();
    let spawner = FakeSpawner::new().never_running();
    let store = ReceiptStore::new(mount_root.path().join("receipts"));
    let deps = Arc::new(SlotDeps {
        spawner: Arc::new(spawner.clone()),
        mounter: Arc::new(FakeMounter::new()),
        store: store.clone(),
        tuning: Tuning {
            machine_deadline: Duration::from_millis(200),
            compensation_deadline: Duration::from_secs(1),
            poll_cap: Duration::from_millis(10),
        },
    });
    let slot = Slot::new(0, mount_root.path(), deps);
    submit(&slot, TASK);

    let err = drain(&stream(&slot, "err")).await;
    assert!(err.contains("deadline exceeded"), "unexpected error: {err}");
    wait_phase(&slot, "failed").await;
    assert_eq!(spawner.kill_count(), 1);
    assert!(store.list().unwrap().is_empty());
}

#[tokio::test]
async fn restored_slot_exposes_only_mirror() {
    let mount_root = tempfile::tempdir().unwrap();
    let store = ReceiptStore::new(mount_root.path().join("receipts"));
    let deps = Arc::new(SlotDeps {
        spawner: Arc::new(FakeSpawner::new()),
        mounter: Arc::new(FakeMounter::new()),
        store,
        tuning: Tuning::default(),
    });
    let receipt =
        Receipt { addr: "10.0.0.2:564".to_string(), name: "arn-y".to_string(), ..Default::default() };
    let slot = Slot::restored(0, mount_root.path(), receipt, deps);

    assert_eq!(slot.phase().await, "running");
    let names: Vec<String> = slot.dir().entries().iter().map(Node::name).collect();
    assert_eq!(names, vec!["mirror"]);
}

#[parameterized(
    first = { 1, 10 },
    second = { 2, 40 },
    tenth = { 10, 1000 },
)]
fn poll_schedule_is_quadratic(attempt: u64, expected_ms: u64) {
    assert_eq!(poll_delay(attempt, Duration::from_secs(30)), Duration::from_millis(expected_ms));
}

#[test]
fn poll_schedule_clamps_at_cap() {
    let cap = Duration::from_secs(30);
    assert_eq!(poll_delay(55, cap), cap);
    assert_eq!(poll_delay(10_000, cap), cap);
}
