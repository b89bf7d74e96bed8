// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn mem_dir() -> Arc<Dir> {
    let d = Dir::new("root", 0o555);
    d.append(Node::Regular(MemFile::new("a", 0o644, 0))).unwrap();
    d.append(Node::Regular(MemFile::new("b", 0o644, 0))).unwrap();
    d
}

#[test]
fn dir_enforces_unique_names() {
    let d = mem_dir();
    let err = d.append(Node::Regular(MemFile::new("a", 0o644, 0))).unwrap_err();
    assert!(matches!(err, FsError::AlreadyExists(name) if name == "a"));
}

#[test]
fn dir_lookup_and_remove() {
    let d = mem_dir();
    assert!(d.lookup("a").is_some());
    assert!(d.remove("a").is_some());
    assert!(d.lookup("a").is_none());
    assert!(d.remove("a").is_none());
}

#[test]
fn readdir_pages_with_offset() {
    let d = mem_dir();
    let mut h = match Node::Dir(d).open().unwrap() {
        Handle::Dir(h) => h,
        _ => panic!("expected dir handle"),
    };
    let first = h.readdir(1).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].name, "a");
    let second = h.readdir(0).unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].name, "b");
    assert!(h.readdir(0).unwrap().is_empty());
}

#[test]
fn mem_file_reads_snapshot_writes_live() {
    let f = MemFile::new("notes", 0o644, 0);
    f.write(b"before").unwrap();
    let mut h = f.open();
    f.write(b" after").unwrap();
    // The handle sees the contents as of open time.
    assert_eq!(h.read(100), b"before");
    // A fresh open sees the write that happened meanwhile.
    let mut h2 = f.open();
    assert_eq!(h2.read(100), b"before after");
}

#[test]
fn mem_file_cap_and_truncate() {
    let f = MemFile::new("notes", 0o644, 4);
    assert!(matches!(f.write(b"abcdef").unwrap_err(), FsError::Full));
    assert_eq!(f.stat().size, 4);
    f.truncate(2);
    assert_eq!(f.stat().size, 2);
}

#[test]
fn disk_dir_lists_fresh_every_time() {
    let tmp = tempfile::tempdir().unwrap();
    let d = DiskDir::new("mirror", tmp.path());
    assert!(d.entries().is_empty());

    std::fs::write(tmp.path().join("spawned"), b"{}").unwrap();
    std::fs::create_dir(tmp.path().join("sub")).unwrap();

    // No cache: the new entries appear on the next enumeration.
    let mut names: Vec<String> = d.entries().iter().map(Node::name).collect();
    names.sort();
    assert_eq!(names, ["spawned", "sub"]);

    let sub = d.entries().into_iter().find(|n| n.name() == "sub").unwrap();
    assert!(sub.is_dir());
}

#[test]
fn disk_dir_missing_path_lists_empty() {
    let d = DiskDir::new("mirror", "/nonexistent/outpost-test");
    assert!(d.entries().is_empty());
    // Stat still answers so the subtree is walkable before a mount.
    assert!(d.stat().is_dir);
}

#[test]
fn disk_file_reads_contents() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("spawned");
    std::fs::write(&path, b"{\"addr\":\"x\"}").unwrap();
    let f = DiskFile::new(&path);
    assert_eq!(f.stat().unwrap().size, 13);
    let mut h = f.open().unwrap();
    assert_eq!(h.read(100), b"{\"addr\":\"x\"}");
    assert!(matches!(h.write(b"no").unwrap_err(), FsError::NotAllowed));
}

#[tokio::test]
async fn handle_dispatch_matches_kind() {
    let plumber = Plumber::new("spawn", 0, Box::new(|_| true));
    let mut h = Node::Plumber(plumber).open().unwrap();
    assert!(matches!(h.read(10).await.unwrap_err(), FsError::NotAllowed));
    assert_eq!(h.write(b"data").unwrap(), 4);

    let b = Broadcast::new("state");
    b.write(b"row").unwrap();
    b.close();
    let mut h = Node::Broadcast(b).open().unwrap();
    assert_eq!(h.read(10).await.unwrap(), b"row");
}
