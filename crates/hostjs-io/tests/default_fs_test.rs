//! Integration tests for DefaultFileSystem against a real directory

use hostjs_io::{Completion, DefaultFileSystem, FileSystem, ProviderResult, StatResult};
use std::sync::mpsc;
use std::time::Duration;

fn wait<T: Send + 'static>(start: impl FnOnce(Completion<T>)) -> ProviderResult<T> {
    let (tx, rx) = mpsc::channel();
    start(Box::new(move |result| {
        let _ = tx.send(result);
    }));
    rx.recv_timeout(Duration::from_secs(10))
        .expect("completion was not called")
}

#[test]
fn test_write_then_read() {
    let dir = tempfile::tempdir().unwrap();
    let fs = DefaultFileSystem::with_base_path(dir.path());

    wait(|done| fs.write("data.txt", b"hello".to_vec(), done)).unwrap();
    let content = wait(|done| fs.read("data.txt", done)).unwrap();

    assert_eq!(content, b"hello");
    assert!(dir.path().join("data.txt").exists());
}

#[test]
fn test_read_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let fs = DefaultFileSystem::with_base_path(dir.path());

    let err = wait(|done| fs.read("nope.txt", done)).unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("nope.txt"));
}

#[test]
fn test_move_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    let fs = DefaultFileSystem::with_base_path(dir.path());

    wait(|done| fs.write("a.txt", b"x".to_vec(), done)).unwrap();
    wait(|done| fs.move_file("a.txt", "b.txt", done)).unwrap();
    assert!(!dir.path().join("a.txt").exists());
    assert!(dir.path().join("b.txt").exists());

    wait(|done| fs.remove("b.txt", done)).unwrap();
    assert!(!dir.path().join("b.txt").exists());
}

#[test]
fn test_remove_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let fs = DefaultFileSystem::with_base_path(dir.path());

    assert!(wait(|done| fs.remove("missing.txt", done)).is_err());
}

#[test]
fn test_stat_file_directory_and_missing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("file.txt"), "content").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    let fs = DefaultFileSystem::with_base_path(dir.path());

    let file = wait(|done| fs.stat("file.txt", done)).unwrap();
    assert!(file.exists);
    assert!(file.is_file);
    assert!(!file.is_directory);
    assert!(file.last_modified > 0);

    let sub = wait(|done| fs.stat("sub", done)).unwrap();
    assert!(sub.exists);
    assert!(sub.is_directory);
    assert!(!sub.is_file);

    let missing = wait(|done| fs.stat("missing", done)).unwrap();
    assert_eq!(missing, StatResult::default());
}

#[test]
fn test_absolute_path_ignores_base() {
    let dir = tempfile::tempdir().unwrap();
    let other = tempfile::tempdir().unwrap();
    let fs = DefaultFileSystem::with_base_path(dir.path());

    let target = other.path().join("abs.txt");
    let target = target.to_str().unwrap().to_string();
    wait(|done| fs.write(&target, b"abs".to_vec(), done)).unwrap();

    assert_eq!(std::fs::read_to_string(&target).unwrap(), "abs");
    assert_eq!(fs.resolve(&target).unwrap(), target);
}
