use super::*;

#[test]
fn missing_log_returns_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogTailStore::new(dir.path().to_path_buf());
    assert!(store.tail("alpha", 10).unwrap().is_empty());
}

#[test]
fn tail_returns_last_n_lines() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogTailStore::new(dir.path().to_path_buf());
    for i in 0..10 {
        store.append("alpha", &format!("line {i}")).unwrap();
    }
    let tail = store.tail("alpha", 3).unwrap();
    assert_eq!(tail, vec!["line 7", "line 8", "line 9"]);
}

#[test]
fn requested_lines_are_capped() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogTailStore::new(dir.path().to_path_buf());
    for i in 0..5 {
        store.append("alpha", &format!("line {i}")).unwrap();
    }
    let tail = store.tail("alpha", 1_000_000).unwrap();
    assert_eq!(tail.len(), 5);
}
