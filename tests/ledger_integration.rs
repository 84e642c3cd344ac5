use std::collections::HashSet;
use std::sync::Arc;

use photo_uploader::ledger::{LEDGER_FILE_NAME, Ledger, LedgerError};
use photo_uploader::remote::Album;

#[test]
fn missing_ledger_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Ledger::load(dir.path()).unwrap().is_none());
}

#[test]
fn records_survive_reload() {
    let dir = tempfile::tempdir().unwrap();
    let l = Ledger::empty(dir.path());
    l.record_upload("a.jpg", "tok-a").unwrap();
    l.record_upload("b.jpg", "tok-b").unwrap();
    l.record_album(&Album { id: "album-1".into(), title: "Trip 2010".into() }).unwrap();
    let set: HashSet<String> = ["tok-a".to_string()].into_iter().collect();
    l.mark_attached(&set).unwrap();
    assert!(dir.path().join(LEDGER_FILE_NAME).exists());

    let back = Ledger::load(dir.path()).unwrap().unwrap();
    assert_eq!(back.entries(), l.entries());
    assert_eq!(back.album().unwrap().id, "album-1");
    assert!(back.lookup("a.jpg").unwrap().media_item_created);
    let b = back.lookup("b.jpg").unwrap();
    assert_eq!(b.upload_token, "tok-b");
    assert!(!b.media_item_created);
    assert_eq!(back.pending_tokens(), vec!["tok-b".to_string()]);
}

#[test]
fn corrupt_ledger_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(LEDGER_FILE_NAME), b"definitely not a ledger").unwrap();
    let err = Ledger::load(dir.path()).err().unwrap();
    assert!(matches!(err, LedgerError::Corrupt { .. }), "{err}");
}

#[test]
fn truncated_ledger_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let l = Ledger::empty(dir.path());
    l.record_upload("a.jpg", "tok-a").unwrap();
    let path = dir.path().join(LEDGER_FILE_NAME);
    let data = std::fs::read(&path).unwrap();
    std::fs::write(&path, &data[..data.len() - 2]).unwrap();
    assert!(matches!(Ledger::load(dir.path()), Err(LedgerError::Corrupt { .. })));
}

#[test]
fn duplicate_name_is_rejected_and_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let l = Ledger::empty(dir.path());
    l.record_upload("a.jpg", "tok-1").unwrap();
    assert!(matches!(l.record_upload("a.jpg", "tok-2"), Err(LedgerError::DuplicateEntry { .. })));
    let back = Ledger::load(dir.path()).unwrap().unwrap();
    assert_eq!(back.len(), 1);
    assert_eq!(back.lookup("a.jpg").unwrap().upload_token, "tok-1");
}

#[test]
fn concurrent_records_all_land() {
    let dir = tempfile::tempdir().unwrap();
    let l = Arc::new(Ledger::empty(dir.path()));
    let mut handles = Vec::new();
    for t in 0..8 {
        let l = l.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..10 {
                l.record_upload(&format!("f{}_{}.jpg", t, i), &format!("tok{}_{}", t, i)).unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    let back = Ledger::load(dir.path()).unwrap().unwrap();
    assert_eq!(back.len(), 80);
    assert!(back.lookup("f7_9.jpg").is_some());
}

#[test]
fn dry_run_ledger_never_touches_disk() {
    let dir = tempfile::tempdir().unwrap();
    let l = Ledger::empty(dir.path()).without_persistence();
    l.record_upload("a.jpg", "tok-a").unwrap();
    assert_eq!(l.pending_tokens(), vec!["tok-a".to_string()]);
    assert!(!dir.path().join(LEDGER_FILE_NAME).exists());
}

#[test]
fn mark_attached_ignores_unknown_tokens() {
    let dir = tempfile::tempdir().unwrap();
    let l = Ledger::empty(dir.path());
    l.record_upload("a.jpg", "tok-a").unwrap();
    let set: HashSet<String> = ["nope".to_string()].into_iter().collect();
    assert_eq!(l.mark_attached(&set).unwrap(), 0);
    assert!(l.lookup("a.jpg").unwrap().is_pending_attach());
}
