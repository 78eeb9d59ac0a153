//! Integration test: status channel durability and change detection.
//!
//! ## Scenarios
//! 1. The last written event survives the writer going away.
//! 2. Change-aware reads report `Unchanged` until the record is replaced.
//! 3. Concurrent readers never observe a partial record while a writer replaces it.
//! 4. Startup sweep removes leftover channel files only.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use voxvote_core::{
    purge_orphans, ChannelRead, SessionId, StatusChannel, StatusEvent, StatusWriter, Step,
};

#[test]
fn last_event_survives_writer_drop() {
    let dir = tempfile::tempdir().unwrap();
    let id = SessionId::generate();
    {
        let mut writer = StatusWriter::new(StatusChannel::for_session(dir.path(), &id));
        writer.publish(StatusEvent::starting()).unwrap();
        writer
            .publish(StatusEvent::progress(Step::AwaitingCandidate, "Candidate number 1 is BJP"))
            .unwrap();
    }
    let reader = StatusChannel::for_session(dir.path(), &id);
    let ev = reader.read().unwrap().expect("event persisted");
    assert_eq!(ev.step, Step::AwaitingCandidate);
    assert_eq!(ev.message, "Candidate number 1 is BJP");
}

#[test]
fn change_detection_tracks_replacements() {
    let dir = tempfile::tempdir().unwrap();
    let ch = StatusChannel::for_session(dir.path(), &SessionId::generate());
    ch.write(&StatusEvent::starting()).unwrap();

    let stamp = match ch.read_if_changed(None).unwrap() {
        ChannelRead::Updated(ev, stamp) => {
            assert_eq!(ev.step, Step::AwaitingVoterId);
            stamp
        }
        other => panic!("expected Updated, got {other:?}"),
    };
    assert_eq!(ch.read_if_changed(Some(&stamp)).unwrap(), ChannelRead::Unchanged);

    ch.write(&StatusEvent::progress(
        Step::AwaitingConfirmation,
        "Say confirm to cast your vote",
    ))
    .unwrap();
    match ch.read_if_changed(Some(&stamp)).unwrap() {
        ChannelRead::Updated(ev, _) => assert_eq!(ev.step, Step::AwaitingConfirmation),
        other => panic!("expected Updated, got {other:?}"),
    }

    ch.remove().unwrap();
    assert_eq!(ch.read_if_changed(Some(&stamp)).unwrap(), ChannelRead::Absent);
    ch.remove().unwrap();
}

#[test]
fn readers_never_see_partial_records() {
    let dir = tempfile::tempdir().unwrap();
    let ch = StatusChannel::for_session(dir.path(), &SessionId::generate());
    ch.write(&StatusEvent::starting()).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let ch = ch.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut reads = 0u32;
            while !done.load(Ordering::SeqCst) {
                let ev = ch.read().expect("every read parses");
                assert!(ev.is_some());
                reads += 1;
            }
            reads
        })
    };

    let long = "x".repeat(4096);
    for i in 0..200 {
        let msg = if i % 2 == 0 { long.clone() } else { format!("attempt {i}") };
        ch.write(&StatusEvent::progress(Step::AwaitingVoterId, msg)).unwrap();
    }
    done.store(true, Ordering::SeqCst);
    assert!(reader.join().unwrap() > 0);
}

#[test]
fn purge_removes_only_channel_files() {
    let dir = tempfile::tempdir().unwrap();
    for _ in 0..3 {
        StatusChannel::for_session(dir.path(), &SessionId::generate())
            .write(&StatusEvent::starting())
            .unwrap();
    }
    std::fs::write(dir.path().join("votes.sqlite"), b"keep").unwrap();
    assert_eq!(purge_orphans(dir.path()).unwrap(), 3);
    assert!(dir.path().join("votes.sqlite").exists());
    assert_eq!(purge_orphans(&dir.path().join("missing")).unwrap(), 0);
}
