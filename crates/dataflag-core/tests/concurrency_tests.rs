//! Concurrency integration tests
//!
//! Independent connections to one on-disk database stand in for separate
//! client processes.

mod common;

use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use dataflag_core::{
    DataFlagError, Decision, FlagStatus, FlagStore, FlagType, NewFlag, SqliteStore, StoreOptions,
    Vote, VoteStore,
};

#[test]
fn test_stale_version_loses_race() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flags.sqlite");
    let first = common::file_engine(&path);
    first.store().register_type(FlagType::new("rfi", 2)).unwrap();
    let second = common::file_engine(&path);

    let flag = first
        .propose(NewFlag::new("rfi", 0.0, Some(10.0), "alice"))
        .unwrap();
    let seen_by_second = second.store().get(flag.id).unwrap();

    first
        .store()
        .update_status(flag.id, FlagStatus::Active, Some(flag.version))
        .unwrap();
    let err = second
        .store()
        .update_status(flag.id, FlagStatus::Rejected, Some(seen_by_second.version))
        .unwrap_err();
    assert!(matches!(err, DataFlagError::Conflict { .. }));
    assert!(err.is_retryable());
    assert_eq!(second.store().get(flag.id).unwrap().status, FlagStatus::Active);
}

#[test]
fn test_racing_evaluations_activate_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flags.sqlite");
    let setup = common::file_engine(&path);
    setup.store().register_type(FlagType::new("rfi", 2)).unwrap();

    for round in 0..10u32 {
        let flag = setup
            .propose(NewFlag::new("rfi", f64::from(round), None, "alice"))
            .unwrap();
        setup.cast_vote(flag.id, "bob", Decision::Approve, None).unwrap();
        setup.cast_vote(flag.id, "carol", Decision::Approve, None).unwrap();

        let engines = [common::file_engine(&path), common::file_engine(&path)];
        let barrier = Barrier::new(engines.len());
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = engines
                .iter()
                .map(|engine| {
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        engine.evaluate(flag.id)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut writes = 0;
        for result in results {
            match result {
                Ok(evaluation) => {
                    assert_eq!(evaluation.flag.status, FlagStatus::Active);
                    writes += usize::from(evaluation.changed);
                }
                Err(err) => assert!(err.is_retryable(), "unexpected error: {err}"),
            }
        }
        assert_eq!(writes, 1, "round {round}");

        let history = setup.store().status_history(flag.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].to, FlagStatus::Active);
    }
}

#[test]
fn test_concurrent_reviewers_each_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flags.sqlite");
    let setup = common::file_engine(&path);
    setup.store().register_type(FlagType::new("rfi", 2)).unwrap();
    let flag = setup
        .propose(NewFlag::new("rfi", 0.0, Some(1.0), "alice"))
        .unwrap();

    let reviewers: Vec<String> = (0..6).map(|i| format!("reviewer-{i}")).collect();
    thread::scope(|s| {
        for reviewer in &reviewers {
            let path = path.clone();
            s.spawn(move || {
                let engine = common::file_engine(&path);
                engine
                    .cast_vote(flag.id, reviewer.as_str(), Decision::Approve, None)
                    .unwrap();
                engine
                    .cast_vote(flag.id, reviewer.as_str(), Decision::Reject, None)
                    .unwrap();
            });
        }
    });

    let votes = setup.votes(flag.id).unwrap();
    assert_eq!(votes.len(), reviewers.len());
    assert!(votes.iter().all(|v| v.decision == Decision::Reject));
}

fn count(conn: &rusqlite::Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

#[test]
fn test_writes_time_out_under_held_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flags.sqlite");
    let store = SqliteStore::open(
        &path,
        StoreOptions {
            busy_timeout: Duration::from_millis(50),
        },
    )
    .unwrap();
    store.register_type(FlagType::new("rfi", 2)).unwrap();
    let flag = store
        .create(NewFlag::new("rfi", 0.0, Some(10.0), "alice"))
        .unwrap();

    // Another process holding the write lock
    let holder = rusqlite::Connection::open(&path).unwrap();
    holder.execute_batch("BEGIN IMMEDIATE").unwrap();

    let created = store.create(NewFlag::new("rfi", 20.0, Some(30.0), "alice"));
    assert!(matches!(created, Err(DataFlagError::Timeout(_))), "{created:?}");
    let activated = store.create_active(NewFlag::new("rfi", 20.0, Some(30.0), "pipeline"));
    assert!(matches!(activated, Err(DataFlagError::Timeout(_))), "{activated:?}");
    let status = store.update_status(flag.id, FlagStatus::Active, Some(flag.version));
    assert!(matches!(status, Err(DataFlagError::Timeout(_))), "{status:?}");
    let voted = store.upsert_vote(Vote::new(flag.id, "bob", Decision::Approve));
    assert!(matches!(voted, Err(DataFlagError::Timeout(_))), "{voted:?}");
    let err = voted.unwrap_err();
    assert!(err.is_retryable());

    holder.execute_batch("ROLLBACK").unwrap();

    assert_eq!(count(&holder, "flags"), 1);
    assert_eq!(count(&holder, "flag_status_history"), 0);
    assert_eq!(count(&holder, "flag_votes"), 0);
    let unchanged = store.get(flag.id).unwrap();
    assert_eq!(unchanged.status, FlagStatus::Proposed);
    assert_eq!(unchanged.version, flag.version);

    // Once the lock is gone the same calls go through.
    store
        .update_status(flag.id, FlagStatus::Active, Some(flag.version))
        .unwrap();
}
