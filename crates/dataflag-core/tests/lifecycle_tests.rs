//! Flag lifecycle integration tests
//!
//! Proposal, review, activation, supersession and query through the public API.

mod common;

use std::sync::Arc;

use dataflag_core::{
    DataFlagError, Decision, FlagFilter, FlagStatus, FlagStore, NewFlag, QueryService, Scope,
    TimeRange, Verdict,
};

fn antenna_3(start: f64, end: f64) -> NewFlag {
    NewFlag::new("rfi", start, Some(end), "alice").with_scope(Scope::instrument("antenna-3"))
}

#[test]
fn test_rfi_flag_superseded_by_wider_flag() {
    let engine = common::memory_engine();
    let query = QueryService::new(Arc::clone(engine.store()));
    let window = TimeRange::span(150.0, 160.0).unwrap();

    let a = engine.propose(antenna_3(100.0, 200.0)).unwrap();
    assert_eq!(a.status, FlagStatus::Proposed);
    engine.cast_vote(a.id, "bob", Decision::Approve, None).unwrap();
    engine.cast_vote(a.id, "carol", Decision::Approve, None).unwrap();
    assert_eq!(engine.evaluate(a.id).unwrap().flag.status, FlagStatus::Active);

    let found = query.flags_in_range(&window, None, None).unwrap();
    assert_eq!(found.iter().map(|f| f.id).collect::<Vec<_>>(), vec![a.id]);

    let b = engine.propose(antenna_3(100.0, 300.0)).unwrap();
    engine.cast_vote(b.id, "bob", Decision::Approve, None).unwrap();
    engine.cast_vote(b.id, "carol", Decision::Approve, None).unwrap();
    let evaluation = engine.evaluate(b.id).unwrap();
    assert_eq!(evaluation.flag.status, FlagStatus::Active);
    assert_eq!(evaluation.superseded, vec![a.id]);

    let a_now = engine.store().get(a.id).unwrap();
    assert_eq!(a_now.status, FlagStatus::Superseded);
    assert_eq!(a_now.superseded_by, Some(b.id));

    let found = query.flags_in_range(&window, None, None).unwrap();
    assert_eq!(found.iter().map(|f| f.id).collect::<Vec<_>>(), vec![b.id]);

    // Audit trail survives on both flags.
    let history = engine.store().status_history(a.id).unwrap();
    let steps: Vec<_> = history.iter().map(|r| (r.from, r.to)).collect();
    assert_eq!(
        steps,
        vec![
            (FlagStatus::Proposed, FlagStatus::Active),
            (FlagStatus::Active, FlagStatus::Superseded),
        ]
    );
    let all = engine
        .store()
        .query_overlapping(&window, &FlagFilter::any_status())
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn test_narrower_flag_does_not_supersede() {
    let engine = common::memory_engine();
    let wide = engine.propose(antenna_3(0.0, 1000.0)).unwrap();
    let narrow = engine.propose(antenna_3(100.0, 200.0)).unwrap();
    for id in [wide.id, narrow.id] {
        engine.cast_vote(id, "bob", Decision::Approve, None).unwrap();
        engine.cast_vote(id, "carol", Decision::Approve, None).unwrap();
    }
    engine.evaluate(wide.id).unwrap();
    let evaluation = engine.evaluate(narrow.id).unwrap();

    assert!(evaluation.superseded.is_empty());
    assert_eq!(engine.store().get(wide.id).unwrap().status, FlagStatus::Active);
}

#[test]
fn test_evaluate_twice_writes_once() {
    let engine = common::memory_engine();
    let flag = engine.propose(antenna_3(0.0, 10.0)).unwrap();
    engine.cast_vote(flag.id, "bob", Decision::Approve, None).unwrap();
    engine.cast_vote(flag.id, "carol", Decision::Approve, None).unwrap();

    let first = engine.evaluate(flag.id).unwrap();
    let second = engine.evaluate(flag.id).unwrap();
    assert_eq!(first.flag.status, second.flag.status);
    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(engine.store().status_history(flag.id).unwrap().len(), 1);
}

#[test]
fn test_pending_evaluation_does_not_write() {
    let engine = common::memory_engine();
    let flag = engine.propose(antenna_3(0.0, 10.0)).unwrap();
    engine.cast_vote(flag.id, "bob", Decision::Approve, None).unwrap();

    for _ in 0..3 {
        let evaluation = engine.evaluate(flag.id).unwrap();
        assert_eq!(evaluation.verdict, Verdict::Pending);
        assert_eq!(evaluation.flag.version, 0);
    }
    assert!(engine.store().status_history(flag.id).unwrap().is_empty());
}

#[test]
fn test_revote_replaces_previous_decision() {
    let engine = common::memory_engine();
    let flag = engine.propose(antenna_3(0.0, 10.0)).unwrap();
    engine.cast_vote(flag.id, "bob", Decision::Reject, None).unwrap();
    engine
        .cast_vote(flag.id, "bob", Decision::Approve, Some("looked again".into()))
        .unwrap();

    let votes = engine.votes(flag.id).unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].decision, Decision::Approve);
    assert_eq!(votes[0].notes.as_deref(), Some("looked again"));
}

#[test]
fn test_create_rejects_bad_input() {
    let engine = common::memory_engine();
    assert!(matches!(
        engine.propose(antenna_3(20.0, 10.0)),
        Err(DataFlagError::InvalidInterval { .. })
    ));
    assert!(matches!(
        engine.propose(NewFlag::new("rfi", f64::NAN, None, "alice")),
        Err(DataFlagError::InvalidInterval { .. })
    ));
    assert!(matches!(
        engine.propose(NewFlag::new("meteor", 0.0, None, "alice")),
        Err(DataFlagError::UnknownType(_))
    ));
}

#[test]
fn test_open_ended_flag_overlaps_from_start() {
    let engine = common::memory_engine();
    let flag = engine
        .propose(NewFlag::new("rfi", 15.0, None, "alice"))
        .unwrap();
    engine.cast_vote(flag.id, "bob", Decision::Approve, None).unwrap();
    engine.cast_vote(flag.id, "carol", Decision::Approve, None).unwrap();
    engine.evaluate(flag.id).unwrap();

    let query = QueryService::new(Arc::clone(engine.store()));
    assert!(query
        .flags_in_range(&TimeRange::span(0.0, 14.0).unwrap(), None, None)
        .unwrap()
        .is_empty());
    assert_eq!(
        query
            .flags_in_range(&TimeRange::span(0.0, 15.0).unwrap(), None, None)
            .unwrap()
            .len(),
        1
    );
    assert_eq!(query.is_flagged(1e12, None).unwrap().len(), 1);
}
