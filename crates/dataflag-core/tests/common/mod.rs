//! Shared setup for integration tests

use std::path::Path;
use std::sync::Arc;

use dataflag_core::{
    ApprovalRule, ConsensusEngine, ConsensusPolicy, FlagStore, FlagType, PolicySet, SqliteStore,
    StoreOptions,
};

/// Quorum of two approvals, two rejections reject.
pub fn quorum_policy() -> PolicySet {
    PolicySet::new(ConsensusPolicy::new(ApprovalRule::Quorum, 2, 2))
}

/// In-memory store with the `rfi` type registered at severity 2.
#[allow(dead_code)]
pub fn memory_engine() -> ConsensusEngine<SqliteStore> {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .register_type(FlagType::new("rfi", 2).with_description("Radio frequency interference"))
        .unwrap();
    ConsensusEngine::new(Arc::new(store), quorum_policy())
}

/// A separate connection to an on-disk database, as another process would hold.
#[allow(dead_code)]
pub fn file_engine(path: &Path) -> ConsensusEngine<SqliteStore> {
    let store = SqliteStore::open(path, StoreOptions::default()).unwrap();
    ConsensusEngine::new(Arc::new(store), quorum_policy())
}
