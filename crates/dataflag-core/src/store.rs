use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flag::{Flag, FlagId, FlagStatus, NewFlag, StatusChange, StatusRecord};
use crate::interval::TimeRange;
use crate::provenance::DataRevision;
use crate::registry::FlagType;
use crate::scope::Scope;
use crate::vote::Vote;

/// Which flags an overlap query returns besides the time test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagFilter {
    /// Only flags relevant to this scope
    pub scope: Option<Scope>,
    /// Only flags of this type code
    pub flag_type: Option<String>,
    /// Accepted statuses; empty means any status
    pub statuses: Vec<FlagStatus>,
}

impl Default for FlagFilter {
    fn default() -> Self {
        Self::active()
    }
}

impl FlagFilter {
    /// Active flags only (what downstream pipelines see).
    pub fn active() -> Self {
        Self {
            scope: None,
            flag_type: None,
            statuses: vec![FlagStatus::Active],
        }
    }

    /// Flags in any status.
    pub fn any_status() -> Self {
        Self {
            statuses: Vec::new(),
            ..Self::active()
        }
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = FlagStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    /// Also return flags in `status`, e.g. proposed flags for review.
    pub fn including(mut self, status: FlagStatus) -> Self {
        if !self.statuses.is_empty() && !self.statuses.contains(&status) {
            self.statuses.push(status);
        }
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_type(mut self, code: impl Into<String>) -> Self {
        self.flag_type = Some(code.into());
        self
    }

    pub fn matches(&self, flag: &Flag) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&flag.status))
            && self.flag_type.as_ref().map_or(true, |t| *t == flag.flag_type)
            && self.scope.as_ref().map_or(true, |s| flag.scope.intersects(s))
    }
}

/// Flags and flag types. All storage backends implement this.
pub trait FlagStore: Send + Sync {
    /// Register a new flag type (administrative).
    fn register_type(&self, flag_type: FlagType) -> Result<FlagType>;

    /// Look up a flag type by code.
    fn flag_type(&self, code: &str) -> Result<FlagType>;

    /// All flag types in registration order.
    fn flag_types(&self) -> Result<Vec<FlagType>>;

    /// Register a pipeline data revision (administrative).
    fn register_revision(&self, revision: DataRevision) -> Result<DataRevision>;

    /// All data revisions in registration order.
    fn revisions(&self) -> Result<Vec<DataRevision>>;

    /// Persist a new flag with status `proposed`.
    fn create(&self, new_flag: NewFlag) -> Result<Flag>;

    /// Persist a new flag and activate it in one transaction.
    ///
    /// The insert, the `proposed -> active` history entry and any supersession
    /// either all happen or none do.
    fn create_active(&self, new_flag: NewFlag) -> Result<StatusChange>;

    /// Get a flag by ID.
    fn get(&self, id: FlagId) -> Result<Flag>;

    /// Replace the free-text notes of a flag.
    fn update_notes(&self, id: FlagId, notes: Option<String>) -> Result<Flag>;

    /// Move a flag to `new_status` following the transition table.
    ///
    /// With `expected_version` set the write only happens if the stored
    /// version still matches. Activation supersedes covered active flags of
    /// the same type in the same transaction.
    fn update_status(
        &self,
        id: FlagId,
        new_status: FlagStatus,
        expected_version: Option<u64>,
    ) -> Result<StatusChange>;

    /// Flags overlapping `range` that pass `filter`, ascending by start then id.
    fn query_overlapping(&self, range: &TimeRange, filter: &FlagFilter) -> Result<Vec<Flag>>;

    /// Status history of a flag, oldest first.
    fn status_history(&self, id: FlagId) -> Result<Vec<StatusRecord>>;
}

/// Reviewer votes.
pub trait VoteStore: Send + Sync {
    /// Insert or replace the vote of `vote.reviewer_id` on `vote.flag_id`.
    ///
    /// Fails unless the flag exists and is still proposed.
    fn upsert_vote(&self, vote: Vote) -> Result<Vote>;

    /// All votes on a flag ordered by cast time, then reviewer.
    fn votes(&self, flag_id: FlagId) -> Result<Vec<Vote>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use chrono::Utc;

    fn flag(status: FlagStatus, scope: Scope) -> Flag {
        Flag {
            id: FlagId(1),
            flag_type: "rfi".into(),
            interval: Interval::bounded(0.0, 1.0).unwrap(),
            scope,
            notes: None,
            metadata: None,
            status,
            superseded_by: None,
            created_at: Utc::now(),
            created_by: "test".into(),
            revision: None,
            client: None,
            version: 0,
        }
    }

    #[test]
    fn default_filter_is_active_only() {
        let filter = FlagFilter::default();
        assert!(filter.matches(&flag(FlagStatus::Active, Scope::all())));
        assert!(!filter.matches(&flag(FlagStatus::Proposed, Scope::all())));
        assert!(!filter.matches(&flag(FlagStatus::Superseded, Scope::all())));
    }

    #[test]
    fn including_proposed() {
        let filter = FlagFilter::active().including(FlagStatus::Proposed);
        assert!(filter.matches(&flag(FlagStatus::Proposed, Scope::all())));
        assert!(!filter.matches(&flag(FlagStatus::Rejected, Scope::all())));
        assert!(FlagFilter::any_status().matches(&flag(FlagStatus::Rejected, Scope::all())));
    }

    #[test]
    fn scope_and_type() {
        let filter = FlagFilter::active()
            .with_scope(Scope::instrument("antenna-3"))
            .with_type("rfi");
        assert!(filter.matches(&flag(FlagStatus::Active, Scope::instrument("antenna-3"))));
        assert!(filter.matches(&flag(FlagStatus::Active, Scope::all())));
        assert!(!filter.matches(&flag(FlagStatus::Active, Scope::instrument("antenna-4"))));
        assert!(!FlagFilter::active()
            .with_type("vote")
            .matches(&flag(FlagStatus::Active, Scope::all())));
    }
}
