use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::policy::{PolicySet, Verdict};
use crate::error::{DataFlagError, Result};
use crate::flag::{Flag, FlagId, FlagStatus, NewFlag};
use crate::interval::TimeRange;
use crate::store::{FlagFilter, FlagStore, VoteStore};
use crate::vote::{Decision, Vote};

/// Outcome of evaluating one flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// The flag after evaluation
    pub flag: Flag,
    pub verdict: Verdict,
    /// Whether this call wrote a status change
    pub changed: bool,
    /// Flags retired by this activation
    pub superseded: Vec<FlagId>,
}

impl Evaluation {
    fn unchanged(flag: Flag, verdict: Verdict) -> Self {
        Self {
            flag,
            verdict,
            changed: false,
            superseded: Vec::new(),
        }
    }
}

/// Drives proposed flags through review.
///
/// Holds no state of its own beyond the policies; any number of engines in
/// any number of processes may share one store.
pub struct ConsensusEngine<S> {
    store: Arc<S>,
    policies: PolicySet,
}

impl<S: FlagStore + VoteStore> ConsensusEngine<S> {
    pub fn new(store: Arc<S>, policies: PolicySet) -> Self {
        Self { store, policies }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    /// Create a flag for review.
    ///
    /// Flags from privileged creators skip voting; they are created active in
    /// a single store transaction.
    pub fn propose(&self, new_flag: NewFlag) -> Result<Flag> {
        if !self.policies.is_privileged(&new_flag.created_by) {
            return self.store.create(new_flag);
        }
        tracing::info!(by = %new_flag.created_by, flag_type = %new_flag.flag_type, "Privileged creator, activating without review");
        let change = self.store.create_active(new_flag)?;
        Ok(change.flag)
    }

    /// Record or replace a reviewer's vote on a proposed flag.
    pub fn cast_vote(
        &self,
        flag_id: FlagId,
        reviewer_id: impl Into<String>,
        decision: Decision,
        notes: Option<String>,
    ) -> Result<Vote> {
        self.record_vote(Vote::new(flag_id, reviewer_id, decision).with_notes(notes))
    }

    /// Record a fully built vote, including its revision and client.
    pub fn record_vote(&self, vote: Vote) -> Result<Vote> {
        self.store.upsert_vote(vote)
    }

    pub fn votes(&self, flag_id: FlagId) -> Result<Vec<Vote>> {
        self.store.votes(flag_id)
    }

    pub fn evaluate(&self, flag_id: FlagId) -> Result<Evaluation> {
        self.evaluate_at(flag_id, Utc::now())
    }

    /// Apply the activation policy as of `now`.
    ///
    /// Decided flags are returned untouched. A lost race on the status write
    /// is retried once against fresh state.
    pub fn evaluate_at(&self, flag_id: FlagId, now: DateTime<Utc>) -> Result<Evaluation> {
        match self.try_evaluate(flag_id, now) {
            Err(DataFlagError::Conflict {
                expected, actual, ..
            }) => {
                tracing::warn!(flag = %flag_id, expected, actual, "Status write conflicted, retrying");
                self.try_evaluate(flag_id, now)
            }
            result => result,
        }
    }

    fn try_evaluate(&self, flag_id: FlagId, now: DateTime<Utc>) -> Result<Evaluation> {
        let flag = self.store.get(flag_id)?;
        if flag.status != FlagStatus::Proposed {
            let verdict = match flag.status {
                FlagStatus::Rejected => Verdict::Rejected,
                _ => Verdict::Approved,
            };
            return Ok(Evaluation::unchanged(flag, verdict));
        }

        let severity = self.store.flag_type(&flag.flag_type)?.severity;
        let policy = self.policies.for_severity(severity);
        let votes = self.store.votes(flag_id)?;
        let verdict = policy.judge(flag.created_at, &votes, now);

        let target = match verdict {
            Verdict::Pending => return Ok(Evaluation::unchanged(flag, verdict)),
            Verdict::Approved => FlagStatus::Active,
            Verdict::Rejected => FlagStatus::Rejected,
            Verdict::Expired => {
                tracing::warn!(flag = %flag_id, votes = votes.len(), "Review window elapsed without quorum");
                FlagStatus::Rejected
            }
        };

        let change = self
            .store
            .update_status(flag_id, target, Some(flag.version))?;
        Ok(Evaluation {
            flag: change.flag,
            verdict,
            changed: true,
            superseded: change.superseded,
        })
    }

    /// Evaluate every proposed flag; returns those whose status changed.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<Vec<Evaluation>> {
        let proposed = self.store.query_overlapping(
            &TimeRange::all(),
            &FlagFilter::any_status().with_statuses([FlagStatus::Proposed]),
        )?;
        let mut changed = Vec::new();
        for flag in proposed {
            let evaluation = self.evaluate_at(flag.id, now)?;
            if evaluation.changed {
                changed.push(evaluation);
            }
        }
        tracing::info!(changed = changed.len(), "Sweep complete");
        Ok(changed)
    }
}
