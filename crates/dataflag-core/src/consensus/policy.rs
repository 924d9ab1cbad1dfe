//! Activation policies
//!
//! A policy turns the votes on a proposed flag into a verdict. Policies are
//! chosen per flag-type severity so that more severe flag types can demand
//! more rigorous review.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DataFlagError, Result};
use crate::vote::{Vote, VoteTally};

/// How approvals and rejections combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalRule {
    /// `quorum` approvals and no rejections outstanding
    #[default]
    Quorum,
    /// at least `quorum` votes cast, approvals outnumber rejections
    Majority,
    /// any rejection rejects; `quorum` approvals activate
    Unanimous,
}

impl std::fmt::Display for ApprovalRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalRule::Quorum => write!(f, "quorum"),
            ApprovalRule::Majority => write!(f, "majority"),
            ApprovalRule::Unanimous => write!(f, "unanimous"),
        }
    }
}

/// Result of applying a policy to a vote set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pending,
    Approved,
    Rejected,
    /// Review window closed without a decision
    Expired,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pending => write!(f, "pending"),
            Verdict::Approved => write!(f, "approved"),
            Verdict::Rejected => write!(f, "rejected"),
            Verdict::Expired => write!(f, "expired"),
        }
    }
}

/// Review parameters for one severity band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusPolicy {
    #[serde(default)]
    pub rule: ApprovalRule,
    #[serde(default = "default_quorum")]
    pub quorum: u32,
    #[serde(default = "default_rejection_threshold")]
    pub rejection_threshold: u32,
    /// Votes after `created_at + window` are ignored; undecided flags expire.
    #[serde(default = "default_review_window_secs")]
    pub review_window_secs: Option<u64>,
}

fn default_quorum() -> u32 {
    2
}
fn default_rejection_threshold() -> u32 {
    2
}
fn default_review_window_secs() -> Option<u64> {
    Some(14 * 24 * 3600)
}

impl Default for ConsensusPolicy {
    fn default() -> Self {
        Self {
            rule: ApprovalRule::default(),
            quorum: default_quorum(),
            rejection_threshold: default_rejection_threshold(),
            review_window_secs: default_review_window_secs(),
        }
    }
}

impl ConsensusPolicy {
    pub fn new(rule: ApprovalRule, quorum: u32, rejection_threshold: u32) -> Self {
        Self {
            rule,
            quorum,
            rejection_threshold,
            review_window_secs: None,
        }
    }

    pub fn with_review_window(mut self, window: Duration) -> Self {
        self.review_window_secs = Some(window.num_seconds().max(0) as u64);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.quorum == 0 {
            return Err(DataFlagError::Configuration(
                "quorum must be at least 1".into(),
            ));
        }
        if self.rejection_threshold == 0 {
            return Err(DataFlagError::Configuration(
                "rejection_threshold must be at least 1".into(),
            ));
        }
        if self.review_window_secs == Some(0) {
            return Err(DataFlagError::Configuration(
                "review_window_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn review_window(&self) -> Option<Duration> {
        // chrono caps durations at i64::MAX milliseconds
        self.review_window_secs.map(|secs| {
            let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
            Duration::seconds(secs)
        })
    }

    /// Last instant at which a vote still counts.
    pub fn deadline(&self, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.review_window()
            .and_then(|window| created_at.checked_add_signed(window))
    }

    /// Verdict from counts alone, ignoring the review window.
    pub fn decide(&self, tally: VoteTally) -> Verdict {
        match self.rule {
            ApprovalRule::Unanimous => {
                if tally.rejections > 0 {
                    Verdict::Rejected
                } else if tally.approvals >= self.quorum {
                    Verdict::Approved
                } else {
                    Verdict::Pending
                }
            }
            ApprovalRule::Quorum => {
                if tally.rejections >= self.rejection_threshold {
                    Verdict::Rejected
                } else if tally.approvals >= self.quorum && tally.rejections == 0 {
                    Verdict::Approved
                } else {
                    Verdict::Pending
                }
            }
            ApprovalRule::Majority => {
                if tally.rejections >= self.rejection_threshold {
                    Verdict::Rejected
                } else if tally.total() >= self.quorum && tally.approvals > tally.rejections {
                    Verdict::Approved
                } else {
                    Verdict::Pending
                }
            }
        }
    }

    /// Verdict for a flag created at `created_at`, evaluated at `now`.
    pub fn judge(&self, created_at: DateTime<Utc>, votes: &[Vote], now: DateTime<Utc>) -> Verdict {
        let deadline = self.deadline(created_at);
        let tally = VoteTally::count(votes, deadline);
        match self.decide(tally) {
            Verdict::Pending if deadline.is_some_and(|d| now > d) => Verdict::Expired,
            verdict => verdict,
        }
    }
}

/// Policies keyed by severity, plus creators allowed to skip review.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySet {
    pub default: ConsensusPolicy,
    /// A severity uses the entry with the greatest key not above it.
    pub by_severity: BTreeMap<u32, ConsensusPolicy>,
    /// Creators whose flags activate without voting
    pub privileged: BTreeSet<String>,
}

impl PolicySet {
    pub fn new(default: ConsensusPolicy) -> Self {
        Self {
            default,
            ..Default::default()
        }
    }

    pub fn with_severity(mut self, severity: u32, policy: ConsensusPolicy) -> Self {
        self.by_severity.insert(severity, policy);
        self
    }

    pub fn with_privileged(mut self, creator: impl Into<String>) -> Self {
        self.privileged.insert(creator.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.default.validate()?;
        for (severity, policy) in &self.by_severity {
            policy.validate().map_err(|e| {
                DataFlagError::Configuration(format!("severity {severity}: {e}"))
            })?;
        }
        Ok(())
    }

    pub fn for_severity(&self, severity: u32) -> &ConsensusPolicy {
        self.by_severity
            .range(..=severity)
            .next_back()
            .map(|(_, policy)| policy)
            .unwrap_or(&self.default)
    }

    pub fn is_privileged(&self, creator: &str) -> bool {
        self.privileged.contains(creator)
    }
}
