//! Flag records and the status state machine
//!
//! Status transitions:
//! ```text
//! Proposed → Active → Superseded
//!     ↓
//!  Rejected
//! ```
//!
//! Flags are audit records and are never deleted; retirement is a status.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::Interval;
use crate::provenance::ClientInfo;
use crate::scope::Scope;

/// Unique, stable identifier of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagId(pub i64);

impl std::fmt::Display for FlagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FlagId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(FlagId)
    }
}

/// Lifecycle status of a flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlagStatus {
    /// Awaiting reviewer votes
    #[default]
    Proposed,
    /// Approved; visible to downstream pipelines
    Active,
    /// Rejected by reviewers or expired without quorum
    Rejected,
    /// Replaced by a broader active flag of the same type
    Superseded,
}

impl FlagStatus {
    pub const ALL: [FlagStatus; 4] = [
        FlagStatus::Proposed,
        FlagStatus::Active,
        FlagStatus::Rejected,
        FlagStatus::Superseded,
    ];

    /// Check if a status transition is valid
    pub fn can_transition_to(&self, target: &FlagStatus) -> bool {
        matches!(
            (self, target),
            (FlagStatus::Proposed, FlagStatus::Active)
                | (FlagStatus::Proposed, FlagStatus::Rejected)
                | (FlagStatus::Active, FlagStatus::Superseded)
        )
    }

    /// Get valid next statuses from the current one
    pub fn valid_transitions(&self) -> Vec<FlagStatus> {
        match self {
            FlagStatus::Proposed => vec![FlagStatus::Active, FlagStatus::Rejected],
            FlagStatus::Active => vec![FlagStatus::Superseded],
            FlagStatus::Rejected | FlagStatus::Superseded => vec![],
        }
    }

    /// Terminal as far as the review workflow is concerned.
    ///
    /// `Active` can still be superseded, but never by a vote.
    pub fn is_decided(&self) -> bool {
        !matches!(self, FlagStatus::Proposed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlagStatus::Proposed => "proposed",
            FlagStatus::Active => "active",
            FlagStatus::Rejected => "rejected",
            FlagStatus::Superseded => "superseded",
        }
    }
}

impl std::fmt::Display for FlagStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "proposed" => Ok(FlagStatus::Proposed),
            "active" => Ok(FlagStatus::Active),
            "rejected" => Ok(FlagStatus::Rejected),
            "superseded" => Ok(FlagStatus::Superseded),
            other => Err(format!("unknown flag status: {other}")),
        }
    }
}

/// A flagged range of data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub id: FlagId,
    /// Code of the registered flag type
    pub flag_type: String,
    pub interval: Interval,
    pub scope: Scope,
    pub notes: Option<String>,
    /// Extended metadata (free-form JSON object)
    pub metadata: Option<serde_json::Value>,
    pub status: FlagStatus,
    pub superseded_by: Option<FlagId>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    /// Pipeline revision the flag was raised against
    #[serde(default)]
    pub revision: Option<String>,
    /// Software that created the flag
    #[serde(default)]
    pub client: Option<ClientInfo>,
    /// Bumped on every status write; used for check-and-set
    pub version: u64,
}

impl Flag {
    pub fn start(&self) -> f64 {
        self.interval.start
    }

    pub fn end(&self) -> Option<f64> {
        self.interval.end
    }

    /// Whether this flag's interval and scope include all of `other`.
    pub fn subsumes(&self, other: &Flag) -> bool {
        self.flag_type == other.flag_type
            && self.interval.covers(&other.interval)
            && self.scope.covers(&other.scope)
    }
}

/// Input for creating a flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFlag {
    pub flag_type: String,
    pub start: f64,
    pub end: Option<f64>,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub created_by: String,
    /// Name of a registered data revision
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub client: Option<ClientInfo>,
}

impl NewFlag {
    pub fn new(
        flag_type: impl Into<String>,
        start: f64,
        end: Option<f64>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            flag_type: flag_type.into(),
            start,
            end,
            scope: Scope::default(),
            notes: None,
            metadata: None,
            created_by: created_by.into(),
            revision: None,
            client: None,
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn with_client(mut self, client: ClientInfo) -> Self {
        self.client = Some(client);
        self
    }
}

/// Outcome of a successful status write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub flag: Flag,
    pub previous: FlagStatus,
    /// Flags retired because the newly active flag covers them
    pub superseded: Vec<FlagId>,
}

/// One entry of a flag's append-only status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub flag_id: FlagId,
    pub from: FlagStatus,
    pub to: FlagStatus,
    pub version: u64,
    pub changed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FlagStatus::Proposed, FlagStatus::Proposed, false)]
    #[case(FlagStatus::Proposed, FlagStatus::Active, true)]
    #[case(FlagStatus::Proposed, FlagStatus::Rejected, true)]
    #[case(FlagStatus::Proposed, FlagStatus::Superseded, false)]
    #[case(FlagStatus::Active, FlagStatus::Proposed, false)]
    #[case(FlagStatus::Active, FlagStatus::Active, false)]
    #[case(FlagStatus::Active, FlagStatus::Rejected, false)]
    #[case(FlagStatus::Active, FlagStatus::Superseded, true)]
    #[case(FlagStatus::Rejected, FlagStatus::Proposed, false)]
    #[case(FlagStatus::Rejected, FlagStatus::Active, false)]
    #[case(FlagStatus::Rejected, FlagStatus::Rejected, false)]
    #[case(FlagStatus::Rejected, FlagStatus::Superseded, false)]
    #[case(FlagStatus::Superseded, FlagStatus::Proposed, false)]
    #[case(FlagStatus::Superseded, FlagStatus::Active, false)]
    #[case(FlagStatus::Superseded, FlagStatus::Rejected, false)]
    #[case(FlagStatus::Superseded, FlagStatus::Superseded, false)]
    fn transition_table(#[case] from: FlagStatus, #[case] to: FlagStatus, #[case] allowed: bool) {
        assert_eq!(from.can_transition_to(&to), allowed);
    }

    #[test]
    fn valid_transitions_agree_with_table() {
        for from in FlagStatus::ALL {
            for to in FlagStatus::ALL {
                assert_eq!(
                    from.valid_transitions().contains(&to),
                    from.can_transition_to(&to)
                );
            }
        }
    }

    #[test]
    fn status_string_round_trip() {
        for status in FlagStatus::ALL {
            assert_eq!(status.as_str().parse::<FlagStatus>(), Ok(status));
        }
        assert!("deleted".parse::<FlagStatus>().is_err());
    }

    #[test]
    fn subsumes_requires_same_type() {
        let base = Flag {
            id: FlagId(1),
            flag_type: "rfi".into(),
            interval: Interval::bounded(100.0, 200.0).unwrap(),
            scope: Scope::instrument("antenna-3"),
            notes: None,
            metadata: None,
            status: FlagStatus::Active,
            superseded_by: None,
            created_at: Utc::now(),
            created_by: "alice".into(),
            revision: None,
            client: None,
            version: 1,
        };
        let wider = Flag {
            id: FlagId(2),
            interval: Interval::bounded(100.0, 300.0).unwrap(),
            ..base.clone()
        };
        assert!(wider.subsumes(&base));
        assert!(!base.subsumes(&wider));

        let other_type = Flag {
            flag_type: "bad_calibration".into(),
            ..wider
        };
        assert!(!other_type.subsumes(&base));
    }
}
