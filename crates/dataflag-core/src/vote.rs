//! Reviewer votes on proposed flags

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flag::FlagId;
use crate::provenance::ClientInfo;

/// A reviewer's decision on a proposed flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" | "yes" | "good" => Ok(Decision::Approve),
            "reject" | "no" | "bad" => Ok(Decision::Reject),
            other => Err(format!("Invalid decision '{other}'. Choose one of approve, reject")),
        }
    }
}

/// One reviewer's vote. Unique per `(flag_id, reviewer_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub flag_id: FlagId,
    pub reviewer_id: String,
    pub decision: Decision,
    pub cast_at: DateTime<Utc>,
    pub notes: Option<String>,
    /// Pipeline revision the reviewer looked at
    #[serde(default)]
    pub revision: Option<String>,
    /// Software the vote was cast with
    #[serde(default)]
    pub client: Option<ClientInfo>,
}

impl Vote {
    /// A vote cast now.
    pub fn new(flag_id: FlagId, reviewer_id: impl Into<String>, decision: Decision) -> Self {
        Self {
            flag_id,
            reviewer_id: reviewer_id.into(),
            decision,
            cast_at: Utc::now(),
            notes: None,
            revision: None,
            client: None,
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
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

/// Approve/reject counts over a set of votes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub approvals: u32,
    pub rejections: u32,
}

impl VoteTally {
    /// Count votes cast no later than `deadline` (all votes when `None`).
    pub fn count<'a>(
        votes: impl IntoIterator<Item = &'a Vote>,
        deadline: Option<DateTime<Utc>>,
    ) -> Self {
        let mut tally = Self::default();
        for vote in votes {
            if deadline.is_some_and(|d| vote.cast_at > d) {
                continue;
            }
            match vote.decision {
                Decision::Approve => tally.approvals += 1,
                Decision::Reject => tally.rejections += 1,
            }
        }
        tally
    }

    pub fn total(&self) -> u32 {
        self.approvals + self.rejections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn vote(reviewer: &str, decision: Decision, cast_at: DateTime<Utc>) -> Vote {
        Vote {
            cast_at,
            ..Vote::new(FlagId(1), reviewer, decision)
        }
    }

    #[test]
    fn parse_decision() {
        assert_eq!("approve".parse::<Decision>(), Ok(Decision::Approve));
        assert_eq!("Reject".parse::<Decision>(), Ok(Decision::Reject));
        assert_eq!("bad".parse::<Decision>(), Ok(Decision::Reject));
        let err = "idontknow".parse::<Decision>().unwrap_err();
        assert!(err.contains("Invalid decision"));
    }

    #[test]
    fn tally_respects_deadline() {
        let now = Utc::now();
        let votes = vec![
            vote("alice", Decision::Approve, now - Duration::hours(2)),
            vote("bob", Decision::Reject, now - Duration::hours(1)),
            vote("carol", Decision::Approve, now + Duration::hours(1)),
        ];
        let all = VoteTally::count(&votes, None);
        assert_eq!((all.approvals, all.rejections), (2, 1));

        let in_window = VoteTally::count(&votes, Some(now));
        assert_eq!((in_window.approvals, in_window.rejections), (1, 1));
        assert_eq!(in_window.total(), 2);
    }
}
