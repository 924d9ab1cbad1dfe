//! Multi-reviewer consensus on proposed flags
//!
//! Reviewers vote on proposed flags; the engine applies the policy for the
//! flag type's severity and moves the flag to `active` or `rejected`.

mod engine;
mod policy;

pub use engine::{ConsensusEngine, Evaluation};
pub use policy::{ApprovalRule, ConsensusPolicy, PolicySet, Verdict};
