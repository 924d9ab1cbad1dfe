//! Dataflag Core - Time-interval data flags with multi-reviewer approval
//!
//! This crate provides the core of the data flag system used by pipelines to
//! exclude or tag spans of instrument data:
//!
//! - **Registry**: Flag types (code, description, severity)
//! - **Flag**: Flag records with interval, scope and status state machine (Proposed→Active→Superseded, Proposed→Rejected)
//! - **Index**: In-process interval index over flags sorted by start
//! - **Store**: `FlagStore`/`VoteStore` traits with a SQLite backend shared by many processes
//! - **Consensus**: Vote-driven activation with severity-keyed policies and automatic supersession
//! - **Query**: Read-only "is this time flagged" facade over active flags
//! - **Config**: TOML configuration for the database and consensus policies
//! - **Provenance**: Data revisions and client versions recorded on flags and votes
//!
//! # Interval semantics
//!
//! Flags cover half-open intervals `[start, end)` in UNIX seconds; a flag
//! without an end is ongoing. Query results are ordered by start, then id.

pub mod config;
pub mod consensus;
pub mod error;
pub mod flag;
pub mod index;
pub mod interval;
pub mod persistence;
pub mod provenance;
pub mod query;
pub mod registry;
pub mod scope;
pub mod store;
pub mod vote;

pub use config::{DataFlagConfig, DatabaseConfig};
pub use consensus::{
    ApprovalRule, ConsensusEngine, ConsensusPolicy, Evaluation, PolicySet, Verdict,
};
pub use error::{DataFlagError, Result};
pub use flag::{Flag, FlagId, FlagStatus, NewFlag, StatusChange, StatusRecord};
pub use index::IntervalIndex;
pub use interval::{Interval, TimeRange};
pub use persistence::{SqliteStore, StoreOptions};
pub use provenance::{ClientInfo, DataRevision};
pub use query::QueryService;
pub use registry::{FlagType, FlagTypeRegistry};
pub use scope::Scope;
pub use store::{FlagFilter, FlagStore, VoteStore};
pub use vote::{Decision, Vote, VoteTally};
