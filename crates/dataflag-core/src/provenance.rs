//! Provenance of flags and votes
//!
//! A flag or vote may name the pipeline revision of the data it judged and
//! the client software that wrote it.

use serde::{Deserialize, Serialize};

/// A named revision of the processing pipeline that produced the data.
///
/// Revisions are registered once; flags and votes refer to them by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRevision {
    /// Unique name, e.g. `rev_07`
    pub name: String,
    pub description: Option<String>,
}

impl DataRevision {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Name and version of the software that wrote a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl ClientInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for ClientInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}
