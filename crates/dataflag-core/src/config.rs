//! Configuration loading
//!
//! Settings come from a TOML file:
//!
//! ```toml
//! [database]
//! path = "dataflags.sqlite"
//! busy_timeout_ms = 5000
//!
//! [consensus]
//! privileged = ["pipeline"]
//!
//! [consensus.default]
//! rule = "quorum"
//! quorum = 2
//! rejection_threshold = 2
//! review_window_secs = 1209600
//!
//! [consensus.severity.3]
//! rule = "unanimous"
//! quorum = 3
//! rejection_threshold = 1
//! ```
//!
//! Every section and field is optional; omitted values take the defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::consensus::{ConsensusPolicy, PolicySet};
use crate::error::{DataFlagError, Result};
use crate::persistence::StoreOptions;

/// Environment variable naming the config file when none is given.
pub const CONFIG_ENV: &str = "DATAFLAG_CONFIG";

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataFlagConfig {
    pub database: DatabaseConfig,
    pub consensus: PolicySet,
}

/// Database location and lock wait.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_path() -> PathBuf {
    PathBuf::from("dataflags.sqlite")
}
fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct TomlConsensus {
    #[serde(default)]
    privileged: Vec<String>,
    #[serde(default)]
    default: ConsensusPolicy,
    /// Keyed by severity; TOML table keys are always strings.
    #[serde(default)]
    severity: BTreeMap<String, ConsensusPolicy>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    database: DatabaseConfig,
    #[serde(default)]
    consensus: TomlConsensus,
}

impl DataFlagConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: TomlConfig = toml::from_str(content)
            .map_err(|e| DataFlagError::Configuration(format!("TOML parse error: {e}")))?;

        let mut consensus = PolicySet::new(raw.consensus.default);
        for (key, policy) in raw.consensus.severity {
            let severity: u32 = key.trim().parse().map_err(|_| {
                DataFlagError::Configuration(format!(
                    "consensus.severity key '{key}' is not a severity number"
                ))
            })?;
            consensus = consensus.with_severity(severity, policy);
        }
        for creator in raw.consensus.privileged {
            consensus = consensus.with_privileged(creator);
        }

        let config = Self {
            database: raw.database,
            consensus,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataFlagError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load from `path`, else from `$DATAFLAG_CONFIG`, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match std::env::var_os(CONFIG_ENV) {
                Some(path) => Self::load(PathBuf::from(path)),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.busy_timeout_ms == 0 {
            return Err(DataFlagError::Configuration(
                "database.busy_timeout_ms must be positive".into(),
            ));
        }
        self.consensus.validate()
    }
}
