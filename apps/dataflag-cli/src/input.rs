//! Argument parsing and CLI-level errors

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::Args;
use dataflag_core::{DataFlagError, Scope};

/// Exit status for malformed arguments.
pub const EXIT_USAGE: u8 = 64;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] DataFlagError),

    #[error("Invalid argument: {0}")]
    Input(String),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Core(err) => err.exit_code(),
            CliError::Input(_) => EXIT_USAGE,
            CliError::Output(_) => 1,
        }
    }
}

/// Parse a time given as unix seconds, RFC 3339, or a UTC calendar date.
pub fn parse_time(value: &str) -> Result<f64, String> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<f64>() {
        if secs.is_finite() {
            return Ok(secs);
        }
    }
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(to_unix(time.with_timezone(&Utc)));
    }
    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(time) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(to_unix(time.and_utc()));
        }
    }
    if let Some(time) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(to_unix(time.and_utc()));
    }
    Err(format!(
        "could not parse time \"{value}\"; use unix seconds, RFC 3339, or YYYY-MM-DD[ HH:MM[:SS]] in UTC"
    ))
}

fn to_unix(time: DateTime<Utc>) -> f64 {
    time.timestamp() as f64 + f64::from(time.timestamp_subsec_micros()) / 1e6
}

/// Parse a JSON object argument (flag and type metadata).
pub fn parse_json_object(value: &str) -> Result<serde_json::Value, String> {
    let parsed: serde_json::Value =
        serde_json::from_str(value).map_err(|e| format!("could not read \"{value}\" as JSON: {e}"))?;
    if !parsed.is_object() {
        return Err(format!("JSON \"{value}\" is not an object"));
    }
    Ok(parsed)
}

/// Comma-separated integer ids, optionally bracketed: `1,2,3` or `[1, 2, 3]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdList(pub Vec<u32>);

impl FromStr for IdList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s.trim().trim_start_matches('[').trim_end_matches(']');
        inner
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| {
                item.parse::<u32>()
                    .map_err(|e| format!("invalid id \"{item}\": {e}"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(IdList)
    }
}

/// Scope restriction shared by several subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    /// Instrument the flag applies to
    #[arg(long)]
    pub instrument: Option<String>,

    /// Frequency ids, e.g. `10,11,12`
    #[arg(long)]
    pub freq: Option<IdList>,

    /// Input ids, e.g. `0,1,2`
    #[arg(long)]
    pub inputs: Option<IdList>,
}

impl ScopeArgs {
    pub fn to_scope(&self) -> Scope {
        let mut scope = match &self.instrument {
            Some(name) => Scope::instrument(name.clone()),
            None => Scope::all(),
        };
        if let Some(IdList(freq)) = &self.freq {
            scope = scope.with_freq(freq.iter().copied());
        }
        if let Some(IdList(inputs)) = &self.inputs {
            scope = scope.with_inputs(inputs.iter().copied());
        }
        scope
    }

    /// `None` when no dimension was given.
    pub fn to_filter_scope(&self) -> Option<Scope> {
        let scope = self.to_scope();
        (!scope.is_global()).then_some(scope)
    }
}

/// Caller identity: explicit value, else the login name.
pub fn identity(explicit: Option<&str>, what: &str) -> Result<String, CliError> {
    if let Some(name) = explicit {
        return Ok(name.to_string());
    }
    std::env::var("USER")
        .ok()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| CliError::Input(format!("no {what} given and $USER is not set")))
}
