//! Flag scope: which instrument, frequencies and inputs a flag applies to.
//!
//! Each dimension is optional. An unset dimension means "all" in that
//! dimension, so `Scope::default()` applies everywhere.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Restriction of a flag to part of the instrument.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Instrument name, e.g. `chime` or `antenna-3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    /// Frequency channel ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq: Option<BTreeSet<u32>>,
    /// Feed ids (in cylinder order).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<BTreeSet<u32>>,
}

impl Scope {
    /// Scope that applies to everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn instrument(name: impl Into<String>) -> Self {
        Self {
            instrument: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_freq(mut self, freq: impl IntoIterator<Item = u32>) -> Self {
        self.freq = Some(freq.into_iter().collect());
        self
    }

    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = u32>) -> Self {
        self.inputs = Some(inputs.into_iter().collect());
        self
    }

    pub fn is_global(&self) -> bool {
        self.instrument.is_none() && self.freq.is_none() && self.inputs.is_none()
    }

    /// Whether a flag with this scope is relevant to a query for `other`.
    ///
    /// Dimensions intersect independently; an unset side matches anything.
    pub fn intersects(&self, other: &Scope) -> bool {
        let instrument = match (&self.instrument, &other.instrument) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        instrument
            && sets_intersect(&self.freq, &other.freq)
            && sets_intersect(&self.inputs, &other.inputs)
    }

    /// Whether this scope includes everything `other` applies to.
    pub fn covers(&self, other: &Scope) -> bool {
        let instrument = match (&self.instrument, &other.instrument) {
            (None, _) => true,
            (Some(a), Some(b)) => a == b,
            (Some(_), None) => false,
        };
        instrument
            && set_covers(&self.freq, &other.freq)
            && set_covers(&self.inputs, &other.inputs)
    }
}

fn sets_intersect(a: &Option<BTreeSet<u32>>, b: &Option<BTreeSet<u32>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => !a.is_disjoint(b),
        _ => true,
    }
}

fn set_covers(outer: &Option<BTreeSet<u32>>, inner: &Option<BTreeSet<u32>>) -> bool {
    match (outer, inner) {
        (None, _) => true,
        (Some(a), Some(b)) => a.is_superset(b),
        (Some(_), None) => false,
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_global() {
            return write!(f, "*");
        }
        let mut parts = Vec::new();
        if let Some(instrument) = &self.instrument {
            parts.push(instrument.clone());
        }
        if let Some(freq) = &self.freq {
            parts.push(format!("freq={}", join_ids(freq)));
        }
        if let Some(inputs) = &self.inputs {
            parts.push(format!("inputs={}", join_ids(inputs)));
        }
        write!(f, "{}", parts.join(" "))
    }
}

fn join_ids(ids: &BTreeSet<u32>) -> String {
    ids.iter().map(u32::to_string).collect::<Vec<_>>().join(",")
}
