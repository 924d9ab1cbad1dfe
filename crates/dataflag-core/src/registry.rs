//! Flag type registry

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DataFlagError, Result};

/// A category of data flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagType {
    /// Unique code, e.g. `rfi`
    pub code: String,
    pub description: Option<String>,
    /// Higher is more severe; selects the consensus policy
    pub severity: u32,
    /// How flags of this type are generated (free-form JSON)
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl FlagType {
    pub fn new(code: impl Into<String>, severity: u32) -> Self {
        Self {
            code: code.into(),
            description: None,
            severity,
            metadata: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// In-process set of known flag types, kept in registration order.
#[derive(Debug, Default, Clone)]
pub struct FlagTypeRegistry {
    types: Vec<FlagType>,
    by_code: HashMap<String, usize>,
}

impl FlagTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from types already in registration order.
    pub fn from_types(types: impl IntoIterator<Item = FlagType>) -> Result<Self> {
        let mut registry = Self::new();
        for flag_type in types {
            registry.register(flag_type)?;
        }
        Ok(registry)
    }

    /// Register a new type
    pub fn register(&mut self, flag_type: FlagType) -> Result<()> {
        if self.by_code.contains_key(&flag_type.code) {
            return Err(DataFlagError::DuplicateType(flag_type.code));
        }
        self.by_code.insert(flag_type.code.clone(), self.types.len());
        self.types.push(flag_type);
        Ok(())
    }

    /// Get a type by code
    pub fn get(&self, code: &str) -> Result<&FlagType> {
        self.by_code
            .get(code)
            .map(|&idx| &self.types[idx])
            .ok_or_else(|| DataFlagError::UnknownType(code.to_string()))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.by_code.contains_key(code)
    }

    /// All types in registration order
    pub fn list(&self) -> &[FlagType] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let mut registry = FlagTypeRegistry::new();
        registry
            .register(FlagType::new("rfi", 2).with_description("Radio frequency interference"))
            .unwrap();
        let rfi = registry.get("rfi").unwrap();
        assert_eq!(rfi.severity, 2);
        assert_eq!(rfi.description.as_deref(), Some("Radio frequency interference"));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = FlagTypeRegistry::new();
        registry.register(FlagType::new("rfi", 2)).unwrap();
        let err = registry.register(FlagType::new("rfi", 5)).unwrap_err();
        assert!(matches!(err, DataFlagError::DuplicateType(code) if code == "rfi"));
        assert_eq!(registry.get("rfi").unwrap().severity, 2);
    }

    #[test]
    fn test_unknown_type() {
        let registry = FlagTypeRegistry::new();
        assert!(matches!(
            registry.get("missing"),
            Err(DataFlagError::UnknownType(code)) if code == "missing"
        ));
    }

    #[test]
    fn test_list_keeps_registration_order() {
        let registry = FlagTypeRegistry::from_types([
            FlagType::new("vote", 1),
            FlagType::new("rfi", 2),
            FlagType::new("bad_calibration", 3),
            FlagType::new("acjump", 1),
        ])
        .unwrap();
        let codes: Vec<_> = registry.list().iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes, ["vote", "rfi", "bad_calibration", "acjump"]);
    }
}
