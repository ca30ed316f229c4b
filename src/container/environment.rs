use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::container::error::{ContainerError, ContainerResult};

/// Ambient configuration conditions are evaluated against: active profiles and properties.
///
/// ```
/// use bean_container::container::Environment;
///
/// let env = Environment::from_json_str(
///     r#"{ "active_profiles": ["dev"], "properties": { "db": { "pool": 4 } } }"#,
/// )
/// .unwrap();
/// assert!(env.has_profile("dev"));
/// assert_eq!(env.property("db.pool"), Some(&serde_json::json!(4)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    active_profiles: IndexSet<String>,
    properties: Map<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> ContainerResult<Self> {
        serde_json::from_value(value)
            .map_err(|err| ContainerError::InvalidEnvironment {
                reason: err.to_string(),
            })
    }

    pub fn from_json_str(source: &str) -> ContainerResult<Self> {
        serde_json::from_str(source)
            .map_err(|err| ContainerError::InvalidEnvironment {
                reason: err.to_string(),
            })
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.active_profiles.insert(profile.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn active_profiles(&self) -> impl Iterator<Item = &str> {
        self.active_profiles.iter().map(String::as_str)
    }

    pub fn has_profile(&self, profile: &str) -> bool {
        self.active_profiles.contains(profile)
    }

    /// Flat keys win; otherwise a dotted key walks nested objects.
    pub fn property(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.properties.get(key) {
            return Some(value);
        }

        let mut segments = key.split('.');
        let mut current = self.properties.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }
}
