//! Immutable, versioned configuration snapshots.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Serialize, Serializer};

use crate::merge::value::lookup;
use crate::merge::{ConfigMap, ConfigValue};
use crate::store::access::{read, FromConfigValue, TypeMismatchError};

/// A fully merged configuration state.
///
/// Never mutated once built; shared behind `Arc` and dropped when the last
/// reader lets go after it has been superseded.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSnapshot {
    version: u64,
    #[serde(rename = "created_at_ms", serialize_with = "unix_millis")]
    created_at: SystemTime,
    profiles: Vec<String>,
    origins: Vec<String>,
    values: ConfigMap,
}

impl ConfigSnapshot {
    pub fn new(version: u64, profiles: Vec<String>, origins: Vec<String>, values: ConfigMap) -> Self {
        Self {
            version,
            created_at: SystemTime::now(),
            profiles,
            origins,
            values,
        }
    }

    /// The version-0 snapshot served before the first successful refresh.
    pub fn empty() -> Self {
        Self::new(0, Vec::new(), Vec::new(), ConfigMap::new())
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Profiles the snapshot was merged from, in precedence order.
    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    /// Contributing documents, in the order they were applied.
    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    pub fn values(&self) -> &ConfigMap {
        &self.values
    }

    /// Raw value at a dotted key path.
    pub fn value(&self, key: &str) -> Option<&ConfigValue> {
        lookup(&self.values, key)
    }

    /// Typed value at `key`; `Ok(None)` when the key is absent.
    pub fn get<T: FromConfigValue>(&self, key: &str) -> Result<Option<T>, TypeMismatchError> {
        read(key, self.value(key))
    }

    /// Typed value at `key`, or `default` when absent.
    pub fn get_or<T: FromConfigValue>(&self, key: &str, default: T) -> Result<T, TypeMismatchError> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// True when both snapshots hold identical values read from the same origins.
    pub fn same_content(&self, other: &ConfigSnapshot) -> bool {
        self.values == other.values && self.origins == other.origins
    }
}

fn unix_millis<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let millis = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    serializer.serialize_u64(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ConfigSnapshot {
        let mut server = ConfigMap::new();
        server.insert("port".into(), ConfigValue::Integer(8080));
        server.insert("name".into(), ConfigValue::String("edge".into()));
        let mut values = ConfigMap::new();
        values.insert("server".into(), ConfigValue::Map(server));
        ConfigSnapshot::new(4, vec!["default".into()], vec!["test".into()], values)
    }

    #[test]
    fn test_typed_reads() {
        let snap = snapshot();
        assert_eq!(snap.get::<u16>("server.port"), Ok(Some(8080)));
        assert_eq!(snap.get::<String>("server.port"), Ok(Some("8080".into())));
        assert_eq!(snap.get::<u16>("server.missing"), Ok(None));
        assert_eq!(snap.get_or("server.threads", 4u32), Ok(4));
        assert!(snap.get::<bool>("server.name").is_err());
        assert!(snap.get_or("server.name", 1i64).is_err());
    }

    #[test]
    fn test_serializes_values_untagged() {
        let json = serde_json::to_value(snapshot()).unwrap();
        assert_eq!(json["version"], 4);
        assert_eq!(json["values"]["server"]["port"], 8080);
        assert!(json["created_at_ms"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_empty_snapshot() {
        let empty = ConfigSnapshot::empty();
        assert_eq!(empty.version(), 0);
        assert!(empty.values().is_empty());
        assert!(!empty.same_content(&snapshot()));
    }

    #[test]
    fn test_new_origin_is_new_content() {
        let current = snapshot();
        let same = ConfigSnapshot::new(
            5,
            vec!["default".into()],
            vec!["test".into()],
            current.values().clone(),
        );
        assert!(current.same_content(&same));

        let moved = ConfigSnapshot::new(
            5,
            vec!["default".into()],
            vec!["git:application.yml@4f2a9c1e0b7d".into()],
            current.values().clone(),
        );
        assert!(!current.same_content(&moved));
    }
}
