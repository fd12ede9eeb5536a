//! Typed configuration values.
//!
//! Every document format is normalized into [`ConfigValue`] before merging,
//! so precedence and type checks work the same for properties, TOML, YAML
//! and JSON.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Nested mapping of configuration keys to values.
pub type ConfigMap = BTreeMap<String, ConfigValue>;

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    List(Vec<ConfigValue>),
    Map(ConfigMap),
}

/// Basic type of a value, as compared across profiles.
///
/// `Integer` and `Float` share the `Number` kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Number,
    Bool,
    List,
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Bool => "boolean",
            ValueKind::List => "list",
            ValueKind::Map => "mapping",
        };
        f.write_str(name)
    }
}

impl ConfigValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::String(_) => ValueKind::String,
            ConfigValue::Integer(_) | ConfigValue::Float(_) => ValueKind::Number,
            ConfigValue::Bool(_) => ValueKind::Bool,
            ConfigValue::List(_) => ValueKind::List,
            ConfigValue::Map(_) => ValueKind::Map,
        }
    }

    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            ConfigValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Infer a typed scalar from untyped text (key-value documents).
    ///
    /// Integer, then float, then `true`/`false`, otherwise string.
    pub fn infer(text: &str) -> ConfigValue {
        let trimmed = text.trim();
        // A number must print back as the same text, else it stays a string.
        if let Ok(i) = trimmed.parse::<i64>() {
            if i.to_string() == trimmed {
                return ConfigValue::Integer(i);
            }
        }
        if looks_numeric(trimmed) {
            if let Ok(f) = trimmed.parse::<f64>() {
                if f.to_string() == trimmed || format!("{:?}", f) == trimmed {
                    return ConfigValue::Float(f);
                }
            }
        }
        match trimmed {
            "true" => ConfigValue::Bool(true),
            "false" => ConfigValue::Bool(false),
            _ => ConfigValue::String(text.to_string()),
        }
    }
}

// Rejects "inf", "NaN" and friends, which f64::from_str accepts.
fn looks_numeric(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        && text.chars().any(|c| c.is_ascii_digit())
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => f.write_str(s),
            ConfigValue::Integer(i) => write!(f, "{}", i),
            ConfigValue::Float(x) => write!(f, "{}", x),
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            ConfigValue::Map(_) => f.write_str("{...}"),
        }
    }
}

/// Resolve a dotted key path against a nested map.
///
/// Literal keys containing dots (as YAML allows) take precedence over
/// descending into nested maps.
pub fn lookup<'a>(map: &'a ConfigMap, path: &str) -> Option<&'a ConfigValue> {
    if let Some(value) = map.get(path) {
        return Some(value);
    }
    for (idx, _) in path.match_indices('.') {
        let (head, rest) = (&path[..idx], &path[idx + 1..]);
        if let Some(nested) = map.get(head).and_then(ConfigValue::as_map) {
            if let Some(value) = lookup(nested, rest) {
                return Some(value);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_scalars() {
        assert_eq!(ConfigValue::infer("30"), ConfigValue::Integer(30));
        assert_eq!(ConfigValue::infer("-2"), ConfigValue::Integer(-2));
        assert_eq!(ConfigValue::infer("0.75"), ConfigValue::Float(0.75));
        assert_eq!(ConfigValue::infer("true"), ConfigValue::Bool(true));
        assert_eq!(ConfigValue::infer("inf"), ConfigValue::String("inf".into()));
        assert_eq!(ConfigValue::infer("8080a"), ConfigValue::String("8080a".into()));
        assert_eq!(ConfigValue::infer("1.0"), ConfigValue::Float(1.0));
    }

    #[test]
    fn test_infer_keeps_text_numbers_would_alter() {
        for text in ["1.10", "01234", "12345678901234567890", "+5", "1e3"] {
            assert_eq!(ConfigValue::infer(text), ConfigValue::String(text.into()), "{}", text);
        }
    }

    #[test]
    fn test_number_kinds_match() {
        assert_eq!(ConfigValue::Integer(1).kind(), ConfigValue::Float(1.5).kind());
        assert_ne!(ConfigValue::Integer(1).kind(), ConfigValue::String("1".into()).kind());
    }

    #[test]
    fn test_lookup_paths() {
        let mut server = ConfigMap::new();
        server.insert("port".into(), ConfigValue::Integer(8080));
        let mut root = ConfigMap::new();
        root.insert("server".into(), ConfigValue::Map(server));
        root.insert("logging.level".into(), ConfigValue::String("debug".into()));

        assert_eq!(lookup(&root, "server.port"), Some(&ConfigValue::Integer(8080)));
        assert_eq!(
            lookup(&root, "logging.level"),
            Some(&ConfigValue::String("debug".into()))
        );
        assert!(lookup(&root, "server.host").is_none());
        assert!(lookup(&root, "server.port.extra").is_none());
    }
}
