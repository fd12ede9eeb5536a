//! Document parsing into typed value maps.
//!
//! All formats end up as a nested [`ConfigMap`]. Dotted keys (`server.port`)
//! are expanded into nested maps regardless of format, so a properties file
//! and a YAML file describing the same keys merge cleanly.

use crate::merge::error::MergeError;
use crate::merge::value::{ConfigMap, ConfigValue};
use crate::source::{DocumentFormat, RawDocument};

/// Parse a fetched document.
pub fn parse_document(doc: &RawDocument) -> Result<ConfigMap, MergeError> {
    let fail = |message: String| MergeError::Parse {
        document: doc.origin.clone(),
        message,
    };

    let text = std::str::from_utf8(&doc.bytes)
        .map_err(|e| fail(format!("not valid UTF-8: {}", e)))?;

    match doc.format {
        DocumentFormat::Properties => parse_properties(text),
        DocumentFormat::Toml => parse_toml(text),
        DocumentFormat::Yaml => parse_yaml(text),
        DocumentFormat::Json => parse_json(text),
    }
    .map_err(fail)
}

/// Parse `key=value` / `key: value` lines.
///
/// `#` and `!` start comment lines, a trailing backslash continues the value
/// on the next line, and a bare key has an empty value.
pub fn parse_properties(text: &str) -> Result<ConfigMap, String> {
    let mut map = ConfigMap::new();
    let mut lines = text.lines().enumerate();

    while let Some((idx, line)) = lines.next() {
        let line_no = idx + 1;
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = trimmed.trim_end().to_string();
        while logical.ends_with('\\') {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim()),
                None => break,
            }
        }

        let (key, value) = match logical.find(|c: char| c == '=' || c == ':') {
            Some(sep) => (logical[..sep].trim(), logical[sep + 1..].trim()),
            None => (logical.as_str(), ""),
        };

        insert_path(&mut map, key, ConfigValue::infer(value))
            .map_err(|e| format!("line {}: {}", line_no, e))?;
    }

    Ok(map)
}

fn parse_toml(text: &str) -> Result<ConfigMap, String> {
    let table: toml::Table = toml::from_str(text).map_err(|e| e.to_string())?;
    build_map(table.into_iter().map(|(k, v)| -> Entry { Ok((k, Some(from_toml(v)?))) }))
}

fn from_toml(value: toml::Value) -> Result<ConfigValue, String> {
    Ok(match value {
        toml::Value::String(s) => ConfigValue::String(s),
        toml::Value::Integer(i) => ConfigValue::Integer(i),
        toml::Value::Float(f) => ConfigValue::Float(f),
        toml::Value::Boolean(b) => ConfigValue::Bool(b),
        toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
        toml::Value::Array(items) => ConfigValue::List(
            items
                .into_iter()
                .map(from_toml)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        toml::Value::Table(table) => ConfigValue::Map(build_map(
            table
                .into_iter()
                .map(|(k, v)| -> Entry { Ok((k, Some(from_toml(v)?))) }),
        )?),
    })
}

fn parse_yaml(text: &str) -> Result<ConfigMap, String> {
    let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
    match value {
        serde_yaml::Value::Null => Ok(ConfigMap::new()),
        serde_yaml::Value::Mapping(mapping) => yaml_mapping(mapping),
        _ => Err("top level must be a mapping".to_string()),
    }
}

fn yaml_mapping(mapping: serde_yaml::Mapping) -> Result<ConfigMap, String> {
    build_map(
        mapping
            .into_iter()
            .map(|(k, v)| -> Entry { Ok((yaml_key(k)?, from_yaml(v)?)) }),
    )
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("unsupported mapping key {:?}", other)),
    }
}

// Null means "absent" and yields None.
fn from_yaml(value: serde_yaml::Value) -> Result<Option<ConfigValue>, String> {
    Ok(Some(match value {
        serde_yaml::Value::Null => return Ok(None),
        serde_yaml::Value::Bool(b) => ConfigValue::Bool(b),
        serde_yaml::Value::Number(n) => match n.as_i64() {
            Some(i) => ConfigValue::Integer(i),
            None => ConfigValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_yaml::Value::String(s) => ConfigValue::String(s),
        serde_yaml::Value::Sequence(items) => ConfigValue::List(
            items
                .into_iter()
                .map(from_yaml)
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .flatten()
                .collect(),
        ),
        serde_yaml::Value::Mapping(mapping) => ConfigValue::Map(yaml_mapping(mapping)?),
        serde_yaml::Value::Tagged(tagged) => {
            let tagged = *tagged;
            return from_yaml(tagged.value);
        }
    }))
}

fn parse_json(text: &str) -> Result<ConfigMap, String> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    match value {
        serde_json::Value::Object(object) => json_object(object),
        _ => Err("top level must be an object".to_string()),
    }
}

fn json_object(object: serde_json::Map<String, serde_json::Value>) -> Result<ConfigMap, String> {
    build_map(
        object
            .into_iter()
            .map(|(k, v)| -> Entry { Ok((k, from_json(v)?)) }),
    )
}

fn from_json(value: serde_json::Value) -> Result<Option<ConfigValue>, String> {
    Ok(Some(match value {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::Bool(b) => ConfigValue::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => ConfigValue::Integer(i),
            None => ConfigValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => ConfigValue::String(s),
        serde_json::Value::Array(items) => ConfigValue::List(
            items
                .into_iter()
                .map(from_json)
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .flatten()
                .collect(),
        ),
        serde_json::Value::Object(object) => ConfigValue::Map(json_object(object)?),
    }))
}

type Entry = Result<(String, Option<ConfigValue>), String>;

fn build_map<I>(entries: I) -> Result<ConfigMap, String>
where
    I: IntoIterator<Item = Entry>,
{
    let mut map = ConfigMap::new();
    for entry in entries {
        if let (key, Some(value)) = entry? {
            insert_path(&mut map, &key, value)?;
        }
    }
    Ok(map)
}

/// Insert `value` at a dotted `path`, creating intermediate maps.
///
/// Maps merge into existing maps; a path that is both a scalar and a
/// section is rejected. Repeated scalar keys keep the last value.
fn insert_path(map: &mut ConfigMap, path: &str, value: ConfigValue) -> Result<(), String> {
    if path.is_empty() {
        return Err("empty key".to_string());
    }

    match path.split_once('.') {
        Some((head, rest)) => {
            if head.is_empty() || rest.is_empty() {
                return Err(format!("malformed key `{}`", path));
            }
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| ConfigValue::Map(ConfigMap::new()));
            match entry {
                ConfigValue::Map(nested) => insert_path(nested, rest, value),
                _ => Err(format!("`{}` is both a value and a section", head)),
            }
        }
        None => {
            if let Some(existing) = map.get_mut(path) {
                return match (existing, value) {
                    (ConfigValue::Map(existing), ConfigValue::Map(incoming)) => {
                        for (k, v) in incoming {
                            insert_path(existing, &k, v)?;
                        }
                        Ok(())
                    }
                    (ConfigValue::Map(_), _) | (_, ConfigValue::Map(_)) => {
                        Err(format!("`{}` is both a value and a section", path))
                    }
                    (slot, value) => {
                        *slot = value;
                        Ok(())
                    }
                };
            }
            map.insert(path.to_string(), value);
            Ok(())
        }
    }
}
