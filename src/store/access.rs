//! Typed reads with explicit coercion rules.
//!
//! | stored            | readable as                                   |
//! |-------------------|-----------------------------------------------|
//! | string            | string; number/bool if the text parses; list  |
//! | integer           | integer types (range checked), float, string  |
//! | float             | float, string; integers when integral          |
//! | bool              | bool, string                                  |
//! | list              | `Vec<T>` when every item converts             |
//! | map               | `ConfigMap`                                   |
//!
//! Anything else is a [`TypeMismatchError`].

use thiserror::Error;

use crate::merge::{ConfigMap, ConfigValue, ValueKind};

/// Consumer asked for a type the stored value cannot be coerced to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("key '{key}' holds a {found}, which cannot be read as {expected}")]
pub struct TypeMismatchError {
    pub key: String,
    pub expected: &'static str,
    pub found: ValueKind,
}

/// Types readable from a [`ConfigValue`].
pub trait FromConfigValue: Sized {
    /// Name used in mismatch errors.
    const EXPECTED: &'static str;

    fn from_config_value(value: &ConfigValue) -> Option<Self>;
}

impl FromConfigValue for ConfigValue {
    const EXPECTED: &'static str = "any value";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromConfigValue for String {
    const EXPECTED: &'static str = "string";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::String(s) => Some(s.clone()),
            ConfigValue::Integer(_) | ConfigValue::Float(_) | ConfigValue::Bool(_) => {
                Some(value.to_string())
            }
            ConfigValue::List(_) | ConfigValue::Map(_) => None,
        }
    }
}

impl FromConfigValue for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl FromConfigValue for f64 {
    const EXPECTED: &'static str = "number";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Integer(i) => Some(*i as f64),
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromConfigValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Integer(i) => Some(*i),
            ConfigValue::Float(f)
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 =>
            {
                Some(*f as i64)
            }
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

macro_rules! integer_via_i64 {
    ($($ty:ty),*) => {
        $(
            impl FromConfigValue for $ty {
                const EXPECTED: &'static str = stringify!($ty);

                fn from_config_value(value: &ConfigValue) -> Option<Self> {
                    i64::from_config_value(value).and_then(|i| i.try_into().ok())
                }
            }
        )*
    };
}

integer_via_i64!(i32, u8, u16, u32, u64, usize);

impl<T: FromConfigValue> FromConfigValue for Vec<T> {
    const EXPECTED: &'static str = "list";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::List(items) => items.iter().map(T::from_config_value).collect(),
            // Comma separated strings bind to lists, as key-value files have no list syntax.
            ConfigValue::String(s) if !s.trim().is_empty() => s
                .split(',')
                .map(|item| T::from_config_value(&ConfigValue::infer(item.trim())))
                .collect(),
            ConfigValue::String(_) => Some(Vec::new()),
            _ => None,
        }
    }
}

impl FromConfigValue for ConfigMap {
    const EXPECTED: &'static str = "mapping";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        value.as_map().cloned()
    }
}

/// Read `key` from `values` as `T`.
pub(crate) fn read<T: FromConfigValue>(
    key: &str,
    value: Option<&ConfigValue>,
) -> Result<Option<T>, TypeMismatchError> {
    match value {
        None => Ok(None),
        Some(value) => T::from_config_value(value)
            .map(Some)
            .ok_or_else(|| TypeMismatchError {
                key: key.to_string(),
                expected: T::EXPECTED,
                found: value.kind(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> ConfigValue {
        ConfigValue::String(text.into())
    }

    #[test]
    fn test_string_coercions() {
        assert_eq!(u16::from_config_value(&s(" 8080 ")), Some(8080));
        assert_eq!(bool::from_config_value(&s("TRUE")), Some(true));
        assert_eq!(f64::from_config_value(&s("0.25")), Some(0.25));
        assert_eq!(i64::from_config_value(&s("fast")), None);
        assert_eq!(bool::from_config_value(&s("yes")), None);
    }

    #[test]
    fn test_number_coercions() {
        assert_eq!(f64::from_config_value(&ConfigValue::Integer(3)), Some(3.0));
        assert_eq!(i64::from_config_value(&ConfigValue::Float(4.0)), Some(4));
        assert_eq!(i64::from_config_value(&ConfigValue::Float(4.5)), None);
        assert_eq!(u32::from_config_value(&ConfigValue::Integer(-1)), None);
        assert_eq!(u8::from_config_value(&ConfigValue::Integer(300)), None);
        assert_eq!(
            String::from_config_value(&ConfigValue::Integer(60)),
            Some("60".to_string())
        );
        assert_eq!(bool::from_config_value(&ConfigValue::Integer(1)), None);
    }

    #[test]
    fn test_list_coercions() {
        let list = ConfigValue::List(vec![ConfigValue::Integer(1), ConfigValue::Integer(2)]);
        assert_eq!(Vec::<u32>::from_config_value(&list), Some(vec![1, 2]));
        assert_eq!(
            Vec::<String>::from_config_value(&s("a, b,c")),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(Vec::<u32>::from_config_value(&s("1,x")), None);
        assert_eq!(String::from_config_value(&list), None);
    }

    #[test]
    fn test_read_reports_mismatch() {
        let value = ConfigValue::Map(ConfigMap::new());
        let err = read::<u16>("server", Some(&value)).unwrap_err();
        assert_eq!(err.key, "server");
        assert_eq!(err.expected, "u16");
        assert_eq!(err.found, ValueKind::Map);

        assert_eq!(read::<u16>("missing", None), Ok(None));
    }
}
