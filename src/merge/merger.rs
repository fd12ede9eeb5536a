//! Profile-ordered merge of parsed documents.

use crate::merge::error::MergeError;
use crate::merge::parser::parse_document;
use crate::merge::plan::MergePlan;
use crate::merge::value::{ConfigMap, ConfigValue};
use crate::source::RawDocument;
use crate::store::ConfigSnapshot;

/// Merge `documents` in plan order into a snapshot carrying `version`.
///
/// Documents are applied by profile position, then by source position.
/// Every key in a later document overwrites the earlier value; keys it does
/// not mention keep their earlier values.
pub fn merge(
    mut documents: Vec<RawDocument>,
    plan: &MergePlan,
    version: u64,
) -> Result<ConfigSnapshot, MergeError> {
    documents.retain(|doc| {
        let known = plan.position(&doc.profile).is_some();
        if !known {
            tracing::debug!(origin = %doc.origin, profile = %doc.profile, "Skipping document for inactive profile");
        }
        known
    });
    documents.sort_by_key(|doc| (plan.position(&doc.profile), doc.source_index));

    let mut values = ConfigMap::new();
    let mut origins = Vec::with_capacity(documents.len());

    for doc in &documents {
        let parsed = parse_document(doc)?;
        merge_into(&mut values, parsed, "", &doc.profile)?;
        origins.push(doc.origin.clone());
    }

    Ok(ConfigSnapshot::new(
        version,
        plan.profiles().to_vec(),
        origins,
        values,
    ))
}

fn merge_into(
    target: &mut ConfigMap,
    incoming: ConfigMap,
    prefix: &str,
    profile: &str,
) -> Result<(), MergeError> {
    for (key, value) in incoming {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match target.get_mut(&key) {
            None => {
                target.insert(key, value);
            }
            Some(existing) => {
                if existing.kind() != value.kind() {
                    return Err(MergeError::Conflict {
                        key: path,
                        profile: profile.to_string(),
                        existing: existing.kind(),
                        incoming: value.kind(),
                    });
                }
                match (existing, value) {
                    (ConfigValue::Map(existing), ConfigValue::Map(nested)) => {
                        merge_into(existing, nested, &path, profile)?;
                    }
                    (slot, value) => *slot = value,
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::value::ValueKind;
    use crate::source::DocumentFormat;

    fn props(profile: &str, source_index: usize, text: &str) -> RawDocument {
        RawDocument {
            origin: format!("test:{}#{}", profile, source_index),
            format: DocumentFormat::Properties,
            profile: profile.into(),
            source_index,
            bytes: text.as_bytes().to_vec(),
        }
    }

    fn document(profile: &str, format: DocumentFormat, text: &str) -> RawDocument {
        RawDocument {
            format,
            ..props(profile, 0, text)
        }
    }

    #[test]
    fn test_active_profile_overrides_default() {
        let plan = MergePlan::new(["prod"]);
        // Out of order on purpose: plan order decides, not fetch order.
        let docs = vec![
            props("prod", 0, "timeout=60\n"),
            props("default", 0, "timeout=30\nretries=3\n"),
        ];

        let snapshot = merge(docs, &plan, 1).unwrap();
        assert_eq!(snapshot.value("timeout"), Some(&ConfigValue::Integer(60)));
        assert_eq!(snapshot.value("retries"), Some(&ConfigValue::Integer(3)));
        assert_eq!(snapshot.version(), 1);
        assert_eq!(snapshot.origins(), ["test:default#0", "test:prod#0"]);
    }

    #[test]
    fn test_last_profile_in_plan_wins() {
        let plan = MergePlan::new(["dev", "local"]);
        let docs = vec![
            props("local", 0, "a=3\n"),
            props("default", 0, "a=1\nb=1\nc=1\n"),
            props("dev", 0, "a=2\nb=2\n"),
        ];

        let snapshot = merge(docs, &plan, 7).unwrap();
        assert_eq!(snapshot.value("a"), Some(&ConfigValue::Integer(3)));
        assert_eq!(snapshot.value("b"), Some(&ConfigValue::Integer(2)));
        assert_eq!(snapshot.value("c"), Some(&ConfigValue::Integer(1)));
    }

    #[test]
    fn test_later_source_wins_within_profile() {
        let plan = MergePlan::default();
        let docs = vec![
            props("default", 1, "region=eu\n"),
            props("default", 0, "region=us\nzone=a\n"),
        ];

        let snapshot = merge(docs, &plan, 1).unwrap();
        assert_eq!(snapshot.value("region"), Some(&ConfigValue::String("eu".into())));
        assert_eq!(snapshot.value("zone"), Some(&ConfigValue::String("a".into())));
    }

    #[test]
    fn test_nested_maps_merge_recursively() {
        let plan = MergePlan::new(["prod"]);
        let docs = vec![
            props("default", 0, "db.host=localhost\ndb.port=5432\n"),
            props("prod", 0, "db.host=db.internal\n"),
        ];

        let snapshot = merge(docs, &plan, 1).unwrap();
        assert_eq!(
            snapshot.value("db.host"),
            Some(&ConfigValue::String("db.internal".into()))
        );
        assert_eq!(snapshot.value("db.port"), Some(&ConfigValue::Integer(5432)));
    }

    #[test]
    fn test_type_change_is_conflict() {
        let plan = MergePlan::new(["dev"]);
        let docs = vec![
            props("default", 0, "port=8080\n"),
            props("dev", 0, "port=http\n"),
        ];

        match merge(docs, &plan, 1) {
            Err(MergeError::Conflict {
                key,
                profile,
                existing,
                incoming,
            }) => {
                assert_eq!(key, "port");
                assert_eq!(profile, "dev");
                assert_eq!(existing, ValueKind::Number);
                assert_eq!(incoming, ValueKind::String);
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_number_like_text_reads_back_verbatim() {
        let plan = MergePlan::default();
        let docs = vec![props(
            "default",
            0,
            "app.version=1.10\nbilling.account=01234\nledger.id=12345678901234567890\n",
        )];

        let snapshot = merge(docs, &plan, 1).unwrap();
        for (key, text) in [
            ("app.version", "1.10"),
            ("billing.account", "01234"),
            ("ledger.id", "12345678901234567890"),
        ] {
            assert_eq!(snapshot.get::<String>(key).unwrap().as_deref(), Some(text));
        }
    }

    #[test]
    fn test_dotted_key_in_nested_json_is_conflict() {
        let plan = MergePlan::new(["dev"]);
        let docs = vec![
            document("default", DocumentFormat::Yaml, "db:\n  pool:\n    size: 5\n"),
            document("dev", DocumentFormat::Json, r#"{"db": {"pool.size": "large"}}"#),
        ];

        match merge(docs, &plan, 1) {
            Err(MergeError::Conflict { key, profile, .. }) => {
                assert_eq!(key, "db.pool.size");
                assert_eq!(profile, "dev");
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_section_replaced_by_scalar_is_conflict() {
        let plan = MergePlan::new(["dev"]);
        let docs = vec![
            props("default", 0, "cache.ttl=5\n"),
            props("dev", 0, "cache=off\n"),
        ];
        let err = merge(docs, &plan, 1).unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[test]
    fn test_inactive_profiles_and_empty_input() {
        let plan = MergePlan::default();
        let docs = vec![props("prod", 0, "x=1\n")];
        let snapshot = merge(docs, &plan, 3).unwrap();
        assert!(snapshot.values().is_empty());
        assert!(snapshot.origins().is_empty());
    }
}
