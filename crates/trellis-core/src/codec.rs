//! Conversion between an entity's serde form and stored graph properties

use crate::entity::EntityConfig;
use crate::error::{Error, Result};
use crate::field::FieldConfig;
use crate::key::Key;
use crate::snapshot::LoadSnapshot;
use crate::value::{Params, PropertyMap, Value};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value as Json};
use std::collections::BTreeSet;

/// Separator between a properties field's stored name and its map keys
pub const PROPERTIES_SEPARATOR: char = '.';

/// Build the property map written for an entity.
///
/// Relationship, primary-key and ignored fields are skipped. Null values are
/// kept so the write removes the property.
pub fn encode_properties(config: &EntityConfig, json: &Json) -> Result<Params> {
    let mut props = Params::new();
    for field in config.properties() {
        let value = json.get(&field.field_name).unwrap_or(&Json::Null);
        encode_field(config, field, value, &mut props)?;
    }
    Ok(props)
}

/// Record the map keys every properties field currently holds
pub fn record_property_keys(
    config: &EntityConfig,
    record: &Map<String, Json>,
    snapshot: &mut LoadSnapshot,
) {
    for field in config.properties().filter(|f| f.properties) {
        snapshot.set_property_keys(&field.stored_name, map_keys(record, field));
    }
}

/// Null out the entries a properties field held in `before` that it no
/// longer holds, so the write removes them
pub fn remove_dropped_keys(
    config: &EntityConfig,
    record: &Map<String, Json>,
    before: &LoadSnapshot,
    props: &mut Params,
) {
    for field in config.properties().filter(|f| f.properties) {
        let Some(previous) = before.property_keys(&field.stored_name) else {
            continue;
        };
        let current = map_keys(record, field);
        for gone in previous.difference(&current) {
            props.insert(
                format!("{}{}{}", field.stored_name, PROPERTIES_SEPARATOR, gone),
                Value::Null,
            );
        }
    }
}

fn map_keys(record: &Map<String, Json>, field: &FieldConfig) -> BTreeSet<String> {
    record
        .get(&field.field_name)
        .and_then(Json::as_object)
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

fn encode_field(config: &EntityConfig, field: &FieldConfig, value: &Json, props: &mut Params) -> Result<()> {
    if field.properties {
        match value {
            Json::Null => {}
            Json::Object(map) => {
                for (k, v) in map {
                    props.insert(
                        format!("{}{}{}", field.stored_name, PROPERTIES_SEPARATOR, k),
                        Value::from_json(v.clone()),
                    );
                }
            }
            _ => return Err(conversion(config, field, "expected a map")),
        }
        return Ok(());
    }

    let stored = if field.time && !field.is_epoch_time() {
        match value {
            Json::Null => Value::Null,
            Json::String(s) => Value::String(canonical_time(s).map_err(|e| conversion(config, field, &e))?),
            _ => return Err(conversion(config, field, "expected an RFC 3339 timestamp")),
        }
    } else if let Some(primitive) = field.alias {
        let coerced = primitive
            .coerce(value)
            .ok_or_else(|| conversion(config, field, &format!("value is not a {:?}", primitive)))?;
        Value::from_json(coerced)
    } else {
        Value::from_json(value.clone())
    };

    props.insert(field.stored_name.clone(), stored);
    Ok(())
}

/// Rebuild an entity's serde form (without relationship fields) from
/// stored properties.
pub fn decode_properties(config: &EntityConfig, props: &PropertyMap, key: &Key) -> Map<String, Json> {
    let mut out = Map::new();
    out.insert(config.primary_key().field_name.clone(), key.to_json());

    for field in config.properties() {
        let value = if field.properties {
            let prefix = format!("{}{}", field.stored_name, PROPERTIES_SEPARATOR);
            Json::Object(
                props
                    .iter()
                    .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|rest| (rest.to_string(), v.to_json())))
                    .collect(),
            )
        } else {
            props.get(&field.stored_name).map(Value::to_json).unwrap_or(Json::Null)
        };
        out.insert(field.field_name.clone(), value);
    }

    out
}

/// Read the primary key out of stored properties
pub fn stored_key(config: &EntityConfig, props: &PropertyMap) -> Result<Key> {
    let pk = config.primary_key();
    props
        .get(&pk.stored_name)
        .and_then(Key::from_value)
        .ok_or_else(|| {
            Error::Conversion(format!(
                "record for [{}] has no `{}` value",
                config.label, pk.stored_name
            ))
        })
}

/// Keys held by a relationship field in an entity's serde form
pub fn reference_keys(json: &Json, field: &FieldConfig) -> Result<Vec<Key>> {
    let value = json.get(&field.field_name).unwrap_or(&Json::Null);
    let items: Vec<&Json> = match value {
        Json::Null => Vec::new(),
        Json::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    items
        .into_iter()
        .filter(|v| !v.is_null())
        .map(|v| {
            Key::from_json(v).ok_or_else(|| {
                Error::Conversion(format!(
                    "field `{}` holds {} which is not an entity key",
                    field.field_name, v
                ))
            })
        })
        .collect()
}

/// Normalize a timestamp to UTC RFC 3339 at second precision
pub fn canonical_time(s: &str) -> std::result::Result<String, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true))
        .map_err(|e| format!("invalid timestamp '{}': {}", s, e))
}

fn conversion(config: &EntityConfig, field: &FieldConfig, message: &str) -> Error {
    Error::Conversion(format!(
        "[{}].{}: {}",
        config.label, field.field_name, message
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::{Course, Enrollment};
    use crate::entity::{derive_config, derive_edge_config, BaseNode, EntityKind};
    use crate::field::{FieldDescriptor, FieldType, Primitive};
    use chrono::TimeZone;

    #[test]
    fn test_encode_skips_relationships_and_flattens_properties() {
        let config = derive_config::<Course>().unwrap();
        let mut course = Course::default();
        course.base.uuid = Some("c1".into());
        course.title = "Algebra".into();
        course.meta.insert("room".into(), serde_json::json!("B12"));

        let props = encode_properties(&config, &serde_json::to_value(&course).unwrap()).unwrap();
        assert_eq!(props.get("title"), Some(&Value::from("Algebra")));
        assert_eq!(props.get("meta.room"), Some(&Value::from("B12")));
        assert!(!props.contains_key("uuid"));
        assert!(!props.contains_key("teacher"));
        assert!(!props.contains_key("enrollments"));
    }

    #[test]
    fn test_time_is_second_precision_utc() {
        let config = derive_edge_config::<Enrollment>().unwrap();
        let edge = Enrollment {
            enrolled: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 15).unwrap()
                + chrono::Duration::milliseconds(250),
            ..Default::default()
        };
        let props = encode_properties(&config, &serde_json::to_value(&edge).unwrap()).unwrap();
        assert_eq!(props.get("enrolled"), Some(&Value::from("2024-03-01T09:30:15Z")));
    }

    #[test]
    fn test_alias_is_coerced() {
        let config = EntityConfig::derive(
            "Sensor",
            EntityKind::Node,
            vec![
                FieldDescriptor::embed(BaseNode::fields),
                FieldDescriptor::new("level", FieldType::alias("Level", Primitive::U8), ""),
            ],
        )
        .unwrap();
        let props = encode_properties(&config, &serde_json::json!({"level": 7})).unwrap();
        assert_eq!(props.get("level"), Some(&Value::Int(7)));

        let err = encode_properties(&config, &serde_json::json!({"level": "high"})).unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));
    }

    #[test]
    fn test_decode_properties() {
        let config = derive_config::<Course>().unwrap();
        let mut props = PropertyMap::new();
        props.insert("uuid".into(), Value::from("c1"));
        props.insert("title".into(), Value::from("Algebra"));
        props.insert("meta.room".into(), Value::from("B12"));

        let key = stored_key(&config, &props).unwrap();
        let json = decode_properties(&config, &props, &key);
        assert_eq!(json["uuid"], serde_json::json!("c1"));
        assert_eq!(json["title"], serde_json::json!("Algebra"));
        assert_eq!(json["meta"], serde_json::json!({"room": "B12"}));
    }

    #[test]
    fn test_dropped_map_keys_are_nulled() {
        let config = derive_config::<Course>().unwrap();
        let mut before = LoadSnapshot::new();
        record_property_keys(
            &config,
            serde_json::json!({"meta": {"room": "B12", "floor": 2}}).as_object().unwrap(),
            &mut before,
        );

        let now = serde_json::json!({"title": "Algebra", "meta": {"room": "B14"}});
        let mut props = encode_properties(&config, &now).unwrap();
        remove_dropped_keys(&config, now.as_object().unwrap(), &before, &mut props);
        assert_eq!(props.get("meta.room"), Some(&Value::from("B14")));
        assert_eq!(props.get("meta.floor"), Some(&Value::Null));

        // nothing recorded yet, nothing to remove
        let mut props = encode_properties(&config, &now).unwrap();
        remove_dropped_keys(&config, now.as_object().unwrap(), &LoadSnapshot::new(), &mut props);
        assert!(!props.contains_key("meta.floor"));
    }

    #[test]
    fn test_missing_stored_key() {
        let config = derive_config::<Course>().unwrap();
        assert!(stored_key(&config, &PropertyMap::new()).is_err());
    }
}
