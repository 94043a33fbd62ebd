use crate::models::{EntityType, ExtractedEntity};
use serde_json::{Map, Value};
use tracing::debug;

/// Maps one raw `{entity_type, data, confidence}` record onto the canonical
/// entity shape. Returns `None` for records that are not JSON objects.
///
/// The contents of `data` are passed through untouched; only the envelope is
/// normalized.
pub fn normalize_entity(raw: &Value) -> Option<ExtractedEntity> {
    let record = raw.as_object()?;

    let entity_type = record
        .get("entity_type")
        .and_then(Value::as_str)
        .map(EntityType::parse)
        .unwrap_or(EntityType::Unknown);

    let data = match record.get("data") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(fields)) => fields.clone(),
        Some(other) => {
            let mut wrapped = Map::new();
            wrapped.insert("value".to_string(), other.clone());
            wrapped
        }
    };

    let confidence = record
        .get("confidence")
        .and_then(confidence_value)
        .unwrap_or(ExtractedEntity::DEFAULT_CONFIDENCE);

    Some(ExtractedEntity::new(entity_type, data, confidence))
}

pub fn normalize_entities(raw: &[Value]) -> Vec<ExtractedEntity> {
    raw.iter()
        .filter_map(|record| {
            let normalized = normalize_entity(record);
            if normalized.is_none() {
                debug!(record = %record, "dropping non-object extraction record");
            }
            normalized
        })
        .collect()
}

fn confidence_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|confidence| confidence.is_finite())
}
