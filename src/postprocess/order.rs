//! Canonical key order
//!
//! Keys named in a priority list come first, in list order; the rest follow
//! alphabetically. Property names under `properties` are never reordered.

use serde_json::{Map, Value};

fn ordered(map: &Map<String, Value>, priority: &[String]) -> Vec<String> {
    let mut keys: Vec<String> = priority
        .iter()
        .filter(|k| map.contains_key(k.as_str()))
        .cloned()
        .collect();

    let mut rest: Vec<String> = map
        .keys()
        .filter(|k| !priority.contains(k))
        .cloned()
        .collect();
    rest.sort();

    keys.extend(rest);
    keys
}

/// Reorder a whole schema: top-level keys by `top_level`, every property
/// schema by `property`
pub fn reorder(schema: &Value, top_level: &[String], property: &[String]) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    let mut out = Map::with_capacity(map.len());
    for key in ordered(map, top_level) {
        let value = &map[key.as_str()];
        let value = if key == "properties" {
            reorder_properties(value, property)
        } else {
            value.clone()
        };
        out.insert(key, value);
    }
    Value::Object(out)
}

fn reorder_properties(properties: &Value, priority: &[String]) -> Value {
    match properties {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(name, schema)| (name.clone(), reorder_property(schema, priority)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Reorder one property schema, recursing into nested `properties` and `items`
pub fn reorder_property(schema: &Value, priority: &[String]) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    let mut out = Map::with_capacity(map.len());
    for key in ordered(map, priority) {
        let value = &map[key.as_str()];
        let value = match key.as_str() {
            "properties" => reorder_properties(value, priority),
            "items" => match value {
                Value::Array(items) => Value::Array(
                    items.iter().map(|i| reorder_property(i, priority)).collect(),
                ),
                single => reorder_property(single, priority),
            },
            _ => value.clone(),
        };
        out.insert(key, value);
    }
    Value::Object(out)
}
