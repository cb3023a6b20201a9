//! Structural clean-up of dereferenced schemas

use serde_json::{Map, Value};

/// Remove `$defs` and `definitions` from the top level
pub fn drop_definitions(schema: &mut Value) {
    if let Value::Object(map) = schema {
        map.shift_remove("$defs");
        map.shift_remove("definitions");
    }
}

/// Delete the given keys from the top level only
pub fn remove_keys(schema: &mut Value, keys: &[String]) {
    if let Value::Object(map) = schema {
        for key in keys {
            map.shift_remove(key.as_str());
        }
    }
}

fn is_null_branch(branch: &Value) -> bool {
    let only_null = match branch.get("type") {
        Some(Value::String(t)) => t == "null",
        Some(Value::Array(types)) => !types.is_empty() && types.iter().all(|t| t.as_str() == Some("null")),
        _ => false,
    };
    only_null && branch.get("enum").is_none()
}

/// A branch's `type` with `"null"` stripped: the scalar itself, or the one
/// non-null entry of a type array
fn non_null_type(branch: &Value) -> Option<&str> {
    match branch.get("type")? {
        Value::String(t) if t != "null" => Some(t.as_str()),
        Value::Array(types) => {
            let mut rest = types.iter().filter_map(Value::as_str).filter(|t| *t != "null");
            match (rest.next(), rest.next()) {
                (Some(t), None) => Some(t),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Replace every `anyOf` whose non-null branches all carry an `enum` with a
/// single `enum` holding the union of their values.
///
/// Values keep first-seen order. When every branch declares the same type
/// (ignoring `"null"`, so `["string", "null"]` counts as `"string"`), that
/// type is set on the merged object.
pub fn flatten_enum_branches(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            merge_any_of(map);
            for value in map.values_mut() {
                flatten_enum_branches(value);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(flatten_enum_branches),
        _ => {}
    }
}

fn merge_any_of(map: &mut Map<String, Value>) {
    let Some(Value::Array(branches)) = map.get("anyOf") else {
        return;
    };

    let enum_branches: Vec<&Value> = branches.iter().filter(|b| !is_null_branch(b)).collect();
    if enum_branches.is_empty()
        || !enum_branches
            .iter()
            .all(|b| b.get("enum").map(Value::is_array).unwrap_or(false))
    {
        return;
    }

    let mut values: Vec<Value> = match map.get("enum") {
        Some(Value::Array(existing)) => existing.clone(),
        _ => Vec::new(),
    };
    for branch in &enum_branches {
        if let Some(Value::Array(branch_values)) = branch.get("enum") {
            for value in branch_values {
                if !values.contains(value) {
                    values.push(value.clone());
                }
            }
        }
    }

    let first_type = non_null_type(enum_branches[0]);
    let shared_type = first_type
        .filter(|t| enum_branches.iter().all(|b| non_null_type(b) == Some(*t)))
        .map(str::to_string);

    map.shift_remove("anyOf");
    if let Some(t) = shared_type {
        if !map.contains_key("type") {
            map.insert("type".to_string(), Value::String(t));
        }
    }
    map.insert("enum".to_string(), Value::Array(values));
}

/// Drop `"null"` from every `type` array, collapsing one survivor to a
/// scalar. An array holding only `"null"` becomes the scalar `"null"`.
pub fn collapse_nullable(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            if let Some(Value::Array(types)) = map.get_mut("type") {
                let original_len = types.len();
                types.retain(|t| t.as_str() != Some("null"));
                let collapsed = match types.len() {
                    0 if original_len > 0 => Some(Value::String("null".to_string())),
                    1 => Some(types[0].clone()),
                    _ => None,
                };
                if let Some(scalar) = collapsed {
                    map.insert("type".to_string(), scalar);
                }
            }
            for value in map.values_mut() {
                collapse_nullable(value);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(collapse_nullable),
        _ => {}
    }
}
