//! `$ref` inlining
//!
//! Only document-local pointers (`#/...`) are supported. The referenced
//! subtree, itself dereferenced, replaces the whole `{"$ref": ...}` object,
//! so keys sitting next to the `$ref` are dropped. [`RefSiblings::Overlay`]
//! keeps them instead, laid over the resolved target.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DictionaryError, Result};

/// What happens to keys next to a `$ref`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefSiblings {
    /// The target replaces the object; siblings are dropped
    #[default]
    Replace,
    /// Siblings replace same-named keys of the target
    Overlay,
}

/// Return a copy of `document` with every local `$ref` replaced by its target
pub fn dereference(document: &Value) -> Result<Value> {
    dereference_with(document, RefSiblings::Replace)
}

/// [`dereference`] with a choice of sibling handling
pub fn dereference_with(document: &Value, siblings: RefSiblings) -> Result<Value> {
    let mut stack = Vec::new();
    resolve(document, document, siblings, &mut stack)
}

fn resolve(node: &Value, root: &Value, mode: RefSiblings, stack: &mut Vec<String>) -> Result<Value> {
    match node {
        Value::Object(map) => match map.get("$ref") {
            Some(Value::String(reference)) => resolve_reference(reference, map, root, mode, stack),
            _ => {
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key.clone(), resolve(value, root, mode, stack)?);
                }
                Ok(Value::Object(out))
            }
        },
        Value::Array(items) => items
            .iter()
            .map(|item| resolve(item, root, mode, stack))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn resolve_reference(
    reference: &str,
    siblings: &Map<String, Value>,
    root: &Value,
    mode: RefSiblings,
    stack: &mut Vec<String>,
) -> Result<Value> {
    let pointer = reference
        .strip_prefix('#')
        .ok_or_else(|| DictionaryError::UnresolvedReference(reference.to_string()))?;

    if stack.iter().any(|r| r == reference) {
        let mut chain = stack.clone();
        chain.push(reference.to_string());
        return Err(DictionaryError::CyclicReference(chain.join(" -> ")));
    }

    let target = if pointer.is_empty() {
        root
    } else {
        root.pointer(pointer)
            .ok_or_else(|| DictionaryError::UnresolvedReference(reference.to_string()))?
    };

    stack.push(reference.to_string());
    let resolved = resolve(target, root, mode, stack);
    stack.pop();
    let resolved = resolved?;

    let overlay: Vec<(&String, &Value)> = siblings.iter().filter(|(k, _)| *k != "$ref").collect();
    if overlay.is_empty() {
        return Ok(resolved);
    }
    if mode == RefSiblings::Replace {
        tracing::debug!(reference, dropped = overlay.len(), "dropping keys next to $ref");
        return Ok(resolved);
    }

    match resolved {
        Value::Object(mut base) => {
            for (key, value) in overlay {
                base.insert(key.clone(), resolve(value, root, mode, stack)?);
            }
            Ok(Value::Object(base))
        }
        // Siblings of a non-object target have nothing to merge into
        other => {
            tracing::warn!(reference, "ignoring keys next to $ref to a non-object");
            Ok(other)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inlines_defs() {
        let doc = json!({
            "$defs": {
                "TumorTypeEnum": {"enum": ["Schwannoma", "Glioma"], "type": "string"}
            },
            "properties": {
                "tumorType": {"$ref": "#/$defs/TumorTypeEnum"}
            }
        });
        let out = dereference(&doc).unwrap();
        assert_eq!(
            out["properties"]["tumorType"],
            json!({"enum": ["Schwannoma", "Glioma"], "type": "string"})
        );
    }

    #[test]
    fn test_siblings_dropped_by_default() {
        let doc = json!({
            "$defs": {
                "SpeciesEnum": {"description": "Species of the organism", "enum": ["Homo sapiens"]}
            },
            "properties": {
                "species": {"$ref": "#/$defs/SpeciesEnum", "description": "Donor species", "title": "species"}
            }
        });
        let out = dereference(&doc).unwrap();
        assert_eq!(
            out["properties"]["species"],
            json!({"description": "Species of the organism", "enum": ["Homo sapiens"]})
        );
        assert_eq!(dereference_with(&doc, RefSiblings::Replace).unwrap(), out);
    }

    #[test]
    fn test_nested_refs_and_sibling_overlay() {
        let doc = json!({
            "definitions": {
                "Base": {"type": "string", "description": "base"},
                "Alias": {"$ref": "#/definitions/Base"}
            },
            "properties": {
                "x": {"$ref": "#/definitions/Alias", "description": "overridden"}
            }
        });
        let out = dereference_with(&doc, RefSiblings::Overlay).unwrap();
        assert_eq!(
            out["properties"]["x"],
            json!({"type": "string", "description": "overridden"})
        );
        // Base keys come first, overlays keep the base position
        let keys: Vec<_> = out["properties"]["x"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["type", "description"]);
    }

    #[test]
    fn test_missing_target_is_unresolved() {
        let doc = json!({"properties": {"x": {"$ref": "#/$defs/Nope"}}});
        assert!(matches!(
            dereference(&doc),
            Err(DictionaryError::UnresolvedReference(r)) if r == "#/$defs/Nope"
        ));
    }

    #[test]
    fn test_remote_ref_is_unresolved() {
        let doc = json!({"properties": {"x": {"$ref": "https://example.org/schema.json"}}});
        assert!(matches!(
            dereference(&doc),
            Err(DictionaryError::UnresolvedReference(_))
        ));
    }

    #[test]
    fn test_self_reference_is_cyclic() {
        let doc = json!({
            "$defs": {
                "Node": {"properties": {"child": {"$ref": "#/$defs/Node"}}}
            },
            "properties": {"root": {"$ref": "#/$defs/Node"}}
        });
        assert!(matches!(
            dereference(&doc),
            Err(DictionaryError::CyclicReference(_))
        ));
    }

    #[test]
    fn test_same_ref_twice_is_not_a_cycle() {
        let doc = json!({
            "$defs": {"E": {"enum": ["a"]}},
            "properties": {
                "x": {"$ref": "#/$defs/E"},
                "y": {"items": {"$ref": "#/$defs/E"}, "type": "array"}
            }
        });
        let out = dereference(&doc).unwrap();
        assert_eq!(out["properties"]["y"]["items"], json!({"enum": ["a"]}));
    }
}
