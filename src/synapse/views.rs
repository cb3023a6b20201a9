//! Entity views and schema bindings
//!
//! Columns of a file view are derived from the properties of a generated
//! JSON Schema, so the view shows exactly the annotations the schema allows.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::SynapseApi;
use crate::config::SynapseConfig;
use crate::error::{DictionaryError, Result};
use crate::uri::SchemaUri;

const LIST_WRAPPER: &str = "org.sagebionetworks.repo.model.ListWrapper";
const ENTITY_VIEW: &str = "org.sagebionetworks.repo.model.table.EntityView";
/// File entities only
const VIEW_TYPE_MASK_FILE: u64 = 0x1;

/// Synapse column model (`org.sagebionetworks.repo.model.table.ColumnModel`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnModel {
    pub name: String,
    pub column_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_list_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ColumnModel {
    pub fn new(name: impl Into<String>, column_type: &str) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.to_string(),
            maximum_size: None,
            maximum_list_length: None,
            id: None,
        }
    }

    pub fn is_list(&self) -> bool {
        self.column_type.ends_with("_LIST")
    }
}

/// Limits applied when a property sets none
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnDefaults {
    pub max_size: Option<u64>,
    pub max_list_length: Option<u64>,
}

impl ColumnDefaults {
    pub fn from_config(config: &SynapseConfig) -> Self {
        Self {
            max_size: config.default_max_size,
            max_list_length: config.default_max_list_length,
        }
    }
}

fn scalar_column_type(json_type: &str) -> &'static str {
    match json_type {
        "string" => "STRING",
        "number" => "DOUBLE",
        "integer" => "INTEGER",
        "boolean" => "BOOLEAN",
        _ => "STRING",
    }
}

fn list_column_type(property: &Map<String, Value>) -> &'static str {
    match property.get("items") {
        Some(Value::Object(items)) => {
            if items.contains_key("enum") {
                return "STRING_LIST";
            }
            match first_type(items) {
                Some("integer") => "INTEGER_LIST",
                Some("boolean") => "BOOLEAN_LIST",
                _ => "STRING_LIST",
            }
        }
        _ => "STRING_LIST",
    }
}

/// The property's type; for a type array the first non-null entry
fn first_type(property: &Map<String, Value>) -> Option<&str> {
    match property.get("type")? {
        Value::String(t) => Some(t.as_str()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    }
}

fn typed_column(property: &Map<String, Value>) -> Option<&'static str> {
    first_type(property).map(|t| {
        if t == "array" {
            list_column_type(property)
        } else {
            scalar_column_type(t)
        }
    })
}

/// Branches of `oneOf` or `anyOf`, objects only
fn branches(property: &Map<String, Value>) -> Vec<&Map<String, Value>> {
    ["oneOf", "anyOf"]
        .iter()
        .filter_map(|k| property.get(*k).and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_object)
        .collect()
}

/// Synapse column type for one property schema. Enums are always strings;
/// anything undeterminable falls back to STRING.
pub fn column_type(property: &Map<String, Value>) -> &'static str {
    if property.contains_key("enum") {
        return "STRING";
    }
    if property.contains_key("type") {
        return typed_column(property).unwrap_or("STRING");
    }

    let alternatives = branches(property);
    if alternatives.iter().any(|b| b.contains_key("enum")) {
        return "STRING";
    }
    let typed: Vec<&&Map<String, Value>> = alternatives
        .iter()
        .filter(|b| first_type(b).map(|t| t != "null").unwrap_or(false))
        .collect();
    if typed.len() == 1 {
        return typed_column(typed[0]).unwrap_or("STRING");
    }
    "STRING"
}

fn limit(property: &Map<String, Value>, key: &str) -> Option<u64> {
    property.get(key).and_then(Value::as_u64).or_else(|| {
        branches(property)
            .into_iter()
            .find_map(|b| b.get(key).and_then(Value::as_u64))
    })
}

/// Map every property of `schema` to a column
pub fn columns_from_schema(schema: &Value, defaults: ColumnDefaults) -> Result<Vec<ColumnModel>> {
    let properties = match schema.get("properties") {
        None => {
            return Err(DictionaryError::InvalidFormat(
                "the JSON Schema is missing a 'properties' field".to_string(),
            ))
        }
        Some(Value::Object(properties)) => properties,
        Some(_) => {
            return Err(DictionaryError::InvalidFormat(
                "the 'properties' field in the JSON Schema must be an object".to_string(),
            ))
        }
    };

    let mut columns = Vec::with_capacity(properties.len());
    for (name, property) in properties {
        let empty = Map::new();
        let property = property.as_object().unwrap_or(&empty);
        let mut column = ColumnModel::new(name.clone(), column_type(property));
        column.maximum_size = limit(property, "maxLength").or(defaults.max_size);
        if column.is_list() {
            column.maximum_list_length = limit(property, "maxItems").or(defaults.max_list_length);
        }
        columns.push(column);
    }
    Ok(columns)
}

/// The `id` and `name` columns every view starts with
pub fn leading_columns() -> Vec<ColumnModel> {
    let mut name = ColumnModel::new("name", "STRING");
    name.maximum_size = Some(256);
    vec![ColumnModel::new("id", "ENTITYID"), name]
}

/// Create the column models, then a file view over `scope_ids` holding
/// them after the leading `id`/`name` columns. Returns the view's entity id.
pub fn create_entity_view(
    api: &dyn SynapseApi,
    name: &str,
    parent_id: &str,
    scope_ids: &[String],
    columns: &[ColumnModel],
) -> Result<String> {
    let mut all = leading_columns();
    all.extend(columns.iter().cloned());

    let created = api.post_json(
        "/column/batch",
        &json!({"concreteType": LIST_WRAPPER, "list": all}),
    )?;
    let column_ids: Vec<String> = created
        .get("list")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|c| c.get("id").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    if column_ids.len() != all.len() {
        return Err(DictionaryError::Synapse {
            path: "/column/batch".to_string(),
            status: 200,
            message: format!("expected {} column ids, got {}", all.len(), column_ids.len()),
        });
    }

    let view = api.post_json(
        "/entity",
        &json!({
            "name": name,
            "parentId": parent_id,
            "concreteType": ENTITY_VIEW,
            "scopeIds": scope_ids,
            "viewTypeMask": VIEW_TYPE_MASK_FILE,
            "columnIds": column_ids,
        }),
    )?;

    let id = view
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DictionaryError::Synapse {
            path: "/entity".to_string(),
            status: 200,
            message: "created view has no id".to_string(),
        })?;
    tracing::info!(view = %id, columns = all.len(), "created entity view");
    Ok(id)
}

/// Bind a registered schema to an entity (folder, project or view scope)
pub fn bind_schema(api: &dyn SynapseApi, entity_id: &str, schema_id: &str) -> Result<Value> {
    let uri = SchemaUri::parse(schema_id)?;
    api.put_json(
        &format!("/entity/{}/schema/binding", entity_id),
        &json!({"entityId": entity_id, "schema$id": uri.to_string()}),
    )
}

/// Latest (or pinned) registered schema body for a URI
pub fn fetch_registered_schema(api: &dyn SynapseApi, uri: &SchemaUri) -> Result<Value> {
    api.get_json(&uri.registered_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synapse::fake::FakeSynapse;

    fn column(schema: Value) -> &'static str {
        column_type(schema.as_object().unwrap())
    }

    #[test]
    fn test_column_types() {
        assert_eq!(column(json!({"enum": ["a"], "type": "integer"})), "STRING");
        assert_eq!(column(json!({"type": "number"})), "DOUBLE");
        assert_eq!(column(json!({"type": "integer"})), "INTEGER");
        assert_eq!(column(json!({"type": "boolean"})), "BOOLEAN");
        assert_eq!(column(json!({"type": "object"})), "STRING");
        assert_eq!(column(json!({"type": ["integer", "null"]})), "INTEGER");
        assert_eq!(column(json!({})), "STRING");
    }

    #[test]
    fn test_list_column_types() {
        assert_eq!(column(json!({"type": "array"})), "STRING_LIST");
        assert_eq!(column(json!({"type": "array", "items": {"type": "integer"}})), "INTEGER_LIST");
        assert_eq!(column(json!({"type": "array", "items": {"type": "boolean"}})), "BOOLEAN_LIST");
        assert_eq!(column(json!({"type": "array", "items": {"type": "number"}})), "STRING_LIST");
        assert_eq!(
            column(json!({"type": "array", "items": {"enum": [1, 2], "type": "integer"}})),
            "STRING_LIST"
        );
    }

    #[test]
    fn test_one_of_branches() {
        assert_eq!(
            column(json!({"oneOf": [{"type": "integer"}, {"type": "null"}]})),
            "INTEGER"
        );
        assert_eq!(
            column(json!({"oneOf": [{"type": "integer"}, {"type": "boolean"}]})),
            "STRING"
        );
        assert_eq!(
            column(json!({"anyOf": [{"enum": ["x"]}, {"type": "integer"}]})),
            "STRING"
        );
        assert_eq!(
            column(json!({"oneOf": [{"type": "array", "items": {"type": "integer"}}, {"type": "null"}]})),
            "INTEGER_LIST"
        );
    }

    #[test]
    fn test_columns_and_limits() {
        let schema = json!({
            "properties": {
                "specimenID": {"type": "string", "maxLength": 50},
                "assay": {"type": "array", "items": {"enum": ["RNA-seq"]}, "maxItems": 5},
                "age": {"oneOf": [{"type": "number"}, {"type": "null"}]},
                "comments": {"oneOf": [{"type": "string", "maxLength": 500}, {"type": "null"}]},
                "tags": {"type": "array", "items": {"type": "string"}}
            }
        });
        let defaults = ColumnDefaults {
            max_size: Some(100),
            max_list_length: Some(40),
        };
        let columns = columns_from_schema(&schema, defaults).unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["specimenID", "assay", "age", "comments", "tags"]);

        assert_eq!(columns[0].maximum_size, Some(50));
        assert_eq!(columns[1].column_type, "STRING_LIST");
        assert_eq!(columns[1].maximum_list_length, Some(5));
        assert_eq!(columns[2].column_type, "DOUBLE");
        assert_eq!(columns[3].maximum_size, Some(500));
        assert_eq!(columns[4].maximum_size, Some(100));
        assert_eq!(columns[4].maximum_list_length, Some(40));
        assert_eq!(columns[0].maximum_list_length, None);
    }

    #[test]
    fn test_missing_properties_rejected() {
        assert!(columns_from_schema(&json!({"title": "A"}), ColumnDefaults::default()).is_err());
        assert!(columns_from_schema(&json!({"properties": []}), ColumnDefaults::default()).is_err());
    }

    #[test]
    fn test_create_entity_view() {
        let api = FakeSynapse::new();
        api.respond(
            "POST",
            "/column/batch",
            json!({"list": [{"id": "1"}, {"id": "2"}, {"id": "3"}]}),
        )
        .respond("POST", "/entity", json!({"id": "syn999"}));

        let columns = vec![ColumnModel::new("specimenID", "STRING")];
        let id = create_entity_view(&api, "Biospecimen-syn1_FileView", "syn100", &["syn1".to_string()], &columns)
            .unwrap();
        assert_eq!(id, "syn999");

        let batch = &api.requests_to("/column/batch")[0];
        let sent = batch.body.as_ref().unwrap()["list"].as_array().unwrap().clone();
        assert_eq!(sent[0]["name"], "id");
        assert_eq!(sent[0]["columnType"], "ENTITYID");
        assert_eq!(sent[1]["maximumSize"], 256);
        assert_eq!(sent[2]["name"], "specimenID");

        let view = &api.requests_to("/entity")[0];
        let body = view.body.as_ref().unwrap();
        assert_eq!(body["columnIds"], json!(["1", "2", "3"]));
        assert_eq!(body["viewTypeMask"], 1);
        assert_eq!(body["scopeIds"], json!(["syn1"]));
    }

    #[test]
    fn test_bind_schema_uses_registered_name() {
        let api = FakeSynapse::new();
        api.respond("PUT", "/entity/syn1/schema/binding", json!({}));
        bind_schema(
            &api,
            "syn1",
            "https://repo-prod.prod.sagebase.org/repo/v1/schema/type/registered/org.synapse.nf-biospecimentemplate",
        )
        .unwrap();
        let body = api.requests_to("/entity/syn1/schema/binding")[0].body.clone().unwrap();
        assert_eq!(body["schema$id"], "org.synapse.nf-biospecimentemplate");
    }

    #[test]
    fn test_fetch_registered_schema_feeds_columns() {
        let api = FakeSynapse::new();
        api.respond(
            "GET",
            "/schema/type/registered/org.synapse.nf-biospecimentemplate-10.1.0",
            json!({"properties": {"specimenID": {"type": "string"}}}),
        );
        let uri = SchemaUri::parse("org.synapse.nf-biospecimentemplate-10.1.0").unwrap();
        let schema = fetch_registered_schema(&api, &uri).unwrap();
        let columns = columns_from_schema(&schema, ColumnDefaults::default()).unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].name, "specimenID");
    }
}
