//! JSON Schema post-processing
//!
//! Turns raw `gen-json-schema` output into the self-contained documents the
//! curation UI and the Synapse registry consume:
//!
//! ```text
//! raw ──► metadata ($id, title)
//!     ──► dereference (#/$defs, #/definitions)
//!     ──► drop $defs
//!     ──► merge enum-only anyOf
//!     ──► collapse ["T", "null"]
//!     ──► remove top-level keys
//!     ──► reorder keys
//! ```
//!
//! Every step is a plain function over `serde_json::Value`; [`PostProcessor`]
//! runs them in order.

pub mod normalize;
pub mod order;
pub mod refs;

pub use normalize::{collapse_nullable, drop_definitions, flatten_enum_branches, remove_keys};
pub use order::{reorder, reorder_property};
pub use refs::{dereference, dereference_with, RefSiblings};

use semver::Version;
use serde_json::Value;

use crate::config::PostprocessConfig;
use crate::error::{DictionaryError, Result};
use crate::uri::SchemaUri;

/// Set `$id` and `title` on the schema root
pub fn inject_metadata(schema: &mut Value, id: &str, title: &str) -> Result<()> {
    let Value::Object(map) = schema else {
        return Err(DictionaryError::InvalidFormat(format!(
            "schema for {} is not a JSON object",
            title
        )));
    };
    map.insert("$id".to_string(), Value::String(id.to_string()));
    map.insert("title".to_string(), Value::String(title.to_string()));
    Ok(())
}

/// Configured post-processing pipeline
#[derive(Debug, Clone)]
pub struct PostProcessor {
    registry_base: String,
    organization: String,
    release_version: Option<Version>,
    remove_keys: Vec<String>,
    top_level_order: Vec<String>,
    property_order: Vec<String>,
    ref_siblings: RefSiblings,
}

impl PostProcessor {
    pub fn from_config(config: &PostprocessConfig) -> Result<Self> {
        let release_version = config
            .release_version
            .as_deref()
            .map(Version::parse)
            .transpose()?;

        Ok(Self {
            registry_base: config.registry_base.clone(),
            organization: config.organization.clone(),
            release_version,
            remove_keys: config.remove_keys.clone(),
            top_level_order: config.top_level_order.clone(),
            property_order: config.property_order.clone(),
            ref_siblings: config.ref_siblings,
        })
    }

    /// Registered name for a class; depends only on configuration and the
    /// class name
    pub fn schema_uri(&self, class: &str) -> SchemaUri {
        SchemaUri::for_class(&self.organization, class, self.release_version.clone())
    }

    pub fn schema_id(&self, class: &str) -> String {
        self.schema_uri(class).to_id(&self.registry_base)
    }

    /// Run every step on a raw generator document
    pub fn process(&self, raw: Value, class: &str) -> Result<Value> {
        let mut schema = raw;
        inject_metadata(&mut schema, &self.schema_id(class), class)?;

        let mut schema = dereference_with(&schema, self.ref_siblings)?;
        drop_definitions(&mut schema);
        flatten_enum_branches(&mut schema);
        collapse_nullable(&mut schema);
        remove_keys(&mut schema, &self.remove_keys);

        Ok(reorder(&schema, &self.top_level_order, &self.property_order))
    }
}

impl Default for PostProcessor {
    fn default() -> Self {
        let config = PostprocessConfig::default();
        Self {
            registry_base: config.registry_base,
            organization: config.organization,
            release_version: None,
            remove_keys: config.remove_keys,
            top_level_order: config.top_level_order,
            property_order: config.property_order,
            ref_siblings: config.ref_siblings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_id_is_stable_and_lowercase() {
        let processor = PostProcessor::default();
        assert_eq!(
            processor.schema_id("BiospecimenTemplate"),
            "https://repo-prod.prod.sagebase.org/repo/v1/schema/type/registered/org.synapse.nf-biospecimentemplate"
        );
        assert_eq!(
            processor.schema_id("BiospecimenTemplate"),
            processor.schema_id("BiospecimenTemplate")
        );
    }

    #[test]
    fn test_release_version_suffix() {
        let config = PostprocessConfig {
            release_version: Some("10.1.0".to_string()),
            ..PostprocessConfig::default()
        };
        let processor = PostProcessor::from_config(&config).unwrap();
        assert!(processor.schema_id("ImagingAssayTemplate").ends_with("org.synapse.nf-imagingassaytemplate-10.1.0"));
    }

    #[test]
    fn test_bad_release_version_rejected() {
        let config = PostprocessConfig {
            release_version: Some("v10".to_string()),
            ..PostprocessConfig::default()
        };
        assert!(matches!(
            PostProcessor::from_config(&config),
            Err(DictionaryError::Semver(_))
        ));
    }

    #[test]
    fn test_process_non_object_fails() {
        let processor = PostProcessor::default();
        assert!(matches!(
            processor.process(json!(["not", "a", "schema"]), "A"),
            Err(DictionaryError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_process_runs_all_steps() {
        let raw = json!({
            "$defs": {
                "SpeciesEnum": {"enum": ["Homo sapiens", "Mus musculus"], "type": "string", "title": "SpeciesEnum"}
            },
            "additionalProperties": true,
            "metamodel_version": "1.7.0",
            "properties": {
                "species": {"anyOf": [{"$ref": "#/$defs/SpeciesEnum"}, {"type": "null"}]},
                "age": {"type": ["integer", "null"], "description": "Age"}
            },
            "required": ["species"],
            "type": "object",
            "$schema": "https://json-schema.org/draft/2019-09/schema"
        });
        let out = PostProcessor::default().process(raw, "Donor").unwrap();

        let keys: Vec<_> = out.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["$schema", "$id", "title", "type", "properties", "required"]);
        assert_eq!(out["title"], json!("Donor"));
        assert_eq!(out["properties"]["species"]["enum"], json!(["Homo sapiens", "Mus musculus"]));
        assert_eq!(out["properties"]["species"]["type"], json!("string"));
        assert!(out["properties"]["species"].get("anyOf").is_none());
        assert_eq!(out["properties"]["age"]["type"], json!("integer"));
        let age_keys: Vec<_> = out["properties"]["age"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(age_keys, vec!["description", "type"]);
    }
}
