//! Golden output of the post-processing pipeline
//!
//! `fixtures/biospecimen_raw.json` is shaped like `gen-json-schema` output;
//! the expected file is compared as text so key order counts.

use nf_dictionary::config::PostprocessConfig;
use nf_dictionary::postprocess::{dereference, dereference_with, RefSiblings};
use nf_dictionary::PostProcessor;
use pretty_assertions::assert_eq;
use serde_json::Value;

fn fixture(name: &str) -> Value {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap()
}

fn contains_key(value: &Value, key: &str) -> bool {
    match value {
        Value::Object(map) => map.contains_key(key) || map.values().any(|v| contains_key(v, key)),
        Value::Array(items) => items.iter().any(|v| contains_key(v, key)),
        _ => false,
    }
}

#[test]
fn test_biospecimen_matches_golden_output() {
    let processed = PostProcessor::default()
        .process(fixture("biospecimen_raw.json"), "BiospecimenTemplate")
        .unwrap();
    assert_eq!(pretty(&processed), pretty(&fixture("biospecimen_expected.json")));
}

#[test]
fn test_output_is_self_contained() {
    let processed = PostProcessor::default()
        .process(fixture("biospecimen_raw.json"), "BiospecimenTemplate")
        .unwrap();
    for key in ["$ref", "$defs", "definitions", "anyOf", "additionalProperties"] {
        assert!(!contains_key(&processed, key), "{} left in output", key);
    }
}

#[test]
fn test_processing_is_idempotent() {
    let processor = PostProcessor::default();
    let once = processor
        .process(fixture("biospecimen_raw.json"), "BiospecimenTemplate")
        .unwrap();
    let twice = processor.process(once.clone(), "BiospecimenTemplate").unwrap();
    assert_eq!(pretty(&once), pretty(&twice));
}

#[test]
fn test_dereference_alone_keeps_everything_else() {
    let raw = fixture("biospecimen_raw.json");
    let resolved = dereference(&raw).unwrap();

    assert!(!contains_key(&resolved["properties"], "$ref"));
    assert_eq!(resolved["$defs"], raw["$defs"]);
    assert_eq!(resolved["title"], "NF");
    assert_eq!(resolved["additionalProperties"], true);
    // keys next to a $ref give way to the target
    assert_eq!(
        resolved["properties"]["specimenPreparationMethod"]["description"],
        "Method of specimen preparation"
    );
}

#[test]
fn test_overlay_keeps_ref_siblings() {
    let raw = fixture("biospecimen_raw.json");
    let resolved = dereference_with(&raw, RefSiblings::Overlay).unwrap();
    assert_eq!(
        resolved["properties"]["specimenPreparationMethod"]["description"],
        "How the specimen was prepared"
    );

    let config = PostprocessConfig {
        ref_siblings: RefSiblings::Overlay,
        ..Default::default()
    };
    let out = PostProcessor::from_config(&config)
        .unwrap()
        .process(raw, "BiospecimenTemplate")
        .unwrap();
    assert_eq!(
        out["properties"]["specimenPreparationMethod"]["description"],
        "How the specimen was prepared"
    );
}
