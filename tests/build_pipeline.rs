//! End-to-end build with a stand-in generator: projection, post-processing,
//! manifest and checksum verification

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use nf_dictionary::linkml::SchemaDocument;
use nf_dictionary::{
    BuildManifest, BuildOptions, Checksum, DictionaryError, PostProcessor, SchemaBuilder, SchemaGenerator,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Serves the raw fixture for BiospecimenTemplate, a minimal schema for
/// ImagingAssayTemplate, and fails otherwise. Requires each input file to
/// define the class it is asked for.
struct FixtureGenerator {
    inputs: RefCell<Vec<PathBuf>>,
}

impl SchemaGenerator for FixtureGenerator {
    fn generate(&self, schema_path: &Path, class: &str) -> nf_dictionary::Result<String> {
        self.inputs.borrow_mut().push(schema_path.to_path_buf());
        let input = SchemaDocument::load(schema_path)?;
        if !input.classes.contains_key(class) {
            return Err(DictionaryError::UnknownClass(class.to_string()));
        }
        match class {
            "BiospecimenTemplate" => Ok(fs::read_to_string(fixtures().join("biospecimen_raw.json"))?),
            "ImagingAssayTemplate" => Ok(r#"{
                "type": "object",
                "properties": {"imagingModality": {"enum": ["MRI", "CT"], "type": ["string", "null"]}}
            }"#
            .to_string()),
            other => Err(DictionaryError::Generator {
                class: other.to_string(),
                message: "exit status 1".to_string(),
            }),
        }
    }
}

fn generator() -> FixtureGenerator {
    FixtureGenerator {
        inputs: RefCell::new(Vec::new()),
    }
}

fn options(root: &Path) -> BuildOptions {
    BuildOptions {
        output_dir: root.join("registered-json-schemas"),
        projections_dir: Some(root.join("projections")),
        classes: Vec::new(),
        skip_abstract: true,
        skip_mixins: true,
        validate_output: false,
    }
}

fn build(root: &Path) -> BuildManifest {
    let source = fixtures().join("nf_mini.yaml");
    let doc = SchemaDocument::load(&source).unwrap();
    let report = SchemaBuilder::new(generator(), PostProcessor::default(), options(root))
        .build(&doc, &source)
        .unwrap();
    assert!(report.is_success(), "{:?}", report.failures);

    let manifest = report.to_manifest(&source, Checksum::from_bytes(&fs::read(&source).unwrap()), None);
    manifest.write(root.join("registered-json-schemas")).unwrap();
    manifest
}

#[test]
fn test_build_writes_post_processed_schemas() {
    let dir = tempdir().unwrap();
    let manifest = build(dir.path());
    let out = dir.path().join("registered-json-schemas");

    let classes: Vec<_> = manifest.schemas.iter().map(|s| s.class.as_str()).collect();
    assert_eq!(classes, vec!["BiospecimenTemplate", "ImagingAssayTemplate"]);

    let written = fs::read_to_string(out.join("BiospecimenTemplate.json")).unwrap();
    let expected: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(fixtures().join("biospecimen_expected.json")).unwrap()).unwrap();
    assert_eq!(written, serde_json::to_string_pretty(&expected).unwrap());

    let imaging: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("ImagingAssayTemplate.json")).unwrap()).unwrap();
    assert_eq!(imaging["properties"]["imagingModality"]["type"], "string");
    assert_eq!(manifest.stats.total_properties, 6);
}

#[test]
fn test_generator_reads_projections() {
    let dir = tempdir().unwrap();
    let source = fixtures().join("nf_mini.yaml");
    let doc = SchemaDocument::load(&source).unwrap();
    let generator = generator();
    let builder = SchemaBuilder::new(generator, PostProcessor::default(), options(dir.path()));
    builder.build(&doc, &source).unwrap();

    let projection = SchemaDocument::load(dir.path().join("projections/ImagingAssayTemplate.yaml")).unwrap();
    let classes: Vec<_> = projection.classes.keys().map(String::as_str).collect();
    assert_eq!(classes, vec!["Template", "ImagingAssayTemplate"]);
    let enums: Vec<_> = projection.enums.keys().map(String::as_str).collect();
    assert_eq!(enums, vec!["ImagingModalityEnum"]);
    assert!(!projection.slots.contains_key("specimenID"));
}

#[test]
fn test_rebuild_is_byte_stable() {
    let dir = tempdir().unwrap();
    let first = build(dir.path());
    let second = build(dir.path());

    assert!(second.diff(&first).is_empty());
    assert_eq!(first.manifest_checksum, second.manifest_checksum);
}

#[test]
fn test_verify_reports_edited_schemas() {
    let dir = tempdir().unwrap();
    build(dir.path());
    let out = dir.path().join("registered-json-schemas");

    let manifest = BuildManifest::load(&out).unwrap().unwrap();
    assert!(manifest.verify(&out).unwrap().is_empty());

    fs::write(out.join("ImagingAssayTemplate.json"), "{}").unwrap();
    assert_eq!(manifest.verify(&out).unwrap(), vec!["ImagingAssayTemplate.json"]);
}

#[test]
fn test_release_version_changes_ids() {
    let dir = tempdir().unwrap();
    let before = build(dir.path());

    let config = nf_dictionary::config::PostprocessConfig {
        release_version: Some("10.1.0".to_string()),
        ..Default::default()
    };
    let source = fixtures().join("nf_mini.yaml");
    let doc = SchemaDocument::load(&source).unwrap();
    let report = SchemaBuilder::new(generator(), PostProcessor::from_config(&config).unwrap(), options(dir.path()))
        .build(&doc, &source)
        .unwrap();
    let after = report.to_manifest(&source, Checksum::from_text("x"), Some("10.1.0".to_string()));

    let diff = after.diff(&before);
    assert_eq!(diff.id_changed.len(), 2);
    assert!(diff.id_changed[0].2.ends_with("org.synapse.nf-biospecimentemplate-10.1.0"));
    assert_eq!(diff.changed.len(), 2);
}

#[test]
fn test_partial_build_keeps_other_schemas_in_manifest() {
    let dir = tempdir().unwrap();
    let full = build(dir.path());
    let out = dir.path().join("registered-json-schemas");

    let source = fixtures().join("nf_mini.yaml");
    let doc = SchemaDocument::load(&source).unwrap();
    let mut only_imaging = options(dir.path());
    only_imaging.classes = vec!["ImagingAssayTemplate".to_string()];
    let report = SchemaBuilder::new(generator(), PostProcessor::default(), only_imaging)
        .build(&doc, &source)
        .unwrap();
    assert_eq!(report.generated.len(), 1);

    let manifest = report
        .to_manifest(&source, Checksum::from_bytes(&fs::read(&source).unwrap()), None)
        .carry_over(&full, &out);
    manifest.write(&out).unwrap();

    let classes: Vec<_> = manifest.schemas.iter().map(|s| s.class.as_str()).collect();
    assert_eq!(classes, vec!["BiospecimenTemplate", "ImagingAssayTemplate"]);
    assert!(manifest.diff(&full).is_empty());

    fs::write(out.join("BiospecimenTemplate.json"), "{}").unwrap();
    let reloaded = BuildManifest::load(&out).unwrap().unwrap();
    assert_eq!(reloaded.verify(&out).unwrap(), vec!["BiospecimenTemplate.json"]);
}
