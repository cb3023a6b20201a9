//! Schema build orchestration
//!
//! For each selected class: project (optional) → generate → parse →
//! post-process → compile check → write `<Class>.json`. A class that fails
//! at any step is logged and recorded, and the build moves on.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::checksum::Checksum;
use crate::config::DictionaryConfig;
use crate::error::{DictionaryError, Result};
use crate::generator::SchemaGenerator;
use crate::linkml::{write_projections, SchemaDocument};
use crate::manifest::{BuildManifest, ManifestEntry};
use crate::postprocess::PostProcessor;

/// Which classes to build and where the output goes
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub output_dir: PathBuf,
    /// Generate from per-class projections written here
    pub projections_dir: Option<PathBuf>,
    /// Restrict the build to these classes (all when empty)
    pub classes: Vec<String>,
    pub skip_abstract: bool,
    pub skip_mixins: bool,
    pub validate_output: bool,
}

impl BuildOptions {
    pub fn from_config(config: &DictionaryConfig) -> Self {
        Self {
            output_dir: config.paths.output_dir.clone(),
            projections_dir: config
                .generator
                .project_classes
                .then(|| config.paths.projections_dir.clone()),
            classes: config.generator.classes.clone(),
            skip_abstract: config.generator.skip_abstract,
            skip_mixins: config.generator.skip_mixins,
            validate_output: config.postprocess.validate_output,
        }
    }
}

/// A schema written by the build
#[derive(Debug, Clone)]
pub struct GeneratedSchema {
    pub class: String,
    pub schema_id: String,
    pub path: PathBuf,
    pub checksum: Checksum,
    pub properties: usize,
}

/// A class the build could not produce
#[derive(Debug, Clone)]
pub struct BuildFailure {
    pub class: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub generated: Vec<GeneratedSchema>,
    pub failures: Vec<BuildFailure>,
    /// Abstract or mixin classes left out
    pub skipped: Vec<String>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Manifest entries for the written schemas, relative to `output_dir`
    pub fn to_manifest(
        &self,
        source: &Path,
        source_checksum: Checksum,
        release_version: Option<String>,
    ) -> BuildManifest {
        let entries = self
            .generated
            .iter()
            .map(|g| ManifestEntry {
                class: g.class.clone(),
                schema_id: g.schema_id.clone(),
                file: g
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                checksum: g.checksum.clone(),
                properties: g.properties,
            })
            .collect();
        BuildManifest::new(
            source.display().to_string(),
            source_checksum,
            release_version,
            entries,
            self.failures.len(),
        )
    }
}

/// Drives the generator and post-processor over a schema document
pub struct SchemaBuilder<G: SchemaGenerator> {
    generator: G,
    processor: PostProcessor,
    options: BuildOptions,
}

impl<G: SchemaGenerator> SchemaBuilder<G> {
    pub fn new(generator: G, processor: PostProcessor, options: BuildOptions) -> Self {
        Self {
            generator,
            processor,
            options,
        }
    }

    /// Classes the build will attempt, plus the ones it skips
    pub fn select_classes(&self, doc: &SchemaDocument) -> (Vec<String>, Vec<String>) {
        if !self.options.classes.is_empty() {
            return (self.options.classes.clone(), Vec::new());
        }

        let mut selected = Vec::new();
        let mut skipped = Vec::new();
        for (name, class) in &doc.classes {
            if (self.options.skip_abstract && class.is_abstract())
                || (self.options.skip_mixins && class.is_mixin())
            {
                skipped.push(name.clone());
            } else {
                selected.push(name.clone());
            }
        }
        (selected, skipped)
    }

    /// Build every selected class of `doc`. `schema_path` is the file the
    /// generator reads when projections are disabled.
    pub fn build(&self, doc: &SchemaDocument, schema_path: &Path) -> Result<BuildReport> {
        fs::create_dir_all(&self.options.output_dir)?;

        let (classes, skipped) = self.select_classes(doc);
        let mut report = BuildReport {
            skipped,
            ..BuildReport::default()
        };
        let mut seen_ids: HashMap<String, String> = HashMap::new();

        tracing::info!(classes = classes.len(), "building JSON schemas");

        for class in &classes {
            match self.build_class(doc, schema_path, class, &seen_ids) {
                Ok(generated) => {
                    tracing::info!(class = %class, path = %generated.path.display(), "generated schema");
                    seen_ids.insert(generated.schema_id.clone(), class.clone());
                    report.generated.push(generated);
                }
                Err(e) => {
                    tracing::warn!(class = %class, error = %e, "skipping class");
                    report.failures.push(BuildFailure {
                        class: class.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    fn build_class(
        &self,
        doc: &SchemaDocument,
        schema_path: &Path,
        class: &str,
        seen_ids: &HashMap<String, String>,
    ) -> Result<GeneratedSchema> {
        if !doc.classes.contains_key(class) {
            return Err(DictionaryError::UnknownClass(class.to_string()));
        }

        let source = match &self.options.projections_dir {
            Some(dir) => write_projections(doc, &[class.to_string()], dir)?
                .pop()
                .unwrap_or_else(|| dir.join(format!("{}.yaml", class))),
            None => schema_path.to_path_buf(),
        };

        let raw = self.generator.generate(&source, class)?;
        let raw: serde_json::Value = serde_json::from_str(&raw).map_err(|e| DictionaryError::Generator {
            class: class.to_string(),
            message: format!("output is not JSON: {}", e),
        })?;

        let schema = self.processor.process(raw, class)?;
        let schema_id = self.processor.schema_id(class);
        if let Some(first) = seen_ids.get(&schema_id) {
            return Err(DictionaryError::DuplicateSchemaId {
                id: schema_id,
                first: first.clone(),
                second: class.to_string(),
            });
        }

        if self.options.validate_output {
            check_compiles(&schema, class)?;
        }

        let content = serde_json::to_string_pretty(&schema)?;
        let path = self.options.output_dir.join(format!("{}.json", class));
        fs::write(&path, &content)?;

        let properties = schema
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|p| p.len())
            .unwrap_or(0);

        Ok(GeneratedSchema {
            class: class.to_string(),
            schema_id,
            path,
            checksum: Checksum::from_text(&content),
            properties,
        })
    }
}

/// Compile a schema with `jsonschema` to catch malformed keywords
pub fn check_compiles(schema: &serde_json::Value, class: &str) -> Result<()> {
    jsonschema::JSONSchema::compile(schema)
        .map(|_| ())
        .map_err(|e| DictionaryError::InvalidSchema {
            class: class.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::tempdir;

    /// Returns canned output per class and records the paths it was given
    struct FakeGenerator {
        outputs: HashMap<String, String>,
        calls: RefCell<Vec<PathBuf>>,
    }

    impl SchemaGenerator for FakeGenerator {
        fn generate(&self, schema_path: &Path, class: &str) -> Result<String> {
            self.calls.borrow_mut().push(schema_path.to_path_buf());
            self.outputs
                .get(class)
                .cloned()
                .ok_or_else(|| DictionaryError::Generator {
                    class: class.to_string(),
                    message: "exit status 1".to_string(),
                })
        }
    }

    const DOC: &str = r#"
classes:
  Template:
    abstract: true
  Biospecimen:
    is_a: Template
  biospecimen:
    is_a: Template
  Broken:
    is_a: Template
  Garbled:
    is_a: Template
"#;

    fn generator() -> FakeGenerator {
        let schema = r#"{"type": "object", "properties": {"specimenID": {"type": "string"}}}"#;
        let mut outputs = HashMap::new();
        outputs.insert("Biospecimen".to_string(), schema.to_string());
        outputs.insert("biospecimen".to_string(), schema.to_string());
        outputs.insert("Garbled".to_string(), "Traceback (most recent call last)".to_string());
        FakeGenerator {
            outputs,
            calls: RefCell::new(Vec::new()),
        }
    }

    fn options(out: &Path) -> BuildOptions {
        BuildOptions {
            output_dir: out.to_path_buf(),
            projections_dir: None,
            classes: Vec::new(),
            skip_abstract: true,
            skip_mixins: true,
            validate_output: true,
        }
    }

    #[test]
    fn test_build_skips_failures_and_duplicate_ids() {
        let dir = tempdir().unwrap();
        let doc = SchemaDocument::from_yaml_str(DOC).unwrap();
        let builder = SchemaBuilder::new(generator(), PostProcessor::default(), options(dir.path()));

        let report = builder.build(&doc, Path::new("dist/NF.yaml")).unwrap();

        assert_eq!(report.skipped, vec!["Template"]);
        let generated: Vec<_> = report.generated.iter().map(|g| g.class.as_str()).collect();
        assert_eq!(generated, vec!["Biospecimen"]);

        let failed: Vec<_> = report.failures.iter().map(|f| f.class.as_str()).collect();
        assert_eq!(failed, vec!["biospecimen", "Broken", "Garbled"]);
        assert!(report.failures[0].reason.contains("Duplicate schema $id"));
        assert!(!report.is_success());

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("Biospecimen.json")).unwrap()).unwrap();
        assert_eq!(written["title"], "Biospecimen");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_build_uses_projection_files() {
        let dir = tempdir().unwrap();
        let doc = SchemaDocument::from_yaml_str(DOC).unwrap();
        let mut opts = options(&dir.path().join("out"));
        opts.projections_dir = Some(dir.path().join("projections"));
        opts.classes = vec!["Biospecimen".to_string()];
        let builder = SchemaBuilder::new(generator(), PostProcessor::default(), opts);

        let report = builder.build(&doc, Path::new("dist/NF.yaml")).unwrap();
        assert!(report.is_success());

        let calls = builder.generator.calls.borrow();
        assert_eq!(calls.as_slice(), &[dir.path().join("projections").join("Biospecimen.yaml")]);
        assert!(calls[0].exists());
    }

    #[test]
    fn test_unknown_requested_class_fails() {
        let dir = tempdir().unwrap();
        let doc = SchemaDocument::from_yaml_str(DOC).unwrap();
        let mut opts = options(dir.path());
        opts.classes = vec!["Ghost".to_string()];
        let report = SchemaBuilder::new(generator(), PostProcessor::default(), opts)
            .build(&doc, Path::new("dist/NF.yaml"))
            .unwrap();
        assert!(report.generated.is_empty());
        assert!(report.failures[0].reason.contains("Class not found"));
    }

    #[test]
    fn test_manifest_from_report() {
        let dir = tempdir().unwrap();
        let doc = SchemaDocument::from_yaml_str(DOC).unwrap();
        let builder = SchemaBuilder::new(generator(), PostProcessor::default(), options(dir.path()));
        let report = builder.build(&doc, Path::new("dist/NF.yaml")).unwrap();

        let manifest = report.to_manifest(Path::new("dist/NF.yaml"), Checksum::from_text(DOC), None);
        assert_eq!(manifest.schemas.len(), 1);
        assert_eq!(manifest.schemas[0].file, "Biospecimen.json");
        assert_eq!(manifest.stats.failed_classes, 3);
        manifest.write(dir.path()).unwrap();
        assert!(manifest.verify(dir.path()).unwrap().is_empty());
    }
}
