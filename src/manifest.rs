//! Build manifests for generated schemas
//!
//! Each build writes `manifest.json` and `checksums.sha256` next to the
//! generated schemas. Comparing against the previous manifest shows which
//! schemas a regeneration touched and whether any `$id` moved, which would
//! break existing Synapse bindings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::checksum::Checksum;
use crate::error::Result;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const CHECKSUMS_FILE: &str = "checksums.sha256";

/// One generated schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub class: String,
    pub schema_id: String,
    /// File name relative to the output directory
    pub file: String,
    pub checksum: Checksum,
    pub properties: usize,
}

/// Statistics about a build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestStats {
    pub total_schemas: usize,
    pub total_properties: usize,
    pub failed_classes: usize,
}

/// Manifest of one build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    pub generated_at: DateTime<Utc>,
    /// Master schema the build started from
    pub source: String,
    pub source_checksum: Checksum,
    #[serde(default)]
    pub release_version: Option<String>,
    pub schemas: Vec<ManifestEntry>,
    /// Checksum over all schema checksums
    pub manifest_checksum: Checksum,
    pub stats: ManifestStats,
}

/// Differences between two manifests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
    /// (class, previous `$id`, new `$id`)
    pub id_changed: Vec<(String, String, String)>,
}

impl ManifestDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && self.id_changed.is_empty()
    }
}

impl BuildManifest {
    pub fn new(
        source: impl Into<String>,
        source_checksum: Checksum,
        release_version: Option<String>,
        schemas: Vec<ManifestEntry>,
        failed_classes: usize,
    ) -> Self {
        let stats = ManifestStats {
            total_schemas: schemas.len(),
            total_properties: schemas.iter().map(|s| s.properties).sum(),
            failed_classes,
        };

        // Compute manifest checksum from all schema checksums
        let checksums: Vec<&str> = schemas.iter().map(|s| s.checksum.as_str()).collect();
        let manifest_checksum = Checksum::from_text(&checksums.join(","));

        Self {
            generated_at: Utc::now(),
            source: source.into(),
            source_checksum,
            release_version,
            schemas,
            manifest_checksum,
            stats,
        }
    }

    /// Fold the schemas of `previous` that this build did not regenerate
    /// into this manifest. Used after a build restricted to some classes,
    /// so untouched schemas stay listed. Entries keep `previous` order,
    /// rebuilt ones replace theirs in place and new ones go last. A carried
    /// entry whose file is gone from `dir` is dropped.
    pub fn carry_over(self, previous: &BuildManifest, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut rebuilt: HashMap<String, ManifestEntry> =
            self.schemas.iter().map(|s| (s.class.clone(), s.clone())).collect();

        let mut schemas = Vec::with_capacity(previous.schemas.len().max(self.schemas.len()));
        for old in &previous.schemas {
            match rebuilt.remove(&old.class) {
                Some(entry) => schemas.push(entry),
                None if dir.join(&old.file).exists() => schemas.push(old.clone()),
                None => tracing::debug!(class = %old.class, "dropping entry with no file"),
            }
        }
        schemas.extend(
            self.schemas
                .iter()
                .filter(|s| rebuilt.contains_key(&s.class))
                .cloned(),
        );

        let mut merged = Self::new(
            self.source,
            self.source_checksum,
            self.release_version,
            schemas,
            self.stats.failed_classes,
        );
        merged.generated_at = self.generated_at;
        merged
    }

    pub fn get_schema(&self, class: &str) -> Option<&ManifestEntry> {
        self.schemas.iter().find(|s| s.class == class)
    }

    /// Write `manifest.json` and `checksums.sha256` into `dir`
    pub fn write(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let manifest_content = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(MANIFEST_FILE), &manifest_content)?;

        let checksums_content: String = self
            .schemas
            .iter()
            .map(|s| format!("{}  {}", s.checksum, s.file))
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(dir.join(CHECKSUMS_FILE), &checksums_content)?;

        Ok(())
    }

    /// Load the manifest from `dir`, if one was written
    pub fn load(dir: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = dir.as_ref().join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Files in `dir` whose content no longer matches the recorded checksum
    pub fn verify(&self, dir: impl AsRef<Path>) -> Result<Vec<String>> {
        let dir = dir.as_ref();
        let mut mismatched = Vec::new();
        for entry in &self.schemas {
            let path = dir.join(&entry.file);
            let matches = match fs::read_to_string(&path) {
                Ok(content) => entry.checksum.verify(&content),
                Err(_) => false,
            };
            if !matches {
                mismatched.push(entry.file.clone());
            }
        }
        Ok(mismatched)
    }

    /// What changed going from `previous` to `self`
    pub fn diff(&self, previous: &BuildManifest) -> ManifestDiff {
        let before: HashMap<&str, &ManifestEntry> =
            previous.schemas.iter().map(|s| (s.class.as_str(), s)).collect();
        let after: HashMap<&str, &ManifestEntry> =
            self.schemas.iter().map(|s| (s.class.as_str(), s)).collect();

        let mut diff = ManifestDiff::default();
        for entry in &self.schemas {
            match before.get(entry.class.as_str()) {
                None => diff.added.push(entry.class.clone()),
                Some(old) => {
                    if old.checksum != entry.checksum {
                        diff.changed.push(entry.class.clone());
                    }
                    if old.schema_id != entry.schema_id {
                        diff.id_changed.push((
                            entry.class.clone(),
                            old.schema_id.clone(),
                            entry.schema_id.clone(),
                        ));
                    }
                }
            }
        }
        for entry in &previous.schemas {
            if !after.contains_key(entry.class.as_str()) {
                diff.removed.push(entry.class.clone());
            }
        }
        diff
    }
}
