//! Schema registration with the Synapse JSON Schema service

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

use super::{start_job, wait_for_job, JobPolling, SynapseApi};
use crate::error::Result;
use crate::manifest::MANIFEST_FILE;

pub const CREATE_SCHEMA_PATH: &str = "/schema/type/create/async/start";
const CREATE_SCHEMA_REQUEST: &str = "org.sagebionetworks.repo.model.schema.CreateSchemaRequest";

/// Submit a schema for registration (or validation only with `dry_run`)
/// and wait for the job. Returns the job's response body.
pub fn register_schema(
    api: &dyn SynapseApi,
    schema: &Value,
    dry_run: bool,
    polling: JobPolling,
) -> Result<Value> {
    let body = json!({
        "concreteType": CREATE_SCHEMA_REQUEST,
        "schema": schema,
        "dryRun": dry_run,
    });
    let token = start_job(api, CREATE_SCHEMA_PATH, &body)?;
    tracing::debug!(token = %token, dry_run, "schema job started");
    wait_for_job(api, &token, polling)
}

/// Schema files chosen for a registration run
#[derive(Debug, Clone, Default)]
pub struct SchemaSelection {
    pub files: Vec<PathBuf>,
    /// Included names that do not exist in the directory
    pub missing: Vec<String>,
}

/// Pick `*.json` files from `dir`.
///
/// A non-empty `include` list selects exactly those names and overrides
/// `exclude`. The build manifest is never selected.
pub fn select_schema_files(dir: &Path, include: &[String], exclude: &[String]) -> Result<SchemaSelection> {
    let mut selection = SchemaSelection::default();

    if !include.is_empty() {
        for name in include {
            let path = dir.join(name);
            if path.is_file() && name != MANIFEST_FILE {
                selection.files.push(path);
            } else {
                tracing::warn!(name = %name, "included schema not found");
                selection.missing.push(name.clone());
            }
        }
        return Ok(selection);
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().map(|e| e == "json").unwrap_or(false))
        .filter(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            name != MANIFEST_FILE && !exclude.contains(&name)
        })
        .collect();
    files.sort();
    selection.files = files;
    Ok(selection)
}

/// Outcome of one registration attempt
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub file: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Markdown log of a registration or validation run
#[derive(Debug, Clone)]
pub struct RegistrationReport {
    pub generated_at: DateTime<Utc>,
    pub dry_run: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub outcomes: Vec<RegistrationOutcome>,
}

impl RegistrationReport {
    pub fn new(dry_run: bool, include: &[String], exclude: &[String]) -> Self {
        Self {
            generated_at: Utc::now(),
            dry_run,
            include: include.to_vec(),
            exclude: exclude.to_vec(),
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, file: impl Into<String>, result: &Result<Value>) {
        self.outcomes.push(RegistrationOutcome {
            file: file.into(),
            success: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
        });
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn to_markdown(&self) -> String {
        let (title, ok_label, ok_status, fail_label) = if self.dry_run {
            ("Schema Validation Report", "Validation passed", "✅ PASSED", "Validation failed")
        } else {
            ("Schema Registration Report", "Registration successful", "✅ REGISTERED", "Registration failed")
        };

        let mut out = format!(
            "# {}\n\nGenerated: {}\n\n## Summary\n- **Schemas processed:** {}\n- **{}:** {}\n- **{}:** {}\n",
            title,
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.outcomes.len(),
            ok_label,
            self.passed(),
            fail_label,
            self.failed(),
        );
        if !self.include.is_empty() {
            out.push_str(&format!("- **Included:** {}\n", self.include.join(", ")));
        }
        if !self.exclude.is_empty() {
            out.push_str(&format!("- **Excluded:** {}\n", self.exclude.join(", ")));
        }

        out.push_str("\n## Details\n");
        for outcome in &self.outcomes {
            if outcome.success {
                out.push_str(&format!("- `{}`: {}\n", outcome.file, ok_status));
            } else {
                out.push_str(&format!("- `{}`: ❌ FAILED", outcome.file));
                if let Some(error) = &outcome.error {
                    out.push_str(&format!(" ({})", error));
                }
                out.push('\n');
            }
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_markdown())?;
        Ok(())
    }
}
