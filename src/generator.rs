//! External JSON Schema generation
//!
//! LinkML → JSON Schema compilation is delegated to the `gen-json-schema`
//! CLI. The [`SchemaGenerator`] trait is the seam that lets the build run
//! against a fake in tests.

use std::path::Path;
use std::process::Command;

use crate::config::GeneratorConfig;
use crate::error::{DictionaryError, Result};

/// Produces raw JSON Schema text for one top class of a LinkML file
pub trait SchemaGenerator {
    fn generate(&self, schema_path: &Path, class: &str) -> Result<String>;
}

/// Runs the LinkML `gen-json-schema` executable
#[derive(Debug, Clone)]
pub struct GenJsonSchemaCli {
    program: String,
    inline: bool,
    no_metadata: bool,
    closed: bool,
    extra_args: Vec<String>,
}

impl GenJsonSchemaCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            inline: true,
            no_metadata: true,
            closed: false,
            extra_args: Vec::new(),
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            program: config.program.clone(),
            inline: config.inline,
            no_metadata: config.no_metadata,
            closed: config.closed,
            extra_args: config.extra_args.clone(),
        }
    }

    pub fn closed(mut self, closed: bool) -> Self {
        self.closed = closed;
        self
    }

    /// Arguments for one invocation, program name excluded
    pub fn args(&self, schema_path: &Path, class: &str) -> Vec<String> {
        let mut args = vec!["--top-class".to_string(), class.to_string()];
        if self.inline {
            args.push("--inline".to_string());
        }
        if self.no_metadata {
            args.push("--no-metadata".to_string());
        }
        args.push(if self.closed { "--closed" } else { "--not-closed" }.to_string());
        args.extend(self.extra_args.iter().cloned());
        args.push(schema_path.display().to_string());
        args
    }
}

impl Default for GenJsonSchemaCli {
    fn default() -> Self {
        Self::new("gen-json-schema")
    }
}

impl SchemaGenerator for GenJsonSchemaCli {
    fn generate(&self, schema_path: &Path, class: &str) -> Result<String> {
        let args = self.args(schema_path, class);
        tracing::debug!(program = %self.program, ?args, "running generator");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| DictionaryError::Generator {
                class: class.to_string(),
                message: format!("failed to run {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DictionaryError::Generator {
                class: class.to_string(),
                message: format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if stdout.trim().is_empty() {
            return Err(DictionaryError::Generator {
                class: class.to_string(),
                message: "generator produced no output".to_string(),
            });
        }
        Ok(stdout)
    }
}
