//! Configuration management for the dictionary pipeline
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (dictionary.toml)
//! - Environment variables (NF_DICTIONARY__*)
//!
//! ## Example config file (dictionary.toml):
//! ```toml
//! [paths]
//! schema = "dist/NF.yaml"
//! output_dir = "registered-json-schemas"
//!
//! [generator]
//! program = "gen-json-schema"
//! closed = false
//!
//! [postprocess]
//! organization = "org.synapse.nf"
//! release_version = "10.1.0"
//!
//! [synapse]
//! poll_interval_ms = 1000
//! max_wait_secs = 600
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::postprocess::RefSiblings;

/// Main configuration for the dictionary tools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DictionaryConfig {
    /// Input and output locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// External JSON Schema generator settings
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// JSON Schema post-processing settings
    #[serde(default)]
    pub postprocess: PostprocessConfig,

    /// Synapse REST settings
    #[serde(default)]
    pub synapse: SynapseConfig,

    /// Synapse table and enum limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Reference data sync settings
    #[serde(default)]
    pub sync: SyncConfig,
}

/// File locations, relative to the repository root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Master LinkML schema
    #[serde(default = "default_schema_path")]
    pub schema: PathBuf,

    /// LinkML module fragments
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,

    /// Generated JSON Schemas
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Per-class LinkML projections handed to the generator
    #[serde(default = "default_projections_dir")]
    pub projections_dir: PathBuf,

    /// Markdown log of the registration run
    #[serde(default = "default_registration_log")]
    pub registration_log: PathBuf,

    /// Template → data type table
    #[serde(default = "default_template_mapping")]
    pub template_mapping: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Generator executable
    #[serde(default = "default_generator_program")]
    pub program: String,

    #[serde(default = "default_true")]
    pub inline: bool,

    #[serde(default = "default_true")]
    pub no_metadata: bool,

    /// Emit closed schemas (`--closed`) instead of `--not-closed`
    #[serde(default)]
    pub closed: bool,

    /// Extra arguments passed before the schema path
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Generate from per-class projections instead of the full schema
    #[serde(default = "default_true")]
    pub project_classes: bool,

    /// Only build these classes (all when empty)
    #[serde(default)]
    pub classes: Vec<String>,

    #[serde(default)]
    pub skip_abstract: bool,

    #[serde(default = "default_true")]
    pub skip_mixins: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostprocessConfig {
    /// Base URL that `$id` values are registered under
    #[serde(default = "default_registry_base")]
    pub registry_base: String,

    /// Synapse schema organization
    #[serde(default = "default_organization")]
    pub organization: String,

    /// Appended to `$id` as `-{version}` when set
    #[serde(default)]
    pub release_version: Option<String>,

    /// Top-level keys deleted from every schema
    #[serde(default = "default_remove_keys")]
    pub remove_keys: Vec<String>,

    #[serde(default = "default_top_level_order")]
    pub top_level_order: Vec<String>,

    #[serde(default = "default_property_order")]
    pub property_order: Vec<String>,

    /// Compile each schema with the `jsonschema` crate before writing it
    #[serde(default = "default_true")]
    pub validate_output: bool,

    /// Keys next to a `$ref`: `replace` drops them, `overlay` keeps them
    #[serde(default)]
    pub ref_siblings: RefSiblings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynapseConfig {
    #[serde(default = "default_synapse_base_url")]
    pub base_url: String,

    /// Environment variable holding the personal access token
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Rows fetched per table query page
    #[serde(default = "default_query_page_size")]
    pub query_page_size: u64,

    /// `maximumSize` for view columns whose schema sets no `maxLength`
    #[serde(default)]
    pub default_max_size: Option<u64>,

    /// `maximumListLength` for list columns whose schema sets no `maxItems`
    #[serde(default)]
    pub default_max_list_length: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_enum_limit")]
    pub enum_limit: usize,

    #[serde(default = "default_enum_warning")]
    pub enum_warning: usize,

    #[serde(default = "default_string_max_size")]
    pub string_max_size: usize,

    #[serde(default = "default_list_max_size")]
    pub list_max_size: usize,

    #[serde(default = "default_list_max_length")]
    pub list_max_length: usize,

    #[serde(default = "default_name_max_size")]
    pub name_max_size: usize,

    #[serde(default = "default_system_overhead")]
    pub system_overhead: usize,

    #[serde(default = "default_row_limit")]
    pub row_limit: usize,

    #[serde(default = "default_row_warning")]
    pub row_warning: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// NF Tools materialized table
    #[serde(default = "default_tools_table")]
    pub tools_table: String,

    #[serde(default = "default_sample_dir")]
    pub sample_dir: PathBuf,

    #[serde(default = "default_experiment_dir")]
    pub experiment_dir: PathBuf,

    /// Write species/category/disorder subset enums
    #[serde(default = "default_true")]
    pub create_subsets: bool,

    /// Subsets larger than this are not written
    #[serde(default = "default_enum_limit")]
    pub subset_limit: usize,

    /// Similarity ratio at which synonyms count as duplicates
    #[serde(default = "default_synonym_threshold")]
    pub synonym_threshold: f64,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("dist/NF.yaml")
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("registered-json-schemas")
}

fn default_projections_dir() -> PathBuf {
    PathBuf::from("build/projections")
}

fn default_registration_log() -> PathBuf {
    PathBuf::from("schema-registration-log.md")
}

fn default_template_mapping() -> PathBuf {
    PathBuf::from("docs/template-mapping.md")
}

fn default_generator_program() -> String {
    "gen-json-schema".to_string()
}

fn default_registry_base() -> String {
    "https://repo-prod.prod.sagebase.org/repo/v1/schema/type/registered".to_string()
}

fn default_organization() -> String {
    "org.synapse.nf".to_string()
}

fn default_remove_keys() -> Vec<String> {
    ["additionalProperties", "metamodel_version", "version"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_top_level_order() -> Vec<String> {
    ["$schema", "$id", "title", "description", "type", "properties", "required"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_property_order() -> Vec<String> {
    ["title", "description", "type", "enum", "items", "format", "pattern"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_synapse_base_url() -> String {
    "https://repo-prod.prod.sagebase.org/repo/v1".to_string()
}

fn default_auth_token_env() -> String {
    "SYNAPSE_AUTH_TOKEN".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_wait_secs() -> u64 {
    600
}

fn default_query_page_size() -> u64 {
    1000
}

fn default_enum_limit() -> usize {
    100
}

fn default_enum_warning() -> usize {
    80
}

fn default_string_max_size() -> usize {
    80
}

fn default_list_max_size() -> usize {
    80
}

fn default_list_max_length() -> usize {
    40
}

fn default_name_max_size() -> usize {
    256
}

fn default_system_overhead() -> usize {
    3500
}

fn default_row_limit() -> usize {
    64000
}

fn default_row_warning() -> usize {
    57600
}

fn default_tools_table() -> String {
    "syn51730943".to_string()
}

fn default_sample_dir() -> PathBuf {
    PathBuf::from("modules/Sample")
}

fn default_experiment_dir() -> PathBuf {
    PathBuf::from("modules/Experiment")
}

fn default_synonym_threshold() -> f64 {
    0.9
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            schema: default_schema_path(),
            modules_dir: default_modules_dir(),
            output_dir: default_output_dir(),
            projections_dir: default_projections_dir(),
            registration_log: default_registration_log(),
            template_mapping: default_template_mapping(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            program: default_generator_program(),
            inline: true,
            no_metadata: true,
            closed: false,
            extra_args: Vec::new(),
            project_classes: true,
            classes: Vec::new(),
            skip_abstract: false,
            skip_mixins: true,
        }
    }
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            registry_base: default_registry_base(),
            organization: default_organization(),
            release_version: None,
            remove_keys: default_remove_keys(),
            top_level_order: default_top_level_order(),
            property_order: default_property_order(),
            validate_output: true,
            ref_siblings: RefSiblings::default(),
        }
    }
}

impl Default for SynapseConfig {
    fn default() -> Self {
        Self {
            base_url: default_synapse_base_url(),
            auth_token_env: default_auth_token_env(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_secs: default_max_wait_secs(),
            query_page_size: default_query_page_size(),
            default_max_size: None,
            default_max_list_length: None,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            enum_limit: default_enum_limit(),
            enum_warning: default_enum_warning(),
            string_max_size: default_string_max_size(),
            list_max_size: default_list_max_size(),
            list_max_length: default_list_max_length(),
            name_max_size: default_name_max_size(),
            system_overhead: default_system_overhead(),
            row_limit: default_row_limit(),
            row_warning: default_row_warning(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tools_table: default_tools_table(),
            sample_dir: default_sample_dir(),
            experiment_dir: default_experiment_dir(),
            create_subsets: true,
            subset_limit: default_enum_limit(),
            synonym_threshold: default_synonym_threshold(),
        }
    }
}

impl DictionaryConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = [
            "dictionary.toml",
            ".dictionary.toml",
            "config/dictionary.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("org", "nf-osi", "nf-dictionary") {
            let xdg_config = config_dir.config_dir().join("dictionary.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (NF_DICTIONARY__*)
        builder = builder.add_source(
            Environment::with_prefix("NF_DICTIONARY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Settings that cannot work together
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.limits.enum_warning > self.limits.enum_limit {
            problems.push(format!(
                "limits.enum_warning ({}) is above limits.enum_limit ({})",
                self.limits.enum_warning, self.limits.enum_limit
            ));
        }
        if self.limits.row_warning > self.limits.row_limit {
            problems.push(format!(
                "limits.row_warning ({}) is above limits.row_limit ({})",
                self.limits.row_warning, self.limits.row_limit
            ));
        }
        if let Some(version) = &self.postprocess.release_version {
            if semver::Version::parse(version).is_err() {
                problems.push(format!(
                    "postprocess.release_version '{}' is not a semantic version",
                    version
                ));
            }
        }
        if self.postprocess.organization.contains('-') {
            problems.push(format!(
                "postprocess.organization '{}' must not contain '-'",
                self.postprocess.organization
            ));
        }
        if url::Url::parse(&self.synapse.base_url).is_err() {
            problems.push(format!("synapse.base_url '{}' is not a URL", self.synapse.base_url));
        }
        if !(0.0..=1.0).contains(&self.sync.synonym_threshold) {
            problems.push(format!(
                "sync.synonym_threshold ({}) must be between 0 and 1",
                self.sync.synonym_threshold
            ));
        }
        if self.synapse.poll_interval_ms == 0 {
            problems.push("synapse.poll_interval_ms must be positive".to_string());
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DictionaryConfig::default();
        assert_eq!(config.paths.schema, PathBuf::from("dist/NF.yaml"));
        assert_eq!(config.postprocess.organization, "org.synapse.nf");
        assert_eq!(config.limits.enum_limit, 100);
        assert_eq!(config.limits.row_warning, 57600);
        assert!(!config.generator.closed);
        assert!(config.problems().is_empty());
    }

    #[test]
    fn test_serialize_config() {
        let config = DictionaryConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[paths]"));
        assert!(toml_str.contains("[postprocess]"));
        assert!(toml_str.contains("[limits]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[postprocess]\nrelease_version = \"10.1.0\"\nref_siblings = \"overlay\"\n\n[generator]\nclosed = true\n",
        )
        .unwrap();

        let config = DictionaryConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.postprocess.release_version.as_deref(), Some("10.1.0"));
        assert_eq!(config.postprocess.ref_siblings, RefSiblings::Overlay);
        assert_eq!(DictionaryConfig::default().postprocess.ref_siblings, RefSiblings::Replace);
        assert!(config.generator.closed);
        assert_eq!(config.postprocess.remove_keys.len(), 3);
        assert_eq!(config.synapse.auth_token_env, "SYNAPSE_AUTH_TOKEN");
    }

    #[test]
    fn test_problems_reported() {
        let mut config = DictionaryConfig::default();
        config.limits.enum_warning = 120;
        config.postprocess.release_version = Some("latest".to_string());
        config.sync.synonym_threshold = 1.5;
        assert_eq!(config.problems().len(), 3);
    }
}
