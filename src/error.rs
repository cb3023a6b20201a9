//! Error types for the dictionary pipeline

use thiserror::Error;

/// Result type for dictionary operations
pub type Result<T> = std::result::Result<T, DictionaryError>;

/// Dictionary pipeline errors
#[derive(Error, Debug)]
pub enum DictionaryError {
    #[error("Class not found: {0}")]
    UnknownClass(String),

    #[error("Enum not found: {0}")]
    UnknownEnum(String),

    #[error("Cycle in is_a hierarchy at class {0}")]
    CyclicHierarchy(String),

    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    #[error("Cyclic reference: {0}")]
    CyclicReference(String),

    #[error("Generator failed for {class}: {message}")]
    Generator { class: String, message: String },

    #[error("Invalid JSON Schema for {class}: {message}")]
    InvalidSchema { class: String, message: String },

    #[error("Duplicate schema $id {id} (classes {first} and {second})")]
    DuplicateSchemaId {
        id: String,
        first: String,
        second: String,
    },

    #[error("Invalid schema URI: {0}")]
    InvalidSchemaUri(String),

    #[error("Invalid schema format: {0}")]
    InvalidFormat(String),

    #[error("Missing Synapse auth token: set {0}")]
    MissingAuthToken(String),

    #[error("Synapse request {path} failed with status {status}: {message}")]
    Synapse {
        path: String,
        status: u16,
        message: String,
    },

    #[error("Asynchronous job {token} failed: {message}")]
    JobFailed { token: String, message: String },

    #[error("Asynchronous job {token} still processing after {seconds}s")]
    JobTimeout { token: String, seconds: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),
}
