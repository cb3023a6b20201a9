//! NF Metadata Dictionary
//!
//! Build tooling for the NF-OSI metadata dictionary: LinkML modules become
//! Synapse-ready JSON Schemas, and the Synapse side (registration, file
//! views, curation tasks, tools-table sync) is driven from the same config.
//!
//! ## Features
//!
//! - **Per-class builds**: each template is projected to a minimal LinkML
//!   document, fed to `gen-json-schema`, then dereferenced and normalized
//! - **Stable output**: canonical key order, `$id` stamping and checksums in
//!   `manifest.json`
//! - **Synapse limits**: enum sizes, value lengths and row sizes checked
//!   before registration
//! - **Synapse REST**: schema registration, entity views, schema binding
//!   and curation tasks over one `SynapseApi` seam
//!
//! ## Layout
//!
//! ```text
//! modules/                  LinkML source modules
//! ├── Sample/
//! │   ├── CellLineModel.yaml
//! │   └── generated/        filtered enum subsets
//! └── Experiment/
//! dist/NF.yaml              merged schema
//! build/projections/        per-class LinkML projections
//! registered-json-schemas/
//! ├── BiospecimenTemplate.json
//! ├── manifest.json
//! └── checksums.sha256
//! ```

pub mod checksum;
pub mod config;
pub mod error;
pub mod generator;
pub mod limits;
pub mod linkml;
pub mod manifest;
pub mod pipeline;
pub mod postprocess;
pub mod synapse;
pub mod sync;
pub mod synonyms;
pub mod templates;
pub mod uri;

pub use checksum::Checksum;
pub use config::DictionaryConfig;
pub use error::{DictionaryError, Result};
pub use generator::{GenJsonSchemaCli, SchemaGenerator};
pub use linkml::{ClassHierarchy, SchemaDocument};
pub use manifest::BuildManifest;
pub use pipeline::{BuildOptions, BuildReport, SchemaBuilder};
pub use postprocess::PostProcessor;
pub use synapse::{HttpSynapseClient, JobPolling, SynapseApi};
pub use uri::SchemaUri;
