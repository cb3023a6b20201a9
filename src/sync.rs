//! Model system sync from the NF Tools table
//!
//! Cell lines, animal models, antibodies and genetic reagents registered in
//! NF Tools become LinkML enums. Cell lines and animal models are also split
//! into filtered subsets (by species, category and disorder) small enough
//! for Synapse's per-enum value limit.

use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::linkml::{EnumDefinition, PermissibleValue, SchemaDocument};
use crate::synapse::table::{cell_str, query_table, Row};
use crate::synapse::{JobPolling, SynapseApi};

pub const DETAILS_URL: &str = "https://nf.synapse.org/Explore/Tools/DetailsPage/Details?resourceId=";
const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    CellLine,
    AnimalModel,
    Antibody,
    GeneticReagent,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::CellLine,
        ResourceKind::AnimalModel,
        ResourceKind::Antibody,
        ResourceKind::GeneticReagent,
    ];

    /// `resourceType` value in the tools table
    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::CellLine => "Cell Line",
            Self::AnimalModel => "Animal Model",
            Self::Antibody => "Antibody",
            Self::GeneticReagent => "Genetic Reagent",
        }
    }

    pub fn base_enum(&self) -> &'static str {
        match self {
            Self::CellLine => "CellLineModel",
            Self::AnimalModel => "AnimalModel",
            Self::Antibody => "AntibodyEnum",
            Self::GeneticReagent => "GeneticReagentEnum",
        }
    }

    fn disorder_column(&self) -> Option<&'static str> {
        match self {
            Self::CellLine => Some("cellLineGeneticDisorder"),
            Self::AnimalModel => Some("animalModelGeneticDisorder"),
            _ => None,
        }
    }

    pub fn query(&self, table: &str) -> String {
        let columns = match self {
            Self::CellLine => {
                "resourceName, rrid, description, resourceType, species, cellLineCategory, cellLineGeneticDisorder, resourceId"
            }
            Self::AnimalModel => {
                "resourceName, rrid, description, resourceType, species, animalModelGeneticDisorder, resourceId"
            }
            Self::Antibody | Self::GeneticReagent => "resourceName, rrid, description, resourceType, resourceId",
        };
        format!(
            "SELECT {} FROM {} WHERE resourceType = '{}'",
            columns,
            table,
            self.resource_type()
        )
    }

    /// Base enum file, relative to the sync directories
    pub fn base_path(&self, config: &SyncConfig) -> PathBuf {
        match self {
            Self::CellLine => config.sample_dir.join("CellLineModel.yaml"),
            Self::AnimalModel => config.sample_dir.join("AnimalModel.yaml"),
            Self::Antibody => config.experiment_dir.join("Antibody.yaml"),
            Self::GeneticReagent => config.experiment_dir.join("GeneticReagent.yaml"),
        }
    }
}

/// One row of the tools table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolResource {
    pub name: String,
    pub rrid: Option<String>,
    pub description: Option<String>,
    pub species: Vec<String>,
    pub category: Option<String>,
    pub disorders: Vec<String>,
    pub resource_id: Option<String>,
}

/// List cells arrive decoded; a plain string counts as one item
fn cell_list(row: &Row, column: &str) -> Vec<String> {
    match row.get(column) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

impl ToolResource {
    /// `None` for rows without a resource name
    pub fn from_row(row: &Row, kind: ResourceKind) -> Option<Self> {
        let name = cell_str(row, "resourceName")?.to_string();
        Some(Self {
            name,
            rrid: cell_str(row, "rrid").map(str::to_string),
            description: cell_str(row, "description").map(str::to_string),
            species: cell_list(row, "species"),
            category: cell_str(row, "cellLineCategory").map(str::to_string),
            disorders: kind
                .disorder_column()
                .map(|c| cell_list(row, c))
                .unwrap_or_default(),
            resource_id: cell_str(row, "resourceId").map(str::to_string),
        })
    }
}

/// Enum member for a resource: RRID as meaning, NF Tools page as source
pub fn permissible_value_for(resource: &ToolResource) -> PermissibleValue {
    PermissibleValue {
        description: resource
            .description
            .clone()
            .filter(|d| *d != resource.name),
        meaning: resource.rrid.clone(),
        source: resource
            .resource_id
            .as_ref()
            .map(|id| format!("{}{}", DETAILS_URL, id)),
        ..PermissibleValue::default()
    }
}

fn enum_from<'a>(description: Option<String>, resources: impl IntoIterator<Item = &'a ToolResource>) -> EnumDefinition {
    let mut permissible_values = IndexMap::new();
    for resource in resources {
        permissible_values.insert(resource.name.clone(), permissible_value_for(resource));
    }
    EnumDefinition {
        description,
        permissible_values,
        ..EnumDefinition::default()
    }
}

pub fn base_enum(resources: &[ToolResource]) -> EnumDefinition {
    enum_from(None, resources)
}

fn species_key(species: &str) -> String {
    species.replace([' ', '.'], "")
}

fn disorder_key(disorder: &str) -> String {
    disorder.replace([' ', '[', ']', '\''], "")
}

fn or_unknown(values: &[String]) -> Vec<String> {
    if values.is_empty() {
        vec![UNKNOWN.to_string()]
    } else {
        values.to_vec()
    }
}

/// A filtered enum with the filter values that selected it
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSubset {
    pub name: String,
    pub kind: ResourceKind,
    /// `(filter, value)` pairs, in header order
    pub filters: Vec<(&'static str, String)>,
    /// Matching rows, including repeated names
    pub count: usize,
    pub definition: EnumDefinition,
}

impl EnumSubset {
    fn header(&self) -> String {
        let kind = match self.kind {
            ResourceKind::CellLine => "cell_line",
            _ => "animal_model",
        };
        let filters: Vec<String> = self.filters.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!(
            "# Auto-generated filtered enum subset\n# Type: {}\n# Count: {} entries\n# Filters: {}\n\n",
            kind,
            self.count,
            filters.join(", ")
        )
    }
}

/// Cell line subsets keyed on (species, category, disorder)
pub fn cell_line_subsets(cell_lines: &[ToolResource], limit: usize) -> Vec<EnumSubset> {
    let mut groups: IndexMap<(String, String, String), Vec<&ToolResource>> = IndexMap::new();
    for cell in cell_lines {
        let category = cell.category.clone().unwrap_or_else(|| UNKNOWN.to_string());
        for species in or_unknown(&cell.species) {
            for disorder in or_unknown(&cell.disorders) {
                groups
                    .entry((species_key(&species), category.clone(), disorder_key(&disorder)))
                    .or_default()
                    .push(cell);
            }
        }
    }

    groups
        .into_iter()
        .filter_map(|((species, category, disorder), cells)| {
            let count = cells.len();
            if count > limit {
                tracing::info!(species = %species, category = %category, disorder = %disorder, count, "subset too large; skipped");
                return None;
            }
            let name = format!(
                "CellLine{}{}{}Enum",
                species,
                category.replace([' ', '-'], ""),
                disorder
            );
            let description = format!("Cell lines: {} + {} + {} ({} entries)", species, category, disorder, count);
            Some(EnumSubset {
                name,
                kind: ResourceKind::CellLine,
                definition: enum_from(Some(description), cells),
                filters: vec![("species", species), ("category", category), ("disorder", disorder)],
                count,
            })
        })
        .collect()
}

/// Animal model subsets keyed on (species, disorder)
pub fn animal_model_subsets(animal_models: &[ToolResource], limit: usize) -> Vec<EnumSubset> {
    let mut groups: IndexMap<(String, String), Vec<&ToolResource>> = IndexMap::new();
    for animal in animal_models {
        for species in or_unknown(&animal.species) {
            for disorder in or_unknown(&animal.disorders) {
                groups
                    .entry((species_key(&species), disorder_key(&disorder)))
                    .or_default()
                    .push(animal);
            }
        }
    }

    groups
        .into_iter()
        .filter_map(|((species, disorder), animals)| {
            let count = animals.len();
            if count > limit {
                tracing::info!(species = %species, disorder = %disorder, count, "subset too large; skipped");
                return None;
            }
            let description = format!("Animal models: {} + {} ({} entries)", species, disorder, count);
            Some(EnumSubset {
                name: format!("AnimalModel{}{}Enum", species, disorder),
                kind: ResourceKind::AnimalModel,
                definition: enum_from(Some(description), animals),
                filters: vec![("species", species), ("disorder", disorder)],
                count,
            })
        })
        .collect()
}

/// Resources grouped by kind, in table order
#[derive(Debug, Clone, Default)]
pub struct ToolResources {
    pub by_kind: IndexMap<ResourceKind, Vec<ToolResource>>,
}

impl ToolResources {
    pub fn get(&self, kind: ResourceKind) -> &[ToolResource] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn insert(&mut self, kind: ResourceKind, resources: Vec<ToolResource>) {
        self.by_kind.insert(kind, resources);
    }
}

/// Query every resource kind from the tools table
pub fn fetch_resources(
    api: &dyn SynapseApi,
    table: &str,
    page_size: u64,
    polling: JobPolling,
) -> Result<ToolResources> {
    let mut resources = ToolResources::default();
    for kind in ResourceKind::ALL {
        let result = query_table(api, table, &kind.query(table), page_size, polling)?;
        let rows: Vec<ToolResource> = result
            .rows
            .iter()
            .filter_map(|row| ToolResource::from_row(row, kind))
            .collect();
        tracing::info!(kind = kind.resource_type(), rows = rows.len(), "fetched resources");
        resources.insert(kind, rows);
    }
    Ok(resources)
}

/// One YAML enum file to write
#[derive(Debug, Clone)]
pub struct EnumFragment {
    pub path: PathBuf,
    pub header: String,
    pub enum_name: String,
    pub definition: EnumDefinition,
}

impl EnumFragment {
    pub fn render(&self) -> Result<String> {
        let mut doc = SchemaDocument::default();
        doc.enums.insert(self.enum_name.clone(), self.definition.clone());
        Ok(format!("{}{}", self.header, doc.to_yaml_string()?))
    }

    pub fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, self.render()?)?;
        Ok(())
    }
}

fn base_header(table: &str) -> String {
    format!(
        "# WARNING: This file is auto-generated from Synapse table {}\n\
         # DO NOT EDIT DIRECTLY - changes will be overwritten\n\
         # For manual entries, use the corresponding *Manual.yaml file\n\
         # Generated by dictionary-sync model-systems\n\n",
        table
    )
}

/// Every file a sync produces
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub base: Vec<EnumFragment>,
    pub subsets: Vec<EnumFragment>,
}

impl SyncPlan {
    pub fn build(resources: &ToolResources, config: &SyncConfig) -> Self {
        let base = ResourceKind::ALL
            .iter()
            .map(|kind| EnumFragment {
                path: kind.base_path(config),
                header: base_header(&config.tools_table),
                enum_name: kind.base_enum().to_string(),
                definition: base_enum(resources.get(*kind)),
            })
            .collect();

        let mut subsets = Vec::new();
        if config.create_subsets {
            let generated = generated_dir(config);
            let all = cell_line_subsets(resources.get(ResourceKind::CellLine), config.subset_limit)
                .into_iter()
                .chain(animal_model_subsets(resources.get(ResourceKind::AnimalModel), config.subset_limit));
            for subset in all {
                subsets.push(EnumFragment {
                    path: generated.join(format!("{}.yaml", subset.name)),
                    header: subset.header(),
                    enum_name: subset.name.clone(),
                    definition: subset.definition,
                });
            }
        }

        Self { base, subsets }
    }

    pub fn fragments(&self) -> impl Iterator<Item = &EnumFragment> {
        self.base.iter().chain(self.subsets.iter())
    }

    /// Write every fragment; `dry_run` writes nothing. Returns the paths
    /// written (or that would be).
    pub fn apply(&self, dry_run: bool) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for fragment in self.fragments() {
            if !dry_run {
                fragment.write()?;
            }
            paths.push(fragment.path.clone());
        }
        Ok(paths)
    }
}

pub fn generated_dir(config: &SyncConfig) -> PathBuf {
    config.sample_dir.join("generated")
}

/// Resolve the sync directories against a repository root
pub fn rooted(config: &SyncConfig, root: &Path) -> SyncConfig {
    SyncConfig {
        sample_dir: root.join(&config.sample_dir),
        experiment_dir: root.join(&config.experiment_dir),
        ..config.clone()
    }
}
