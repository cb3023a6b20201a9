//! LinkML schema documents
//!
//! Typed view over the LinkML YAML the dictionary is authored in. Only the
//! keys the pipeline reads are typed; every other key is kept in an `extra`
//! map so a document survives load → edit → save without losing content.
//! Key order follows the source file throughout.

pub mod hierarchy;
pub mod projection;

pub use hierarchy::{ClassHierarchy, HierarchyIssue};
pub use projection::{project_class, write_projections};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::Result;

/// Untyped keys carried through unchanged
pub type Extra = IndexMap<String, serde_yaml::Value>;

/// LinkML builtin types that never resolve to an enum or class
pub const BUILTIN_TYPES: &[&str] = &[
    "string",
    "integer",
    "float",
    "double",
    "decimal",
    "boolean",
    "date",
    "datetime",
    "date_or_datetime",
    "time",
    "uri",
    "uriorcurie",
    "curie",
    "ncname",
    "objectidentifier",
    "nodeidentifier",
    "jsonpointer",
    "jsonpath",
    "sparqlpath",
];

/// A whole LinkML schema file (master schema or module fragment)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Schema metadata (prefixes, imports, default_range, ...)
    #[serde(flatten)]
    pub metadata: Extra,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub types: IndexMap<String, serde_yaml::Value>,

    #[serde(default, deserialize_with = "nullable_entries", skip_serializing_if = "IndexMap::is_empty")]
    pub classes: IndexMap<String, ClassDefinition>,

    #[serde(default, deserialize_with = "nullable_entries", skip_serializing_if = "IndexMap::is_empty")]
    pub slots: IndexMap<String, SlotDefinition>,

    #[serde(default, deserialize_with = "nullable_entries", skip_serializing_if = "IndexMap::is_empty")]
    pub enums: IndexMap<String, EnumDefinition>,
}

/// A LinkML class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Single parent; the hierarchy is linear
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_a: Option<String>,

    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mixin: Option<bool>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub mixins: Vec<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<String>,

    #[serde(default, deserialize_with = "nullable_entries", skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, SlotDefinition>,

    /// Per-class refinements of inherited slots
    #[serde(default, deserialize_with = "nullable_entries", skip_serializing_if = "IndexMap::is_empty")]
    pub slot_usage: IndexMap<String, SlotDefinition>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub annotations: IndexMap<String, serde_yaml::Value>,

    /// Auto-fill rules keyed on a trigger slot value
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ClassRule>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl ClassDefinition {
    pub fn is_abstract(&self) -> bool {
        self.abstract_.unwrap_or(false)
    }

    pub fn is_mixin(&self) -> bool {
        self.mixin.unwrap_or(false)
    }
}

/// Precondition → postcondition rule on a class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preconditions: Option<RuleConditions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postconditions: Option<RuleConditions>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConditions {
    #[serde(default, deserialize_with = "nullable_entries", skip_serializing_if = "IndexMap::is_empty")]
    pub slot_conditions: IndexMap<String, SlotCondition>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals_string: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl ClassRule {
    /// Slot names the rule reads or writes
    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.preconditions
            .iter()
            .chain(self.postconditions.iter())
            .flat_map(|c| c.slot_conditions.keys().map(String::as_str))
    }
}

/// A LinkML slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<RangeExpression>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multivalued: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl SlotDefinition {
    /// Every range this slot can take: `range` first, then `any_of` branches
    pub fn ranges(&self) -> impl Iterator<Item = &str> {
        self.range
            .as_deref()
            .into_iter()
            .chain(self.any_of.iter().filter_map(|r| r.range.as_deref()))
    }
}

/// One alternative of a slot's `any_of`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeExpression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// A LinkML enum
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "nullable_entries", skip_serializing_if = "IndexMap::is_empty")]
    pub permissible_values: IndexMap<String, PermissibleValue>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// An enum member with its ontology annotations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissibleValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Ontology IRI or RRID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meaning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// What a slot range names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Primitive,
    Enum,
    Class,
    Unknown,
}

impl SchemaDocument {
    /// Load a schema from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        // A document holding only comments parses as null
        let doc: Option<Self> = serde_yaml::from_str(content)?;
        Ok(doc.unwrap_or_default())
    }

    /// Load and merge every `*.yaml` module under a directory.
    ///
    /// Files are visited in path order; later definitions replace earlier
    /// ones with the same name. Unparseable files are skipped.
    pub fn load_modules(dir: impl AsRef<Path>) -> Result<Self> {
        let mut merged = Self::default();

        for entry in WalkDir::new(dir.as_ref())
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_yaml = path
                .extension()
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false);
            if !is_yaml {
                continue;
            }

            match Self::load(path) {
                Ok(module) => {
                    tracing::debug!(path = %path.display(), enums = module.enums.len(), "loaded module");
                    merged.merge(module);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable module");
                }
            }
        }

        Ok(merged)
    }

    /// Merge another document into this one. Definitions from `other` win;
    /// metadata already present here is kept.
    pub fn merge(&mut self, other: SchemaDocument) {
        if self.id.is_none() {
            self.id = other.id;
        }
        if self.name.is_none() {
            self.name = other.name;
        }
        for (key, value) in other.metadata {
            self.metadata.entry(key).or_insert(value);
        }
        self.types.extend(other.types);
        self.classes.extend(other.classes);
        self.slots.extend(other.slots);
        self.enums.extend(other.enums);
    }

    /// Rebuild a master schema from its modules. The existing master at
    /// `master` keeps its header metadata and loses its definitions; a
    /// missing master starts empty. A master that exists but does not parse
    /// is an error.
    pub fn rebuild_master(modules_dir: impl AsRef<Path>, master: impl AsRef<Path>) -> Result<Self> {
        let master = master.as_ref();
        let mut doc = if master.exists() {
            Self::load(master)?
        } else {
            Self::default()
        };
        doc.classes.clear();
        doc.slots.clear();
        doc.enums.clear();
        doc.merge(Self::load_modules(modules_dir)?);
        Ok(doc)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the document back to disk
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path.as_ref(), self.to_yaml_string()?)?;
        Ok(())
    }

    pub fn enum_for(&self, range: &str) -> Option<&EnumDefinition> {
        self.enums.get(range)
    }

    pub fn is_primitive(&self, range: &str) -> bool {
        BUILTIN_TYPES.contains(&range) || self.types.contains_key(range)
    }

    pub fn classify_range(&self, range: &str) -> RangeKind {
        if self.enums.contains_key(range) {
            RangeKind::Enum
        } else if self.classes.contains_key(range) {
            RangeKind::Class
        } else if self.is_primitive(range) {
            RangeKind::Primitive
        } else {
            RangeKind::Unknown
        }
    }

    /// Total permissible values across all enums
    pub fn permissible_value_count(&self) -> usize {
        self.enums.values().map(|e| e.permissible_values.len()).sum()
    }
}

/// Treat an explicit YAML null as the default value
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Map whose values may be null (`Label:` with nothing after it)
fn nullable_entries<'de, D, T>(deserializer: D) -> std::result::Result<IndexMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let entries: Option<IndexMap<String, Option<T>>> = Option::deserialize(deserializer)?;
    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or_default()))
        .collect())
}
