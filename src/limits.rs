//! Synapse platform limit checks
//!
//! Synapse caps annotation enums at a fixed number of values, and a file
//! view row at a fixed byte size. These checks run over the LinkML modules
//! (enum sizes) and the generated JSON Schemas (value lengths, row sizes)
//! before anything is registered.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

use crate::config::LimitsConfig;
use crate::error::{DictionaryError, Result};
use crate::linkml::SchemaDocument;
use crate::manifest::MANIFEST_FILE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
    Text,
}

impl FromStr for ReportFormat {
    type Err = DictionaryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "text" | "txt" => Ok(Self::Text),
            other => Err(DictionaryError::InvalidFormat(format!("unknown report format: {}", other))),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Text => "text",
        };
        write!(f, "{}", name)
    }
}

/// `64000` → `64,000`
fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

/// One enum and how close it is to the limit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumSize {
    pub name: String,
    /// Module path relative to the modules directory's parent
    pub file: String,
    pub count: usize,
    pub remaining: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnumSizeReport {
    pub limit: usize,
    pub warning: usize,
    pub exceeds: Vec<EnumSize>,
    pub approaching: Vec<EnumSize>,
    pub safe: Vec<EnumSize>,
}

/// Count permissible values of every enum under `modules_dir`.
/// An enum defined in several files counts as the last one read.
pub fn check_enum_sizes(modules_dir: &Path, limits: &LimitsConfig) -> Result<EnumSizeReport> {
    if !modules_dir.is_dir() {
        return Err(DictionaryError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("modules directory {} not found", modules_dir.display()),
        )));
    }
    let base = modules_dir.parent().unwrap_or(modules_dir);

    let mut sizes: IndexMap<String, EnumSize> = IndexMap::new();
    for entry in WalkDir::new(modules_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().map(|x| x == "yaml").unwrap_or(false))
    {
        let doc = match SchemaDocument::load(entry.path()) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "skipping unreadable module");
                continue;
            }
        };
        let file = entry
            .path()
            .strip_prefix(base)
            .unwrap_or(entry.path())
            .display()
            .to_string();
        for (name, definition) in doc.enums {
            let count = definition.permissible_values.len();
            sizes.insert(
                name.clone(),
                EnumSize {
                    name,
                    file: file.clone(),
                    count,
                    remaining: limits.enum_limit as i64 - count as i64,
                },
            );
        }
    }

    let mut report = EnumSizeReport {
        limit: limits.enum_limit,
        warning: limits.enum_warning,
        exceeds: Vec::new(),
        approaching: Vec::new(),
        safe: Vec::new(),
    };
    for size in sizes.into_values() {
        if size.count > limits.enum_limit {
            report.exceeds.push(size);
        } else if size.count >= limits.enum_warning {
            report.approaching.push(size);
        } else {
            report.safe.push(size);
        }
    }
    report.exceeds.sort_by(|a, b| b.count.cmp(&a.count));
    report.approaching.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(report)
}

impl EnumSizeReport {
    pub fn total(&self) -> usize {
        self.exceeds.len() + self.approaching.len() + self.safe.len()
    }

    /// Strict: 1 exceeds, 2 approaching, 0 otherwise. Default: 1 only
    /// when an enum exceeds the limit.
    pub fn exit_code(&self, strict: bool) -> i32 {
        if !self.exceeds.is_empty() {
            1
        } else if strict && !self.approaching.is_empty() {
            2
        } else {
            0
        }
    }

    pub fn render(&self, format: ReportFormat, verbose: bool) -> Result<String> {
        match format {
            ReportFormat::Markdown => Ok(self.to_markdown(verbose)),
            ReportFormat::Text => Ok(self.to_text()),
            ReportFormat::Json => {
                let safe: &[EnumSize] = if verbose { &self.safe } else { &[] };
                let value = serde_json::json!({
                    "exceeds_limit": self.exceeds,
                    "approaching_limit": self.approaching,
                    "safe_enums": safe,
                    "summary": {
                        "total": self.total(),
                        "exceeds": self.exceeds.len(),
                        "approaching": self.approaching.len(),
                        "safe": self.safe.len(),
                    }
                });
                Ok(serde_json::to_string_pretty(&value)?)
            }
        }
    }

    pub fn to_markdown(&self, verbose: bool) -> String {
        let mut lines = vec![
            "# Enum Size Report - Synapse API Limits".to_string(),
            String::new(),
            format!("**Synapse Limit:** {} values per enum field", self.limit),
            format!("**Warning Threshold:** {} values", self.warning),
            String::new(),
        ];

        if self.exceeds.is_empty() {
            lines.push("## ✅ No Enums Exceed Limit".to_string());
            lines.push(String::new());
        } else {
            lines.push(format!("## ⚠️ EXCEEDS LIMIT ({} enums)", self.exceeds.len()));
            lines.push(String::new());
            lines.push(format!(
                "These enums exceed Synapse's {}-value limit and may cause API errors:",
                self.limit
            ));
            lines.push(String::new());
            for e in &self.exceeds {
                lines.push(format!("- **{}** ({})", e.name, e.file));
                lines.push(format!("  - Current: {} values", e.count));
                lines.push(format!("  - Exceeds by: {} values", e.count - self.limit));
                lines.push(String::new());
            }
        }

        if !self.approaching.is_empty() {
            lines.push(format!("## ⚠️ Approaching Limit ({} enums)", self.approaching.len()));
            lines.push(String::new());
            lines.push(format!(
                "These enums have {}+ values and should be monitored:",
                self.warning
            ));
            lines.push(String::new());
            for e in &self.approaching {
                lines.push(format!("- **{}** ({})", e.name, e.file));
                lines.push(format!("  - Current: {} values", e.count));
                lines.push(format!("  - Remaining before limit: {} values", e.remaining));
                lines.push(String::new());
            }
        }

        if verbose && !self.safe.is_empty() {
            lines.push(format!("## ✅ Safe Enums ({} enums)", self.safe.len()));
            lines.push(String::new());
            lines.push(format!(
                "These enums are well below the limit (< {} values)",
                self.warning
            ));
            lines.push(String::new());
        }

        lines.push("## Summary".to_string());
        lines.push(String::new());
        lines.push(format!("- **Total enums:** {}", self.total()));
        lines.push(format!("- **Exceeds limit:** {}", self.exceeds.len()));
        lines.push(format!("- **Approaching limit:** {}", self.approaching.len()));
        lines.push(format!("- **Safe:** {}", self.safe.len()));
        lines.join("\n")
    }

    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();
        if !self.exceeds.is_empty() {
            lines.push(format!("⚠️  {} enum(s) exceed Synapse limit:", self.exceeds.len()));
            lines.extend(self.exceeds.iter().map(|e| format!("  - {}: {} values", e.name, e.count)));
        }
        if !self.approaching.is_empty() {
            lines.push(format!("⚠️  {} enum(s) approaching limit:", self.approaching.len()));
            lines.extend(self.approaching.iter().map(|e| format!("  - {}: {} values", e.name, e.count)));
        }
        if lines.is_empty() {
            lines.push("✅ All enums within safe limits".to_string());
        }
        lines.join("\n")
    }
}

/// Generated schemas in a directory, sorted, without the build manifest
fn schema_files(schemas_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(schemas_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension().map(|x| x == "json").unwrap_or(false)
                && p.file_name().map(|n| n != MANIFEST_FILE).unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

fn load_properties(path: &Path) -> Option<serde_json::Map<String, Value>> {
    let parsed = fs::read_to_string(path)
        .map_err(DictionaryError::from)
        .and_then(|text| serde_json::from_str::<Value>(&text).map_err(DictionaryError::from));
    match parsed {
        Ok(schema) => schema.get("properties").and_then(Value::as_object).cloned(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable schema");
            None
        }
    }
}

/// Property type; a type array gives its first non-null entry and an
/// absent type counts as string
fn property_type(property: &Value) -> &str {
    match property.get("type") {
        Some(Value::String(t)) => t.as_str(),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .unwrap_or("string"),
        _ => "string",
    }
}

fn value_length(value: &Value) -> usize {
    match value {
        Value::String(s) => s.chars().count(),
        other => other.to_string().chars().count(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StringLengthReport {
    pub list_max: usize,
    pub string_max: usize,
    pub list_exceeds: usize,
    pub string_exceeds: usize,
}

/// Longest enum value of list and scalar properties, and how many values
/// exceed the column sizes
pub fn check_string_lengths(schemas_dir: &Path, limits: &LimitsConfig) -> Result<StringLengthReport> {
    let mut list_lengths = Vec::new();
    let mut string_lengths = Vec::new();

    for path in schema_files(schemas_dir)? {
        let Some(properties) = load_properties(&path) else {
            continue;
        };
        for property in properties.values() {
            let (values, target) = if property_type(property) == "array" && property.get("items").is_some() {
                (property.pointer("/items/enum"), &mut list_lengths)
            } else if property.get("enum").is_some() {
                (property.get("enum"), &mut string_lengths)
            } else {
                continue;
            };
            if let Some(Value::Array(values)) = values {
                target.extend(values.iter().map(value_length));
            }
        }
    }

    Ok(StringLengthReport {
        list_max: list_lengths.iter().copied().max().unwrap_or(0),
        string_max: string_lengths.iter().copied().max().unwrap_or(0),
        list_exceeds: list_lengths.iter().filter(|l| **l > limits.list_max_size).count(),
        string_exceeds: string_lengths.iter().filter(|l| **l > limits.string_max_size).count(),
    })
}

/// Estimated file view row size of one schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowSize {
    pub name: String,
    pub string_fields: usize,
    pub list_fields: usize,
    pub row_size: usize,
    pub percent: f64,
    pub headroom: i64,
}

/// `strings × STRING + lists × LIST × items + name + overhead`
pub fn estimate_row_size(string_fields: usize, list_fields: usize, limits: &LimitsConfig) -> usize {
    string_fields * limits.string_max_size
        + list_fields * limits.list_max_size * limits.list_max_length
        + limits.name_max_size
        + limits.system_overhead
}

#[derive(Debug, Clone, Serialize)]
pub struct RowSizeReport {
    /// Largest first
    pub schemas: Vec<RowSize>,
    pub limit: usize,
    pub warning: usize,
}

impl RowSizeReport {
    pub fn exceeds(&self) -> Vec<&RowSize> {
        self.schemas.iter().filter(|s| s.row_size > self.limit).collect()
    }

    pub fn approaching(&self) -> Vec<&RowSize> {
        self.schemas
            .iter()
            .filter(|s| s.row_size > self.warning && s.row_size <= self.limit)
            .collect()
    }

    pub fn largest(&self) -> Option<&RowSize> {
        self.schemas.first()
    }
}

pub fn check_row_sizes(schemas_dir: &Path, limits: &LimitsConfig) -> Result<RowSizeReport> {
    let mut schemas = Vec::new();
    for path in schema_files(schemas_dir)? {
        let Some(properties) = load_properties(&path) else {
            continue;
        };
        let (mut strings, mut lists) = (0, 0);
        for property in properties.values() {
            match property_type(property) {
                "array" => lists += 1,
                "string" => strings += 1,
                _ => {}
            }
        }
        let row_size = estimate_row_size(strings, lists, limits);
        let percent = (row_size as f64 / limits.row_limit.max(1) as f64 * 1000.0).round() / 10.0;
        schemas.push(RowSize {
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            string_fields: strings,
            list_fields: lists,
            row_size,
            percent,
            headroom: limits.row_limit as i64 - row_size as i64,
        });
    }
    schemas.sort_by(|a, b| b.row_size.cmp(&a.row_size));
    Ok(RowSizeReport {
        schemas,
        limit: limits.row_limit,
        warning: limits.row_warning,
    })
}

/// All three checks together
#[derive(Debug, Clone)]
pub struct LimitsReport {
    pub config: LimitsConfig,
    pub enums: EnumSizeReport,
    pub strings: StringLengthReport,
    pub rows: RowSizeReport,
}

impl LimitsReport {
    pub fn run(modules_dir: &Path, schemas_dir: &Path, limits: &LimitsConfig) -> Result<Self> {
        Ok(Self {
            config: limits.clone(),
            enums: check_enum_sizes(modules_dir, limits)?,
            strings: check_string_lengths(schemas_dir, limits)?,
            rows: check_row_sizes(schemas_dir, limits)?,
        })
    }

    fn has_failures(&self) -> bool {
        !self.enums.exceeds.is_empty() || !self.rows.exceeds().is_empty()
    }

    fn has_warnings(&self) -> bool {
        !self.enums.approaching.is_empty() || !self.rows.approaching().is_empty()
    }

    /// Strict: 1 on any exceeded limit, 2 on any approaching one.
    /// Otherwise always 0.
    pub fn exit_code(&self, strict: bool) -> i32 {
        if !strict {
            0
        } else if self.has_failures() {
            1
        } else if self.has_warnings() {
            2
        } else {
            0
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let value = serde_json::json!({
            "config": self.config,
            "enums": {
                "exceeds": self.enums.exceeds,
                "approaching": self.enums.approaching,
                "total": self.enums.total(),
            },
            "strings": self.strings,
            "rows": {
                "schemas": self.rows.schemas,
                "exceeds": self.rows.exceeds(),
                "approaching": self.rows.approaching(),
                "largest": self.rows.largest(),
            },
        });
        Ok(serde_json::to_string_pretty(&value)?)
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => self.to_json(),
            ReportFormat::Markdown | ReportFormat::Text => Ok(self.to_markdown()),
        }
    }

    pub fn to_markdown(&self) -> String {
        let c = &self.config;
        let mut lines = vec![
            "# Schema Limits Report".to_string(),
            String::new(),
            "## Configuration".to_string(),
            format!(
                "- STRING: {} chars, LIST: {} chars × {} items, name: {} chars",
                c.string_max_size, c.list_max_size, c.list_max_length, c.name_max_size
            ),
            format!(
                "- Limits: {} bytes/row, {} values/enum",
                thousands(c.row_limit as i64),
                c.enum_limit
            ),
            String::new(),
            "## Enum Sizes".to_string(),
        ];

        if self.enums.exceeds.is_empty() {
            lines.push("### ✅ All enums within limit".to_string());
        } else {
            lines.push(format!("### ❌ {} enums exceed limit", self.enums.exceeds.len()));
            for e in self.enums.exceeds.iter().take(10) {
                lines.push(format!(
                    "- {} values (exceeds by {}): `{}`",
                    e.count,
                    e.count - c.enum_limit,
                    e.file
                ));
            }
        }
        if !self.enums.approaching.is_empty() {
            lines.push(format!("### ⚠️  {} approaching limit", self.enums.approaching.len()));
        }
        lines.push(String::new());

        lines.push("## String Lengths".to_string());
        lines.push(format!(
            "- List max: {} chars (limit: {})",
            self.strings.list_max, c.list_max_size
        ));
        lines.push(format!(
            "- String max: {} chars (limit: {})",
            self.strings.string_max, c.string_max_size
        ));
        let over = self.strings.list_exceeds + self.strings.string_exceeds;
        if over > 0 {
            lines.push(format!("### ⚠️  {} values exceed limits", over));
        } else {
            lines.push("### ✅ All values within limits".to_string());
        }
        lines.push(String::new());

        lines.push("## Row Sizes".to_string());
        let exceeds = self.rows.exceeds();
        if exceeds.is_empty() {
            lines.push("### ✅ All schemas within 64KB limit".to_string());
        } else {
            lines.push(format!("### ❌ {} schemas exceed 64KB", exceeds.len()));
            for s in &exceeds {
                lines.push(format!(
                    "- {}: {} bytes (+{} over)",
                    s.name,
                    thousands(s.row_size as i64),
                    thousands(-s.headroom)
                ));
            }
        }
        lines.push(String::new());
        lines.push("### Top 10 Largest".to_string());
        lines.push("| Schema | S/L Fields | Row Size | % | Headroom |".to_string());
        lines.push("|--------|------------|----------|---|----------|".to_string());
        for s in self.rows.schemas.iter().take(10) {
            let status = if s.row_size > c.row_limit {
                "❌"
            } else if s.row_size > c.row_warning {
                "⚠️"
            } else {
                "✅"
            };
            lines.push(format!(
                "| {} {} | {}/{} | {} | {:.1}% | {} |",
                status,
                s.name,
                s.string_fields,
                s.list_fields,
                thousands(s.row_size as i64),
                s.percent,
                thousands(s.headroom)
            ));
        }

        lines.push(String::new());
        lines.push("## Summary".to_string());
        lines.push(format!(
            "- Enums: {} total, {} exceed, {} approaching",
            self.enums.total(),
            self.enums.exceeds.len(),
            self.enums.approaching.len()
        ));
        lines.push(format!(
            "- Schemas: {} total, {} exceed, {} approaching",
            self.rows.schemas.len(),
            exceeds.len(),
            self.rows.approaching().len()
        ));
        if self.has_failures() {
            lines.push("\n❌ **VALIDATION FAILED** - Critical issues found".to_string());
        } else if self.has_warnings() {
            lines.push("\n⚠️  **WARNINGS** - Some limits approaching".to_string());
        } else {
            lines.push("\n✅ **ALL CHECKS PASSED**".to_string());
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn enum_yaml(name: &str, count: usize) -> String {
        let mut out = format!("enums:\n  {}:\n    permissible_values:\n", name);
        for i in 0..count {
            out.push_str(&format!("      value{}:\n", i));
        }
        out
    }

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(64000), "64,000");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(-1234567), "-1,234,567");
    }

    #[test]
    fn test_enum_size_buckets_and_exit_codes() {
        let dir = tempdir().unwrap();
        let modules = dir.path().join("modules");
        fs::create_dir_all(modules.join("Sample")).unwrap();
        fs::write(modules.join("Sample/Big.yaml"), enum_yaml("BigEnum", 101)).unwrap();
        fs::write(modules.join("Edge.yaml"), enum_yaml("EdgeEnum", 100)).unwrap();
        fs::write(modules.join("Warn.yaml"), enum_yaml("WarnEnum", 80)).unwrap();
        fs::write(modules.join("Small.yaml"), enum_yaml("SmallEnum", 79)).unwrap();
        fs::write(modules.join("broken.yaml"), "enums: [").unwrap();

        let limits = LimitsConfig::default();
        let report = check_enum_sizes(&modules, &limits).unwrap();
        assert_eq!(report.exceeds.len(), 1);
        assert_eq!(report.exceeds[0].file, "modules/Sample/Big.yaml");
        let approaching: Vec<_> = report.approaching.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(approaching, vec!["EdgeEnum", "WarnEnum"]);
        assert_eq!(report.safe.len(), 1);

        assert_eq!(report.exit_code(false), 1);
        assert_eq!(report.exit_code(true), 1);

        fs::remove_file(modules.join("Sample/Big.yaml")).unwrap();
        let report = check_enum_sizes(&modules, &limits).unwrap();
        assert_eq!(report.exit_code(false), 0);
        assert_eq!(report.exit_code(true), 2);
    }

    #[test]
    fn test_enum_report_formats() {
        let dir = tempdir().unwrap();
        let modules = dir.path().join("modules");
        fs::create_dir_all(&modules).unwrap();
        fs::write(modules.join("Big.yaml"), enum_yaml("BigEnum", 105)).unwrap();

        let report = check_enum_sizes(&modules, &LimitsConfig::default()).unwrap();
        let md = report.to_markdown(false);
        assert!(md.contains("## ⚠️ EXCEEDS LIMIT (1 enums)"));
        assert!(md.contains("  - Exceeds by: 5 values"));
        assert!(report.to_text().contains("  - BigEnum: 105 values"));

        let json: Value = serde_json::from_str(&report.render(ReportFormat::Json, false).unwrap()).unwrap();
        assert_eq!(json["summary"]["exceeds"], 1);
        assert_eq!(json["exceeds_limit"][0]["remaining"], -5);
    }

    #[test]
    fn test_missing_modules_dir() {
        let dir = tempdir().unwrap();
        assert!(check_enum_sizes(&dir.path().join("nope"), &LimitsConfig::default()).is_err());
    }

    fn write_schema(dir: &Path, name: &str, schema: Value) {
        fs::write(dir.join(format!("{}.json", name)), schema.to_string()).unwrap();
    }

    #[test]
    fn test_string_lengths() {
        let dir = tempdir().unwrap();
        let long = "x".repeat(81);
        write_schema(
            dir.path(),
            "A",
            json!({"properties": {
                "assay": {"type": "array", "items": {"enum": ["RNA-seq", long.clone()]}},
                "species": {"type": ["string", "null"], "enum": ["Homo sapiens"]},
                "free": {"type": "string"}
            }}),
        );
        write_schema(dir.path(), "manifest", json!({"properties": {"x": {"enum": [long]}}}));

        let report = check_string_lengths(dir.path(), &LimitsConfig::default()).unwrap();
        assert_eq!(report.list_max, 81);
        assert_eq!(report.list_exceeds, 1);
        assert_eq!(report.string_max, 12);
        assert_eq!(report.string_exceeds, 0);
    }

    #[test]
    fn test_row_sizes_sorted_largest_first() {
        let dir = tempdir().unwrap();
        write_schema(
            dir.path(),
            "Small",
            json!({"properties": {"a": {"type": "string"}, "n": {"type": "integer"}}}),
        );
        let mut lists = serde_json::Map::new();
        for i in 0..18 {
            lists.insert(format!("l{}", i), json!({"type": "array"}));
        }
        write_schema(dir.path(), "Wide", json!({"properties": lists}));

        let limits = LimitsConfig::default();
        let report = check_row_sizes(dir.path(), &limits).unwrap();
        assert_eq!(report.schemas[0].name, "Wide");
        assert_eq!(report.schemas[0].row_size, 18 * 80 * 40 + 256 + 3500);
        assert_eq!(report.schemas[0].row_size, 61356);
        assert_eq!(report.approaching().len(), 1);
        assert!(report.exceeds().is_empty());
        assert_eq!(report.schemas[1].row_size, 80 + 256 + 3500);
        assert_eq!(report.schemas[1].string_fields, 1);
    }

    #[test]
    fn test_combined_report_exit_codes() {
        let dir = tempdir().unwrap();
        let modules = dir.path().join("modules");
        let schemas = dir.path().join("schemas");
        fs::create_dir_all(&modules).unwrap();
        fs::create_dir_all(&schemas).unwrap();
        fs::write(modules.join("Ok.yaml"), enum_yaml("OkEnum", 3)).unwrap();
        let mut lists = serde_json::Map::new();
        for i in 0..20 {
            lists.insert(format!("l{}", i), json!({"type": "array"}));
        }
        write_schema(&schemas, "Huge", json!({"properties": lists}));

        let report = LimitsReport::run(&modules, &schemas, &LimitsConfig::default()).unwrap();
        assert_eq!(report.exit_code(true), 1);
        assert_eq!(report.exit_code(false), 0);

        let md = report.to_markdown();
        assert!(md.contains("### ❌ 1 schemas exceed 64KB"));
        assert!(md.contains("- Huge: 67,756 bytes (+3,756 over)"));
        assert!(md.contains("❌ **VALIDATION FAILED**"));

        let json: Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["rows"]["largest"]["name"], "Huge");
        assert_eq!(json["config"]["row_limit"], 64000);
    }
}
