//! Template → data type / assay mapping table
//!
//! File-based templates declare what they describe in an annotation:
//!
//! ```yaml
//! annotations:
//!   templateFor:
//!     dataType: [gene expression]
//!     assay: [RNA-seq]
//!   dataGranularity: sample
//! ```

use serde_yaml::Value as YamlValue;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::linkml::{ClassDefinition, ClassHierarchy, SchemaDocument};

pub const DEFAULT_BASE: &str = "FileBasedTemplate";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInfo {
    pub name: String,
    pub parent: Option<String>,
    pub is_abstract: bool,
    pub data_types: Vec<String>,
    pub assays: Vec<String>,
    pub data_granularity: Option<String>,
}

/// An annotation value, unwrapping LinkML's `{tag, value}` form
fn annotation<'a>(class: &'a ClassDefinition, key: &str) -> Option<&'a YamlValue> {
    let value = class.annotations.get(key)?;
    match value.get("value") {
        Some(inner) if value.get("tag").is_some() => Some(inner),
        _ => Some(value),
    }
}

/// A string or a list of strings
fn strings(value: Option<&YamlValue>) -> Vec<String> {
    match value {
        Some(YamlValue::Sequence(items)) => items
            .iter()
            .filter_map(YamlValue::as_str)
            .map(str::to_string)
            .collect(),
        Some(YamlValue::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn template_info(name: &str, class: &ClassDefinition) -> TemplateInfo {
    let template_for = annotation(class, "templateFor").filter(|v| v.is_mapping());
    TemplateInfo {
        name: name.to_string(),
        parent: class.is_a.clone(),
        is_abstract: class.is_abstract(),
        data_types: strings(template_for.and_then(|t| t.get("dataType"))),
        assays: strings(template_for.and_then(|t| t.get("assay"))),
        data_granularity: annotation(class, "dataGranularity")
            .and_then(YamlValue::as_str)
            .map(str::to_string),
    }
}

/// The base template and every class descending from it, abstract ones
/// included, sorted by name
pub fn template_mapping(doc: &SchemaDocument, base: &str) -> Result<Vec<TemplateInfo>> {
    let hierarchy = ClassHierarchy::build(doc);
    let mut names = hierarchy.descendants(base)?;
    names.push(base);

    let mut templates: Vec<TemplateInfo> = names
        .into_iter()
        .filter_map(|name| doc.classes.get(name).map(|class| template_info(name, class)))
        .collect();
    templates.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(templates)
}

/// Markdown table of the concrete templates
pub fn render_markdown(templates: &[TemplateInfo], base: &str) -> String {
    let mut lines = vec![
        "# Data Template Mapping".to_string(),
        String::new(),
        format!(
            "This maps {} subclasses to their most supported dataTypes and assays.",
            base
        ),
        String::new(),
        String::new(),
        "| Template | Parent | Data Types | Assays |".to_string(),
        "|----------|--------|------------|--------|".to_string(),
    ];

    for t in templates.iter().filter(|t| !t.is_abstract) {
        let mut data_types = t.data_types.clone();
        data_types.sort();
        let mut assays = t.assays.clone();
        assays.sort();
        lines.push(format!(
            "| {} | {} | {} | {} |",
            t.name,
            t.parent.as_deref().unwrap_or(""),
            data_types.join(", "),
            assays.join(", ")
        ));
    }
    lines.push(String::new());
    lines.join("\n")
}

pub fn write_mapping(path: &Path, templates: &[TemplateInfo], base: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, render_markdown(templates, base))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = r#"
classes:
  Template:
    abstract: true
  FileBasedTemplate:
    is_a: Template
    abstract: true
  RNASeqTemplate:
    is_a: GenomicsAssayTemplate
    annotations:
      templateFor:
        dataType: [gene expression, aligned reads]
        assay: [RNA-seq]
      dataGranularity: sample
  GenomicsAssayTemplate:
    is_a: FileBasedTemplate
    annotations:
      templateFor:
        tag: templateFor
        value:
          dataType: genomic variants
  BiospecimenTemplate:
    is_a: Template
"#;

    #[test]
    fn test_mapping_collects_descendants() {
        let doc = SchemaDocument::from_yaml_str(DOC).unwrap();
        let templates = template_mapping(&doc, DEFAULT_BASE).unwrap();
        let names: Vec<_> = templates.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["FileBasedTemplate", "GenomicsAssayTemplate", "RNASeqTemplate"]);

        let rna = &templates[2];
        assert_eq!(rna.data_types, vec!["gene expression", "aligned reads"]);
        assert_eq!(rna.data_granularity.as_deref(), Some("sample"));
        assert_eq!(templates[1].data_types, vec!["genomic variants"]);
    }

    #[test]
    fn test_markdown_skips_abstract_and_sorts_values() {
        let doc = SchemaDocument::from_yaml_str(DOC).unwrap();
        let md = render_markdown(&template_mapping(&doc, DEFAULT_BASE).unwrap(), DEFAULT_BASE);
        let rows: Vec<_> = md.lines().filter(|l| l.starts_with("| ") && !l.starts_with("| Template")).collect();
        assert_eq!(
            rows,
            vec![
                "| GenomicsAssayTemplate | FileBasedTemplate | genomic variants |  |",
                "| RNASeqTemplate | GenomicsAssayTemplate | aligned reads, gene expression | RNA-seq |",
            ]
        );
        assert!(md.ends_with("|\n"));
    }

    #[test]
    fn test_unknown_base_is_an_error() {
        let doc = SchemaDocument::from_yaml_str(DOC).unwrap();
        assert!(template_mapping(&doc, "Missing").is_err());
    }
}
