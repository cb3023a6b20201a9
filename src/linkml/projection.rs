//! Per-class projections of the master schema
//!
//! A projection is the smallest document the generator needs for one top
//! class: the class lineage and mixins, classes reached through slot ranges, the slots
//! those classes induce and the enums behind them.

use indexmap::IndexSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::{ClassHierarchy, SchemaDocument};
use crate::error::Result;

/// Project `doc` down to what `class` needs. Metadata (prefixes, imports,
/// default range, types) is copied unchanged; definitions keep master order.
pub fn project_class(doc: &SchemaDocument, class: &str) -> Result<SchemaDocument> {
    let hierarchy = ClassHierarchy::build(doc);

    // Lineage and mixins (with their own parents) of the class and of
    // every class it references
    let mut wanted: IndexSet<String> = IndexSet::new();
    wanted.extend(hierarchy.induced_classes(class)?.into_iter().map(str::to_string));
    for referenced in hierarchy.referenced_classes(class)? {
        wanted.extend(hierarchy.induced_classes(&referenced)?.into_iter().map(str::to_string));
    }

    let mut slots: IndexSet<String> = IndexSet::new();
    for name in &wanted {
        slots.extend(hierarchy.induced_slots(name)?);
    }
    let enums: IndexSet<String> = hierarchy.reachable_enums(class)?.into_iter().collect();

    Ok(SchemaDocument {
        id: doc.id.clone(),
        name: doc.name.clone(),
        metadata: doc.metadata.clone(),
        types: doc.types.clone(),
        classes: doc
            .classes
            .iter()
            .filter(|(name, _)| wanted.contains(*name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        slots: doc
            .slots
            .iter()
            .filter(|(name, _)| slots.contains(*name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        enums: doc
            .enums
            .iter()
            .filter(|(name, _)| enums.contains(*name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    })
}

/// Write `<dir>/<Class>.yaml` for each class and return the written paths
pub fn write_projections(
    doc: &SchemaDocument,
    classes: &[String],
    dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(classes.len());
    for class in classes {
        let projected = project_class(doc, class)?;
        let path = dir.join(format!("{}.yaml", class));
        projected.save(&path)?;
        tracing::debug!(
            class = %class,
            slots = projected.slots.len(),
            enums = projected.enums.len(),
            "wrote projection"
        );
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DictionaryError;
    use tempfile::tempdir;

    const MASTER: &str = r#"
id: https://w3id.org/synapse/nfosi/vocab
name: NF
default_range: string
classes:
  Template:
    slots: [Component]
  BiospecimenTemplate:
    is_a: Template
    slots: [specimenID, tumorType]
  ImagingTemplate:
    is_a: Template
    slots: [imagingModality]
slots:
  Component:
  specimenID:
  tumorType:
    range: TumorTypeEnum
  imagingModality:
    range: ImagingEnum
enums:
  TumorTypeEnum:
    permissible_values:
      Schwannoma:
  ImagingEnum:
    permissible_values:
      MRI:
"#;

    #[test]
    fn test_projection_keeps_only_reachable_definitions() {
        let doc = SchemaDocument::from_yaml_str(MASTER).unwrap();
        let projected = project_class(&doc, "BiospecimenTemplate").unwrap();

        let classes: Vec<_> = projected.classes.keys().cloned().collect();
        assert_eq!(classes, vec!["Template", "BiospecimenTemplate"]);
        let slots: Vec<_> = projected.slots.keys().cloned().collect();
        assert_eq!(slots, vec!["Component", "specimenID", "tumorType"]);
        let enums: Vec<_> = projected.enums.keys().cloned().collect();
        assert_eq!(enums, vec!["TumorTypeEnum"]);
        assert_eq!(projected.name.as_deref(), Some("NF"));
        assert!(projected.metadata.contains_key("default_range"));
    }

    #[test]
    fn test_projection_keeps_mixin_parents() {
        let doc = SchemaDocument::from_yaml_str(
            r#"
classes:
  Base:
    slots: [species]
  Mixin:
    is_a: Base
    mixin: true
  Template:
    mixins: [Mixin]
    slots: [Filename]
slots:
  species:
    range: SpeciesEnum
  Filename:
enums:
  SpeciesEnum:
    permissible_values:
      Homo sapiens:
"#,
        )
        .unwrap();

        let projected = project_class(&doc, "Template").unwrap();
        let classes: Vec<&str> = projected.classes.keys().map(String::as_str).collect();
        assert_eq!(classes, vec!["Base", "Mixin", "Template"]);
        let slots: Vec<&str> = projected.slots.keys().map(String::as_str).collect();
        assert_eq!(slots, vec!["species", "Filename"]);
        assert!(projected.enums.contains_key("SpeciesEnum"));
        assert!(ClassHierarchy::build(&projected).validate().is_empty());
    }

    #[test]
    fn test_projection_of_unknown_class_fails() {
        let doc = SchemaDocument::from_yaml_str(MASTER).unwrap();
        assert!(matches!(
            project_class(&doc, "Missing"),
            Err(DictionaryError::UnknownClass(_))
        ));
    }

    #[test]
    fn test_write_projections() {
        let doc = SchemaDocument::from_yaml_str(MASTER).unwrap();
        let dir = tempdir().unwrap();
        let classes = vec!["BiospecimenTemplate".to_string(), "ImagingTemplate".to_string()];

        let written = write_projections(&doc, &classes, dir.path()).unwrap();
        assert_eq!(written.len(), 2);

        let imaging = SchemaDocument::load(dir.path().join("ImagingTemplate.yaml")).unwrap();
        assert!(imaging.enums.contains_key("ImagingEnum"));
        assert!(!imaging.enums.contains_key("TumorTypeEnum"));
    }
}
