//! is_a hierarchy over a schema document
//!
//! Classes form a single-parent tree. The graph edges point from child to
//! parent, so ancestors are outgoing neighbours and subclasses incoming ones.

use indexmap::{IndexMap, IndexSet};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Reversed};
use std::collections::HashSet;
use std::fmt;

use super::{ClassDefinition, RangeKind, SchemaDocument, SlotDefinition};
use crate::error::{DictionaryError, Result};

/// Problem found by [`ClassHierarchy::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyIssue {
    MissingParent { class: String, parent: String },
    MissingMixin { class: String, mixin: String },
    Cycle { classes: Vec<String> },
    UndefinedSlot { class: String, slot: String },
    UnknownRange { owner: String, slot: String, range: String },
    MalformedRule { class: String, index: usize, missing: &'static str },
    RuleSlotNotInduced { class: String, index: usize, slot: String },
}

impl fmt::Display for HierarchyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParent { class, parent } => {
                write!(f, "{}: is_a parent '{}' does not exist", class, parent)
            }
            Self::MissingMixin { class, mixin } => {
                write!(f, "{}: mixin '{}' does not exist", class, mixin)
            }
            Self::Cycle { classes } => write!(f, "is_a cycle: {}", classes.join(" -> ")),
            Self::UndefinedSlot { class, slot } => {
                write!(f, "{}: slot '{}' is not defined", class, slot)
            }
            Self::UnknownRange { owner, slot, range } => write!(
                f,
                "{}.{}: range '{}' is not a type, enum or class",
                owner, slot, range
            ),
            Self::MalformedRule { class, index, missing } => {
                write!(f, "{}: rule {} has no {}", class, index, missing)
            }
            Self::RuleSlotNotInduced { class, index, slot } => write!(
                f,
                "{}: rule {} references slot '{}' which the class does not have",
                class, index, slot
            ),
        }
    }
}

/// Directed is_a graph plus the document it was built from
pub struct ClassHierarchy<'a> {
    doc: &'a SchemaDocument,
    graph: DiGraph<String, ()>,
    nodes: IndexMap<String, NodeIndex>,
}

impl<'a> ClassHierarchy<'a> {
    pub fn build(doc: &'a SchemaDocument) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = IndexMap::new();

        for name in doc.classes.keys() {
            let idx = graph.add_node(name.clone());
            nodes.insert(name.clone(), idx);
        }

        for (name, class) in &doc.classes {
            if let Some(parent) = &class.is_a {
                if let Some(&parent_idx) = nodes.get(parent) {
                    graph.add_edge(nodes[name], parent_idx, ());
                }
            }
        }

        Self { doc, graph, nodes }
    }

    pub fn document(&self) -> &'a SchemaDocument {
        self.doc
    }

    fn class(&self, name: &str) -> Result<&'a ClassDefinition> {
        self.doc
            .classes
            .get(name)
            .ok_or_else(|| DictionaryError::UnknownClass(name.to_string()))
    }

    /// Structural problems in the document. An empty list means the
    /// hierarchy terminates and every referenced name exists.
    pub fn validate(&self) -> Vec<HierarchyIssue> {
        let mut issues = Vec::new();

        for (name, class) in &self.doc.classes {
            if let Some(parent) = &class.is_a {
                if !self.doc.classes.contains_key(parent) {
                    issues.push(HierarchyIssue::MissingParent {
                        class: name.clone(),
                        parent: parent.clone(),
                    });
                }
            }
            for mixin in &class.mixins {
                if !self.doc.classes.contains_key(mixin) {
                    issues.push(HierarchyIssue::MissingMixin {
                        class: name.clone(),
                        mixin: mixin.clone(),
                    });
                }
            }
        }

        for component in tarjan_scc(&self.graph) {
            let self_loop = component.len() == 1
                && self.graph.contains_edge(component[0], component[0]);
            if component.len() > 1 || self_loop {
                let mut classes: Vec<String> =
                    component.iter().map(|&i| self.graph[i].clone()).collect();
                classes.sort();
                issues.push(HierarchyIssue::Cycle { classes });
            }
        }

        for (name, slot) in &self.doc.slots {
            self.check_ranges(name, slot, "slots", &mut issues);
        }

        for (name, class) in &self.doc.classes {
            for slot in &class.slots {
                if !self.doc.slots.contains_key(slot) && !self.has_attribute(name, slot) {
                    issues.push(HierarchyIssue::UndefinedSlot {
                        class: name.clone(),
                        slot: slot.clone(),
                    });
                }
            }
            for (slot_name, slot) in class.attributes.iter().chain(&class.slot_usage) {
                self.check_ranges(slot_name, slot, name, &mut issues);
            }
            self.check_rules(name, class, &mut issues);
        }

        issues
    }

    fn check_ranges(
        &self,
        slot_name: &str,
        slot: &SlotDefinition,
        owner: &str,
        issues: &mut Vec<HierarchyIssue>,
    ) {
        for range in slot.ranges() {
            if self.doc.classify_range(range) == RangeKind::Unknown {
                issues.push(HierarchyIssue::UnknownRange {
                    owner: owner.to_string(),
                    slot: slot_name.to_string(),
                    range: range.to_string(),
                });
            }
        }
    }

    fn check_rules(&self, name: &str, class: &ClassDefinition, issues: &mut Vec<HierarchyIssue>) {
        if class.rules.is_empty() {
            return;
        }
        // A class inside a cycle has no induced slots to check against
        let induced: HashSet<String> = match self.induced_slots(name) {
            Ok(slots) => slots.into_iter().collect(),
            Err(_) => return,
        };

        for (index, rule) in class.rules.iter().enumerate() {
            if rule.description.is_none() {
                issues.push(HierarchyIssue::MalformedRule {
                    class: name.to_string(),
                    index,
                    missing: "description",
                });
            }
            if rule.preconditions.is_none() {
                issues.push(HierarchyIssue::MalformedRule {
                    class: name.to_string(),
                    index,
                    missing: "preconditions",
                });
            }
            if rule.postconditions.is_none() {
                issues.push(HierarchyIssue::MalformedRule {
                    class: name.to_string(),
                    index,
                    missing: "postconditions",
                });
            }
            for slot in rule.slot_names() {
                if !induced.contains(slot) {
                    issues.push(HierarchyIssue::RuleSlotNotInduced {
                        class: name.to_string(),
                        index,
                        slot: slot.to_string(),
                    });
                }
            }
        }
    }

    fn has_attribute(&self, class: &str, slot: &str) -> bool {
        self.induced_classes(class)
            .map(|chain| {
                chain
                    .iter()
                    .any(|c| self.doc.classes[*c].attributes.contains_key(slot))
            })
            .unwrap_or(false)
    }

    /// The class followed by its parents up to the root.
    ///
    /// A parent that does not exist ends the chain; a revisited class is a
    /// `CyclicHierarchy` error.
    pub fn ancestors(&self, class: &str) -> Result<Vec<&'a str>> {
        let (first, _) = self
            .doc
            .classes
            .get_key_value(class)
            .ok_or_else(|| DictionaryError::UnknownClass(class.to_string()))?;

        let mut chain = vec![first.as_str()];
        let mut seen: HashSet<&str> = HashSet::from([first.as_str()]);
        let mut current = &self.doc.classes[first];

        while let Some(parent) = &current.is_a {
            let Some((key, def)) = self.doc.classes.get_key_value(parent) else {
                break;
            };
            if !seen.insert(key.as_str()) {
                return Err(DictionaryError::CyclicHierarchy(key.clone()));
            }
            chain.push(key.as_str());
            current = def;
        }

        Ok(chain)
    }

    /// Root-first chain ending with the class itself
    pub fn lineage(&self, class: &str) -> Result<Vec<&'a str>> {
        let mut chain = self.ancestors(class)?;
        chain.reverse();
        Ok(chain)
    }

    /// Transitive subclasses, in document order
    pub fn descendants(&self, class: &str) -> Result<Vec<&'a str>> {
        let start = *self
            .nodes
            .get(class)
            .ok_or_else(|| DictionaryError::UnknownClass(class.to_string()))?;

        let reversed = Reversed(&self.graph);
        let mut bfs = Bfs::new(reversed, start);
        let mut found = HashSet::new();
        while let Some(node) = bfs.next(reversed) {
            if node != start {
                found.insert(self.graph[node].as_str());
            }
        }

        Ok(self
            .doc
            .classes
            .keys()
            .map(String::as_str)
            .filter(|name| found.contains(name))
            .collect())
    }

    /// Every class a class takes slots from, in induction order: for each
    /// class of the lineage, its mixins (each with its own lineage and
    /// mixins) come just before it. Mixins that do not exist are skipped.
    pub fn induced_classes(&self, class: &str) -> Result<Vec<&'a str>> {
        let mut order = IndexSet::new();
        let mut visiting = HashSet::new();
        self.collect_induced(class, &mut order, &mut visiting)?;
        Ok(order.into_iter().collect())
    }

    fn collect_induced(
        &self,
        class: &str,
        order: &mut IndexSet<&'a str>,
        visiting: &mut HashSet<&'a str>,
    ) -> Result<()> {
        for name in self.lineage(class)? {
            if order.contains(name) || !visiting.insert(name) {
                continue;
            }
            for mixin in &self.class(name)?.mixins {
                if self.doc.classes.contains_key(mixin) {
                    self.collect_induced(mixin, order, visiting)?;
                }
            }
            order.insert(name);
        }
        Ok(())
    }

    /// Slots a class ends up with: inherited slots first, then each class's
    /// mixin slots (including what the mixin inherits), own slots and
    /// attributes. Duplicates keep their first position.
    pub fn induced_slots(&self, class: &str) -> Result<Vec<String>> {
        let mut slots = IndexSet::new();

        for name in self.induced_classes(class)? {
            let def = self.class(name)?;
            slots.extend(def.slots.iter().cloned());
            slots.extend(def.attributes.keys().cloned());
        }

        Ok(slots.into_iter().collect())
    }

    /// Definition of a slot as seen from a class. Attributes on the nearest
    /// class in the chain (mixins included) win over the global slot table.
    pub fn slot_definition(&self, class: &str, slot: &str) -> Result<Option<&'a SlotDefinition>> {
        for name in self.induced_classes(class)?.into_iter().rev() {
            if let Some(attr) = self.class(name)?.attributes.get(slot) {
                return Ok(Some(attr));
            }
        }
        Ok(self.doc.slots.get(slot))
    }

    /// Ranges a slot takes inside a class, including `slot_usage` overrides
    /// anywhere in the chain
    fn slot_ranges(&self, class: &str, slot: &str) -> Result<Vec<&'a str>> {
        let mut ranges: Vec<&'a str> = Vec::new();
        if let Some(def) = self.slot_definition(class, slot)? {
            ranges.extend(def.ranges());
        }
        for name in self.induced_classes(class)? {
            if let Some(usage) = self.class(name)?.slot_usage.get(slot) {
                ranges.extend(usage.ranges());
            }
        }
        Ok(ranges)
    }

    /// Enums reachable from a class, following class-valued ranges
    pub fn reachable_enums(&self, class: &str) -> Result<Vec<String>> {
        Ok(self.closure(class)?.1)
    }

    /// Classes reached through class-valued slot ranges, excluding the
    /// class's own lineage and mixins
    pub fn referenced_classes(&self, class: &str) -> Result<Vec<String>> {
        let lineage: HashSet<&str> = self.induced_classes(class)?.into_iter().collect();
        Ok(self
            .closure(class)?
            .0
            .into_iter()
            .filter(|c| !lineage.contains(c.as_str()))
            .collect())
    }

    fn closure(&self, class: &str) -> Result<(Vec<String>, Vec<String>)> {
        let mut classes: IndexSet<String> = IndexSet::new();
        let mut enums: IndexSet<String> = IndexSet::new();
        let mut pending = vec![class.to_string()];

        while let Some(current) = pending.pop() {
            if !classes.insert(current.clone()) {
                continue;
            }
            for ancestor in self.induced_classes(&current)? {
                classes.insert(ancestor.to_string());
            }
            for slot in self.induced_slots(&current)? {
                for range in self.slot_ranges(&current, &slot)? {
                    match self.doc.classify_range(range) {
                        RangeKind::Enum => {
                            enums.insert(range.to_string());
                        }
                        RangeKind::Class if !classes.contains(range) => {
                            pending.push(range.to_string());
                        }
                        _ => {}
                    }
                }
            }
        }

        Ok((classes.into_iter().collect(), enums.into_iter().collect()))
    }
}
