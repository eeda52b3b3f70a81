// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity graph
//!
//! An id-keyed arena over the parsed instances plus the element tree. References
//! stay ids and are resolved by lookup, so forward and cyclic references need no
//! special handling.
//!
//! The containment tree is the union of spatial containment, aggregation and
//! nesting relationships. Exports use them inconsistently, so all three are read.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::document::ParsedFile;
use crate::element::{ElementNode, ElementType};
use crate::error::{ModelError, Result};
use crate::header::Schema;
use crate::instance::{AttributeValue, EntityId, RawInstance};
use crate::properties::{read_property_set, PropertySet, PropertySets};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Instant;

/// Id of the root created when a document has no IfcProject
pub const SYNTHETIC_ROOT: EntityId = EntityId::MAX;

/// Records whose references are routinely left dangling by exporters
const LENIENT_REFERRERS: &[&str] = &[
    "IFCOWNERHISTORY",
    "IFCPERSONANDORGANIZATION",
    "IFCAPPLICATION",
    "IFCPERSON",
    "IFCORGANIZATION",
];

/// What to do when two elements share a GlobalId
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateGlobalIdPolicy {
    /// Keep every element
    #[default]
    KeepBoth,
    /// Keep the first element, drop later ones from the tree
    KeepFirst,
}

impl FromStr for DuplicateGlobalIdPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "keep-both" | "both" => Ok(Self::KeepBoth),
            "keep-first" | "first" => Ok(Self::KeepFirst),
            other => Err(format!("unknown duplicate GlobalId policy '{}'", other)),
        }
    }
}

/// Graph builder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphOptions {
    pub duplicate_global_ids: DuplicateGlobalIdPolicy,
    /// Downgrade a missing OwnerHistory (attribute 1 of rooted entities)
    /// to a diagnostic. Off by default: every forward reference must resolve.
    pub lenient_owner_history: bool,
}

/// Parsed instances plus the element hierarchy. Immutable once built.
#[derive(Debug, Clone)]
pub struct EntityGraph {
    file: ParsedFile,
    elements: FxHashMap<EntityId, ElementNode>,
    /// Element ids in file order; never contains the synthetic root
    order: Vec<EntityId>,
    by_global_id: FxHashMap<String, EntityId>,
    root: EntityId,
    diagnostics: Diagnostics,
}

/// Build a graph with default options
pub fn build(parsed: ParsedFile) -> Result<EntityGraph> {
    build_with(parsed, &GraphOptions::default())
}

/// Build a graph
pub fn build_with(mut parsed: ParsedFile, options: &GraphOptions) -> Result<EntityGraph> {
    let started = Instant::now();
    let mut diagnostics = std::mem::take(&mut parsed.diagnostics);

    check_references(&parsed, options.lenient_owner_history, &mut diagnostics)?;

    let (mut elements, order, by_global_id) =
        collect_elements(&parsed, options.duplicate_global_ids, &mut diagnostics);

    let root = match order
        .iter()
        .copied()
        .find(|id| elements.get(id).is_some_and(|e| e.element_type == ElementType::Project))
    {
        Some(id) => id,
        None => {
            diagnostics.push(
                DiagnosticKind::MissingProject,
                None,
                "no IFCPROJECT instance; using a synthetic root",
            );
            elements.insert(SYNTHETIC_ROOT, synthetic_root());
            SYNTHETIC_ROOT
        }
    };

    let mut parents = collect_parents(&parsed, &elements, root, &mut diagnostics);
    let children = resolve_tree(&order, root, &mut parents, &mut diagnostics);

    for (id, node) in elements.iter_mut() {
        node.parent = parents.get(id).copied();
        node.children = children.get(id).cloned().unwrap_or_default();
    }

    attach_property_sets(&parsed, &mut elements);

    tracing::debug!(
        elements = order.len(),
        diagnostics = diagnostics.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "built entity graph"
    );

    Ok(EntityGraph {
        file: parsed,
        elements,
        order,
        by_global_id,
        root,
        diagnostics,
    })
}

fn check_references(file: &ParsedFile, lenient_owner_history: bool, diagnostics: &mut Diagnostics) -> Result<()> {
    for inst in file.iter() {
        let lenient = LENIENT_REFERRERS.iter().any(|t| inst.is_type(t));
        let rooted = lenient_owner_history && inst.get_string(0).is_some_and(|g| g.len() == 22);

        for (index, missing) in inst.references() {
            if file.contains(missing) {
                continue;
            }
            // Attribute 1 of rooted entities is OwnerHistory
            if lenient || (rooted && index == 1) {
                diagnostics.push(
                    DiagnosticKind::DanglingOptionalReference,
                    Some(inst.id),
                    format!("#{} attribute {} references missing #{}", inst.id, index, missing),
                );
            } else {
                return Err(ModelError::DanglingReference {
                    referrer: inst.id,
                    missing,
                });
            }
        }
    }
    Ok(())
}

type ElementMaps = (
    FxHashMap<EntityId, ElementNode>,
    Vec<EntityId>,
    FxHashMap<String, EntityId>,
);

/// Products outside the classification table still become elements when
/// they carry a GlobalId, an object placement and a product shape
fn unlisted_product(inst: &RawInstance, file: &ParsedFile) -> Option<ElementNode> {
    if inst.type_name.to_ascii_uppercase().starts_with("IFCREL") {
        return None;
    }
    if !inst.get_string(0).is_some_and(|g| g.len() == 22) {
        return None;
    }
    let resolves_to = |index: usize, types: &[&str]| {
        inst.get_ref(index)
            .and_then(|id| file.get(id))
            .is_some_and(|target| types.iter().any(|t| target.is_type(t)))
    };
    let placed = resolves_to(5, &["IFCLOCALPLACEMENT", "IFCGRIDPLACEMENT", "IFCLINEARPLACEMENT"]);
    let shaped = resolves_to(6, &["IFCPRODUCTDEFINITIONSHAPE"]);
    if !(placed && shaped) {
        return None;
    }
    ElementNode::with_type(inst, ElementType::Other(inst.type_name.to_ascii_uppercase()))
}

fn collect_elements(
    file: &ParsedFile,
    policy: DuplicateGlobalIdPolicy,
    diagnostics: &mut Diagnostics,
) -> ElementMaps {
    let mut elements = FxHashMap::default();
    let mut order = Vec::new();
    let mut by_global_id: FxHashMap<String, EntityId> = FxHashMap::default();

    let nodes = file
        .iter()
        .filter_map(|inst| ElementNode::from_instance(inst).or_else(|| unlisted_product(inst, file)));
    for node in nodes {
        if let Some(&first) = by_global_id.get(&node.global_id) {
            match policy {
                DuplicateGlobalIdPolicy::KeepBoth => diagnostics.push(
                    DiagnosticKind::DuplicateGlobalId,
                    Some(node.id),
                    format!("GlobalId {} also used by #{}; both kept", node.global_id, first),
                ),
                DuplicateGlobalIdPolicy::KeepFirst => {
                    diagnostics.push(
                        DiagnosticKind::DuplicateGlobalId,
                        Some(node.id),
                        format!("GlobalId {} already used by #{}; #{} dropped", node.global_id, first, node.id),
                    );
                    continue;
                }
            }
        } else {
            by_global_id.insert(node.global_id.clone(), node.id);
        }
        order.push(node.id);
        elements.insert(node.id, node);
    }

    (elements, order, by_global_id)
}

fn synthetic_root() -> ElementNode {
    ElementNode {
        id: SYNTHETIC_ROOT,
        global_id: String::new(),
        name: Some("Unknown Project".to_string()),
        description: None,
        object_type: None,
        element_type: ElementType::Project,
        type_name: "IFCPROJECT".to_string(),
        placement: None,
        representation: None,
        tag: None,
        elevation: None,
        parent: None,
        children: Vec::new(),
        property_sets: PropertySets::default(),
    }
}

/// Relating and related ids of a containment relationship
fn containment_edges(inst: &RawInstance) -> Option<(EntityId, Vec<EntityId>)> {
    if inst.is_type("IFCRELAGGREGATES") || inst.is_type("IFCRELNESTS") {
        // [4]=RelatingObject, [5]=RelatedObjects
        Some((inst.get_ref(4)?, inst.get_ref_list(5)))
    } else if inst.is_type("IFCRELCONTAINEDINSPATIALSTRUCTURE") {
        // [4]=RelatedElements, [5]=RelatingStructure
        Some((inst.get_ref(5)?, inst.get_ref_list(4)))
    } else if inst.is_type("IFCRELVOIDSELEMENT") {
        // [4]=RelatingBuildingElement, [5]=RelatedOpeningElement
        Some((inst.get_ref(4)?, vec![inst.get_ref(5)?]))
    } else {
        None
    }
}

/// Child -> parent, relationships in file order, the last one seen wins
fn collect_parents(
    file: &ParsedFile,
    elements: &FxHashMap<EntityId, ElementNode>,
    root: EntityId,
    diagnostics: &mut Diagnostics,
) -> FxHashMap<EntityId, EntityId> {
    let mut parents = FxHashMap::default();

    for rel in file.iter() {
        let Some((relating, related)) = containment_edges(rel) else {
            continue;
        };
        if !elements.contains_key(&relating) {
            continue;
        }
        for child in related {
            if !elements.contains_key(&child) {
                continue;
            }
            if child == relating || child == root {
                diagnostics.push(
                    DiagnosticKind::ContainmentCycle,
                    Some(child),
                    format!("#{} cannot be contained in #{}; edge dropped", child, relating),
                );
                continue;
            }
            if let Some(previous) = parents.insert(child, relating) {
                if previous != relating {
                    diagnostics.push(
                        DiagnosticKind::ConflictingParent,
                        Some(child),
                        format!(
                            "#{} contained in both #{} and #{}; #{} (from #{}) kept",
                            child, previous, relating, relating, rel.id
                        ),
                    );
                }
            }
        }
    }

    parents
}

/// Make every element reachable from the root: cycles are broken and
/// orphans attached to the root. Returns the children lists.
fn resolve_tree(
    order: &[EntityId],
    root: EntityId,
    parents: &mut FxHashMap<EntityId, EntityId>,
    diagnostics: &mut Diagnostics,
) -> FxHashMap<EntityId, Vec<EntityId>> {
    let position: FxHashMap<EntityId, usize> =
        order.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut children: FxHashMap<EntityId, Vec<EntityId>> = FxHashMap::default();
    for id in order {
        if let Some(&parent) = parents.get(id) {
            children.entry(parent).or_default().push(*id);
        }
    }

    let mut reached = FxHashSet::default();
    mark_reached(root, &children, &mut reached);

    for &id in order {
        if reached.contains(&id) {
            continue;
        }

        // Walk up until the chain ends or closes on itself
        let mut chain = vec![id];
        let mut on_chain: FxHashSet<EntityId> = FxHashSet::default();
        on_chain.insert(id);
        let mut current = id;

        let attach = loop {
            match parents.get(&current).copied() {
                None => {
                    diagnostics.push(
                        DiagnosticKind::Unparented,
                        Some(current),
                        format!("#{} has no containment relation; attached to root", current),
                    );
                    break current;
                }
                Some(parent) if on_chain.contains(&parent) => {
                    let start = chain.iter().position(|c| *c == parent).unwrap_or(0);
                    let breaker = chain[start..]
                        .iter()
                        .copied()
                        .min_by_key(|c| position.get(c).copied().unwrap_or(usize::MAX))
                        .unwrap_or(parent);
                    if let Some(old) = parents.remove(&breaker) {
                        if let Some(list) = children.get_mut(&old) {
                            list.retain(|c| *c != breaker);
                        }
                        diagnostics.push(
                            DiagnosticKind::ContainmentCycle,
                            Some(breaker),
                            format!("containment edge #{} -> #{} closes a cycle; dropped", old, breaker),
                        );
                    }
                    break breaker;
                }
                Some(parent) => {
                    chain.push(parent);
                    on_chain.insert(parent);
                    current = parent;
                }
            }
        };

        parents.insert(attach, root);
        children.entry(root).or_default().push(attach);
        mark_reached(attach, &children, &mut reached);
    }

    children
}

fn mark_reached(
    start: EntityId,
    children: &FxHashMap<EntityId, Vec<EntityId>>,
    reached: &mut FxHashSet<EntityId>,
) {
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if !reached.insert(id) {
            continue;
        }
        if let Some(list) = children.get(&id) {
            stack.extend(list.iter().copied());
        }
    }
}

fn attach_property_sets(file: &ParsedFile, elements: &mut FxHashMap<EntityId, ElementNode>) {
    let mut cache: FxHashMap<EntityId, Option<PropertySet>> = FxHashMap::default();
    let mut read = |id: EntityId| {
        cache
            .entry(id)
            .or_insert_with(|| read_property_set(file, id))
            .clone()
    };

    // Occurrence sets first so they shadow same-named type sets
    for rel in file.instances_of_type("IFCRELDEFINESBYPROPERTIES") {
        // [4]=RelatedObjects, [5]=RelatingPropertyDefinition
        let Some(set) = rel.get_ref(5).and_then(&mut read) else {
            continue;
        };
        for target in rel.get_ref_list(4) {
            if let Some(node) = elements.get_mut(&target) {
                node.property_sets.attach(set.clone());
            }
        }
    }

    for rel in file.instances_of_type("IFCRELDEFINESBYTYPE") {
        // [4]=RelatedObjects, [5]=RelatingType; type [5]=HasPropertySets
        let Some(type_object) = rel.get_ref(5).and_then(|id| file.get(id)) else {
            continue;
        };
        let sets: Vec<PropertySet> = type_object
            .get_ref_list(5)
            .into_iter()
            .filter_map(&mut read)
            .collect();
        for target in rel.get_ref_list(4) {
            if let Some(node) = elements.get_mut(&target) {
                for set in &sets {
                    if !node.property_sets.contains(&set.name) {
                        node.property_sets.attach(set.clone());
                    }
                }
            }
        }
    }
}

impl EntityGraph {
    pub fn root(&self) -> EntityId {
        self.root
    }

    pub fn root_element(&self) -> Option<&ElementNode> {
        self.elements.get(&self.root)
    }

    #[inline]
    pub fn element(&self, id: EntityId) -> Option<&ElementNode> {
        self.elements.get(&id)
    }

    /// Elements in file order
    pub fn elements(&self) -> impl Iterator<Item = &ElementNode> {
        self.order.iter().filter_map(move |id| self.elements.get(id))
    }

    pub fn element_ids(&self) -> &[EntityId] {
        &self.order
    }

    pub fn element_count(&self) -> usize {
        self.order.len()
    }

    pub fn elements_of_type<'a>(&'a self, element_type: &'a ElementType) -> impl Iterator<Item = &'a ElementNode> + 'a {
        self.elements().filter(move |e| &e.element_type == element_type)
    }

    pub fn by_global_id(&self, global_id: &str) -> Option<&ElementNode> {
        self.by_global_id.get(global_id).and_then(|id| self.elements.get(id))
    }

    pub fn children(&self, id: EntityId) -> &[EntityId] {
        self.elements.get(&id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.elements.get(&id).and_then(|e| e.parent)
    }

    /// Parent chain from the direct parent up to the root
    pub fn ancestors(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            // Tree is acyclic after build; the bound only guards corrupted input
            if out.len() > self.elements.len() {
                break;
            }
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    /// Depth-first pre-order walk from the root as `(id, depth)`
    pub fn walk(&self) -> Vec<(EntityId, usize)> {
        let mut out = Vec::with_capacity(self.elements.len());
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            for child in self.children(id).iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        out
    }

    #[inline]
    pub fn instance(&self, id: EntityId) -> Option<&RawInstance> {
        self.file.get(id)
    }

    /// Follow a reference attribute
    pub fn resolve(&self, value: &AttributeValue) -> Option<&RawInstance> {
        value.untyped().as_entity_ref().and_then(|id| self.file.get(id))
    }

    pub fn instances_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a RawInstance> + 'a {
        self.file.instances_of_type(type_name)
    }

    pub fn file(&self) -> &ParsedFile {
        &self.file
    }

    pub fn schema(&self) -> Option<Schema> {
        self.file.schema()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn project_name(&self) -> Option<&str> {
        self.root_element().and_then(label)
    }

    pub fn site_name(&self) -> Option<&str> {
        self.elements_of_type(&ElementType::Site).find_map(label)
    }

    pub fn building_name(&self) -> Option<&str> {
        self.elements_of_type(&ElementType::Building).find_map(label)
    }

    /// Element counts keyed by type display name
    pub fn counts_by_type(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for element in self.elements() {
            *counts.entry(element.element_type.name().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

/// Name, else LongName
fn label(node: &ElementNode) -> Option<&str> {
    node.name
        .as_deref()
        .filter(|n| !n.is_empty())
        .or_else(|| node.tag.as_deref().filter(|n| node.element_type.is_spatial() && !n.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse;
    use crate::properties::PropertyValue;

    fn gid(n: u64) -> String {
        format!("{:0>22}", n)
    }

    fn doc(body: &str) -> ParsedFile {
        parse(&format!(
            "ISO-10303-21;HEADER;FILE_SCHEMA(('IFC4'));ENDSEC;DATA;\n{}\nENDSEC;END-ISO-10303-21;",
            body
        ))
        .unwrap()
    }

    fn product(id: u64, ty: &str, name: &str) -> String {
        format!("#{id}={ty}('{}',$,'{name}',$,$,$,$,$);\n", gid(id))
    }

    fn aggregates(id: u64, relating: u64, related: &[u64]) -> String {
        let list: Vec<String> = related.iter().map(|r| format!("#{}", r)).collect();
        format!("#{id}=IFCRELAGGREGATES('{}',$,$,$,#{relating},({}));\n", gid(id), list.join(","))
    }

    fn contains(id: u64, structure: u64, related: &[u64]) -> String {
        let list: Vec<String> = related.iter().map(|r| format!("#{}", r)).collect();
        format!(
            "#{id}=IFCRELCONTAINEDINSPATIALSTRUCTURE('{}',$,$,$,({}),#{structure});\n",
            gid(id),
            list.join(",")
        )
    }

    fn house() -> String {
        let mut s = String::new();
        s += &format!("#1=IFCPROJECT('{}',$,'Demo',$,$,$,$,$,$);\n", gid(1));
        s += &product(2, "IFCSITE", "Lot");
        s += &product(3, "IFCBUILDING", "House");
        s += &product(4, "IFCBUILDINGSTOREY", "Ground");
        s += &product(10, "IFCWALL", "Wall A");
        s += &product(11, "IFCSLAB", "Floor");
        s += &aggregates(100, 1, &[2]);
        s += &aggregates(101, 2, &[3]);
        s += &aggregates(102, 3, &[4]);
        s += &contains(103, 4, &[10, 11]);
        s
    }

    #[test]
    fn test_union_of_relationship_kinds() {
        let graph = build(doc(&house())).unwrap();
        assert_eq!(graph.root(), 1);
        assert_eq!(graph.element_count(), 6);
        assert_eq!(graph.children(4), &[10, 11]);
        assert_eq!(graph.ancestors(10), vec![4, 3, 2, 1]);
        assert_eq!(graph.project_name(), Some("Demo"));
        assert_eq!(graph.site_name(), Some("Lot"));
        assert_eq!(graph.building_name(), Some("House"));
        assert!(graph.diagnostics().is_empty());

        let walk: Vec<_> = graph.walk().into_iter().map(|(id, _)| id).collect();
        assert_eq!(walk, vec![1, 2, 3, 4, 10, 11]);
    }

    #[test]
    fn test_opening_hangs_under_voided_element() {
        let mut text = house();
        text += &product(12, "IFCOPENINGELEMENT", "Door hole");
        text += &format!("#106=IFCRELVOIDSELEMENT('{}',$,$,$,#10,#12);\n", gid(106));
        let graph = build(doc(&text)).unwrap();
        assert_eq!(graph.parent(12), Some(10));
        assert_eq!(graph.children(10), &[12]);
        assert!(!graph.diagnostics().has(DiagnosticKind::Unparented));
    }

    #[test]
    fn test_unlisted_placed_product_becomes_element() {
        let mut text = house();
        text += "#50=IFCCARTESIANPOINT((0.,0.,0.));\n";
        text += "#51=IFCAXIS2PLACEMENT3D(#50,$,$);\n";
        text += "#52=IFCLOCALPLACEMENT($,#51);\n";
        text += "#53=IFCPRODUCTDEFINITIONSHAPE($,$,());\n";
        text += &format!("#12=IFCSOLARDEVICE('{}',$,'Panel',$,$,#52,#53,$,$);\n", gid(12));
        text += &format!("#13=IFCKERB('{}',$,'Kerb',$,$,#52,$,$,$);\n", gid(13));
        text += &contains(104, 4, &[12, 13]);

        let graph = build(doc(&text)).unwrap();
        let panel = graph.element(12).unwrap();
        assert_eq!(panel.element_type, ElementType::Other("IFCSOLARDEVICE".to_string()));
        assert_eq!(panel.placement, Some(52));
        assert_eq!(panel.representation, Some(53));
        assert_eq!(graph.parent(12), Some(4));
        // no product shape, so not an element
        assert!(graph.element(13).is_none());
        assert!(graph.element(104).is_none());
    }

    #[test]
    fn test_unparented_element_attached_to_root() {
        let text = house() + &product(12, "IFCDOOR", "Loose door");
        let graph = build(doc(&text)).unwrap();
        assert_eq!(graph.parent(12), Some(1));
        assert_eq!(graph.diagnostics().count(DiagnosticKind::Unparented), 1);
    }

    #[test]
    fn test_containment_cycle_is_broken() {
        let mut text = house();
        text += &product(20, "IFCSPACE", "A");
        text += &product(21, "IFCSPACE", "B");
        text += &aggregates(200, 20, &[21]);
        text += &aggregates(201, 21, &[20]);

        let graph = build(doc(&text)).unwrap();
        assert_eq!(graph.diagnostics().count(DiagnosticKind::ContainmentCycle), 1);
        assert_eq!(graph.parent(20), Some(1));
        assert_eq!(graph.parent(21), Some(20));

        let walked: FxHashSet<_> = graph.walk().into_iter().map(|(id, _)| id).collect();
        assert!(graph.element_ids().iter().all(|id| walked.contains(id)));
    }

    #[test]
    fn test_last_parent_wins() {
        let mut text = house();
        text += &product(5, "IFCBUILDINGSTOREY", "Upper");
        text += &aggregates(104, 3, &[5]);
        text += &contains(105, 5, &[10]);

        let graph = build(doc(&text)).unwrap();
        assert_eq!(graph.parent(10), Some(5));
        assert_eq!(graph.children(4), &[11]);
        assert_eq!(graph.diagnostics().count(DiagnosticKind::ConflictingParent), 1);
    }

    #[test]
    fn test_missing_project_uses_synthetic_root() {
        let text = product(2, "IFCSITE", "Lot") + &product(10, "IFCWALL", "W") + &contains(50, 2, &[10]);
        let graph = build(doc(&text)).unwrap();
        assert_eq!(graph.root(), SYNTHETIC_ROOT);
        assert_eq!(graph.parent(2), Some(SYNTHETIC_ROOT));
        assert_eq!(graph.element_count(), 2);
        assert!(graph.diagnostics().has(DiagnosticKind::MissingProject));
    }

    #[test]
    fn test_dangling_reference_is_fatal() {
        let text = house() + "#30=IFCLOCALPLACEMENT($,#999);\n";
        let err = build(doc(&text)).unwrap_err();
        assert_eq!(err, ModelError::DanglingReference { referrer: 30, missing: 999 });
    }

    #[test]
    fn test_dangling_owner_history_is_fatal_by_default() {
        let text = house() + &format!("#12=IFCWALL('{}',#999,'W',$,$,$,$,$);\n", gid(12));
        let err = build(doc(&text)).unwrap_err();
        assert_eq!(err, ModelError::DanglingReference { referrer: 12, missing: 999 });
    }

    #[test]
    fn test_dangling_owner_history_tolerated_when_lenient() {
        let text = format!("#1=IFCPROJECT('{}',#77,'Demo',$,$,$,$,$,$);\n", gid(1));
        let options = GraphOptions {
            lenient_owner_history: true,
            ..GraphOptions::default()
        };
        let graph = build_with(doc(&text), &options).unwrap();
        assert!(graph.diagnostics().has(DiagnosticKind::DanglingOptionalReference));

        // Only attribute 1 is relaxed
        let text = format!("#1=IFCPROJECT('{}',$,'Demo',$,$,$,$,$,#77);\n", gid(1));
        assert!(build_with(doc(&text), &options).is_err());
    }

    #[test]
    fn test_duplicate_global_ids() {
        let text = house() + &format!("#12=IFCWALL('{}',$,'Copy',$,$,$,$,$);\n", gid(10)) + &contains(106, 4, &[12]);

        let graph = build(doc(&text)).unwrap();
        assert!(graph.element(12).is_some());
        assert_eq!(graph.diagnostics().count(DiagnosticKind::DuplicateGlobalId), 1);
        assert_eq!(graph.by_global_id(&gid(10)).map(|e| e.id), Some(10));

        let options = GraphOptions {
            duplicate_global_ids: DuplicateGlobalIdPolicy::KeepFirst,
            ..GraphOptions::default()
        };
        let graph = build_with(doc(&text), &options).unwrap();
        assert!(graph.element(12).is_none());
        assert_eq!(graph.children(4), &[10, 11]);
        assert_eq!(graph.diagnostics().count(DiagnosticKind::DuplicateGlobalId), 1);
    }

    #[test]
    fn test_property_sets_in_first_seen_order() {
        let mut text = house();
        text += "#300=IFCPROPERTYSINGLEVALUE('IsExternal',$,IFCBOOLEAN(.T.),$);\n";
        text += "#301=IFCPROPERTYSINGLEVALUE('Width',$,IFCLENGTHMEASURE(0.2),$);\n";
        text += &format!("#302=IFCPROPERTYSET('{}',$,'Pset_WallCommon',$,(#300));\n", gid(302));
        text += &format!("#303=IFCPROPERTYSET('{}',$,'Custom',$,(#301));\n", gid(303));
        text += &format!("#304=IFCRELDEFINESBYPROPERTIES('{}',$,$,$,(#10),#303);\n", gid(304));
        text += &format!("#305=IFCRELDEFINESBYPROPERTIES('{}',$,$,$,(#10,#11),#302);\n", gid(305));

        let graph = build(doc(&text)).unwrap();
        let wall = graph.element(10).unwrap();
        let names: Vec<_> = wall.property_sets.names().collect();
        assert_eq!(names, vec!["Custom", "Pset_WallCommon"]);
        assert_eq!(
            wall.property_sets.value("Pset_WallCommon", "IsExternal"),
            Some(&PropertyValue::Boolean(Some(true)))
        );
        assert_eq!(
            wall.property_sets.value("Custom", "Width").and_then(|v| v.as_f64()),
            Some(0.2)
        );
        assert_eq!(graph.element(11).unwrap().property_sets.len(), 1);
    }

    #[test]
    fn test_type_property_sets() {
        let mut text = house();
        text += "#300=IFCPROPERTYSINGLEVALUE('FireRating',$,IFCLABEL('EI60'),$);\n";
        text += &format!("#301=IFCPROPERTYSET('{}',$,'Pset_WallCommon',$,(#300));\n", gid(301));
        text += &format!("#302=IFCWALLTYPE('{}',$,'Basic',$,$,(#301),$,$,$,.STANDARD.);\n", gid(302));
        text += &format!("#303=IFCRELDEFINESBYTYPE('{}',$,$,$,(#10),#302);\n", gid(303));

        let graph = build(doc(&text)).unwrap();
        let wall = graph.element(10).unwrap();
        assert_eq!(
            wall.property_sets.value("Pset_WallCommon", "FireRating").and_then(|v| v.as_text()),
            Some("EI60")
        );
    }

    #[test]
    fn test_deep_hierarchy_does_not_recurse() {
        let depth = 5_000u64;
        let mut text = format!("#1=IFCPROJECT('{}',$,'Deep',$,$,$,$,$,$);\n", gid(1));
        for i in 0..depth {
            let id = 10 + i;
            let parent = if i == 0 { 1 } else { id - 1 };
            text += &product(id, "IFCSPACE", "S");
            text += &aggregates(100_000 + i, parent, &[id]);
        }
        let graph = build(doc(&text)).unwrap();
        let walk = graph.walk();
        assert_eq!(walk.len() as u64, depth + 1);
        assert_eq!(walk.last().map(|(_, d)| *d as u64), Some(depth));
        assert_eq!(graph.ancestors(10 + depth - 1).len() as u64, depth);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("keep-first".parse(), Ok(DuplicateGlobalIdPolicy::KeepFirst));
        assert_eq!("KEEP_BOTH".parse(), Ok(DuplicateGlobalIdPolicy::KeepBoth));
        assert!("drop".parse::<DuplicateGlobalIdPolicy>().is_err());
    }
}
