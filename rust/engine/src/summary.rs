// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Serializable projections of a loaded model.

use bimkit_core::{ElementNode, EntityGraph, EntityId, PropertySets};
use bimkit_geometry::{BoundingBox, ModelGeometry};
use bimkit_spatial::ModelId;
use serde::Serialize;
use std::collections::BTreeMap;

/// Overview of one model, computed once at load
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub project_name: String,
    pub building_name: String,
    pub site_name: String,
    pub schema: Option<String>,
    pub element_count: usize,
    pub counts_by_type: BTreeMap<String, usize>,
    pub triangle_count: usize,
    /// Model-space bounds, before any registry transform
    pub bounds: Option<BoundingBox>,
    pub diagnostic_count: usize,
}

impl ModelSummary {
    pub fn new(graph: &EntityGraph, geometry: &ModelGeometry, diagnostic_count: usize) -> Self {
        Self {
            project_name: graph.project_name().unwrap_or("Unknown Project").to_string(),
            building_name: graph.building_name().unwrap_or("Unknown Building").to_string(),
            site_name: graph.site_name().unwrap_or("Unknown Site").to_string(),
            schema: graph.schema().map(|s| s.as_str().to_string()),
            element_count: graph.element_count(),
            counts_by_type: graph.counts_by_type(),
            triangle_count: geometry.mesh.triangle_count(),
            bounds: geometry.mesh.bounds(),
            diagnostic_count,
        }
    }
}

/// Inspector projection of one element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementView {
    pub model_id: ModelId,
    pub id: EntityId,
    pub global_id: String,
    pub element_type: String,
    pub type_name: String,
    pub name: String,
    pub description: Option<String>,
    pub object_type: Option<String>,
    pub tag: Option<String>,
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
    /// World-space bounds
    pub bounds: Option<BoundingBox>,
    pub property_sets: PropertySets,
}

impl ElementView {
    pub fn new(model_id: ModelId, element: &ElementNode, bounds: Option<BoundingBox>) -> Self {
        Self {
            model_id,
            id: element.id,
            global_id: element.global_id.clone(),
            element_type: element.element_type.to_string(),
            type_name: element.type_name.clone(),
            name: element.display_name(),
            description: element.description.clone(),
            object_type: element.object_type.clone(),
            tag: element.tag.clone(),
            parent: element.parent,
            children: element.children.clone(),
            bounds,
            property_sets: element.property_sets.clone(),
        }
    }
}
