// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model Registry - every loaded model plus selection and overrides
//!
//! The registry is a plain value; share it as a [`SharedRegistry`] when more
//! than one task needs it. Mutations go through the write lock, so a reader
//! sees a model either fully present or fully gone.

use crate::camera::Camera;
use crate::config::Config;
use crate::loader::build_model;
use crate::overrides::Overrides;
use crate::summary::{ElementView, ModelSummary};
use bimkit_core::{Diagnostics, ElementType, EntityGraph, ModelError};
use bimkit_geometry::{BoundingBox, ModelMesh, HIGHLIGHT};
use bimkit_spatial::{pick_nearest, Frustum, Hit, LeafKey, ModelId, PickTarget, Ray, SpatialIndex};
use nalgebra::Matrix4;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type Result<T, E = ModelError> = std::result::Result<T, E>;

/// Registry behind a read/write lock
pub type SharedRegistry = Arc<RwLock<ModelRegistry>>;

/// Closest element under a ray
pub type PickHit = Hit;

/// One loaded model. Everything but `visible` and `transform` is fixed at load.
#[derive(Debug, Clone)]
pub struct RegisteredModel {
    pub model_id: ModelId,
    pub display_name: String,
    pub visible: bool,
    /// Model to world
    pub transform: Matrix4<f64>,
    pub graph: EntityGraph,
    pub mesh: ModelMesh,
    /// Metres per model length unit baked into `mesh`
    pub unit_scale: f64,
    pub index: SpatialIndex,
    pub summary: ModelSummary,
    pub diagnostics: Diagnostics,
}

impl RegisteredModel {
    fn key(&self, element_id: bimkit_core::EntityId) -> LeafKey {
        LeafKey::new(self.model_id.clone(), element_id)
    }

    /// World-space bounds of one element
    pub fn element_bounds(&self, element_id: bimkit_core::EntityId) -> Option<BoundingBox> {
        let bounds = self.mesh.slice(element_id)?.bounds;
        Some(if self.transform.is_identity(0.0) {
            bounds
        } else {
            bounds.transformed(&self.transform)
        })
    }

    /// World-space bounds of the whole model
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.mesh.bounds().map(|b| b.transformed(&self.transform))
    }

    fn element_type(&self, element_id: bimkit_core::EntityId) -> Option<&ElementType> {
        self.graph.element(element_id).map(|e| &e.element_type)
    }
}

/// Lifecycle state of a model id
#[derive(Debug, Clone, PartialEq)]
pub enum ModelState {
    Unloaded,
    Loading,
    Loaded { visible: bool, is_primary: bool },
    /// Last load failed; the id is free again
    FailedToLoad(ModelError),
}

/// Row of [`ModelRegistry::list`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelListing {
    pub model_id: ModelId,
    pub display_name: String,
    pub visible: bool,
    pub is_primary: bool,
    pub element_count: usize,
    pub triangle_count: usize,
}

/// Per-element draw state for a renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderSlice {
    pub element_id: bimkit_core::EntityId,
    pub triangle_start: u32,
    pub triangle_count: u32,
    pub visible: bool,
    pub color: [f32; 4],
}

/// Flattened buffers of one model in model space
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderBuffers {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub indices: Vec<u32>,
    pub slices: Vec<RenderSlice>,
    /// Model to world, column-major
    pub transform: [f32; 16],
}

#[derive(Debug, Default)]
pub struct ModelRegistry {
    config: Config,
    models: BTreeMap<ModelId, RegisteredModel>,
    loading: FxHashSet<ModelId>,
    failed: FxHashMap<ModelId, ModelError>,
    primary: Option<ModelId>,
    selection: Option<LeafKey>,
    overrides: Overrides,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn model(&self, id: &str) -> Result<&RegisteredModel> {
        self.models.get(id).ok_or_else(|| ModelError::NotFound(id.to_string()))
    }

    fn model_mut(&mut self, id: &str) -> Result<&mut RegisteredModel> {
        self.models.get_mut(id).ok_or_else(|| ModelError::NotFound(id.to_string()))
    }

    // Load lifecycle

    /// Mark `id` as loading. Fails if it is loaded or already loading.
    pub(crate) fn reserve(&mut self, id: &ModelId) -> Result<()> {
        if self.models.contains_key(id) || self.loading.contains(id) {
            return Err(ModelError::DuplicateModelId(id.to_string()));
        }
        self.loading.insert(id.clone());
        self.failed.remove(id);
        Ok(())
    }

    pub(crate) fn release(&mut self, id: &ModelId) {
        self.loading.remove(id);
    }

    /// Release a reservation after an error, remembering fatal ones
    pub(crate) fn fail(&mut self, id: &ModelId, error: &ModelError) {
        self.release(id);
        if error.is_fatal_to_load() {
            tracing::warn!(model_id = %id, %error, "model failed to load");
            self.failed.insert(id.clone(), error.clone());
        }
    }

    /// Insert a finished model. The first model into an empty registry
    /// without a primary becomes primary.
    pub(crate) fn commit(&mut self, model: RegisteredModel) -> ModelSummary {
        let id = model.model_id.clone();
        self.release(&id);
        if self.models.is_empty() && self.primary.is_none() {
            self.primary = Some(id.clone());
        }
        let summary = model.summary.clone();
        tracing::info!(
            model_id = %id,
            elements = summary.element_count,
            triangles = summary.triangle_count,
            diagnostics = summary.diagnostic_count,
            "model loaded"
        );
        self.models.insert(id, model);
        summary
    }

    /// Load a document synchronously
    pub fn load(&mut self, id: impl Into<ModelId>, name: &str, text: &str) -> Result<ModelSummary> {
        let id = id.into();
        self.reserve(&id)?;
        match build_model(&id, name, text, &self.config, |_| true) {
            Ok(model) => Ok(self.commit(model)),
            Err(error) => {
                self.fail(&id, &error);
                Err(error)
            }
        }
    }

    /// Remove a model with its graph, mesh and index
    pub fn unload(&mut self, id: &str) -> Result<()> {
        let model = self.models.remove(id).ok_or_else(|| ModelError::NotFound(id.to_string()))?;
        if self.primary.as_ref() == Some(&model.model_id) {
            self.primary = None;
        }
        if self.selection.as_ref().is_some_and(|k| k.model_id == model.model_id) {
            self.selection = None;
        }
        self.overrides.clear_model(&model.model_id);
        tracing::info!(model_id = %model.model_id, "model unloaded");
        Ok(())
    }

    /// Unload everything and reset selection and overrides
    pub fn clear(&mut self) {
        let count = self.models.len();
        self.models.clear();
        self.failed.clear();
        self.primary = None;
        self.selection = None;
        self.overrides.clear();
        tracing::info!(models = count, "registry cleared");
    }

    pub fn state(&self, id: &str) -> ModelState {
        if let Some(model) = self.models.get(id) {
            ModelState::Loaded {
                visible: model.visible,
                is_primary: self.primary.as_ref().map(ModelId::as_str) == Some(id),
            }
        } else if self.loading.contains(id) {
            ModelState::Loading
        } else if let Some(error) = self.failed.get(id) {
            ModelState::FailedToLoad(error.clone())
        } else {
            ModelState::Unloaded
        }
    }

    // Model flags

    pub fn set_visible(&mut self, id: &str, visible: bool) -> Result<()> {
        self.model_mut(id)?.visible = visible;
        Ok(())
    }

    pub fn set_primary(&mut self, id: &str) -> Result<()> {
        let model_id = self.model(id)?.model_id.clone();
        self.primary = Some(model_id);
        Ok(())
    }

    pub fn primary(&self) -> Option<&ModelId> {
        self.primary.as_ref()
    }

    pub fn set_transform(&mut self, id: &str, transform: Matrix4<f64>) -> Result<()> {
        self.model_mut(id)?.transform = transform;
        Ok(())
    }

    // Queries

    pub fn get(&self, id: &str) -> Option<&RegisteredModel> {
        self.models.get(id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Loaded models sorted by id
    pub fn list(&self) -> Vec<ModelListing> {
        self.models
            .values()
            .map(|m| ModelListing {
                model_id: m.model_id.clone(),
                display_name: m.display_name.clone(),
                visible: m.visible,
                is_primary: self.primary.as_ref() == Some(&m.model_id),
                element_count: m.summary.element_count,
                triangle_count: m.summary.triangle_count,
            })
            .collect()
    }

    pub fn iter_visible(&self) -> impl Iterator<Item = &RegisteredModel> {
        self.models.values().filter(|m| m.visible)
    }

    pub fn summary(&self, id: &str) -> Result<&ModelSummary> {
        Ok(&self.model(id)?.summary)
    }

    pub fn diagnostics(&self, id: &str) -> Result<&Diagnostics> {
        Ok(&self.model(id)?.diagnostics)
    }

    /// Union of the world bounds of visible models
    pub fn combined_bounds(&self) -> Option<BoundingBox> {
        self.iter_visible()
            .filter_map(RegisteredModel::bounds)
            .reduce(|a, b| a.union(&b))
    }

    fn is_element_visible(&self, model: &RegisteredModel, key: &LeafKey) -> bool {
        match model.element_type(key.element_id) {
            Some(element_type) => self.overrides.is_visible(key, element_type),
            None => false,
        }
    }

    /// Closest visible element under a world-space ray
    pub fn pick(&self, ray: &Ray) -> Option<PickHit> {
        let targets = self.iter_visible().map(|m| PickTarget {
            index: &m.index,
            mesh: &m.mesh,
            transform: &m.transform,
        });
        pick_nearest(ray, targets, |key| {
            self.models
                .get(&key.model_id)
                .is_some_and(|m| self.is_element_visible(m, key))
        })
    }

    /// [`pick`](Self::pick) through a screen point in `[0, 1]` coordinates
    pub fn pick_screen(&self, camera: &Camera, x: f64, y: f64) -> Option<PickHit> {
        self.pick(&camera.screen_to_ray(x, y)?)
    }

    /// Visible elements whose boxes touch the frustum
    pub fn elements_in_frustum(&self, frustum: &Frustum) -> Vec<LeafKey> {
        let mut out = Vec::new();
        for model in self.iter_visible() {
            let local = if model.transform.is_identity(0.0) {
                *frustum
            } else {
                frustum.transformed(&model.transform)
            };
            out.extend(
                model
                    .index
                    .elements_in_frustum(&local)
                    .into_iter()
                    .filter(|key| self.is_element_visible(model, key)),
            );
        }
        out
    }

    /// Elements of one type across every loaded model, in element order
    pub fn elements_by_type(&self, element_type: &ElementType) -> Vec<LeafKey> {
        self.models
            .values()
            .flat_map(move |m| m.graph.elements_of_type(element_type).map(move |e| m.key(e.id)))
            .collect()
    }

    /// Case-insensitive substring search over name, GlobalId and numeric id
    pub fn search(&self, query: &str) -> Vec<LeafKey> {
        let needle = query.trim().to_lowercase();
        let needle = needle.as_str();
        self.models
            .values()
            .flat_map(move |m| {
                m.graph
                    .elements()
                    .filter(move |e| e.matches_query(needle))
                    .map(move |e| m.key(e.id))
            })
            .collect()
    }

    pub fn element(&self, key: &LeafKey) -> Option<ElementView> {
        let model = self.models.get(&key.model_id)?;
        let element = model.graph.element(key.element_id)?;
        Some(ElementView::new(
            model.model_id.clone(),
            element,
            model.element_bounds(key.element_id),
        ))
    }

    // Selection and overrides

    /// Select an element; `None` clears. Unknown keys are rejected.
    pub fn set_selection(&mut self, key: Option<LeafKey>) -> Result<()> {
        if let Some(key) = &key {
            let model = self.model(key.model_id.as_str())?;
            if model.graph.element(key.element_id).is_none() {
                return Err(ModelError::NotFound(key.to_string()));
            }
        }
        self.selection = key;
        Ok(())
    }

    pub fn selection(&self) -> Option<&LeafKey> {
        self.selection.as_ref()
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    pub fn overrides_mut(&mut self) -> &mut Overrides {
        &mut self.overrides
    }

    /// Buffers with per-element visibility and colour resolved.
    /// The selected element is drawn in the highlight colour.
    pub fn render_buffers(&self, id: &str) -> Result<RenderBuffers> {
        let model = self.model(id)?;
        let slices = model
            .mesh
            .slices
            .iter()
            .map(|slice| {
                let key = model.key(slice.element_id);
                let (visible, mut color) = match model.element_type(slice.element_id) {
                    Some(t) => (self.overrides.is_visible(&key, t), self.overrides.color(&key, t)),
                    None => (false, bimkit_geometry::color::DEFAULT_COLOR),
                };
                if self.selection.as_ref() == Some(&key) {
                    color = HIGHLIGHT;
                }
                RenderSlice {
                    element_id: slice.element_id,
                    triangle_start: slice.triangle_start,
                    triangle_count: slice.triangle_count,
                    visible: visible && model.visible,
                    color,
                }
            })
            .collect();

        let mut transform = [0.0f32; 16];
        for (out, v) in transform.iter_mut().zip(model.transform.iter()) {
            *out = *v as f32;
        }

        Ok(RenderBuffers {
            positions: model.mesh.positions.clone(),
            normals: model.mesh.normals.clone(),
            indices: model.mesh.indices.clone(),
            slices,
            transform,
        })
    }
}
