// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Visibility and colour overrides, kept apart from the immutable graph.
//!
//! Precedence for both: per-element override, then per-type override, then
//! the default (visible, palette colour).

use bimkit_core::ElementType;
use bimkit_geometry::color_for_element_type;
use bimkit_spatial::{LeafKey, ModelId};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct Overrides {
    element_visible: FxHashMap<LeafKey, bool>,
    type_visible: FxHashMap<ElementType, bool>,
    element_color: FxHashMap<LeafKey, [f32; 4]>,
    type_color: FxHashMap<ElementType, [f32; 4]>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_element_visible(&mut self, key: LeafKey, visible: bool) {
        self.element_visible.insert(key, visible);
    }

    pub fn set_type_visible(&mut self, element_type: ElementType, visible: bool) {
        self.type_visible.insert(element_type, visible);
    }

    pub fn set_element_color(&mut self, key: LeafKey, color: [f32; 4]) {
        self.element_color.insert(key, color);
    }

    pub fn set_type_color(&mut self, element_type: ElementType, color: [f32; 4]) {
        self.type_color.insert(element_type, color);
    }

    /// Drop both overrides of one element
    pub fn clear_element(&mut self, key: &LeafKey) {
        self.element_visible.remove(key);
        self.element_color.remove(key);
    }

    /// Drop both overrides of one type
    pub fn clear_type(&mut self, element_type: &ElementType) {
        self.type_visible.remove(element_type);
        self.type_color.remove(element_type);
    }

    /// Drop every per-element override of a model
    pub fn clear_model(&mut self, model_id: &ModelId) {
        self.element_visible.retain(|k, _| &k.model_id != model_id);
        self.element_color.retain(|k, _| &k.model_id != model_id);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.element_visible.is_empty()
            && self.type_visible.is_empty()
            && self.element_color.is_empty()
            && self.type_color.is_empty()
    }

    pub fn is_visible(&self, key: &LeafKey, element_type: &ElementType) -> bool {
        self.element_visible
            .get(key)
            .or_else(|| self.type_visible.get(element_type))
            .copied()
            .unwrap_or(true)
    }

    pub fn color(&self, key: &LeafKey, element_type: &ElementType) -> [f32; 4] {
        self.element_color
            .get(key)
            .or_else(|| self.type_color.get(element_type))
            .copied()
            .unwrap_or_else(|| color_for_element_type(element_type))
    }
}
