// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # bimkit engine
//!
//! Ties the pipeline together for a viewer: a [`ModelRegistry`] holding any
//! number of loaded models, background loading with progress through
//! [`Loader`], an orbit [`Camera`], ray picking across models, and
//! per-element visibility and colour [`Overrides`].
//!
//! ```no_run
//! use bimkit_engine::{Camera, ModelRegistry};
//!
//! let text = std::fs::read_to_string("model.ifc").unwrap();
//! let mut registry = ModelRegistry::new();
//! let summary = registry.load("arch", "model.ifc", &text).unwrap();
//! println!("{} elements", summary.element_count);
//!
//! let mut camera = Camera::default();
//! if let Some(bounds) = registry.combined_bounds() {
//!     camera.fit_to_bounds(&bounds);
//! }
//! if let Some(hit) = registry.pick_screen(&camera, 0.5, 0.5) {
//!     println!("picked {}", hit.key);
//! }
//! ```

pub mod camera;
pub mod config;
pub mod loader;
pub mod overrides;
pub mod registry;
pub mod summary;
pub mod telemetry;

pub use camera::Camera;
pub use config::Config;
pub use loader::{LoadHandle, LoadStage, Loader};
pub use overrides::Overrides;
pub use registry::{
    ModelListing, ModelRegistry, ModelState, PickHit, RegisteredModel, RenderBuffers, RenderSlice, SharedRegistry,
};
pub use summary::{ElementView, ModelSummary};

pub use bimkit_core::{ElementType, EntityId, ModelError};
pub use bimkit_geometry::BoundingBox;
pub use bimkit_spatial::{Frustum, LeafKey, ModelId, Ray};
