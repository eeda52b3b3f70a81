// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry Router - dispatch of representation items to processors
//!
//! Follows `element -> IfcProductDefinitionShape -> IfcShapeRepresentation ->
//! items`, sends each item to the processor registered for its type, applies
//! the element placement and aggregates every element into one [`ModelMesh`].

use crate::bounds::BoundingBox;
use crate::brep::{FaceBasedSurfaceModelProcessor, FacetedBrepProcessor, ShellBasedSurfaceModelProcessor};
use crate::error::{Error, Result};
use crate::extrusion::ExtrudedAreaSolidProcessor;
use crate::mesh::{Mesh, ModelMesh};
use crate::placement::{axis2_placement, fetch, required_ref, transformation_operator, PlacementResolver};
use crate::tessellation::TriangulatedFaceSetProcessor;
use crate::units::length_unit_scale;
use bimkit_core::{
    DiagnosticKind, Diagnostics, ElementNode, ElementType, EntityGraph, EntityId, ParsedFile, RawInstance,
};
use nalgebra::{Matrix4, Point3};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Instant;

/// Nested mapped items deeper than this are treated as malformed
const MAX_MAPPING_DEPTH: usize = 8;

/// Representation identifiers that carry body geometry
const BODY_IDENTIFIERS: &[&str] = &["Body", "Facetation"];

/// Geometry processor trait.
/// Each processor handles one family of representation items and returns a
/// mesh in the item's own coordinate system.
pub trait GeometryProcessor: Send + Sync {
    fn process(&self, item: &RawInstance, file: &ParsedFile, options: &RouterOptions) -> Result<Mesh>;

    /// Upper-case type names this processor accepts
    fn supported_types(&self) -> &'static [&'static str];
}

/// Extraction settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouterOptions {
    /// Segments used to approximate circles
    pub circle_segments: usize,
    /// Extract elements on the rayon pool
    pub parallel: bool,
    /// Convert model length units to metres
    pub apply_unit_scale: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            circle_segments: 24,
            parallel: true,
            apply_unit_scale: true,
        }
    }
}

/// Geometry of one element
#[derive(Debug, Clone)]
pub struct ExtractResult {
    pub element_id: EntityId,
    /// World-space mesh; `None` when the element has no renderable geometry
    pub mesh: Option<Mesh>,
    /// Mesh bounds, or a degenerate box at the placement origin
    pub bounds: BoundingBox,
    pub diagnostics: Diagnostics,
}

/// Aggregated geometry of a whole model
#[derive(Debug, Clone, Default)]
pub struct ModelGeometry {
    pub mesh: ModelMesh,
    pub diagnostics: Diagnostics,
    /// Metres per model length unit that was applied
    pub unit_scale: f64,
}

/// Geometry router - routes representation items to processors
pub struct GeometryRouter {
    processors: FxHashMap<&'static str, Arc<dyn GeometryProcessor>>,
    options: RouterOptions,
}

impl GeometryRouter {
    /// Create new router with default processors
    pub fn new() -> Self {
        Self::with_options(RouterOptions::default())
    }

    pub fn with_options(options: RouterOptions) -> Self {
        let mut router = Self {
            processors: FxHashMap::default(),
            options,
        };
        router.register(Box::new(ExtrudedAreaSolidProcessor));
        router.register(Box::new(FacetedBrepProcessor::default()));
        router.register(Box::new(FaceBasedSurfaceModelProcessor::default()));
        router.register(Box::new(ShellBasedSurfaceModelProcessor::default()));
        router.register(Box::new(TriangulatedFaceSetProcessor));
        router
    }

    /// Register a geometry processor, replacing any earlier one for the same types
    pub fn register(&mut self, processor: Box<dyn GeometryProcessor>) {
        let processor: Arc<dyn GeometryProcessor> = Arc::from(processor);
        for type_name in processor.supported_types() {
            self.processors.insert(type_name, Arc::clone(&processor));
        }
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    pub fn supports(&self, type_name: &str) -> bool {
        type_name == "IFCMAPPEDITEM" || self.processors.contains_key(type_name)
    }

    /// Mesh of one representation item in its own coordinates.
    /// Unknown item kinds yield `Ok(None)`.
    pub fn item_mesh(&self, item_id: EntityId, file: &ParsedFile) -> Result<Option<Mesh>> {
        self.item_mesh_at_depth(item_id, file, 0)
    }

    fn item_mesh_at_depth(&self, item_id: EntityId, file: &ParsedFile, depth: usize) -> Result<Option<Mesh>> {
        let item = file.get(item_id).ok_or(Error::MissingEntity(item_id))?;

        if item.is_type("IFCMAPPEDITEM") {
            return self.mapped_item(item, file, depth);
        }

        match self.processors.get(item.type_name.as_str()) {
            Some(processor) => processor.process(item, file, &self.options).map(Some),
            None => {
                tracing::trace!(item = item_id, kind = %item.type_name, "no processor for item");
                Ok(None)
            }
        }
    }

    /// `IFCMAPPEDITEM`: 0 = MappingSource (`IFCREPRESENTATIONMAP`), 1 = MappingTarget.
    /// The source geometry is placed by `target * origin`.
    fn mapped_item(&self, item: &RawInstance, file: &ParsedFile, depth: usize) -> Result<Option<Mesh>> {
        if depth >= MAX_MAPPING_DEPTH {
            return Err(Error::geometry(format!("#{} nests mapped items too deeply", item.id)));
        }
        let source = fetch(file, required_ref(item, 0, "mapping source")?, "IFCREPRESENTATIONMAP")?;
        let origin = match source.get_ref(0) {
            Some(id) => axis2_placement(file, id)?,
            None => Matrix4::identity(),
        };
        let target = match item.get_ref(1) {
            Some(id) => transformation_operator(file, id)?,
            None => Matrix4::identity(),
        };

        let representation = fetch(file, required_ref(source, 1, "mapped representation")?, "IFCSHAPEREPRESENTATION")?;
        let mesh = self.items_mesh(representation, file, depth + 1)?;
        Ok(mesh.map(|mut mesh| {
            mesh.transform(&(target * origin));
            mesh
        }))
    }

    fn items_mesh(&self, representation: &RawInstance, file: &ParsedFile, depth: usize) -> Result<Option<Mesh>> {
        let mut combined: Option<Mesh> = None;
        for item_id in representation.get_ref_list(3) {
            if let Some(mesh) = self.item_mesh_at_depth(item_id, file, depth)? {
                combined.get_or_insert_with(Mesh::new).merge(&mesh);
            }
        }
        Ok(combined)
    }

    /// Body mesh of an `IFCPRODUCTDEFINITIONSHAPE` in element coordinates.
    /// Representations other than `Body`/`Facetation` (or unnamed) are skipped.
    pub fn representation_mesh(&self, shape_id: EntityId, file: &ParsedFile) -> Result<Option<Mesh>> {
        let shape = fetch(file, shape_id, "IFCPRODUCTDEFINITIONSHAPE")?;
        let mut combined: Option<Mesh> = None;

        for rep_id in shape.get_ref_list(2) {
            let Some(representation) = file.get(rep_id) else {
                continue;
            };
            if !representation.is_type("IFCSHAPEREPRESENTATION") {
                continue;
            }
            let is_body = match representation.get_string(1) {
                None => true,
                Some(identifier) => BODY_IDENTIFIERS.contains(&identifier),
            };
            if !is_body {
                continue;
            }
            if let Some(mesh) = self.items_mesh(representation, file, 0)? {
                combined.get_or_insert_with(Mesh::new).merge(&mesh);
            }
        }
        Ok(combined.filter(|m| !m.is_empty()))
    }

    /// Extract one element in world coordinates
    pub fn extract(&self, element: &ElementNode, graph: &EntityGraph) -> ExtractResult {
        let file = graph.file();
        let world = match element.placement {
            Some(placement) => PlacementResolver::new(file).resolve(placement),
            None => Ok(Matrix4::identity()),
        };
        self.extract_placed(element, file, &world, self.unit_scale(file))
    }

    fn unit_scale(&self, file: &ParsedFile) -> f64 {
        if self.options.apply_unit_scale {
            length_unit_scale(file)
        } else {
            1.0
        }
    }

    fn extract_placed(
        &self,
        element: &ElementNode,
        file: &ParsedFile,
        world: &Result<Matrix4<f64>>,
        unit_scale: f64,
    ) -> ExtractResult {
        let mut diagnostics = Diagnostics::new();
        let mut fail = |reason: &Error| {
            tracing::trace!(element = element.id, %reason, "geometry failed");
            diagnostics.push(
                DiagnosticKind::GeometryFailed,
                Some(element.id),
                format!("{} #{}: {}", element.type_name, element.id, reason),
            );
        };

        let scale = Matrix4::new_scaling(unit_scale);
        let world = match world {
            Ok(m) => scale * m,
            Err(e) => {
                fail(e);
                scale
            }
        };
        let origin = world.transform_point(&Point3::origin());

        let mesh = match element.representation.map(|rep| self.representation_mesh(rep, file)) {
            Some(Ok(Some(mut mesh))) => {
                mesh.transform(&world);
                if mesh.is_valid() {
                    Some(mesh)
                } else {
                    fail(&Error::geometry("non-finite vertex data"));
                    None
                }
            }
            Some(Err(e)) => {
                fail(&e);
                None
            }
            Some(Ok(None)) | None => None,
        };

        let bounds = mesh
            .as_ref()
            .and_then(Mesh::bounds)
            .unwrap_or_else(|| BoundingBox::from_point(origin));

        // Openings only subtract volume; they are located but never drawn
        let mesh = mesh.filter(|_| element.element_type != ElementType::Opening);

        ExtractResult {
            element_id: element.id,
            mesh,
            bounds,
            diagnostics,
        }
    }

    /// Extract every element of a graph into one mesh, in element order.
    ///
    /// Placements are resolved up front so the per-element work can run on
    /// the rayon pool; the concatenation order never depends on scheduling.
    pub fn extract_model(&self, graph: &EntityGraph) -> ModelGeometry {
        let started = Instant::now();
        let file = graph.file();
        let unit_scale = self.unit_scale(file);

        let mut resolver = PlacementResolver::new(file);
        let placed: Vec<(&ElementNode, Result<Matrix4<f64>>)> = graph
            .elements()
            .map(|element| {
                let world = match element.placement {
                    Some(placement) => resolver.resolve(placement),
                    None => Ok(Matrix4::identity()),
                };
                (element, world)
            })
            .collect();

        let extract = |(element, world): &(&ElementNode, Result<Matrix4<f64>>)| {
            self.extract_placed(element, file, world, unit_scale)
        };
        let results: Vec<ExtractResult> = if self.options.parallel {
            placed.par_iter().map(extract).collect()
        } else {
            placed.iter().map(extract).collect()
        };

        let mut mesh = ModelMesh::new();
        let mut diagnostics = Diagnostics::new();
        for result in results {
            mesh.push_element(result.element_id, result.mesh.as_ref(), result.bounds);
            diagnostics.extend(result.diagnostics);
        }

        tracing::debug!(
            elements = mesh.slices.len(),
            triangles = mesh.triangle_count(),
            failed = diagnostics.len(),
            unit_scale,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "geometry extracted"
        );

        ModelGeometry {
            mesh,
            diagnostics,
            unit_scale,
        }
    }
}

impl Default for GeometryRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    impl GeometryProcessor for Nothing {
        fn process(&self, _: &RawInstance, _: &ParsedFile, _: &RouterOptions) -> Result<Mesh> {
            Ok(Mesh::new())
        }

        fn supported_types(&self) -> &'static [&'static str] {
            &["IFCEXTRUDEDAREASOLID"]
        }
    }

    #[test]
    fn test_default_registrations() {
        let router = GeometryRouter::new();
        for kind in [
            "IFCEXTRUDEDAREASOLID",
            "IFCFACETEDBREP",
            "IFCFACEBASEDSURFACEMODEL",
            "IFCSHELLBASEDSURFACEMODEL",
            "IFCTRIANGULATEDFACESET",
            "IFCMAPPEDITEM",
        ] {
            assert!(router.supports(kind), "{kind}");
        }
        assert!(!router.supports("IFCSWEPTDISKSOLID"));
    }

    #[test]
    fn test_register_replaces() {
        let mut router = GeometryRouter::new();
        router.register(Box::new(Nothing));
        assert!(router.supports("IFCEXTRUDEDAREASOLID"));
        assert_eq!(router.options().circle_segments, 24);
    }
}
