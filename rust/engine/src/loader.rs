// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Load pipeline and background loading
//!
//! `parse -> graph -> geometry -> index`, run either inline by
//! [`ModelRegistry::load`](crate::ModelRegistry::load) or on the Tokio
//! blocking pool by [`Loader::spawn`]. Either way the finished model is
//! inserted in one step under the registry write lock.

use crate::config::Config;
use crate::registry::{RegisteredModel, SharedRegistry};
use crate::summary::ModelSummary;
use bimkit_core::{build_with, parse_with, ModelError};
use bimkit_geometry::GeometryRouter;
use bimkit_spatial::{LeafKey, ModelId, SpatialIndex};
use nalgebra::Matrix4;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Progress of one load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadStage {
    Queued,
    Reading,
    Parsing,
    BuildingGraph,
    BuildingGeometry,
    Indexing,
    Done,
    Failed,
}

impl LoadStage {
    pub fn is_finished(self) -> bool {
        matches!(self, LoadStage::Done | LoadStage::Failed)
    }
}

/// Run the whole pipeline for one document.
///
/// `stage` is told about each stage before it starts; returning `false`
/// abandons the load with [`ModelError::Cancelled`].
pub(crate) fn build_model(
    model_id: &ModelId,
    display_name: &str,
    text: &str,
    config: &Config,
    mut stage: impl FnMut(LoadStage) -> bool,
) -> Result<RegisteredModel, ModelError> {
    let _span = tracing::info_span!("load_model", model_id = %model_id).entered();
    let started = Instant::now();
    let mut enter = |next: LoadStage| {
        tracing::debug!(stage = ?next, elapsed_ms = started.elapsed().as_millis() as u64, "load stage");
        if stage(next) {
            Ok(())
        } else {
            Err(ModelError::Cancelled(model_id.to_string()))
        }
    };

    enter(LoadStage::Reading)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    enter(LoadStage::Parsing)?;
    let parsed = parse_with(text, &config.parse_options())?;

    enter(LoadStage::BuildingGraph)?;
    let graph = build_with(parsed, &config.graph_options())?;

    enter(LoadStage::BuildingGeometry)?;
    let geometry = GeometryRouter::with_options(config.router_options()).extract_model(&graph);

    enter(LoadStage::Indexing)?;
    let entries = geometry
        .mesh
        .slices
        .iter()
        .map(|slice| (LeafKey::new(model_id.clone(), slice.element_id), slice.bounds))
        .collect();
    let index = SpatialIndex::build_with_capacity(entries, config.rtree_node_capacity);

    let mut diagnostics = graph.diagnostics().clone();
    diagnostics.extend(geometry.diagnostics.clone());
    let summary = ModelSummary::new(&graph, &geometry, diagnostics.len());

    Ok(RegisteredModel {
        model_id: model_id.clone(),
        display_name: display_name.to_string(),
        visible: true,
        transform: Matrix4::identity(),
        graph,
        mesh: geometry.mesh,
        unit_scale: geometry.unit_scale,
        index,
        summary,
        diagnostics,
    })
}

/// Starts background loads
pub struct Loader;

impl Loader {
    /// Reserve `model_id` and load `text` on the blocking pool.
    ///
    /// Must be called from within a Tokio runtime. A duplicate id fails
    /// immediately without touching the existing entry.
    pub fn spawn(
        registry: SharedRegistry,
        model_id: impl Into<ModelId>,
        display_name: impl Into<String>,
        text: impl Into<String>,
    ) -> LoadHandle {
        let model_id = model_id.into();
        let display_name = display_name.into();
        let text = text.into();
        let cancelled = Arc::new(AtomicBool::new(false));

        let reserved = {
            let mut guard = registry.write();
            guard.reserve(&model_id).map(|()| guard.config().clone())
        };
        let config = match reserved {
            Ok(config) => config,
            Err(error) => {
                let (_tx, progress) = watch::channel(LoadStage::Failed);
                return LoadHandle {
                    model_id,
                    progress,
                    cancelled,
                    task: Some(tokio::spawn(std::future::ready(Err(error)))),
                };
            }
        };

        let (tx, progress) = watch::channel(LoadStage::Queued);
        let flag = Arc::clone(&cancelled);
        let id = model_id.clone();

        let task = tokio::task::spawn_blocking(move || {
            let mut reservation = Reservation::new(registry, id.clone());
            let is_live = || !flag.load(Ordering::Acquire);
            let built = build_model(&id, &display_name, &text, &config, |stage| {
                let _ = tx.send(stage);
                is_live()
            });

            let result = {
                let mut guard = reservation.registry.write();
                match built {
                    // Checked again under the lock so a cancelled load never commits
                    Ok(_) if !is_live() => {
                        guard.release(&id);
                        Err(ModelError::Cancelled(id.to_string()))
                    }
                    Ok(model) => Ok(guard.commit(model)),
                    Err(error) => {
                        guard.fail(&id, &error);
                        Err(error)
                    }
                }
            };
            reservation.settled = true;

            let _ = tx.send(if result.is_ok() { LoadStage::Done } else { LoadStage::Failed });
            result
        });

        LoadHandle {
            model_id,
            progress,
            cancelled,
            task: Some(task),
        }
    }
}

/// Frees a reserved id if the pipeline unwinds before committing or failing it
struct Reservation {
    registry: SharedRegistry,
    id: ModelId,
    settled: bool,
}

impl Reservation {
    fn new(registry: SharedRegistry, id: ModelId) -> Self {
        Self {
            registry,
            id,
            settled: false,
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(model_id = %self.id, "load aborted; releasing reservation");
            self.registry.write().release(&self.id);
        }
    }
}

/// Handle to a background load. Dropping it, or dropping an unfinished
/// [`wait`](LoadHandle::wait), cancels the load.
pub struct LoadHandle {
    model_id: ModelId,
    progress: watch::Receiver<LoadStage>,
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<Result<ModelSummary, ModelError>>>,
}

impl LoadHandle {
    pub fn model_id(&self) -> &ModelId {
        &self.model_id
    }

    /// Latest reported stage
    pub fn progress(&self) -> LoadStage {
        *self.progress.borrow()
    }

    /// Wait for the next stage change; `None` once the load has ended and
    /// no further stages will be reported
    pub async fn changed(&mut self) -> Option<LoadStage> {
        self.progress.changed().await.ok()?;
        Some(*self.progress.borrow_and_update())
    }

    /// Ask the pipeline to stop at the next stage boundary
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Wait for the load to finish
    pub async fn wait(mut self) -> Result<ModelSummary, ModelError> {
        let Some(task) = self.task.as_mut() else {
            return Err(ModelError::Internal(format!("load of '{}' already awaited", self.model_id)));
        };
        // The task stays in place until it has joined, so dropping this
        // future part way still cancels through `Drop`
        let joined = task.await;
        self.task = None;
        match joined {
            Ok(result) => result,
            Err(error) => Err(ModelError::Internal(format!("load task failed: {}", error))),
        }
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        // Only an unfinished load is abandoned
        if self.task.is_some() {
            self.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ModelRegistry, ModelState};

    #[test]
    fn test_unwinding_pipeline_releases_reservation() {
        let registry = ModelRegistry::new().into_shared();
        let id = ModelId::new("m");
        registry.write().reserve(&id).unwrap();

        let shared = Arc::clone(&registry);
        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _reservation = Reservation::new(shared, ModelId::new("m"));
            panic!("geometry blew up");
        }));
        assert!(unwound.is_err());
        assert_eq!(registry.read().state("m"), ModelState::Unloaded);
    }

    #[test]
    fn test_settled_reservation_is_left_alone() {
        let registry = ModelRegistry::new().into_shared();
        let id = ModelId::new("m");
        registry.write().reserve(&id).unwrap();

        let mut reservation = Reservation::new(Arc::clone(&registry), id);
        reservation.settled = true;
        drop(reservation);
        assert_eq!(registry.read().state("m"), ModelState::Loading);
    }
}
