// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Background loading with progress and cancellation.

mod common;

use bimkit_engine::{LoadStage, Loader, ModelError, ModelRegistry, ModelState};

const ORDER: [LoadStage; 8] = [
    LoadStage::Queued,
    LoadStage::Reading,
    LoadStage::Parsing,
    LoadStage::BuildingGraph,
    LoadStage::BuildingGeometry,
    LoadStage::Indexing,
    LoadStage::Done,
    LoadStage::Failed,
];

fn rank(stage: LoadStage) -> usize {
    ORDER.iter().position(|s| *s == stage).unwrap_or(usize::MAX)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_progress_reaches_done() {
    let registry = ModelRegistry::new().into_shared();
    let mut handle = Loader::spawn(registry.clone(), "m", "m.ifc", common::two_boxes());
    assert_eq!(handle.model_id().as_str(), "m");

    let mut seen = vec![handle.progress()];
    while let Some(stage) = handle.changed().await {
        seen.push(stage);
    }
    assert_eq!(seen.last(), Some(&LoadStage::Done));
    assert!(seen.windows(2).all(|w| rank(w[0]) <= rank(w[1])));

    let summary = handle.wait().await.unwrap();
    assert_eq!(summary.element_count, 6);
    assert!(matches!(registry.read().state("m"), ModelState::Loaded { is_primary: true, .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_duplicate_spawn_fails_fast() {
    let registry = ModelRegistry::new().into_shared();
    let first = Loader::spawn(registry.clone(), "m", "m.ifc", common::large_model(400));
    let second = Loader::spawn(registry.clone(), "m", "again.ifc", common::two_boxes());

    assert_eq!(second.progress(), LoadStage::Failed);
    assert_eq!(second.wait().await.unwrap_err(), ModelError::DuplicateModelId("m".into()));

    first.wait().await.unwrap();
    assert_eq!(registry.read().get("m").unwrap().display_name, "m.ifc");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_load_commits_nothing() {
    let registry = ModelRegistry::new().into_shared();
    let handle = Loader::spawn(registry.clone(), "big", "big.ifc", common::large_model(20_000));
    handle.cancel();
    assert!(handle.is_cancelled());

    let error = handle.wait().await.unwrap_err();
    assert_eq!(error, ModelError::Cancelled("big".into()));
    let guard = registry.read();
    assert!(guard.is_empty());
    assert_eq!(guard.state("big"), ModelState::Unloaded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_load_reports_failed_stage() {
    let registry = ModelRegistry::new().into_shared();
    let mut handle = Loader::spawn(registry.clone(), "bad", "bad.ifc", common::dangling_reference());
    while handle.changed().await.is_some() {}
    assert_eq!(handle.progress(), LoadStage::Failed);
    assert!(matches!(handle.wait().await, Err(ModelError::DanglingReference { missing: 999, .. })));
    assert!(matches!(registry.read().state("bad"), ModelState::FailedToLoad(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_loads_of_different_ids() {
    let registry = ModelRegistry::new().into_shared();
    let handles: Vec<_> = (0..4)
        .map(|i| Loader::spawn(registry.clone(), format!("m{}", i), "m.ifc", common::large_model(20)))
        .collect();
    for handle in handles {
        handle.wait().await.unwrap();
    }
    let guard = registry.read();
    assert_eq!(guard.len(), 4);
    assert_eq!(guard.list().iter().filter(|m| m.is_primary).count(), 1);
}

/// Poll until the id is no longer loading
async fn settled_state(registry: &bimkit_engine::SharedRegistry, id: &str) -> ModelState {
    for _ in 0..2_000 {
        let state = registry.read().state(id);
        if state != ModelState::Loading {
            return state;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    registry.read().state(id)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_handle_discards_result() {
    let registry = ModelRegistry::new().into_shared();
    let handle = Loader::spawn(registry.clone(), "big", "big.ifc", common::large_model(20_000));
    drop(handle);
    assert_eq!(settled_state(&registry, "big").await, ModelState::Unloaded);
    assert!(registry.read().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timed_out_wait_discards_result() {
    let registry = ModelRegistry::new().into_shared();
    let handle = Loader::spawn(registry.clone(), "big", "big.ifc", common::large_model(20_000));
    let waited = tokio::time::timeout(std::time::Duration::from_millis(1), handle.wait()).await;
    assert!(waited.is_err());
    assert_eq!(settled_state(&registry, "big").await, ModelState::Unloaded);
    assert!(registry.read().is_empty());
}
