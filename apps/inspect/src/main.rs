// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! bimkit-inspect - load IFC models and print what is in them.
//!
//! Models load in the background, one per file. Without a query flag the
//! summaries are printed as JSON; `--search`, `--type` and `--pick` print the
//! matching elements instead. Engine settings come from `BIMKIT_*`
//! environment variables.

mod args;

use anyhow::{bail, Context, Result};
use args::Args;
use bimkit_engine::{
    telemetry, Camera, Config, ElementType, ElementView, LoadHandle, Loader, ModelId, ModelRegistry, ModelSummary,
    SharedRegistry,
};
use clap::Parser;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct Loaded<'a> {
    model_id: &'a str,
    summary: &'a ModelSummary,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env();
    config.log_json |= args.log_json;
    telemetry::init(&config);

    let registry = ModelRegistry::with_config(config).into_shared();
    load_all(&registry, &args).await?;

    let registry = registry.read();

    if args.diagnostics {
        for listing in registry.list() {
            let diagnostics = registry.diagnostics(listing.model_id.as_str())?;
            for diagnostic in diagnostics.iter() {
                println!("{}: {:?} {}", listing.model_id, diagnostic.severity, diagnostic);
            }
        }
    }

    let keys = if let Some(query) = &args.search {
        Some(registry.search(query))
    } else if let Some(name) = &args.element_type {
        let element_type: ElementType = name.parse().unwrap_or_else(|never| match never {});
        Some(registry.elements_by_type(&element_type))
    } else if let Some((x, y)) = args.pick {
        let mut camera = Camera::default();
        if let Some(bounds) = registry.combined_bounds() {
            camera.fit_to_bounds(&bounds);
        }
        Some(registry.pick_screen(&camera, x, y).map(|hit| hit.key).into_iter().collect())
    } else {
        None
    };

    match keys {
        Some(keys) => {
            let views: Vec<ElementView> = keys.iter().filter_map(|key| registry.element(key)).collect();
            serde_json::to_writer_pretty(std::io::stdout().lock(), &views).context("writing elements")?;
        }
        None => {
            let loaded: Vec<Loaded> = registry
                .list()
                .iter()
                .filter_map(|m| registry.get(m.model_id.as_str()))
                .map(|m| Loaded {
                    model_id: m.model_id.as_str(),
                    summary: &m.summary,
                })
                .collect();
            serde_json::to_writer_pretty(std::io::stdout().lock(), &loaded).context("writing summaries")?;
        }
    }
    println!();
    Ok(())
}

/// Start every load, then wait for all of them. Any failure aborts.
async fn load_all(registry: &SharedRegistry, args: &Args) -> Result<()> {
    let mut handles: Vec<(String, LoadHandle)> = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let id = model_id_for(path);
        if handles.iter().any(|(_, h)| h.model_id() == &id) {
            bail!("two files map to model id '{}'", id);
        }
        let name = path.display().to_string();
        tracing::info!(model_id = %id, file = %name, bytes = text.len(), "loading");
        handles.push((name.clone(), Loader::spawn(registry.clone(), id, name, text)));
    }

    for (name, mut handle) in handles {
        while let Some(stage) = handle.changed().await {
            tracing::debug!(file = %name, ?stage, "progress");
        }
        let summary = handle.wait().await.with_context(|| format!("loading {}", name))?;
        tracing::info!(
            file = %name,
            elements = summary.element_count,
            triangles = summary.triangle_count,
            diagnostics = summary.diagnostic_count,
            "loaded"
        );
    }
    Ok(())
}

fn model_id_for(path: &Path) -> ModelId {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("model");
    ModelId::new(stem)
}
