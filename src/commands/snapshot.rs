//! One-shot snapshot command
//!
//! Runs a single query against the logs and prints the result, as text or JSON.

use anyhow::Result;
use tracing::info;

use super::engine_config;
use crate::config::Config;
use crate::engine::UsageEngine;
use crate::report::print_snapshot;
use crate::window::WindowSpec;

pub async fn run_snapshot(config: &Config, window: WindowSpec, json: bool) -> Result<()> {
    let engine_config = engine_config(config).await;
    info!(window = %window, root = %engine_config.root.display(), "Building snapshot");

    let snapshot = tokio::task::spawn_blocking(move || {
        let mut engine = UsageEngine::new(engine_config);
        engine.query(window)
    })
    .await??;

    print_snapshot(&snapshot, json)
}
