//! Live dashboard command
//!
//! Starts the refresh driver on the configured interval and hands it to the TUI.

use anyhow::Result;
use std::time::Duration;
use tracing::info;

use super::engine_config;
use crate::config::Config;
use crate::engine::UsageEngine;
use crate::live::spawn_driver;
use crate::window::WindowSpec;

pub async fn run_live_mode(config: &Config, window: WindowSpec) -> Result<()> {
    let engine_config = engine_config(config).await;
    let period = Duration::from_secs(config.refresh.interval_secs);

    info!(
        window = %window,
        refresh_secs = config.refresh.interval_secs,
        "Starting live dashboard"
    );

    let engine = tokio::task::spawn_blocking(move || UsageEngine::new(engine_config)).await?;
    let driver = spawn_driver(engine, window, period)?;

    crate::display::run_display(driver).await?;

    info!("Live dashboard stopped");
    Ok(())
}
