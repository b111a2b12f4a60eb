//! Display Module for the Live Dashboard
//!
//! Terminal UI that renders the latest snapshot from the refresh driver.
//!
//! ## TUI Layout
//!
//! ```text
//! ┌─ Claude Usage: This week (2025-01-06 09:00 → 2025-01-08 14:02) ──────────┐
//! │ Cost: $45.23 | Tokens: 1.2M | In 10K / Out 15K / ... | Records: 312      │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ┌─ Rates ───────────────────────────────────────────────────────────────────┐
//! │ ├─ Last 60s: 12.5 tok/s | Window average: 3.1 tok/s | Updated 14:02:11    │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ┌─ Models ──────────────────────────────────────────────────────────────────┐
//! │ claude-opus-4-20250514     800.0K tokens    $40.10 (201 requests)         │
//! │ claude-sonnet-4-20250514   400.0K tokens     $5.13 (111 requests)         │
//! └───────────────────────────────────────────────────────────────────────────┘
//!   1 This week  2 Today  3 Last 24h  4 Last 7 days  5 Last 30 days  6 All time  q quit
//! ```
//!
//! ## Keys
//!
//! - `1`-`6`: select a window preset
//! - `↑`/`↓`: scroll the model table, `r` to reset
//! - `q`, `Esc`, `Ctrl+C`: quit

pub mod state;
pub mod tui;
pub mod widgets;

pub use state::DashboardState;
pub use tui::DashboardManager;
pub use widgets::AppTheme;

use crate::live::DriverHandle;
use anyhow::Result;

/// Run the dashboard until the user quits.
pub async fn run_display(driver: DriverHandle) -> Result<()> {
    DashboardManager::new(driver)?.run().await
}
