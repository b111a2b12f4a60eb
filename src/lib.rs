//! Claude Usage Dashboard Library
//!
//! Incremental aggregation of Claude Code token usage for a terminal dashboard. The
//! engine reads the JSONL conversation logs under `~/.claude/projects` (and
//! `~/.claude/vms/*/projects`), keeps one record per logical API response however many
//! files repeat it, and answers "tokens and cost in this time window" queries from a
//! snapshot cache that is invalidated when the logs change.
//!
//! ## Architecture Overview
//!
//! - [`file_discovery`] - Log locator: enumerates log files and fingerprints their metadata
//! - [`parser`] - Record parser: one JSONL line to one [`UsageRecord`], or a counted skip
//! - [`dedup`] - Deduplicating aggregator: incremental tail reads, identity refcounts
//! - [`pricing`] - Cost model: per-model rates with longest-prefix matching
//! - [`window`] - Window presets and their resolution to `[start, end)`
//! - [`rates`] - Short-horizon and window-average token rates
//! - [`snapshot`] - Snapshot builder: totals, per-model breakdown, health
//! - [`cache`] - Bounded snapshot cache keyed by window and source fingerprint
//! - [`engine`] - Query facade tying the above together
//! - [`live`] - Background refresh driver with a single-slot snapshot handoff
//! - [`config`] / [`logging`] - TOML + environment configuration and tracing setup
//!
//! ## Main Entry Point
//!
//! ```rust,no_run
//! use claude_usage_dash::{EngineConfig, UsageEngine, WindowSpec};
//!
//! # fn example() -> claude_usage_dash::error::Result<()> {
//! let mut engine = UsageEngine::new(EngineConfig::new("/home/me/.claude"));
//! let snapshot = engine.query(WindowSpec::Today)?;
//! println!("{} tokens, ${:.2}", snapshot.total_tokens, snapshot.total_cost_usd);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod commands;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod file_discovery;
pub mod live;
pub mod logging;
pub mod models;
pub mod parser;
pub mod pricing;
pub mod rates;
pub mod report;
pub mod snapshot;
pub mod window;

// Interactive dashboard
#[cfg(feature = "live")]
pub mod display;

// Remote price list
#[cfg(feature = "pricing")]
pub mod litellm_pricing;

pub use engine::{EngineConfig, UsageEngine};
pub use error::EngineError;
pub use models::*;
pub use window::WindowSpec;
