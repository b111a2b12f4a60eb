//! Core Data Models
//!
//! This module defines the data structures that flow through the usage engine, from a
//! single decoded log line up to the immutable snapshot the dashboard renders.
//!
//! ## Data Flow
//!
//! 1. **Raw Data**: [`RawEntry`] - The on-disk JSONL schema, decoded with serde
//! 2. **Records**: [`UsageRecord`] - One accounting event with a stable identity
//! 3. **Rollups**: [`ModelUsage`] - Per-model token and cost totals for a window
//! 4. **Output**: [`Snapshot`] - Everything the dashboard shows for one window
//!
//! ## Features
//!
//! - **Serde Integration**: Raw types deserialize from Claude Code transcripts, output
//!   types serialize with camelCase keys for JSON output and the persisted cache
//! - **Defaults Everywhere**: Missing token fields are zero, a missing model is
//!   [`UNKNOWN_MODEL`], unknown fields are ignored, and a field of the wrong type reads
//!   as absent instead of failing the whole line
//! - **Immutability**: Records and snapshots are built once and shared behind `Arc`

use crate::window::WindowSpec;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Model name used when a line carries usage but no model identifier.
pub const UNKNOWN_MODEL: &str = "unknown";

/// One line of a Claude Code transcript, reduced to the fields the engine reads.
///
/// Claude Code nests usage under `message`, older exports and third-party writers put
/// `model`/`usage` at the top level. Both shapes are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEntry {
    #[serde(deserialize_with = "lenient")]
    pub timestamp: Option<RawTimestamp>,
    #[serde(rename = "sessionId", alias = "session_id", deserialize_with = "lenient")]
    pub session_id: Option<String>,
    #[serde(rename = "requestId", alias = "request_id", deserialize_with = "lenient")]
    pub request_id: Option<String>,
    #[serde(rename = "costUSD", alias = "cost_usd", deserialize_with = "lenient_number")]
    pub cost_usd: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub message: Option<RawMessage>,
    #[serde(deserialize_with = "lenient")]
    pub model: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub usage: Option<RawUsage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawMessage {
    #[serde(deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub model: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub usage: Option<RawUsage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawUsage {
    #[serde(deserialize_with = "lenient_count")]
    pub input_tokens: Option<u64>,
    #[serde(deserialize_with = "lenient_count")]
    pub output_tokens: Option<u64>,
    #[serde(alias = "cache_read_tokens", deserialize_with = "lenient_count")]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(alias = "cache_creation_tokens", deserialize_with = "lenient_count")]
    pub cache_creation_input_tokens: Option<u64>,
}

/// Any value that does not decode as `T` reads as `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Numbers, or strings holding one.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// Whole non-negative counts, also when written as `12.0` or `"12"`.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let whole = |f: f64| (f.is_finite() && f >= 0.0 && f.fract() == 0.0).then(|| f as u64);
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// Timestamps are RFC 3339 strings in practice; epoch milliseconds show up in exports.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Text(String),
    EpochMillis(i64),
}

impl RawEntry {
    /// Usage block, preferring the nested message form.
    pub fn usage(&self) -> Option<&RawUsage> {
        self.message
            .as_ref()
            .and_then(|m| m.usage.as_ref())
            .or(self.usage.as_ref())
    }

    pub fn model(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.model.as_deref())
            .or(self.model.as_deref())
            .filter(|m| !m.is_empty())
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

impl From<&RawUsage> for TokenCounts {
    fn from(usage: &RawUsage) -> Self {
        Self {
            input_tokens: usage.input_tokens.unwrap_or(0),
            output_tokens: usage.output_tokens.unwrap_or(0),
            cache_read_tokens: usage.cache_read_input_tokens.unwrap_or(0),
            cache_creation_tokens: usage.cache_creation_input_tokens.unwrap_or(0),
        }
    }
}

/// Token counts by category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCounts {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
}

impl TokenCounts {
    pub fn total(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cache_read_tokens)
            .saturating_add(self.cache_creation_tokens)
    }

    pub fn add(&mut self, other: &TokenCounts) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.cache_read_tokens = self.cache_read_tokens.saturating_add(other.cache_read_tokens);
        self.cache_creation_tokens = self
            .cache_creation_tokens
            .saturating_add(other.cache_creation_tokens);
    }
}

/// One accounting event. Created by the parser, owned by the record store.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    /// Stable key: `msg:<message id>` or `<path>@<byte offset>`.
    pub identity: String,
    pub timestamp: DateTime<Utc>,
    pub project_id: String,
    pub session_id: String,
    pub model: String,
    pub tokens: TokenCounts,
    pub reported_cost_usd: Option<f64>,
}

impl UsageRecord {
    pub fn total_tokens(&self) -> u64 {
        self.tokens.total()
    }
}

/// Per-model rollup over the records of one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsage {
    pub model: String,
    pub total_tokens: u64,
    #[serde(rename = "totalCostUSD")]
    pub total_cost_usd: f64,
    pub record_count: u64,
}

/// Soft-error counters surfaced as the "N lines skipped / M files unreadable" indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanHealth {
    pub files_scanned: usize,
    pub skipped_lines: u64,
    pub unreadable_files: usize,
    pub locator_issues: usize,
}

impl ScanHealth {
    pub fn is_clean(&self) -> bool {
        self.skipped_lines == 0 && self.unreadable_files == 0 && self.locator_issues == 0
    }
}

/// The externally visible result for one (window, data state) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub window: WindowSpec,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    #[serde(flatten)]
    pub tokens: TokenCounts,
    pub total_tokens: u64,
    #[serde(rename = "totalCostUSD")]
    pub total_cost_usd: f64,
    pub record_count: u64,
    pub per_model: Vec<ModelUsage>,
    #[serde(rename = "rate60s")]
    pub rate_60s: f64,
    pub rate_session_avg: f64,
    pub built_at: DateTime<Utc>,
    pub health: ScanHealth,
}
