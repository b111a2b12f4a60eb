//! Cost model
//!
//! Prices are USD per million tokens, keyed by model family. Lookup tries an exact
//! match, then the longest key that prefixes the model name, then a default rate so a
//! real but unrecognized model is never silently free. A cost reported by the source
//! log wins over any estimate.

use crate::models::{TokenCounts, UsageRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

const PER_MILLION: f64 = 1_000_000.0;

/// USD per million tokens for each token category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRates {
    pub input: f64,
    pub output: f64,
    pub cache_write: f64,
    pub cache_read: f64,
}

impl ModelRates {
    pub const fn new(input: f64, output: f64, cache_write: f64, cache_read: f64) -> Self {
        Self {
            input,
            output,
            cache_write,
            cache_read,
        }
    }

    pub fn cost(&self, tokens: &TokenCounts) -> f64 {
        (tokens.input_tokens as f64 * self.input
            + tokens.output_tokens as f64 * self.output
            + tokens.cache_creation_tokens as f64 * self.cache_write
            + tokens.cache_read_tokens as f64 * self.cache_read)
            / PER_MILLION
    }
}

/// How a model name was matched against the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateMatch {
    Exact,
    Prefix,
    Default,
}

const OPUS_4: ModelRates = ModelRates::new(15.0, 75.0, 18.75, 1.50);
const OPUS_4_5: ModelRates = ModelRates::new(5.0, 25.0, 6.25, 0.50);
const SONNET: ModelRates = ModelRates::new(3.0, 15.0, 3.75, 0.30);
const HAIKU_4_5: ModelRates = ModelRates::new(1.0, 5.0, 1.25, 0.10);
const HAIKU_3_5: ModelRates = ModelRates::new(0.80, 4.0, 1.0, 0.08);
const HAIKU_3: ModelRates = ModelRates::new(0.25, 1.25, 0.30, 0.03);

const BUILTIN_RATES: &[(&str, ModelRates)] = &[
    ("claude-opus-4", OPUS_4),
    ("claude-opus-4-1", OPUS_4),
    ("claude-opus-4-5", OPUS_4_5),
    ("claude-3-opus", OPUS_4),
    ("claude-sonnet-4", SONNET),
    ("claude-sonnet-4-5", SONNET),
    ("claude-3-7-sonnet", SONNET),
    ("claude-3-5-sonnet", SONNET),
    ("claude-haiku-4-5", HAIKU_4_5),
    ("claude-3-5-haiku", HAIKU_3_5),
    ("claude-3-haiku", HAIKU_3),
    // Aliases Claude Code writes when the user picks a model by family name
    ("opus", OPUS_4),
    ("sonnet", SONNET),
    ("haiku", HAIKU_3_5),
];

/// Sonnet pricing is the fallback for anything unrecognized, as the most common model.
const DEFAULT_RATES: ModelRates = SONNET;

#[derive(Debug, Clone)]
pub struct CostModel {
    rates: HashMap<String, ModelRates>,
    default_rates: ModelRates,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CostModel {
    pub fn builtin() -> Self {
        Self {
            rates: BUILTIN_RATES
                .iter()
                .map(|(name, rates)| (name.to_string(), *rates))
                .collect(),
            default_rates: DEFAULT_RATES,
        }
    }

    /// Add or replace exact-match entries (config overrides, fetched price lists).
    pub fn merge<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (S, ModelRates)>,
        S: Into<String>,
    {
        for (name, rates) in entries {
            self.rates.insert(name.into().to_ascii_lowercase(), rates);
        }
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn rates_for(&self, model: &str) -> (ModelRates, RateMatch) {
        let name = normalize_model_name(model);

        if let Some(rates) = self.rates.get(name.as_str()) {
            return (*rates, RateMatch::Exact);
        }

        let longest = self
            .rates
            .iter()
            .filter(|(key, _)| name.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len());

        match longest {
            Some((_, rates)) => (*rates, RateMatch::Prefix),
            None => (self.default_rates, RateMatch::Default),
        }
    }

    /// Estimated cost of `tokens` on `model`.
    pub fn cost(&self, model: &str, tokens: &TokenCounts) -> f64 {
        let (rates, matched) = self.rates_for(model);
        if matched == RateMatch::Default {
            debug!(model = %model, "No pricing entry for model, using default rates");
        }
        rates.cost(tokens)
    }

    /// Reported cost when the log carries one, otherwise the estimate.
    pub fn record_cost(&self, record: &UsageRecord) -> f64 {
        match record.reported_cost_usd {
            Some(cost) if cost.is_finite() && cost >= 0.0 => cost,
            _ => self.cost(&record.model, &record.tokens),
        }
    }
}

/// Lowercase and strip provider routing prefixes such as `us.anthropic.` or `anthropic/`.
fn normalize_model_name(model: &str) -> String {
    let lower = model.trim().to_ascii_lowercase();
    let stripped = lower
        .rsplit_once("anthropic.")
        .or_else(|| lower.rsplit_once("anthropic/"))
        .map(|(_, rest)| rest)
        .unwrap_or(&lower);
    stripped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tokens(input: u64, output: u64) -> TokenCounts {
        TokenCounts {
            input_tokens: input,
            output_tokens: output,
            ..Default::default()
        }
    }

    #[test]
    fn test_exact_match_preferred() {
        let model = CostModel::builtin();
        let (rates, matched) = model.rates_for("claude-opus-4-5");
        assert_eq!(matched, RateMatch::Exact);
        assert_eq!(rates, OPUS_4_5);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let model = CostModel::builtin();
        let (rates, matched) = model.rates_for("claude-opus-4-5-20251101");
        assert_eq!(matched, RateMatch::Prefix);
        assert_eq!(rates, OPUS_4_5);

        let (rates, _) = model.rates_for("claude-opus-4-20250514");
        assert_eq!(rates, OPUS_4);
    }

    #[test]
    fn test_unknown_model_uses_default_not_zero() {
        let model = CostModel::builtin();
        let (_, matched) = model.rates_for("mystery-model-9");
        assert_eq!(matched, RateMatch::Default);
        assert!(model.cost("mystery-model-9", &tokens(1000, 1000)) > 0.0);
    }

    #[test]
    fn test_cost_arithmetic() {
        let model = CostModel::builtin();
        // 1M input + 1M output on sonnet = $3 + $15
        let cost = model.cost("claude-sonnet-4-20250514", &tokens(1_000_000, 1_000_000));
        assert!((cost - 18.0).abs() < 1e-9);

        let cached = TokenCounts {
            cache_creation_tokens: 1_000_000,
            cache_read_tokens: 1_000_000,
            ..Default::default()
        };
        let cost = model.cost("claude-sonnet-4", &cached);
        assert!((cost - 4.05).abs() < 1e-9);
    }

    #[test]
    fn test_provider_prefix_is_stripped() {
        let model = CostModel::builtin();
        let (rates, _) = model.rates_for("us.anthropic.claude-3-5-haiku-20241022-v1:0");
        assert_eq!(rates, HAIKU_3_5);
        let (rates, _) = model.rates_for("anthropic/Claude-Opus-4-1");
        assert_eq!(rates, OPUS_4);
    }

    #[test]
    fn test_reported_cost_takes_precedence() {
        let model = CostModel::builtin();
        let mut record = UsageRecord {
            identity: "a".to_string(),
            timestamp: Utc::now(),
            project_id: "p".to_string(),
            session_id: "s".to_string(),
            model: "claude-opus-4".to_string(),
            tokens: tokens(1000, 1000),
            reported_cost_usd: Some(0.42),
        };
        assert_eq!(model.record_cost(&record), 0.42);

        record.reported_cost_usd = None;
        let expected = model.cost("claude-opus-4", &record.tokens);
        assert_eq!(model.record_cost(&record), expected);
    }

    #[test]
    fn test_merge_overrides_builtin() {
        let mut model = CostModel::builtin();
        let custom = ModelRates::new(1.0, 2.0, 0.0, 0.0);
        model.merge([("Claude-Sonnet-4", custom)]);
        let (rates, matched) = model.rates_for("claude-sonnet-4");
        assert_eq!(matched, RateMatch::Exact);
        assert_eq!(rates, custom);
    }
}
