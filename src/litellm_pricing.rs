//! LiteLLM pricing refresh
//!
//! Fetches LiteLLM's public model price list and converts the `claude-*` entries into
//! exact-match [`ModelRates`] for the [`CostModel`]. Any failure leaves the built-in
//! table in place.

use crate::pricing::{CostModel, ModelRates};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

const LITELLM_PRICING_URL: &str =
    "https://raw.githubusercontent.com/BerriAI/litellm/main/model_prices_and_context_window.json";

#[derive(Debug, Clone, Deserialize)]
struct LiteLlmEntry {
    input_cost_per_token: Option<f64>,
    output_cost_per_token: Option<f64>,
    cache_creation_input_token_cost: Option<f64>,
    cache_read_input_token_cost: Option<f64>,
}

impl LiteLlmEntry {
    /// Per-token prices to per-million rates. Cache prices fall back to the input price.
    fn to_rates(&self) -> Option<ModelRates> {
        let input = self.input_cost_per_token?;
        let output = self.output_cost_per_token?;
        Some(ModelRates::new(
            input * 1_000_000.0,
            output * 1_000_000.0,
            self.cache_creation_input_token_cost.unwrap_or(input) * 1_000_000.0,
            self.cache_read_input_token_cost.unwrap_or(input) * 1_000_000.0,
        ))
    }
}

/// Extract Claude rates from a LiteLLM price document.
pub fn claude_rates_from_json(document: &serde_json::Value) -> HashMap<String, ModelRates> {
    let Some(models) = document.as_object() else {
        return HashMap::new();
    };

    models
        .iter()
        .filter(|(name, _)| name.starts_with("claude-"))
        .filter_map(|(name, value)| {
            let entry: LiteLlmEntry = serde_json::from_value(value.clone()).ok()?;
            entry.to_rates().map(|rates| (name.clone(), rates))
        })
        .collect()
}

pub async fn fetch_claude_rates() -> Result<HashMap<String, ModelRates>> {
    info!("Fetching model pricing from LiteLLM");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let document: serde_json::Value = client
        .get(LITELLM_PRICING_URL)
        .send()
        .await
        .context("Failed to fetch pricing data from LiteLLM")?
        .error_for_status()
        .context("LiteLLM pricing request failed")?
        .json()
        .await
        .context("Failed to parse pricing data JSON")?;

    let rates = claude_rates_from_json(&document);
    info!(models = rates.len(), "Fetched Claude pricing from LiteLLM");
    Ok(rates)
}

/// Merge fetched rates into `model`, keeping the built-in table on failure.
pub async fn refresh_cost_model(model: &mut CostModel) {
    match fetch_claude_rates().await {
        Ok(rates) if !rates.is_empty() => model.merge(rates),
        Ok(_) => warn!("LiteLLM price list had no Claude entries, keeping built-in pricing"),
        Err(e) => warn!(error = %e, "Pricing refresh failed, keeping built-in pricing"),
    }
}
