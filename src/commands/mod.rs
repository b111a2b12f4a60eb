//! Command implementations for the CLI
//!
//! Each subcommand lives in its own module; both build their engine through
//! [`engine_config`] so the configuration file, environment overrides and optional
//! remote pricing apply the same way everywhere.

#[cfg(feature = "live")]
pub mod live;
pub mod snapshot;

#[cfg(feature = "live")]
pub use live::run_live_mode;
pub use snapshot::run_snapshot;

use crate::config::Config;
use crate::engine::EngineConfig;

/// Engine settings for `config`, with remote pricing merged in when enabled.
///
/// Configured overrides are applied again after a remote refresh so they always win.
pub async fn engine_config(config: &Config) -> EngineConfig {
    #[allow(unused_mut)]
    let mut engine_config = EngineConfig::from(config);

    #[cfg(feature = "pricing")]
    {
        if config.pricing.fetch_remote {
            crate::litellm_pricing::refresh_cost_model(&mut engine_config.cost_model).await;
            engine_config.cost_model.merge(
                config
                    .pricing
                    .overrides
                    .iter()
                    .map(|(name, rates)| (name.clone(), *rates)),
            );
        }
    }

    #[cfg(not(feature = "pricing"))]
    {
        if config.pricing.fetch_remote {
            tracing::warn!("Remote pricing requested but the `pricing` feature is disabled");
        }
    }

    engine_config
}
