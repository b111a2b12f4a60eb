//! Production configuration system
//!
//! Provides centralized configuration management with:
//! - Environment variable support
//! - Config file loading (optional, partial files allowed)
//! - Runtime defaults
//! - Validation and type safety
//!
//! The binary reads the process-wide [`get_config`]; the engine itself only ever sees
//! the [`EngineConfig`](crate::engine::EngineConfig) derived from it.

use crate::pricing::ModelRates;
use crate::window::{WindowSpec, DEFAULT_WEEK_START_HOUR};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
    pub scan: ScanConfig,
    pub cache: CacheConfig,
    pub refresh: RefreshConfig,
    pub window: WindowConfig,
    pub pricing: PricingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// `console`, `file` or `both`
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub claude_home: PathBuf,
    pub log_directory: PathBuf,
    pub cache_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub include_vms: bool,
    pub parallel: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    /// 0 disables expiry for explicit ranges. Presets are still rebuilt at least every
    /// 30 seconds.
    pub max_age_secs: u64,
    pub persist: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    pub default_window: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub week_start_hour: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub fetch_remote: bool,
    /// Exact-match rates in USD per million tokens, keyed by model name.
    pub overrides: HashMap<String, ModelRates>,
}

fn claude_home_default() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "ERROR".to_string(),
            format: "pretty".to_string(),
            output: "console".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            claude_home: claude_home_default(),
            log_directory: PathBuf::from("logs"),
            cache_file: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("claude-usage-dash")
                .join("snapshots.json"),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_vms: true,
            parallel: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            max_age_secs: 30,
            persist: false,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3,
            default_window: "week".to_string(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            week_start_hour: DEFAULT_WEEK_START_HOUR,
        }
    }
}

impl Config {
    /// Load configuration from environment, file, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        let config_paths = [
            PathBuf::from("claude-usage-dash.toml"),
            PathBuf::from(".claude-usage-dash.toml"),
            dirs::config_dir()
                .map(|d| d.join("claude-usage-dash").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.is_file() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(path)?;
                break;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        if let Ok(val) = env::var("CLAUDE_HOME") {
            self.paths.claude_home = PathBuf::from(val);
        }
        if let Ok(val) = env::var("CLAUDE_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }
        if let Ok(val) = env::var("CLAUDE_USAGE_CACHE_FILE") {
            self.paths.cache_file = PathBuf::from(val);
        }

        if let Ok(val) = env::var("CLAUDE_USAGE_EXCLUDE_VMS") {
            let exclude: bool = val.parse().context("Invalid CLAUDE_USAGE_EXCLUDE_VMS")?;
            self.scan.include_vms = !exclude;
        }
        if let Ok(val) = env::var("CLAUDE_USAGE_REFRESH_SECS") {
            self.refresh.interval_secs = val.parse().context("Invalid CLAUDE_USAGE_REFRESH_SECS")?;
        }
        if let Ok(val) = env::var("CLAUDE_USAGE_CACHE_CAPACITY") {
            self.cache.capacity = val.parse().context("Invalid CLAUDE_USAGE_CACHE_CAPACITY")?;
        }
        if let Ok(val) = env::var("CLAUDE_USAGE_CACHE_MAX_AGE_SECS") {
            self.cache.max_age_secs = val
                .parse()
                .context("Invalid CLAUDE_USAGE_CACHE_MAX_AGE_SECS")?;
        }
        if let Ok(val) = env::var("CLAUDE_USAGE_WEEK_START_HOUR") {
            self.window.week_start_hour = val
                .parse()
                .context("Invalid CLAUDE_USAGE_WEEK_START_HOUR")?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(anyhow::anyhow!("Cache capacity must be greater than 0"));
        }

        if self.refresh.interval_secs == 0 {
            return Err(anyhow::anyhow!("Refresh interval must be greater than 0"));
        }

        if self.window.week_start_hour >= 24 {
            return Err(anyhow::anyhow!(
                "Week start hour must be between 0 and 23, got {}",
                self.window.week_start_hour
            ));
        }

        self.default_window()?;

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            warn!(format = %self.logging.format, "Unknown log format, using pretty");
        }

        Ok(())
    }

    /// The configured startup window.
    pub fn default_window(&self) -> Result<WindowSpec> {
        self.refresh
            .default_window
            .parse()
            .with_context(|| format!("Invalid default window: {}", self.refresh.default_window))
    }

    /// Save current configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration instance, falling back to defaults if loading fails
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load configuration, using defaults");
            Config::default()
        })
    })
}
