use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::process;

use claude_usage_dash::commands;
use claude_usage_dash::config::get_config;
use claude_usage_dash::logging::init_logging;
use claude_usage_dash::window::WindowSpec;

#[derive(Parser)]
#[command(name = "claude-usage-dash")]
#[command(about = "Token usage and cost dashboard for Claude Code logs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one snapshot and exit
    Snapshot {
        /// Window preset: week, today, 24h, 7d, 30d, all
        #[arg(long, conflicts_with_all = ["since", "until"])]
        window: Option<WindowSpec>,
        /// Start of an explicit range (RFC 3339 or YYYY-MM-DD, local midnight)
        #[arg(long, value_parser = parse_time)]
        since: Option<DateTime<Utc>>,
        /// End of an explicit range, exclusive (defaults to now)
        #[arg(long, value_parser = parse_time, requires = "since")]
        until: Option<DateTime<Utc>>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Interactive dashboard that refreshes in the background
    Live {
        /// Initial window preset
        #[arg(long)]
        window: Option<WindowSpec>,
    },
}

/// Accepts RFC 3339 timestamps or plain dates, which mean local midnight.
fn parse_time(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("invalid time '{}': use RFC 3339 or YYYY-MM-DD", value))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| format!("invalid date '{}'", value))?;
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("'{}' has no local midnight", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = get_config();

    match cli.command.unwrap_or(Commands::Snapshot {
        window: None,
        since: None,
        until: None,
        json: false,
    }) {
        Commands::Snapshot {
            window,
            since,
            until,
            json,
        } => {
            let _guard = init_logging(config, false)?;

            let window = match (window, since) {
                (Some(window), _) => Ok(window),
                (None, Some(start)) => {
                    WindowSpec::custom(start, until.unwrap_or_else(Utc::now)).map_err(Into::into)
                }
                (None, None) => config.default_window(),
            };

            let result = match window {
                Ok(window) => commands::run_snapshot(config, window, json).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => Ok(()),
                Err(e) => handle_error(e, json),
            }
        }
        Commands::Live { window } => run_live(config, window).await,
    }
}

#[cfg(feature = "live")]
async fn run_live(
    config: &claude_usage_dash::config::Config,
    window: Option<WindowSpec>,
) -> Result<()> {
    let _guard = init_logging(config, true)?;
    let window = match window {
        Some(window) => window,
        None => config.default_window()?,
    };
    commands::run_live_mode(config, window)
        .await
        .context("Live dashboard failed")
}

#[cfg(not(feature = "live"))]
async fn run_live(
    _config: &claude_usage_dash::config::Config,
    _window: Option<WindowSpec>,
) -> Result<()> {
    eprintln!("Error: this build does not include the live dashboard (feature `live`)");
    process::exit(1);
}

fn handle_error(e: anyhow::Error, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
    } else {
        eprintln!("Error: {:#}", e);
    }
    process::exit(1);
}
