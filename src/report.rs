//! Snapshot output for the one-shot `snapshot` command
//!
//! Human-readable colored text, or pretty JSON with the snapshot's camelCase schema.

use crate::models::{ScanHealth, Snapshot};
use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use std::fmt::Write;

/// `1234` → `1.2K`, `2_500_000` → `2.5M`
pub fn format_tokens(tokens: u64) -> String {
    match tokens {
        t if t >= 1_000_000_000 => format!("{:.1}B", t as f64 / 1_000_000_000.0),
        t if t >= 1_000_000 => format!("{:.1}M", t as f64 / 1_000_000.0),
        t if t >= 1_000 => format!("{:.1}K", t as f64 / 1_000.0),
        t => t.to_string(),
    }
}

/// "N lines skipped / M files unreadable", or `None` when there is nothing to report.
pub fn format_health(health: &ScanHealth) -> Option<String> {
    if health.is_clean() {
        return None;
    }
    let mut parts = vec![
        format!("{} lines skipped", health.skipped_lines),
        format!("{} files unreadable", health.unreadable_files),
    ];
    if health.locator_issues > 0 {
        parts.push(format!("{} paths inaccessible", health.locator_issues));
    }
    Some(parts.join(" / "))
}

pub fn snapshot_json(snapshot: &Snapshot) -> Result<String> {
    serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")
}

pub fn snapshot_text(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let rule = "=".repeat(80);

    let _ = writeln!(out, "\n{}", rule.bright_cyan());
    let _ = writeln!(
        out,
        "{}",
        format!("Claude Code Usage: {}", snapshot.window.label())
            .bright_white()
            .bold()
    );
    let _ = writeln!(out, "{}", rule.bright_cyan());

    let _ = writeln!(
        out,
        "\n{} {} → {}",
        "🗓".bright_blue(),
        snapshot
            .window_start
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string()
            .bright_white(),
        snapshot
            .window_end
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string()
            .bright_white()
    );
    let _ = writeln!(
        out,
        "{} {} • {} tokens • {} requests",
        "💰".bright_yellow(),
        format!("${:.2}", snapshot.total_cost_usd).bright_green().bold(),
        format_tokens(snapshot.total_tokens).bright_white().bold(),
        snapshot.record_count.to_string().bright_white()
    );
    let _ = writeln!(
        out,
        "   in {} / out {} / cache write {} / cache read {}",
        format_tokens(snapshot.tokens.input_tokens),
        format_tokens(snapshot.tokens.output_tokens),
        format_tokens(snapshot.tokens.cache_creation_tokens),
        format_tokens(snapshot.tokens.cache_read_tokens)
    );
    let _ = writeln!(
        out,
        "{} {} tok/s last 60s • {} tok/s window average\n",
        "⚡".bright_yellow(),
        format!("{:.1}", snapshot.rate_60s).bright_white(),
        format!("{:.1}", snapshot.rate_session_avg).bright_white()
    );

    if snapshot.per_model.is_empty() {
        let _ = writeln!(out, "   {}", "No usage in this window".dimmed());
    }
    for usage in &snapshot.per_model {
        let share = if snapshot.total_cost_usd > 0.0 {
            usage.total_cost_usd / snapshot.total_cost_usd * 100.0
        } else {
            0.0
        };
        let _ = writeln!(
            out,
            "   {}: {} ({}%, {} tokens, {} requests)",
            usage.model.bright_cyan(),
            format!("${:.2}", usage.total_cost_usd).bright_green(),
            format!("{:.0}", share).bright_yellow(),
            format_tokens(usage.total_tokens).bright_white(),
            usage.record_count
        );
    }

    if let Some(health) = format_health(&snapshot.health) {
        let _ = writeln!(out, "\n{} {}", "⚠".bright_yellow(), health.yellow());
    }

    out
}

pub fn print_snapshot(snapshot: &Snapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", snapshot_json(snapshot)?);
    } else {
        print!("{}", snapshot_text(snapshot));
    }
    Ok(())
}
