//! Display State Management
//!
//! Holds what the dashboard shows between frames: the selected window, the last
//! snapshot received from the refresh driver, and the scroll position of the per-model
//! table.

use crate::live::PublishedSnapshot;
use crate::models::{ModelUsage, ScanHealth};
use crate::report::format_tokens;
use crate::window::WindowSpec;

/// Core display state for the dashboard
#[derive(Debug)]
pub struct DashboardState {
    /// Window the user selected last
    pub selected: WindowSpec,
    /// Last snapshot applied, possibly for a previous selection while a build runs
    pub current: Option<PublishedSnapshot>,
    /// First visible row of the per-model table
    pub scroll_position: usize,
    /// Transient message shown in an overlay until the next key press
    pub notice: Option<String>,
}

impl DashboardState {
    pub fn new(selected: WindowSpec) -> Self {
        Self {
            selected,
            current: None,
            scroll_position: 0,
            notice: None,
        }
    }

    /// Apply a published snapshot. Returns false for anything older than what is shown.
    pub fn apply(&mut self, published: PublishedSnapshot) -> bool {
        if let Some(current) = &self.current {
            if published.seq <= current.seq {
                return false;
            }
        }
        let rows = published.snapshot.per_model.len();
        self.current = Some(published);
        self.scroll_position = self.scroll_position.min(rows.saturating_sub(1));
        true
    }

    /// Preset for a number key, `1` being the first preset.
    pub fn preset_for_key(key: char) -> Option<WindowSpec> {
        let index = key.to_digit(10)?.checked_sub(1)? as usize;
        WindowSpec::PRESETS.get(index).copied()
    }

    /// True while the shown snapshot belongs to a different window than the selection.
    pub fn is_stale(&self) -> bool {
        self.current
            .as_ref()
            .map_or(true, |current| current.window != self.selected)
    }

    pub fn models(&self) -> &[ModelUsage] {
        self.current
            .as_ref()
            .map(|c| c.snapshot.per_model.as_slice())
            .unwrap_or(&[])
    }

    pub fn scroll_up(&mut self) {
        if self.scroll_position > 0 {
            self.scroll_position -= 1;
        }
    }

    pub fn scroll_down(&mut self, visible_lines: usize) {
        let max_scroll = self.models().len().saturating_sub(visible_lines);
        if self.scroll_position < max_scroll {
            self.scroll_position += 1;
        }
    }

    pub fn visible_models(&self, visible_lines: usize) -> &[ModelUsage] {
        let models = self.models();
        let start = self.scroll_position.min(models.len());
        let end = (start + visible_lines).min(models.len());
        &models[start..end]
    }

    pub fn can_scroll(&self, visible_lines: usize) -> bool {
        self.models().len() > visible_lines
    }

    pub fn format_window(&self) -> String {
        let label = self.selected.label();
        match &self.current {
            Some(current) if !self.is_stale() => format!(
                "{} ({} → {})",
                label,
                current.snapshot.window_start.format("%Y-%m-%d %H:%M"),
                current.snapshot.window_end.format("%Y-%m-%d %H:%M")
            ),
            _ => format!("{} (loading...)", label),
        }
    }

    pub fn format_totals(&self) -> String {
        match &self.current {
            Some(current) => {
                let s = &current.snapshot;
                format!(
                    "Cost: ${:.2} | Tokens: {} | In {} / Out {} / Cache W {} / Cache R {} | Records: {}",
                    s.total_cost_usd,
                    format_tokens(s.total_tokens),
                    format_tokens(s.tokens.input_tokens),
                    format_tokens(s.tokens.output_tokens),
                    format_tokens(s.tokens.cache_creation_tokens),
                    format_tokens(s.tokens.cache_read_tokens),
                    s.record_count
                )
            }
            None => "Waiting for first scan...".to_string(),
        }
    }

    pub fn format_rates(&self) -> Option<String> {
        self.current.as_ref().map(|current| {
            format!(
                "Last 60s: {:.1} tok/s | Window average: {:.1} tok/s | Updated {}",
                current.snapshot.rate_60s,
                current.snapshot.rate_session_avg,
                current
                    .snapshot
                    .built_at
                    .with_timezone(&chrono::Local)
                    .format("%H:%M:%S")
            )
        })
    }

    pub fn health(&self) -> Option<ScanHealth> {
        self.current.as_ref().map(|c| c.snapshot.health)
    }

    pub fn scroll_indicator(&self, visible_lines: usize) -> String {
        let total = self.models().len();
        if total <= visible_lines || visible_lines == 0 {
            String::new()
        } else {
            let last = (self.scroll_position + visible_lines).min(total);
            format!(" ({}-{} of {})", self.scroll_position + 1, last, total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Snapshot, TokenCounts};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn published(seq: u64, window: WindowSpec, models: usize) -> PublishedSnapshot {
        let at = Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap();
        PublishedSnapshot {
            seq,
            window,
            snapshot: Arc::new(Snapshot {
                window,
                window_start: at,
                window_end: at,
                tokens: TokenCounts::default(),
                total_tokens: 0,
                total_cost_usd: 0.0,
                record_count: 0,
                per_model: (0..models)
                    .map(|i| ModelUsage {
                        model: format!("model-{}", i),
                        total_tokens: 1,
                        total_cost_usd: 0.0,
                        record_count: 1,
                    })
                    .collect(),
                rate_60s: 0.0,
                rate_session_avg: 0.0,
                built_at: at,
                health: ScanHealth::default(),
            }),
        }
    }

    #[test]
    fn test_older_snapshots_are_ignored() {
        let mut state = DashboardState::new(WindowSpec::Today);
        assert!(state.apply(published(2, WindowSpec::Today, 1)));
        assert!(!state.apply(published(1, WindowSpec::Today, 3)));
        assert_eq!(state.models().len(), 1);
        assert!(!state.is_stale());

        state.selected = WindowSpec::AllTime;
        assert!(state.is_stale());
        assert!(state.format_window().ends_with("(loading...)"));
    }

    #[test]
    fn test_scroll_behavior() {
        let mut state = DashboardState::new(WindowSpec::Today);
        state.apply(published(1, WindowSpec::Today, 10));

        state.scroll_down(5);
        assert_eq!(state.scroll_position, 1);
        assert_eq!(state.visible_models(5)[0].model, "model-1");
        assert_eq!(state.scroll_indicator(5), " (2-6 of 10)");

        state.scroll_up();
        state.scroll_up();
        assert_eq!(state.scroll_position, 0);

        for _ in 0..20 {
            state.scroll_down(5);
        }
        assert_eq!(state.scroll_position, 5);
    }

    #[test]
    fn test_preset_keys() {
        assert_eq!(DashboardState::preset_for_key('1'), Some(WindowSpec::WeekStart));
        assert_eq!(DashboardState::preset_for_key('6'), Some(WindowSpec::AllTime));
        assert_eq!(DashboardState::preset_for_key('0'), None);
        assert_eq!(DashboardState::preset_for_key('7'), None);
        assert_eq!(DashboardState::preset_for_key('x'), None);
    }
}
