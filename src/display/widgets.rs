//! Custom TUI Widgets for the Dashboard
//!
//! Styled blocks for the window header, totals and rates, the per-model table and the
//! status line.

use super::state::DashboardState;
use crate::models::ModelUsage;
use crate::report::{format_health, format_tokens};
use crate::window::WindowSpec;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

/// Style constants for consistent theming
pub struct AppTheme {
    pub primary: Style,
    pub secondary: Style,
    pub accent: Style,
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub muted: Style,
}

impl Default for AppTheme {
    fn default() -> Self {
        Self {
            primary: Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            secondary: Style::default().fg(Color::Cyan),
            accent: Style::default().fg(Color::Yellow),
            success: Style::default().fg(Color::Green),
            warning: Style::default().fg(Color::Yellow),
            error: Style::default().fg(Color::Red),
            muted: Style::default().fg(Color::DarkGray),
        }
    }
}

/// Window label and totals
pub struct HeaderWidget<'a> {
    window_text: &'a str,
    totals_text: &'a str,
    stale: bool,
    theme: &'a AppTheme,
}

impl<'a> HeaderWidget<'a> {
    pub fn new(window_text: &'a str, totals_text: &'a str, stale: bool, theme: &'a AppTheme) -> Self {
        Self {
            window_text,
            totals_text,
            stale,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let header_block = Block::default()
            .title(format!("Claude Usage: {}", self.window_text))
            .title_style(self.theme.primary)
            .borders(Borders::ALL)
            .border_style(self.theme.secondary);

        let style = if self.stale {
            self.theme.muted
        } else {
            self.theme.success
        };
        let header_text = Paragraph::new(self.totals_text)
            .style(style)
            .alignment(Alignment::Center)
            .block(header_block);

        frame.render_widget(header_text, area);
    }
}

/// Consumption rates
pub struct RatesWidget<'a> {
    rates_text: Option<&'a str>,
    theme: &'a AppTheme,
}

impl<'a> RatesWidget<'a> {
    pub fn new(rates_text: Option<&'a str>, theme: &'a AppTheme) -> Self {
        Self { rates_text, theme }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title("Rates")
            .title_style(self.theme.primary)
            .borders(Borders::ALL)
            .border_style(self.theme.secondary);

        let line = match self.rates_text {
            Some(text) => Line::from(vec![
                Span::styled("├─ ", self.theme.muted),
                Span::styled(text, self.theme.accent),
            ]),
            None => Line::from(vec![
                Span::styled("├─ ", self.theme.muted),
                Span::styled("No data yet", self.theme.muted),
            ]),
        };

        let paragraph = Paragraph::new(Text::from(vec![line]))
            .block(block)
            .wrap(Wrap { trim: true });

        frame.render_widget(paragraph, area);
    }
}

/// Per-model breakdown with scrolling
pub struct ModelTableWidget<'a> {
    models: &'a [ModelUsage],
    scroll_indicator: &'a str,
    theme: &'a AppTheme,
    can_scroll: bool,
}

impl<'a> ModelTableWidget<'a> {
    pub fn new(
        models: &'a [ModelUsage],
        scroll_indicator: &'a str,
        theme: &'a AppTheme,
        can_scroll: bool,
    ) -> Self {
        Self {
            models,
            scroll_indicator,
            theme,
            can_scroll,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let title = if self.can_scroll {
            format!("Models (↑/↓ to scroll){}", self.scroll_indicator)
        } else {
            "Models".to_string()
        };

        let block = Block::default()
            .title(title)
            .title_style(self.theme.primary)
            .borders(Borders::ALL)
            .border_style(self.theme.secondary);

        if self.models.is_empty() {
            let empty_text = Paragraph::new("No usage in this window")
                .style(self.theme.muted)
                .alignment(Alignment::Center)
                .block(block);

            frame.render_widget(empty_text, area);
            return;
        }

        let items: Vec<ListItem> = self
            .models
            .iter()
            .map(|usage| {
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{:<36}", usage.model), self.theme.secondary),
                    Span::styled(
                        format!("{:>10} tokens ", format_tokens(usage.total_tokens)),
                        self.theme.accent,
                    ),
                    Span::styled(format!("{:>10} ", format!("${:.2}", usage.total_cost_usd)), self.theme.success),
                    Span::styled(format!("({} requests)", usage.record_count), self.theme.muted),
                ]))
            })
            .collect();

        let list = List::new(items).block(block).style(self.theme.primary);

        frame.render_widget(list, area);
    }
}

/// Key help and scan health
pub struct StatusWidget<'a> {
    health_text: Option<&'a str>,
    theme: &'a AppTheme,
}

impl<'a> StatusWidget<'a> {
    pub fn new(health_text: Option<&'a str>, theme: &'a AppTheme) -> Self {
        Self { health_text, theme }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let mut spans = Vec::new();
        for (index, preset) in WindowSpec::PRESETS.iter().enumerate() {
            spans.push(Span::styled(format!("{}", index + 1), self.theme.accent));
            spans.push(Span::styled(format!(" {}  ", preset.label()), self.theme.muted));
        }
        spans.push(Span::styled("q", self.theme.accent));
        spans.push(Span::styled(" quit", self.theme.muted));
        if let Some(health) = self.health_text {
            spans.push(Span::styled(format!("  ⚠ {}", health), self.theme.warning));
        }

        let paragraph = Paragraph::new(Line::from(spans)).alignment(Alignment::Center);

        frame.render_widget(paragraph, area);
    }
}

/// Overlay for messages such as a rejected window selection
pub struct NoticeOverlayWidget<'a> {
    message: &'a str,
    theme: &'a AppTheme,
}

impl<'a> NoticeOverlayWidget<'a> {
    pub fn new(message: &'a str, theme: &'a AppTheme) -> Self {
        Self { message, theme }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let popup_area = centered_rect(60, 20, area);

        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Notice")
            .title_style(self.theme.error)
            .borders(Borders::ALL)
            .border_style(self.theme.error);

        let text = Text::from(vec![
            Line::from(Span::styled(self.message, self.theme.primary)),
            Line::from(""),
            Line::from(Span::styled("Press any key to dismiss", self.theme.muted)),
        ]);

        let paragraph = Paragraph::new(text)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });

        frame.render_widget(paragraph, popup_area);
    }
}

/// Create a layout for the main display
pub fn create_main_layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Rates
            Constraint::Min(6),    // Models (expandable)
            Constraint::Length(1), // Status line
        ])
        .split(area)
        .to_vec()
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Visible rows in the model table for a frame of `area`.
pub fn model_rows(area: Rect) -> usize {
    create_main_layout(area)[2].height.saturating_sub(2) as usize
}

/// Render the complete dashboard
pub fn render_dashboard(frame: &mut Frame, state: &DashboardState, area: Rect, theme: &AppTheme) {
    let chunks = create_main_layout(area);

    let window_text = state.format_window();
    let totals_text = state.format_totals();
    HeaderWidget::new(&window_text, &totals_text, state.is_stale(), theme).render(frame, chunks[0]);

    let rates_text = state.format_rates();
    RatesWidget::new(rates_text.as_deref(), theme).render(frame, chunks[1]);

    let table_area = chunks[2];
    let available_lines = table_area.height.saturating_sub(2) as usize; // borders
    let scroll_indicator = state.scroll_indicator(available_lines);
    ModelTableWidget::new(
        state.visible_models(available_lines),
        &scroll_indicator,
        theme,
        state.can_scroll(available_lines),
    )
    .render(frame, table_area);

    let health_text = state.health().as_ref().and_then(format_health);
    StatusWidget::new(health_text.as_deref(), theme).render(frame, chunks[3]);

    if let Some(notice) = &state.notice {
        NoticeOverlayWidget::new(notice, theme).render(frame, area);
    }
}
