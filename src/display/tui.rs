//! Terminal User Interface Implementation
//!
//! Main TUI loop using ratatui with the crossterm backend: terminal setup, key
//! handling and rendering. Snapshots come from the refresh driver's handoff, which is
//! read once per frame without waiting.

use super::state::DashboardState;
use super::widgets::{model_rows, render_dashboard, AppTheme};
use crate::live::DriverHandle;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::time::Duration;
use tracing::debug;

/// Frame interval for the render loop (milliseconds)
const FRAME_INTERVAL_MS: u64 = 200;

/// Terminal backend type alias
type TerminalBackend = CrosstermBackend<Stdout>;

/// Outcome of handling one key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Continue,
    Quit,
}

/// Dashboard manager for the live TUI
pub struct DashboardManager {
    terminal: Terminal<TerminalBackend>,
    state: DashboardState,
    driver: DriverHandle,
    theme: AppTheme,
}

impl DashboardManager {
    pub fn new(driver: DriverHandle) -> Result<Self> {
        let terminal = setup_terminal()?;
        let state = DashboardState::new(driver.window());

        Ok(Self {
            terminal,
            state,
            driver,
            theme: AppTheme::default(),
        })
    }

    /// Run until the user quits, then stop the driver.
    pub async fn run(mut self) -> Result<()> {
        let result = self.event_loop().await;
        cleanup_terminal(&mut self.terminal)?;
        self.driver.shutdown().await;
        result
    }

    async fn event_loop(&mut self) -> Result<()> {
        loop {
            if let Some(published) = self.driver.latest() {
                self.state.apply(published);
            }

            self.render()?;

            if event::poll(Duration::from_millis(FRAME_INTERVAL_MS))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if self.handle_key(key.code, key.modifiers)? == KeyAction::Quit {
                            return Ok(());
                        }
                    }
                    Event::Resize(_, _) => {}
                    _ => {}
                }
            } else {
                tokio::task::yield_now().await;
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Result<KeyAction> {
        if self.state.notice.take().is_some() {
            return Ok(KeyAction::Continue);
        }

        match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(KeyAction::Quit)
            }
            KeyCode::Char('q') | KeyCode::Esc => return Ok(KeyAction::Quit),
            KeyCode::Char(c) => {
                if let Some(window) = DashboardState::preset_for_key(c) {
                    match self.driver.set_window(window) {
                        Ok(()) => {
                            debug!(window = %window, "Window selected");
                            self.state.selected = window;
                            self.state.scroll_position = 0;
                        }
                        Err(e) => self.state.notice = Some(e.to_string()),
                    }
                } else if c == 'r' {
                    self.state.scroll_position = 0;
                }
            }
            KeyCode::Up => self.state.scroll_up(),
            KeyCode::Down => {
                let size = self.terminal.size().context("Failed to read terminal size")?;
                let area = ratatui::layout::Rect::new(0, 0, size.width, size.height);
                self.state.scroll_down(model_rows(area));
            }
            _ => {}
        }
        Ok(KeyAction::Continue)
    }

    fn render(&mut self) -> Result<()> {
        let state = &self.state;
        let theme = &self.theme;
        self.terminal
            .draw(|frame| {
                let area = frame.area();
                render_dashboard(frame, state, area, theme);
            })
            .context("Failed to draw dashboard")?;
        Ok(())
    }
}

/// Setup the terminal for TUI mode
fn setup_terminal() -> Result<Terminal<TerminalBackend>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to setup terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;
    Ok(terminal)
}

/// Cleanup terminal and restore normal mode
fn cleanup_terminal(terminal: &mut Terminal<TerminalBackend>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("Failed to cleanup terminal")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}
