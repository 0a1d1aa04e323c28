// SPDX-License-Identifier: GPL-3.0-only

//! Terminal front end for a streaming session
//!
//! Shows the live session snapshot and maps keys to session intents. The video
//! preview itself is drawn by GStreamer in its own window; the terminal is the
//! control surface.

use crate::backends::gst::GstStreamClient;
use crate::backends::{AttachedResources, connection_events};
use crate::config::Config;
use crate::constants::{format_bitrate, timing};
use crate::session::{FilterSelection, SessionController, SessionPhase, SessionState};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
};
use std::io::{self, stdout};
use std::sync::{Arc, mpsc};
use tracing::info;

/// Run the interactive terminal session
pub fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;

    let (events_tx, events_rx) = connection_events();
    let client = Arc::new(GstStreamClient::new(config.clone(), events_tx)?);
    let controller = Arc::new(SessionController::from_config(&config));
    controller.attach(AttachedResources::from_backend(client));
    runtime.spawn(Arc::clone(&controller).pump_events(events_rx));

    // Forward snapshots to the draw loop
    let (snapshot_tx, snapshot_rx) = mpsc::channel();
    let mut snapshots = Box::pin(controller.subscribe());
    runtime.spawn(async move {
        while let Some(state) = snapshots.next().await {
            if snapshot_tx.send(state).is_err() {
                break;
            }
        }
    });

    controller.start_preview();

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &controller, &config, snapshot_rx);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    controller.request_stop();
    controller.detach();
    runtime.shutdown_timeout(timing::STATE_CHANGE_TIMEOUT);

    result
}

/// Presentation-only state of the terminal
struct UiState {
    session: SessionState,
    filter: FilterSelection,
    /// URL being edited, if the edit field is open
    editing: Option<String>,
    show_help: bool,
    status_message: String,
}

impl UiState {
    fn new(session: SessionState) -> Self {
        Self {
            session,
            filter: FilterSelection::None,
            editing: None,
            show_help: false,
            status_message: build_status_message(),
        }
    }
}

/// Outcome of one key press
enum KeyAction {
    Continue,
    Quit,
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    controller: &SessionController,
    config: &Config,
    snapshots: mpsc::Receiver<SessionState>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut ui = UiState::new(controller.snapshot());
    let bitrate = format!(
        "{}x{}@{} {} ({})",
        config.video.width,
        config.video.height,
        config.video.framerate,
        format_bitrate(config.video_bitrate_kbps()),
        config.bitrate_preset.display_name()
    );

    loop {
        // Drain to the latest snapshot
        while let Ok(state) = snapshots.try_recv() {
            ui.session = state;
        }

        terminal.draw(|f| {
            let area = f.area();
            let session_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };
            f.render_widget(
                SessionView {
                    ui: &ui,
                    format: &bitrate,
                },
                session_area,
            );

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                StatusBar {
                    message: &ui.status_message,
                },
                status_area,
            );
        })?;

        if event::poll(timing::UI_POLL_INTERVAL)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            let action = if ui.editing.is_some() {
                handle_edit_key(&mut ui, controller, key)
            } else {
                handle_key(&mut ui, controller, key)
            };
            if let KeyAction::Quit = action {
                break;
            }
        }
    }

    Ok(())
}

fn handle_edit_key(ui: &mut UiState, controller: &SessionController, key: KeyEvent) -> KeyAction {
    let Some(buffer) = ui.editing.as_mut() else {
        return KeyAction::Continue;
    };
    match key.code {
        KeyCode::Enter => {
            let url = std::mem::take(buffer);
            info!(url = %url, "Destination edited");
            controller.set_url(url);
            ui.editing = None;
            ui.status_message = build_status_message();
        }
        KeyCode::Esc => {
            ui.editing = None;
            ui.status_message = build_status_message();
        }
        KeyCode::Backspace => {
            buffer.pop();
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return KeyAction::Quit;
        }
        KeyCode::Char(c) => buffer.push(c),
        _ => {}
    }
    KeyAction::Continue
}

fn handle_key(ui: &mut UiState, controller: &SessionController, key: KeyEvent) -> KeyAction {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return KeyAction::Quit;
    }

    match key.code {
        KeyCode::Char('q') => return KeyAction::Quit,
        KeyCode::Char('s') => {
            if ui.session.can_start() {
                controller.request_start();
                ui.status_message = "Starting stream...".into();
            } else {
                ui.status_message = "Already live".into();
            }
        }
        KeyCode::Char('x') => {
            controller.request_stop();
            ui.status_message = "Stopped".into();
        }
        KeyCode::Char('p') => {
            controller.start_preview();
            ui.status_message = build_status_message();
        }
        KeyCode::Char('b') => ui.filter = controller.toggle_filter(FilterSelection::Beauty),
        KeyCode::Char('c') => ui.filter = controller.toggle_filter(FilterSelection::Cartoon),
        KeyCode::Char('l') => ui.filter = controller.toggle_filter(FilterSelection::Blur),
        KeyCode::Char('f') => {
            controller.switch_camera();
            ui.status_message = "Switching camera".into();
        }
        KeyCode::Char('e') => {
            ui.editing = Some(ui.session.target_url.clone());
            ui.status_message = "Enter: apply | Esc: cancel".into();
        }
        KeyCode::Char('h') => {
            ui.show_help = !ui.show_help;
            ui.status_message = if ui.show_help {
                build_help_message()
            } else {
                build_status_message()
            };
        }
        _ => {}
    }

    KeyAction::Continue
}

fn build_status_message() -> String {
    "'s' start | 'x' stop | 'e' edit URL | 'h' help | 'q' quit".to_string()
}

fn build_help_message() -> String {
    "s: Start | x: Stop | p: Preview | b/c/l: Beauty/Cartoon/Blur | f: Switch camera | e: Edit URL | q/Ctrl+C: Quit"
        .to_string()
}

fn phase_style(phase: SessionPhase) -> Style {
    let color = match phase {
        SessionPhase::Idle => Color::Gray,
        SessionPhase::Connecting => Color::Yellow,
        SessionPhase::Streaming => Color::Green,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

/// Widget showing the session snapshot
struct SessionView<'a> {
    ui: &'a UiState,
    format: &'a str,
}

impl Widget for SessionView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let label = Style::default().fg(Color::DarkGray);
        let value = Style::default().fg(Color::White);
        let session = &self.ui.session;

        let url = match &self.ui.editing {
            Some(buffer) => format!("{}_", buffer),
            None => session.target_url.clone(),
        };
        let url_style = if self.ui.editing.is_some() {
            value.add_modifier(Modifier::UNDERLINED)
        } else {
            value
        };

        let phase = session.phase();
        let rows: [(&str, String, Style); 5] = [
            ("URL", url, url_style),
            ("State", phase.description().to_uppercase(), phase_style(phase)),
            (
                "Preview",
                if session.preview_on { "ON" } else { "OFF" }.to_string(),
                value,
            ),
            ("Filter", self.ui.filter.display_name().to_string(), value),
            ("Format", self.format.to_string(), value),
        ];

        let x = area.x + 2;
        let mut y = area.y + 1;
        buf.set_string(
            x,
            y,
            "LIVESTREAM",
            Style::default().add_modifier(Modifier::BOLD),
        );
        y += 2;

        for (name, text, style) in rows {
            if y >= area.y + area.height {
                return;
            }
            buf.set_string(x, y, format!("{:<8}", name), label);
            buf.set_stringn(
                x + 9,
                y,
                &text,
                area.width.saturating_sub(11) as usize,
                style,
            );
            y += 1;
        }

        if let Some(err) = &session.last_error
            && y + 1 < area.y + area.height
        {
            buf.set_stringn(
                x,
                y + 1,
                format!("Error: {}", err),
                area.width.saturating_sub(4) as usize,
                Style::default().fg(Color::Red),
            );
        }
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        buf.set_stringn(
            area.x,
            area.y,
            self.message,
            area.width as usize,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}
