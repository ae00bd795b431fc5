//! Minimal ratatui front-end: a Run/Stop/Diagnose menu plus a status pane
//! fed by the watcher's event stream. Stop halts the watcher and exits, the
//! same way `q` does.

use adhush::actuate::{build_actuator, platform_backend};
use adhush::config::AppConfig;
use adhush::detect::AudioState;
use adhush::doctor::{append_snapshot, base_doctor_report, collect_snapshot};
use adhush::terminal_restore::TerminalRestoreGuard;
use adhush::vision::{FrameSource, ReferenceLibrary};
use adhush::{log_debug, spawn_watcher, WatcherEvent, WatcherHandle};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Terminal,
};
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const MENU_ITEMS: [&str; 3] = ["Run", "Stop", "Diagnose"];
const MENU_POLL_MS: u64 = 100;

struct MenuApp {
    config: AppConfig,
    library: Arc<ReferenceLibrary>,
    source: Arc<Mutex<dyn FrameSource + Send>>,
    selected: usize,
    watcher: Option<WatcherHandle>,
    ad_visible: bool,
    observed: AudioState,
    status: String,
    overlay: Option<String>,
}

/// Configure the terminal, run the menu loop, and tear everything down.
pub fn run(
    config: &AppConfig,
    library: Arc<ReferenceLibrary>,
    source: Arc<Mutex<dyn FrameSource + Send>>,
) -> Result<()> {
    let guard = TerminalRestoreGuard::new();
    guard.enable_raw_mode()?;
    let mut stdout = io::stdout();
    guard.enter_alt_screen(&mut stdout)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = MenuApp {
        config: config.clone(),
        library,
        source,
        selected: 0,
        watcher: None,
        ad_visible: false,
        observed: AudioState::Unknown,
        status: "select Run to start watching".to_string(),
        overlay: None,
    };
    let result = app_loop(&mut terminal, &mut app);
    app.stop_watcher();

    drop(terminal);
    guard.restore();
    result
}

fn app_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut MenuApp,
) -> Result<()> {
    terminal.draw(|frame| draw(frame, app))?;

    loop {
        let mut should_draw = app.drain_watcher_events();
        let mut should_quit = false;

        if event::poll(Duration::from_millis(MENU_POLL_MS))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    should_quit = app.handle_key(key);
                    should_draw = true;
                }
                Event::Resize(_, _) => should_draw = true,
                _ => {}
            }
        }

        if should_draw {
            terminal.draw(|frame| draw(frame, app))?;
        }
        if should_quit {
            break;
        }
    }
    Ok(())
}

impl MenuApp {
    /// Returns true when the app should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.overlay.is_some() {
            self.overlay = None;
            return false;
        }
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.checked_sub(1).unwrap_or(MENU_ITEMS.len() - 1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected = (self.selected + 1) % MENU_ITEMS.len();
            }
            KeyCode::Enter | KeyCode::Char(' ') => match self.selected {
                0 => self.start_watcher(),
                1 => return true,
                _ => self.run_diagnose(),
            },
            KeyCode::Char('q') | KeyCode::Esc => return true,
            _ => {}
        }
        false
    }

    fn start_watcher(&mut self) {
        let running = self.watcher.as_ref().map_or(false, |w| !w.is_finished());
        if running {
            self.status = "already watching".to_string();
            return;
        }
        let watcher_config = self.config.watcher_config();
        let actuator = build_actuator(&watcher_config, self.library.clone(), self.source.clone());
        self.watcher = Some(spawn_watcher(
            &watcher_config,
            self.library.clone(),
            self.source.clone(),
            actuator,
        ));
        self.status = "watching".to_string();
        log_debug("watcher started from menu");
    }

    fn stop_watcher(&mut self) {
        if let Some(handle) = self.watcher.take() {
            if let Some(metrics) = handle.join() {
                log_debug(&format!(
                    "watcher stopped from menu after {} cycle(s)",
                    metrics.cycles
                ));
            }
        }
        self.ad_visible = false;
    }

    fn run_diagnose(&mut self) {
        log_debug("diagnostics requested from menu");
        let mut backend = platform_backend();
        let snapshot = {
            let mut source = self.source.lock().unwrap_or_else(PoisonError::into_inner);
            collect_snapshot(&self.config, &self.library, &mut *source, backend.as_mut())
        };
        let mut report = base_doctor_report(&self.config, "adhush");
        append_snapshot(&mut report, &snapshot);
        self.overlay = Some(format!("{}\n\npress any key to return", report.render()));
    }

    fn drain_watcher_events(&mut self) -> bool {
        let Some(handle) = self.watcher.as_ref() else {
            return false;
        };
        let mut changed = false;
        while let Some(event) = handle.try_event() {
            changed = true;
            match event {
                WatcherEvent::AdStarted { reference } => {
                    self.ad_visible = true;
                    self.status = format!("ad on screen ({reference})");
                }
                WatcherEvent::AdEnded => {
                    self.ad_visible = false;
                    self.status = "no ad on screen".to_string();
                }
                WatcherEvent::Actuated { muted } => {
                    self.status = if muted { "muted" } else { "unmuted" }.to_string();
                }
                WatcherEvent::ActuatorFailed { message } => {
                    self.status = format!("actuator failed: {message}");
                }
                WatcherEvent::CaptureFailed => {
                    self.status = "screen capture failed; retrying".to_string();
                }
                WatcherEvent::ObservedState { state } => self.observed = state,
                WatcherEvent::Stopped { .. } => {
                    self.status = "watcher stopped".to_string();
                }
            }
        }
        changed
    }
}

fn draw(frame: &mut ratatui::Frame, app: &MenuApp) {
    let area = frame.size();

    if let Some(text) = &app.overlay {
        let block = Block::default()
            .title("Diagnostics")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded);
        frame.render_widget(Paragraph::new(text.as_str()).block(block), area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(MENU_ITEMS.len() as u16 + 2),
            Constraint::Min(3),
        ])
        .split(area);

    let mut lines = Vec::new();
    for (index, item) in MENU_ITEMS.iter().enumerate() {
        let (marker, style) = if index == app.selected {
            (
                "▸ ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )
        } else {
            ("  ", Style::default())
        };
        lines.push(Line::from(vec![Span::raw(marker), Span::styled(*item, style)]));
    }
    let menu = Paragraph::new(lines).block(
        Block::default()
            .title("AdHush")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded),
    );
    frame.render_widget(menu, chunks[0]);

    let running = app.watcher.as_ref().map_or(false, |w| !w.is_finished());
    let status_lines = vec![
        Line::from(format!(
            "watcher: {}",
            if running { "running" } else { "stopped" }
        )),
        Line::from(format!(
            "ad: {}",
            if app.ad_visible { "on screen" } else { "none" }
        )),
        Line::from(format!("on-screen state: {}", app.observed.label())),
        Line::from(app.status.clone()),
    ];
    let status = Paragraph::new(status_lines).block(
        Block::default()
            .title("Status")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded),
    );
    frame.render_widget(status, chunks[1]);
}
