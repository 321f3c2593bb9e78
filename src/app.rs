use std::io::{self, Stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Terminal;

use crate::audio::MetronomeEngine;
use crate::command::{Command, CommandBus, CommandSender, CommandSource};
use crate::scheduler::StateHandle;
use crate::settings::{save_settings, Settings};
use crate::ui::{render_footer, render_pads, render_transport, Theme};

/// How long a status message stays in the footer
const STATUS_TTL: Duration = Duration::from_secs(3);

/// Application state
pub struct App {
    /// Current theme
    theme: Theme,
    /// Engine thread running the click scheduler
    engine: MetronomeEngine,
    /// Command sender for dispatching commands
    command_sender: CommandSender,
    /// Shared metronome snapshot (written by the engine thread)
    state: StateHandle,
    /// Settings as loaded, updated on exit
    settings: Settings,
    settings_path: PathBuf,
    /// Whether the app should quit
    should_quit: bool,
    /// Temporary status message (e.g., "Audio re-initialized")
    status_message: Option<(String, Instant)>,
    /// Keeps the bus alive for the engine receiver
    _command_bus: CommandBus,
}

impl App {
    pub fn new(theme: Theme, settings: Settings, settings_path: PathBuf) -> Result<Self> {
        let command_bus = CommandBus::new();
        let command_sender = command_bus.sender();

        let engine = MetronomeEngine::new(&settings, &command_bus, CommandSource::Tui)?;
        let state = engine.state.clone();

        let mut app = Self {
            theme,
            engine,
            command_sender,
            state,
            settings,
            settings_path,
            should_quit: false,
            status_message: None,
            _command_bus: command_bus,
        };
        if !app.engine.audio_ready() {
            app.set_status("Audio unavailable - press r to retry".to_string());
        }
        Ok(app)
    }

    /// Run the main application loop
    pub fn run(&mut self) -> Result<()> {
        let mut terminal = Self::setup_terminal()?;

        let result = self.main_loop(&mut terminal);

        self.engine.shutdown();
        Self::restore_terminal(&mut terminal)?;
        self.persist_settings();

        result
    }

    /// Setup the terminal for TUI
    fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(terminal)
    }

    /// Restore terminal to normal state
    fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        Ok(())
    }

    /// Main event loop
    fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|frame| self.render(frame))?;

            // Poll for events with timeout for responsive UI (~60fps)
            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    // Only handle key press events (not release)
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Remember the last rate, volume and theme for next launch
    fn persist_settings(&mut self) {
        let state = self.state.snapshot();
        self.settings.bpm = state.target_rate;
        self.settings.volume = state.volume;
        self.settings.theme = self.theme.name.to_string();
        if let Err(e) = save_settings(&self.settings, &self.settings_path) {
            log::warn!("Could not save settings: {:#}", e);
        }
    }

    /// Dispatch a command to the engine thread
    fn dispatch(&mut self, cmd: Command) {
        if !self.command_sender.send(cmd, CommandSource::Tui) {
            self.set_status("Engine busy, command dropped".to_string());
        }
    }

    /// Set a temporary status message shown in the footer
    fn set_status(&mut self, msg: String) {
        self.status_message = Some((msg, Instant::now()));
    }

    /// Handle key press events
    fn handle_key(&mut self, key: KeyEvent) {
        if let Some(cmd) = command_for_key(key.code) {
            if cmd == Command::ReinitAudio {
                self.set_status("Re-initializing audio".to_string());
            }
            self.dispatch(cmd);
            return;
        }
        if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
            self.should_quit = true;
        }
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        // Clear with background color
        let bg_block = Block::default().style(Style::default().bg(self.theme.bg));
        frame.render_widget(bg_block, area);

        // Layout: header, transport, pads, footer
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Length(3), // Transport
                Constraint::Min(6),    // Pads
                Constraint::Length(3), // Footer
            ])
            .split(area);

        let state = self.state.snapshot();

        self.render_header(frame, chunks[0]);
        render_transport(frame, chunks[1], &state, &self.theme);
        render_pads(frame, chunks[2], &state, &self.theme);

        let status = self
            .status_message
            .as_ref()
            .filter(|(_, at)| at.elapsed() < STATUS_TTL)
            .map(|(msg, _)| msg.as_str());
        render_footer(frame, chunks[3], status, &self.theme);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let title = Line::from(vec![
            Span::styled(" CADENCE ", Style::default().fg(self.theme.highlight).bold()),
            Span::styled(
                format!("v{} ", env!("CARGO_PKG_VERSION")),
                Style::default().fg(self.theme.dimmed),
            ),
        ]);
        let header = Paragraph::new(title).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.border))
                .style(Style::default().bg(self.theme.bg)),
        );
        frame.render_widget(header, area);
    }
}

/// Map a key to the engine command it triggers, if any
fn command_for_key(key: KeyCode) -> Option<Command> {
    match key {
        KeyCode::Char(' ') | KeyCode::Enter => Some(Command::Toggle),
        KeyCode::Char('s') => Some(Command::Stop),
        KeyCode::Up | KeyCode::Char('k') => Some(Command::NudgeRate(1)),
        KeyCode::Down | KeyCode::Char('j') => Some(Command::NudgeRate(-1)),
        KeyCode::Right | KeyCode::Char('l') => Some(Command::NudgeRate(5)),
        KeyCode::Left | KeyCode::Char('h') => Some(Command::NudgeRate(-5)),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(Command::NudgeVolume(5)),
        KeyCode::Char('-') | KeyCode::Char('_') => Some(Command::NudgeVolume(-5)),
        KeyCode::Char('r') => Some(Command::ReinitAudio),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(command_for_key(KeyCode::Char(' ')), Some(Command::Toggle));
        assert_eq!(command_for_key(KeyCode::Up), Some(Command::NudgeRate(1)));
        assert_eq!(command_for_key(KeyCode::Left), Some(Command::NudgeRate(-5)));
        assert_eq!(command_for_key(KeyCode::Char('-')), Some(Command::NudgeVolume(-5)));
        assert_eq!(command_for_key(KeyCode::Char('r')), Some(Command::ReinitAudio));
        assert_eq!(command_for_key(KeyCode::Char('q')), None);
    }
}
