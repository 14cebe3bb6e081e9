use anyhow::Result;
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Position};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use scopeguard::defer;
use std::io::stdout;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

use webtrace::export::export_json_file;
use webtrace::state::{Action, LiveView, TraceRequest};
use webtrace::trace::{SessionController, SessionEvent, Transport};

use crate::tui::theme::Theme;
use crate::tui::views::{HelpView, MainView};

const PAGE: usize = 10;

/// What a key press asks the controller to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    None,
    Run(TraceRequest),
    Abort,
    Export,
    Quit,
}

/// UI state
#[derive(Default)]
pub struct UiState {
    /// Target being typed
    pub input: String,
    pub action: Action,
    /// Address family sent with every run
    pub aftype: Option<String>,
    /// Show help overlay
    pub show_help: bool,
    /// Status message to display
    pub status_message: Option<(String, Instant)>,
    /// Current theme index
    pub theme_index: usize,
    /// Output lines scrolled back from the tail
    pub scroll_back: usize,
}

impl UiState {
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    pub fn clear_old_status(&mut self) {
        if let Some((_, time)) = &self.status_message
            && time.elapsed() > Duration::from_secs(3)
        {
            self.status_message = None;
        }
    }

    pub fn on_session_event(&mut self, event: SessionEvent) {
        if let SessionEvent::Started(_) = event {
            self.scroll_back = 0;
        }
    }

    /// Map a key press to UI changes and a controller command
    pub fn handle_key(&mut self, key: KeyEvent, theme_count: usize) -> Command {
        // Any key closes the help overlay
        if self.show_help {
            self.show_help = false;
            return Command::None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => return Command::Quit,
            KeyCode::Char('e') if ctrl => return Command::Export,
            KeyCode::Char('t') if ctrl => {
                self.theme_index = (self.theme_index + 1) % theme_count.max(1);
            }
            KeyCode::Char(_) if ctrl => {}
            KeyCode::Char(c) => self.input.push(c),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Tab => {
                self.action = self.action.next();
                self.set_status(format!("Action: {}", self.action));
            }
            KeyCode::Enter => {
                let target = self.input.trim();
                if target.is_empty() {
                    self.set_status("Enter a target first");
                } else {
                    return Command::Run(
                        TraceRequest::new(self.action, target).with_aftype(self.aftype.clone()),
                    );
                }
            }
            KeyCode::Esc => return Command::Abort,
            KeyCode::F(1) => self.show_help = true,
            KeyCode::Up => self.scroll_back += 1,
            KeyCode::Down => self.scroll_back = self.scroll_back.saturating_sub(1),
            KeyCode::PageUp => self.scroll_back += PAGE,
            KeyCode::PageDown => self.scroll_back = self.scroll_back.saturating_sub(PAGE),
            _ => {}
        }
        Command::None
    }
}

/// Startup settings for the TUI
pub struct TuiOptions {
    pub theme: Theme,
    pub action: Action,
    pub aftype: Option<String>,
    /// Prefilled target; run immediately when present
    pub target: Option<String>,
    pub server: String,
}

/// What to persist after the TUI exits
pub struct TuiOutcome {
    pub theme: String,
    pub action: Action,
}

/// Run the TUI application until the user quits
pub async fn run_tui<T: Transport>(
    controller: &SessionController<T>,
    events: UnboundedReceiver<SessionEvent>,
    options: TuiOptions,
) -> Result<TuiOutcome> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    // Ensure terminal is restored on any exit (success, error, or panic)
    defer! {
        let _ = disable_raw_mode();
        let _ = stdout().execute(LeaveAlternateScreen);
    }

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;

    let theme_names = Theme::list();
    let theme_index = theme_names
        .iter()
        .position(|&name| name == options.theme.name())
        .unwrap_or(0);

    let mut ui_state = UiState {
        input: options.target.clone().unwrap_or_default(),
        action: options.action,
        aftype: options.aftype.clone(),
        theme_index,
        ..Default::default()
    };

    if let Some(ref target) = options.target {
        controller.start(TraceRequest::new(options.action, target.clone()).with_aftype(options.aftype));
    }

    run_app(
        &mut terminal,
        controller,
        events,
        &mut ui_state,
        &options.server,
        Duration::from_millis(100),
    )
    .await?;

    // Nothing should keep streaming once the screen is gone
    controller.abort();

    Ok(TuiOutcome {
        theme: theme_names[ui_state.theme_index].to_string(),
        action: ui_state.action,
    })
}

async fn run_app<B, T>(
    terminal: &mut Terminal<B>,
    controller: &SessionController<T>,
    mut events: UnboundedReceiver<SessionEvent>,
    ui_state: &mut UiState,
    server: &str,
    tick_rate: Duration,
) -> Result<()>
where
    B: ratatui::backend::Backend,
    T: Transport,
{
    let theme_names = Theme::list();

    loop {
        ui_state.clear_old_status();
        while let Ok(event) = events.try_recv() {
            ui_state.on_session_event(event);
        }

        let theme = Theme::by_name(theme_names[ui_state.theme_index]);

        terminal.draw(|f| {
            let view = controller.view();
            ui_state.scroll_back = ui_state.scroll_back.min(view.output.len());
            draw_ui(f, &view, ui_state, &theme, server);
        })?;

        // Handle input with timeout
        if event::poll(tick_rate)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match ui_state.handle_key(key, theme_names.len()) {
                Command::None => {}
                Command::Quit => break,
                Command::Run(request) => {
                    let handle = controller.start(request);
                    ui_state.set_status(format!("Started {}", handle.id()));
                }
                Command::Abort => match controller.abort() {
                    Some(id) => ui_state.set_status(format!("Stopped {}", id)),
                    None => ui_state.set_status("Nothing running"),
                },
                Command::Export => match controller.report() {
                    Some(report) => match export_json_file(&report) {
                        Ok(filename) => ui_state.set_status(format!("Exported to {}", filename)),
                        Err(e) => ui_state.set_status(format!("Export failed: {}", e)),
                    },
                    None => ui_state.set_status("Nothing to export"),
                },
            }
        }
    }

    Ok(())
}

fn draw_ui(f: &mut ratatui::Frame, view: &LiveView, ui_state: &UiState, theme: &Theme, server: &str) {
    let area = f.area();

    // Layout: input line + main view + status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let input_block = Block::default()
        .title(format!(" {} ", server))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border));
    let input_inner = input_block.inner(chunks[0]);
    let prefix = format!("[{}] ", ui_state.action);
    let input = Paragraph::new(Line::from(vec![
        Span::styled(
            prefix.clone(),
            Style::default().fg(theme.header).add_modifier(Modifier::BOLD),
        ),
        Span::styled(ui_state.input.as_str(), Style::default().fg(theme.text)),
    ]))
    .block(input_block);
    f.render_widget(input, chunks[0]);

    if !ui_state.show_help {
        let cursor_x = input_inner.x + (prefix.chars().count() + ui_state.input.chars().count()) as u16;
        f.set_cursor_position(Position::new(
            cursor_x.min(input_inner.right().saturating_sub(1)),
            input_inner.y,
        ));
    }

    f.render_widget(
        MainView::new(view, theme).with_scroll_back(ui_state.scroll_back),
        chunks[1],
    );

    // Status bar
    let mut spans = Vec::new();
    if let Some(status) = view.status() {
        spans.push(Span::styled(
            view.status_text(),
            Style::default().fg(theme.status_color(status)).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(" \u{2502} "));
    }
    let hint = match ui_state.status_message {
        Some((ref msg, _)) => msg.clone(),
        None => "Enter run | Tab trace/mtr | Esc stop | ^T theme | ^E export | F1 help | ^C quit"
            .to_string(),
    };
    spans.push(Span::styled(hint, Style::default().fg(theme.text_dim)));
    f.render_widget(Paragraph::new(Line::from(spans)), chunks[2]);

    // Overlays
    if ui_state.show_help {
        f.render_widget(HelpView::new(theme, server), area);
    }
}
