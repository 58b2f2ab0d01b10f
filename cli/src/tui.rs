//! A thin ratatui/crossterm driver exercising the core's call contract end to
//! end. This is a demo harness proving out `DataProvider`/`TableView`/
//! `EventBus` against the bundled mock controller — not a product UI (see
//! SPEC_FULL.md Non-goals).
//!
//! The loop shape (draw, poll-once-per-frame, non-blocking event check) is
//! grounded on the teacher's `cli/src/tui/mod.rs::run_app`, whose
//! `event::poll(Duration::from_millis(100))` is exactly the same
//! "non-blocking check, once per frame" idiom this crate's
//! `DataProvider::update` generalizes into a reusable library call instead of
//! TUI-specific code.

use anyhow::Result;
use chronoscope_core::bus::EventBus;
use chronoscope_core::controller::mock::{MockController, SyntheticTrace};
use chronoscope_core::controller::{TableArgs, TableKind};
use chronoscope_core::handle::{Handle, HandleKind};
use chronoscope_core::provider::{DataProvider, ProviderState};
use chronoscope_core::table::TableView;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;

struct App {
    provider: DataProvider,
    bus: EventBus,
    table_view: TableView,
    trace_path: String,
    status: String,
    requested_initial_table: bool,
    should_quit: bool,
}

impl App {
    fn new(trace_path: &str) -> Self {
        let controller = Arc::new(MockController::new(SyntheticTrace::default(), Duration::from_millis(30)));
        let mut provider = DataProvider::new(controller);
        provider.fetch_trace(trace_path);
        Self {
            provider,
            bus: EventBus::new(),
            table_view: TableView::new(TableKind::Event),
            trace_path: trace_path.to_string(),
            status: format!("loading {trace_path}..."),
            requested_initial_table: false,
            should_quit: false,
        }
    }

    fn tick(&mut self) {
        self.provider.update(&mut self.bus);
        if *self.provider.state() == ProviderState::Ready && !self.requested_initial_table {
            self.requested_initial_table = true;
            self.status = format!("{} — ready", self.trace_path);
            let table = Handle::new(1, HandleKind::Table);
            self.provider.fetch_table(
                table,
                TableKind::Event,
                TableArgs {
                    start_count: Some(self.table_view.visible_rows),
                    ..Default::default()
                },
            );
        }
        if let ProviderState::Error(reason) = self.provider.state() {
            self.status = format!("error: {reason}");
        }
    }

    fn scroll(&mut self, delta: i64) {
        let current = self.table_view.first_visible_row as i64;
        let next = (current + delta).max(0) as u64;
        self.table_view.scroll_to(next);
        if let Some(info) = self.provider.table(TableKind::Event) {
            if self.table_view.needs_refetch(info) {
                let (start, count) = self.table_view.request_window();
                let table = Handle::new(1, HandleKind::Table);
                self.provider.fetch_table(
                    table,
                    TableKind::Event,
                    TableArgs {
                        start_index: Some(start),
                        start_count: Some(count),
                        ..Default::default()
                    },
                );
            }
        }
    }
}

/// Runs the demo TUI until the user quits. Mirrors the teacher's
/// `launch_tui`/`launch_tui_blocking` split, minus the now-irrelevant async
/// wrapper (nothing here needs an async runtime — see DESIGN.md).
pub fn launch(trace_path: &str) -> Result<()> {
    println!("Starting chronoscope demo viewer...");
    println!("Opening: {trace_path}");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(trace_path);
    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    terminal.draw(|f| ui(f, app))?;

    while !app.should_quit {
        app.tick();
        terminal.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
                    KeyCode::Down => app.scroll(1),
                    KeyCode::Up => app.scroll(-1),
                    KeyCode::PageDown => app.scroll(app.table_view.visible_rows as i64),
                    KeyCode::PageUp => app.scroll(-(app.table_view.visible_rows as i64)),
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(f.size());

    let status = Paragraph::new(app.status.as_str()).block(Block::default().title("chronoscope").borders(Borders::ALL));
    f.render_widget(status, chunks[0]);

    let rows: Vec<ListItem> = match app.provider.table(TableKind::Event) {
        Some(info) if !info.rows.is_empty() => info
            .rows
            .iter()
            .skip(app.table_view.first_visible_row.saturating_sub(info.window_start) as usize)
            .take(app.table_view.visible_rows as usize)
            .map(|row| ListItem::new(row.0.join("  ")))
            .collect(),
        _ => vec![ListItem::new("(loading events...)")],
    };
    let header = app
        .provider
        .table(TableKind::Event)
        .map(|info| info.header.join("  "))
        .unwrap_or_default();
    let list = List::new(rows).block(
        Block::default()
            .title(format!("events — {header}"))
            .borders(Borders::ALL),
    ).highlight_style(Style::default().add_modifier(Modifier::BOLD));
    f.render_widget(list, chunks[1]);
}
