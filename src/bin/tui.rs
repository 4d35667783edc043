//! Office locator TUI - interactive head-office lookup
//!
//! Type a company name and press Enter. Displays:
//! - Status line (searching, found, warnings)
//! - Result panel (name, number/status, address, franchise/territory badges)
//! - Signals and details lists
//! - World map with the head office marker
//!
//! Logs go to a file so the terminal stays clean.

use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use office_locator::domain::company::{CompanyRecord, GeoPoint};
use office_locator::infra::logging::init_file_logging;
use office_locator::infra::Config;
use office_locator::io::capabilities::{CannedSpeech, MapWidget, NoSpeech, SpeechError, SpeechInput};
use office_locator::io::LookupError;
use office_locator::services::render::{Badge, BadgeTone, MAP_UNAVAILABLE};
use office_locator::services::{AppState, LookupService, Tone};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::canvas::{Canvas, Map, MapResolution},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::info;

/// Degrees shown around a marker
const MARKER_SPAN_LON: f64 = 12.0;
const MARKER_SPAN_LAT: f64 = 6.0;

#[derive(Parser, Debug)]
#[command(name = "office-locator-tui", version, about)]
struct Args {
    /// Path to a KEY=VALUE config file (default: .env.local, env.local)
    #[arg(short, long)]
    config: Option<String>,

    /// Log file
    #[arg(long, default_value = "office-locator-tui.log")]
    log_file: PathBuf,

    /// Transcript returned by voice input (F2); voice input is off without it
    #[arg(long)]
    speech_text: Option<String>,
}

/// Map widget drawn with the ratatui canvas world map
#[derive(Debug, Default)]
struct CanvasMap {
    marker: Option<(GeoPoint, String)>,
}

impl MapWidget for CanvasMap {
    fn show_marker(&mut self, point: &GeoPoint, popup: &str) {
        self.marker = Some((point.clone(), popup.to_string()));
    }

    fn clear(&mut self) {
        self.marker = None;
    }
}

/// Results delivered back to the UI loop
enum UiMsg {
    Search(Result<CompanyRecord, LookupError>),
    Speech(Result<String, SpeechError>),
}

struct Session {
    state: AppState<CanvasMap>,
    service: Arc<LookupService>,
    speech: Arc<dyn SpeechInput>,
    tx: mpsc::UnboundedSender<UiMsg>,
    config_label: String,
    tile_url: String,
}

impl Session {
    fn spawn_search(&self, query: String) {
        let service = self.service.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = service.search(&query).await;
            let _ = tx.send(UiMsg::Search(outcome));
        });
    }

    fn spawn_listen(&self) {
        let speech = self.speech.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = speech.listen_once().await;
            let _ = tx.send(UiMsg::Speech(outcome));
        });
    }

    fn submit(&mut self) {
        if let Some(query) = self.state.begin_search() {
            info!(query = %query, "search_submitted");
            self.spawn_search(query);
        }
    }

    fn handle(&mut self, msg: UiMsg) {
        match msg {
            UiMsg::Search(outcome) => self.state.finish_search(outcome),
            UiMsg::Speech(outcome) => {
                if let Some(query) = self.state.finish_listening(outcome) {
                    self.spawn_search(query);
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_file_logging(&args.log_file)
        .with_context(|| format!("Failed to open log file {}", args.log_file.display()))?;

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load(&[]),
    };
    let config_label = if config.config_file() == "default" {
        "built-in defaults (no .env.local found)".to_string()
    } else {
        config.config_file().to_string()
    };
    info!(
        config_file = %config.config_file(),
        provider = %config.provider().as_str(),
        territory_keyword = %config.territory_keyword(),
        "config_loaded"
    );

    let service = Arc::new(LookupService::from_config(&config).context("Failed to build HTTP client")?);
    let speech: Arc<dyn SpeechInput> = match args.speech_text.clone() {
        Some(text) => Arc::new(CannedSpeech(text)),
        None => Arc::new(NoSpeech),
    };
    let (tx, rx) = mpsc::unbounded_channel();

    let mut session = Session {
        state: AppState::new(CanvasMap::default(), speech.is_available()),
        service: service.clone(),
        speech,
        tx,
        config_label,
        tile_url: config.osm_tile_url().to_string(),
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_ui(&mut terminal, &mut session, rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    service.metrics().report().log();
    result
}

async fn run_ui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &mut Session,
    mut rx: mpsc::UnboundedReceiver<UiMsg>,
) -> anyhow::Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(msg) = rx.try_recv() {
            session.handle(msg);
        }

        terminal.draw(|f| draw_ui(f, session))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
                    match key.code {
                        KeyCode::Esc => return Ok(()),
                        KeyCode::Char('c') if ctrl => return Ok(()),
                        KeyCode::Char('u') if ctrl => session.state.clear_input(),
                        KeyCode::Enter => session.submit(),
                        KeyCode::F(2) => {
                            if session.state.begin_listening() {
                                session.spawn_listen();
                            }
                        }
                        KeyCode::Backspace => session.state.pop_char(),
                        KeyCode::Char(c) => session.state.push_char(c),
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }
}

fn draw_ui(f: &mut Frame, session: &Session) {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Input
            Constraint::Length(3), // Status
            Constraint::Min(0),    // Results + map
        ])
        .split(f.area());

    draw_header(f, main_chunks[0], session);
    draw_input(f, main_chunks[1], session);
    draw_status(f, main_chunks[2], session);

    let bottom_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(main_chunks[3]);

    draw_result_panel(f, bottom_chunks[0], session);
    draw_map_panel(f, bottom_chunks[1], session);
}

fn draw_header(f: &mut Frame, area: Rect, session: &Session) {
    let voice = if session.state.speech_available() { "F2 voice | " } else { "" };
    let header = Paragraph::new(Line::from(vec![
        Span::styled("Head Office Locator ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw("| Provider: "),
        Span::styled(session.service.provider().kind().as_str(), Style::default().fg(Color::Yellow)),
        Span::raw(" | Territory: "),
        Span::styled(session.service.territory_keyword().to_string(), Style::default().fg(Color::Yellow)),
        Span::raw(" | Config: "),
        Span::raw(session.config_label.clone()),
        Span::raw(format!(" | {voice}Enter search | Esc quit")),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(header, area);
}

fn draw_input(f: &mut Frame, area: Rect, session: &Session) {
    let state = &session.state;
    let title = if state.is_busy() {
        "Company name (searching…)"
    } else if state.is_listening() {
        "Company name (listening…)"
    } else {
        "Company name"
    };
    let style = if state.is_busy() { Style::default().fg(Color::DarkGray) } else { Style::default() };
    let input = Paragraph::new(Line::from(vec![
        Span::styled(state.input().to_string(), style),
        Span::styled("▏", Style::default().fg(Color::Cyan)),
    ]))
    .block(Block::default().borders(Borders::ALL).title(title));

    f.render_widget(input, area);
}

fn draw_status(f: &mut Frame, area: Rect, session: &Session) {
    let status = session.state.status();
    let color = match status.tone {
        Tone::Info => Color::Green,
        Tone::Warn => Color::Yellow,
    };
    let paragraph = Paragraph::new(Span::styled(status.message.clone(), Style::default().fg(color)))
        .block(Block::default().borders(Borders::ALL).title("Status"));

    f.render_widget(paragraph, area);
}

fn badge_span(badge: &Badge) -> Span<'static> {
    let color = match badge.tone {
        BadgeTone::Yes => Color::Green,
        BadgeTone::No => Color::Red,
        BadgeTone::Outside => Color::Magenta,
        BadgeTone::Neutral => Color::Gray,
    };
    Span::styled(format!("[{}]", badge.text), Style::default().fg(color).add_modifier(Modifier::BOLD))
}

fn draw_result_panel(f: &mut Frame, area: Rect, session: &Session) {
    let block = Block::default().borders(Borders::ALL).title("Result");
    let Some(view) = session.state.result() else {
        f.render_widget(block, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(3), Constraint::Min(3)])
        .split(area);

    let mut lines = vec![
        Line::from(Span::styled(view.name.clone(), Style::default().add_modifier(Modifier::BOLD))),
        Line::from(Span::styled(view.number_line.clone(), Style::default().fg(Color::DarkGray))),
        Line::from(view.address.clone()),
    ];
    for extra in [&view.jurisdiction, &view.incorporated].into_iter().flatten() {
        lines.push(Line::from(Span::styled(extra.clone(), Style::default().fg(Color::DarkGray))));
    }
    lines.push(Line::from(vec![badge_span(&view.franchise), Span::raw(" "), badge_span(&view.territory)]));

    let summary = Paragraph::new(lines).wrap(Wrap { trim: true }).block(block);
    f.render_widget(summary, chunks[0]);

    let signals: Vec<ListItem> =
        view.signals.iter().map(|s| ListItem::new(format!("• {s}"))).collect();
    f.render_widget(
        List::new(signals).block(Block::default().borders(Borders::ALL).title("Signals")),
        chunks[1],
    );

    let info: Vec<ListItem> = view
        .info
        .iter()
        .map(|(label, value)| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{label:<20}"), Style::default().fg(Color::Cyan)),
                Span::raw(value.clone()),
            ]))
        })
        .collect();
    f.render_widget(
        List::new(info).block(Block::default().borders(Borders::ALL).title("Details")),
        chunks[2],
    );
}

fn draw_map_panel(f: &mut Frame, area: Rect, session: &Session) {
    let title = format!("Map (tiles: {})", session.tile_url);
    let block = Block::default().borders(Borders::ALL).title(title);

    let marker = session.state.map().marker.clone();
    let showing_result = session.state.result().is_some();
    let (x_bounds, y_bounds) = match &marker {
        Some((point, _)) => (
            [point.lon - MARKER_SPAN_LON, point.lon + MARKER_SPAN_LON],
            [point.lat - MARKER_SPAN_LAT, point.lat + MARKER_SPAN_LAT],
        ),
        None => ([-180.0, 180.0], [-90.0, 90.0]),
    };

    let canvas = Canvas::default()
        .block(block)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(move |ctx| {
            ctx.draw(&Map { resolution: MapResolution::High, color: Color::DarkGray });
            ctx.layer();
            match &marker {
                Some((point, popup)) => {
                    ctx.print(point.lon, point.lat, Span::styled("●", Style::default().fg(Color::Red)));
                    let label = popup.lines().next().unwrap_or_default().to_string();
                    ctx.print(point.lon, point.lat - 1.0, Span::raw(label));
                }
                None if showing_result => {
                    ctx.print(-170.0, 0.0, Span::styled(MAP_UNAVAILABLE, Style::default().fg(Color::Yellow)));
                }
                None => {}
            }
        });

    f.render_widget(canvas, area);
}
