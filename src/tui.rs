use std::io;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction as LayoutDirection, Layout};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Terminal;
use tracing::warn;

use crate::cli::{self, JobArgs, PanelCommand};
use crate::core;
use crate::core::cache::JobResultCache;
use crate::core::error::LzwError;
use crate::core::formatter::{format_result_lines, format_settings, format_stats_digest};
use crate::core::job::{Direction, JobResult, JobSettings, JobStatus, Upload};
use crate::core::runner::Engine;
use crate::core::workspace::Workspace;

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self, LzwError> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = stdout.execute(LeaveAlternateScreen);
    }
}

struct PanelState {
    input: String,
    history: Vec<String>,
    cache: JobResultCache,
    stats_digest: Option<String>,
    last_settings: Option<JobSettings>,
    job_status: Option<JobStatus>,
    should_quit: bool,
    scroll_offset: usize,
    view_lines: usize,
    tick: u64,
}

const DIVIDER_MARKER: &str = "<divider>";

impl PanelState {
    fn new(workspace: &Workspace) -> Self {
        let history = vec![
            "Welcome to lzwflow. Type 'help' for commands.".to_string(),
            format!("Workspace: {}", workspace.root().display()),
        ];
        Self {
            input: String::new(),
            history,
            cache: JobResultCache::new(),
            stats_digest: None,
            last_settings: None,
            job_status: None,
            should_quit: false,
            scroll_offset: 0,
            view_lines: 1,
            tick: 0,
        }
    }

    fn job_running(&self) -> bool {
        self.job_status == Some(JobStatus::Running)
    }

    fn push_history(&mut self, line: impl Into<String>) {
        const MAX_LINES: usize = 500;
        if self.history.len() >= MAX_LINES {
            let drain_count = self.history.len().saturating_sub(MAX_LINES - 1);
            self.history.drain(0..drain_count);
        }
        self.history.push(line.into());
        self.clamp_scroll();
    }

    fn finish_job(&mut self, result: JobResult) {
        self.job_status = Some(result.status());
        for line in format_result_lines(&result) {
            self.push_history(line);
        }
        self.cache.record(result);

        self.stats_digest = match self.cache.read_stats() {
            Ok(report) => report.as_ref().and_then(|r| format_stats_digest(r, 3)),
            Err(err) => {
                warn!(%err, "stats report unreadable");
                None
            }
        };
    }

    fn set_view_lines(&mut self, lines: usize) {
        self.view_lines = lines.max(1);
        self.clamp_scroll();
    }

    fn scroll_up(&mut self, lines: usize) {
        let max_scroll = self.max_scroll();
        self.scroll_offset = (self.scroll_offset + lines).min(max_scroll);
    }

    fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    fn scroll_top(&mut self) {
        self.scroll_offset = self.max_scroll();
    }

    fn scroll_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    fn max_scroll(&self) -> usize {
        self.history.len().saturating_sub(self.view_lines)
    }

    fn clamp_scroll(&mut self) {
        let max_scroll = self.max_scroll();
        if self.scroll_offset > max_scroll {
            self.scroll_offset = max_scroll;
        }
    }
}

pub fn run(workspace: Workspace, engine: Arc<dyn Engine>) -> Result<(), LzwError> {
    workspace.ensure_all()?;
    let workspace = Arc::new(workspace);

    let _guard = TerminalGuard::enter()?;
    let stdout = io::stdout();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (done_tx, done_rx) = mpsc::channel::<JobResult>();
    let mut app = PanelState::new(&workspace);

    loop {
        while let Ok(result) = done_rx.try_recv() {
            app.finish_job(result);
        }

        let size = terminal.size()?;
        let history_height = size.height.saturating_sub(8).max(3) as usize;
        let view_lines = history_height.saturating_sub(2).max(1);
        app.set_view_lines(view_lines);

        app.tick = app.tick.wrapping_add(1);

        terminal.draw(|frame| {
            let layout = Layout::default()
                .direction(LayoutDirection::Vertical)
                .constraints([
                    Constraint::Length(5),
                    Constraint::Min(3),
                    Constraint::Length(3),
                ])
                .split(frame.size());

            let header = render_header(&app, layout[0].width as usize);
            frame.render_widget(header, layout[0]);

            let history = render_history(&app, layout[1].height as usize, layout[1].width as usize);
            frame.render_widget(history, layout[1]);

            let input = Paragraph::new(app.input.as_str())
                .block(Block::default().title("Command").borders(Borders::ALL))
                .wrap(Wrap { trim: false });
            frame.render_widget(input, layout[2]);
            frame.set_cursor(layout[2].x + 1 + app.input.len() as u16, layout[2].y + 1);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        app.should_quit = true;
                    }
                    KeyCode::Char(ch) => {
                        app.input.push(ch);
                    }
                    KeyCode::Backspace => {
                        app.input.pop();
                    }
                    KeyCode::Enter => {
                        let line = app.input.trim().to_string();
                        app.input.clear();
                        if !line.is_empty() {
                            handle_line(&mut app, &line, &workspace, &engine, &done_tx);
                        }
                    }
                    KeyCode::PageUp => {
                        let step = app.view_lines.saturating_sub(1).max(1);
                        app.scroll_up(step);
                    }
                    KeyCode::PageDown => {
                        let step = app.view_lines.saturating_sub(1).max(1);
                        app.scroll_down(step);
                    }
                    KeyCode::Up => app.scroll_up(1),
                    KeyCode::Down => app.scroll_down(1),
                    KeyCode::Home => app.scroll_top(),
                    KeyCode::End => app.scroll_bottom(),
                    KeyCode::Esc => {
                        app.should_quit = true;
                    }
                    _ => {}
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_line(
    app: &mut PanelState,
    line: &str,
    workspace: &Arc<Workspace>,
    engine: &Arc<dyn Engine>,
    done_tx: &mpsc::Sender<JobResult>,
) {
    let trimmed = line.trim();
    if !app.history.is_empty() {
        app.push_history(DIVIDER_MARKER);
    }
    app.push_history(format!(">> {trimmed}"));

    if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
        app.should_quit = true;
        return;
    }

    if trimmed.eq_ignore_ascii_case("clear") {
        app.history.clear();
        app.scroll_bottom();
        return;
    }

    if trimmed.eq_ignore_ascii_case("help") {
        for line in cli::PANEL_HELP {
            app.push_history(line);
        }
        return;
    }

    match cli::parse_line(trimmed) {
        Ok(PanelCommand::Compress(args)) => start_job(app, Direction::Compress, args, workspace, engine, done_tx),
        Ok(PanelCommand::Decompress(args)) => {
            start_job(app, Direction::Decompress, args, workspace, engine, done_tx)
        }
        Ok(PanelCommand::Save { dest }) => match app.cache.save_artifact(&dest) {
            Ok(Some(path)) => app.push_history(format!("Saved to {}", path.display())),
            Ok(None) => app.push_history("No artifact to save yet."),
            Err(err) => app.push_history(format!("error: {err}")),
        },
        Ok(PanelCommand::Stats) => match app.cache.read_stats() {
            Ok(Some(report)) => {
                for line in report.lines {
                    app.push_history(line);
                }
            }
            Ok(None) => app.push_history("No stats report available."),
            Err(err) => app.push_history(format!("error: {err}")),
        },
        Ok(PanelCommand::Result) => match app.cache.current().map(format_result_lines) {
            Some(lines) => {
                for line in lines {
                    app.push_history(line);
                }
            }
            None => app.push_history("No job has completed yet."),
        },
        Err(err) => {
            for line in err.lines().filter(|line| !line.trim().is_empty()) {
                app.push_history(format!("error: {line}"));
            }
        }
    }
}

fn start_job(
    app: &mut PanelState,
    direction: Direction,
    args: JobArgs,
    workspace: &Arc<Workspace>,
    engine: &Arc<dyn Engine>,
    done_tx: &mpsc::Sender<JobResult>,
) {
    if app.job_running() {
        app.push_history("A job is already running. Please wait for it to finish.");
        return;
    }

    let settings = match args.settings(direction) {
        Ok(settings) => settings,
        Err(err) => {
            app.push_history(format!("error: {err}"));
            return;
        }
    };

    let upload = match args.file.as_deref().map(Upload::from_path).transpose() {
        Ok(upload) => upload,
        Err(err) => {
            app.push_history(format!("error: {err}"));
            return;
        }
    };

    let (job, upload) = match core::prepare(upload, settings) {
        Ok(prepared) => prepared,
        Err(LzwError::MissingInput) => {
            app.push_history("warning: please supply a file.");
            return;
        }
        Err(err) => {
            app.push_history(format!("error: {err}"));
            return;
        }
    };

    app.last_settings = Some(settings);
    app.job_status = Some(JobStatus::Running);
    app.push_history(format!("Running {} ({})", job.original_filename(), format_settings(&settings)));

    let workspace = Arc::clone(workspace);
    let engine = Arc::clone(engine);
    let done_tx = done_tx.clone();
    std::thread::spawn(move || {
        let result = core::execute(&workspace, engine.as_ref(), &job, &upload.bytes);
        let _ = done_tx.send(result);
    });
}

fn render_header(app: &PanelState, width: usize) -> Paragraph<'static> {
    let status = match app.job_status {
        Some(JobStatus::Running) => "Running",
        Some(JobStatus::Finished) => "Finished",
        Some(JobStatus::Failed) => "Failed",
        None => "Idle",
    };

    let settings = app
        .last_settings
        .as_ref()
        .map(format_settings)
        .unwrap_or_else(|| "no job yet".to_string());

    let result = match app.cache.current() {
        Some(result) if result.succeeded => result
            .result_path
            .as_ref()
            .map(|path| format!("Result: {}", path.display()))
            .unwrap_or_default(),
        Some(_) => "Result: failed (see session)".to_string(),
        None => "Result: -".to_string(),
    };

    let bar_width = width.saturating_sub(30).clamp(10, 40);
    let activity = render_activity_bar(app, bar_width);

    let mut text = vec![
        Line::from(vec![
            Span::raw("Status: "),
            Span::raw(status),
            Span::raw(" "),
            Span::raw(activity),
        ]),
        Line::from(vec![Span::raw("Job: "), Span::raw(settings)]),
        Line::from(result),
    ];
    if let Some(digest) = &app.stats_digest {
        text[2].spans.push(Span::raw(format!("  [{digest}]")));
    }

    Paragraph::new(text)
        .block(Block::default().title("lzwflow").borders(Borders::ALL))
        .wrap(Wrap { trim: true })
}

/// The engine reports no progress, so a running job gets a bouncing marker.
fn render_activity_bar(app: &PanelState, width: usize) -> String {
    let width = width.max(10);
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');

    if !app.job_running() {
        for _ in 0..width {
            bar.push(' ');
        }
        bar.push(']');
        return bar;
    }

    let pos = (app.tick as usize) % width;
    for idx in 0..width {
        if idx == pos {
            bar.push('>');
        } else if idx < pos {
            bar.push('=');
        } else {
            bar.push(' ');
        }
    }
    bar.push(']');
    bar
}

fn render_history(app: &PanelState, height: usize, width: usize) -> Paragraph<'static> {
    let max_lines = height.saturating_sub(2).max(1);
    let end = app.history.len().saturating_sub(app.scroll_offset);
    let start = end.saturating_sub(max_lines);
    let divider_width = width.saturating_sub(2).max(1);
    let divider = "─".repeat(divider_width);
    let lines: Vec<Line> = app.history[start..end]
        .iter()
        .map(|line| {
            if line == DIVIDER_MARKER {
                Line::from(Span::raw(divider.clone()))
            } else {
                Line::from(line.clone())
            }
        })
        .collect();

    Paragraph::new(lines)
        .block(Block::default().title("Session").borders(Borders::ALL))
        .wrap(Wrap { trim: false })
}
