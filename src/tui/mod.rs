//! TUI module - terminal front end with ratatui
//!
//! Screens: intro (door clip, then upload), machine list, generated plan.
//! Clips are shown as progress gauges running for the clip's length.

use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Clear, Gauge, Paragraph, Row, Table, TableState, Wrap},
};
use std::io::{Stdout, stdout};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{info, warn};

use crate::client::{ClientError, FunctionsApi, HttpFunctions};
use crate::config::ClientConfig;
use crate::db::Database;
use crate::exercises::{ExercisePlan, MachineGuess};
use crate::muscles::join_muscles;
use crate::views::intro::IntroPhase;
use crate::views::{ExerciseResults, ImageFile, IntroGate, MachineList, Notice, NoticeLevel, Route, UploadForm};

type Tui = Terminal<CrosstermBackend<Stdout>>;

const NOTICE_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Intro,
    Machines,
    Exercises,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditField {
    Name,
    Muscles,
    Notes,
}

impl EditField {
    fn next(self) -> Self {
        match self {
            EditField::Name => EditField::Muscles,
            EditField::Muscles => EditField::Notes,
            EditField::Notes => EditField::Name,
        }
    }
}

/// Where key presses go
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Normal,
    /// Typing an image path (stands in for the file picker)
    Path(String),
    Goal(i64),
    Edit(EditField),
}

/// Analysis in flight for an uploaded photo
struct PendingUpload {
    rx: oneshot::Receiver<Result<MachineGuess, ClientError>>,
    file_name: String,
    image_url: String,
}

/// Generation in flight: the request runs on the runtime, the clip on the clock
struct PendingPlan {
    rx: Option<oneshot::Receiver<Result<ExercisePlan, ClientError>>>,
    started_at: Instant,
    video_done: bool,
}

/// App state for TUI
pub struct App {
    db: Database,
    functions: Arc<HttpFunctions>,
    config: ClientConfig,
    screen: Screen,
    input: Input,
    intro: IntroGate,
    upload: UploadForm,
    analysis: Option<PendingUpload>,
    redirect_at: Option<Instant>,
    list: MachineList,
    table: TableState,
    pending: Option<PendingPlan>,
    results: ExerciseResults,
    notice: Option<(Notice, Instant)>,
    should_quit: bool,
}

impl App {
    pub fn new(db: Database, config: ClientConfig) -> Self {
        let functions = Arc::new(HttpFunctions::new(config.functions_url.clone(), config.api_key.clone()));
        Self {
            db,
            functions,
            intro: IntroGate::new(config.intro.clone()),
            config,
            screen: Screen::Intro,
            input: Input::Normal,
            upload: UploadForm::new(),
            analysis: None,
            redirect_at: None,
            list: MachineList::new(),
            table: TableState::default(),
            pending: None,
            results: ExerciseResults::default(),
            notice: None,
            should_quit: false,
        }
    }

    /// Run the TUI application. Needs a multi-threaded tokio runtime.
    pub fn run(&mut self) -> Result<()> {
        let mut terminal = init_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal()?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        while !self.should_quit {
            terminal.draw(|frame| self.render(frame))?;
            self.handle_events()?;
            self.tick(Instant::now());
        }
        Ok(())
    }

    // State transitions

    fn tick(&mut self, now: Instant) {
        self.intro.tick(now);

        if let Some(at) = self.redirect_at
            && now >= at
        {
            self.redirect_at = None;
            self.navigate(Route::Machines);
        }

        self.poll_upload(now);
        self.poll_generation(now);
        self.collect_notices(now);
    }

    fn poll_upload(&mut self, now: Instant) {
        let Some(pending) = self.analysis.as_mut() else {
            return;
        };
        let analysis = match pending.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Closed) => Err(ClientError::Endpoint {
                status: 500,
                message: "analyze-machine failed".to_string(),
            }),
        };

        let Some(pending) = self.analysis.take() else {
            return;
        };
        let stored = self
            .upload
            .finish(&pending.file_name, &pending.image_url, analysis, &self.db);
        if stored.is_some() {
            self.redirect_at = Some(now + self.config.redirect_delay);
        }
    }

    fn poll_generation(&mut self, now: Instant) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };

        let mut route = None;
        if !pending.video_done && now.saturating_duration_since(pending.started_at) >= self.config.transition.duration {
            pending.video_done = true;
            route = self.list.on_video_ended();
        }

        if let Some(rx) = pending.rx.as_mut() {
            let received = match rx.try_recv() {
                Ok(result) => Some(result),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Closed) => Some(Err(ClientError::Endpoint {
                    status: 500,
                    message: "Failed to generate exercises".to_string(),
                })),
            };
            if let Some(result) = received {
                pending.rx = None;
                if let Some(r) = self.list.on_plan(result) {
                    route = Some(r);
                }
            }
        }

        if !self.list.is_loading() {
            self.pending = None;
        }
        if let Some(route) = route {
            self.navigate(route);
        }
    }

    fn collect_notices(&mut self, now: Instant) {
        let mut drained = self.upload.notices.drain();
        drained.extend(self.list.notices.drain());
        if let Some(latest) = drained.pop() {
            self.notice = Some((latest, now));
        }
        if let Some((_, shown_at)) = &self.notice
            && now.saturating_duration_since(*shown_at) >= NOTICE_TTL
        {
            self.notice = None;
        }
    }

    fn navigate(&mut self, route: Route) {
        match route {
            Route::Intro => self.screen = Screen::Intro,
            Route::Machines => {
                self.list.load(&self.db);
                let selected = if self.list.is_empty() { None } else { Some(0) };
                self.table.select(selected);
                self.screen = Screen::Machines;
            }
            Route::Exercises(state) => {
                info!("showing {} exercises", state.exercises.len());
                self.results = ExerciseResults::new(Some(state));
                self.screen = Screen::Exercises;
            }
        }
        self.input = Input::Normal;
    }

    fn selected_id(&self) -> Option<i64> {
        self.table
            .selected()
            .and_then(|i| self.list.machines.get(i))
            .map(|m| m.id)
    }

    fn submit_upload(&mut self, path: &str) {
        let file = match ImageFile::read(Path::new(path)) {
            Ok(file) => file,
            Err(e) => {
                warn!("{:#}", e);
                self.upload.notices.error(format!("Could not read {}", path));
                return;
            }
        };

        let Some(image_url) = self.upload.begin(&file) else {
            return;
        };
        let (tx, rx) = oneshot::channel();
        let functions = Arc::clone(&self.functions);
        let url = image_url.clone();
        tokio::spawn(async move {
            let result = functions.analyze_machine(&url).await;
            let _ = tx.send(result);
        });
        self.analysis = Some(PendingUpload {
            rx,
            file_name: file.name,
            image_url,
        });
    }

    fn start_generation(&mut self, id: i64) {
        let Some(request) = self.list.start_generation(id) else {
            return;
        };
        let (tx, rx) = oneshot::channel();
        let functions = Arc::clone(&self.functions);
        tokio::spawn(async move {
            let result = functions.generate_exercises(&request).await;
            let _ = tx.send(result);
        });
        self.pending = Some(PendingPlan {
            rx: Some(rx),
            started_at: Instant::now(),
            video_done: false,
        });
    }

    // Input

    fn handle_events(&mut self) -> Result<()> {
        if event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match self.input.clone() {
                Input::Normal => self.handle_normal_key(key.code),
                Input::Path(path) => self.handle_path_key(path, key.code),
                Input::Goal(id) => self.handle_goal_key(id, key.code),
                Input::Edit(field) => self.handle_edit_key(field, key.code),
            }
        }
        Ok(())
    }

    fn handle_normal_key(&mut self, code: KeyCode) {
        if code == KeyCode::Char('q') {
            self.should_quit = true;
            return;
        }
        match self.screen {
            Screen::Intro => match (self.intro.phase(), code) {
                (IntroPhase::Revealed, KeyCode::Enter | KeyCode::Char('u')) => {
                    if !self.upload.busy && self.redirect_at.is_none() {
                        self.input = Input::Path(String::new());
                    }
                }
                (IntroPhase::Revealed, KeyCode::Char('m')) => self.navigate(Route::Machines),
                (_, KeyCode::Enter | KeyCode::Char(' ')) => self.intro.click(Instant::now()),
                _ => {}
            },
            Screen::Machines => {
                // The overlay swallows input until the generation settles
                if self.list.is_loading() {
                    return;
                }
                match code {
                    KeyCode::Down | KeyCode::Char('j') => self.table.select_next(),
                    KeyCode::Up | KeyCode::Char('k') => self.table.select_previous(),
                    KeyCode::Char('r') => self.navigate(Route::Machines),
                    KeyCode::Char('u') => self.navigate(Route::Intro),
                    KeyCode::Char('e') => {
                        if let Some(id) = self.selected_id()
                            && self.list.begin_edit(id)
                        {
                            self.input = Input::Edit(EditField::Name);
                        }
                    }
                    KeyCode::Char('d') => {
                        if let Some(id) = self.selected_id() {
                            self.list.delete(id, &self.db);
                            let len = self.list.machines.len();
                            if len == 0 {
                                self.table.select(None);
                            } else if self.table.selected().is_some_and(|i| i >= len) {
                                self.table.select(Some(len - 1));
                            }
                        }
                    }
                    KeyCode::Char('g') => {
                        if let Some(id) = self.selected_id() {
                            self.input = Input::Goal(id);
                        }
                    }
                    KeyCode::Enter => {
                        if let Some(id) = self.selected_id() {
                            self.start_generation(id);
                        }
                    }
                    _ => {}
                }
            }
            Screen::Exercises => match code {
                KeyCode::Esc | KeyCode::Char('b') => self.navigate(Route::Machines),
                _ => {}
            },
        }
    }

    fn handle_path_key(&mut self, mut path: String, code: KeyCode) {
        match code {
            KeyCode::Esc => self.input = Input::Normal,
            KeyCode::Enter => {
                self.input = Input::Normal;
                let path = path.trim().to_string();
                if !path.is_empty() {
                    self.submit_upload(&path);
                }
            }
            KeyCode::Backspace => {
                path.pop();
                self.input = Input::Path(path);
            }
            KeyCode::Char(c) => {
                path.push(c);
                self.input = Input::Path(path);
            }
            _ => {}
        }
    }

    fn handle_goal_key(&mut self, id: i64, code: KeyCode) {
        let mut goal = self.list.goal(id).to_string();
        match code {
            KeyCode::Esc => self.input = Input::Normal,
            KeyCode::Enter => {
                self.input = Input::Normal;
                self.start_generation(id);
            }
            KeyCode::Backspace => {
                goal.pop();
                self.list.set_goal(id, goal);
            }
            KeyCode::Char(c) => {
                goal.push(c);
                self.list.set_goal(id, goal);
            }
            _ => {}
        }
    }

    fn handle_edit_key(&mut self, field: EditField, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.list.cancel_edit();
                self.input = Input::Normal;
            }
            KeyCode::Tab => self.input = Input::Edit(field.next()),
            KeyCode::Enter => {
                if self.list.save(&self.db) {
                    self.input = Input::Normal;
                }
            }
            KeyCode::Backspace | KeyCode::Char(_) => {
                let Some(form) = self.list.edit_form_mut() else {
                    self.input = Input::Normal;
                    return;
                };
                let text = match field {
                    EditField::Name => &mut form.name,
                    EditField::Muscles => &mut form.muscles,
                    EditField::Notes => &mut form.notes,
                };
                match code {
                    KeyCode::Char(c) => text.push(c),
                    _ => {
                        text.pop();
                    }
                }
            }
            _ => {}
        }
    }

    // Rendering

    fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
            ])
            .split(area);

        let header = Paragraph::new("GymLens - Machine Companion")
            .style(Style::default().fg(Color::Cyan).bold())
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        match self.screen {
            Screen::Intro => self.render_intro(frame, chunks[1]),
            Screen::Machines => self.render_machines(frame, chunks[1]),
            Screen::Exercises => self.render_exercises(frame, chunks[1]),
        }

        self.render_footer(frame, chunks[2]);

        if self.list.overlay_visible() {
            self.render_transition(frame, area);
        }
    }

    fn render_intro(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Welcome");
        match self.intro.phase() {
            IntroPhase::Waiting => {
                let text = Paragraph::new("\n\nPress Enter to open the door")
                    .alignment(Alignment::Center)
                    .block(block);
                frame.render_widget(text, area);
            }
            IntroPhase::Playing => {
                let gauge = Gauge::default()
                    .block(block.title_bottom("Enter: skip"))
                    .gauge_style(Style::default().fg(Color::Cyan))
                    .ratio(self.intro.progress(Instant::now()))
                    .label(self.config.intro.path.display().to_string());
                frame.render_widget(gauge, area);
            }
            IntroPhase::Revealed => {
                let mut lines = vec![
                    Line::from("Upload a photo of a gym machine and it will be identified for you."),
                    Line::from(""),
                ];
                if let Some(preview) = &self.upload.preview {
                    let head: String = preview.chars().take(40).collect();
                    lines.push(Line::from(format!("Preview: {}... ({} chars)", head, preview.len())));
                }
                if self.upload.busy {
                    lines.push(Line::from("Analyzing...").style(Style::default().fg(Color::Yellow)));
                }
                if let Input::Path(path) = &self.input {
                    lines.push(Line::from(format!("Image path: {}_", path)));
                }
                let text = Paragraph::new(lines)
                    .wrap(Wrap { trim: false })
                    .block(Block::default().borders(Borders::ALL).title("Upload"));
                frame.render_widget(text, area);
            }
        }
    }

    fn render_machines(&mut self, frame: &mut Frame, area: Rect) {
        let editing = self.list.edit_form().is_some();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(if editing {
                [Constraint::Min(5), Constraint::Length(5)]
            } else {
                [Constraint::Min(5), Constraint::Length(0)]
            })
            .split(area);

        if self.list.is_empty() {
            let empty = Paragraph::new("No machines yet. Press u to upload one.")
                .block(Block::default().borders(Borders::ALL).title("Machines"));
            frame.render_widget(empty, chunks[0]);
        } else {
            let rows: Vec<Row> = self
                .list
                .machines
                .iter()
                .map(|m| {
                    Row::new(vec![
                        Cell::from(m.name.clone()),
                        Cell::from(join_muscles(&m.muscles)),
                        Cell::from(m.notes.clone().unwrap_or_default()),
                        Cell::from(self.list.goal(m.id).to_string()),
                        Cell::from(m.created_at.format("%Y-%m-%d").to_string()),
                    ])
                })
                .collect();

            let table = Table::new(
                rows,
                [
                    Constraint::Length(22),
                    Constraint::Min(20),
                    Constraint::Length(20),
                    Constraint::Length(18),
                    Constraint::Length(12),
                ],
            )
            .header(Row::new(vec!["Machine", "Muscles", "Notes", "Goal", "Added"]).style(Style::default().bold()))
            .row_highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
            .block(Block::default().borders(Borders::ALL).title("Machines"));
            frame.render_stateful_widget(table, chunks[0], &mut self.table);
        }

        if let (Some(form), Input::Edit(field)) = (self.list.edit_form(), &self.input) {
            let marker = |f: EditField| if *field == f { ">" } else { " " };
            let lines = vec![
                Line::from(format!("{} Name:    {}", marker(EditField::Name), form.name)),
                Line::from(format!("{} Muscles: {}", marker(EditField::Muscles), form.muscles)),
                Line::from(format!("{} Notes:   {}", marker(EditField::Notes), form.notes)),
            ];
            let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Edit"));
            frame.render_widget(panel, chunks[1]);
        }
    }

    fn render_exercises(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title(self.results.title());
        let Some(state) = self.results.state() else {
            frame.render_widget(Paragraph::new(ExerciseResults::EMPTY_MESSAGE).block(block), area);
            return;
        };

        let mut lines = Vec::new();
        for (i, ex) in state.exercises.iter().enumerate() {
            lines.push(Line::from(format!("{}. {}", i + 1, ex.name)).style(Style::default().bold()));
            if !ex.description.is_empty() {
                lines.push(Line::from(format!("   {}", ex.description)));
            }
            lines.push(Line::from(format!("   Sets: {}  Reps: {}  Rest: {}", ex.sets, ex.reps, ex.rest)));
            if !ex.tips.is_empty() {
                lines.push(Line::from(format!("   Tip: {}", ex.tips)).style(Style::default().fg(Color::Green)));
            }
            lines.push(Line::from(format!("   Tutorial: {}", ex.tutorial_url())).style(Style::default().fg(Color::DarkGray)));
            lines.push(Line::from(""));
        }
        let cards = Paragraph::new(lines).wrap(Wrap { trim: false }).block(block);
        frame.render_widget(cards, area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let (text, style) = match &self.notice {
            Some((notice, _)) => {
                let color = match notice.level {
                    NoticeLevel::Success => Color::Green,
                    NoticeLevel::Error => Color::Red,
                };
                (notice.message.clone(), Style::default().fg(color))
            }
            None => (self.key_help().to_string(), Style::default().fg(Color::DarkGray)),
        };
        let footer = Paragraph::new(text)
            .style(style)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, area);
    }

    fn key_help(&self) -> &'static str {
        match (&self.input, self.screen) {
            (Input::Path(_), _) => "Enter: analyze | Esc: cancel",
            (Input::Goal(_), _) => "type a goal | Enter: generate | Esc: done",
            (Input::Edit(_), _) => "Tab: next field | Enter: save | Esc: cancel",
            (Input::Normal, Screen::Intro) => "Enter: continue | u: upload | m: machines | q: quit",
            (Input::Normal, Screen::Machines) => {
                "j/k: select | g: goal | Enter: generate | e: edit | d: delete | u: upload | r: refresh | q: quit"
            }
            (Input::Normal, Screen::Exercises) => "b: back | q: quit",
        }
    }

    fn render_transition(&self, frame: &mut Frame, area: Rect) {
        let popup = centered(area, 60, 5);
        let ratio = self
            .pending
            .as_ref()
            .map(|p| {
                let total = self.config.transition.duration.as_secs_f64();
                if total == 0.0 {
                    1.0
                } else {
                    (p.started_at.elapsed().as_secs_f64() / total).min(1.0)
                }
            })
            .unwrap_or(1.0);

        frame.render_widget(Clear, popup);
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Generating your workout"))
            .gauge_style(Style::default().fg(Color::Magenta))
            .ratio(ratio);
        frame.render_widget(gauge, popup);
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}
