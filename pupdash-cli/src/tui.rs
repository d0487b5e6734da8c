use std::io;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use tracing::info;

use pupdash_core::Dashboard;
use pupdash_core::model::{ActionKind, LogEntry, ProcessRecord};
use pupdash_core::render::{ControlId, LogPanel};
use pupdash_core::store::PanelStore;

use crate::ui::styles;

// --- Terminal setup/teardown ---
fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Keyboard-driven view over a running [`Dashboard`]. Drawing reads the panel
/// store the session renders into; keys are turned into session calls.
struct App {
    dash: Dashboard,
    store: Arc<RwLock<PanelStore>>,
    title: String,
    selected: usize,
    list_state: ListState,
    notice: Option<String>,
}

impl App {
    fn snapshot_processes(&self) -> Vec<ProcessRecord> {
        self.read_store().processes.clone()
    }

    fn read_store(&self) -> std::sync::RwLockReadGuard<'_, PanelStore> {
        self.store.read().unwrap_or_else(|e| e.into_inner())
    }

    fn highlighted(&self) -> Option<String> {
        self.snapshot_processes()
            .get(self.selected)
            .map(|p| p.name.clone())
    }

    fn spawn_dispatch(&mut self, kind: ActionKind) {
        let Some(name) = self.highlighted() else {
            self.notice = Some("No process highlighted".into());
            return;
        };
        let dash = self.dash.clone();
        tokio::spawn(async move {
            dash.dispatch(kind, &name).await;
        });
    }

    /// Returns false when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        match (code, modifiers) {
            (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => return false,
            (KeyCode::Up, _) | (KeyCode::Char('k'), _) => {
                self.selected = self.selected.saturating_sub(1);
            }
            (KeyCode::Down, _) | (KeyCode::Char('j'), _) => {
                let count = self.read_store().processes.len();
                if self.selected + 1 < count {
                    self.selected += 1;
                }
            }
            (KeyCode::Char('r'), _) => {
                let dash = self.dash.clone();
                tokio::spawn(async move { dash.refresh().await });
                self.notice = Some("Refreshing...".into());
            }
            (KeyCode::Char('f'), _) => {
                let on = self.dash.toggle_follow();
                self.notice = Some(if on { "Follow on" } else { "Follow off" }.into());
            }
            (KeyCode::Char('w'), _) => {
                let dash = self.dash.clone();
                tokio::spawn(async move { dash.cycle_worker_filter().await });
            }
            (KeyCode::Char('l'), _) => {
                let dash = self.dash.clone();
                tokio::spawn(async move { dash.cycle_level_filter().await });
            }
            (KeyCode::Enter, _) => {
                if let Some(name) = self.highlighted() {
                    let dash = self.dash.clone();
                    tokio::spawn(async move { dash.select_worker(Some(&name)).await });
                }
            }
            (KeyCode::Esc, _) => {
                let dash = self.dash.clone();
                tokio::spawn(async move { dash.select_worker(None).await });
            }
            (KeyCode::Char('s'), _) => self.spawn_dispatch(ActionKind::Start),
            (KeyCode::Char('x'), _) => self.spawn_dispatch(ActionKind::Stop),
            (KeyCode::Char('R'), _) => self.spawn_dispatch(ActionKind::Restart),
            (KeyCode::Char('c'), _) => {
                self.dash.clear_worker_logs();
                self.notice = Some("Worker logs cleared".into());
            }
            _ => {}
        }
        true
    }

    fn draw(&mut self, f: &mut Frame) {
        let area = f.area();

        // Layout:
        // [ top bar ]
        // [ processes ]
        // [ worker logs | system logs / detail ]
        // [ footer ]
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Percentage(30),
                Constraint::Min(5),
                Constraint::Length(1),
            ])
            .split(area);

        let logs = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(outer[2]);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(logs[1]);

        // Lock order: session state, then store.
        let filters = self.dash.filters();
        let follow = self.dash.follow_state();
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());

        if store.processes.is_empty() {
            self.selected = 0;
            self.list_state.select(None);
        } else {
            self.selected = self.selected.min(store.processes.len() - 1);
            self.list_state.select(Some(self.selected));
        }

        // ---------------- Top bar ----------------
        let running = store
            .processes
            .iter()
            .filter(|p| p.status == pupdash_core::model::ProcessStatus::Running)
            .count();
        let follow_label = match (&follow.target, follow.enabled) {
            (Some(worker), true) => format!("FOLLOW {worker}"),
            (None, true) => "FOLLOW (no worker)".to_string(),
            (_, false) => "follow off".to_string(),
        };
        let top_bar = Line::from(vec![
            Span::styled(" pupdash ", styles::accent_bold()),
            Span::styled(self.title.as_str(), styles::text()),
            Span::raw("  "),
            Span::styled(
                format!("{}/{} running", running, store.processes.len()),
                styles::success(),
            ),
            Span::raw("    "),
            Span::styled(filters.label(), styles::text_dim()),
            Span::raw("  "),
            Span::styled(
                follow_label,
                if follow.is_active() {
                    styles::warn()
                } else {
                    styles::text_muted()
                },
            ),
        ]);
        f.render_widget(Paragraph::new(top_bar), outer[0]);

        // ---------------- Processes ----------------
        let items: Vec<ListItem> = store
            .processes
            .iter()
            .map(|p| process_item(p, &store))
            .collect();
        let items = if items.is_empty() {
            vec![ListItem::new(Line::styled(
                "No processes reported.",
                styles::text_muted(),
            ))]
        } else {
            items
        };
        let list = List::new(items)
            .block(
                Block::default()
                    .title("Processes")
                    .borders(Borders::ALL)
                    .border_style(styles::border_focused()),
            )
            .highlight_style(Style::default().add_modifier(Modifier::BOLD))
            .highlight_symbol("▶ ");
        f.render_stateful_widget(list, outer[1], &mut self.list_state);

        // ---------------- Log panels ----------------
        let detail_title = match &filters.selected_worker {
            Some(worker) => format!("{}: {}", LogPanel::Detail.title(), worker),
            None => LogPanel::Detail.title().to_string(),
        };
        let worker_title = format!("{} [{}]", LogPanel::Worker.title(), filters.label());
        log_panel(f, logs[0], &worker_title, &store.entries(LogPanel::Worker));
        log_panel(f, right[0], LogPanel::System.title(), &store.entries(LogPanel::System));
        log_panel(f, right[1], &detail_title, &store.entries(LogPanel::Detail));
        drop(store);

        // ---------------- Footer ----------------
        let mut footer: Vec<Span> = Vec::new();
        for (key, label) in [
            ("r", "refresh"),
            ("f", "follow"),
            ("w/l", "filters"),
            ("⏎", "select"),
            ("esc", "deselect"),
            ("s/x/R", "start/stop/restart"),
            ("c", "clear"),
            ("q", "quit"),
        ] {
            footer.push(Span::styled(format!(" {key}"), styles::key_hint()));
            footer.push(Span::styled(format!(" {label} "), styles::text_dim()));
        }
        if let Some(notice) = &self.notice {
            footer.push(Span::raw("  "));
            footer.push(Span::styled(notice.as_str(), styles::info()));
        }
        f.render_widget(Paragraph::new(Line::from(footer)), outer[3]);
    }
}

fn process_item<'a>(p: &'a ProcessRecord, store: &PanelStore) -> ListItem<'a> {
    let style = styles::status(&p.status);
    let mut spans = vec![
        Span::styled(format!("{} ", styles::status_icon(&p.status)), style),
        Span::raw(format!("{:<18}", p.name)),
        Span::styled(format!("[{}]", p.status), style),
    ];

    let busy: Vec<&str> = ActionKind::ALL
        .iter()
        .filter(|kind| store.is_busy(&ControlId::new(p.name.as_str(), **kind)))
        .map(|kind| kind.progress_label())
        .collect();
    if !busy.is_empty() {
        spans.push(Span::styled(format!(" {}", busy.join(" ")), styles::warn()));
    }

    let details: Vec<String> = [
        p.pid.map(|pid| format!("pid {pid}")),
        p.uptime.as_ref().map(|u| format!("up {u}")),
        p.memory.as_ref().map(|m| format!("mem {m}")),
        p.cpu.as_ref().map(|c| format!("cpu {c}")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !details.is_empty() {
        spans.push(Span::styled(format!("  {}", details.join("  ")), styles::text_muted()));
    }

    ListItem::new(Line::from(spans))
}

fn log_line(entry: &LogEntry) -> Line<'_> {
    if entry.is_placeholder() {
        return Line::styled(entry.message.as_str(), styles::text_muted());
    }
    let mut spans = vec![
        Span::styled(format!("{} ", entry.clock()), styles::text_muted()),
        Span::styled(format!("{:<5} ", entry.level), styles::level(&entry.level)),
    ];
    if let Some(worker) = &entry.worker {
        spans.push(Span::styled(format!("[{worker}] "), styles::accent()));
    }
    spans.push(Span::styled(entry.message.as_str(), styles::text()));
    Line::from(spans)
}

/// Draw the newest entries that fit, oldest at the top.
fn log_panel(f: &mut Frame, area: Rect, title: &str, entries: &[LogEntry]) {
    let visible = area.height.saturating_sub(2) as usize;
    let start = entries.len().saturating_sub(visible);
    let lines: Vec<Line> = entries[start..].iter().map(log_line).collect();
    let panel = Paragraph::new(lines).block(
        Block::default()
            .title(title.to_string())
            .borders(Borders::ALL)
            .border_style(styles::border_subtle()),
    );
    f.render_widget(panel, area);
}

async fn tui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| app.draw(f))?;

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }

        let CEvent::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        app.notice = None;
        if !app.handle_key(code, modifiers) {
            return Ok(());
        }
    }
}

pub async fn run_tui(
    dash: Dashboard,
    store: Arc<RwLock<PanelStore>>,
    title: String,
) -> anyhow::Result<()> {
    dash.select_worker(None).await;
    {
        let dash = dash.clone();
        tokio::spawn(async move { dash.start().await });
    }

    let mut app = App {
        dash: dash.clone(),
        store,
        title,
        selected: 0,
        list_state: ListState::default(),
        notice: None,
    };

    let mut terminal = setup_terminal()?;
    let result = tui_loop(&mut terminal, &mut app).await;
    restore_terminal(terminal)?;

    dash.shutdown();
    info!(event = "tui.exited");
    Ok(result?)
}
