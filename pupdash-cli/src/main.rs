mod tui;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;

use pupdash_cli::connect;
use pupdash_cli::logging::{LogTarget, init_logging};
use pupdash_core::dispatcher::ActionDispatcher;
use pupdash_core::filter::{FilterState, Selection};
use pupdash_core::model::{ActionKind, LogEntry, LogLevel, ProcessRecord};
use pupdash_core::projector::{self, NO_SYSTEM_LOGS, NO_WORKER_LOGS, RenderMode};
use pupdash_core::render::{LogPanel, Renderer};
use pupdash_core::source::{Api, DataSource};
use pupdash_core::store::StoreRenderer;
use pupdash_core::{DashConfig, Dashboard, DispatchOutcome, Intervals};

#[derive(Parser)]
#[command(name = "pupdash")]
#[command(about = "Live dashboard for a pupervisor process-supervision API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: PUPDASH_CONFIG, then pupdash.yaml in this or a parent dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Supervisor API address, e.g. http://host:8080 or :8080
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Baseline refresh interval in milliseconds
    #[arg(long, global = true)]
    refresh_ms: Option<u64>,

    /// Follow-mode interval in milliseconds
    #[arg(long, global = true)]
    follow_ms: Option<u64>,

    /// Use the built-in simulated supervisor instead of the HTTP API
    #[arg(long, global = true)]
    demo: bool,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive dashboard (default)
    Tui,
    /// Print the process table once
    Status,
    /// Print worker and system logs, or one worker's logs
    Logs {
        worker: Option<String>,
        /// Only show this level (debug, info, warn, error)
        #[arg(short, long)]
        level: Option<String>,
        /// Keep printing new lines for WORKER until Ctrl+C
        #[arg(short, long, requires = "worker")]
        follow: bool,
    },
    Start {
        #[arg(required = true)]
        names: Vec<String>,
    },
    Stop {
        #[arg(required = true)]
        names: Vec<String>,
    },
    Restart {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<DashConfig> {
    let cwd = std::env::current_dir().context("reading current directory")?;
    let (path, mut config) = DashConfig::resolve(cli.config.as_deref(), &cwd)?;
    match &path {
        Some(path) => debug!(event = "config.loaded", path = %path.display()),
        None => debug!(event = "config.defaults"),
    }

    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url)?;
    }
    if let Some(ms) = cli.refresh_ms {
        config.refresh_interval_ms = ms;
    }
    if let Some(ms) = cli.follow_ms {
        config.follow_interval_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

/// Prints log lines from selected panels as they are rendered.
struct LinePrinter {
    panels: Vec<LogPanel>,
    level: Selection<LogLevel>,
}

impl Renderer for LinePrinter {
    fn render(&self, panel: LogPanel, entries: &[LogEntry], _mode: RenderMode) {
        if !self.panels.contains(&panel) {
            return;
        }
        for entry in entries {
            if entry.is_placeholder() || self.level.matches(&entry.level) {
                println!("{}", format_line(entry));
            }
        }
    }

    fn render_processes(&self, _records: &[ProcessRecord]) {}
}

fn format_line(entry: &LogEntry) -> String {
    if entry.is_placeholder() {
        return entry.message.clone();
    }
    match &entry.worker {
        Some(worker) => format!(
            "{} {:<5} [{}] {}",
            entry.clock(),
            entry.level,
            worker,
            entry.message
        ),
        None => format!("{} {:<5} {}", entry.clock(), entry.level, entry.message),
    }
}

fn dash_or_none(value: Option<&String>) -> &str {
    value.map(String::as_str).unwrap_or("-")
}

async fn run_status(api: Arc<dyn Api>) -> anyhow::Result<()> {
    let processes = api
        .processes()
        .await
        .context("could not reach the supervisor")?;

    println!(
        "{:<20} {:<9} {:>7} {:<14} {:<10} {:<7}",
        "NAME", "STATUS", "PID", "UPTIME", "MEMORY", "CPU"
    );
    for p in projector::project_processes(&processes) {
        println!(
            "{:<20} {:<9} {:>7} {:<14} {:<10} {:<7}",
            p.name,
            p.status,
            p.pid.map(|pid| pid.to_string()).unwrap_or_else(|| "-".into()),
            dash_or_none(p.uptime.as_ref()),
            dash_or_none(p.memory.as_ref()),
            dash_or_none(p.cpu.as_ref()),
        );
    }
    Ok(())
}

async fn run_logs(
    api: Arc<dyn Api>,
    config: &DashConfig,
    worker: Option<String>,
    level: Option<String>,
    follow: bool,
) -> anyhow::Result<()> {
    let level = level
        .as_deref()
        .map(Selection::parse_level)
        .unwrap_or_default();

    if let Some(worker) = worker.as_deref().filter(|_| follow) {
        let printer = Arc::new(LinePrinter {
            panels: vec![LogPanel::Detail],
            level,
        });
        let dash = Dashboard::new(api, printer, Intervals::from(config));
        dash.set_follow(true);
        dash.select_worker(Some(worker)).await;
        eprintln!("Following '{worker}'... (Ctrl+C to stop)");

        tokio::signal::ctrl_c().await?;
        dash.shutdown();
        return Ok(());
    }

    let source = DataSource::new(api);
    let filters = FilterState {
        level,
        ..FilterState::default()
    };

    match worker {
        Some(worker) => {
            let entries = source.logs_for_worker(&worker).await;
            for entry in projector::project(&entries, &filters, projector::NO_DETAIL_LOGS) {
                println!("{}", format_line(&entry));
            }
        }
        None => {
            let (worker_logs, system_logs) =
                tokio::join!(source.worker_logs(), source.system_logs());
            println!("== {} ==", LogPanel::Worker.title());
            for entry in projector::project(&worker_logs, &filters, NO_WORKER_LOGS) {
                println!("{}", format_line(&entry));
            }
            println!("\n== {} ==", LogPanel::System.title());
            for entry in projector::project(&system_logs, &filters, NO_SYSTEM_LOGS) {
                println!("{}", format_line(&entry));
            }
        }
    }
    Ok(())
}

async fn run_actions(
    api: Arc<dyn Api>,
    kind: ActionKind,
    names: Vec<String>,
) -> anyhow::Result<()> {
    let printer = Arc::new(LinePrinter {
        panels: vec![LogPanel::Worker],
        level: Selection::Any,
    });
    let dispatcher = ActionDispatcher::new(DataSource::new(api), printer);

    let mut failed = 0usize;
    for name in &names {
        if dispatcher.dispatch(kind, name).await != DispatchOutcome::Succeeded {
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} action(s) failed", names.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let target = match cli.command {
        Some(Commands::Tui) | None => LogTarget::File,
        _ => LogTarget::Stderr,
    };
    let _log_guard = init_logging(target, cli.verbose)?;

    let config = load_config(&cli)?;
    let api = connect(&config, cli.demo)?;
    debug!(
        event = "backend.ready",
        backend = api.name(),
        base_url = %config.base_url,
    );

    match cli.command {
        Some(Commands::Status) => run_status(api).await,
        Some(Commands::Logs {
            worker,
            level,
            follow,
        }) => run_logs(api, &config, worker, level, follow).await,
        Some(Commands::Start { names }) => run_actions(api, ActionKind::Start, names).await,
        Some(Commands::Stop { names }) => run_actions(api, ActionKind::Stop, names).await,
        Some(Commands::Restart { names }) => run_actions(api, ActionKind::Restart, names).await,
        Some(Commands::Tui) | None => {
            let renderer = StoreRenderer::new(config.panel_capacity);
            let store = renderer.store();
            let title = if cli.demo {
                "demo".to_string()
            } else {
                config.base_url.clone()
            };
            let dash = Dashboard::new(api, Arc::new(renderer), Intervals::from(&config));
            tui::run_tui(dash, store, title).await
        }
    }
}
