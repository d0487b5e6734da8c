//! Tracing setup.
//!
//! The TUI owns the terminal, so while it runs logs go to a daily-rolled JSON
//! lines file instead of stderr. One-shot commands log compactly to stderr.

use std::path::PathBuf;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Checked before `RUST_LOG`.
pub const LOG_ENV: &str = "PUPDASH_LOG";

/// Keep alive for the whole run; dropping it flushes the file writer.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File,
}

pub fn init_logging(target: LogTarget, verbose: bool) -> anyhow::Result<LogGuard> {
    let env_filter = env_filter(verbose);

    match target {
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .with_file(verbose)
                        .with_line_number(verbose)
                        .compact(),
                )
                .try_init()
                .context("installing stderr logger")?;
            Ok(LogGuard { _file_guard: None })
        }
        LogTarget::File => {
            let log_dir = default_log_dir();
            std::fs::create_dir_all(&log_dir)
                .with_context(|| format!("creating log directory {}", log_dir.display()))?;

            let file_appender = tracing_appender::rolling::daily(&log_dir, "pupdash.log");
            let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .json()
                        .with_current_span(false)
                        .with_span_list(false),
                )
                .try_init()
                .context("installing file logger")?;

            tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");
            Ok(LogGuard {
                _file_guard: Some(file_guard),
            })
        }
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "info" };
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| {
            EnvFilter::new(format!(
                "pupdash={default_level},pupdash_core={default_level},pupdash_cli={default_level}"
            ))
        })
}

/// `$HOME/.pupdash/logs`, or the temp dir when `HOME` is unset.
pub fn default_log_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".pupdash").join("logs"),
        None => std::env::temp_dir().join("pupdash").join("logs"),
    }
}
