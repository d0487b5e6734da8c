//! In-memory supervisor for `--demo`: a handful of processes that chatter on a
//! timer and obey start/stop/restart the way the real API does.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;

use pupdash_core::model::{ActionKind, LogEntry, LogLevel, ProcessRecord, ProcessStatus};
use pupdash_core::source::{Api, SourceError, SourceResult};

/// Most recent entries returned per log request.
const PAGE: usize = 50;
const MAX_LOGS: usize = 1_000;

#[derive(Clone, Debug)]
struct DemoProcess {
    name: &'static str,
    status: ProcessStatus,
    pid: u32,
    started: Option<Instant>,
    base_memory: u64,
    base_cpu: f32,
}

impl DemoProcess {
    fn new(name: &'static str, status: ProcessStatus, base_memory: u64, base_cpu: f32) -> Self {
        let running = status == ProcessStatus::Running;
        Self {
            name,
            status,
            pid: if running { 10_000 + name.len() as u32 * 100 } else { 0 },
            started: running.then(Instant::now),
            base_memory,
            base_cpu,
        }
    }

    fn record(&self, tick: u64) -> ProcessRecord {
        let mut record = ProcessRecord::new(self.name, self.status.clone());
        if self.status == ProcessStatus::Running {
            record.pid = Some(self.pid);
            record.uptime = self.started.map(|t| format_uptime(t.elapsed()));
            record.memory = Some(format_bytes(self.base_memory + (tick % 20) * 1_000_000));
            let cpu = (self.base_cpu + (tick % 10) as f32 * 1.5 - 5.0).max(0.1);
            record.cpu = Some(format!("{cpu:.1}%"));
        }
        record
    }
}

struct DemoState {
    processes: Vec<DemoProcess>,
    worker_logs: VecDeque<LogEntry>,
    system_logs: VecDeque<LogEntry>,
    tick: u64,
    job: u64,
}

impl DemoState {
    fn seeded() -> Self {
        let mut state = Self {
            processes: vec![
                DemoProcess::new("web-server", ProcessStatus::Running, 45_000_000, 6.0),
                DemoProcess::new("api-service", ProcessStatus::Stopped, 80_000_000, 12.0),
                DemoProcess::new("database", ProcessStatus::Running, 120_000_000, 8.0),
                DemoProcess::new("worker-1", ProcessStatus::Running, 60_000_000, 35.0),
                DemoProcess::new("worker-queue", ProcessStatus::Paused, 23_000_000, 3.0),
            ],
            worker_logs: VecDeque::new(),
            system_logs: VecDeque::new(),
            tick: 0,
            job: 122,
        };
        state.system(LogLevel::Info, "System started");
        state.system(LogLevel::Info, "Health check passed");
        state.worker("worker-1", LogLevel::Info, "Worker initialized".into());
        state.worker("web-server", LogLevel::Info, "Listening on :8000".into());
        state
    }

    fn system(&mut self, level: LogLevel, message: &str) {
        push_capped(
            &mut self.system_logs,
            LogEntry::new(now(), level, message),
        );
    }

    fn worker(&mut self, worker: &str, level: LogLevel, message: String) {
        push_capped(
            &mut self.worker_logs,
            LogEntry::new(now(), level, message).with_worker(worker),
        );
    }

    fn advance(&mut self) {
        self.tick += 1;
        let tick = self.tick;

        let running: Vec<&'static str> = self
            .processes
            .iter()
            .filter(|p| p.status == ProcessStatus::Running)
            .map(|p| p.name)
            .collect();

        for name in running {
            let (level, message) = match name {
                "web-server" => {
                    if tick % 12 == 7 {
                        (LogLevel::Error, "Connection refused to upstream service".to_string())
                    } else if tick % 8 == 3 {
                        (LogLevel::Warn, "High latency detected: 450ms".to_string())
                    } else {
                        let routes = [
                            "GET /health 200",
                            "GET /api/users 200",
                            "POST /api/data 201",
                            "GET /api/status 200",
                        ];
                        (LogLevel::Info, routes[(tick as usize) % routes.len()].to_string())
                    }
                }
                "worker-1" | "worker-queue" => {
                    self.job += 1;
                    if tick % 10 == 5 {
                        (LogLevel::Error, format!("Error processing job #{}: timeout", self.job))
                    } else if tick % 7 == 2 {
                        (LogLevel::Warn, format!("Retrying job #{}", self.job))
                    } else {
                        (LogLevel::Info, format!("Job #{} completed successfully", self.job))
                    }
                }
                "database" => {
                    if tick % 15 == 10 {
                        (LogLevel::Warn, "Slow query detected: 1250ms".to_string())
                    } else {
                        let msgs = [
                            "checkpoint complete",
                            "autovacuum: processing",
                            "connection accepted",
                        ];
                        (LogLevel::Debug, msgs[(tick as usize) % msgs.len()].to_string())
                    }
                }
                _ => (LogLevel::Info, format!("tick {tick}")),
            };
            self.worker(name, level, message);
        }

        if tick % 20 == 0 {
            let memory = 55 + tick % 30;
            let level = if memory > 80 { LogLevel::Warn } else { LogLevel::Info };
            self.system(level, &format!("Memory usage at {memory}%"));
        }
    }

    fn apply(&mut self, name: &str, kind: ActionKind) -> SourceResult<()> {
        let endpoint = format!("/api/processes/{name}/{kind}");
        let Some(process) = self.processes.iter_mut().find(|p| p.name == name) else {
            return Err(SourceError::Status {
                endpoint,
                status: 404,
            });
        };

        let running = process.status == ProcessStatus::Running;
        match kind {
            ActionKind::Start if running => {
                return Err(SourceError::Status {
                    endpoint,
                    status: 409,
                });
            }
            ActionKind::Stop if !running => {
                return Err(SourceError::Status {
                    endpoint,
                    status: 409,
                });
            }
            ActionKind::Start | ActionKind::Restart => {
                process.status = ProcessStatus::Running;
                process.pid = 20_000 + (self.tick % 45_000) as u32;
                process.started = Some(Instant::now());
            }
            ActionKind::Stop => {
                process.status = ProcessStatus::Stopped;
                process.pid = 0;
                process.started = None;
            }
        }

        let name = process.name;
        self.worker(name, LogLevel::Info, format!("Process {name} {}", kind.past_tense()));
        Ok(())
    }
}

/// Simulated supervisor backend.
pub struct DemoApi {
    state: Mutex<DemoState>,
}

impl DemoApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DemoState::seeded()),
        }
    }

    /// Create the backend and start its chatter ticker. The ticker stops once
    /// the last handle is dropped.
    pub fn spawn(tick_interval: Duration) -> Arc<Self> {
        let api = Arc::new(Self::new());
        let weak: Weak<Self> = Arc::downgrade(&api);

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(tick_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // Skip the first tick (happens immediately)
            tick.tick().await;

            loop {
                tick.tick().await;
                let Some(api) = weak.upgrade() else {
                    break;
                };
                api.lock().advance();
            }
        });

        api
    }

    /// Run one chatter step by hand.
    pub fn advance(&self) {
        self.lock().advance();
    }

    fn lock(&self) -> MutexGuard<'_, DemoState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for DemoApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Api for DemoApi {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn processes(&self) -> SourceResult<Vec<ProcessRecord>> {
        let state = self.lock();
        Ok(state.processes.iter().map(|p| p.record(state.tick)).collect())
    }

    async fn worker_logs(&self) -> SourceResult<Vec<LogEntry>> {
        Ok(last_n(self.lock().worker_logs.iter(), PAGE))
    }

    async fn system_logs(&self) -> SourceResult<Vec<LogEntry>> {
        Ok(last_n(self.lock().system_logs.iter(), PAGE))
    }

    async fn logs_for_worker(&self, worker: &str) -> SourceResult<Vec<LogEntry>> {
        let state = self.lock();
        let matching = state
            .worker_logs
            .iter()
            .filter(|e| e.worker.as_deref() == Some(worker));
        Ok(last_n(matching, PAGE))
    }

    async fn run_action(&self, process: &str, kind: ActionKind) -> SourceResult<()> {
        self.lock().apply(process, kind)
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn push_capped(logs: &mut VecDeque<LogEntry>, entry: LogEntry) {
    logs.push_back(entry);
    while logs.len() > MAX_LOGS {
        logs.pop_front();
    }
}

fn last_n<'a>(entries: impl DoubleEndedIterator<Item = &'a LogEntry>, n: usize) -> Vec<LogEntry> {
    let mut out: Vec<LogEntry> = entries.rev().take(n).cloned().collect();
    out.reverse();
    out
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1}GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0}KB", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// `3d 4h 5m`, `4h 5m 6s`, `5m 6s` or `6s`.
pub fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (days, hours, minutes, seconds) = (
        secs / 86_400,
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60,
    );
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
