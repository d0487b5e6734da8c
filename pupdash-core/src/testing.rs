//! In-memory doubles shared by the unit tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::model::{ActionKind, LogEntry, LogLevel, ProcessRecord, ProcessStatus};
use crate::projector::RenderMode;
use crate::render::{ControlId, LogPanel, Renderer};
use crate::source::{Api, SourceError, SourceResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ActionBehavior {
    Accept,
    Refuse,
    Unreachable,
}

pub fn log(worker: &str, level: LogLevel, message: &str) -> LogEntry {
    LogEntry::new("2024-05-01T10:00:00Z", level, message).with_worker(worker)
}

/// Scripted backend: canned responses, call log, and per-worker gates that hold
/// a fetch open until released.
pub struct ScriptedApi {
    processes: Mutex<Vec<ProcessRecord>>,
    worker_logs: Mutex<Vec<LogEntry>>,
    system_logs: Mutex<Vec<LogEntry>>,
    per_worker: Mutex<BTreeMap<String, Vec<LogEntry>>>,
    gates: Mutex<BTreeMap<String, Arc<Semaphore>>>,
    calls: Mutex<Vec<String>>,
    actions: Mutex<Vec<(String, ActionKind)>>,
    action_behavior: ActionBehavior,
    action_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            processes: Mutex::new(vec![
                ProcessRecord::new("web-server", ProcessStatus::Running),
                ProcessRecord::new("worker-1", ProcessStatus::Stopped),
            ]),
            worker_logs: Mutex::new(Vec::new()),
            system_logs: Mutex::new(Vec::new()),
            per_worker: Mutex::new(BTreeMap::new()),
            gates: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            actions: Mutex::new(Vec::new()),
            action_behavior: ActionBehavior::Accept,
            action_delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn refuse_actions(mut self) -> Self {
        self.action_behavior = ActionBehavior::Refuse;
        self
    }

    pub fn unreachable_actions(mut self) -> Self {
        self.action_behavior = ActionBehavior::Unreachable;
        self
    }

    pub fn with_action_delay(mut self, delay: Duration) -> Self {
        self.action_delay = delay;
        self
    }

    pub fn with_worker_logs(self, entries: Vec<LogEntry>) -> Self {
        *self.worker_logs.lock().unwrap() = entries;
        self
    }

    pub fn with_system_logs(self, entries: Vec<LogEntry>) -> Self {
        *self.system_logs.lock().unwrap() = entries;
        self
    }

    pub fn set_logs_for(&self, worker: &str, entries: Vec<LogEntry>) {
        self.per_worker
            .lock()
            .unwrap()
            .insert(worker.to_string(), entries);
    }

    pub fn push_log_for(&self, worker: &str, entry: LogEntry) {
        self.per_worker
            .lock()
            .unwrap()
            .entry(worker.to_string())
            .or_default()
            .push(entry);
    }

    /// Fetches for `worker` block until [`ScriptedApi::release`] is called.
    pub fn hold(&self, worker: &str) {
        self.gates
            .lock()
            .unwrap()
            .insert(worker.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, worker: &str) {
        // A closed semaphore fails every pending and future acquire, which opens the gate.
        if let Some(gate) = self.gates.lock().unwrap().get(worker) {
            gate.close();
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn action_calls(&self) -> Vec<(String, ActionKind)> {
        self.actions.lock().unwrap().clone()
    }

    pub fn max_actions_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl Api for ScriptedApi {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn processes(&self) -> SourceResult<Vec<ProcessRecord>> {
        self.record("processes");
        Ok(self.processes.lock().unwrap().clone())
    }

    async fn worker_logs(&self) -> SourceResult<Vec<LogEntry>> {
        self.record("worker_logs");
        Ok(self.worker_logs.lock().unwrap().clone())
    }

    async fn system_logs(&self) -> SourceResult<Vec<LogEntry>> {
        self.record("system_logs");
        Ok(self.system_logs.lock().unwrap().clone())
    }

    async fn logs_for_worker(&self, worker: &str) -> SourceResult<Vec<LogEntry>> {
        self.record(format!("logs_for_worker:{worker}"));
        let snapshot = self
            .per_worker
            .lock()
            .unwrap()
            .get(worker)
            .cloned()
            .unwrap_or_default();

        let gate = self
            .gates
            .lock()
            .unwrap()
            .get(worker)
            .cloned();
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }
        Ok(snapshot)
    }

    async fn run_action(&self, process: &str, kind: ActionKind) -> SourceResult<()> {
        self.actions
            .lock()
            .unwrap()
            .push((process.to_string(), kind));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.action_delay.is_zero() {
            tokio::time::sleep(self.action_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let endpoint = format!("/api/processes/{process}/{kind}");
        match self.action_behavior {
            ActionBehavior::Accept => Ok(()),
            ActionBehavior::Refuse => Err(SourceError::Status {
                endpoint,
                status: 409,
            }),
            ActionBehavior::Unreachable => Err(SourceError::Transport {
                endpoint,
                message: "connection refused".into(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RenderCall {
    Log {
        panel: LogPanel,
        entries: Vec<LogEntry>,
        mode: RenderMode,
    },
    Processes(Vec<ProcessRecord>),
    Busy {
        control: ControlId,
        busy: bool,
    },
}

#[derive(Default)]
pub struct RecordingRenderer {
    calls: Mutex<Vec<RenderCall>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Every render into `panel`, oldest first.
    pub fn log_calls(&self, panel: LogPanel) -> Vec<(Vec<LogEntry>, RenderMode)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RenderCall::Log {
                    panel: p,
                    entries,
                    mode,
                } if p == panel => Some((entries, mode)),
                _ => None,
            })
            .collect()
    }

    pub fn process_renders(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, RenderCall::Processes(_)))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, panel: LogPanel, entries: &[LogEntry], mode: RenderMode) {
        self.calls.lock().unwrap().push(RenderCall::Log {
            panel,
            entries: entries.to_vec(),
            mode,
        });
    }

    fn render_processes(&self, records: &[ProcessRecord]) {
        self.calls
            .lock()
            .unwrap()
            .push(RenderCall::Processes(records.to_vec()));
    }

    fn set_busy(&self, control: &ControlId, busy: bool) {
        self.calls.lock().unwrap().push(RenderCall::Busy {
            control: control.clone(),
            busy,
        });
    }
}
