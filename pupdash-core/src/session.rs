//! The dashboard session: owns filter and follow state plus both refresh
//! cycles, and decides what gets fetched and drawn.
//!
//! Fetches never run under the state lock. Every response re-checks the state
//! when it arrives and is dropped if its context moved on (another worker was
//! selected, follow was toggled, a newer fetch for the same panel already
//! landed). Renders happen under the lock so the check and the draw cannot be
//! split by a state change.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::DashConfig;
use crate::dispatcher::{ActionDispatcher, DispatchOutcome};
use crate::filter::{FilterState, FollowState, KnownValues, Selection};
use crate::model::{ActionKind, LogEntry, WorkerName};
use crate::projector::{
    self, NO_DETAIL_LOGS, NO_SYSTEM_LOGS, NO_WORKER_LOGS, NO_WORKER_SELECTED, RenderMode,
};
use crate::render::{LogPanel, Renderer};
use crate::scheduler::{Cycle, RefreshScheduler};
use crate::source::{Api, DataSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Intervals {
    /// Baseline refresh of every panel.
    pub refresh: Duration,
    /// Follow-mode tail of the selected worker.
    pub follow: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            refresh: Duration::from_millis(crate::config::DEFAULT_REFRESH_INTERVAL_MS),
            follow: Duration::from_millis(crate::config::DEFAULT_FOLLOW_INTERVAL_MS),
        }
    }
}

impl From<&DashConfig> for Intervals {
    fn from(config: &DashConfig) -> Self {
        Self {
            refresh: config.refresh_interval(),
            follow: config.follow_interval(),
        }
    }
}

/// Hands out increasing tickets and admits a response only if nothing newer
/// has been drawn for the same target.
#[derive(Debug, Default)]
struct Sequencer {
    issued: u64,
    drawn: u64,
}

impl Sequencer {
    fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn admit(&mut self, ticket: u64) -> bool {
        if ticket <= self.drawn {
            return false;
        }
        self.drawn = ticket;
        true
    }
}

#[derive(Debug, Default)]
struct SessionState {
    filters: FilterState,
    follow: FollowState,
    /// Changes with every selection. Replace fetches for the detail panel are
    /// tagged with it.
    detail_epoch: u64,
    /// The detail panel has been replaced with the selected worker's logs at
    /// least once. Until then follow ticks replace instead of appending.
    detail_drawn: bool,
    /// Last real entry shown in the detail panel; follow appends start after it.
    detail_tail: Option<LogEntry>,
    /// Raw batch from the last worker-log fetch, re-projected on filter changes.
    worker_batch: Option<Vec<LogEntry>>,
    known: KnownValues,
    scheduler: RefreshScheduler,
    processes_seq: Sequencer,
    worker_seq: Sequencer,
    system_seq: Sequencer,
    detail_seq: Sequencer,
    closed: bool,
}

impl SessionState {
    fn select(&mut self, worker: Option<WorkerName>) {
        self.filters.selected_worker = worker.clone();
        self.follow.target = worker;
        self.detail_epoch += 1;
        self.detail_drawn = false;
        self.detail_tail = None;
    }
}

struct Inner {
    source: DataSource,
    renderer: Arc<dyn Renderer>,
    dispatcher: ActionDispatcher,
    intervals: Intervals,
    state: Mutex<SessionState>,
}

/// Handle to a running dashboard session. Cheap to clone; the session stops
/// when [`Dashboard::shutdown`] is called or the last handle is dropped.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<Inner>,
}

impl Dashboard {
    pub fn new(api: Arc<dyn Api>, renderer: Arc<dyn Renderer>, intervals: Intervals) -> Self {
        let source = DataSource::new(api);
        let dispatcher = ActionDispatcher::new(source.clone(), renderer.clone());
        Self {
            inner: Arc::new(Inner {
                source,
                renderer,
                dispatcher,
                intervals,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    pub fn intervals(&self) -> Intervals {
        self.inner.intervals
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.source.backend_name()
    }

    /// Load every panel once and start the baseline cycle.
    pub async fn start(&self) {
        {
            let mut state = self.inner.lock();
            if state.closed {
                return;
            }
            let cycle = self.inner.baseline_cycle();
            state.scheduler.start_baseline(cycle);
        }
        info!(
            event = "session.started",
            backend = self.backend_name(),
            refresh_ms = self.inner.intervals.refresh.as_millis() as u64,
            follow_ms = self.inner.intervals.follow.as_millis() as u64,
        );
        self.inner.refresh_all().await;
    }

    /// One extra baseline fetch set. The baseline timer keeps its phase.
    pub async fn refresh(&self) {
        debug!(event = "session.manual_refresh");
        self.inner.refresh_all().await;
    }

    pub async fn refresh_processes(&self) {
        self.inner.refresh_processes().await;
    }

    pub async fn set_worker_filter(&self, raw: &str) {
        self.update_filters(|filters, _| filters.worker = Selection::parse_worker(raw))
            .await;
    }

    pub async fn set_level_filter(&self, raw: &str) {
        self.update_filters(|filters, _| filters.level = Selection::parse_level(raw))
            .await;
    }

    /// Step the worker filter through `all` and every worker seen so far.
    pub async fn cycle_worker_filter(&self) {
        self.update_filters(|filters, known| {
            filters.worker = filters.worker.cycle(&known.workers);
        })
        .await;
    }

    pub async fn cycle_level_filter(&self) {
        self.update_filters(|filters, known| {
            filters.level = filters.level.cycle(&known.levels);
        })
        .await;
    }

    async fn update_filters(&self, change: impl FnOnce(&mut FilterState, &KnownValues)) {
        let reprojected = {
            let mut state = self.inner.lock();
            let SessionState {
                filters, known, ..
            } = &mut *state;
            change(filters, known);

            if !state.known.knows_worker(&state.filters.worker)
                || !state.known.knows_level(&state.filters.level)
            {
                debug!(event = "session.filter_unknown_value", filters = %state.filters.label());
            }

            match &state.worker_batch {
                Some(batch) if !state.closed => {
                    let shown = projector::project(batch, &state.filters, NO_WORKER_LOGS);
                    self.inner
                        .renderer
                        .render(LogPanel::Worker, &shown, RenderMode::Replace);
                    true
                }
                _ => false,
            }
        };

        if !reprojected {
            self.inner.refresh_worker_logs().await;
        }
    }

    /// Choose which worker the detail panel shows; `None` clears the choice.
    pub async fn select_worker(&self, worker: Option<&str>) {
        let worker = worker.map(str::trim).filter(|w| !w.is_empty()).map(str::to_string);

        let Some(worker) = worker else {
            let mut state = self.inner.lock();
            state.select(None);
            state.follow.bump();
            state.scheduler.stop_follow();
            if !state.closed {
                self.inner.renderer.render(
                    LogPanel::Detail,
                    &[LogEntry::placeholder(NO_WORKER_SELECTED)],
                    RenderMode::Replace,
                );
            }
            debug!(event = "session.worker_deselected");
            return;
        };

        let (epoch, following) = {
            let mut state = self.inner.lock();
            state.select(Some(worker.clone()));
            if state.follow.enabled {
                // Retire the old cycle before anything is fetched for the new worker.
                state.follow.bump();
                state.scheduler.stop_follow();
            }
            (state.detail_epoch, state.follow.enabled)
        };
        info!(event = "session.worker_selected", worker = %worker, following);

        self.inner.refresh_detail(&worker).await;

        if following {
            let mut state = self.inner.lock();
            // Skip if a later selection took over, or a follow toggle already
            // restarted the cycle.
            if !state.closed
                && state.follow.enabled
                && state.detail_epoch == epoch
                && !state.scheduler.follow_running()
            {
                self.inner.start_follow(&mut state);
            }
        }
    }

    /// Flip follow mode and return the new setting.
    pub fn toggle_follow(&self) -> bool {
        let mut state = self.inner.lock();
        let enabled = !state.follow.enabled;
        self.inner.apply_follow(&mut state, enabled);
        enabled
    }

    pub fn set_follow(&self, enabled: bool) {
        let mut state = self.inner.lock();
        if state.follow.enabled != enabled {
            self.inner.apply_follow(&mut state, enabled);
        }
    }

    /// Empty the worker log panel. The next baseline tick fills it again.
    pub fn clear_worker_logs(&self) {
        let state = self.inner.lock();
        if !state.closed {
            self.inner
                .renderer
                .render(LogPanel::Worker, &[], RenderMode::Replace);
        }
    }

    /// Run an action, report it in the worker log panel, then refresh process
    /// status. A busy control or a closed session short-circuits with no refresh.
    pub async fn dispatch(&self, kind: ActionKind, process: &str) -> DispatchOutcome {
        let outcome = self.inner.dispatcher.dispatch(kind, process).await;
        let sent = matches!(outcome, DispatchOutcome::Succeeded | DispatchOutcome::Failed);
        let closed = self.inner.lock().closed;
        if sent && !closed {
            self.inner.refresh_processes().await;
        }
        outcome
    }

    pub fn filters(&self) -> FilterState {
        self.inner.lock().filters.clone()
    }

    pub fn follow_state(&self) -> FollowState {
        self.inner.lock().follow.clone()
    }

    pub fn is_following(&self) -> bool {
        self.inner.lock().follow.is_active()
    }

    pub fn follow_running(&self) -> bool {
        self.inner.lock().scheduler.follow_running()
    }

    pub fn baseline_running(&self) -> bool {
        self.inner.lock().scheduler.baseline_running()
    }

    /// Cancel both cycles and close the action path. Responses still in flight
    /// are discarded on arrival.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.follow.bump();
        state.scheduler.shutdown();
        self.inner.dispatcher.close();
        info!(event = "session.stopped");
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn baseline_cycle(self: &Arc<Self>) -> Cycle {
        let weak: Weak<Inner> = Arc::downgrade(self);
        Cycle::spawn("baseline", self.intervals.refresh, move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.refresh_all().await;
                }
            }
        })
    }

    fn start_follow(self: &Arc<Self>, state: &mut SessionState) {
        let Some(worker) = state.follow.target.clone().filter(|_| state.follow.enabled) else {
            return;
        };
        let epoch = state.follow.bump();
        let weak: Weak<Inner> = Arc::downgrade(self);
        let cycle = Cycle::spawn("follow", self.intervals.follow, move || {
            let weak = weak.clone();
            let worker = worker.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.follow_tick(epoch, &worker).await;
                }
            }
        });
        state.scheduler.restart_follow(cycle);
    }

    fn apply_follow(self: &Arc<Self>, state: &mut SessionState, enabled: bool) {
        state.follow.enabled = enabled;
        if enabled && !state.closed {
            self.start_follow(state);
        } else {
            state.follow.bump();
            state.scheduler.stop_follow();
        }
        info!(
            event = "session.follow_toggled",
            enabled,
            worker = state.follow.target.as_deref().unwrap_or(""),
            running = state.scheduler.follow_running(),
        );
    }

    async fn refresh_all(self: &Arc<Self>) {
        let detail = {
            let state = self.lock();
            if state.closed {
                return;
            }
            if state.follow.is_active() {
                None
            } else {
                state.filters.selected_worker.clone()
            }
        };

        tokio::join!(
            self.refresh_processes(),
            self.refresh_worker_logs(),
            self.refresh_system_logs(),
            async {
                if let Some(worker) = &detail {
                    self.refresh_detail(worker).await;
                }
            },
        );
    }

    async fn refresh_processes(&self) {
        let ticket = self.lock().processes_seq.issue();
        let records = self.source.processes().await;

        let mut state = self.lock();
        if state.closed || !state.processes_seq.admit(ticket) {
            debug!(event = "session.stale_response", panel = "processes");
            return;
        }
        self.renderer
            .render_processes(&projector::project_processes(&records));
    }

    async fn refresh_worker_logs(&self) {
        let ticket = self.lock().worker_seq.issue();
        let batch = self.source.worker_logs().await;

        let mut state = self.lock();
        if state.closed || !state.worker_seq.admit(ticket) {
            debug!(event = "session.stale_response", panel = "worker");
            return;
        }
        state.known = KnownValues::from_entries(&batch);
        let shown = projector::project(&batch, &state.filters, NO_WORKER_LOGS);
        state.worker_batch = Some(batch);
        self.renderer
            .render(LogPanel::Worker, &shown, RenderMode::Replace);
    }

    async fn refresh_system_logs(&self) {
        let ticket = self.lock().system_seq.issue();
        let batch = self.source.system_logs().await;

        let mut state = self.lock();
        if state.closed || !state.system_seq.admit(ticket) {
            debug!(event = "session.stale_response", panel = "system");
            return;
        }
        let shown = projector::project_unfiltered(&batch, NO_SYSTEM_LOGS);
        self.renderer
            .render(LogPanel::System, &shown, RenderMode::Replace);
    }

    /// Replace the detail panel with `worker`'s logs, unless the selection
    /// moved on while the fetch was out.
    async fn refresh_detail(&self, worker: &str) {
        let (epoch, ticket) = {
            let mut state = self.lock();
            (state.detail_epoch, state.detail_seq.issue())
        };
        let batch = self.source.logs_for_worker(worker).await;

        let mut state = self.lock();
        let current = !state.closed
            && state.detail_epoch == epoch
            && state.filters.selected_worker.as_deref() == Some(worker);
        if !current || !state.detail_seq.admit(ticket) {
            debug!(event = "session.stale_response", panel = "detail", worker);
            return;
        }
        state.detail_drawn = true;
        state.detail_tail = batch.last().cloned();
        let shown = projector::project_unfiltered(&batch, NO_DETAIL_LOGS);
        self.renderer
            .render(LogPanel::Detail, &shown, RenderMode::Replace);
    }

    /// Append what is new since the last tick. Follow ticks share the detail
    /// sequencer, so a Replace fetched before a tick cannot land after it.
    async fn follow_tick(&self, epoch: u64, worker: &str) {
        let ticket = self.lock().detail_seq.issue();
        let batch = self.source.logs_for_worker(worker).await;

        let mut state = self.lock();
        let current = !state.closed && state.follow.accepts(epoch, worker);
        if !current || !state.detail_seq.admit(ticket) {
            debug!(event = "session.stale_response", panel = "follow", worker);
            return;
        }
        if !state.detail_drawn {
            // The selection's own Replace has not landed; the panel still shows
            // whatever was there before.
            state.detail_drawn = true;
            state.detail_tail = batch.last().cloned();
            let shown = projector::project_unfiltered(&batch, NO_DETAIL_LOGS);
            self.renderer
                .render(LogPanel::Detail, &shown, RenderMode::Replace);
            return;
        }
        let fresh = projector::fresh_tail(&batch, state.detail_tail.as_ref());
        if fresh.is_empty() {
            return;
        }
        state.detail_tail = fresh.last().cloned();
        self.renderer
            .render(LogPanel::Detail, fresh, RenderMode::Append);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        state.scheduler.shutdown();
    }
}
