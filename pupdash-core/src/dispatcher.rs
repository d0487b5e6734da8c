use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::model::{ActionKind, LogEntry, LogLevel};
use crate::projector::RenderMode;
use crate::render::{ControlId, LogPanel, Renderer};
use crate::source::DataSource;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The API acknowledged the action.
    Succeeded,
    /// The API refused it or could not be reached.
    Failed,
    /// The same control already has an action in flight; nothing was sent.
    Busy,
    /// The dispatcher was closed; nothing was sent.
    Closed,
}

#[derive(Debug, Default)]
struct Controls {
    busy: BTreeSet<ControlId>,
    closed: bool,
}

/// Runs start/stop/restart actions and reports each outcome as a log line in
/// the worker log panel.
#[derive(Clone)]
pub struct ActionDispatcher {
    source: DataSource,
    renderer: Arc<dyn Renderer>,
    controls: Arc<Mutex<Controls>>,
}

impl ActionDispatcher {
    pub fn new(source: DataSource, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            source,
            renderer,
            controls: Arc::new(Mutex::new(Controls::default())),
        }
    }

    pub fn is_busy(&self, control: &ControlId) -> bool {
        self.lock().busy.contains(control)
    }

    /// Refuse new actions and stop drawing. Actions already sent still run to
    /// completion, but their outcome is not rendered.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    /// Run `kind` against `process`, unless that control is already busy or the
    /// dispatcher is closed.
    ///
    /// Exactly one outcome line is appended per call that reaches the API.
    /// Refreshing process status afterwards is the caller's job.
    pub async fn dispatch(&self, kind: ActionKind, process: &str) -> DispatchOutcome {
        let control = ControlId::new(process, kind);
        let _guard = match self.acquire(&control) {
            Ok(guard) => guard,
            Err(outcome) => {
                debug!(event = "dispatch.refused", control = %control, ?outcome);
                return outcome;
            }
        };

        let ok = self.source.run_action(process, kind).await;
        let entry = if ok {
            LogEntry::synthetic(LogLevel::Info, kind.success_message(process))
        } else {
            LogEntry::synthetic(LogLevel::Error, kind.failure_message(process))
        };
        {
            // Held across the render so `close` cannot land between check and draw.
            let controls = self.lock();
            if !controls.closed {
                self.renderer
                    .render(LogPanel::Worker, std::slice::from_ref(&entry), RenderMode::Append);
            }
        }

        info!(event = "dispatch.completed", control = %control, ok);
        if ok {
            DispatchOutcome::Succeeded
        } else {
            DispatchOutcome::Failed
        }
    }

    fn acquire(&self, control: &ControlId) -> Result<BusyGuard, DispatchOutcome> {
        let mut controls = self.lock();
        if controls.closed {
            return Err(DispatchOutcome::Closed);
        }
        if !controls.busy.insert(control.clone()) {
            return Err(DispatchOutcome::Busy);
        }
        self.renderer.set_busy(control, true);
        Ok(BusyGuard {
            control: control.clone(),
            controls: self.controls.clone(),
            renderer: self.renderer.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Controls> {
        self.controls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Clears the busy flag when dropped, whatever path the dispatch took.
struct BusyGuard {
    control: ControlId,
    controls: Arc<Mutex<Controls>>,
    renderer: Arc<dyn Renderer>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut controls = self.controls.lock().unwrap_or_else(|e| e.into_inner());
        controls.busy.remove(&self.control);
        if !controls.closed {
            self.renderer.set_busy(&self.control, false);
        }
    }
}
