//! The presentation boundary. The core decides *what* and *how* (replace or
//! append); implementors only draw.

use std::fmt;

use crate::model::{ActionKind, LogEntry, ProcessName, ProcessRecord};
use crate::projector::RenderMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogPanel {
    /// Merged worker logs, subject to the worker and level filters.
    Worker,
    System,
    /// Logs of the single selected worker.
    Detail,
}

impl LogPanel {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Worker => "Worker Logs",
            Self::System => "System Logs",
            Self::Detail => "Worker Detail",
        }
    }
}

/// One action button: a process name plus the action it triggers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId {
    pub process: ProcessName,
    pub kind: ActionKind,
}

impl ControlId {
    pub fn new(process: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            process: process.into(),
            kind,
        }
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.process, self.kind)
    }
}

/// Injected drawing capability. Calls arrive from timer tasks, so implementors
/// must be cheap and must not block.
pub trait Renderer: Send + Sync {
    fn render(&self, panel: LogPanel, entries: &[LogEntry], mode: RenderMode);

    fn render_processes(&self, records: &[ProcessRecord]);

    /// A control became busy or idle.
    fn set_busy(&self, control: &ControlId, busy: bool) {
        let _ = (control, busy);
    }
}
