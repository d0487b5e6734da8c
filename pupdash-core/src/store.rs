use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, RwLock};

use crate::model::{LogEntry, ProcessRecord};
use crate::projector::RenderMode;
use crate::render::{ControlId, LogPanel, Renderer};

/// What each panel currently shows, bounded to `cap` entries per panel.
#[derive(Debug)]
pub struct PanelStore {
    pub cap: usize,
    pub panels: BTreeMap<LogPanel, VecDeque<LogEntry>>,
    pub processes: Vec<ProcessRecord>,
    pub busy: BTreeSet<ControlId>,
    /// Bumped on every change so a UI can skip redraws.
    pub revision: u64,
}

impl PanelStore {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            panels: BTreeMap::new(),
            processes: Vec::new(),
            busy: BTreeSet::new(),
            revision: 0,
        }
    }

    pub fn apply(&mut self, panel: LogPanel, entries: &[LogEntry], mode: RenderMode) {
        let q = self.panels.entry(panel).or_default();
        if mode == RenderMode::Replace {
            q.clear();
        }
        // A placeholder only makes sense on its own.
        if mode == RenderMode::Append && q.iter().all(LogEntry::is_placeholder) {
            q.clear();
        }
        q.extend(entries.iter().cloned());
        while q.len() > self.cap {
            q.pop_front();
        }
        self.revision += 1;
    }

    pub fn set_processes(&mut self, records: &[ProcessRecord]) {
        self.processes = records.to_vec();
        self.revision += 1;
    }

    pub fn set_busy(&mut self, control: &ControlId, busy: bool) {
        if busy {
            self.busy.insert(control.clone());
        } else {
            self.busy.remove(control);
        }
        self.revision += 1;
    }

    pub fn entries(&self, panel: LogPanel) -> Vec<LogEntry> {
        self.panels
            .get(&panel)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_busy(&self, control: &ControlId) -> bool {
        self.busy.contains(control)
    }
}

/// A [`Renderer`] that just records into a shared [`PanelStore`].
#[derive(Clone, Debug)]
pub struct StoreRenderer {
    store: Arc<RwLock<PanelStore>>,
}

impl StoreRenderer {
    pub fn new(cap: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(PanelStore::new(cap))),
        }
    }

    pub fn store(&self) -> Arc<RwLock<PanelStore>> {
        self.store.clone()
    }

    fn with<R>(&self, f: impl FnOnce(&mut PanelStore) -> R) -> R {
        // A panic while drawing must not take the dashboard down with it.
        let mut guard = self.store.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl Renderer for StoreRenderer {
    fn render(&self, panel: LogPanel, entries: &[LogEntry], mode: RenderMode) {
        self.with(|s| s.apply(panel, entries, mode));
    }

    fn render_processes(&self, records: &[ProcessRecord]) {
        self.with(|s| s.set_processes(records));
    }

    fn set_busy(&self, control: &ControlId, busy: bool) {
        self.with(|s| s.set_busy(control, busy));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActionKind, LogLevel};

    fn line(msg: &str) -> LogEntry {
        LogEntry::new("2024-05-01T10:00:00Z", LogLevel::Info, msg)
    }

    #[test]
    fn test_replace_then_append() {
        let mut store = PanelStore::new(100);
        store.apply(LogPanel::Worker, &[line("a"), line("b")], RenderMode::Replace);
        store.apply(LogPanel::Worker, &[line("c")], RenderMode::Append);
        assert_eq!(store.entries(LogPanel::Worker).len(), 3);

        store.apply(LogPanel::Worker, &[line("d")], RenderMode::Replace);
        assert_eq!(store.entries(LogPanel::Worker), vec![line("d")]);
        assert!(store.entries(LogPanel::System).is_empty());
    }

    #[test]
    fn test_append_drops_placeholder() {
        let mut store = PanelStore::new(100);
        store.apply(
            LogPanel::Detail,
            &[LogEntry::placeholder("nothing yet")],
            RenderMode::Replace,
        );
        store.apply(LogPanel::Detail, &[line("first")], RenderMode::Append);
        assert_eq!(store.entries(LogPanel::Detail), vec![line("first")]);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut store = PanelStore::new(2);
        store.apply(
            LogPanel::System,
            &[line("1"), line("2"), line("3")],
            RenderMode::Replace,
        );
        assert_eq!(store.entries(LogPanel::System), vec![line("2"), line("3")]);
    }

    #[test]
    fn test_busy_tracking() {
        let renderer = StoreRenderer::new(10);
        let control = ControlId::new("p", ActionKind::Start);
        renderer.set_busy(&control, true);
        assert!(renderer.store().read().unwrap().is_busy(&control));
        renderer.set_busy(&control, false);
        assert!(!renderer.store().read().unwrap().is_busy(&control));
    }
}
