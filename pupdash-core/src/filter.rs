use std::collections::BTreeSet;

use crate::model::{LogEntry, LogLevel, WorkerName};

/// Sentinel accepted from users and config for "no filtering".
pub const ANY_LABEL: &str = "all";

/// Either every value, or exactly one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selection<T> {
    #[default]
    Any,
    Only(T),
}

impl<T: PartialEq> Selection<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Self::Any => true,
            Self::Only(wanted) => wanted == value,
        }
    }

    /// Step to the next option in `known`, wrapping back to `Any` after the last one.
    /// An `Only` value that is not in `known` cycles back to `Any`.
    pub fn cycle(&self, known: &[T]) -> Self
    where
        T: Clone,
    {
        let next = match self {
            Self::Any => known.first(),
            Self::Only(current) => known
                .iter()
                .position(|k| k == current)
                .and_then(|idx| known.get(idx + 1)),
        };
        match next {
            Some(value) => Self::Only(value.clone()),
            None => Self::Any,
        }
    }
}

impl<T> Selection<T> {
    fn parse_with(raw: &str, parse: impl FnOnce(&str) -> T) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ANY_LABEL) {
            Self::Any
        } else {
            Self::Only(parse(trimmed))
        }
    }
}

impl Selection<WorkerName> {
    pub fn parse_worker(raw: &str) -> Self {
        Self::parse_with(raw, str::to_string)
    }

    pub fn label(&self) -> String {
        match self {
            Self::Any => ANY_LABEL.to_string(),
            Self::Only(worker) => worker.clone(),
        }
    }
}

impl Selection<LogLevel> {
    pub fn parse_level(raw: &str) -> Self {
        Self::parse_with(raw, LogLevel::parse)
    }

    pub fn label(&self) -> String {
        match self {
            Self::Any => ANY_LABEL.to_string(),
            Self::Only(level) => level.as_str().to_string(),
        }
    }
}

/// What the user has chosen to look at. Only mutated by explicit selection events.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    pub worker: Selection<WorkerName>,
    pub level: Selection<LogLevel>,
    pub selected_worker: Option<WorkerName>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker(mut self, worker: &str) -> Self {
        self.worker = Selection::parse_worker(worker);
        self
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = Selection::parse_level(level);
        self
    }

    /// Both filters must hold for an entry to be shown.
    pub fn should_show(&self, entry: &LogEntry) -> bool {
        let worker_ok = match &self.worker {
            Selection::Any => true,
            Selection::Only(wanted) => entry.worker.as_ref() == Some(wanted),
        };
        worker_ok && self.level.matches(&entry.level)
    }

    pub fn label(&self) -> String {
        format!("worker={} level={}", self.worker.label(), self.level.label())
    }
}

/// Workers and levels seen in the most recent worker-log batch.
#[derive(Clone, Debug, Default)]
pub struct KnownValues {
    pub workers: Vec<WorkerName>,
    pub levels: Vec<LogLevel>,
}

impl KnownValues {
    pub fn from_entries(entries: &[LogEntry]) -> Self {
        let workers: BTreeSet<&WorkerName> =
            entries.iter().filter_map(|e| e.worker.as_ref()).collect();
        let levels: BTreeSet<&LogLevel> = entries.iter().map(|e| &e.level).collect();
        Self {
            workers: workers.into_iter().cloned().collect(),
            levels: levels.into_iter().cloned().collect(),
        }
    }

    pub fn knows_worker(&self, selection: &Selection<WorkerName>) -> bool {
        match selection {
            Selection::Any => true,
            Selection::Only(worker) => self.workers.contains(worker),
        }
    }

    pub fn knows_level(&self, selection: &Selection<LogLevel>) -> bool {
        match selection {
            Selection::Any => true,
            Selection::Only(level) => self.levels.contains(level),
        }
    }
}

/// High-frequency tail of a single worker's log stream.
///
/// `epoch` changes on every start, stop or retarget, so a fetch issued under an
/// older epoch can be recognized as stale when it resolves.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FollowState {
    pub enabled: bool,
    pub target: Option<WorkerName>,
    pub epoch: u64,
}

impl FollowState {
    /// Following only runs with a target, even when the user has it switched on.
    pub fn is_active(&self) -> bool {
        self.enabled && self.target.is_some()
    }

    pub fn bump(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// True when a fetch tagged with `epoch` for `worker` may still be rendered.
    pub fn accepts(&self, epoch: u64, worker: &str) -> bool {
        self.is_active() && self.epoch == epoch && self.target.as_deref() == Some(worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(worker: Option<&str>, level: LogLevel) -> LogEntry {
        let e = LogEntry::new("2024-05-01T10:00:00Z", level, "m");
        match worker {
            Some(w) => e.with_worker(w),
            None => e,
        }
    }

    #[test]
    fn test_all_sentinel_parses_to_any() {
        assert_eq!(Selection::parse_worker("all"), Selection::Any);
        assert_eq!(Selection::parse_worker(" ALL "), Selection::Any);
        assert_eq!(Selection::parse_worker(""), Selection::Any);
        assert_eq!(
            Selection::parse_worker("worker-1"),
            Selection::Only("worker-1".to_string())
        );
        assert_eq!(Selection::parse_level("warning"), Selection::Only(LogLevel::Warn));
    }

    #[test]
    fn test_unknown_values_are_accepted() {
        let filters = FilterState::new().with_worker("ghost");
        assert_eq!(filters.worker, Selection::Only("ghost".to_string()));
        assert!(!filters.should_show(&entry(Some("worker-1"), LogLevel::Info)));

        let known = KnownValues::from_entries(&[entry(Some("worker-1"), LogLevel::Info)]);
        assert!(!known.knows_worker(&filters.worker));
        assert!(known.knows_level(&Selection::Only(LogLevel::Info)));
    }

    #[test]
    fn test_worker_filter_excludes_unlabelled_entries() {
        let filters = FilterState::new().with_worker("worker-1");
        assert!(!filters.should_show(&entry(None, LogLevel::Info)));
        assert!(FilterState::new().should_show(&entry(None, LogLevel::Info)));
    }

    #[test]
    fn test_selection_cycle() {
        let known = vec!["a".to_string(), "b".to_string()];
        let s = Selection::Any;
        assert_eq!(s.cycle(&known), Selection::Only("a".to_string()));
        assert_eq!(s.cycle(&known).cycle(&known), Selection::Only("b".to_string()));
        assert_eq!(s.cycle(&known).cycle(&known).cycle(&known), Selection::Any);
        assert_eq!(Selection::Only("gone".to_string()).cycle(&known), Selection::Any);
        assert_eq!(Selection::<String>::Any.cycle(&[]), Selection::Any);
    }

    #[test]
    fn test_follow_requires_target() {
        let mut follow = FollowState {
            enabled: true,
            ..Default::default()
        };
        assert!(!follow.is_active());

        follow.target = Some("w1".into());
        let epoch = follow.bump();
        assert!(follow.accepts(epoch, "w1"));
        assert!(!follow.accepts(epoch, "w2"));

        follow.bump();
        assert!(!follow.accepts(epoch, "w1"));
    }

    #[test]
    fn test_known_values_are_sorted_and_unique() {
        let known = KnownValues::from_entries(&[
            entry(Some("w2"), LogLevel::Error),
            entry(Some("w1"), LogLevel::Info),
            entry(Some("w2"), LogLevel::Info),
            entry(None, LogLevel::Warn),
        ]);
        assert_eq!(known.workers, vec!["w1".to_string(), "w2".to_string()]);
        assert_eq!(known.levels, vec![LogLevel::Info, LogLevel::Warn, LogLevel::Error]);
    }
}
