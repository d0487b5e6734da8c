//! Pure mapping from fetched records to what a panel should show.

use crate::filter::FilterState;
use crate::model::{LogEntry, ProcessRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Discard what the panel shows and draw these entries instead.
    Replace,
    /// Add these entries after what the panel already shows.
    Append,
}

pub const NO_WORKER_LOGS: &str = "No worker logs available.";
pub const NO_SYSTEM_LOGS: &str = "No system logs available.";
pub const NO_DETAIL_LOGS: &str = "No logs available for this worker.";
pub const NO_WORKER_SELECTED: &str = "Select a worker to view logs.";

/// Filter `entries` by worker and level, keeping server order.
///
/// Never returns an empty list: when nothing survives, the result is a single
/// placeholder row carrying `empty_message`.
pub fn project(entries: &[LogEntry], filters: &FilterState, empty_message: &str) -> Vec<LogEntry> {
    let shown: Vec<LogEntry> = entries
        .iter()
        .filter(|entry| filters.should_show(entry))
        .cloned()
        .collect();
    or_placeholder(shown, empty_message)
}

/// Entries rendered as-is (system logs, a single worker's logs).
pub fn project_unfiltered(entries: &[LogEntry], empty_message: &str) -> Vec<LogEntry> {
    or_placeholder(entries.to_vec(), empty_message)
}

/// Process records are never filtered or reordered.
pub fn project_processes(records: &[ProcessRecord]) -> Vec<ProcessRecord> {
    records.to_vec()
}

fn or_placeholder(entries: Vec<LogEntry>, empty_message: &str) -> Vec<LogEntry> {
    if entries.is_empty() {
        vec![LogEntry::placeholder(empty_message)]
    } else {
        entries
    }
}

/// The part of `batch` that comes after `last_shown`.
///
/// Matches from the end so a repeated line earlier in the batch does not cause
/// re-appends. If `last_shown` is no longer in the batch the whole batch is new.
pub fn fresh_tail<'a>(batch: &'a [LogEntry], last_shown: Option<&LogEntry>) -> &'a [LogEntry] {
    let Some(last) = last_shown else {
        return batch;
    };
    match batch.iter().rposition(|entry| entry == last) {
        Some(idx) => &batch[idx + 1..],
        None => batch,
    }
}
