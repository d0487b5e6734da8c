use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

pub type ProcessName = String;
pub type WorkerName = String;

/// Timestamp used by placeholder rows. Never produced by the API.
pub const PLACEHOLDER_TIMESTAMP: &str = "--:--:--";

/// Worker label attached to lines the dashboard writes itself.
pub const SYSTEM_WORKER: &str = "system";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Running,
    Stopped,
    Paused,
    Unknown,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Paused => "paused",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProcessStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_lowercase().as_str() {
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            "paused" => Self::Paused,
            _ => Self::Unknown,
        })
    }
}

/// One supervised process as reported by the API. Replaced wholesale on every poll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub name: ProcessName,
    pub status: ProcessStatus,
    #[serde(default, deserialize_with = "zero_as_none")]
    pub pid: Option<u32>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub uptime: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub memory: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub cpu: Option<String>,
}

impl ProcessRecord {
    pub fn new(name: impl Into<String>, status: ProcessStatus) -> Self {
        Self {
            name: name.into(),
            status,
            pid: None,
            uptime: None,
            memory: None,
            cpu: None,
        }
    }
}

fn zero_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(Option::<u32>::deserialize(deserializer)?.filter(|pid| *pid != 0))
}

fn blank_as_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.trim().is_empty()))
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Other(String),
}

impl LogLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for LogLevel {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// A single log line. Server order is authoritative; the dashboard only filters and appends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerName>,
}

impl LogEntry {
    pub fn new(timestamp: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            level,
            message: message.into(),
            worker: None,
        }
    }

    pub fn with_worker(mut self, worker: impl Into<String>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// A "no data" row, recognizable by its sentinel timestamp.
    pub fn placeholder(message: impl Into<String>) -> Self {
        Self::new(PLACEHOLDER_TIMESTAMP, LogLevel::Info, message)
    }

    pub fn is_placeholder(&self) -> bool {
        self.timestamp == PLACEHOLDER_TIMESTAMP
    }

    /// A line written by the dashboard itself, stamped with the current time.
    pub fn synthetic(level: LogLevel, message: impl Into<String>) -> Self {
        Self::new(chrono::Utc::now().to_rfc3339(), level, message).with_worker(SYSTEM_WORKER)
    }

    /// `HH:MM:SS` in local time, or the raw timestamp if it is not RFC 3339.
    pub fn clock(&self) -> String {
        match chrono::DateTime::parse_from_rfc3339(&self.timestamp) {
            Ok(at) => at.with_timezone(&chrono::Local).format("%H:%M:%S").to_string(),
            Err(_) => self.timestamp.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Start,
    Stop,
    Restart,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [Self::Start, Self::Stop, Self::Restart];

    /// Path segment used by the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Start => "started",
            Self::Stop => "stopped",
            Self::Restart => "restarted",
        }
    }

    /// Label shown on a busy control.
    pub fn progress_label(&self) -> &'static str {
        match self {
            Self::Start => "Starting...",
            Self::Stop => "Stopping...",
            Self::Restart => "Restarting...",
        }
    }

    pub fn success_message(&self, name: &str) -> String {
        format!("Process {} {} successfully", name, self.past_tense())
    }

    pub fn failure_message(&self, name: &str) -> String {
        format!("Failed to {} process {}", self.as_str(), name)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_record_decodes_api_zero_values() {
        let json = r#"[
            {"name":"web-server","status":"running","pid":4242,"uptime":"2h 15m","memory":"128MB","cpu":"2.5%"},
            {"name":"api-service","status":"stopped","pid":0,"uptime":"","memory":"","cpu":""},
            {"name":"odd","status":"zombie"}
        ]"#;
        let records: Vec<ProcessRecord> = serde_json::from_str(json).unwrap();

        assert_eq!(records[0].pid, Some(4242));
        assert_eq!(records[0].cpu.as_deref(), Some("2.5%"));
        assert_eq!(records[1].status, ProcessStatus::Stopped);
        assert_eq!(records[1].pid, None);
        assert_eq!(records[1].uptime, None);
        assert_eq!(records[2].status, ProcessStatus::Unknown);
    }

    #[test]
    fn test_log_level_aliases() {
        assert_eq!(LogLevel::parse("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("WARN"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("error"), LogLevel::Error);
        assert_eq!(LogLevel::parse("trace"), LogLevel::Other("trace".into()));

        let entry: LogEntry = serde_json::from_str(
            r#"{"timestamp":"2024-05-01T10:00:00Z","message":"Retrying job #124","level":"warning","worker":"worker-1"}"#,
        )
        .unwrap();
        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.worker.as_deref(), Some("worker-1"));
    }

    #[test]
    fn test_missing_worker_is_none() {
        let entry: LogEntry = serde_json::from_str(
            r#"{"timestamp":"2024-05-01T10:00:00Z","message":"System started","level":"info"}"#,
        )
        .unwrap();
        assert_eq!(entry.worker, None);
        assert!(!entry.is_placeholder());
        assert!(LogEntry::placeholder("nothing").is_placeholder());
    }

    #[test]
    fn test_action_messages() {
        assert_eq!(
            ActionKind::Start.success_message("p"),
            "Process p started successfully"
        );
        assert_eq!(ActionKind::Restart.failure_message("p"), "Failed to restart process p");
        assert_eq!(ActionKind::Stop.progress_label(), "Stopping...");
    }

    #[test]
    fn test_clock_falls_back_to_raw_timestamp() {
        assert_eq!(LogEntry::placeholder("x").clock(), PLACEHOLDER_TIMESTAMP);
        let synthetic = LogEntry::synthetic(LogLevel::Info, "hello");
        assert_eq!(synthetic.worker.as_deref(), Some(SYSTEM_WORKER));
        assert_eq!(synthetic.clock().len(), 8);
    }
}
