//! Access to the supervision API.
//!
//! [`Api`] is the raw, fallible backend (HTTP in production, in-memory in demo
//! mode and tests). [`DataSource`] wraps it and never fails: reads degrade to an
//! empty list, actions to `false`, and the cause goes to the log.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::model::{ActionKind, LogEntry, ProcessRecord};

#[derive(Debug, Error)]
pub enum SourceError {
    /// Network, DNS or timeout failure.
    #[error("transport error on {endpoint}: {message}")]
    Transport { endpoint: String, message: String },
    /// The API answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },
    #[error("could not decode {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl SourceError {
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Transport { endpoint, .. }
            | Self::Status { endpoint, .. }
            | Self::Decode { endpoint, .. } => endpoint,
        }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// A backend for the dashboard's four reads and three writes.
#[async_trait]
pub trait Api: Send + Sync {
    /// Human-readable name of this backend
    fn name(&self) -> &'static str;

    async fn processes(&self) -> SourceResult<Vec<ProcessRecord>>;

    async fn worker_logs(&self) -> SourceResult<Vec<LogEntry>>;

    async fn system_logs(&self) -> SourceResult<Vec<LogEntry>>;

    async fn logs_for_worker(&self, worker: &str) -> SourceResult<Vec<LogEntry>>;

    /// Ok(()) only when the API acknowledged the action.
    async fn run_action(&self, process: &str, kind: ActionKind) -> SourceResult<()>;
}

/// Fail-soft view over an [`Api`].
#[derive(Clone)]
pub struct DataSource {
    api: Arc<dyn Api>,
}

impl DataSource {
    pub fn new(api: Arc<dyn Api>) -> Self {
        Self { api }
    }

    pub fn backend_name(&self) -> &'static str {
        self.api.name()
    }

    pub async fn processes(&self) -> Vec<ProcessRecord> {
        soften(self.api.processes().await, "processes")
    }

    pub async fn worker_logs(&self) -> Vec<LogEntry> {
        soften(self.api.worker_logs().await, "worker_logs")
    }

    pub async fn system_logs(&self) -> Vec<LogEntry> {
        soften(self.api.system_logs().await, "system_logs")
    }

    pub async fn logs_for_worker(&self, worker: &str) -> Vec<LogEntry> {
        if worker.is_empty() {
            return Vec::new();
        }
        soften(self.api.logs_for_worker(worker).await, "logs_for_worker")
    }

    pub async fn run_action(&self, process: &str, kind: ActionKind) -> bool {
        match self.api.run_action(process, kind).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    event = "source.action_failed",
                    process,
                    action = %kind,
                    error = %e,
                );
                false
            }
        }
    }
}

fn soften<T>(result: SourceResult<Vec<T>>, op: &'static str) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!(event = "source.fetch_failed", op, endpoint = e.endpoint(), error = %e);
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogLevel, ProcessStatus};

    struct BrokenApi;

    #[async_trait]
    impl Api for BrokenApi {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn processes(&self) -> SourceResult<Vec<ProcessRecord>> {
            Err(SourceError::Transport {
                endpoint: "/api/processes".into(),
                message: "connection refused".into(),
            })
        }

        async fn worker_logs(&self) -> SourceResult<Vec<LogEntry>> {
            Err(SourceError::Status {
                endpoint: "/api/logs/worker".into(),
                status: 500,
            })
        }

        async fn system_logs(&self) -> SourceResult<Vec<LogEntry>> {
            Err(SourceError::Decode {
                endpoint: "/api/logs/system".into(),
                message: "expected array".into(),
            })
        }

        async fn logs_for_worker(&self, _worker: &str) -> SourceResult<Vec<LogEntry>> {
            panic!("empty worker name must not reach the backend");
        }

        async fn run_action(&self, _process: &str, _kind: ActionKind) -> SourceResult<()> {
            Err(SourceError::Status {
                endpoint: "/api/processes/p/start".into(),
                status: 409,
            })
        }
    }

    struct HealthyApi;

    #[async_trait]
    impl Api for HealthyApi {
        fn name(&self) -> &'static str {
            "healthy"
        }

        async fn processes(&self) -> SourceResult<Vec<ProcessRecord>> {
            Ok(vec![ProcessRecord::new("p", ProcessStatus::Running)])
        }

        async fn worker_logs(&self) -> SourceResult<Vec<LogEntry>> {
            Ok(vec![LogEntry::new("t", LogLevel::Info, "w")])
        }

        async fn system_logs(&self) -> SourceResult<Vec<LogEntry>> {
            Ok(vec![])
        }

        async fn logs_for_worker(&self, worker: &str) -> SourceResult<Vec<LogEntry>> {
            Ok(vec![LogEntry::new("t", LogLevel::Info, "x").with_worker(worker)])
        }

        async fn run_action(&self, _process: &str, _kind: ActionKind) -> SourceResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failures_degrade_to_empty_and_false() {
        let source = DataSource::new(Arc::new(BrokenApi));
        assert!(source.processes().await.is_empty());
        assert!(source.worker_logs().await.is_empty());
        assert!(source.system_logs().await.is_empty());
        assert!(source.logs_for_worker("").await.is_empty());
        assert!(!source.run_action("p", ActionKind::Start).await);
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let source = DataSource::new(Arc::new(HealthyApi));
        assert_eq!(source.backend_name(), "healthy");
        assert_eq!(source.processes().await.len(), 1);
        assert_eq!(source.worker_logs().await.len(), 1);
        assert_eq!(
            source.logs_for_worker("w1").await[0].worker.as_deref(),
            Some("w1")
        );
        assert!(source.run_action("p", ActionKind::Restart).await);
    }

    #[test]
    fn test_error_display() {
        let err = SourceError::Status {
            endpoint: "/api/processes".into(),
            status: 503,
        };
        assert_eq!(err.to_string(), "/api/processes returned HTTP 503");
        assert_eq!(err.endpoint(), "/api/processes");
    }
}
