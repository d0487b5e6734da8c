//! HTTP backend for the pupervisor API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use pupdash_core::model::{ActionKind, LogEntry, ProcessRecord};
use pupdash_core::source::{Api, SourceError, SourceResult};

pub struct HttpApi {
    client: Client,
    base: Url,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("invalid base URL '{base_url}': {e}"))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("invalid base URL '{base_url}': not a hierarchical URL");
        }
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pupdash/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base })
    }

    /// Base URL plus `segments`, each percent-encoded as a single path segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, method: Method, segments: &[&str]) -> SourceResult<reqwest::Response> {
        let url = self.url(segments);
        let endpoint = url.path().to_string();
        debug!(event = "http.request", method = %method, endpoint = %endpoint);

        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|e| SourceError::Transport {
                endpoint: endpoint.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// GET a JSON array. A `null` body (an empty Go slice) reads as empty.
    async fn get_list<T: DeserializeOwned>(&self, segments: &[&str]) -> SourceResult<Vec<T>> {
        let response = self.send(Method::GET, segments).await?;
        let endpoint = response.url().path().to_string();
        let body = response.bytes().await.map_err(|e| SourceError::Transport {
            endpoint: endpoint.clone(),
            message: e.to_string(),
        })?;
        let items: Option<Vec<T>> =
            serde_json::from_slice(&body).map_err(|e| SourceError::Decode {
                endpoint,
                message: e.to_string(),
            })?;
        Ok(items.unwrap_or_default())
    }
}

#[async_trait]
impl Api for HttpApi {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn processes(&self) -> SourceResult<Vec<ProcessRecord>> {
        self.get_list(&["api", "processes"]).await
    }

    async fn worker_logs(&self) -> SourceResult<Vec<LogEntry>> {
        self.get_list(&["api", "logs", "worker"]).await
    }

    async fn system_logs(&self) -> SourceResult<Vec<LogEntry>> {
        self.get_list(&["api", "logs", "system"]).await
    }

    async fn logs_for_worker(&self, worker: &str) -> SourceResult<Vec<LogEntry>> {
        self.get_list(&["api", "logs", "worker", worker]).await
    }

    async fn run_action(&self, process: &str, kind: ActionKind) -> SourceResult<()> {
        // Only the status code matters; the body is informational.
        self.send(Method::POST, &["api", "processes", process, kind.as_str()])
            .await
            .map(|_| ())
    }
}
