use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_FOLLOW_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_PANEL_CAPACITY: usize = 5_000;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV: &str = "PUPDASH_CONFIG";

const CONFIG_NAMES: [&str; 4] = [
    "pupdash.yaml",
    "pupdash.yml",
    ".pupdash.yaml",
    ".pupdash.yml",
];

/// Root configuration file structure
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DashConfig {
    /// Where the supervisor API listens. `:8080` and `host:8080` are accepted.
    pub base_url: String,

    /// Baseline refresh of every panel
    pub refresh_interval_ms: u64,

    /// Follow-mode polling of the selected worker
    pub follow_interval_ms: u64,

    /// Per-request timeout for the HTTP client
    pub request_timeout_ms: u64,

    /// Max entries kept per rendered log panel
    pub panel_capacity: usize,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            follow_interval_ms: DEFAULT_FOLLOW_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            panel_capacity: DEFAULT_PANEL_CAPACITY,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid base_url '{0}': expected http:// or https://")]
    InvalidBaseUrl(String),
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("no config file found, searched: {searched:?}")]
    NotFound { searched: Vec<PathBuf> },
}

impl DashConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Load configuration from a string (useful for testing)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        // An empty file is a valid, all-defaults config.
        let mut config: DashConfig = if content.trim().is_empty() {
            DashConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.base_url = normalize_base_url(&config.base_url);
        config.validate()?;
        Ok(config)
    }

    /// Search for config file in standard locations
    pub fn discover(start_dir: &Path) -> Result<(PathBuf, Self), ConfigError> {
        let mut searched = Vec::new();

        // Check environment variable first
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Ok((path.clone(), Self::load(&path)?));
            }
            searched.push(path);
        }

        // Search current directory and parents
        let mut dir = Some(start_dir);
        while let Some(current) = dir {
            for name in &CONFIG_NAMES {
                let path = current.join(name);
                if path.exists() {
                    return Ok((path.clone(), Self::load(&path)?));
                }
                searched.push(path);
            }
            dir = current.parent();
        }

        Err(ConfigError::NotFound { searched })
    }

    /// Explicit path if given, else discovery, else defaults.
    pub fn resolve(
        explicit: Option<&Path>,
        start_dir: &Path,
    ) -> Result<(Option<PathBuf>, Self), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Some(path.to_path_buf()), Self::load(path)?));
        }
        match Self::discover(start_dir) {
            Ok((path, config)) => Ok((Some(path), config)),
            Err(ConfigError::NotFound { .. }) => Ok((None, Self::default())),
            Err(e) => Err(e),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        let intervals = [
            ("refresh_interval_ms", self.refresh_interval_ms),
            ("follow_interval_ms", self.follow_interval_ms),
            ("request_timeout_ms", self.request_timeout_ms),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.panel_capacity == 0 {
            return Err(ConfigError::Zero {
                field: "panel_capacity",
            });
        }
        Ok(())
    }

    /// Replace the base URL, normalizing `:port` forms, and re-validate.
    pub fn with_base_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.base_url = normalize_base_url(raw);
        self.validate()?;
        Ok(self)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn follow_interval(&self) -> Duration {
        Duration::from_millis(self.follow_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// `:8080` -> `http://127.0.0.1:8080`, `host:8080` -> `http://host:8080`.
/// Anything with a scheme is only stripped of trailing slashes.
pub fn normalize_base_url(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches('/');
    if raw.contains("://") {
        return raw.to_string();
    }
    if let Some(port) = raw.strip_prefix(':') {
        return format!("http://127.0.0.1:{port}");
    }
    format!("http://{raw}")
}
