//! Store configuration
//!
//! Configuration is loaded from environment variables with the `FOLIO`
//! prefix and `__` as the nesting separator, after reading a `.env` file when
//! one is present:
//!
//! - `FOLIO__OWNER=octocat` -> `owner = "octocat"`
//! - `FOLIO__DATA_FOLDER=content` -> `data_folder = "content"`
//! - `FOLIO__READ_ORDER=raw_mirror,contents_api` -> `read_order = [...]`

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StoreError};

/// Which endpoint a read provider talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadProviderKind {
    /// Unauthenticated raw-content mirror
    RawMirror,
    /// Authenticated contents API
    ContentsApi,
}

/// Repository coordinates and transport settings for a [`ContentStore`](crate::ContentStore)
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Repository owner (user or organization)
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// Branch that content is read from and committed to
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Folder inside the repository holding the resource files
    #[serde(default = "default_data_folder")]
    pub data_folder: String,

    /// Base URL of the REST API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Base URL of the raw-content mirror
    #[serde(default = "default_raw_base")]
    pub raw_base: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Pause before the single raw-mirror retry after a suspected rate limit
    #[serde(default = "default_backoff")]
    pub rate_limit_backoff_ms: u64,

    /// Order in which read providers are tried
    #[serde(default = "default_read_order")]
    pub read_order: Vec<ReadProviderKind>,

    /// Return the empty default for known resources when every read provider fails
    #[serde(default = "default_fallback")]
    pub fallback_to_default: bool,

    /// Where the bearer credential is persisted; in-memory when unset
    #[serde(default)]
    pub credential_file: Option<PathBuf>,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_data_folder() -> String {
    "data".to_string()
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_raw_base() -> String {
    "https://raw.githubusercontent.com".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_backoff() -> u64 {
    1000
}

fn default_read_order() -> Vec<ReadProviderKind> {
    vec![ReadProviderKind::RawMirror, ReadProviderKind::ContentsApi]
}

fn default_fallback() -> bool {
    true
}

impl StoreConfig {
    /// Create a configuration for `owner/repo` with every other field defaulted
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: default_branch(),
            data_folder: default_data_folder(),
            api_base: default_api_base(),
            raw_base: default_raw_base(),
            timeout_secs: default_timeout(),
            rate_limit_backoff_ms: default_backoff(),
            read_order: default_read_order(),
            fallback_to_default: default_fallback(),
            credential_file: None,
        }
    }

    /// Load configuration from `FOLIO__*` environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("FOLIO")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("read_order")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize::<StoreConfig>())
            .map_err(|e| StoreError::InvalidConfig {
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_data_folder(mut self, folder: impl Into<String>) -> Self {
        self.data_folder = folder.into();
        self
    }

    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    pub fn with_raw_base(mut self, url: impl Into<String>) -> Self {
        self.raw_base = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_rate_limit_backoff(mut self, backoff: Duration) -> Self {
        self.rate_limit_backoff_ms = backoff.as_millis() as u64;
        self
    }

    pub fn with_read_order(mut self, order: Vec<ReadProviderKind>) -> Self {
        self.read_order = order;
        self
    }

    pub fn with_fallback_to_default(mut self, enabled: bool) -> Self {
        self.fallback_to_default = enabled;
        self
    }

    pub fn with_credential_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credential_file = Some(path.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }

    /// Check that the configuration can address a repository
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("owner", &self.owner), ("repo", &self.repo)] {
            if value.trim().is_empty() {
                return Err(invalid(format!("{} must not be empty", field)));
            }
            if value.contains('/') {
                return Err(invalid(format!("{} must not contain '/'", field)));
            }
        }

        if self.branch.trim().is_empty() {
            return Err(invalid("branch must not be empty".to_string()));
        }

        for (field, value) in [("api_base", &self.api_base), ("raw_base", &self.raw_base)] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(invalid(format!("{} must be an http(s) URL", field)));
            }
        }

        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs must be greater than zero".to_string()));
        }

        if self.read_order.is_empty() {
            return Err(invalid("read_order must name at least one provider".to_string()));
        }

        Ok(())
    }
}

fn invalid(message: String) -> StoreError {
    StoreError::InvalidConfig { message }
}
