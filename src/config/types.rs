use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub refresh: RefreshConfig,
    pub storage: StorageConfig,
    pub display: DisplayConfig,
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// TTL of the search / workflow-list response cache; `0` disables it.
    pub cache_ttl_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_owned(),
            request_timeout_secs: 30,
            cache_ttl_secs: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub runs_per_page: u32,
    pub run_timeout_secs: u64,
    pub max_restarts: u32,
    pub restart_backoff_secs: u64,
    pub max_restart_backoff_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            batch_size: 3,
            batch_delay_ms: 500,
            runs_per_page: 3,
            run_timeout_secs: 30,
            max_restarts: 5,
            restart_backoff_secs: 2,
            max_restart_backoff_secs: 60,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    pub fn runs_per_page(&self) -> u32 {
        self.runs_per_page.clamp(1, 100)
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// State file; defaults to the XDG data directory.
    pub path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// `strftime`-style format for run timestamps (rendered in UTC).
    pub date_format: String,
    pub commit_message_width: usize,
    pub color: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            date_format: "%b %-d, %Y %-I:%M %p".to_owned(),
            commit_message_width: 50,
            color: true,
        }
    }
}
