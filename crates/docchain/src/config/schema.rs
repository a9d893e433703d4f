use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// How long an idle worker waits on the queue before re-checking for shutdown.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Terminal tasks kept for status queries; the oldest are evicted first.
    #[serde(default = "default_completed_retention")]
    pub completed_retention: usize,
    /// Completed tasks returned per submitter by task listings.
    #[serde(default = "default_recent_completed")]
    pub recent_completed_per_submitter: usize,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub storage_directory: Option<PathBuf>,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub chains: ChainConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_worker_count() -> usize {
    3
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_completed_retention() -> usize {
    1000
}

fn default_recent_completed() -> usize {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            worker_count: default_worker_count(),
            poll_interval_ms: default_poll_interval_ms(),
            completed_retention: default_completed_retention(),
            recent_completed_per_submitter: default_recent_completed(),
            database_path: None,
            storage_directory: None,
            inference: InferenceConfig::default(),
            extraction: ExtractionConfig::default(),
            chains: ChainConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Database path, falling back to `~/.docchain/data/docchain.db`.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(crate::db::default_database_path)
    }

    /// Archive root, falling back to `~/.docchain/documents`.
    pub fn resolved_storage_directory(&self) -> Option<PathBuf> {
        self.storage_directory
            .clone()
            .or_else(|| dirs::home_dir().map(|h| h.join(".docchain").join("documents")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "mistral".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Characters of cleaned text per inference window.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Characters shared by consecutive windows.
    #[serde(default = "default_window_overlap")]
    pub window_overlap: usize,
    #[serde(default = "default_max_windows")]
    pub max_windows: usize,
    /// Amounts below this are treated as quantities or number fragments.
    #[serde(default = "default_min_plausible_amount")]
    pub min_plausible_amount: f64,
}

fn default_window_size() -> usize {
    2000
}

fn default_window_overlap() -> usize {
    600
}

fn default_max_windows() -> usize {
    5
}

fn default_min_plausible_amount() -> f64 {
    100.0
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            window_overlap: default_window_overlap(),
            max_windows: default_max_windows(),
            min_plausible_amount: default_min_plausible_amount(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Age after which an unclosed chain is reported as overdue.
    #[serde(default = "default_overdue_after_days")]
    pub overdue_after_days: i64,
}

fn default_overdue_after_days() -> i64 {
    90
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            overdue_after_days: default_overdue_after_days(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
