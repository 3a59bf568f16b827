use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::UazError;

/// Top-level uazdash configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub poller: PollerConfig,
}

/// General console settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Write a daily rolling log file under `{data_dir}/logs`.
    #[serde(default = "default_true")]
    pub log_to_file: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            log_to_file: true,
        }
    }
}

/// REST backend connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token sent on every request. Empty = no auth header.
    #[serde(default)]
    pub api_key: String,
    /// Per-request timeout in seconds. 0 = rely on the backend's own timeout.
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout_secs: 0,
        }
    }
}

/// Persistent store config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Status poller and pairing cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Tick interval of the status poller, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    /// Interval between QR code fetches while pairing, in milliseconds.
    #[serde(default = "default_qr_interval_ms")]
    pub qr_interval_ms: u64,
    /// How often a paused dispatch re-checks its job status, in milliseconds.
    #[serde(default = "default_pause_check_ms")]
    pub pause_check_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            qr_interval_ms: default_qr_interval_ms(),
            pause_check_ms: default_pause_check_ms(),
        }
    }
}

// --- Default value functions ---

fn default_name() -> String {
    "uazdash".to_string()
}
fn default_data_dir() -> String {
    "~/.uazdash".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}
fn default_db_path() -> String {
    "~/.uazdash/uazdash.db".to_string()
}
fn default_poll_interval_ms() -> u64 {
    800
}
fn default_qr_interval_ms() -> u64 {
    3000
}
fn default_pause_check_ms() -> u64 {
    500
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. `UAZ_BASE_URL` and
/// `UAZ_API_KEY` override the `[backend]` section when set.
pub fn load(path: &str) -> Result<Config, UazError> {
    let path = Path::new(path);
    let mut config = if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    } else {
        let content = std::fs::read_to_string(path).map_err(|e| {
            UazError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| UazError::Config(format!("failed to parse config: {}", e)))?
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    if config.poller.interval_ms == 0 {
        return Err(UazError::Config(
            "poller.interval_ms must be greater than zero".into(),
        ));
    }

    Ok(config)
}

fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("UAZ_BASE_URL").filter(|v| !v.is_empty()) {
        config.backend.base_url = url;
    }
    if let Some(key) = lookup("UAZ_API_KEY").filter(|v| !v.is_empty()) {
        config.backend.api_key = key;
    }
}
