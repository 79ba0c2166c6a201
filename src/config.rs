//! Configuration management for platemate
//!
//! All settings load from a single TOML file. Every field has a built-in
//! default so the service also runs with no file at all.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--port, --config)
//! 2. TOML configuration file
//! 3. Built-in defaults (code constants)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration loaded from TOML file
///
/// These settings cannot change during runtime. The service must restart
/// to pick up changes to the TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server port
    ///
    /// Default: 5810
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to a recipe catalog TOML file (optional)
    ///
    /// If not specified, the embedded built-in catalog is used.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// Detection loop tuning
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Frame classifier service
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Camera snapshot service
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Product matcher service
    #[serde(default)]
    pub matcher: MatcherConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Detection loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Minimum probability for a label to be accepted (inclusive)
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Milliseconds between classification cycles
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Minimum milliseconds between product resolution rounds
    ///
    /// When a new recipe is detected inside this window the lookup still
    /// happens but the product fan-out is skipped.
    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,

    /// Labels the filter drops before selection (case-insensitive)
    ///
    /// Useful for a model's "background" or "empty plate" class.
    #[serde(default)]
    pub ignored_labels: Vec<String>,
}

/// Frame classifier service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Classifier endpoint receiving base64 JPEG frames
    #[serde(default = "default_classifier_url")]
    pub url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

/// Camera snapshot service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Snapshot endpoint returning one JPEG frame per GET
    #[serde(default = "default_capture_url")]
    pub url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

/// Product matcher service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MatcherConfig {
    /// Matcher endpoint receiving `{"query": <ingredient>}` POSTs
    #[serde(default = "default_matcher_url")]
    pub url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_port() -> u16 {
    5810
}

fn default_threshold() -> f64 {
    0.70
}

fn default_poll_interval_ms() -> u64 {
    350
}

fn default_rate_limit_window_ms() -> u64 {
    2000
}

fn default_classifier_url() -> String {
    "http://127.0.0.1:5001/classify".to_string()
}

fn default_capture_url() -> String {
    "http://127.0.0.1:8080/frame.jpg".to_string()
}

fn default_matcher_url() -> String {
    "http://127.0.0.1:5000/predict".to_string()
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

// Missing-section and missing-field paths must agree, so the Default
// impls call the same functions the serde attributes name.

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            catalog_path: None,
            detection: DetectionConfig::default(),
            classifier: ClassifierConfig::default(),
            capture: CaptureConfig::default(),
            matcher: MatcherConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            poll_interval_ms: default_poll_interval_ms(),
            rate_limit_window_ms: default_rate_limit_window_ms(),
            ignored_labels: Vec::new(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            url: default_classifier_url(),
            timeout_ms: default_http_timeout_ms(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            url: default_capture_url(),
            timeout_ms: default_http_timeout_ms(),
        }
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            url: default_matcher_url(),
            timeout_ms: default_http_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        let toml_str = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Config = toml::from_str(&toml_str)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        Ok(config)
    }

    /// Load from file when it exists, otherwise fall back to defaults
    ///
    /// Runs before tracing is initialized (the filter level comes from the
    /// result), so the config source is logged by the caller.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Get detection poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.detection.poll_interval_ms)
    }

    /// Get resolution rate-limit window as Duration
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.detection.rate_limit_window_ms)
    }
}

impl ClassifierConfig {
    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CaptureConfig {
    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl MatcherConfig {
    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl LoggingConfig {
    /// Tracing filter directive applied when `RUST_LOG` is unset
    pub fn filter_directive(&self) -> String {
        format!("platemate={},tower_http={}", self.level, self.level)
    }
}
