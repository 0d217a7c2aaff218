//! Configuration loading and resolution
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments
//! 2. Environment variables (ANTHEM_BASE_URL, ANTHEM_CONFIG)
//! 3. TOML configuration file
//! 4. Built-in defaults
//!
//! A missing TOML file never terminates the client: it degrades to the
//! built-in defaults with a warning.

use crate::error::{Error, Result};
use crate::steps::PipelineProfile;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the backend base URL
pub const ENV_BASE_URL: &str = "ANTHEM_BASE_URL";
/// Environment variable overriding the config file location
pub const ENV_CONFIG_PATH: &str = "ANTHEM_CONFIG";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
const DEFAULT_RESET_DELAY_SECS: u64 = 5;

/// Configuration file contents
///
/// All fields are optional; anything absent falls back to the built-in
/// default for that setting.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Backend API base URL (e.g. "https://anthem.example/api")
    #[serde(default)]
    pub base_url: Option<String>,

    /// Polling behavior
    #[serde(default)]
    pub polling: PollingConfig,

    /// Submission behavior
    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[polling]` section
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Seconds between status polls
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Pipeline shape of the backend (decides whether AUDIO_READY is terminal)
    #[serde(default)]
    pub pipeline: PipelineProfile,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            pipeline: PipelineProfile::default(),
        }
    }
}

/// `[submission]` section
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionConfig {
    /// Seconds to wait before resetting the UI after a submission failure
    #[serde(default = "default_reset_delay_secs")]
    pub reset_delay_secs: u64,

    /// CSRF token to send instead of priming the cookie jar
    #[serde(default)]
    pub csrf_token: Option<String>,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            reset_delay_secs: default_reset_delay_secs(),
            csrf_token: None,
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (stderr when not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_reset_delay_secs() -> u64 {
    DEFAULT_RESET_DELAY_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command-line overrides applied on top of env/TOML/defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub pipeline: Option<PipelineProfile>,
    pub csrf_token: Option<String>,
}

/// Fully resolved client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend API base URL, no trailing slash
    pub base_url: String,
    /// Seconds between status polls
    pub poll_interval_secs: u64,
    /// Pipeline shape of the backend
    pub pipeline: PipelineProfile,
    /// Seconds to wait before resetting the UI after a submission failure
    pub reset_delay_secs: u64,
    /// CSRF token override, when not acquired from the cookie jar
    pub csrf_token: Option<String>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Resolve configuration from all sources
    ///
    /// Priority per source: CLI override, environment variable, TOML file,
    /// built-in default. Never fails on a missing config file; fails only
    /// on a file that exists but cannot be parsed.
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = load_toml(overrides.config_path.as_deref())?;

        let base_url = overrides
            .base_url
            .or_else(|| std::env::var(ENV_BASE_URL).ok())
            .or(toml_config.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = base_url.trim_end_matches('/').to_string();

        let poll_interval_secs = overrides
            .poll_interval_secs
            .unwrap_or(toml_config.polling.interval_secs);
        if poll_interval_secs == 0 {
            return Err(Error::Config(
                "polling interval must be at least 1 second".to_string(),
            ));
        }

        let pipeline = overrides.pipeline.unwrap_or(toml_config.polling.pipeline);
        let csrf_token = overrides.csrf_token.or(toml_config.submission.csrf_token);

        Ok(Self {
            base_url,
            poll_interval_secs,
            pipeline,
            reset_delay_secs: toml_config.submission.reset_delay_secs,
            csrf_token,
            logging: toml_config.logging,
        })
    }

    /// Poll interval as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// UI reset delay as a Duration
    pub fn reset_delay(&self) -> Duration {
        Duration::from_secs(self.reset_delay_secs)
    }
}

/// Default configuration file path for the platform
///
/// `~/.config/anthem/config.toml` on Linux, the platform equivalent
/// elsewhere. None when the config directory cannot be determined.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("anthem").join("config.toml"))
}

/// Load the TOML config, degrading to defaults when no file is found
fn load_toml(explicit_path: Option<&std::path::Path>) -> Result<TomlConfig> {
    let env_path = std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from);
    let user_specified = explicit_path.is_some() || env_path.is_some();
    let path = explicit_path.map(PathBuf::from).or(env_path).or_else(default_config_path);

    let Some(path) = path else {
        warn!("Could not determine config directory, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        // Only warn when the user pointed at the file explicitly
        if user_specified {
            warn!("Config file not found: {}, using defaults", path.display());
        }
        return Ok(TomlConfig::default());
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: TomlConfig = toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}
