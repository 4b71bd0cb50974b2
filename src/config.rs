//! Configuration loading from environment variables and queue files.
//!
//! Environment values are read from `GG_DISPATCH_*` variables. Invalid
//! values fall back to defaults without crashing. Queues are declared in an
//! optional TOML file:
//!
//! ```toml
//! [[queues]]
//! id = "uploads"
//! order = "fifo"        # fifo | lifo
//! priority = "desc"     # none | asc | desc
//! mode = "response"     # request | response
//! enabled = true
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `GG_DISPATCH_CONFIG` | unset | Path to a queue file |
//! | `GG_DISPATCH_LOG_LEVEL` | info | `EnvFilter` directive |
//! | `GG_DISPATCH_LOG_FORMAT` | json | `json` or `pretty` |
//! | `GG_DISPATCH_SIM_DELAY_MS` | 20 | Default simulated transport delay |

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scheduler::QueueConfig;
use crate::telemetry::{LogConfig, LogFormat};

/// Errors raised while reading or validating a queue file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid queue file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Queue entry {0} has an empty id")]
    EmptyQueueId(usize),
    #[error("Queue id declared twice: {0}")]
    DuplicateQueue(String),
}

/// Queues declared in a config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub queues: Vec<QueueConfig>,
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&source)
    }

    /// Reject empty and repeated queue ids.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (index, queue) in self.queues.iter().enumerate() {
            if queue.id.is_empty() {
                return Err(ConfigError::EmptyQueueId(index));
            }
            if !seen.insert(queue.id.as_str()) {
                return Err(ConfigError::DuplicateQueue(queue.id.clone()));
            }
        }
        Ok(())
    }
}

/// Settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub log: LogConfig,
    pub simulated_delay: Duration,
}

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub config_path: Option<PathBuf>,
    pub log_level: String,
    pub log_format: String,
    pub simulated_delay_ms: u64,
    pub queues: Vec<QueueConfig>,
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

fn load_log_config() -> LogConfig {
    let defaults = LogConfig::default();
    let level = std::env::var("GG_DISPATCH_LOG_LEVEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(defaults.level);
    let format = std::env::var("GG_DISPATCH_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or(defaults.format);
    LogConfig { format, level, output_path: None }
}

/// Load configuration from environment variables.
///
/// Missing or invalid values fall back to defaults without panicking.
pub fn load() -> EnvConfig {
    let config_path = std::env::var_os("GG_DISPATCH_CONFIG")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let delay_ms = parse_u64("GG_DISPATCH_SIM_DELAY_MS", 20).min(60_000);
    EnvConfig {
        config_path,
        log: load_log_config(),
        simulated_delay: Duration::from_millis(delay_ms),
    }
}

impl EnvConfig {
    /// Queue declarations from `config_path`, or none when it is unset.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        match &self.config_path {
            Some(path) => EngineConfig::from_file(path),
            None => Ok(EngineConfig::default()),
        }
    }

    /// Summary of all effective values, including declared queues.
    pub fn effective_config(&self) -> Result<EffectiveConfig, ConfigError> {
        let engine = self.engine_config()?;
        Ok(EffectiveConfig {
            config_path: self.config_path.clone(),
            log_level: self.log.level.clone(),
            log_format: self.log.format.to_string(),
            simulated_delay_ms: self.simulated_delay.as_millis() as u64,
            queues: engine.queues,
        })
    }
}
