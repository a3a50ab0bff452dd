//! Engine configuration
//!
//! Loaded from a JSON file. Every field has a default; an empty object is a
//! valid in-memory configuration.
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/scenariotree",
//!   "port": 54330,
//!   "cache_refresh_ms": 500,
//!   "hidden_answer_policy": "suppress",
//!   "scenario_timeout_secs": 86400
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{LogEvent, Logger};
use crate::scenario::HiddenAnswerPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Invalid config JSON: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "SCN_CONFIG_READ",
            ConfigError::Parse(_) | ConfigError::Invalid(_) => "SCN_CONFIG_INVALID",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Journal directory; absent means an in-memory event log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 54330)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Availability cache refresh interval and maximum lag (default: 500)
    #[serde(default = "default_cache_refresh_ms")]
    pub cache_refresh_ms: u64,

    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    /// Whether answers of hidden questions appear in the answer feed
    #[serde(default)]
    pub hidden_answer_policy: HiddenAnswerPolicy,

    /// Open scenarios idle this long are cancelled by the sweep; 0 disables
    #[serde(default)]
    pub scenario_timeout_secs: u64,

    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    54330
}

fn default_cache_refresh_ms() -> u64 {
    500
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            host: default_host(),
            port: default_port(),
            cache_refresh_ms: default_cache_refresh_ms(),
            cache_enabled: default_cache_enabled(),
            hidden_answer_policy: HiddenAnswerPolicy::default(),
            scenario_timeout_secs: 0,
            cors_origins: default_cors_origins(),
        }
    }
}

impl EngineConfig {
    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_json(&content)?;
        let data_dir = config
            .data_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "in-memory".to_string());
        Logger::info(
            LogEvent::ConfigLoaded,
            &[("path", path.display().to_string().as_str()), ("data_dir", data_dir.as_str())],
        );
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.cache_enabled && self.cache_refresh_ms == 0 {
            return Err(ConfigError::Invalid(
                "cache_refresh_ms must be > 0 when the cache is enabled".into(),
            ));
        }
        if let Some(dir) = &self.data_dir {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("data_dir must not be empty".into()));
            }
        }
        if self.cors_origins.iter().any(|o| o.trim().is_empty()) {
            return Err(ConfigError::Invalid("cors_origins must not contain empty entries".into()));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cache_refresh(&self) -> Duration {
        Duration::from_millis(self.cache_refresh_ms)
    }

    /// `None` when the timeout sweep is disabled
    pub fn scenario_timeout(&self) -> Option<Duration> {
        (self.scenario_timeout_secs > 0).then(|| Duration::from_secs(self.scenario_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_object_is_valid() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert!(config.data_dir.is_none());
        assert_eq!(config.port, 54330);
        assert_eq!(config.hidden_answer_policy, HiddenAnswerPolicy::Suppress);
        assert!(config.scenario_timeout().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"data_dir": "/tmp/scn", "port": 8080, "hidden_answer_policy": "retain", "scenario_timeout_secs": 60}}"#
        )
        .unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/scn")));
        assert_eq!(config.socket_addr(), "0.0.0.0:8080");
        assert_eq!(config.hidden_answer_policy, HiddenAnswerPolicy::Retain);
        assert_eq!(config.scenario_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_zero_refresh_rejected_when_cache_enabled() {
        let err = EngineConfig::from_json(r#"{"cache_refresh_ms": 0}"#).unwrap_err();
        assert_eq!(err.code(), "SCN_CONFIG_INVALID");
        assert!(EngineConfig::from_json(r#"{"cache_refresh_ms": 0, "cache_enabled": false}"#).is_ok());
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(EngineConfig::from_json(r#"{"hidden_answer_policy": "maybe"}"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::load(Path::new("/nonexistent/scenariotree.json")).unwrap_err();
        assert_eq!(err.code(), "SCN_CONFIG_READ");
    }
}
