//! Daemon configuration with TOML file support.

use std::path::Path;
use std::time::Duration;

use rollcall_backend::RetryPolicy;
use rollcall_broadcast::BroadcasterConfig;
use rollcall_types::ScopeId;
use rollcall_utils::LogFormat;
use serde::{Deserialize, Serialize};

use crate::error::DaemonError;

/// Configuration for the `rollcall` binary.
///
/// Loaded from a TOML file via [`DaemonConfig::from_toml_file`]; command-line
/// flags and `ROLLCALL_*` environment variables override individual keys
/// through [`DaemonConfig::apply`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Base URL of the scheduling backend.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// WebSocket endpoint delivering token pushes.
    #[serde(default)]
    pub push_url: Option<String>,

    /// Scopes to broadcast.
    #[serde(default)]
    pub scopes: Vec<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Stop when no token has arrived for this long.
    #[serde(default = "default_inactivity_threshold_secs")]
    pub inactivity_threshold_secs: u64,

    #[serde(default = "default_inactivity_poll_secs")]
    pub inactivity_poll_secs: u64,

    /// Delivery attempts for the stop signal.
    #[serde(default = "default_stop_retry_attempts")]
    pub stop_retry_attempts: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_inactivity_threshold_secs() -> u64 {
    13
}

fn default_inactivity_poll_secs() -> u64 {
    3
}

fn default_stop_retry_attempts() -> u32 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_channel_prefix() -> String {
    "presence".to_string()
}

/// Values given on the command line or through the environment.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub backend_url: Option<String>,
    pub push_url: Option<String>,
    pub scopes: Vec<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

impl DaemonConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, DaemonError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DaemonError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, DaemonError> {
        toml::from_str(s).map_err(|e| DaemonError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("DaemonConfig is always serializable to TOML")
    }

    /// Layer command-line and environment values over the file values.
    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(url) = overrides.backend_url {
            self.backend_url = url;
        }
        if overrides.push_url.is_some() {
            self.push_url = overrides.push_url;
        }
        if !overrides.scopes.is_empty() {
            self.scopes = overrides.scopes;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        if let Some(format) = overrides.log_format {
            self.log_format = format;
        }
        self
    }

    pub fn validate(&self) -> Result<(), DaemonError> {
        if self.inactivity_poll_secs == 0 {
            return Err(DaemonError::Config("inactivity_poll_secs must be positive".into()));
        }
        if self.inactivity_threshold_secs < self.inactivity_poll_secs {
            return Err(DaemonError::Config(format!(
                "inactivity_threshold_secs ({}) is shorter than the poll interval ({})",
                self.inactivity_threshold_secs, self.inactivity_poll_secs
            )));
        }
        if self.stop_retry_attempts == 0 {
            return Err(DaemonError::Config("stop_retry_attempts must be at least 1".into()));
        }
        if self.channel_prefix.trim().is_empty() {
            return Err(DaemonError::Config("channel_prefix is empty".into()));
        }
        Ok(())
    }

    /// Scopes to broadcast, trimmed, without blanks.
    pub fn scope_ids(&self) -> Vec<ScopeId> {
        self.scopes
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(ScopeId::from)
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.stop_retry_attempts,
            ..RetryPolicy::default()
        }
    }

    pub fn broadcaster_config(&self) -> BroadcasterConfig {
        BroadcasterConfig {
            channel_prefix: self.channel_prefix.clone(),
            inactivity_threshold: Duration::from_secs(self.inactivity_threshold_secs),
            inactivity_poll: Duration::from_secs(self.inactivity_poll_secs),
            ..BroadcasterConfig::default()
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            push_url: None,
            scopes: Vec::new(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            inactivity_threshold_secs: default_inactivity_threshold_secs(),
            inactivity_poll_secs: default_inactivity_poll_secs(),
            stop_retry_attempts: default_stop_retry_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
            channel_prefix: default_channel_prefix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = DaemonConfig::from_toml_str("").unwrap();
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(config.inactivity_threshold_secs, 13);
        assert_eq!(config.broadcaster_config().inactivity_poll, Duration::from_secs(3));
        assert_eq!(config.retry_policy().max_attempts, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = DaemonConfig {
            push_url: Some("ws://push.local/socket".into()),
            scopes: vec!["sched-1".into()],
            log_format: LogFormat::Json,
            ..DaemonConfig::default()
        };
        let parsed = DaemonConfig::from_toml_str(&config.to_toml_string()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn file_values_are_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            backend_url = "https://attendance.example.com/api"
            scopes = ["sched-1", " sched-2 ", ""]
            log_format = "json"
            inactivity_threshold_secs = 30
            "#
        )
        .unwrap();

        let config = DaemonConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.backend_url, "https://attendance.example.com/api");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.scope_ids(),
            vec![ScopeId::new("sched-1"), ScopeId::new("sched-2")]
        );
        assert_eq!(
            config.broadcaster_config().inactivity_threshold,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn overrides_win_over_file_values() {
        let config = DaemonConfig::from_toml_str(
            r#"
            backend_url = "http://file"
            scopes = ["from-file"]
            "#,
        )
        .unwrap()
        .apply(Overrides {
            backend_url: Some("http://flag".into()),
            scopes: vec!["from-flag".into()],
            ..Overrides::default()
        });
        assert_eq!(config.backend_url, "http://flag");
        assert_eq!(config.scopes, vec!["from-flag".to_string()]);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn threshold_shorter_than_poll_is_rejected() {
        let config = DaemonConfig {
            inactivity_threshold_secs: 2,
            ..DaemonConfig::default()
        };
        assert!(matches!(config.validate(), Err(DaemonError::Config(_))));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = DaemonConfig::from_toml_file(Path::new("/nonexistent/rollcall.toml"));
        assert!(matches!(result, Err(DaemonError::Config(_))));
    }
}
