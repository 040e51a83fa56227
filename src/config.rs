// src/config.rs
// =============================================================================
// Settings for a check run.
//
// Settings come from an optional JSON file; every field has a default, so an
// empty file (or no file at all) is a valid configuration. Command-line flags
// are applied on top in main.rs.
//
// Example site-guardian.json:
//   {
//     "max_concurrent_checks": 5,
//     "probe_timeout_ms": 5000,
//     "email_recipient": "ops@example.com",
//     "presets": { "Main sites": "data/websites.csv" }
//   }
// =============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::batch::DEFAULT_CONCURRENCY;
use crate::checker::{FallbackPolicy, DEFAULT_PROBE_TIMEOUT};
use crate::report::{MailRelayConfig, ReportOptions};

/// Config file picked up from the working directory when --config is absent.
pub const DEFAULT_CONFIG_FILE: &str = "site-guardian.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Show whether each site uses https
    pub check_ssl: bool,
    /// Show latency for each site
    pub check_latency: bool,
    /// Batch size: how many sites are probed at the same time
    pub max_concurrent_checks: usize,
    /// Deadline for one probe, in milliseconds
    pub probe_timeout_ms: u64,
    pub fallback_policy: FallbackPolicy,
    /// Who receives the e-mail report
    pub email_recipient: Option<String>,
    /// Named target files, e.g. "Main sites" -> data/websites.csv
    pub presets: BTreeMap<String, PathBuf>,
    pub mail_relay: Option<MailRelayConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_ssl: true,
            check_latency: true,
            max_concurrent_checks: DEFAULT_CONCURRENCY,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT.as_millis() as u64,
            fallback_policy: FallbackPolicy::default(),
            email_recipient: None,
            presets: BTreeMap::new(),
            mail_relay: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Invalid(String),
    #[error("unknown preset '{name}' (available: {available})")]
    UnknownPreset { name: String, available: String },
}

impl Config {
    // Loads the config
    //
    // - An explicit path must exist
    // - Without one, site-guardian.json in the working directory is used if
    //   present, otherwise the defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_checks == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_checks must be at least 1".to_string(),
            ));
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "probe_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            show_ssl: self.check_ssl,
            show_latency: self.check_latency,
        }
    }

    pub fn preset(&self, name: &str) -> Result<&Path, ConfigError> {
        self.presets
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| ConfigError::UnknownPreset {
                name: name.to_string(),
                available: self.presets.keys().cloned().collect::<Vec<_>>().join(", "),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.check_ssl);
        assert!(config.check_latency);
        assert_eq!(config.max_concurrent_checks, 5);
        assert_eq!(config.probe_timeout_ms, 5000);
        assert_eq!(config.fallback_policy, FallbackPolicy::OpaqueRetry);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config(r#"{ "max_concurrent_checks": 10, "fallback_policy": "strict" }"#);
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.max_concurrent_checks, 10);
        assert_eq!(config.fallback_policy, FallbackPolicy::Strict);
        assert_eq!(config.probe_timeout_ms, 5000);
    }

    #[test]
    fn test_full_file() {
        let file = write_config(
            r#"{
                "check_ssl": false,
                "email_recipient": "ops@example.com",
                "presets": { "Main sites": "data/websites.csv" },
                "mail_relay": { "service_id": "s", "template_id": "t", "user_id": "u" }
            }"#,
        );
        let config = Config::load(Some(file.path())).unwrap();
        assert!(!config.report_options().show_ssl);
        assert_eq!(config.email_recipient.as_deref(), Some("ops@example.com"));
        assert_eq!(config.preset("Main sites").unwrap(), Path::new("data/websites.csv"));
        let relay = config.mail_relay.unwrap();
        assert_eq!(relay.endpoint, "https://api.emailjs.com/");
    }

    #[test]
    fn test_zero_concurrency_is_invalid() {
        let file = write_config(r#"{ "max_concurrent_checks": 0 }"#);
        assert!(matches!(Config::load(Some(file.path())), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_json() {
        let file = write_config("{ not json");
        assert!(matches!(Config::load(Some(file.path())), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = Config::load(Some(Path::new("/no/such/config.json")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_unknown_preset() {
        let err = Config::default().preset("nope").unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
