use crate::append_log::LogSettings;
use crate::paths::BanditPaths;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding `access_token`.
pub const ENV_ACCESS_TOKEN: &str = "BANDITLOG_ACCESS_TOKEN";
/// Environment variable overriding `sheet_id`.
pub const ENV_SHEET_ID: &str = "BANDITLOG_SHEET_ID";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Experiment configuration, stored in `.banditlog/config.json`.
/// Every key is optional; missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Target spreadsheet id.
    pub sheet_id: Option<String>,
    pub log_worksheet: String,
    pub summary_worksheet: String,
    pub flush_threshold: usize,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub jitter_ratio: f64,
    pub n_rounds: u32,
    /// Width of the first/last switch-count windows in the summary.
    pub window: usize,
    /// OAuth bearer token for the Sheets API. Prefer the environment variable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            sheet_id: None,
            log_worksheet: "logs".to_string(),
            summary_worksheet: "summary".to_string(),
            flush_threshold: 15,
            max_retries: 5,
            base_backoff_ms: 500,
            jitter_ratio: 0.35,
            n_rounds: 30,
            window: 10,
            access_token: None,
        }
    }
}

impl ExperimentConfig {
    /// Load from `.banditlog/config.json`, then apply environment overrides.
    /// A missing file yields the defaults.
    pub fn load(paths: &BanditPaths) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(paths)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn load_file(paths: &BanditPaths) -> Result<Self, ConfigError> {
        let path = &paths.config_json;
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(ENV_ACCESS_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.access_token = Some(token);
        }
        if let Some(id) = lookup(ENV_SHEET_ID).filter(|v| !v.trim().is_empty()) {
            self.sheet_id = Some(id);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_threshold == 0 {
            return Err(ConfigError::Invalid("flush_threshold must be at least 1".into()));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be at least 1".into()));
        }
        if self.n_rounds == 0 {
            return Err(ConfigError::Invalid("n_rounds must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(ConfigError::Invalid(format!(
                "jitter_ratio must be within 0..=1, got {}",
                self.jitter_ratio
            )));
        }
        if self.log_worksheet.trim().is_empty() || self.summary_worksheet.trim().is_empty() {
            return Err(ConfigError::Invalid("worksheet names must not be empty".into()));
        }
        if self.log_worksheet == self.summary_worksheet {
            return Err(ConfigError::Invalid(
                "log_worksheet and summary_worksheet must differ".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            base_backoff: Duration::from_millis(self.base_backoff_ms),
            jitter_ratio: self.jitter_ratio,
        }
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            log_worksheet: self.log_worksheet.clone(),
            summary_worksheet: self.summary_worksheet.clone(),
            flush_threshold: self.flush_threshold,
            retry: self.retry_policy(),
        }
    }

    /// Write a config file containing every default, for `banditlog init`.
    pub fn write_default(paths: &BanditPaths) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&Self::default())?;
        banditlog_store::write_atomic(&paths.config_json, json.as_bytes())
    }
}
