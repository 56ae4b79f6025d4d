//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Shared primitives and utilities for the adapter runtime."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_use_measurement_routing() -> bool {
    true
}

fn default_measurement_warning_threshold() -> u64 {
    100_000
}

fn default_measurement_dumping_threshold() -> u64 {
    500_000
}

fn default_sample_warning_threshold() -> u32 {
    10
}

fn default_initialization_timeout() -> Duration {
    Duration::from_millis(15_000)
}

fn default_wait_handle_timeout() -> Duration {
    Duration::from_millis(33)
}

fn default_health_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_statistics_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_initialized_poll_attempts() -> u32 {
    10
}

fn default_initialized_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_file_output() -> bool {
    true
}

fn default_metrics_enabled() -> bool {
    true
}

/// Primary configuration object for a TSF host process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "TSF_CONFIG";

    /// Load configuration from disk, respecting the `TSF_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    pub fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.session.validate()
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Tuning for the session orchestrator and the collections it owns.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Optional session name, appended to every derived source name as `#name`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_use_measurement_routing")]
    pub use_measurement_routing: bool,
    #[serde(default = "default_measurement_warning_threshold")]
    pub measurement_warning_threshold: u64,
    #[serde(default = "default_measurement_dumping_threshold")]
    pub measurement_dumping_threshold: u64,
    /// Seconds of unpublished action-adapter data tolerated before warning.
    #[serde(default = "default_sample_warning_threshold")]
    pub default_sample_warning_threshold: u32,
    #[serde(default = "default_initialization_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub initialization_timeout: Duration,
    #[serde(default = "default_wait_handle_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub wait_handle_timeout: Duration,
    /// Cadence at which collections poll member queue depths.
    #[serde(default = "default_health_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub health_interval: Duration,
    #[serde(default = "default_statistics_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub statistics_interval: Duration,
    #[serde(default = "default_initialized_poll_attempts")]
    pub initialized_poll_attempts: u32,
    #[serde(default = "default_initialized_poll_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub initialized_poll_interval: Duration,
    /// Snapshot of the tabular adapter configuration (JSON).
    #[serde(default)]
    pub configuration_snapshot: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: None,
            use_measurement_routing: default_use_measurement_routing(),
            measurement_warning_threshold: default_measurement_warning_threshold(),
            measurement_dumping_threshold: default_measurement_dumping_threshold(),
            default_sample_warning_threshold: default_sample_warning_threshold(),
            initialization_timeout: default_initialization_timeout(),
            wait_handle_timeout: default_wait_handle_timeout(),
            health_interval: default_health_interval(),
            statistics_interval: default_statistics_interval(),
            initialized_poll_attempts: default_initialized_poll_attempts(),
            initialized_poll_interval: default_initialized_poll_interval(),
            configuration_snapshot: None,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.measurement_dumping_threshold <= self.measurement_warning_threshold {
            return Err(anyhow!(
                "measurement_dumping_threshold ({}) must exceed measurement_warning_threshold ({})",
                self.measurement_dumping_threshold,
                self.measurement_warning_threshold
            ));
        }
        if self.health_interval.is_zero() || self.statistics_interval.is_zero() {
            return Err(anyhow!("collection monitor intervals must be non-zero"));
        }
        if self.initialized_poll_attempts == 0 {
            return Err(anyhow!("initialized_poll_attempts must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    #[serde(default = "default_file_output")]
    pub file_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            file_output: default_file_output(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_session_thresholds() {
        let config = AppConfig::default();
        assert!(config.session.use_measurement_routing);
        assert_eq!(config.session.measurement_warning_threshold, 100_000);
        assert_eq!(config.session.measurement_dumping_threshold, 500_000);
        assert_eq!(config.session.default_sample_warning_threshold, 10);
        assert_eq!(
            config.session.initialization_timeout,
            Duration::from_millis(15_000)
        );
        assert_eq!(config.session.wait_handle_timeout, Duration::from_millis(33));
        config.validate().unwrap();
    }

    #[test]
    fn parses_inline_toml() {
        let config: AppConfig = r#"
            [session]
            name = "replay"
            use_measurement_routing = false
            measurement_warning_threshold = 10
            measurement_dumping_threshold = 50
            initialization_timeout = 250

            [logging]
            format = "json"
            file_output = false
        "#
        .parse()
        .unwrap();
        assert_eq!(config.session.name.as_deref(), Some("replay"));
        assert!(!config.session.use_measurement_routing);
        assert_eq!(config.session.initialization_timeout, Duration::from_millis(250));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.logging.file_output);
    }

    #[test]
    fn rejects_dumping_threshold_below_warning() {
        let err = "[session]\nmeasurement_warning_threshold = 10\nmeasurement_dumping_threshold = 10\n"
            .parse::<AppConfig>()
            .unwrap_err();
        assert!(err.to_string().contains("must exceed"));
    }
}
