//! Add-on options loaded once at startup.
//!
//! The supervisor writes the user's options to `/data/options.json`. Only
//! `log_level` and `scan_interval` are required; everything else falls back
//! to the defaults below.

use anyhow::{Context, Result, bail};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::logs::LogPattern;

pub const DEFAULT_OPTIONS_PATH: &str = "/data/options.json";
pub const OPTIONS_PATH_ENV: &str = "HA_DIAGNOSTICS_OPTIONS";

const DEFAULT_OUTPUT_PATH: &str = "/share/ha_diagnostics.json";
const DEFAULT_LOG_FILE: &str = "/config/home-assistant.log";
const DEFAULT_CONFIG_DIR: &str = "/config";
const DEFAULT_DISK_PATH: &str = "/";
const DEFAULT_RETRY_BACKOFF_SECS: u64 = 60;
const DEFAULT_LOG_TAIL_LINES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::Trace,
            Self::Debug => LevelFilter::Debug,
            Self::Info => LevelFilter::Info,
            Self::Warning => LevelFilter::Warn,
            // `log` has no level above error
            Self::Error | Self::Critical => LevelFilter::Error,
        }
    }
}

/// Two-tier percentage limits for one resource. Both are strict `>` bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub warning: f64,
    pub critical: f64,
}

impl Default for Threshold {
    fn default() -> Self {
        Self {
            warning: 80.0,
            critical: 90.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub memory: Threshold,
    pub disk: Threshold,
    pub cpu: Threshold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    /// Seconds between successful cycles.
    pub scan_interval: u64,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    /// Seconds to wait after a failed cycle.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: u64,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: usize,
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    #[serde(default = "default_disk_path")]
    pub disk_path: PathBuf,
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Appended to the built-in log signatures.
    #[serde(default)]
    pub log_patterns: Vec<LogPattern>,
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

fn default_retry_backoff() -> u64 {
    DEFAULT_RETRY_BACKOFF_SECS
}

fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

fn default_log_tail_lines() -> usize {
    DEFAULT_LOG_TAIL_LINES
}

fn default_config_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_DIR)
}

fn default_disk_path() -> PathBuf {
    PathBuf::from(DEFAULT_DISK_PATH)
}

impl Config {
    /// Load from `$HA_DIAGNOSTICS_OPTIONS`, falling back to `/data/options.json`.
    pub fn load() -> Result<Self> {
        let path = env::var_os(OPTIONS_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OPTIONS_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read options from {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid options in {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw).context("malformed options JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_interval == 0 {
            bail!("scan_interval must be at least 1 second");
        }
        if self.retry_backoff == 0 {
            bail!("retry_backoff must be at least 1 second");
        }
        if self.log_tail_lines == 0 {
            bail!("log_tail_lines must be at least 1");
        }
        for (name, t) in [
            ("memory", &self.thresholds.memory),
            ("disk", &self.thresholds.disk),
            ("cpu", &self.thresholds.cpu),
        ] {
            if !(0.0..=100.0).contains(&t.warning) || !(0.0..=100.0).contains(&t.critical) {
                bail!("{name} thresholds must be between 0 and 100");
            }
            if t.warning >= t.critical {
                bail!(
                    "{name} warning threshold ({}) must be below critical ({})",
                    t.warning,
                    t.critical
                );
            }
        }
        for pattern in &self.log_patterns {
            if pattern.needle.trim().is_empty() {
                bail!("log pattern '{}' has an empty needle", pattern.id);
            }
        }
        Ok(())
    }
}
