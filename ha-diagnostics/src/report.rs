use anyhow::{Context, Result};
use chrono::{Local, SecondsFormat};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::collectors::SystemHealth;
use crate::logs::LogAnalysis;
use crate::solutions::Solution;
use crate::types::Issue;

/// Everything collected in one cycle. Rebuilt from scratch every time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub timestamp: String,
    pub system_health: SystemHealth,
    pub log_analysis: LogAnalysis,
    pub config_issues: Vec<Issue>,
    pub solutions: Vec<Solution>,
}

impl DiagnosticReport {
    pub fn new(
        system_health: SystemHealth,
        log_analysis: LogAnalysis,
        config_issues: Vec<Issue>,
        solutions: Vec<Solution>,
    ) -> Self {
        Self {
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            system_health,
            log_analysis,
            config_issues,
            solutions,
        }
    }

    pub fn issue_count(&self) -> usize {
        self.system_health.issues.len() + self.log_analysis.issues.len() + self.config_issues.len()
    }
}

/// Serialize the report and replace `path` with it.
///
/// The JSON is fully rendered before the file is touched and lands through a
/// rename, so a failure leaves the previous report in place.
pub fn write_report(path: &Path, report: &DiagnosticReport) -> Result<()> {
    let body = serde_json::to_vec_pretty(report).context("failed to serialize diagnostic report")?;

    ensure_parent(path)
        .with_context(|| format!("failed to create directory for {}", path.display()))?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, &body)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            tmp_path.display(),
            path.display()
        )
    })?;

    debug!("[report] wrote {} bytes to {}", body.len(), path.display());
    Ok(())
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::Reading;
    use crate::types::{IssueKind, Severity};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample_report() -> DiagnosticReport {
        let health = SystemHealth {
            memory: Reading::failed("Unable to read memory info"),
            disk: Reading::failed("Unable to read disk info"),
            cpu: Reading::failed("Unable to read CPU info"),
            issues: Vec::new(),
        };
        let logs = LogAnalysis {
            source: PathBuf::from("/config/home-assistant.log"),
            lines_scanned: 10,
            error_lines: 0,
            warning_lines: 0,
            issues: Vec::new(),
            error: None,
        };
        let config = vec![Issue::new(
            IssueKind::Config,
            Severity::Critical,
            "Configuration file not found",
            "/config/configuration.yaml does not exist",
        )];
        DiagnosticReport::new(health, logs, config, Vec::new())
    }

    #[test]
    fn report_has_exactly_five_top_level_keys() {
        let value = serde_json::to_value(sample_report()).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            [
                "config_issues",
                "log_analysis",
                "solutions",
                "system_health",
                "timestamp"
            ]
        );
    }

    #[test]
    fn timestamp_is_rfc3339() {
        let report = sample_report();
        assert!(chrono::DateTime::parse_from_rfc3339(&report.timestamp).is_ok());
    }

    #[test]
    fn writes_pretty_json_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ha_diagnostics.json");
        std::fs::write(&path, "stale").unwrap();

        let report = sample_report();
        write_report(&path, &report).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n  \"timestamp\""), "pretty printed");
        let parsed: DiagnosticReport = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, report);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("share").join("ha_diagnostics.json");
        write_report(&path, &sample_report()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn counts_issues_across_sections() {
        assert_eq!(sample_report().issue_count(), 1);
    }
}
