//! Home Assistant log scanner
//!
//! Reads the tail of `home-assistant.log` and matches each line against a
//! catalog of known failure signatures.
//!
//! Line format written by the core:
//!   2024-05-01 10:22:13.456 ERROR (MainThread) [homeassistant.setup] Setup failed for zha: ...
//!
//! - one issue per matched signature, carrying the hit count and last line
//! - ERROR/CRITICAL lines that match nothing are summarized as one issue

use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::types::{Issue, IssueKind, Severity};

/// Never read more than this from the end of the log.
const MAX_TAIL_BYTES: u64 = 1024 * 1024;
const MAX_DETAIL_CHARS: usize = 300;

/// A known log signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogPattern {
    pub id: String,
    /// Case-insensitive substring.
    pub needle: String,
    pub severity: Severity,
    pub message: String,
}

impl LogPattern {
    fn builtin(id: &str, needle: &str, severity: Severity, message: &str) -> Self {
        Self {
            id: id.to_string(),
            needle: needle.to_lowercase(),
            severity,
            message: message.to_string(),
        }
    }
}

pub fn builtin_patterns() -> Vec<LogPattern> {
    vec![
        LogPattern::builtin(
            "setup_failed",
            "setup failed for",
            Severity::Critical,
            "An integration failed to set up",
        ),
        LogPattern::builtin(
            "integration_error",
            "error while setting up",
            Severity::Critical,
            "An integration raised an error during setup",
        ),
        LogPattern::builtin(
            "connection_failed",
            "unable to connect",
            Severity::Warning,
            "A device or service could not be reached",
        ),
        LogPattern::builtin(
            "timeout",
            "timeout",
            Severity::Warning,
            "Operations are timing out",
        ),
        LogPattern::builtin(
            "database",
            "database is locked",
            Severity::Critical,
            "The recorder database is locked or corrupted",
        ),
        LogPattern::builtin(
            "blocking_call",
            "detected blocking call",
            Severity::Warning,
            "An integration is blocking the event loop",
        ),
        LogPattern::builtin(
            "auth_failed",
            "login attempt or request with invalid authentication",
            Severity::Warning,
            "Failed login attempts were recorded",
        ),
        LogPattern::builtin(
            "deprecated",
            "is deprecated",
            Severity::Warning,
            "Deprecated configuration or features are in use",
        ),
        LogPattern::builtin(
            "memory_error",
            "memoryerror",
            Severity::Critical,
            "Home Assistant ran out of memory",
        ),
    ]
}

/// Result of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogAnalysis {
    pub source: PathBuf,
    pub lines_scanned: usize,
    pub error_lines: usize,
    pub warning_lines: usize,
    pub issues: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct LogScanner {
    path: PathBuf,
    tail_lines: usize,
    patterns: Vec<LogPattern>,
}

impl LogScanner {
    pub fn new(path: impl Into<PathBuf>, tail_lines: usize, extra: &[LogPattern]) -> Self {
        let mut patterns = builtin_patterns();
        patterns.extend(extra.iter().map(|p| LogPattern {
            needle: p.needle.to_lowercase(),
            ..p.clone()
        }));
        Self {
            path: path.into(),
            tail_lines: tail_lines.max(1),
            patterns,
        }
    }

    /// Scan the log. A missing file is reported inline; other I/O failures
    /// are returned.
    pub fn analyze(&self) -> Result<LogAnalysis> {
        let content = match read_tail(&self.path, MAX_TAIL_BYTES) {
            Ok(content) => content,
            Err(err) if is_not_found(&err) => {
                info!("[logs] {} not found, skipping", self.path.display());
                return Ok(LogAnalysis {
                    source: self.path.clone(),
                    lines_scanned: 0,
                    error_lines: 0,
                    warning_lines: 0,
                    issues: Vec::new(),
                    error: Some("Log file not found".to_string()),
                });
            }
            Err(err) => return Err(err),
        };

        let lines: Vec<&str> = content.lines().collect();
        let start = lines.len().saturating_sub(self.tail_lines);
        let mut analysis = self.scan_lines(&lines[start..]);
        analysis.source = self.path.clone();
        debug!(
            "[logs] scanned {} lines: {} errors, {} warnings, {} issues",
            analysis.lines_scanned,
            analysis.error_lines,
            analysis.warning_lines,
            analysis.issues.len()
        );
        Ok(analysis)
    }

    fn scan_lines(&self, lines: &[&str]) -> LogAnalysis {
        let mut hits: Vec<(usize, &str)> = vec![(0, ""); self.patterns.len()];
        let mut error_lines = 0;
        let mut warning_lines = 0;
        let mut unclassified = 0;
        let mut last_unclassified = "";

        for &line in lines {
            let level = line_level(line);
            match level {
                Some(LineLevel::Error) => error_lines += 1,
                Some(LineLevel::Warning) => warning_lines += 1,
                _ => {}
            }

            let lowered = line.to_lowercase();
            let mut matched = false;
            for (idx, pattern) in self.patterns.iter().enumerate() {
                if lowered.contains(&pattern.needle) {
                    hits[idx].0 += 1;
                    hits[idx].1 = line;
                    matched = true;
                }
            }
            if !matched && level == Some(LineLevel::Error) {
                unclassified += 1;
                last_unclassified = line;
            }
        }

        let mut issues: Vec<Issue> = self
            .patterns
            .iter()
            .zip(&hits)
            .filter(|(_, (count, _))| *count > 0)
            .map(|(pattern, (count, last))| {
                Issue::new(
                    IssueKind::Log,
                    pattern.severity,
                    pattern.message.clone(),
                    occurrence_details(*count, last),
                )
                .with_code(format!("log.{}", pattern.id))
            })
            .collect();

        if unclassified > 0 {
            issues.push(
                Issue::new(
                    IssueKind::Log,
                    Severity::Warning,
                    format!("{unclassified} unclassified error entries in the log"),
                    occurrence_details(unclassified, last_unclassified),
                )
                .with_code("log.unclassified"),
            );
        }

        LogAnalysis {
            source: PathBuf::new(),
            lines_scanned: lines.len(),
            error_lines,
            warning_lines,
            issues,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineLevel {
    Error,
    Warning,
    Other,
}

/// Third whitespace-separated field, after date and time.
fn line_level(line: &str) -> Option<LineLevel> {
    let level = line.split_whitespace().nth(2)?;
    Some(match level {
        "ERROR" | "CRITICAL" => LineLevel::Error,
        "WARNING" => LineLevel::Warning,
        _ => LineLevel::Other,
    })
}

fn occurrence_details(count: usize, last: &str) -> String {
    let noun = if count == 1 {
        "occurrence"
    } else {
        "occurrences"
    };
    let details = format!("{count} {noun}; last: {}", last.trim());
    if details.chars().count() <= MAX_DETAIL_CHARS {
        return details;
    }
    let mut truncated: String = details.chars().take(MAX_DETAIL_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == ErrorKind::NotFound)
}

/// Last `max_bytes` of the file, without a leading partial line.
fn read_tail(path: &Path, max_bytes: u64) -> Result<String> {
    let mut file = File::open(path)?;
    let meta = file
        .metadata()
        .with_context(|| format!("failed to stat {}", path.display()))?;
    if meta.is_dir() {
        bail!("{} is a directory, not a log file", path.display());
    }

    let len = meta.len();
    let offset = len.saturating_sub(max_bytes);
    file.seek(SeekFrom::Start(offset))
        .with_context(|| format!("failed to seek in {}", path.display()))?;
    let mut buf = Vec::with_capacity((len - offset) as usize);
    file.read_to_end(&mut buf)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut text = String::from_utf8_lossy(&buf).into_owned();
    if offset > 0
        && let Some(newline) = text.find('\n')
    {
        text.replace_range(..=newline, "");
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const SAMPLE: &str = "\
2024-05-01 10:00:00.001 INFO (MainThread) [homeassistant.bootstrap] Home Assistant initialized in 12.3s
2024-05-01 10:00:01.002 ERROR (MainThread) [homeassistant.setup] Setup failed for zha: Integration failed to initialize.
2024-05-01 10:00:02.003 WARNING (MainThread) [homeassistant.components.mqtt] Unable to connect to the MQTT broker
2024-05-01 10:00:03.004 ERROR (Recorder) [homeassistant.components.recorder] Error executing query: database is locked
2024-05-01 10:00:04.005 ERROR (MainThread) [custom_components.foo] Something odd happened
2024-05-01 10:00:05.006 ERROR (MainThread) [homeassistant.setup] Setup failed for hue: Unable to connect
";

    fn scanner_with(content: &str) -> (NamedTempFile, LogScanner) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let scanner = LogScanner::new(file.path(), 1000, &[]);
        (file, scanner)
    }

    fn codes(analysis: &LogAnalysis) -> Vec<&str> {
        analysis
            .issues
            .iter()
            .filter_map(|i| i.code.as_deref())
            .collect()
    }

    #[test]
    fn counts_levels_and_matches_signatures() {
        let (_file, scanner) = scanner_with(SAMPLE);
        let analysis = scanner.analyze().unwrap();

        assert_eq!(analysis.lines_scanned, 6);
        assert_eq!(analysis.error_lines, 4);
        assert_eq!(analysis.warning_lines, 1);
        assert_eq!(
            codes(&analysis),
            [
                "log.setup_failed",
                "log.connection_failed",
                "log.database",
                "log.unclassified"
            ]
        );

        let setup = &analysis.issues[0];
        assert_eq!(setup.severity, Severity::Critical);
        assert!(setup.details.starts_with("2 occurrences; last:"));
        assert!(setup.details.contains("Setup failed for hue"));
    }

    #[test]
    fn unclassified_errors_are_summarized_once() {
        let (_file, scanner) = scanner_with(SAMPLE);
        let analysis = scanner.analyze().unwrap();
        let unclassified = analysis.issues.last().unwrap();
        assert_eq!(unclassified.severity, Severity::Warning);
        assert_eq!(unclassified.message, "1 unclassified error entries in the log");
        assert!(unclassified.details.contains("Something odd happened"));
    }

    #[test]
    fn clean_log_has_no_issues() {
        let (_file, scanner) = scanner_with(
            "2024-05-01 10:00:00.001 INFO (MainThread) [homeassistant.core] Starting Home Assistant\n",
        );
        let analysis = scanner.analyze().unwrap();
        assert!(analysis.issues.is_empty());
        assert_eq!(analysis.error_lines, 0);
        assert!(analysis.error.is_none());
    }

    #[test]
    fn only_the_tail_is_scanned() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let scanner = LogScanner::new(file.path(), 2, &[]);
        let analysis = scanner.analyze().unwrap();
        assert_eq!(analysis.lines_scanned, 2);
        assert_eq!(analysis.error_lines, 2);
    }

    #[test]
    fn missing_file_is_reported_inline() {
        let scanner = LogScanner::new("/nonexistent/home-assistant.log", 100, &[]);
        let analysis = scanner.analyze().unwrap();
        assert_eq!(analysis.error.as_deref(), Some("Log file not found"));
        assert!(analysis.issues.is_empty());
    }

    #[test]
    fn directory_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let scanner = LogScanner::new(dir.path(), 100, &[]);
        assert!(scanner.analyze().is_err());
    }

    #[test]
    fn extra_patterns_are_case_insensitive() {
        let extra = LogPattern {
            id: "zigbee".to_string(),
            needle: "Coordinator OFFLINE".to_string(),
            severity: Severity::Critical,
            message: "Zigbee coordinator went offline".to_string(),
        };
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "2024-05-01 10:00:00.001 WARNING (MainThread) [zigpy] coordinator offline, retrying"
        )
        .unwrap();
        let scanner = LogScanner::new(file.path(), 100, &[extra]);
        let analysis = scanner.analyze().unwrap();
        assert_eq!(codes(&analysis), ["log.zigbee"]);
    }

    #[test]
    fn read_tail_drops_partial_first_line() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"first line\nsecond line\nthird line\n")
            .unwrap();
        let tail = read_tail(file.path(), 15).unwrap();
        assert_eq!(tail, "third line\n");
    }

    #[test]
    fn long_details_are_truncated() {
        let details = occurrence_details(3, &"x".repeat(1000));
        assert_eq!(details.chars().count(), MAX_DETAIL_CHARS);
        assert!(details.ends_with("..."));
    }

    #[test]
    fn level_is_third_field() {
        assert_eq!(
            line_level("2024-05-01 10:00:00.001 CRITICAL (MainThread) [x] y"),
            Some(LineLevel::Error)
        );
        assert_eq!(line_level("garbage"), None);
        assert_eq!(
            line_level("2024-05-01 10:00:00.001 DEBUG (MainThread) [x] y"),
            Some(LineLevel::Other)
        );
    }
}
