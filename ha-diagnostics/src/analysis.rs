//! Threshold analysis of sampled host metrics.
//!
//! Each resource is checked critical-first, with warning as the else
//! branch, so a resource yields at most one issue per cycle. A failed read
//! has no percentage and is never itself reported as an issue.

use crate::collectors::SystemHealth;
use crate::config::{Threshold, Thresholds};
use crate::types::{Issue, IssueKind, Severity};

pub fn analyze_metrics(health: &SystemHealth, thresholds: &Thresholds) -> Vec<Issue> {
    let mut issues = Vec::new();

    if let Some(pct) = health.memory.percent()
        && let Some(issue) = memory_issue(pct, &thresholds.memory)
    {
        issues.push(issue);
    }
    if let Some(pct) = health.disk.percent()
        && let Some(issue) = disk_issue(pct, &thresholds.disk)
    {
        issues.push(issue);
    }
    if let Some(pct) = health.cpu.percent()
        && let Some(issue) = cpu_issue(pct, &thresholds.cpu)
    {
        issues.push(issue);
    }

    issues
}

fn classify(percent: f64, limit: &Threshold) -> Option<Severity> {
    if percent > limit.critical {
        Some(Severity::Critical)
    } else if percent > limit.warning {
        Some(Severity::Warning)
    } else {
        None
    }
}

fn memory_issue(percent: f64, limit: &Threshold) -> Option<Issue> {
    let issue = match classify(percent, limit)? {
        Severity::Critical => Issue::new(
            IssueKind::Memory,
            Severity::Critical,
            "Memory usage is critically high",
            format!(
                "System is using more than {}% of available memory",
                limit.critical
            ),
        ),
        Severity::Warning => Issue::new(
            IssueKind::Memory,
            Severity::Warning,
            "Memory usage is high",
            format!(
                "System is using more than {}% of available memory",
                limit.warning
            ),
        ),
    };
    Some(coded(issue))
}

fn disk_issue(percent: f64, limit: &Threshold) -> Option<Issue> {
    let issue = match classify(percent, limit)? {
        Severity::Critical => Issue::new(
            IssueKind::Disk,
            Severity::Critical,
            "Disk space is critically low",
            format!("Less than {}% disk space remaining", 100.0 - limit.critical),
        ),
        Severity::Warning => Issue::new(
            IssueKind::Disk,
            Severity::Warning,
            "Disk space is running low",
            format!("Less than {}% disk space remaining", 100.0 - limit.warning),
        ),
    };
    Some(coded(issue))
}

fn cpu_issue(percent: f64, limit: &Threshold) -> Option<Issue> {
    let issue = match classify(percent, limit)? {
        Severity::Critical => Issue::new(
            IssueKind::Cpu,
            Severity::Critical,
            "CPU usage is critically high",
            format!("CPU usage is above {}%", limit.critical),
        ),
        Severity::Warning => Issue::new(
            IssueKind::Cpu,
            Severity::Warning,
            "CPU usage is high",
            format!("CPU usage is above {}%", limit.warning),
        ),
    };
    Some(coded(issue))
}

fn coded(issue: Issue) -> Issue {
    let code = format!("{}.{}", issue.kind, issue.severity);
    issue.with_code(code)
}
