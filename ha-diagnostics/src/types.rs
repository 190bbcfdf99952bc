use serde::{Deserialize, Serialize};
use std::fmt;

/// Which part of the system an issue was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Memory,
    Disk,
    Cpu,
    Log,
    Config,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Cpu => "cpu",
            Self::Log => "log",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    pub details: String,
    // Lookup key for the solution catalog, e.g. "disk.warning" or "log.timeout"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Issue {
    pub fn new(
        kind: IssueKind,
        severity: Severity,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            details: details.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_kind_as_type_field() {
        let issue = Issue::new(
            IssueKind::Disk,
            Severity::Warning,
            "Disk space is running low",
            "Less than 20% disk space remaining",
        );
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["type"], "disk");
        assert_eq!(value["severity"], "warning");
        assert!(value.get("code").is_none(), "absent code is omitted");
    }

    #[test]
    fn code_is_serialized_when_set() {
        let issue = Issue::new(IssueKind::Log, Severity::Critical, "m", "d").with_code("log.timeout");
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["code"], "log.timeout");
    }
}
