//! Canned remediation advice keyed by issue code.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::collectors::SystemHealth;
use crate::logs::LogAnalysis;
use crate::types::{Issue, IssueKind, Severity};

/// Suggested fix for one detected problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub issue_type: IssueKind,
    pub severity: Severity,
    /// Message of the issue this addresses.
    pub problem: String,
    pub title: String,
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

pub struct SolutionTemplate {
    pub code: &'static str,
    pub title: &'static str,
    pub steps: &'static [&'static str],
    pub reference: Option<&'static str>,
}

const TROUBLESHOOTING: &str = "https://www.home-assistant.io/docs/configuration/troubleshooting/";

pub static CATALOG: &[SolutionTemplate] = &[
    SolutionTemplate {
        code: "memory.critical",
        title: "Free up memory immediately",
        steps: &[
            "Restart Home Assistant to release leaked memory",
            "Stop add-ons you do not need from the add-on store page",
            "Check custom integrations for known memory leaks and update them",
        ],
        reference: None,
    },
    SolutionTemplate {
        code: "memory.warning",
        title: "Reduce memory usage",
        steps: &[
            "Review running add-ons and disable unused ones",
            "Lower the recorder's purge_keep_days to shrink the in-memory cache",
        ],
        reference: Some("https://www.home-assistant.io/integrations/recorder/"),
    },
    SolutionTemplate {
        code: "disk.critical",
        title: "Free disk space immediately",
        steps: &[
            "Delete old backups from Settings > System > Backups",
            "Purge the recorder database with the recorder.purge service",
            "Remove unused add-ons and their data",
        ],
        reference: Some("https://www.home-assistant.io/integrations/recorder/"),
    },
    SolutionTemplate {
        code: "disk.warning",
        title: "Reclaim disk space",
        steps: &[
            "Move backups to external storage",
            "Exclude noisy entities from the recorder",
        ],
        reference: Some("https://www.home-assistant.io/integrations/recorder/"),
    },
    SolutionTemplate {
        code: "cpu.critical",
        title: "Find what is saturating the CPU",
        steps: &[
            "Check add-on CPU usage on the Settings > System > Hardware page",
            "Look for automations that trigger in tight loops",
            "Restart the add-on or integration consuming the most CPU",
        ],
        reference: None,
    },
    SolutionTemplate {
        code: "cpu.warning",
        title: "Reduce CPU load",
        steps: &[
            "Increase polling intervals of integrations that poll frequently",
            "Review template sensors that update on every state change",
        ],
        reference: None,
    },
    SolutionTemplate {
        code: "log.setup_failed",
        title: "Fix the integration that failed to set up",
        steps: &[
            "Open Settings > Devices & Services and look for integrations marked as failed",
            "Reload or re-authenticate the integration",
            "Check the integration's documentation for breaking changes in the release notes",
        ],
        reference: Some(TROUBLESHOOTING),
    },
    SolutionTemplate {
        code: "log.integration_error",
        title: "Investigate the integration setup error",
        steps: &[
            "Read the full traceback in the log around the reported line",
            "Update or remove the custom integration if it is the source",
        ],
        reference: Some(TROUBLESHOOTING),
    },
    SolutionTemplate {
        code: "log.connection_failed",
        title: "Restore connectivity to the device or service",
        steps: &[
            "Verify the device is powered on and reachable on the network",
            "Confirm the host, port and credentials configured for the integration",
        ],
        reference: None,
    },
    SolutionTemplate {
        code: "log.timeout",
        title: "Resolve timeouts",
        steps: &[
            "Check network latency between Home Assistant and the affected device",
            "Look for an overloaded host; timeouts often follow high CPU usage",
        ],
        reference: None,
    },
    SolutionTemplate {
        code: "log.database",
        title: "Repair the recorder database",
        steps: &[
            "Make sure only one Home Assistant instance uses the database file",
            "Stop Home Assistant, move home-assistant_v2.db aside and restart to create a fresh one",
        ],
        reference: Some("https://www.home-assistant.io/integrations/recorder/"),
    },
    SolutionTemplate {
        code: "log.blocking_call",
        title: "Update the integration blocking the event loop",
        steps: &[
            "Identify the integration named in the warning",
            "Update it, or report the issue to its maintainer",
        ],
        reference: None,
    },
    SolutionTemplate {
        code: "log.auth_failed",
        title: "Review failed login attempts",
        steps: &[
            "Check the source IP addresses in the log",
            "Enable ip_ban_enabled and login_attempts_threshold in the http integration",
            "Enable multi-factor authentication for all users",
        ],
        reference: Some("https://www.home-assistant.io/integrations/http/"),
    },
    SolutionTemplate {
        code: "log.deprecated",
        title: "Migrate away from deprecated features",
        steps: &[
            "Read the deprecation warning to find the affected option or integration",
            "Follow the migration notes in the release announcement",
        ],
        reference: None,
    },
    SolutionTemplate {
        code: "log.memory_error",
        title: "Give Home Assistant more memory",
        steps: &[
            "Stop memory-hungry add-ons",
            "Move to hardware with more RAM if the problem persists",
        ],
        reference: None,
    },
    SolutionTemplate {
        code: "log.unclassified",
        title: "Review unrecognized errors",
        steps: &[
            "Open Settings > System > Logs and read the most recent errors",
            "Search the community forum for the exact error text",
        ],
        reference: Some(TROUBLESHOOTING),
    },
    SolutionTemplate {
        code: "config.missing",
        title: "Restore configuration.yaml",
        steps: &[
            "Restore configuration.yaml from your latest backup",
            "Or create a minimal file containing `default_config:`",
        ],
        reference: Some("https://www.home-assistant.io/docs/configuration/"),
    },
    SolutionTemplate {
        code: "config.invalid_yaml",
        title: "Fix the YAML syntax error",
        steps: &[
            "Open configuration.yaml at the line and column in the error",
            "Check indentation and unclosed brackets or quotes",
            "Run the configuration check from Developer Tools before restarting",
        ],
        reference: Some("https://www.home-assistant.io/docs/configuration/yaml/"),
    },
    SolutionTemplate {
        code: "config.not_mapping",
        title: "Fix the configuration structure",
        steps: &["Make every top-level entry an `integration:` key"],
        reference: Some("https://www.home-assistant.io/docs/configuration/yaml/"),
    },
    SolutionTemplate {
        code: "config.empty",
        title: "Add a base configuration",
        steps: &["Add `default_config:` to configuration.yaml to enable the standard integrations"],
        reference: Some("https://www.home-assistant.io/integrations/default_config/"),
    },
    SolutionTemplate {
        code: "config.secrets_unavailable",
        title: "Provide a valid secrets.yaml",
        steps: &[
            "Create secrets.yaml next to configuration.yaml",
            "Make sure it is a flat mapping of `name: value` pairs",
        ],
        reference: Some("https://www.home-assistant.io/docs/configuration/secrets/"),
    },
    SolutionTemplate {
        code: "config.missing_secret",
        title: "Define the missing secret",
        steps: &["Add the secret name and its value to secrets.yaml"],
        reference: Some("https://www.home-assistant.io/docs/configuration/secrets/"),
    },
    SolutionTemplate {
        code: "config.include_missing",
        title: "Create or fix the included file",
        steps: &[
            "Create the missing file or directory",
            "Or correct the path in the !include statement",
        ],
        reference: Some("https://www.home-assistant.io/docs/configuration/splitting_configuration/"),
    },
];

fn generic_template(kind: IssueKind) -> SolutionTemplate {
    let (title, steps): (&'static str, &'static [&'static str]) = match kind {
        IssueKind::Memory | IssueKind::Disk | IssueKind::Cpu => (
            "Check host resources",
            &["Review resource usage on the Settings > System > Hardware page"],
        ),
        IssueKind::Log => (
            "Inspect the Home Assistant log",
            &["Open Settings > System > Logs and read the entries around the reported line"],
        ),
        IssueKind::Config => (
            "Check the configuration",
            &["Run the configuration check from Developer Tools > YAML"],
        ),
    };
    SolutionTemplate {
        code: "",
        title,
        steps,
        reference: Some(TROUBLESHOOTING),
    }
}

pub struct SolutionEngine {
    catalog: &'static [SolutionTemplate],
}

impl Default for SolutionEngine {
    fn default() -> Self {
        Self { catalog: CATALOG }
    }
}

impl SolutionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// One solution per distinct issue code, in report order.
    pub fn generate(
        &self,
        system_health: &SystemHealth,
        log_analysis: &LogAnalysis,
        config_issues: &[Issue],
    ) -> Vec<Solution> {
        let mut seen = HashSet::new();
        let solutions: Vec<Solution> = system_health
            .issues
            .iter()
            .chain(&log_analysis.issues)
            .chain(config_issues)
            .filter(|issue| seen.insert(dedup_key(issue)))
            .map(|issue| self.solution_for(issue))
            .collect();
        debug!("[solutions] matched {} solution(s)", solutions.len());
        solutions
    }

    pub fn solution_for(&self, issue: &Issue) -> Solution {
        let found = issue
            .code
            .as_deref()
            .and_then(|code| self.catalog.iter().find(|t| t.code == code));
        let generic;
        let template = match found {
            Some(template) => template,
            None => {
                generic = generic_template(issue.kind);
                &generic
            }
        };
        Solution {
            issue_type: issue.kind,
            severity: issue.severity,
            problem: issue.message.clone(),
            title: template.title.to_string(),
            steps: template.steps.iter().map(|s| s.to_string()).collect(),
            reference: template.reference.map(str::to_string),
        }
    }
}

/// Uncoded issues dedup on their message instead.
fn dedup_key(issue: &Issue) -> String {
    match &issue.code {
        Some(code) => code.clone(),
        None => format!("{}:{}", issue.kind, issue.message),
    }
}
