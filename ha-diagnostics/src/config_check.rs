//! Static checks of the Home Assistant configuration directory.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde_yaml::{Mapping, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::types::{Issue, IssueKind, Severity};

const CONFIGURATION_FILE: &str = "configuration.yaml";
const SECRETS_FILE: &str = "secrets.yaml";

pub struct ConfigChecker {
    config_dir: PathBuf,
}

/// `!secret` and `!include*` arguments, in document order without repeats.
#[derive(Debug, Default, PartialEq)]
struct References {
    secrets: Vec<String>,
    includes: Vec<String>,
}

impl ConfigChecker {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Problems found in the configuration. Unreadable files (other than
    /// missing ones) are returned as errors.
    pub fn check_all(&self) -> Result<Vec<Issue>> {
        let config_path = self.config_dir.join(CONFIGURATION_FILE);
        let Some(raw) = read_optional(&config_path)? else {
            warn!("[config] {} not found", config_path.display());
            return Ok(vec![
                critical(
                    "Configuration file not found",
                    format!("{} does not exist", config_path.display()),
                )
                .with_code("config.missing"),
            ]);
        };

        let document = if raw.trim().is_empty() {
            Value::Null
        } else {
            match serde_yaml::from_str::<Value>(&raw) {
                Ok(doc) => doc,
                Err(err) => {
                    return Ok(vec![
                        critical("configuration.yaml is not valid YAML", err.to_string())
                            .with_code("config.invalid_yaml"),
                    ]);
                }
            }
        };

        match &document {
            Value::Mapping(_) => {}
            Value::Null => {
                return Ok(vec![
                    Issue::new(
                        IssueKind::Config,
                        Severity::Warning,
                        "configuration.yaml is empty",
                        "No integrations are configured in YAML",
                    )
                    .with_code("config.empty"),
                ]);
            }
            _ => {
                return Ok(vec![
                    critical(
                        "configuration.yaml has an invalid structure",
                        "The top level must be a mapping of integration names",
                    )
                    .with_code("config.not_mapping"),
                ]);
            }
        }

        let mut refs = References::default();
        collect_references(&document, &mut refs);
        debug!(
            "[config] {} secret and {} include references",
            refs.secrets.len(),
            refs.includes.len()
        );

        let mut issues = self.check_secrets(&refs.secrets)?;
        issues.extend(self.check_includes(&refs.includes));
        Ok(issues)
    }

    fn check_secrets(&self, names: &[String]) -> Result<Vec<Issue>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let path = self.config_dir.join(SECRETS_FILE);
        let Some(raw) = read_optional(&path)? else {
            return Ok(vec![
                critical(
                    "secrets.yaml not found",
                    format!(
                        "configuration.yaml references {} secret(s) but {} does not exist",
                        names.len(),
                        path.display()
                    ),
                )
                .with_code("config.secrets_unavailable"),
            ]);
        };

        let parsed = if raw.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_yaml::from_str::<Value>(&raw)
        };
        let secrets: Mapping = match parsed {
            Ok(Value::Mapping(map)) => map,
            Ok(Value::Null) => Mapping::new(),
            Ok(_) => {
                return Ok(vec![
                    critical(
                        "secrets.yaml has an invalid structure",
                        "The top level must be a mapping of secret names to values",
                    )
                    .with_code("config.secrets_unavailable"),
                ]);
            }
            Err(err) => {
                return Ok(vec![
                    critical("secrets.yaml is not valid YAML", err.to_string())
                        .with_code("config.secrets_unavailable"),
                ]);
            }
        };

        Ok(names
            .iter()
            .filter(|name| !secrets.contains_key(name.as_str()))
            .map(|name| {
                critical(
                    format!("Secret '{name}' is not defined"),
                    format!("configuration.yaml uses !secret {name} but secrets.yaml has no such key"),
                )
                .with_code("config.missing_secret")
            })
            .collect())
    }

    fn check_includes(&self, targets: &[String]) -> Vec<Issue> {
        targets
            .iter()
            .filter(|target| !self.config_dir.join(target.as_str()).exists())
            .map(|target| {
                critical(
                    format!("Included path '{target}' does not exist"),
                    format!(
                        "configuration.yaml includes {} which was not found",
                        self.config_dir.join(target.as_str()).display()
                    ),
                )
                .with_code("config.include_missing")
            })
            .collect()
    }
}

fn critical(message: impl Into<String>, details: impl Into<String>) -> Issue {
    Issue::new(IssueKind::Config, Severity::Critical, message, details)
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn collect_references(value: &Value, refs: &mut References) {
    match value {
        Value::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            let tag = tag.trim_start_matches('!');
            if let Value::String(arg) = &tagged.value {
                if tag == "secret" {
                    push_unique(&mut refs.secrets, arg);
                } else if tag.starts_with("include") {
                    push_unique(&mut refs.includes, arg);
                }
            }
            collect_references(&tagged.value, refs);
        }
        Value::Mapping(map) => {
            for (key, val) in map {
                collect_references(key, refs);
                collect_references(val, refs);
            }
        }
        Value::Sequence(items) => {
            for item in items {
                collect_references(item, refs);
            }
        }
        _ => {}
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}
