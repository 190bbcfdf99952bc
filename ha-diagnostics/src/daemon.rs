//! The collection loop.
//!
//! RUNNING: collect, analyze, match solutions, write the report, then sleep
//! for the scan interval. A failed cycle is logged and moves the loop into
//! RETRY_WAIT, which sleeps for the retry backoff before running again. The
//! loop never exits on its own.

use anyhow::{Context, Result};
use log::{error, info};
use std::time::Duration;
use tokio::time::sleep;

use crate::collectors::{HealthChecker, HostProbe, SysinfoProbe};
use crate::config::Config;
use crate::config_check::ConfigChecker;
use crate::logs::LogScanner;
use crate::report::{DiagnosticReport, write_report};
use crate::solutions::SolutionEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Running,
    RetryWait,
}

impl CycleState {
    /// State entered after a cycle, and how long to sleep in it.
    pub fn after<T>(outcome: &Result<T>, config: &Config) -> (Self, Duration) {
        match outcome {
            Ok(_) => (Self::Running, Duration::from_secs(config.scan_interval)),
            Err(_) => (Self::RetryWait, Duration::from_secs(config.retry_backoff)),
        }
    }
}

pub struct Diagnostics<P> {
    config: Config,
    health: HealthChecker<P>,
    logs: LogScanner,
    config_checker: ConfigChecker,
    solutions: SolutionEngine,
}

impl Diagnostics<SysinfoProbe> {
    /// Production wiring: installs the logger and samples the real host.
    pub fn start(config: Config) -> Self {
        crate::logging::init(config.log_level.to_level_filter());
        let probe = SysinfoProbe::new(config.disk_path.clone());
        Self::with_probe(config, probe)
    }
}

impl<P: HostProbe> Diagnostics<P> {
    pub fn with_probe(config: Config, probe: P) -> Self {
        let health = HealthChecker::new(probe, config.thresholds);
        let logs = LogScanner::new(
            config.log_file.clone(),
            config.log_tail_lines,
            &config.log_patterns,
        );
        let config_checker = ConfigChecker::new(config.config_dir.clone());
        Self {
            config,
            health,
            logs,
            config_checker,
            solutions: SolutionEngine::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gather every section and match solutions.
    pub async fn collect(&mut self) -> Result<DiagnosticReport> {
        let system_health = self.health.check().await;
        let log_analysis = self
            .logs
            .analyze()
            .context("log analysis failed")?;
        let config_issues = self
            .config_checker
            .check_all()
            .context("configuration check failed")?;
        let solutions = self
            .solutions
            .generate(&system_health, &log_analysis, &config_issues);
        Ok(DiagnosticReport::new(
            system_health,
            log_analysis,
            config_issues,
            solutions,
        ))
    }

    /// One full cycle. On error nothing has been written.
    pub async fn run_cycle(&mut self) -> Result<DiagnosticReport> {
        let report = self.collect().await?;
        write_report(&self.config.output_path, &report)?;
        Ok(report)
    }

    pub async fn run(mut self) {
        info!("[daemon] starting HA diagnostics helper");
        loop {
            let outcome = self.run_cycle().await;
            match &outcome {
                Ok(report) => info!(
                    "[daemon] diagnostic data collected and solutions generated ({} issues, {} solutions)",
                    report.issue_count(),
                    report.solutions.len()
                ),
                Err(err) => error!("[daemon] error in diagnostic run: {err:#}"),
            }

            let (state, delay) = CycleState::after(&outcome, &self.config);
            if state == CycleState::RetryWait {
                info!("[daemon] retrying in {}s", delay.as_secs());
            }
            sleep(delay).await;
        }
    }
}
