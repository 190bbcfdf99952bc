//! Host resource sampling (memory, root disk, CPU).
//!
//! Each resource is read independently. A failed read only degrades its own
//! slot to an `{"error": ...}` marker; the other resources are still sampled
//! and analyzed.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};

use crate::analysis::analyze_metrics;
use crate::config::Thresholds;
use crate::types::Issue;

/// CPU usage is measured as the delta across this window.
pub const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

const MEMORY_UNAVAILABLE: &str = "Unable to read memory info";
const DISK_UNAVAILABLE: &str = "Unable to read disk info";
const CPU_UNAVAILABLE: &str = "Unable to read CPU info";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total: u64,
    pub available: u64,
    pub percent: f64,
    pub used: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskStats {
    pub total: u64,
    pub free: u64,
    pub used: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    pub percent: f64,
    /// 1, 5 and 15 minute load averages.
    pub load_avg: [f64; 3],
}

/// Outcome of sampling one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading<T> {
    Ok(T),
    Failed { error: String },
}

impl<T> Reading<T> {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            error: reason.into(),
        }
    }

    pub fn stats(&self) -> Option<&T> {
        match self {
            Self::Ok(stats) => Some(stats),
            Self::Failed { .. } => None,
        }
    }
}

/// Anything that carries a utilization percentage.
pub trait Utilization {
    fn percent(&self) -> f64;
}

impl Utilization for MemoryStats {
    fn percent(&self) -> f64 {
        self.percent
    }
}

impl Utilization for DiskStats {
    fn percent(&self) -> f64 {
        self.percent
    }
}

impl Utilization for CpuStats {
    fn percent(&self) -> f64 {
        self.percent
    }
}

impl<T: Utilization> Reading<T> {
    /// `None` when the read failed.
    pub fn percent(&self) -> Option<f64> {
        self.stats().map(Utilization::percent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub memory: Reading<MemoryStats>,
    pub disk: Reading<DiskStats>,
    pub cpu: Reading<CpuStats>,
    pub issues: Vec<Issue>,
}

/// Source of raw host metrics.
#[async_trait]
pub trait HostProbe: Send {
    async fn memory(&mut self) -> Result<MemoryStats>;
    async fn disk(&mut self) -> Result<DiskStats>;
    async fn cpu(&mut self) -> Result<CpuStats>;
}

pub struct SysinfoProbe {
    system: System,
    disk_path: PathBuf,
}

impl SysinfoProbe {
    pub fn new(disk_path: impl Into<PathBuf>) -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
                .with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        Self {
            system,
            disk_path: disk_path.into(),
        }
    }
}

#[async_trait]
impl HostProbe for SysinfoProbe {
    async fn memory(&mut self) -> Result<MemoryStats> {
        self.system
            .refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        let total = self.system.total_memory();
        if total == 0 {
            bail!("host reported zero total memory");
        }
        let available = self.system.available_memory();
        Ok(MemoryStats {
            total,
            available,
            percent: percent_of(total.saturating_sub(available), total),
            used: self.system.used_memory(),
        })
    }

    async fn disk(&mut self) -> Result<DiskStats> {
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == self.disk_path.as_path())
            .with_context(|| format!("no disk mounted at {}", self.disk_path.display()))?;
        let total = disk.total_space();
        if total == 0 {
            bail!("disk at {} reports zero size", self.disk_path.display());
        }
        let free = disk.available_space();
        let used = total.saturating_sub(free);
        Ok(DiskStats {
            total,
            free,
            used,
            percent: percent_of(used, total),
        })
    }

    async fn cpu(&mut self) -> Result<CpuStats> {
        self.system.refresh_cpu_usage();
        tokio::time::sleep(CPU_SAMPLE_WINDOW).await;
        self.system.refresh_cpu_usage();
        if self.system.cpus().is_empty() {
            bail!("no CPUs visible");
        }
        let load = System::load_average();
        Ok(CpuStats {
            percent: f64::from(self.system.global_cpu_usage()),
            load_avg: [load.one, load.five, load.fifteen],
        })
    }
}

fn percent_of(part: u64, whole: u64) -> f64 {
    let pct = part as f64 / whole as f64 * 100.0;
    // one decimal place
    (pct * 10.0).round() / 10.0
}

/// Samples the host and flags resources over their thresholds.
pub struct HealthChecker<P> {
    probe: P,
    thresholds: Thresholds,
}

impl<P: HostProbe> HealthChecker<P> {
    pub fn new(probe: P, thresholds: Thresholds) -> Self {
        Self { probe, thresholds }
    }

    pub async fn check(&mut self) -> SystemHealth {
        let memory = settle("memory", self.probe.memory().await, MEMORY_UNAVAILABLE);
        let disk = settle("disk", self.probe.disk().await, DISK_UNAVAILABLE);
        let cpu = settle("CPU", self.probe.cpu().await, CPU_UNAVAILABLE);

        let mut health = SystemHealth {
            memory,
            disk,
            cpu,
            issues: Vec::new(),
        };
        health.issues = analyze_metrics(&health, &self.thresholds);
        debug!(
            "[health] memory={:?} disk={:?} cpu={:?} issues={}",
            health.memory.percent(),
            health.disk.percent(),
            health.cpu.percent(),
            health.issues.len()
        );
        health
    }
}

fn settle<T>(resource: &str, result: Result<T>, marker: &str) -> Reading<T> {
    match result {
        Ok(stats) => Reading::Ok(stats),
        Err(err) => {
            error!("[health] error checking {resource}: {err:#}");
            Reading::failed(marker)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IssueKind, Severity};
    use anyhow::anyhow;

    struct FakeProbe {
        memory: Option<f64>,
        disk: Option<f64>,
        cpu: Option<f64>,
    }

    #[async_trait]
    impl HostProbe for FakeProbe {
        async fn memory(&mut self) -> Result<MemoryStats> {
            let percent = self.memory.ok_or_else(|| anyhow!("permission denied"))?;
            Ok(MemoryStats {
                total: 1000,
                available: 1000 - (percent * 10.0) as u64,
                percent,
                used: (percent * 10.0) as u64,
            })
        }

        async fn disk(&mut self) -> Result<DiskStats> {
            let percent = self.disk.ok_or_else(|| anyhow!("unsupported platform"))?;
            Ok(DiskStats {
                total: 100,
                free: 100 - percent as u64,
                used: percent as u64,
                percent,
            })
        }

        async fn cpu(&mut self) -> Result<CpuStats> {
            let percent = self.cpu.ok_or_else(|| anyhow!("no /proc/stat"))?;
            Ok(CpuStats {
                percent,
                load_avg: [0.5, 0.4, 0.3],
            })
        }
    }

    #[tokio::test]
    async fn one_failed_resource_does_not_stop_the_others() {
        let probe = FakeProbe {
            memory: None,
            disk: Some(95.0),
            cpu: Some(10.0),
        };
        let mut checker = HealthChecker::new(probe, Thresholds::default());
        let health = checker.check().await;

        assert_eq!(health.memory, Reading::failed("Unable to read memory info"));
        assert_eq!(health.disk.percent(), Some(95.0));
        assert_eq!(health.cpu.percent(), Some(10.0));
        assert_eq!(health.issues.len(), 1);
        assert_eq!(health.issues[0].kind, IssueKind::Disk);
        assert_eq!(health.issues[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn all_resources_failing_yields_markers_and_no_issues() {
        let probe = FakeProbe {
            memory: None,
            disk: None,
            cpu: None,
        };
        let mut checker = HealthChecker::new(probe, Thresholds::default());
        let health = checker.check().await;

        assert!(health.issues.is_empty());
        let value = serde_json::to_value(&health).unwrap();
        assert_eq!(value["disk"]["error"], "Unable to read disk info");
        assert_eq!(value["cpu"]["error"], "Unable to read CPU info");
        assert!(value["memory"].get("percent").is_none());
    }

    #[test]
    fn reading_serializes_flat() {
        let reading = Reading::Ok(CpuStats {
            percent: 12.5,
            load_avg: [1.0, 2.0, 3.0],
        });
        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(value["percent"], 12.5);
        assert_eq!(value["load_avg"][2], 3.0);
    }

    #[test]
    fn failed_reading_round_trips_as_error_marker() {
        let parsed: Reading<MemoryStats> =
            serde_json::from_str(r#"{"error":"Unable to read memory info"}"#).unwrap();
        assert_eq!(parsed.percent(), None);
    }

    #[test]
    fn percent_rounds_to_one_decimal() {
        assert_eq!(percent_of(1, 3), 33.3);
        assert_eq!(percent_of(50, 100), 50.0);
    }

    #[tokio::test]
    async fn sysinfo_reads_host_memory() {
        let mut probe = SysinfoProbe::new("/");
        let mem = probe.memory().await.unwrap();
        assert!(mem.total > 0);
        assert!((0.0..=100.0).contains(&mem.percent));
    }

    #[tokio::test]
    async fn sysinfo_reports_unknown_mount_as_error() {
        let mut probe = SysinfoProbe::new("/definitely/not/a/mount/point");
        let err = probe.disk().await.unwrap_err();
        assert!(err.to_string().contains("no disk mounted"));
    }
}
