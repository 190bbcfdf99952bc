pub mod system;

pub use system::{
    CpuStats, DiskStats, HealthChecker, HostProbe, MemoryStats, Reading, SysinfoProbe,
    SystemHealth,
};
