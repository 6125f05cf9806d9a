/// Host operating system counters via sysinfo
///
/// `sample` blocks for the CPU sampling interval; callers run it on a
/// blocking thread.

use std::time::Duration;
use sysinfo::{Networks, System};
use tracing::debug;

use crate::core::error::MetricError;
use crate::core::metrics::{
    format_core_usage, format_disk_io, format_network, format_percent, format_system_uptime,
    MetricName,
};

/// Raw host readings from one sampling pass.
/// `None` means the platform did not report that counter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostSample {
    pub cpu_percent: Option<f32>,
    pub per_core_percent: Vec<f32>,
    pub architecture: String,
    pub os_name: Option<String>,
    pub hostname: Option<String>,
    pub uptime_secs: Option<u64>,
    pub memory_percent: Option<f64>,
    /// Bytes read and written, summed over visible processes. sysinfo has no
    /// machine-wide disk counters, and an unprivileged user on Linux cannot
    /// read other users' `/proc/<pid>/io`, so this under-reports without root.
    pub disk_io: Option<(u64, u64)>,
    pub network_io: Option<(u64, u64)>,
}

impl HostSample {
    /// Display value of a host metric
    pub fn value_of(&self, name: MetricName) -> Result<String, MetricError> {
        let missing = || MetricError::host(format!("{} is not reported on this host", name));

        match name {
            MetricName::CpuUsage => self.cpu_percent.map(format_percent).ok_or_else(missing),
            MetricName::CpuCoreUsage => {
                if self.per_core_percent.is_empty() {
                    Err(missing())
                } else {
                    Ok(format_core_usage(&self.per_core_percent))
                }
            }
            MetricName::Architecture => Ok(self.architecture.clone()),
            MetricName::OperatingSystem => self.os_name.clone().ok_or_else(missing),
            MetricName::Hostname => self.hostname.clone().ok_or_else(missing),
            MetricName::SystemUptime => self.uptime_secs.map(format_system_uptime).ok_or_else(missing),
            MetricName::MemoryUsage => self
                .memory_percent
                .map(|p| format!("{:.1}%", p))
                .ok_or_else(missing),
            MetricName::DiskIo => self
                .disk_io
                .map(|(read, written)| format_disk_io(read, written))
                .ok_or_else(missing),
            MetricName::NetworkTraffic => self
                .network_io
                .map(|(sent, received)| format_network(sent, received))
                .ok_or_else(missing),
            _ => Err(MetricError::host(format!("{} is not a host metric", name))),
        }
    }
}

/// Source of host readings
#[cfg_attr(test, mockall::automock)]
pub trait HostProbe: Send + Sync {
    fn sample(&self) -> HostSample;
}

/// Reads counters through sysinfo. A fresh `System` is built per sample.
#[derive(Debug, Clone)]
pub struct SysinfoProbe {
    cpu_interval: Duration,
}

impl SysinfoProbe {
    pub fn new(cpu_interval: Duration) -> Self {
        Self { cpu_interval }
    }
}

impl HostProbe for SysinfoProbe {
    fn sample(&self) -> HostSample {
        let mut sys = System::new();

        // CPU usage is the delta between two refreshes
        sys.refresh_cpu();
        std::thread::sleep(self.cpu_interval);
        sys.refresh_cpu();

        let cpu_percent = clamp_percent(sys.global_cpu_info().cpu_usage());
        let per_core_percent: Vec<f32> = sys
            .cpus()
            .iter()
            .map(|cpu| clamp_percent(cpu.cpu_usage()))
            .collect();

        sys.refresh_memory();
        let memory_percent = match sys.total_memory() {
            0 => None,
            total => Some(sys.used_memory() as f64 / total as f64 * 100.0),
        };

        sys.refresh_processes();
        let disk_io = Some(sys.processes().values().fold((0u64, 0u64), |(read, written), p| {
            let usage = p.disk_usage();
            (
                read.saturating_add(usage.total_read_bytes),
                written.saturating_add(usage.total_written_bytes),
            )
        }));

        let networks = Networks::new_with_refreshed_list();
        let network_io = Some(networks.iter().fold((0u64, 0u64), |(sent, received), (_, data)| {
            (
                sent.saturating_add(data.total_transmitted()),
                received.saturating_add(data.total_received()),
            )
        }));

        let sample = HostSample {
            cpu_percent: Some(cpu_percent),
            per_core_percent,
            architecture: architecture(),
            os_name: os_name(),
            hostname: System::host_name(),
            uptime_secs: Some(System::uptime()),
            memory_percent,
            disk_io,
            network_io,
        };

        debug!(
            cpu = cpu_percent,
            cores = sample.per_core_percent.len(),
            "Sampled host counters"
        );
        sample
    }
}

fn clamp_percent(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Target architecture and pointer width, e.g. "x86_64 (64-bit)"
fn architecture() -> String {
    format!("{} ({}-bit)", std::env::consts::ARCH, usize::BITS)
}

fn os_name() -> Option<String> {
    match (System::name(), System::os_version()) {
        (Some(name), Some(version)) => Some(format!("{} {}", name, version)),
        (Some(name), None) => Some(name),
        (None, _) => None,
    }
}

/// Whether any running process matches one of `names` (case-insensitive)
pub fn server_process_running(names: &[String]) -> bool {
    let mut sys = System::new();
    sys.refresh_processes();

    let running = sys.processes().values().any(|process| {
        names
            .iter()
            .any(|name| process.name().eq_ignore_ascii_case(name))
    });
    debug!(?names, running, "Checked for database server process");
    running
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::HOST_PLACEHOLDER;

    fn full_sample() -> HostSample {
        HostSample {
            cpu_percent: Some(12.5),
            per_core_percent: vec![10.0, 15.0],
            architecture: "x86_64 (64-bit)".to_string(),
            os_name: Some("Windows 10".to_string()),
            hostname: Some("desk".to_string()),
            uptime_secs: Some(90061),
            memory_percent: Some(42.0),
            disk_io: Some((1048576, 0)),
            network_io: Some((0, 2097152)),
        }
    }

    #[test]
    fn test_values_are_formatted() {
        let sample = full_sample();
        assert_eq!(sample.value_of(MetricName::CpuUsage).unwrap(), "12.5%");
        assert_eq!(sample.value_of(MetricName::CpuCoreUsage).unwrap(), "10.0%, 15.0%");
        assert_eq!(sample.value_of(MetricName::SystemUptime).unwrap(), "1 day, 1:01:01");
        assert_eq!(sample.value_of(MetricName::MemoryUsage).unwrap(), "42.0%");
        assert_eq!(
            sample.value_of(MetricName::DiskIo).unwrap(),
            "Read: 1.00 MB, Write: 0.00 MB"
        );
        assert_eq!(
            sample.value_of(MetricName::NetworkTraffic).unwrap(),
            "Sent: 0.00 MB, Received: 2.00 MB"
        );
    }

    #[test]
    fn test_missing_counter_is_unavailable() {
        let sample = HostSample {
            hostname: None,
            ..full_sample()
        };
        let err = sample.value_of(MetricName::Hostname).unwrap_err();
        assert_eq!(err.placeholder(), HOST_PLACEHOLDER);
    }

    #[test]
    fn test_database_metric_is_not_a_host_metric() {
        assert!(full_sample().value_of(MetricName::SlowQueries).is_err());
    }

    #[test]
    fn test_clamp_percent() {
        assert_eq!(clamp_percent(150.0), 100.0);
        assert_eq!(clamp_percent(-1.0), 0.0);
        assert_eq!(clamp_percent(f32::NAN), 0.0);
    }

    #[test]
    fn test_sysinfo_probe_reports_percentages_in_range() {
        let sample = SysinfoProbe::new(Duration::from_millis(250)).sample();

        let cpu = sample.cpu_percent.unwrap();
        assert!((0.0..=100.0).contains(&cpu));
        assert!(sample
            .per_core_percent
            .iter()
            .all(|core| (0.0..=100.0).contains(core)));
        assert!(!sample.architecture.is_empty());
    }
}
