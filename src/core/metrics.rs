/// Metric definitions and the snapshot produced by one collection pass
///
/// The metric set is fixed at compile time. Every snapshot carries exactly
/// these metrics, in exactly this order, so consumers can render rows without
/// ever re-sorting or diffing.

use chrono::{DateTime, Local};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

use crate::core::error::MetricError;
use crate::utils::{bytes_to_mb, format_uptime};

/// Shown in place of a database metric when the server cannot be queried
pub const DATABASE_PLACEHOLDER: &str = "metric unavailable — start the database console first";

/// Shown in place of a host metric the platform does not report
pub const HOST_PLACEHOLDER: &str = "N/A";

/// Shown when a status query succeeds but the variable does not exist
pub const MISSING_VALUE: &str = "N/A";

/// Normalization window for the QPS approximation.
/// QPS is the server's lifetime `Queries` counter divided by this, not a rolling rate.
pub const QPS_WINDOW_SECS: f64 = 60.0;

/// Where a metric's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricSource {
    Database,
    Host,
}

impl MetricSource {
    pub fn placeholder(&self) -> &'static str {
        match self {
            MetricSource::Database => DATABASE_PLACEHOLDER,
            MetricSource::Host => HOST_PLACEHOLDER,
        }
    }
}

impl fmt::Display for MetricSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricSource::Database => write!(f, "database"),
            MetricSource::Host => write!(f, "host"),
        }
    }
}

/// The fixed, ordered set of metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricName {
    ServerUptime,
    ActiveConnections,
    SlowQueries,
    QueriesPerSecond,
    OpenTables,
    CpuUsage,
    CpuCoreUsage,
    Architecture,
    OperatingSystem,
    Hostname,
    SystemUptime,
    MemoryUsage,
    DiskIo,
    NetworkTraffic,
}

impl MetricName {
    /// Display order of every snapshot
    pub const ALL: [MetricName; 14] = [
        MetricName::ServerUptime,
        MetricName::ActiveConnections,
        MetricName::SlowQueries,
        MetricName::QueriesPerSecond,
        MetricName::OpenTables,
        MetricName::CpuUsage,
        MetricName::CpuCoreUsage,
        MetricName::Architecture,
        MetricName::OperatingSystem,
        MetricName::Hostname,
        MetricName::SystemUptime,
        MetricName::MemoryUsage,
        MetricName::DiskIo,
        MetricName::NetworkTraffic,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MetricName::ServerUptime => "Server Uptime",
            MetricName::ActiveConnections => "Active Connections",
            MetricName::SlowQueries => "Slow Queries",
            MetricName::QueriesPerSecond => "Queries Per Second (QPS)",
            MetricName::OpenTables => "Open Tables",
            MetricName::CpuUsage => "CPU Usage",
            MetricName::CpuCoreUsage => "CPU Core Usage",
            MetricName::Architecture => "Architecture",
            MetricName::OperatingSystem => "Operating System",
            MetricName::Hostname => "Hostname",
            MetricName::SystemUptime => "System Uptime",
            MetricName::MemoryUsage => "Memory Usage",
            MetricName::DiskIo => "Disk I/O",
            MetricName::NetworkTraffic => "Network Traffic",
        }
    }

    pub fn source(&self) -> MetricSource {
        match self {
            MetricName::ServerUptime
            | MetricName::ActiveConnections
            | MetricName::SlowQueries
            | MetricName::QueriesPerSecond
            | MetricName::OpenTables => MetricSource::Database,
            _ => MetricSource::Host,
        }
    }

    /// `SHOW GLOBAL STATUS` variable backing a database metric
    pub fn status_variable(&self) -> Option<&'static str> {
        match self {
            MetricName::ServerUptime => Some("Uptime"),
            MetricName::ActiveConnections => Some("Threads_connected"),
            MetricName::SlowQueries => Some("Slow_queries"),
            MetricName::QueriesPerSecond => Some("Queries"),
            MetricName::OpenTables => Some("Open_tables"),
            _ => None,
        }
    }

    /// Turn a raw status value into its display form
    pub fn format_status(&self, raw: &str) -> Result<String, MetricError> {
        match self {
            MetricName::ServerUptime => {
                let secs = parse_counter(self, raw)?;
                Ok(format!("{} seconds", secs))
            }
            MetricName::QueriesPerSecond => {
                let total = parse_counter(self, raw)?;
                Ok(format_qps(total))
            }
            _ => Ok(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn parse_counter(name: &MetricName, raw: &str) -> Result<u64, MetricError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| MetricError::database(format!("{} is not a counter: {:?}", name, raw)))
}

/// `Queries / 60`, two decimals
pub fn format_qps(total_queries: u64) -> String {
    format!("{:.2} QPS", total_queries as f64 / QPS_WINDOW_SECS)
}

pub fn format_percent(value: f32) -> String {
    format!("{:.1}%", value)
}

pub fn format_core_usage(cores: &[f32]) -> String {
    cores
        .iter()
        .map(|usage| format_percent(*usage))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_disk_io(read_bytes: u64, written_bytes: u64) -> String {
    format!(
        "Read: {:.2} MB, Write: {:.2} MB",
        bytes_to_mb(read_bytes),
        bytes_to_mb(written_bytes)
    )
}

pub fn format_network(sent_bytes: u64, received_bytes: u64) -> String {
    format!(
        "Sent: {:.2} MB, Received: {:.2} MB",
        bytes_to_mb(sent_bytes),
        bytes_to_mb(received_bytes)
    )
}

pub fn format_system_uptime(secs: u64) -> String {
    format_uptime(secs)
}

/// One complete, ordered set of metric values
#[derive(Debug, Clone)]
pub struct MetricSnapshot {
    values: Vec<(MetricName, String)>,
    collected_at: DateTime<Local>,
}

impl MetricSnapshot {
    /// Build a snapshot by asking for every metric in display order
    pub fn from_fn<F>(mut value_of: F) -> Self
    where
        F: FnMut(MetricName) -> String,
    {
        let values = MetricName::ALL
            .iter()
            .map(|name| (*name, value_of(*name)))
            .collect();

        Self {
            values,
            collected_at: Local::now(),
        }
    }

    /// Snapshot where every metric shows its source placeholder
    pub fn unavailable() -> Self {
        Self::from_fn(|name| name.source().placeholder().to_string())
    }

    pub fn get(&self, name: MetricName) -> &str {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or(MISSING_VALUE)
    }

    /// (label, value) pairs in display order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.values.iter().map(|(name, value)| (name.label(), value.as_str()))
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.values.iter().map(|(name, _)| name.label()).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn collected_at(&self) -> DateTime<Local> {
        self.collected_at
    }
}

impl Serialize for MetricSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (label, value) in self.iter() {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}
