pub mod error;
pub mod metrics;
pub mod database;
pub mod host;
pub mod collector;
pub mod refresh;
pub mod browser;

pub use error::MetricError;
pub use metrics::{MetricName, MetricSnapshot, MetricSource};
pub use database::{MySqlClient, StatusSource};
pub use host::{server_process_running, HostProbe, HostSample, SysinfoProbe};
pub use collector::{LiveCollector, MetricCollector};
pub use refresh::MetricsRefresher;
pub use browser::{ColumnInfo, DatabaseEntry, SchemaBrowser, TablePreview};
