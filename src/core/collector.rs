/// One full metric collection pass
///
/// Database metrics are fetched one at a time, each over its own session.
/// Host metrics come from a single probe sample taken on a blocking thread.
/// Every failure is converted to the affected metric's placeholder, so
/// `collect_all` always returns a complete snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::core::database::{MySqlClient, StatusSource};
use crate::core::error::MetricError;
use crate::core::host::{HostProbe, HostSample, SysinfoProbe};
use crate::core::metrics::{MetricName, MetricSnapshot, MetricSource, MISSING_VALUE};
use crate::utils::AppConfig;

pub struct MetricCollector<D, H> {
    database: D,
    host: Arc<H>,
}

/// Collector wired to the real MySQL server and sysinfo
pub type LiveCollector = MetricCollector<MySqlClient, SysinfoProbe>;

impl LiveCollector {
    pub fn from_config(config: &AppConfig) -> Self {
        MetricCollector::new(
            MySqlClient::new(&config.database),
            SysinfoProbe::new(config.metrics.cpu_sample_interval),
        )
    }
}

impl<D, H> MetricCollector<D, H>
where
    D: StatusSource,
    H: HostProbe + 'static,
{
    pub fn new(database: D, host: H) -> Self {
        Self {
            database,
            host: Arc::new(host),
        }
    }

    /// Collect every metric. Never fails.
    pub async fn collect_all(&self) -> MetricSnapshot {
        let started = Instant::now();

        let mut database_values = HashMap::new();
        for name in MetricName::ALL {
            if name.source() == MetricSource::Database {
                database_values.insert(name, self.database_metric(name).await);
            }
        }

        let host_sample = self.sample_host().await;

        let mut unavailable = 0usize;
        let snapshot = MetricSnapshot::from_fn(|name| {
            let value = match name.source() {
                MetricSource::Database => database_values
                    .remove(&name)
                    .unwrap_or_else(|| Err(MetricError::database("not collected"))),
                MetricSource::Host => match &host_sample {
                    Some(sample) => sample.value_of(name),
                    None => Err(MetricError::host("host sampler failed")),
                },
            };

            value.unwrap_or_else(|e| {
                warn!(metric = %name, error = %e, "Metric unavailable");
                unavailable += 1;
                e.placeholder().to_string()
            })
        });

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            unavailable,
            "Collected metrics"
        );
        snapshot
    }

    async fn database_metric(&self, name: MetricName) -> Result<String, MetricError> {
        let variable = name
            .status_variable()
            .ok_or_else(|| MetricError::database(format!("{} has no status variable", name)))?;

        match self.database.status_variable(variable).await? {
            Some(raw) => {
                debug!(metric = %name, variable, raw = %raw, "Fetched status variable");
                name.format_status(&raw)
            }
            None => {
                debug!(metric = %name, variable, "Status variable not reported");
                Ok(MISSING_VALUE.to_string())
            }
        }
    }

    /// Run the probe off the reactor; `None` if the sampler panicked
    async fn sample_host(&self) -> Option<HostSample> {
        let host = Arc::clone(&self.host);
        match tokio::task::spawn_blocking(move || host.sample()).await {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!(error = %e, "Host sampler did not complete");
                None
            }
        }
    }
}
