/// Background metric refresh
///
/// Each accepted trigger spawns one task that runs a full collection pass and
/// hands the finished snapshot back over a oneshot channel. At most one pass
/// runs at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

use crate::core::collector::MetricCollector;
use crate::core::database::StatusSource;
use crate::core::host::HostProbe;
use crate::core::metrics::MetricSnapshot;

pub struct MetricsRefresher<D, H> {
    collector: Arc<MetricCollector<D, H>>,
    busy: Arc<AtomicBool>,
}

impl<D, H> Clone for MetricsRefresher<D, H> {
    fn clone(&self) -> Self {
        Self {
            collector: Arc::clone(&self.collector),
            busy: Arc::clone(&self.busy),
        }
    }
}

/// Clears the busy flag when the refresh task ends, including by panic
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<D, H> MetricsRefresher<D, H>
where
    D: StatusSource + 'static,
    H: HostProbe + 'static,
{
    pub fn new(collector: MetricCollector<D, H>) -> Self {
        Self {
            collector: Arc::new(collector),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Start a refresh.
    ///
    /// Returns `None` if a refresh is already in flight. The receiver yields
    /// exactly one complete snapshot.
    pub fn trigger(&self) -> Option<oneshot::Receiver<MetricSnapshot>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Refresh already in progress, trigger ignored");
            return None;
        }

        let (tx, rx) = oneshot::channel();
        let guard = BusyGuard(Arc::clone(&self.busy));
        let collector = Arc::clone(&self.collector);

        tokio::spawn(async move {
            let snapshot = collector.collect_all().await;
            drop(guard);

            if tx.send(snapshot).is_err() {
                debug!("Refresh finished after its consumer went away; snapshot discarded");
            }
        });

        Some(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::MetricError;
    use crate::core::host::{HostSample, MockHostProbe};
    use crate::core::metrics::MetricName;
    use async_trait::async_trait;
    use std::time::Duration;

    struct SlowSource(Duration);

    #[async_trait]
    impl StatusSource for SlowSource {
        async fn status_variable(&self, _name: &str) -> Result<Option<String>, MetricError> {
            tokio::time::sleep(self.0).await;
            Ok(Some("7".to_string()))
        }
    }

    fn refresher(delay: Duration) -> MetricsRefresher<SlowSource, MockHostProbe> {
        let mut host = MockHostProbe::new();
        host.expect_sample().returning(HostSample::default);
        MetricsRefresher::new(MetricCollector::new(SlowSource(delay), host))
    }

    #[tokio::test]
    async fn test_trigger_delivers_one_complete_snapshot() {
        let refresher = refresher(Duration::from_millis(1));

        let rx = refresher.trigger().expect("idle refresher accepts a trigger");
        let snapshot = rx.await.unwrap();

        assert_eq!(snapshot.len(), MetricName::ALL.len());
        assert_eq!(snapshot.get(MetricName::ActiveConnections), "7");
        assert!(!refresher.is_busy());
    }

    #[tokio::test]
    async fn test_trigger_while_busy_is_rejected() {
        let refresher = refresher(Duration::from_millis(50));

        let first = refresher.trigger();
        assert!(first.is_some());
        assert!(refresher.is_busy());
        assert!(refresher.trigger().is_none());

        first.unwrap().await.unwrap();
        assert!(refresher.trigger().is_some());
    }

    #[tokio::test]
    async fn test_dropped_consumer_releases_busy_flag() {
        let refresher = refresher(Duration::from_millis(5));

        drop(refresher.trigger());

        for _ in 0..200 {
            if !refresher.is_busy() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!refresher.is_busy());
    }
}
