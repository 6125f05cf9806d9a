/// Error type for metric collection
///
/// The collector has exactly one recoverable failure: a metric whose source
/// cannot be read. It never leaves the collector; each failure is turned into
/// the placeholder text of the affected metric.

use thiserror::Error;

use crate::core::metrics::MetricSource;

#[derive(Error, Debug)]
pub enum MetricError {
    #[error("{source_kind} metric unavailable: {reason}")]
    Unavailable {
        source_kind: MetricSource,
        reason: String,
    },
}

impl MetricError {
    pub fn database(reason: impl Into<String>) -> Self {
        MetricError::Unavailable {
            source_kind: MetricSource::Database,
            reason: reason.into(),
        }
    }

    pub fn host(reason: impl Into<String>) -> Self {
        MetricError::Unavailable {
            source_kind: MetricSource::Host,
            reason: reason.into(),
        }
    }

    /// Display text that replaces the metric value
    pub fn placeholder(&self) -> &'static str {
        match self {
            MetricError::Unavailable { source_kind, .. } => source_kind.placeholder(),
        }
    }
}

impl From<sqlx::Error> for MetricError {
    fn from(err: sqlx::Error) -> Self {
        MetricError::database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::{DATABASE_PLACEHOLDER, HOST_PLACEHOLDER};

    #[test]
    fn test_placeholder_follows_source() {
        assert_eq!(MetricError::database("refused").placeholder(), DATABASE_PLACEHOLDER);
        assert_eq!(MetricError::host("unsupported").placeholder(), HOST_PLACEHOLDER);
    }

    #[test]
    fn test_sqlx_errors_are_database_failures() {
        let err: MetricError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(err.placeholder(), DATABASE_PLACEHOLDER);
        assert!(err.to_string().starts_with("database metric unavailable"));
    }
}
