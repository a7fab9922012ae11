//! Single-datum metric publication.
//!
//! [`MetricsPublisher`] binds a namespace to a [`MetricsSink`] and exposes
//! one method per application metric. Every call is one request: there is
//! no buffering, batching or retry, and a failure is logged and handed back
//! to the caller unchanged.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use crate::cloudwatch::{
    CloudWatchClient, CloudWatchConfig, CloudWatchResult, MetricDatum, StandardUnit,
};
use crate::engagement::engagement_rate;

/// Metric name for the engagement percentage.
pub const USER_ENGAGEMENT_METRIC: &str = "UserEngagement";

/// Metric name for the active session count.
pub const ACTIVE_SESSIONS_METRIC: &str = "ActiveSessions";

/// Destination for metric data.
///
/// Implemented by [`CloudWatchClient`]; tests and alternative backends can
/// provide their own.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn put_metric_data(&self, namespace: &str, data: &[MetricDatum])
        -> CloudWatchResult<()>;
}

#[async_trait]
impl MetricsSink for CloudWatchClient {
    async fn put_metric_data(
        &self,
        namespace: &str,
        data: &[MetricDatum],
    ) -> CloudWatchResult<()> {
        CloudWatchClient::put_metric_data(self, namespace, data).await
    }
}

/// Publishes application metrics under a fixed namespace.
#[derive(Clone)]
pub struct MetricsPublisher {
    sink: Arc<dyn MetricsSink>,
    namespace: String,
}

impl std::fmt::Debug for MetricsPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsPublisher")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl MetricsPublisher {
    /// Build a publisher backed by CloudWatch.
    ///
    /// # Errors
    ///
    /// Fails when the namespace, region or credentials are missing, or the
    /// HTTP client cannot be created. Callers are expected to treat this as
    /// fatal.
    pub fn connect(config: CloudWatchConfig) -> CloudWatchResult<Self> {
        let namespace = config.namespace().to_string();
        let client = CloudWatchClient::new(config)?;
        Ok(Self::with_sink(namespace, Arc::new(client)))
    }

    /// Build a publisher on top of any sink.
    pub fn with_sink(namespace: impl Into<String>, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            sink,
            namespace: namespace.into(),
        }
    }

    /// The namespace every datum is published under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Publish a single datum.
    #[instrument(skip(self, datum), fields(metric = %datum.name))]
    pub async fn publish(&self, datum: MetricDatum) -> CloudWatchResult<()> {
        let name = datum.name.clone();
        let value = datum.value;
        match self.send(datum).await {
            Ok(()) => {
                info!("Published {}: {}", name, value);
                Ok(())
            }
            Err(e) => {
                error!("Failed to publish {}: {}", name, e);
                Err(e)
            }
        }
    }

    /// Publish the user engagement rate as a percentage.
    #[instrument(skip(self))]
    pub async fn publish_user_engagement(&self, rate: f64) -> CloudWatchResult<()> {
        let datum = MetricDatum::new(USER_ENGAGEMENT_METRIC, rate, StandardUnit::Percent);
        match self.send(datum).await {
            Ok(()) => {
                info!("Published user engagement: {:.2}%", rate);
                Ok(())
            }
            Err(e) => {
                error!("Failed to publish user engagement metric: {}", e);
                Err(e)
            }
        }
    }

    /// Publish the number of active sessions.
    #[instrument(skip(self))]
    pub async fn publish_active_sessions(&self, count: i64) -> CloudWatchResult<()> {
        let datum = MetricDatum::new(ACTIVE_SESSIONS_METRIC, count as f64, StandardUnit::Count);
        match self.send(datum).await {
            Ok(()) => {
                info!("Published active sessions: {}", count);
                Ok(())
            }
            Err(e) => {
                error!("Failed to publish active sessions metric: {}", e);
                Err(e)
            }
        }
    }

    /// Publish the engagement rate and active user count of a snapshot.
    ///
    /// Both metrics are always attempted. The first failure, if any, is
    /// returned.
    pub async fn publish_snapshot(&self, snapshot: &UsageSnapshot) -> CloudWatchResult<()> {
        let engagement = self
            .publish_user_engagement(snapshot.engagement_rate())
            .await;
        let active_users = i64::try_from(snapshot.active_users).unwrap_or_else(|_| {
            warn!(
                active_users = snapshot.active_users,
                "Active user count exceeds the publishable range, capping at {}",
                i64::MAX
            );
            i64::MAX
        });
        let sessions = self.publish_active_sessions(active_users).await;
        engagement.and(sessions)
    }

    async fn send(&self, datum: MetricDatum) -> CloudWatchResult<()> {
        self.sink
            .put_metric_data(&self.namespace, std::slice::from_ref(&datum))
            .await
    }
}

/// User counts observed at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub total_users: u64,
    pub active_users: u64,
}

impl UsageSnapshot {
    pub fn new(total_users: u64, active_users: u64) -> Self {
        Self {
            total_users,
            active_users,
        }
    }

    /// Active users as a percentage of all users; `0` when there are no users.
    pub fn engagement_rate(&self) -> f64 {
        engagement_rate(self.active_users, self.total_users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudwatch::CloudWatchError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(String, Vec<MetricDatum>)>>,
    }

    #[async_trait]
    impl MetricsSink for RecordingSink {
        async fn put_metric_data(
            &self,
            namespace: &str,
            data: &[MetricDatum],
        ) -> CloudWatchResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push((namespace.to_string(), data.to_vec()));
            Ok(())
        }
    }

    struct RejectingSink;

    #[async_trait]
    impl MetricsSink for RejectingSink {
        async fn put_metric_data(
            &self,
            _namespace: &str,
            _data: &[MetricDatum],
        ) -> CloudWatchResult<()> {
            Err(CloudWatchError::Throttled {
                code: "Throttling".to_string(),
                message: "Rate exceeded".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_publish_user_engagement_builds_percent_datum() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = MetricsPublisher::with_sink("AmygdalaBeta/Staging", sink.clone());

        publisher.publish_user_engagement(45.0).await.unwrap();

        let calls = sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (namespace, data) = &calls[0];
        assert_eq!(namespace, "AmygdalaBeta/Staging");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].name, USER_ENGAGEMENT_METRIC);
        assert_eq!(data[0].unit, StandardUnit::Percent);
        assert_eq!(data[0].value, 45.0);
    }

    #[tokio::test]
    async fn test_publish_active_sessions_builds_count_datum() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = MetricsPublisher::with_sink("AmygdalaBeta/Staging", sink.clone());

        publisher.publish_active_sessions(-3).await.unwrap();

        let calls = sink.calls.lock().unwrap();
        let datum = &calls[0].1[0];
        assert_eq!(datum.name, ACTIVE_SESSIONS_METRIC);
        assert_eq!(datum.unit, StandardUnit::Count);
        assert_eq!(datum.value, -3.0);
    }

    #[tokio::test]
    async fn test_publish_returns_sink_error_unchanged() {
        let publisher = MetricsPublisher::with_sink("Ns", Arc::new(RejectingSink));

        let err = publisher.publish_user_engagement(10.0).await.unwrap_err();
        assert!(matches!(err, CloudWatchError::Throttled { ref code, .. } if code == "Throttling"));

        let err = publisher
            .publish(MetricDatum::new("Custom", 1.0, StandardUnit::None))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("Throttling"));
    }

    #[tokio::test]
    async fn test_publish_snapshot_attempts_both_metrics() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = MetricsPublisher::with_sink("Ns", sink.clone());

        publisher
            .publish_snapshot(&UsageSnapshot::new(1000, 450))
            .await
            .unwrap();

        let calls = sink.calls.lock().unwrap();
        let names: Vec<_> = calls.iter().map(|(_, d)| d[0].name.as_str()).collect();
        assert_eq!(names, vec![USER_ENGAGEMENT_METRIC, ACTIVE_SESSIONS_METRIC]);
        assert_eq!(calls[0].1[0].value, 45.0);
        assert_eq!(calls[1].1[0].value, 450.0);
    }

    #[tokio::test]
    async fn test_publish_snapshot_caps_oversized_active_count() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = MetricsPublisher::with_sink("Ns", sink.clone());

        publisher
            .publish_snapshot(&UsageSnapshot::new(u64::MAX, u64::MAX))
            .await
            .unwrap();

        let calls = sink.calls.lock().unwrap();
        assert_eq!(calls[0].1[0].value, 100.0);
        assert_eq!(calls[1].1[0].value, i64::MAX as f64);
    }

    #[test]
    fn test_usage_snapshot_engagement_rate() {
        assert_eq!(UsageSnapshot::new(1000, 450).engagement_rate(), 45.0);
        assert_eq!(UsageSnapshot::new(0, 0).engagement_rate(), 0.0);
    }

    #[test]
    fn test_connect_rejects_missing_credentials() {
        use crate::cloudwatch::AwsCredentials;

        let config =
            CloudWatchConfig::new("AmygdalaBeta/Staging", "us-east-1", AwsCredentials::new("", ""));
        assert!(matches!(
            MetricsPublisher::connect(config),
            Err(CloudWatchError::MissingCredentials { .. })
        ));
    }
}
