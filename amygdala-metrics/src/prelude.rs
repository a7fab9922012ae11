//! Prelude for commonly used types and traits in amygdala-metrics.

pub use crate::cloudwatch::{
    AwsCredentials, CloudWatchConfig, CloudWatchError, CloudWatchResult, MetricDatum,
    StandardUnit,
};
pub use crate::engagement::{EngagementCalculator, EngagementMethod, EngagementSource};
pub use crate::error::{MetricsError, Result};
pub use crate::publisher::{MetricsPublisher, MetricsSink, UsageSnapshot};
