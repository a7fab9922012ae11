//! # Amygdala Metrics
//!
//! Publishes Amygdala's custom application metrics to Amazon CloudWatch and
//! computes the engagement rates that feed them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use amygdala_metrics::prelude::*;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let config = CloudWatchConfig::load("AmygdalaBeta/Staging").await?;
//! let publisher = MetricsPublisher::connect(config)?;
//!
//! let snapshot = UsageSnapshot::new(1000, 450);
//! publisher.publish_user_engagement(snapshot.engagement_rate()).await?;
//! publisher.publish_active_sessions(450).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Each publish call sends exactly one datum in one request. Nothing is
//! buffered or retried: a failure is logged and returned to the caller.
//!
//! ## Architecture
//!
//! - **`publisher`**: [`MetricsPublisher`](publisher::MetricsPublisher) and
//!   the [`MetricsSink`](publisher::MetricsSink) seam it writes through
//! - **`cloudwatch`**: SigV4-signed client for the CloudWatch Query API
//! - **`engagement`**: engagement formulas over an injected
//!   [`EngagementSource`](engagement::EngagementSource)
//! - **`logging`**: `tracing-subscriber` setup for binaries
//! - **`security`**: zeroizing storage for credentials

pub mod cloudwatch;
pub mod engagement;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod publisher;
pub mod security;
