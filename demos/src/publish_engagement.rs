//! Publishes a sample usage snapshot to CloudWatch.
//!
//! AWS region and credentials come from the default chain: `AWS_*`
//! environment variables, the shared profile, then container or instance
//! role credentials. The namespace is read from `METRICS_NAMESPACE` so staging and
//! production can publish side by side.
//!
//! ```text
//! METRICS_NAMESPACE=AmygdalaBeta/Production cargo run -p amygdala-demos --example publish_engagement
//! ```

use std::error::Error;

use amygdala_metrics::logging::setup::{init_logging, LoggingConfig};
use amygdala_metrics::prelude::*;

const DEFAULT_NAMESPACE: &str = "AmygdalaBeta/Staging";

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    init_logging(LoggingConfig::default())?;

    let namespace =
        std::env::var("METRICS_NAMESPACE").unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());

    // Without a region and credentials there is nothing useful to do.
    let config = CloudWatchConfig::load(namespace).await?;
    let publisher = MetricsPublisher::connect(config)?;

    let snapshot = UsageSnapshot::new(1000, 450);
    println!(
        "Publishing to {}: {} of {} users active ({:.2}%)",
        publisher.namespace(),
        snapshot.active_users,
        snapshot.total_users,
        snapshot.engagement_rate()
    );

    // Each failure has already been logged by the publisher.
    if let Err(e) = publisher.publish_snapshot(&snapshot).await {
        eprintln!("Snapshot was not fully published: {e}");
        if e.is_retryable() {
            eprintln!("The error looks transient; re-running may succeed.");
        }
    }

    Ok(())
}
