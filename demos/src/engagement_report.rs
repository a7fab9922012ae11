//! Prints the engagement rate for every calculation method.
//!
//! Uses the placeholder data source, so every rate is currently zero.

use std::error::Error;

use amygdala_metrics::engagement::{EngagementCalculator, EngagementMethod};
use amygdala_metrics::logging::setup::{init_logging, LoggingConfig};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    init_logging(LoggingConfig::development())?;

    let calculator = EngagementCalculator::default();

    println!("Engagement report\n");
    for method in [
        EngagementMethod::SessionBased,
        EngagementMethod::ActivityBased,
        EngagementMethod::RetentionBased,
    ] {
        let rate = calculator.calculate(method).await?;
        println!("  {:<16} {:>6.2}%", method.as_str(), rate);
    }

    let rate = calculator.calculate_named("unknown_method").await?;
    println!("  {:<16} {:>6.2}%", "unknown_method", rate);

    Ok(())
}
