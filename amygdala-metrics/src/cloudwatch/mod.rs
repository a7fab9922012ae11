//! Amazon CloudWatch backend.
//!
//! Talks to the CloudWatch Query API directly over HTTPS, signing each
//! request with AWS Signature Version 4.

mod client;
mod credentials;
mod error;
mod signing;
mod types;

pub use client::CloudWatchClient;
pub use error::{CloudWatchError, CloudWatchResult};
pub use types::{AwsCredentials, CloudWatchConfig, MetricDatum, StandardUnit};
