use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cloudwatch::credentials::{
    env_credentials, env_region, non_empty_var, MetadataClient, SharedProfile,
};
use crate::cloudwatch::{CloudWatchError, CloudWatchResult};
use crate::security::SecureString;

/// Static AWS credentials used to sign requests.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: SecureString,
    session_token: Option<SecureString>,
}

impl AwsCredentials {
    /// Create long-term credentials from an access key pair.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecureString::new(secret_access_key.into()),
            session_token: None,
        }
    }

    /// Attach a session token for temporary (STS) credentials.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(SecureString::new(token.into()));
        self
    }

    /// Get the access key id.
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Get the secret access key.
    ///
    /// # Security
    /// Use `expose()` on the returned value only to compute signatures.
    pub fn secret_access_key(&self) -> &SecureString {
        &self.secret_access_key
    }

    /// Get the session token, if any.
    pub fn session_token(&self) -> Option<&SecureString> {
        self.session_token.as_ref()
    }
}

/// Configuration for connecting to CloudWatch.
#[derive(Debug, Clone)]
pub struct CloudWatchConfig {
    namespace: String,
    region: String,
    credentials: AwsCredentials,
    endpoint: Option<String>,
    timeout: Duration,
}

impl CloudWatchConfig {
    /// Create a new config for the given namespace, region and credentials.
    pub fn new(
        namespace: impl Into<String>,
        region: impl Into<String>,
        credentials: AwsCredentials,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            region: region.into(),
            credentials,
            endpoint: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Build a config from the environment and the shared AWS profile.
    ///
    /// The region comes from `AWS_REGION`, then `AWS_DEFAULT_REGION`, then
    /// the active profile in `~/.aws/config`. Credentials come from
    /// `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY` (plus `AWS_SESSION_TOKEN`),
    /// then the active profile in `~/.aws/credentials` or `~/.aws/config`.
    /// `AWS_PROFILE` selects the profile. `AWS_ENDPOINT_URL_CLOUDWATCH`
    /// overrides the endpoint.
    ///
    /// Use [`load`](Self::load) on hosts that get credentials from a
    /// container or instance role.
    pub fn from_env(namespace: impl Into<String>) -> CloudWatchResult<Self> {
        let profile = SharedProfile::load();
        let region = env_region()
            .or_else(|| profile.region().map(str::to_string))
            .ok_or_else(|| missing_region(&profile))?;
        let credentials = env_credentials()
            .or_else(|| profile.credentials())
            .ok_or_else(|| missing_credentials(&profile))?;

        Ok(Self::new(namespace, region, credentials).with_endpoint_from_env())
    }

    /// Resolve a config through the full default chain.
    ///
    /// Like [`from_env`](Self::from_env), but when the environment and the
    /// shared profile come up empty it also asks the ECS container
    /// credentials endpoint and then the EC2 instance metadata service.
    /// The instance metadata service also supplies a missing region.
    pub async fn load(namespace: impl Into<String>) -> CloudWatchResult<Self> {
        let profile = SharedProfile::load();
        let metadata = MetadataClient::new()?;

        let region = match env_region().or_else(|| profile.region().map(str::to_string)) {
            Some(region) => region,
            None => metadata
                .instance_region()
                .await
                .ok_or_else(|| missing_region(&profile))?,
        };

        let credentials = match env_credentials().or_else(|| profile.credentials()) {
            Some(credentials) => credentials,
            None => match metadata.container_credentials().await? {
                Some(credentials) => credentials,
                None => metadata
                    .instance_credentials()
                    .await?
                    .ok_or_else(|| missing_credentials(&profile))?,
            },
        };

        Ok(Self::new(namespace, region, credentials).with_endpoint_from_env())
    }

    fn with_endpoint_from_env(self) -> Self {
        match non_empty_var("AWS_ENDPOINT_URL_CLOUDWATCH") {
            Some(endpoint) => self.with_endpoint(endpoint),
            None => self,
        }
    }

    /// Set a custom API endpoint (e.g. a VPC endpoint or a local emulator).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the HTTP request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the metric namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get the AWS region.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Get the signing credentials.
    pub fn credentials(&self) -> &AwsCredentials {
        &self.credentials
    }

    /// Get the API endpoint, defaulting to the regional CloudWatch endpoint.
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://monitoring.{}.amazonaws.com/", self.region),
        }
    }

    /// Get the HTTP request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check that the config can be used to build a client.
    pub fn validate(&self) -> CloudWatchResult<()> {
        if self.namespace.trim().is_empty() {
            return Err(CloudWatchError::Configuration {
                message: "namespace must not be empty".to_string(),
            });
        }
        if self.region.trim().is_empty() {
            return Err(CloudWatchError::Configuration {
                message: "region must not be empty".to_string(),
            });
        }
        if self.credentials.access_key_id.trim().is_empty()
            || self.credentials.secret_access_key.is_blank()
        {
            return Err(CloudWatchError::MissingCredentials {
                message: "access key id and secret access key are required".to_string(),
            });
        }
        Ok(())
    }
}

fn missing_region(profile: &SharedProfile) -> CloudWatchError {
    CloudWatchError::Configuration {
        message: format!(
            "no region in AWS_REGION, AWS_DEFAULT_REGION or profile '{}'",
            profile.name()
        ),
    }
}

fn missing_credentials(profile: &SharedProfile) -> CloudWatchError {
    CloudWatchError::MissingCredentials {
        message: format!(
            "no credentials in the environment or profile '{}'",
            profile.name()
        ),
    }
}

/// Units accepted by CloudWatch for a metric datum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StandardUnit {
    Seconds,
    Microseconds,
    Milliseconds,
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
    Terabytes,
    Bits,
    Kilobits,
    Megabits,
    Gigabits,
    Terabits,
    Percent,
    Count,
    #[serde(rename = "Bytes/Second")]
    BytesPerSecond,
    #[serde(rename = "Kilobytes/Second")]
    KilobytesPerSecond,
    #[serde(rename = "Megabytes/Second")]
    MegabytesPerSecond,
    #[serde(rename = "Gigabytes/Second")]
    GigabytesPerSecond,
    #[serde(rename = "Terabytes/Second")]
    TerabytesPerSecond,
    #[serde(rename = "Bits/Second")]
    BitsPerSecond,
    #[serde(rename = "Kilobits/Second")]
    KilobitsPerSecond,
    #[serde(rename = "Megabits/Second")]
    MegabitsPerSecond,
    #[serde(rename = "Gigabits/Second")]
    GigabitsPerSecond,
    #[serde(rename = "Terabits/Second")]
    TerabitsPerSecond,
    #[serde(rename = "Count/Second")]
    CountPerSecond,
    None,
}

impl StandardUnit {
    /// The unit name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            StandardUnit::Seconds => "Seconds",
            StandardUnit::Microseconds => "Microseconds",
            StandardUnit::Milliseconds => "Milliseconds",
            StandardUnit::Bytes => "Bytes",
            StandardUnit::Kilobytes => "Kilobytes",
            StandardUnit::Megabytes => "Megabytes",
            StandardUnit::Gigabytes => "Gigabytes",
            StandardUnit::Terabytes => "Terabytes",
            StandardUnit::Bits => "Bits",
            StandardUnit::Kilobits => "Kilobits",
            StandardUnit::Megabits => "Megabits",
            StandardUnit::Gigabits => "Gigabits",
            StandardUnit::Terabits => "Terabits",
            StandardUnit::Percent => "Percent",
            StandardUnit::Count => "Count",
            StandardUnit::BytesPerSecond => "Bytes/Second",
            StandardUnit::KilobytesPerSecond => "Kilobytes/Second",
            StandardUnit::MegabytesPerSecond => "Megabytes/Second",
            StandardUnit::GigabytesPerSecond => "Gigabytes/Second",
            StandardUnit::TerabytesPerSecond => "Terabytes/Second",
            StandardUnit::BitsPerSecond => "Bits/Second",
            StandardUnit::KilobitsPerSecond => "Kilobits/Second",
            StandardUnit::MegabitsPerSecond => "Megabits/Second",
            StandardUnit::GigabitsPerSecond => "Gigabits/Second",
            StandardUnit::TerabitsPerSecond => "Terabits/Second",
            StandardUnit::CountPerSecond => "Count/Second",
            StandardUnit::None => "None",
        }
    }
}

impl fmt::Display for StandardUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped observation submitted to CloudWatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDatum {
    pub name: String,
    pub value: f64,
    pub unit: StandardUnit,
    pub timestamp: DateTime<Utc>,
}

impl MetricDatum {
    /// Create a datum stamped with the current time.
    pub fn new(name: impl Into<String>, value: f64, unit: StandardUnit) -> Self {
        Self {
            name: name.into(),
            value,
            unit,
            timestamp: Utc::now(),
        }
    }

    /// Override the observation time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
