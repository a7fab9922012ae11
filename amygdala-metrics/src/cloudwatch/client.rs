use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, instrument};
use url::{form_urlencoded, Url};

use crate::cloudwatch::signing::{SignableRequest, SigningParams};
use crate::cloudwatch::{CloudWatchConfig, CloudWatchError, CloudWatchResult, MetricDatum};
use crate::logging::truncate_field;

const SERVICE: &str = "monitoring";
const API_VERSION: &str = "2010-08-01";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const MAX_ERROR_MESSAGE_LENGTH: usize = 512;

const AUTH_ERROR_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "ExpiredToken",
    "IncompleteSignature",
    "InvalidClientTokenId",
    "MissingAuthenticationToken",
    "SignatureDoesNotMatch",
    "UnrecognizedClientException",
];

const THROTTLING_ERROR_CODES: &[&str] =
    &["Throttling", "ThrottlingException", "RequestLimitExceeded"];

/// HTTP client for the CloudWatch Query API.
#[derive(Clone)]
pub struct CloudWatchClient {
    config: Arc<CloudWatchConfig>,
    client: Client,
    endpoint: Url,
}

impl std::fmt::Debug for CloudWatchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudWatchClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("region", &self.config.region())
            .finish()
    }
}

impl CloudWatchClient {
    /// Create a new client with the given configuration.
    ///
    /// No request is made here; credentials are first exercised by the
    /// first `PutMetricData` call.
    pub fn new(config: CloudWatchConfig) -> CloudWatchResult<Self> {
        config.validate()?;

        let endpoint =
            Url::parse(&config.endpoint()).map_err(|e| CloudWatchError::Configuration {
                message: format!("Invalid endpoint '{}': {}", config.endpoint(), e),
            })?;
        if endpoint.host_str().is_none() {
            return Err(CloudWatchError::Configuration {
                message: format!("Endpoint '{endpoint}' has no host"),
            });
        }
        if endpoint.query().is_some() {
            return Err(CloudWatchError::Configuration {
                message: format!("Endpoint '{endpoint}' must not carry a query string"),
            });
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CloudWatchError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            config: Arc::new(config),
            client,
            endpoint,
        })
    }

    /// Submit metric data to CloudWatch in a single `PutMetricData` call.
    #[instrument(skip(self, data), fields(count = data.len()))]
    pub async fn put_metric_data(
        &self,
        namespace: &str,
        data: &[MetricDatum],
    ) -> CloudWatchResult<()> {
        let body = encode_put_metric_data(namespace, data);

        let headers = {
            let mut request = SignableRequest {
                method: "POST",
                path: self.endpoint.path(),
                query: "",
                headers: BTreeMap::from([
                    ("content-type".to_string(), FORM_CONTENT_TYPE.to_string()),
                    ("host".to_string(), host_header(&self.endpoint)),
                ]),
                body: body.as_bytes(),
            };
            request.sign(&SigningParams {
                credentials: self.config.credentials(),
                region: self.config.region(),
                service: SERVICE,
                time: Utc::now(),
            });
            request.headers
        };

        let mut builder = self.client.post(self.endpoint.clone());
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        debug!(endpoint = %self.endpoint, "Sending PutMetricData request");
        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| CloudWatchError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_from_response(status.as_u16(), &body))
    }
}

/// Form-encode a `PutMetricData` request body.
fn encode_put_metric_data(namespace: &str, data: &[MetricDatum]) -> String {
    let mut form = form_urlencoded::Serializer::new(String::new());
    form.append_pair("Action", "PutMetricData")
        .append_pair("Version", API_VERSION)
        .append_pair("Namespace", namespace);

    for (index, datum) in data.iter().enumerate() {
        let prefix = format!("MetricData.member.{}", index + 1);
        form.append_pair(&format!("{prefix}.MetricName"), &datum.name)
            .append_pair(&format!("{prefix}.Value"), &datum.value.to_string())
            .append_pair(&format!("{prefix}.Unit"), datum.unit.as_str())
            .append_pair(
                &format!("{prefix}.Timestamp"),
                &datum
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            );
    }

    form.finish()
}

fn host_header(endpoint: &Url) -> String {
    let host = endpoint.host_str().unwrap_or_default();
    match endpoint.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Map a non-2xx Query API response onto a [`CloudWatchError`].
fn error_from_response(status: u16, body: &str) -> CloudWatchError {
    static CODE_REGEX: Lazy<Regex> = Lazy::new(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"<Code>\s*([^<]*?)\s*</Code>").expect("Hard-coded regex pattern should be valid")
    });
    static MESSAGE_REGEX: Lazy<Regex> = Lazy::new(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"(?s)<Message>\s*(.*?)\s*</Message>")
            .expect("Hard-coded regex pattern should be valid")
    });

    let code = CODE_REGEX
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| format!("Http{status}"));
    let message = MESSAGE_REGEX
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| unescape_xml(m.as_str()))
        .unwrap_or_else(|| body.trim().to_string());
    let message = truncate_field(&message, MAX_ERROR_MESSAGE_LENGTH);

    if status == 403 || AUTH_ERROR_CODES.contains(&code.as_str()) {
        CloudWatchError::Authentication { code, message }
    } else if status == 429 || THROTTLING_ERROR_CODES.contains(&code.as_str()) {
        CloudWatchError::Throttled { code, message }
    } else if status >= 500 {
        CloudWatchError::ServerError { status, message }
    } else {
        CloudWatchError::InvalidRequest { code, message }
    }
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
