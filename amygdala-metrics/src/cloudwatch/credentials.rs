//! Default region and credential resolution.
//!
//! Sources are tried in the order the AWS SDKs use:
//!
//! 1. `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`
//! 2. the shared credentials and config files, for `AWS_PROFILE` or `default`
//! 3. the ECS container credentials endpoint
//! 4. the EC2 instance metadata service (IMDSv2)
//!
//! The first two are local reads. The last two need the network and are
//! only consulted by [`CloudWatchConfig::load`](crate::cloudwatch::CloudWatchConfig::load).
//! Temporary credentials are fetched once and not refreshed.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::cloudwatch::{AwsCredentials, CloudWatchError, CloudWatchResult};

const DEFAULT_PROFILE: &str = "default";
const ECS_CREDENTIALS_HOST: &str = "http://169.254.170.2";
const IMDS_ENDPOINT: &str = "http://169.254.169.254";
const IMDS_TOKEN_TTL_SECONDS: &str = "21600";
const IMDS_ROLE_PATH: &str = "/latest/meta-data/iam/security-credentials/";
const IMDS_REGION_PATH: &str = "/latest/meta-data/placement/region";
const METADATA_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Region from `AWS_REGION`, falling back to `AWS_DEFAULT_REGION`.
pub(crate) fn env_region() -> Option<String> {
    non_empty_var("AWS_REGION").or_else(|| non_empty_var("AWS_DEFAULT_REGION"))
}

/// Credentials from the environment, when both key variables are set.
pub(crate) fn env_credentials() -> Option<AwsCredentials> {
    let access_key_id = non_empty_var("AWS_ACCESS_KEY_ID")?;
    let secret_access_key = non_empty_var("AWS_SECRET_ACCESS_KEY")?;
    Some(with_optional_token(
        AwsCredentials::new(access_key_id, secret_access_key),
        non_empty_var("AWS_SESSION_TOKEN"),
    ))
}

fn with_optional_token(credentials: AwsCredentials, token: Option<String>) -> AwsCredentials {
    match token {
        Some(token) => credentials.with_session_token(token),
        None => credentials,
    }
}

type Sections = HashMap<String, HashMap<String, String>>;

/// Parse the INI-style layout shared by `~/.aws/credentials` and `~/.aws/config`.
fn parse_profile_file(contents: &str) -> Sections {
    let mut sections = Sections::new();
    let mut current: Option<String> = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }

        let (Some(section), Some((key, value))) = (&current, line.split_once('=')) else {
            continue;
        };
        sections
            .entry(section.clone())
            .or_default()
            .insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    sections
}

fn shared_file_path(override_var: &str, file_name: &str) -> Option<PathBuf> {
    non_empty_var(override_var).map(PathBuf::from).or_else(|| {
        BaseDirs::new().map(|dirs| dirs.home_dir().join(".aws").join(file_name))
    })
}

fn read_profile_file(path: Option<PathBuf>) -> Sections {
    let Some(path) = path else {
        return Sections::new();
    };
    match fs::read_to_string(&path) {
        Ok(contents) => parse_profile_file(&contents),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Shared AWS file not readable");
            Sections::new()
        }
    }
}

/// The active profile's entries from the shared credentials and config files.
#[derive(Debug, Default)]
pub(crate) struct SharedProfile {
    name: String,
    credentials: HashMap<String, String>,
    config: HashMap<String, String>,
}

impl SharedProfile {
    /// Read the profile named by `AWS_PROFILE`, or `default`.
    ///
    /// `AWS_SHARED_CREDENTIALS_FILE` and `AWS_CONFIG_FILE` override the file
    /// locations. Missing files yield an empty profile.
    pub(crate) fn load() -> Self {
        let name = non_empty_var("AWS_PROFILE").unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        let mut credentials_file =
            read_profile_file(shared_file_path("AWS_SHARED_CREDENTIALS_FILE", "credentials"));
        let mut config_file = read_profile_file(shared_file_path("AWS_CONFIG_FILE", "config"));

        // The config file prefixes every profile but `default` with "profile ".
        let mut config = config_file.remove(&format!("profile {name}"));
        if name == DEFAULT_PROFILE {
            config = config_file.remove(DEFAULT_PROFILE).or(config);
        }

        Self {
            credentials: credentials_file.remove(&name).unwrap_or_default(),
            config: config.unwrap_or_default(),
            name,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Credential keys are looked up in the credentials file first.
    fn credential_value(&self, key: &str) -> Option<&str> {
        self.credentials
            .get(key)
            .or_else(|| self.config.get(key))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub(crate) fn credentials(&self) -> Option<AwsCredentials> {
        let access_key_id = self.credential_value("aws_access_key_id")?;
        let secret_access_key = self.credential_value("aws_secret_access_key")?;
        Some(with_optional_token(
            AwsCredentials::new(access_key_id, secret_access_key),
            self.credential_value("aws_session_token").map(str::to_string),
        ))
    }

    pub(crate) fn region(&self) -> Option<&str> {
        self.config
            .get("region")
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Credential document served by the container and instance endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoleCredentials {
    code: Option<String>,
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
}

fn parse_role_credentials(source: &str, body: &str) -> CloudWatchResult<AwsCredentials> {
    let document: RoleCredentials =
        serde_json::from_str(body).map_err(|e| CloudWatchError::MissingCredentials {
            message: format!("{source} returned an unreadable credential document: {e}"),
        })?;

    if let Some(code) = document.code.as_deref().filter(|code| *code != "Success") {
        return Err(CloudWatchError::MissingCredentials {
            message: format!("{source} reported {code}"),
        });
    }

    Ok(with_optional_token(
        AwsCredentials::new(document.access_key_id, document.secret_access_key),
        document.token.filter(|token| !token.is_empty()),
    ))
}

fn metadata_network_error(source: &str, e: reqwest::Error) -> CloudWatchError {
    CloudWatchError::Network {
        message: format!("{source}: {e}"),
    }
}

/// HTTP client for the container and instance metadata endpoints.
pub(crate) struct MetadataClient {
    client: Client,
}

impl MetadataClient {
    pub(crate) fn new() -> CloudWatchResult<Self> {
        let client = Client::builder()
            .timeout(METADATA_TIMEOUT)
            .build()
            .map_err(|e| CloudWatchError::Configuration {
                message: format!("Failed to create metadata HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    /// Credentials from the ECS container endpoint, when the runtime
    /// advertises one through `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI` or
    /// `AWS_CONTAINER_CREDENTIALS_FULL_URI`.
    #[instrument(skip(self))]
    pub(crate) async fn container_credentials(&self) -> CloudWatchResult<Option<AwsCredentials>> {
        const SOURCE: &str = "container credentials endpoint";

        let url = match (
            non_empty_var("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI"),
            non_empty_var("AWS_CONTAINER_CREDENTIALS_FULL_URI"),
        ) {
            (Some(relative), _) => format!("{ECS_CREDENTIALS_HOST}{relative}"),
            (None, Some(full)) => full,
            (None, None) => return Ok(None),
        };

        let mut request = self.client.get(&url);
        if let Some(token) = non_empty_var("AWS_CONTAINER_AUTHORIZATION_TOKEN") {
            request = request.header("Authorization", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| metadata_network_error(SOURCE, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| metadata_network_error(SOURCE, e))?;
        if !status.is_success() {
            return Err(CloudWatchError::MissingCredentials {
                message: format!("{SOURCE} answered with status {status}"),
            });
        }

        debug!(url = %url, "Loaded credentials from container endpoint");
        parse_role_credentials(SOURCE, &body).map(Some)
    }

    /// Credentials of the instance role, via IMDSv2.
    ///
    /// Returns `None` when the metadata service is disabled, unreachable or
    /// no role is attached.
    #[instrument(skip(self))]
    pub(crate) async fn instance_credentials(&self) -> CloudWatchResult<Option<AwsCredentials>> {
        const SOURCE: &str = "instance metadata service";

        let Some(endpoint) = imds_endpoint() else {
            return Ok(None);
        };
        let Some(token) = self.imds_token(&endpoint).await else {
            return Ok(None);
        };

        let Some(roles) = self.imds_get(&endpoint, &token, IMDS_ROLE_PATH).await? else {
            debug!("No instance role attached");
            return Ok(None);
        };
        let Some(role) = roles.lines().map(str::trim).find(|line| !line.is_empty()) else {
            debug!("No instance role attached");
            return Ok(None);
        };

        let path = format!("{IMDS_ROLE_PATH}{role}");
        let body = self
            .imds_get(&endpoint, &token, &path)
            .await?
            .ok_or_else(|| CloudWatchError::MissingCredentials {
                message: format!("{SOURCE} has no credentials for role '{role}'"),
            })?;

        debug!(role, "Loaded credentials from instance role");
        parse_role_credentials(SOURCE, &body).map(Some)
    }

    /// Region the instance runs in, if the metadata service answers.
    #[instrument(skip(self))]
    pub(crate) async fn instance_region(&self) -> Option<String> {
        let endpoint = imds_endpoint()?;
        let token = self.imds_token(&endpoint).await?;
        match self.imds_get(&endpoint, &token, IMDS_REGION_PATH).await {
            Ok(region) => region
                .map(|region| region.trim().to_string())
                .filter(|region| !region.is_empty()),
            Err(e) => {
                debug!(error = %e, "Instance region lookup failed");
                None
            }
        }
    }

    async fn imds_token(&self, endpoint: &str) -> Option<String> {
        let response = self
            .client
            .put(format!("{endpoint}/latest/api/token"))
            .header("X-aws-ec2-metadata-token-ttl-seconds", IMDS_TOKEN_TTL_SECONDS)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => response.text().await.ok(),
            Ok(response) => {
                debug!(status = response.status().as_u16(), "IMDS token request rejected");
                None
            }
            Err(e) => {
                debug!(error = %e, "Instance metadata service unreachable");
                None
            }
        }
    }

    /// GET a metadata path. A 404 means the item does not exist.
    async fn imds_get(
        &self,
        endpoint: &str,
        token: &str,
        path: &str,
    ) -> CloudWatchResult<Option<String>> {
        const SOURCE: &str = "instance metadata service";

        let response = self
            .client
            .get(format!("{endpoint}{path}"))
            .header("X-aws-ec2-metadata-token", token)
            .send()
            .await
            .map_err(|e| metadata_network_error(SOURCE, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CloudWatchError::MissingCredentials {
                message: format!("{SOURCE} answered {path} with status {status}"),
            });
        }

        response
            .text()
            .await
            .map(Some)
            .map_err(|e| metadata_network_error(SOURCE, e))
    }
}

/// The IMDS base URL, or `None` when `AWS_EC2_METADATA_DISABLED=true`.
fn imds_endpoint() -> Option<String> {
    if non_empty_var("AWS_EC2_METADATA_DISABLED").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        return None;
    }
    let endpoint = non_empty_var("AWS_EC2_METADATA_SERVICE_ENDPOINT")
        .unwrap_or_else(|| IMDS_ENDPOINT.to_string());
    Some(endpoint.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profile_file() {
        let sections = parse_profile_file(
            "# shared credentials\n\
             [default]\n\
             aws_access_key_id = AKIDDEFAULT\n\
             aws_secret_access_key=secret-default\n\
             \n\
             ; staging account\n\
             [profile   staging]\n\
             region = eu-west-1\n\
             AWS_Session_Token = token=with=equals\n\
             orphan line\n",
        );

        assert_eq!(sections["default"]["aws_access_key_id"], "AKIDDEFAULT");
        assert_eq!(sections["default"]["aws_secret_access_key"], "secret-default");
        assert_eq!(sections["profile staging"]["region"], "eu-west-1");
        assert_eq!(sections["profile staging"]["aws_session_token"], "token=with=equals");
        assert_eq!(sections["profile staging"].len(), 2);
    }

    #[test]
    fn test_parse_profile_file_ignores_keys_outside_sections() {
        let sections = parse_profile_file("aws_access_key_id = AKID\n[default]\n");
        assert!(sections["default"].is_empty());
        assert_eq!(sections.len(), 1);
    }

    #[test]
    fn test_shared_profile_prefers_credentials_file() {
        let profile = SharedProfile {
            name: "default".to_string(),
            credentials: HashMap::from([
                ("aws_access_key_id".to_string(), "AKIDFILE".to_string()),
                ("aws_secret_access_key".to_string(), "file-secret".to_string()),
            ]),
            config: HashMap::from([
                ("aws_access_key_id".to_string(), "AKIDCONFIG".to_string()),
                ("aws_session_token".to_string(), "config-token".to_string()),
                ("region".to_string(), "ap-southeast-2".to_string()),
            ]),
        };

        let credentials = profile.credentials().unwrap();
        assert_eq!(credentials.access_key_id(), "AKIDFILE");
        assert_eq!(credentials.secret_access_key().expose(), "file-secret");
        assert_eq!(credentials.session_token().unwrap().expose(), "config-token");
        assert_eq!(profile.region(), Some("ap-southeast-2"));
    }

    #[test]
    fn test_shared_profile_without_secret_has_no_credentials() {
        let profile = SharedProfile {
            name: "default".to_string(),
            credentials: HashMap::from([("aws_access_key_id".to_string(), "AKID".to_string())]),
            config: HashMap::new(),
        };
        assert!(profile.credentials().is_none());
        assert!(profile.region().is_none());
    }

    #[test]
    fn test_parse_role_credentials() {
        let credentials = parse_role_credentials(
            "test",
            r#"{"Code":"Success","LastUpdated":"2024-01-10T12:00:00Z","Type":"AWS-HMAC",
                "AccessKeyId":"ASIAROLE","SecretAccessKey":"role-secret",
                "Token":"role-token","Expiration":"2024-01-10T18:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(credentials.access_key_id(), "ASIAROLE");
        assert_eq!(credentials.session_token().unwrap().expose(), "role-token");

        let err = parse_role_credentials(
            "test",
            r#"{"Code":"Failure","AccessKeyId":"","SecretAccessKey":""}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CloudWatchError::MissingCredentials { .. }));

        let err = parse_role_credentials("test", "not json").unwrap_err();
        assert!(matches!(err, CloudWatchError::MissingCredentials { .. }));
    }
}
