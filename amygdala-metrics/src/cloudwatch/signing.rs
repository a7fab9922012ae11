//! AWS Signature Version 4 request signing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ring::hmac;
use sha2::{Digest, Sha256};

use crate::cloudwatch::AwsCredentials;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Who signs, where, and when.
pub(crate) struct SigningParams<'a> {
    pub credentials: &'a AwsCredentials,
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
}

/// The parts of an HTTP request covered by the signature.
///
/// Header names must be lowercase. `query` must already be in canonical
/// form: pairs sorted by name, each name and value URI-encoded.
pub(crate) struct SignableRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    pub headers: BTreeMap<String, String>,
    pub body: &'a [u8],
}

impl SignableRequest<'_> {
    /// Sign the request in place.
    ///
    /// Adds `x-amz-date` (and `x-amz-security-token` for temporary
    /// credentials) to the signed headers, then adds `authorization`.
    pub(crate) fn sign(&mut self, params: &SigningParams<'_>) {
        let amz_date = params.time.format("%Y%m%dT%H%M%SZ").to_string();
        let date = params.time.format("%Y%m%d").to_string();

        self.headers.insert("x-amz-date".to_string(), amz_date.clone());
        if let Some(token) = params.credentials.session_token() {
            self.headers
                .insert("x-amz-security-token".to_string(), token.expose().to_string());
        }

        let (canonical, signed_headers) = self.canonical_request();
        let scope = format!(
            "{date}/{}/{}/aws4_request",
            params.region, params.service
        );
        let to_sign = string_to_sign(&amz_date, &scope, &canonical);

        let key = signing_key(
            params.credentials.secret_access_key().expose(),
            &date,
            params.region,
            params.service,
        );
        let signature = hex::encode(hmac_sha256(&key, to_sign.as_bytes()));

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            params.credentials.access_key_id()
        );
        self.headers
            .insert("authorization".to_string(), authorization);
    }

    fn canonical_request(&self) -> (String, String) {
        let mut canonical_headers = String::new();
        for (name, value) in &self.headers {
            canonical_headers.push_str(name);
            canonical_headers.push(':');
            canonical_headers.push_str(&value.split_whitespace().collect::<Vec<_>>().join(" "));
            canonical_headers.push('\n');
        }
        let signed_headers = self
            .headers
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(";");

        let canonical = format!(
            "{}\n{}\n{}\n{canonical_headers}\n{signed_headers}\n{}",
            self.method,
            self.path,
            self.query,
            sha256_hex(self.body)
        );
        (canonical, signed_headers)
    }
}

fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    )
}

/// Derive the per-day, per-region, per-service signing key.
pub(crate) fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::sign(&key, data).as_ref().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    #[test]
    fn test_signing_key_matches_aws_example() {
        let key = signing_key(SECRET, "20120215", "us-east-1", "iam");
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    fn list_users_request() -> SignableRequest<'static> {
        SignableRequest {
            method: "GET",
            path: "/",
            query: "Action=ListUsers&Version=2010-05-08",
            headers: BTreeMap::from([
                (
                    "content-type".to_string(),
                    "application/x-www-form-urlencoded; charset=utf-8".to_string(),
                ),
                ("host".to_string(), "iam.amazonaws.com".to_string()),
            ]),
            body: b"",
        }
    }

    // IAM ListUsers example from the AWS Signature Version 4 documentation.
    #[test]
    fn test_list_users_canonical_request_and_string_to_sign() {
        let mut request = list_users_request();
        request
            .headers
            .insert("x-amz-date".to_string(), "20150830T123600Z".to_string());

        let (canonical, signed_headers) = request.canonical_request();
        assert_eq!(
            canonical,
            "GET\n/\nAction=ListUsers&Version=2010-05-08\n\
             content-type:application/x-www-form-urlencoded; charset=utf-8\n\
             host:iam.amazonaws.com\n\
             x-amz-date:20150830T123600Z\n\n\
             content-type;host;x-amz-date\n\
             e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(signed_headers, "content-type;host;x-amz-date");
        assert_eq!(
            sha256_hex(canonical.as_bytes()),
            "f536975d06c0309214f805bb90ccff089219ecd68b2577efef23edd43b7e1a59"
        );
        assert_eq!(
            string_to_sign(
                "20150830T123600Z",
                "20150830/us-east-1/iam/aws4_request",
                &canonical
            ),
            "AWS4-HMAC-SHA256\n20150830T123600Z\n20150830/us-east-1/iam/aws4_request\n\
             f536975d06c0309214f805bb90ccff089219ecd68b2577efef23edd43b7e1a59"
        );
    }

    #[test]
    fn test_list_users_signature() {
        let credentials = AwsCredentials::new("AKIDEXAMPLE", SECRET);
        let params = SigningParams {
            credentials: &credentials,
            region: "us-east-1",
            service: "iam",
            time: Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap(),
        };

        let mut request = list_users_request();
        request.sign(&params);

        assert_eq!(request.headers["x-amz-date"], "20150830T123600Z");
        assert_eq!(
            request.headers["authorization"],
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, \
             Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7"
        );
    }

    #[test]
    fn test_session_token_is_signed() {
        let credentials = AwsCredentials::new("AKIDEXAMPLE", SECRET).with_session_token("token");
        let params = SigningParams {
            credentials: &credentials,
            region: "us-east-1",
            service: "monitoring",
            time: Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap(),
        };

        let mut request = SignableRequest {
            method: "POST",
            path: "/",
            query: "",
            headers: BTreeMap::from([
                ("host".to_string(), "monitoring.us-east-1.amazonaws.com".to_string()),
                (
                    "content-type".to_string(),
                    "application/x-www-form-urlencoded; charset=utf-8".to_string(),
                ),
            ]),
            body: b"Action=PutMetricData",
        };
        request.sign(&params);

        assert_eq!(request.headers["x-amz-security-token"], "token");
        assert!(request.headers["authorization"].contains(
            "SignedHeaders=content-type;host;x-amz-date;x-amz-security-token"
        ));
        assert!(request.headers["authorization"]
            .contains("Credential=AKIDEXAMPLE/20240110/us-east-1/monitoring/aws4_request"));
    }

    #[test]
    fn test_canonical_header_values_are_trimmed() {
        let request = SignableRequest {
            method: "GET",
            path: "/",
            query: "",
            headers: BTreeMap::from([("my-header".to_string(), "  a   b  ".to_string())]),
            body: b"",
        };
        let (canonical, signed) = request.canonical_request();
        assert!(canonical.contains("my-header:a b\n"));
        assert_eq!(signed, "my-header");
    }
}
