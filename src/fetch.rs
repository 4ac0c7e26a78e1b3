//! Storage fetch: resolve a [`StorageRef`] to raw bytes.
//!
//! Object-storage references are fetched with a signed S3 `GetObject`
//! request using AWS Signature V4 (pure-Rust `hmac` + `sha2`, no C
//! dependencies), with custom endpoints supported for S3-compatible
//! services (MinIO, LocalStack). Local references are read from disk,
//! resolved against an optional configured root.
//!
//! Credentials are read from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
//! and optionally `AWS_SESSION_TOKEN`.
//!
//! Every fetch is bounded by a timeout; a missing object or file maps to
//! [`PipelineError::SourceUnavailable`], a timeout to
//! [`UpstreamError::Timeout`].

use anyhow::Result;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::StorageConfig;
use crate::error::{PipelineError, UpstreamError};
use crate::models::StorageRef;

type HmacSha256 = Hmac<Sha256>;

/// Resolves storage references to bytes. Constructed once and injected into
/// the pipeline.
pub struct Fetcher {
    client: reqwest::Client,
    region: String,
    endpoint_url: Option<String>,
    local_root: Option<PathBuf>,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(storage: &StorageConfig, timeout: Duration) -> Self {
        let (region, endpoint_url) = match &storage.s3 {
            Some(s3) => (s3.region.clone(), s3.endpoint_url.clone()),
            None => ("us-east-1".to_string(), None),
        };
        Self {
            client: reqwest::Client::new(),
            region,
            endpoint_url,
            local_root: storage.local_root.clone(),
            timeout,
        }
    }

    /// Fetch the full object/file into memory.
    pub async fn fetch(&self, storage: &StorageRef) -> Result<Vec<u8>, PipelineError> {
        let fut = async {
            match storage {
                StorageRef::Object { bucket, key } => self.fetch_object(bucket, key).await,
                StorageRef::Local { path } => self.read_local(path).await,
            }
        };
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(self.timeout).into()),
        }
    }

    async fn read_local(&self, path: &std::path::Path) -> Result<Vec<u8>, PipelineError> {
        let resolved = match &self.local_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        };
        match tokio::fs::read(&resolved).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                PipelineError::SourceUnavailable(format!("no such file: {}", resolved.display())),
            ),
            Err(e) => Err(PipelineError::Store(anyhow::anyhow!(
                "failed to read {}: {}",
                resolved.display(),
                e
            ))),
        }
    }

    /// Download a single object from S3 using a SigV4-signed GET request.
    async fn fetch_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PipelineError> {
        let creds = AwsCredentials::from_env()
            .map_err(|e| PipelineError::SourceUnavailable(e.to_string()))?;

        let host = self.s3_host(bucket);
        let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        let url = format!("https://{}/{}", host, encoded_key);

        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let payload_hash = hex_sha256(b"");

        let mut headers = vec![
            ("host".to_string(), host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(ref token) = creds.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers: String = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let canonical_uri = format!("/{}", encoded_key);
        let canonical_request = format!(
            "GET\n{}\n\n{}\n{}\n{}",
            canonical_uri, canonical_headers, signed_headers, payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key =
            derive_signing_key(&creds.secret_access_key, &date_stamp, &self.region, "s3");
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            creds.access_key_id, credential_scope, signed_headers, signature
        );

        let mut req_builder = self
            .client
            .get(&url)
            .header("Authorization", &authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date);

        if let Some(ref token) = creds.session_token {
            req_builder = req_builder.header("x-amz-security-token", token);
        }

        let resp = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                PipelineError::Upstream(UpstreamError::Timeout(self.timeout))
            } else {
                PipelineError::SourceUnavailable(format!(
                    "failed to get s3://{}/{}: {}",
                    bucket, key, e
                ))
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::SourceUnavailable(format!(
                "S3 GetObject failed (HTTP {}) for s3://{}/{}",
                status, bucket, key
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| PipelineError::Store(e.into()))?;
        Ok(bytes.to_vec())
    }

    /// Compute the S3 hostname for a bucket, honoring a custom endpoint.
    fn s3_host(&self, bucket: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string()
        } else {
            format!("{}.s3.{}.amazonaws.com", bucket, self.region)
        }
    }
}

// ============ AWS Credentials ============

struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| anyhow::anyhow!("AWS_ACCESS_KEY_ID environment variable not set"))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| anyhow::anyhow!("AWS_SECRET_ACCESS_KEY environment variable not set"))?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

// ============ AWS SigV4 Helpers ============

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a string per RFC 3986 (unreserved characters pass through).
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::S3Config;

    #[test]
    fn uri_encode_escapes_reserved() {
        assert_eq!(uri_encode("a b/c"), "a%20b%2Fc");
        assert_eq!(uri_encode("safe-chars_.~"), "safe-chars_.~");
    }

    #[test]
    fn s3_host_uses_custom_endpoint_when_set() {
        let storage = StorageConfig {
            s3: Some(S3Config {
                bucket: "firm-docs".to_string(),
                region: "eu-west-1".to_string(),
                endpoint_url: Some("http://localhost:9000/".to_string()),
            }),
            local_root: None,
        };
        let fetcher = Fetcher::new(&storage, Duration::from_secs(30));
        assert_eq!(fetcher.s3_host("firm-docs"), "localhost:9000");
    }

    #[test]
    fn s3_host_defaults_to_virtual_hosted_style() {
        let fetcher = Fetcher::new(&StorageConfig::default(), Duration::from_secs(30));
        assert_eq!(
            fetcher.s3_host("firm-docs"),
            "firm-docs.s3.us-east-1.amazonaws.com"
        );
    }

    #[tokio::test]
    async fn missing_local_file_is_source_unavailable() {
        let fetcher = Fetcher::new(&StorageConfig::default(), Duration::from_secs(5));
        let storage = StorageRef::Local {
            path: "/definitely/not/here.pdf".into(),
        };
        let err = fetcher.fetch(&storage).await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn local_read_resolves_against_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("brief.txt"), b"contents").unwrap();
        let storage_config = StorageConfig {
            s3: None,
            local_root: Some(dir.path().to_path_buf()),
        };
        let fetcher = Fetcher::new(&storage_config, Duration::from_secs(5));
        let bytes = fetcher
            .fetch(&StorageRef::Local {
                path: "brief.txt".into(),
            })
            .await
            .unwrap();
        assert_eq!(bytes, b"contents");
    }
}
