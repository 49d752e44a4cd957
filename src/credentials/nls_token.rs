//! Signed `CreateToken` exchange for the token-gateway backend

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha1::Sha1;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::cache::{IssuedToken, TokenIssuer};
use crate::core::{Result, TtsError};

type HmacSha1 = Hmac<Sha1>;

pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://nls-meta.cn-shanghai.aliyuncs.com";
pub const DEFAULT_REGION: &str = "cn-shanghai";

const API_VERSION: &str = "2019-02-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct CreateTokenResponse {
    #[serde(rename = "Token")]
    token: Option<TokenBody>,
    #[serde(rename = "Message")]
    message: Option<String>,
    #[serde(rename = "ErrMsg")]
    err_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "ExpireTime")]
    expire_time: i64,
}

/// Issues gateway tokens from an access key pair
pub struct NlsTokenIssuer {
    client: Client,
    endpoint: String,
    region: String,
    access_key_id: String,
    access_key_secret: String,
}

impl NlsTokenIssuer {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TtsError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            region: DEFAULT_REGION.to_string(),
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Form body for one `CreateToken` call, signature included
    fn signed_body(&self, nonce: &str, timestamp: &str) -> Result<String> {
        let params = [
            ("AccessKeyId", self.access_key_id.as_str()),
            ("Action", "CreateToken"),
            ("Format", "JSON"),
            ("RegionId", self.region.as_str()),
            ("SignatureMethod", "HMAC-SHA1"),
            ("SignatureNonce", nonce),
            ("SignatureVersion", "1.0"),
            ("Timestamp", timestamp),
            ("Version", API_VERSION),
        ];
        let query = canonical_query(&params);
        let signature = sign("POST", &query, &self.access_key_secret)?;
        Ok(format!("{}&Signature={}", query, urlencoding::encode(&signature)))
    }
}

/// Sorted, RFC 3986 encoded `k=v&k=v`
pub fn canonical_query(params: &[(&str, &str)]) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Base64 HMAC-SHA1 of `METHOD&%2F&<encoded query>` keyed by `<secret>&`
pub fn sign(method: &str, canonical_query: &str, secret: &str) -> Result<String> {
    let string_to_sign = format!(
        "{}&{}&{}",
        method,
        urlencoding::encode("/"),
        urlencoding::encode(canonical_query)
    );
    let mut mac = HmacSha1::new_from_slice(format!("{}&", secret).as_bytes())
        .map_err(|e| TtsError::credential(format!("Invalid signing key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[async_trait]
impl TokenIssuer for NlsTokenIssuer {
    async fn issue(&self) -> Result<IssuedToken> {
        if self.access_key_id.is_empty() || self.access_key_secret.is_empty() {
            return Err(TtsError::credential("Access key pair is not configured"));
        }

        let body = self.signed_body(&Uuid::new_v4().to_string(), &timestamp(Utc::now()))?;
        debug!(endpoint = %self.endpoint, region = %self.region, "Requesting gateway token");

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| TtsError::credential(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TtsError::credential(format!("Failed to read token response: {}", e)))?;

        parse_token_response(&text).map_err(|e| match e {
            TtsError::Credential { message } if !status.is_success() => {
                TtsError::credential(format!("HTTP {}: {}", status.as_u16(), message))
            }
            other => other,
        })
    }
}

fn parse_token_response(body: &str) -> Result<IssuedToken> {
    let parsed: CreateTokenResponse = serde_json::from_str(body)
        .map_err(|e| TtsError::credential(format!("Malformed token response: {}", e)))?;

    let Some(token) = parsed.token else {
        let message = parsed
            .message
            .or(parsed.err_msg)
            .unwrap_or_else(|| "no token in response".to_string());
        return Err(TtsError::credential(format!("Token request rejected: {}", message)));
    };

    let expires_at = Utc
        .timestamp_opt(token.expire_time, 0)
        .single()
        .ok_or_else(|| TtsError::credential(format!("Invalid token expiry {}", token.expire_time)))?;

    Ok(IssuedToken {
        token: token.id,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    #[test]
    fn test_signature_matches_reference_vector() {
        let issuer = NlsTokenIssuer::new("my_access_key_id", "my_access_key_secret").unwrap();
        let body = issuer
            .signed_body("b924c8c3-6d03-4c5d-ad36-d984d3116788", "2019-04-18T08:32:31Z")
            .unwrap();

        assert!(body.starts_with(
            "AccessKeyId=my_access_key_id&Action=CreateToken&Format=JSON&RegionId=cn-shanghai"
        ));
        assert!(body.contains("Timestamp=2019-04-18T08%3A32%3A31Z"));
        assert!(body.ends_with("&Signature=X4%2FyeE8FUchC5Wv7AZJybEuDWzw%3D"));
    }

    #[test]
    fn test_canonical_query_sorts_and_encodes() {
        let query = canonical_query(&[("b", "x y"), ("a", "1/2"), ("c", "~ok")]);
        assert_eq!(query, "a=1%2F2&b=x%20y&c=~ok");
    }

    #[test]
    fn test_timestamp_format() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(timestamp(t), "2024-01-02T03:04:05Z");
    }

    #[test]
    fn test_parse_token_response() {
        let issued = parse_token_response(
            r#"{"RequestId":"r","Token":{"Id":"abc123","ExpireTime":1700000000,"UserId":"1"}}"#,
        )
        .unwrap();
        assert_eq!(issued.token, "abc123");
        assert_eq!(issued.expires_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_missing_token_carries_backend_message() {
        let err = parse_token_response(r#"{"Code":"InvalidAccessKeyId.NotFound","Message":"Specified access key is not found."}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Credential);
        assert!(err.to_string().contains("Specified access key is not found."));
    }

    #[tokio::test]
    async fn test_unconfigured_keys_fail_fast() {
        let issuer = NlsTokenIssuer::new("", "").unwrap();
        let err = issuer.issue().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Credential);
    }
}
