use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{join_url, DeliverySink};
use crate::core::{Result, TtsError};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Uploads audio to an object store that accepts `PUT <base>/<key>`
pub struct HttpPutSink {
    client: Client,
    base_url: String,
    bearer: Option<String>,
    public_base_url: String,
}

impl HttpPutSink {
    pub fn new(
        base_url: impl Into<String>,
        bearer: Option<String>,
        public_base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| TtsError::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            bearer: bearer.filter(|b| !b.is_empty()),
            public_base_url: public_base_url.into(),
        })
    }
}

#[async_trait]
impl DeliverySink for HttpPutSink {
    async fn upload(&self, key: &str, data: Bytes, content_type: &str, overwrite: bool) -> Result<String> {
        let target = join_url(&self.base_url, key);
        let size = data.len();

        let mut request = self
            .client
            .put(&target)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", if overwrite { "true" } else { "false" })
            .body(data);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TtsError::storage(format!("Upload to {} failed: {}", target, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::storage(format!(
                "Upload rejected with HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        debug!(target = %target, bytes = size, "Uploaded audio");
        Ok(join_url(&self.public_base_url, key))
    }
}
