//! Backend credentials
//!
//! Profile A authenticates with a long-lived API key. Profile B exchanges an
//! access key pair for a short-lived token, which is cached until shortly
//! before it expires.

mod cache;
mod nls_token;

pub use cache::{CachedCredential, IssuedToken, TokenIssuer, SAFETY_MARGIN_SECS};
pub use nls_token::{NlsTokenIssuer, DEFAULT_REGION, DEFAULT_TOKEN_ENDPOINT};

use async_trait::async_trait;

use crate::core::{Result, TtsError};

/// Supplies the credential attached to each backend connection
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credential(&self) -> Result<String>;
}

/// A fixed API key
#[derive(Clone)]
pub struct StaticCredential {
    api_key: String,
}

impl StaticCredential {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl std::fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredential")
            .field("configured", &!self.api_key.is_empty())
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn credential(&self) -> Result<String> {
        if self.api_key.trim().is_empty() {
            return Err(TtsError::credential("API key is not configured"));
        }
        Ok(self.api_key.clone())
    }
}
