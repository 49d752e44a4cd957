//! Expiring token cache

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::CredentialProvider;
use crate::core::Result;

/// Tokens are refreshed this many seconds before their stated expiry
pub const SAFETY_MARGIN_SECS: i64 = 60;

/// A token and the instant the issuer says it stops working
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::seconds(SAFETY_MARGIN_SECS)
    }
}

/// Exchanges long-lived secrets for a short-lived token
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self) -> Result<IssuedToken>;
}

/// Read-mostly cache in front of a [`TokenIssuer`].
///
/// Concurrent misses may each call the issuer; the last writer wins.
pub struct CachedCredential<I> {
    issuer: I,
    current: RwLock<Option<IssuedToken>>,
}

impl<I: TokenIssuer> CachedCredential<I> {
    pub fn new(issuer: I) -> Self {
        Self {
            issuer,
            current: RwLock::new(None),
        }
    }

    pub fn issuer(&self) -> &I {
        &self.issuer
    }
}

#[async_trait]
impl<I: TokenIssuer> CredentialProvider for CachedCredential<I> {
    async fn credential(&self) -> Result<String> {
        if let Some(cached) = self.current.read().await.as_ref() {
            if cached.is_fresh_at(Utc::now()) {
                return Ok(cached.token.clone());
            }
            debug!(expires_at = %cached.expires_at, "Cached token is stale");
        }

        let issued = self.issuer.issue().await?;
        info!(expires_at = %issued.expires_at, "Obtained new backend token");
        let token = issued.token.clone();
        *self.current.write().await = Some(issued);
        Ok(token)
    }
}
