//! Access token providers
//!
//! Token acquisition and refresh live outside this crate. API clients only
//! ask an [`AccessTokenProvider`] for the current token.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::Cache;
use crate::http::ApiError;

#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, ApiError>;
}

/// Always returns the same token
#[derive(Clone)]
pub struct StaticAccessToken(String);

impl StaticAccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticAccessToken(***)")
    }
}

#[async_trait]
impl AccessTokenProvider for StaticAccessToken {
    async fn access_token(&self) -> Result<String, ApiError> {
        Ok(self.0.clone())
    }
}

/// Reads a token that another process keeps fresh in a shared cache
pub struct CachedAccessToken {
    cache: Arc<dyn Cache>,
    key: String,
}

impl CachedAccessToken {
    pub fn new(cache: Arc<dyn Cache>, key: impl Into<String>) -> Self {
        Self {
            cache,
            key: key.into(),
        }
    }

    /// Conventional cache key for an app's token
    pub fn key_for(app_id: &str) -> String {
        format!("gowechat_miniprogram_access_token_{}", app_id)
    }
}

#[async_trait]
impl AccessTokenProvider for CachedAccessToken {
    async fn access_token(&self) -> Result<String, ApiError> {
        match self.cache.get(&self.key).await {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ApiError::Token(format!("no access token cached under {}", self.key))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use std::time::Duration;

    #[tokio::test]
    async fn test_static_token() {
        let provider = StaticAccessToken::new("ACCESS");
        assert_eq!(provider.access_token().await.unwrap(), "ACCESS");
        assert!(!format!("{:?}", provider).contains("ACCESS"));
    }

    #[tokio::test]
    async fn test_cached_token() {
        let cache = Arc::new(MemoryCache::new());
        let key = CachedAccessToken::key_for("wx123");
        let provider = CachedAccessToken::new(cache.clone(), key.clone());

        let err = provider.access_token().await.unwrap_err();
        assert!(matches!(err, ApiError::Token(_)));

        cache.set(&key, "fresh", Duration::from_secs(7200)).await.unwrap();
        assert_eq!(provider.access_token().await.unwrap(), "fresh");
    }
}
