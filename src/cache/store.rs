//! Key-value command surface the cache client delegates to

use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheError;
use crate::context::CallContext;

/// GET / SETEX / EXISTS / DEL against a remote store.
///
/// Unlike [`Cache`](super::Cache), every failure is reported.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, ctx: &CallContext, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value`, expiring after `ttl`. A zero `ttl` stores without expiry.
    async fn set_ex(
        &self,
        ctx: &CallContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    async fn exists(&self, ctx: &CallContext, key: &str) -> Result<bool, CacheError>;

    async fn del(&self, ctx: &CallContext, key: &str) -> Result<(), CacheError>;
}

/// Redis SETEX takes whole seconds; sub-second TTLs round up to one second
pub(crate) fn ttl_seconds(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        None
    } else {
        Some(ttl.as_secs().max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_seconds() {
        assert_eq!(ttl_seconds(Duration::ZERO), None);
        assert_eq!(ttl_seconds(Duration::from_millis(200)), Some(1));
        assert_eq!(ttl_seconds(Duration::from_millis(7_900)), Some(7));
        assert_eq!(ttl_seconds(Duration::from_secs(7200)), Some(7200));
    }
}
