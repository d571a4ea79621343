//! Cache Module
//!
//! A small key-value cache used for access tokens and tickets. The Redis
//! backend can reach its server directly or through an SSH gateway.

mod error;
mod memory;
mod pool;
mod redis;
mod store;

#[cfg(test)]
mod testing;

use std::time::Duration;

use async_trait::async_trait;

pub use error::CacheError;
pub use memory::MemoryCache;
pub use pool::{PoolConfig, PoolStats, RedisPool};
pub use self::redis::{Lookup, Redis, RedisOpts};
pub use store::KvStore;

/// Cache surface shared by every backend.
///
/// `get` and `is_exist` never fail: an unavailable backend reads as a miss.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn is_exist(&self, key: &str) -> bool;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
