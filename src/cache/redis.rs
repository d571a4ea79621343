//! Redis cache client
//!
//! `get` and `is_exist` swallow store errors: an unreachable store reads as
//! an absent key. Use [`Redis::lookup_with`] or [`Redis::try_exists_with`]
//! when the difference matters.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::CacheError;
use super::pool::{PoolConfig, RedisPool};
use super::store::KvStore;
use super::Cache;
use crate::context::CallContext;
use crate::net::{Dialer, TcpDialer};
use crate::ssh::OverSsh;

/// Redis connection options
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RedisOpts {
    /// `host:port`
    pub host: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub database: i64,

    #[serde(default)]
    pub max_idle: usize,

    /// 0 = unlimited
    #[serde(default)]
    pub max_active: usize,

    /// Seconds; 0 keeps idle connections indefinitely
    #[serde(default)]
    pub idle_timeout: u64,

    /// Custom transport; plain TCP when unset
    #[serde(skip)]
    pub dialer: Option<Arc<dyn Dialer>>,
}

impl fmt::Debug for RedisOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisOpts")
            .field("host", &self.host)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("database", &self.database)
            .field("max_idle", &self.max_idle)
            .field("max_active", &self.max_active)
            .field("idle_timeout", &self.idle_timeout)
            .field("dialer", &self.dialer.as_ref().map(|_| "custom"))
            .finish()
    }
}

impl RedisOpts {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            address: self.host.clone(),
            password: Some(self.password.clone()).filter(|p| !p.is_empty()),
            database: self.database,
            max_idle: self.max_idle,
            max_active: self.max_active,
            idle_timeout: (self.idle_timeout > 0).then(|| Duration::from_secs(self.idle_timeout)),
        }
    }
}

/// Outcome of a read that keeps "absent" and "unreachable" apart
#[derive(Debug)]
pub enum Lookup {
    Found(String),
    NotFound,
    Unavailable(CacheError),
}

impl Lookup {
    /// Collapse to the swallowing behavior of [`Redis::get`]
    pub fn into_option(self) -> Option<String> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound | Lookup::Unavailable(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

pub struct Redis {
    ctx: CallContext,
    store: Arc<dyn KvStore>,
}

impl Redis {
    /// Connect with `opts.dialer`, or plain TCP
    pub fn new(ctx: CallContext, opts: &RedisOpts) -> Self {
        let dialer = opts
            .dialer
            .clone()
            .unwrap_or_else(|| Arc::new(TcpDialer) as Arc<dyn Dialer>);
        Self::with_dialer(ctx, opts, dialer)
    }

    /// Connect through an SSH gateway
    pub fn new_over_ssh(ctx: CallContext, opts: &RedisOpts, over_ssh: &OverSsh) -> Self {
        Self::with_dialer(ctx, opts, over_ssh.make_dialer())
    }

    fn with_dialer(ctx: CallContext, opts: &RedisOpts, dialer: Arc<dyn Dialer>) -> Self {
        debug!("Creating Redis cache client for {:?}", opts);
        let pool = RedisPool::new(opts.pool_config(), dialer);
        Self::from_store(ctx, Arc::new(pool))
    }

    pub fn from_store(ctx: CallContext, store: Arc<dyn KvStore>) -> Self {
        Self { ctx, store }
    }

    /// Replace the underlying store
    pub fn set_store(&mut self, store: Arc<dyn KvStore>) {
        self.store = store;
    }

    /// Replace the default call context
    pub fn set_context(&mut self, ctx: CallContext) {
        self.ctx = ctx;
    }

    pub fn context(&self) -> &CallContext {
        &self.ctx
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.get_with(&self.ctx, key).await
    }

    /// Value for `key`, or None when absent or when the store failed
    pub async fn get_with(&self, ctx: &CallContext, key: &str) -> Option<String> {
        self.lookup_with(ctx, key).await.into_option()
    }

    pub async fn lookup(&self, key: &str) -> Lookup {
        self.lookup_with(&self.ctx, key).await
    }

    pub async fn lookup_with(&self, ctx: &CallContext, key: &str) -> Lookup {
        match self.store.get(ctx, key).await {
            Ok(Some(value)) => Lookup::Found(value),
            Ok(None) => Lookup::NotFound,
            Err(e) => {
                debug!("Redis GET {} failed: {}", key, e);
                Lookup::Unavailable(e)
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.set_with(&self.ctx, key, value, ttl).await
    }

    pub async fn set_with(
        &self,
        ctx: &CallContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.store.set_ex(ctx, key, value, ttl).await
    }

    pub async fn is_exist(&self, key: &str) -> bool {
        self.is_exist_with(&self.ctx, key).await
    }

    /// False when absent or when the store failed
    pub async fn is_exist_with(&self, ctx: &CallContext, key: &str) -> bool {
        self.try_exists_with(ctx, key).await.unwrap_or_else(|e| {
            debug!("Redis EXISTS {} failed: {}", key, e);
            false
        })
    }

    pub async fn try_exists_with(&self, ctx: &CallContext, key: &str) -> Result<bool, CacheError> {
        self.store.exists(ctx, key).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.delete_with(&self.ctx, key).await
    }

    pub async fn delete_with(&self, ctx: &CallContext, key: &str) -> Result<(), CacheError> {
        self.store.del(ctx, key).await
    }
}

#[async_trait]
impl Cache for Redis {
    async fn get(&self, key: &str) -> Option<String> {
        Redis::get(self, key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        Redis::set(self, key, value, ttl).await
    }

    async fn is_exist(&self, key: &str) -> bool {
        Redis::is_exist(self, key).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        Redis::delete(self, key).await
    }
}
