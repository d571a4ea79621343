//! Redis connection pool
//!
//! Multiplexed connections established through a pluggable [`Dialer`].
//!
//! - `max_idle` connections are kept for reuse after a command completes
//! - `max_active` caps connections checked out at once (0 = unlimited)
//! - idle connections older than `idle_timeout` are dropped on checkout
//! - a connection that failed with an I/O error is never put back

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use redis::{FromRedisValue, RedisConnectionInfo};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::CacheError;
use super::store::{ttl_seconds, KvStore};
use crate::context::CallContext;
use crate::net::Dialer;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// `host:port` of the Redis server, as seen from the dialer
    pub address: String,
    pub password: Option<String>,
    pub database: i64,
    pub max_idle: usize,
    pub max_active: usize,
    pub idle_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub dials: u64,
}

struct IdleConn {
    conn: MultiplexedConnection,
    since: Instant,
}

pub struct RedisPool {
    config: PoolConfig,
    info: RedisConnectionInfo,
    dialer: Arc<dyn Dialer>,
    idle: Mutex<VecDeque<IdleConn>>,
    active: Option<Arc<Semaphore>>,
    dials: AtomicU64,
}

impl RedisPool {
    pub fn new(config: PoolConfig, dialer: Arc<dyn Dialer>) -> Self {
        let info = RedisConnectionInfo {
            db: config.database,
            password: config.password.clone().filter(|p| !p.is_empty()),
            ..Default::default()
        };
        let active = (config.max_active > 0).then(|| Arc::new(Semaphore::new(config.max_active)));

        Self {
            config,
            info,
            dialer,
            idle: Mutex::new(VecDeque::new()),
            active,
            dials: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.idle.lock().len(),
            dials: self.dials.load(Ordering::Relaxed),
        }
    }

    /// Drop every idle connection
    pub fn clear(&self) {
        self.idle.lock().clear();
    }

    fn take_idle(&self) -> Option<MultiplexedConnection> {
        let mut idle = self.idle.lock();
        while let Some(entry) = idle.pop_back() {
            match self.config.idle_timeout {
                Some(limit) if entry.since.elapsed() > limit => {
                    debug!("Discarding idle Redis connection older than {:?}", limit);
                }
                _ => return Some(entry.conn),
            }
        }
        None
    }

    fn put_back(&self, conn: MultiplexedConnection) {
        let mut idle = self.idle.lock();
        if idle.len() < self.config.max_idle {
            idle.push_back(IdleConn {
                conn,
                since: Instant::now(),
            });
        }
    }

    async fn connect(&self, ctx: &CallContext) -> Result<MultiplexedConnection, CacheError> {
        let stream = self.dialer.dial(ctx, "tcp", &self.config.address).await?;
        self.dials.fetch_add(1, Ordering::Relaxed);

        let (conn, driver) = MultiplexedConnection::new(&self.info, stream).await?;
        tokio::spawn(driver);

        debug!("Redis connection established to {}", self.config.address);
        Ok(conn)
    }

    async fn checkout(&self, ctx: &CallContext) -> Result<PooledConnection<'_>, CacheError> {
        let permit = match &self.active {
            Some(sem) => Some(
                sem.clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| CacheError::PoolClosed)?,
            ),
            None => None,
        };

        let conn = match self.take_idle() {
            Some(conn) => conn,
            None => self.connect(ctx).await?,
        };

        Ok(PooledConnection {
            pool: self,
            conn,
            broken: false,
            _permit: permit,
        })
    }

    async fn execute<T>(&self, ctx: &CallContext, cmd: redis::Cmd) -> Result<T, CacheError>
    where
        T: FromRedisValue + Send,
    {
        ctx.run(async {
            let mut pooled = self.checkout(ctx).await?;
            let result: redis::RedisResult<T> = cmd.query_async(pooled.connection()).await;

            if let Err(e) = &result {
                if e.is_io_error() || e.is_connection_dropped() {
                    warn!("Redis connection to {} broken: {}", self.config.address, e);
                    pooled.mark_broken();
                }
            }
            result.map_err(CacheError::from)
        })
        .await?
    }
}

/// A checked-out connection; returns to the idle list on drop unless broken
struct PooledConnection<'a> {
    pool: &'a RedisPool,
    conn: MultiplexedConnection,
    broken: bool,
    _permit: Option<OwnedSemaphorePermit>,
}

impl PooledConnection<'_> {
    fn connection(&mut self) -> &mut MultiplexedConnection {
        &mut self.conn
    }

    fn mark_broken(&mut self) {
        self.broken = true;
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        // Clones share the underlying multiplexed pipe
        if !self.broken {
            self.pool.put_back(self.conn.clone());
        }
    }
}

#[async_trait]
impl KvStore for RedisPool {
    async fn get(&self, ctx: &CallContext, key: &str) -> Result<Option<String>, CacheError> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.execute(ctx, cmd).await
    }

    async fn set_ex(
        &self,
        ctx: &CallContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let cmd = match ttl_seconds(ttl) {
            Some(secs) => {
                let mut cmd = redis::cmd("SETEX");
                cmd.arg(key).arg(secs).arg(value);
                cmd
            }
            None => {
                let mut cmd = redis::cmd("SET");
                cmd.arg(key).arg(value);
                cmd
            }
        };
        self.execute(ctx, cmd).await
    }

    async fn exists(&self, ctx: &CallContext, key: &str) -> Result<bool, CacheError> {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(key);
        let count: i64 = self.execute(ctx, cmd).await?;
        Ok(count > 0)
    }

    async fn del(&self, ctx: &CallContext, key: &str) -> Result<(), CacheError> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        let _removed: i64 = self.execute(ctx, cmd).await?;
        Ok(())
    }
}
