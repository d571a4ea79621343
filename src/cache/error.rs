//! Cache error types

use std::time::Duration;

use thiserror::Error;

use crate::context::ContextError;
use crate::net::DialError;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to dial store: {0}")]
    Dial(#[from] DialError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache operation cancelled")]
    Cancelled,

    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection pool closed")]
    PoolClosed,
}

impl CacheError {
    /// True when the failure says nothing about the key, only about reachability
    pub fn is_unavailable(&self) -> bool {
        match self {
            CacheError::Redis(e) => e.is_io_error() || e.is_connection_dropped() || e.is_timeout(),
            _ => true,
        }
    }
}

impl From<ContextError> for CacheError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => CacheError::Cancelled,
            ContextError::TimedOut(limit) => CacheError::Timeout(limit),
        }
    }
}
