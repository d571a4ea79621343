//! wechat-sdk
//!
//! Two independent pieces:
//!
//! - [`cache`]: a Redis-backed cache whose connections can be tunneled
//!   through an SSH gateway ([`ssh::TunnelDialer`])
//! - [`miniprogram`]: the mini-program updatable message API

pub mod cache;
pub mod config;
pub mod context;
pub mod credential;
pub mod http;
pub mod miniprogram;
pub mod net;
pub mod ssh;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use context::CallContext;

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`).
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
