//! Tunneled connection factory
//!
//! Every dial routes through an SSH gateway:
//!
//! ```text
//! caller --dial(network, addr)--> [SSH session to gateway] --direct-tcpip--> addr
//! ```
//!
//! With [`SessionStrategy::PerDial`] each dial performs its own handshake, so
//! dials never observe each other. [`SessionStrategy::Pooled`] keeps one
//! session and multiplexes later channels over it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::config::{OverSsh, SessionStrategy};
use super::error::SshError;
use super::session::{Gateway, GatewaySession, SshGateway};
use crate::context::CallContext;
use crate::net::{BoxedStream, DialError, DialTarget, Dialer};

pub struct TunnelDialer {
    gateway: Arc<dyn Gateway>,
    strategy: SessionStrategy,
    /// Cached session for `Pooled`
    slot: Mutex<Option<Arc<dyn GatewaySession>>>,
    sessions_established: AtomicU64,
}

impl TunnelDialer {
    pub fn new(config: OverSsh) -> Self {
        let strategy = config.session_strategy;
        Self::with_gateway(Arc::new(SshGateway::new(config)), strategy)
    }

    pub fn with_gateway(gateway: Arc<dyn Gateway>, strategy: SessionStrategy) -> Self {
        Self {
            gateway,
            strategy,
            slot: Mutex::new(None),
            sessions_established: AtomicU64::new(0),
        }
    }

    pub fn strategy(&self) -> SessionStrategy {
        self.strategy
    }

    /// Number of SSH sessions this dialer has established
    pub fn sessions_established(&self) -> u64 {
        self.sessions_established.load(Ordering::Relaxed)
    }

    /// Open a tunneled stream to `address`.
    ///
    /// Fails with a `KeyLoad` error if the private key cannot be read or parsed,
    /// otherwise any failure is a dial error. Nothing is retried.
    pub async fn dial_tunnel(
        &self,
        ctx: &CallContext,
        network: &str,
        address: &str,
    ) -> Result<BoxedStream, SshError> {
        let target = DialTarget::parse(network, address).map_err(|e| match e {
            DialError::UnsupportedNetwork(n) => SshError::UnsupportedNetwork(n),
            other => SshError::ConnectionFailed(other.to_string()),
        })?;

        debug!("Dialing {} via {}", target, self.gateway.describe());

        let stream = ctx
            .run(async {
                match self.strategy {
                    SessionStrategy::PerDial => self.dial_fresh(&target).await,
                    SessionStrategy::Pooled => self.dial_pooled(&target).await,
                }
            })
            .await??;

        Ok(stream)
    }

    async fn establish(&self) -> Result<Arc<dyn GatewaySession>, SshError> {
        let session = self.gateway.establish().await?;
        self.sessions_established.fetch_add(1, Ordering::Relaxed);
        Ok(session)
    }

    async fn dial_fresh(&self, target: &DialTarget) -> Result<BoxedStream, SshError> {
        let session = self.establish().await?;
        session.open_channel(target).await
    }

    async fn dial_pooled(&self, target: &DialTarget) -> Result<BoxedStream, SshError> {
        let session = self.pooled_session().await?;

        match session.clone().open_channel(target).await {
            Ok(stream) => Ok(stream),
            Err(e) if session.is_closed() => {
                // The shared session died underneath us; this request gets a new one
                warn!(
                    "Pooled SSH session {} closed ({}), establishing a new one",
                    session.id(),
                    e
                );
                self.discard(&session).await;
                let fresh = self.pooled_session().await?;
                fresh.open_channel(target).await
            }
            Err(e) => Err(e),
        }
    }

    async fn pooled_session(&self) -> Result<Arc<dyn GatewaySession>, SshError> {
        let mut slot = self.slot.lock().await;

        if let Some(session) = slot.as_ref() {
            if !session.is_closed() {
                return Ok(session.clone());
            }
            info!("Pooled SSH session {} is closed, replacing", session.id());
        }

        let session = self.establish().await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    async fn discard(&self, dead: &Arc<dyn GatewaySession>) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|s| Arc::ptr_eq(s, dead)) {
            *slot = None;
        }
    }
}

#[async_trait]
impl Dialer for TunnelDialer {
    async fn dial(
        &self,
        ctx: &CallContext,
        network: &str,
        address: &str,
    ) -> Result<BoxedStream, DialError> {
        Ok(self.dial_tunnel(ctx, network, address).await?)
    }
}

impl OverSsh {
    /// Build a dialer that tunnels every connection through this gateway
    pub fn make_dialer(&self) -> Arc<TunnelDialer> {
        Arc::new(TunnelDialer::new(self.clone()))
    }
}
