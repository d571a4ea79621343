//! SSH gateway sessions and the channels tunneled through them
//!
//! [`Gateway`] and [`GatewaySession`] are the seam between the dialer and
//! russh: the dialer only asks for "a new session" and "a channel to X".

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use russh::client::{Handle, Msg};
use russh::ChannelStream;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::{debug, info};

use super::client::{ClientHandler, SshClient};
use super::config::OverSsh;
use super::error::SshError;
use crate::net::{BoxedStream, DialTarget};

/// Something that can establish SSH sessions to a gateway
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn establish(&self) -> Result<Arc<dyn GatewaySession>, SshError>;

    /// `user@host:port`, for logs
    fn describe(&self) -> String;
}

/// An established SSH session that can open logical channels
#[async_trait]
pub trait GatewaySession: Send + Sync {
    /// Open a channel to `target`. The returned stream keeps the session alive.
    async fn open_channel(self: Arc<Self>, target: &DialTarget) -> Result<BoxedStream, SshError>;

    fn is_closed(&self) -> bool;

    fn id(&self) -> &str;
}

/// Gateway backed by russh
pub struct SshGateway {
    client: SshClient,
}

impl SshGateway {
    pub fn new(config: OverSsh) -> Self {
        Self {
            client: SshClient::new(config),
        }
    }

    pub fn from_client(client: SshClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Gateway for SshGateway {
    async fn establish(&self) -> Result<Arc<dyn GatewaySession>, SshError> {
        let handle = self.client.connect().await?;
        let session = RusshSession::new(handle);
        info!("SSH session {} established via {}", session.id, self.describe());
        Ok(Arc::new(session))
    }

    fn describe(&self) -> String {
        let config = self.client.config();
        format!("{}@{}:{}", config.username, config.host, config.port)
    }
}

pub struct RusshSession {
    id: String,
    handle: Handle<ClientHandler>,
}

impl RusshSession {
    pub fn new(handle: Handle<ClientHandler>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            handle,
        }
    }
}

impl Drop for RusshSession {
    fn drop(&mut self) {
        // Dropping the handle ends the session task
        debug!("Dropping SSH session {}", self.id);
    }
}

#[async_trait]
impl GatewaySession for RusshSession {
    async fn open_channel(self: Arc<Self>, target: &DialTarget) -> Result<BoxedStream, SshError> {
        debug!("Session {}: opening channel to {}", self.id, target);

        let channel = match target {
            DialTarget::Tcp { host, port } => self
                .handle
                .channel_open_direct_tcpip(host.as_str(), *port as u32, "127.0.0.1", 0)
                .await,
            DialTarget::Unix { path } => {
                self.handle
                    .channel_open_direct_streamlocal(path.as_str())
                    .await
            }
        }
        .map_err(|e| {
            SshError::ChannelError(format!("Failed to open channel to {}: {}", target, e))
        })?;

        Ok(Box::new(TunnelStream {
            inner: Box::pin(channel.into_stream()),
            _session: self,
        }))
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// A logical channel as a byte stream.
///
/// Holds its session so the SSH transport outlives the pool slot or dialer
/// that created it.
pub struct TunnelStream {
    inner: Pin<Box<ChannelStream<Msg>>>,
    _session: Arc<RusshSession>,
}

impl AsyncRead for TunnelStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.inner.as_mut().poll_read(cx, buf)
    }
}

impl AsyncWrite for TunnelStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.inner.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.inner.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.inner.as_mut().poll_shutdown(cx)
    }
}
