//! Pluggable dialing
//!
//! A [`Dialer`] turns `(network, address)` into a byte stream. The cache pool
//! dials through one, so Redis can be reached directly over TCP or through an
//! SSH tunnel ([`crate::ssh::TunnelDialer`]).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::context::{CallContext, ContextError};
use crate::ssh::SshError;

/// Any bidirectional async byte stream
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

pub type BoxedStream = Box<dyn AsyncStream>;

#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error(transparent)]
    Ssh(#[from] SshError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Dial cancelled")]
    Cancelled,

    #[error("Dial timed out after {0:?}")]
    Timeout(Duration),
}

impl From<ContextError> for DialError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => DialError::Cancelled,
            ContextError::TimedOut(limit) => DialError::Timeout(limit),
        }
    }
}

/// Network families a dialer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Tcp,
    Unix,
}

impl Network {
    pub fn parse(network: &str) -> Option<Self> {
        match network {
            "tcp" | "tcp4" | "tcp6" => Some(Network::Tcp),
            "unix" => Some(Network::Unix),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Tcp => f.write_str("tcp"),
            Network::Unix => f.write_str("unix"),
        }
    }
}

/// Where a dial should land
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialTarget {
    Tcp { host: String, port: u16 },
    Unix { path: String },
}

impl DialTarget {
    /// Parse `(network, address)`. TCP addresses are `host:port` or `[v6]:port`.
    pub fn parse(network: &str, address: &str) -> Result<Self, DialError> {
        let network = Network::parse(network)
            .ok_or_else(|| DialError::UnsupportedNetwork(network.to_string()))?;

        match network {
            Network::Unix => Ok(DialTarget::Unix {
                path: address.to_string(),
            }),
            Network::Tcp => {
                let invalid = |reason: &str| DialError::InvalidAddress {
                    address: address.to_string(),
                    reason: reason.to_string(),
                };

                let (host, port) = address
                    .rsplit_once(':')
                    .ok_or_else(|| invalid("missing port"))?;
                let host = host
                    .strip_prefix('[')
                    .and_then(|h| h.strip_suffix(']'))
                    .unwrap_or(host);
                if host.is_empty() {
                    return Err(invalid("missing host"));
                }
                let port = port.parse::<u16>().map_err(|_| invalid("bad port"))?;

                Ok(DialTarget::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
        }
    }

    pub fn network(&self) -> Network {
        match self {
            DialTarget::Tcp { .. } => Network::Tcp,
            DialTarget::Unix { .. } => Network::Unix,
        }
    }
}

impl fmt::Display for DialTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialTarget::Tcp { host, port } if host.contains(':') => {
                write!(f, "tcp://[{}]:{}", host, port)
            }
            DialTarget::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            DialTarget::Unix { path } => write!(f, "unix://{}", path),
        }
    }
}

#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(
        &self,
        ctx: &CallContext,
        network: &str,
        address: &str,
    ) -> Result<BoxedStream, DialError>;
}

/// Plain socket dialer
#[derive(Debug, Clone, Default)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(
        &self,
        ctx: &CallContext,
        network: &str,
        address: &str,
    ) -> Result<BoxedStream, DialError> {
        let target = DialTarget::parse(network, address)?;
        debug!("Dialing {} directly", target);

        match target {
            DialTarget::Tcp { host, port } => {
                let stream = ctx
                    .run(tokio::net::TcpStream::connect((host.as_str(), port)))
                    .await??;
                stream.set_nodelay(true)?;
                Ok(Box::new(stream))
            }
            #[cfg(unix)]
            DialTarget::Unix { path } => {
                let stream = ctx.run(tokio::net::UnixStream::connect(path)).await??;
                Ok(Box::new(stream))
            }
            #[cfg(not(unix))]
            DialTarget::Unix { .. } => Err(DialError::UnsupportedNetwork("unix".into())),
        }
    }
}
