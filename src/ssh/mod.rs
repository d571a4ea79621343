//! SSH module - tunnels connections through an SSH gateway
//!
//! This module provides the tunneled connection factory using the russh library.
//!
//! # Features
//! - Password and public-key authentication
//! - `direct-tcpip` and `direct-streamlocal` channels exposed as byte streams
//! - Per-dial sessions by default, opt-in pooled session
//! - Optional host key verification via an OpenSSH known_hosts file

mod client;
mod config;
mod dialer;
mod error;
pub mod known_hosts;
mod session;

pub use client::{load_private_key, ClientHandler, HostKeyCheck, SshClient};
pub use config::{HostKeyPolicy, OverSsh, SessionStrategy, SshAuthMethod};
pub use dialer::TunnelDialer;
pub use error::{SshError, SshErrorKind};
pub use known_hosts::{HostKeyVerification, KnownHostsStore};
pub use session::{Gateway, GatewaySession, RusshSession, SshGateway, TunnelStream};
