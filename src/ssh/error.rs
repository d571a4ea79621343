//! SSH Error types

use thiserror::Error;

use crate::context::ContextError;

/// Coarse classification callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SshErrorKind {
    /// Handshake, authentication or channel-open failure
    Dial,
    /// Private key file unreadable or unparsable
    KeyLoad,
}

#[derive(Error, Debug)]
pub enum SshError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("SSH protocol error: {0}")]
    ProtocolError(String),

    #[error("Host key rejected for {host}:{port}: {reason}")]
    HostKeyRejected {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Failed to load private key {path}: {reason}")]
    KeyLoad { path: String, reason: String },

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Dial cancelled")]
    Cancelled,
}

impl SshError {
    pub fn kind(&self) -> SshErrorKind {
        match self {
            SshError::KeyLoad { .. } => SshErrorKind::KeyLoad,
            _ => SshErrorKind::Dial,
        }
    }

    pub fn is_key_load(&self) -> bool {
        self.kind() == SshErrorKind::KeyLoad
    }
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        SshError::ProtocolError(err.to_string())
    }
}

impl From<ContextError> for SshError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => SshError::Cancelled,
            ContextError::TimedOut(limit) => {
                SshError::Timeout(format!("dial exceeded caller deadline of {:?}", limit))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let key = SshError::KeyLoad {
            path: "/nope".into(),
            reason: "missing".into(),
        };
        assert_eq!(key.kind(), SshErrorKind::KeyLoad);
        assert!(key.is_key_load());

        for err in [
            SshError::ConnectionFailed("refused".into()),
            SshError::AuthenticationFailed("denied".into()),
            SshError::ChannelError("administratively prohibited".into()),
            SshError::UnsupportedNetwork("udp".into()),
            SshError::Cancelled,
        ] {
            assert_eq!(err.kind(), SshErrorKind::Dial, "{}", err);
        }
    }

    #[test]
    fn test_context_error_maps_to_dial() {
        let err: SshError = ContextError::Cancelled.into();
        assert!(matches!(err, SshError::Cancelled));
        assert_eq!(err.kind(), SshErrorKind::Dial);
    }
}
