//! SSH gateway configuration

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How the gateway authenticates us.
///
/// Serialized as the numeric codes used by existing config files:
/// `1` = public key, `2` = password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SshAuthMethod {
    PublicKey,
    Password,
}

impl From<SshAuthMethod> for u8 {
    fn from(method: SshAuthMethod) -> Self {
        match method {
            SshAuthMethod::PublicKey => 1,
            SshAuthMethod::Password => 2,
        }
    }
}

impl TryFrom<u8> for SshAuthMethod {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(SshAuthMethod::PublicKey),
            2 => Ok(SshAuthMethod::Password),
            other => Err(format!("unknown auth_method {} (expected 1 or 2)", other)),
        }
    }
}

/// Host identity verification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// Accept any host key. Trusts the network path; open to host-key spoofing.
    #[default]
    InsecureIgnore,

    /// Verify against an OpenSSH known_hosts file (default `~/.ssh/known_hosts`).
    /// Unknown and changed keys are rejected.
    KnownHosts {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
}

/// Session lifecycle across dials
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStrategy {
    /// A brand-new SSH session for every dial
    #[default]
    PerDial,

    /// Reuse one SSH session across dials, replacing it once it closes.
    /// Behavioral change from `PerDial`: channels share a transport.
    Pooled,
}

/// SSH gateway that tunnels connections to the target service
#[derive(Clone, Serialize, Deserialize)]
pub struct OverSsh {
    /// Gateway host
    pub host: String,

    /// Gateway port (default: 22)
    #[serde(default = "default_port")]
    pub port: u16,

    pub auth_method: SshAuthMethod,

    pub username: String,

    /// Used when `auth_method` is `Password`
    #[serde(default)]
    pub password: String,

    /// Private key path, used when `auth_method` is `PublicKey`
    #[serde(default)]
    pub key_file: String,

    /// Passphrase for an encrypted private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,

    /// Handshake timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,

    #[serde(default)]
    pub session_strategy: SessionStrategy,
}

impl fmt::Debug for OverSsh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverSsh")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("auth_method", &self.auth_method)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("key_file", &self.key_file)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .field("host_key_policy", &self.host_key_policy)
            .field("session_strategy", &self.session_strategy)
            .finish()
    }
}

impl OverSsh {
    pub fn with_password(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            auth_method: SshAuthMethod::Password,
            username: username.into(),
            password: password.into(),
            key_file: String::new(),
            passphrase: None,
            timeout_secs: default_timeout(),
            host_key_policy: HostKeyPolicy::default(),
            session_strategy: SessionStrategy::default(),
        }
    }

    pub fn with_key_file(
        host: impl Into<String>,
        username: impl Into<String>,
        key_file: impl Into<String>,
    ) -> Self {
        Self {
            auth_method: SshAuthMethod::PublicKey,
            password: String::new(),
            key_file: key_file.into(),
            ..Self::with_password(host, username, "")
        }
    }

    /// Set custom port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn session_strategy(mut self, strategy: SessionStrategy) -> Self {
        self.session_strategy = strategy;
        self
    }

    pub fn host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    pub fn gateway_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_port() -> u16 {
    22
}

fn default_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_numeric_auth_method() {
        let json = r#"{
            "host": "bastion.example.com",
            "port": 2222,
            "auth_method": 1,
            "username": "deploy",
            "key_file": "/home/deploy/.ssh/id_ed25519"
        }"#;
        let cfg: OverSsh = serde_json::from_str(json).unwrap();

        assert_eq!(cfg.auth_method, SshAuthMethod::PublicKey);
        assert_eq!(cfg.port, 2222);
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.host_key_policy, HostKeyPolicy::InsecureIgnore);
        assert_eq!(cfg.session_strategy, SessionStrategy::PerDial);
        assert_eq!(cfg.gateway_addr(), "bastion.example.com:2222");
    }

    #[test]
    fn test_reject_unknown_auth_method() {
        let json = r#"{"host": "h", "auth_method": 3, "username": "u"}"#;
        assert!(serde_json::from_str::<OverSsh>(json).is_err());
    }

    #[test]
    fn test_auth_method_serializes_as_code() {
        let cfg = OverSsh::with_password("h", "u", "p");
        let value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(value["auth_method"], 2);
        assert_eq!(value["port"], 22);
        assert_eq!(value["session_strategy"], "per_dial");
        assert_eq!(value["host_key_policy"]["mode"], "insecure_ignore");
    }

    #[test]
    fn test_known_hosts_policy_roundtrip() {
        let json = r#"{"mode": "known_hosts", "path": "/etc/ssh/ssh_known_hosts"}"#;
        let policy: HostKeyPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(
            policy,
            HostKeyPolicy::KnownHosts {
                path: Some(PathBuf::from("/etc/ssh/ssh_known_hosts"))
            }
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut cfg = OverSsh::with_password("bastion", "ops", "hunter2");
        cfg.passphrase = Some("open sesame".into());
        let printed = format!("{:?}", cfg);

        assert!(printed.contains("bastion"));
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("open sesame"));
    }

    #[test]
    fn test_key_file_builder() {
        let cfg = OverSsh::with_key_file("bastion", "ops", "~/.ssh/id_rsa")
            .port(2200)
            .session_strategy(SessionStrategy::Pooled);
        assert_eq!(cfg.auth_method, SshAuthMethod::PublicKey);
        assert_eq!(cfg.key_file, "~/.ssh/id_rsa");
        assert!(cfg.password.is_empty());
        assert_eq!(cfg.port, 2200);
        assert_eq!(cfg.session_strategy, SessionStrategy::Pooled);
    }
}
