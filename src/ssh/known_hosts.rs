//! Known hosts verification for SSH gateways
//!
//! Read-only view of an OpenSSH `known_hosts` file. Used when the gateway is
//! configured with [`HostKeyPolicy::KnownHosts`](super::HostKeyPolicy).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use russh::keys::{PublicKey, PublicKeyBase64};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::client::expand_tilde;
use super::error::SshError;

/// Result of host key verification
#[derive(Debug, Clone, PartialEq)]
pub enum HostKeyVerification {
    /// Key matches a known_hosts entry
    Verified,
    /// No entry for this host and key type
    Unknown { fingerprint: String },
    /// Entry exists with a different key (potential MITM)
    Changed {
        expected_fingerprint: String,
        actual_fingerprint: String,
    },
}

/// (key_type, base64_key)
#[derive(Clone, Debug)]
struct HostKeyEntry {
    key_type: String,
    key_data: String,
}

pub struct KnownHostsStore {
    /// `host` for port 22, `[host]:port` otherwise
    hosts: HashMap<String, Vec<HostKeyEntry>>,
    path: PathBuf,
}

impl KnownHostsStore {
    /// `~/.ssh/known_hosts`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".ssh").join("known_hosts"))
            .unwrap_or_else(|| PathBuf::from("~/.ssh/known_hosts"))
    }

    /// Load a known_hosts file, expanding a leading `~`.
    /// A missing file yields an empty store, which rejects every host.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SshError> {
        let path = PathBuf::from(expand_tilde(&path.as_ref().to_string_lossy()));
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("known_hosts not found at {:?}; every host will be rejected", path);
                String::new()
            }
            Err(e) => {
                return Err(SshError::ConnectionFailed(format!(
                    "Failed to read known_hosts {:?}: {}",
                    path, e
                )))
            }
        };

        Ok(Self::parse(&content, path))
    }

    fn parse(content: &str, path: PathBuf) -> Self {
        let mut hosts: HashMap<String, Vec<HostKeyEntry>> = HashMap::new();
        let mut entry_count = 0;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // hostname[,alias] keytype base64key [comment]
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                continue;
            }
            // @cert-authority / @revoked markers are not handled
            if parts[0].starts_with('@') {
                continue;
            }

            let entry = HostKeyEntry {
                key_type: parts[1].to_string(),
                key_data: parts[2].to_string(),
            };

            for hostname in parts[0].split(',') {
                // Hashed hostnames (|1|...) are skipped
                if hostname.starts_with('|') {
                    continue;
                }
                hosts
                    .entry(Self::normalize_hostname(hostname))
                    .or_default()
                    .push(entry.clone());
                entry_count += 1;
            }
        }

        info!(
            "Loaded {} known host entries ({} unique hosts) from {:?}",
            entry_count,
            hosts.len(),
            path
        );
        Self { hosts, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercase, and fold `[host]:22` into `host`
    fn normalize_hostname(host: &str) -> String {
        let host = host.to_lowercase();
        if let Some(rest) = host.strip_prefix('[') {
            if let Some((name, port)) = rest.split_once("]:") {
                if port == "22" {
                    return name.to_string();
                }
                return format!("[{}]:{}", name, port);
            }
            return rest.trim_end_matches(']').to_string();
        }
        host
    }

    /// Lookup key for host:port
    fn make_key(host: &str, port: u16) -> String {
        let host = host.to_lowercase();
        if port == 22 {
            host
        } else {
            format!("[{}]:{}", host, port)
        }
    }

    /// SHA256 fingerprint of a public key
    pub fn fingerprint(key: &PublicKey) -> String {
        Self::fingerprint_bytes(&key.public_key_bytes())
    }

    fn fingerprint_bytes(bytes: &[u8]) -> String {
        let hash = Sha256::digest(bytes);
        format!("SHA256:{}", BASE64.encode(hash).trim_end_matches('='))
    }

    fn fingerprint_b64(stored_b64: &str) -> String {
        BASE64
            .decode(stored_b64)
            .map(|bytes| Self::fingerprint_bytes(&bytes))
            .unwrap_or_else(|_| "unknown".to_string())
    }

    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> HostKeyVerification {
        let lookup_key = Self::make_key(host, port);
        let actual_b64 = BASE64.encode(key.public_key_bytes());
        let actual_type = key.algorithm().as_str().to_string();
        let fingerprint = Self::fingerprint(key);

        let Some(entries) = self.hosts.get(&lookup_key) else {
            debug!("Unknown host: {}", lookup_key);
            return HostKeyVerification::Unknown { fingerprint };
        };

        for entry in entries.iter().filter(|e| e.key_type == actual_type) {
            if entry.key_data == actual_b64 {
                debug!("Host key verified for {} (type: {})", lookup_key, actual_type);
                return HostKeyVerification::Verified;
            }
        }

        match entries.iter().find(|e| e.key_type == actual_type) {
            Some(entry) => {
                let expected_fingerprint = Self::fingerprint_b64(&entry.key_data);
                warn!(
                    "HOST KEY CHANGED for {} (type: {})! Expected {}, got {}",
                    lookup_key, actual_type, expected_fingerprint, fingerprint
                );
                HostKeyVerification::Changed {
                    expected_fingerprint,
                    actual_fingerprint: fingerprint,
                }
            }
            None => {
                debug!(
                    "Host {} known but no {} key stored",
                    lookup_key, actual_type
                );
                HostKeyVerification::Unknown { fingerprint }
            }
        }
    }
}
