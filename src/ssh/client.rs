//! SSH gateway client implementation using russh

use std::sync::Arc;
use std::time::Duration;

use russh::client;
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::{PrivateKey, PublicKey};
use tracing::{debug, info, warn};

use super::config::{HostKeyPolicy, OverSsh, SshAuthMethod};
use super::error::SshError;
use super::known_hosts::{HostKeyVerification, KnownHostsStore};

/// Expand ~ to home directory; russh::keys doesn't handle tilde
pub(crate) fn expand_tilde(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped).to_string_lossy().into_owned();
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home.to_string_lossy().into_owned();
        }
    }
    path.to_string()
}

/// Read and parse a private key file.
///
/// Touches only the file system, so a bad key is reported before any
/// connection is attempted.
pub async fn load_private_key(path: &str, passphrase: Option<&str>) -> Result<PrivateKey, SshError> {
    let expanded = expand_tilde(path);

    let pem = tokio::fs::read_to_string(&expanded)
        .await
        .map_err(|e| SshError::KeyLoad {
            path: expanded.clone(),
            reason: e.to_string(),
        })?;

    russh::keys::decode_secret_key(&pem, passphrase).map_err(|e| SshError::KeyLoad {
        path: expanded,
        reason: e.to_string(),
    })
}

/// Credential material resolved before the handshake
enum Credentials {
    Password(String),
    Key(Arc<PrivateKey>),
}

/// Establishes authenticated sessions to one SSH gateway
pub struct SshClient {
    config: OverSsh,
    known_hosts: Option<Arc<KnownHostsStore>>,
}

impl SshClient {
    pub fn new(config: OverSsh) -> Self {
        Self {
            config,
            known_hosts: None,
        }
    }

    /// Use a preloaded known_hosts store instead of reading one per connect
    pub fn with_known_hosts(mut self, store: Arc<KnownHostsStore>) -> Self {
        self.known_hosts = Some(store);
        self
    }

    pub fn config(&self) -> &OverSsh {
        &self.config
    }

    async fn credentials(&self) -> Result<Credentials, SshError> {
        match self.config.auth_method {
            SshAuthMethod::Password => Ok(Credentials::Password(self.config.password.clone())),
            SshAuthMethod::PublicKey => {
                let key =
                    load_private_key(&self.config.key_file, self.config.passphrase.as_deref())
                        .await?;
                Ok(Credentials::Key(Arc::new(key)))
            }
        }
    }

    async fn handler(&self) -> Result<ClientHandler, SshError> {
        let check = match &self.config.host_key_policy {
            HostKeyPolicy::InsecureIgnore => HostKeyCheck::Insecure,
            HostKeyPolicy::KnownHosts { path } => match &self.known_hosts {
                Some(store) => HostKeyCheck::KnownHosts(store.clone()),
                None => {
                    let path = path.clone().unwrap_or_else(KnownHostsStore::default_path);
                    HostKeyCheck::KnownHosts(Arc::new(KnownHostsStore::load(path).await?))
                }
            },
        };
        Ok(ClientHandler::new(self.config.host.clone(), self.config.port, check))
    }

    /// Connect to the gateway and authenticate.
    ///
    /// `timeout_secs` bounds the handshake and authentication together.
    pub async fn connect(&self) -> Result<client::Handle<ClientHandler>, SshError> {
        // Key material first: a broken key must fail without network I/O
        let credentials = self.credentials().await?;
        let handler = self.handler().await?;

        let addr = self.config.gateway_addr();
        let limit = Duration::from_secs(self.config.timeout_secs);
        tokio::time::timeout(limit, self.establish(&addr, credentials, handler))
            .await
            .map_err(|_| {
                SshError::Timeout(format!("Connection to {} timed out after {:?}", addr, limit))
            })?
    }

    async fn establish(
        &self,
        addr: &str,
        credentials: Credentials,
        handler: ClientHandler,
    ) -> Result<client::Handle<ClientHandler>, SshError> {
        info!("Connecting to SSH gateway at {}", addr);

        let ssh_config = client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        };

        let mut handle = client::connect(
            Arc::new(ssh_config),
            (self.config.host.as_str(), self.config.port),
            handler,
        )
        .await
        .map_err(|e| match e {
            rejected @ SshError::HostKeyRejected { .. } => rejected,
            other => SshError::ConnectionFailed(other.to_string()),
        })?;

        debug!("SSH handshake with {} completed", addr);

        let authenticated = match credentials {
            Credentials::Password(password) => handle
                .authenticate_password(&self.config.username, password)
                .await
                .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?,
            Credentials::Key(key) => {
                debug!("Authenticating with key: {}", self.config.key_file);
                let key_with_hash = PrivateKeyWithHashAlg::new(key, None);
                handle
                    .authenticate_publickey(&self.config.username, key_with_hash)
                    .await
                    .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?
            }
        };

        if !authenticated.success() {
            return Err(SshError::AuthenticationFailed(format!(
                "Authentication to {} rejected for user {}",
                addr, self.config.username
            )));
        }

        info!("Authenticated to SSH gateway {}", addr);
        Ok(handle)
    }
}

/// How the handler treats the server's host key
#[derive(Clone)]
pub enum HostKeyCheck {
    Insecure,
    KnownHosts(Arc<KnownHostsStore>),
}

/// Client handler for russh callbacks
pub struct ClientHandler {
    host: String,
    port: u16,
    check: HostKeyCheck,
}

impl ClientHandler {
    pub fn new(host: String, port: u16, check: HostKeyCheck) -> Self {
        Self { host, port, check }
    }

    fn evaluate(&self, server_public_key: &PublicKey) -> Result<bool, SshError> {
        let store = match &self.check {
            HostKeyCheck::Insecure => {
                warn!(
                    "Host key verification disabled for {}:{} (fingerprint: {})",
                    self.host,
                    self.port,
                    KnownHostsStore::fingerprint(server_public_key)
                );
                return Ok(true);
            }
            HostKeyCheck::KnownHosts(store) => store,
        };

        match store.verify(&self.host, self.port, server_public_key) {
            HostKeyVerification::Verified => {
                info!("Host key verified for {}:{}", self.host, self.port);
                Ok(true)
            }
            HostKeyVerification::Unknown { fingerprint } => Err(SshError::HostKeyRejected {
                host: self.host.clone(),
                port: self.port,
                reason: format!(
                    "unknown host, fingerprint {} not in {:?}",
                    fingerprint,
                    store.path()
                ),
            }),
            HostKeyVerification::Changed {
                expected_fingerprint,
                actual_fingerprint,
            } => Err(SshError::HostKeyRejected {
                host: self.host.clone(),
                port: self.port,
                reason: format!(
                    "key changed (expected {}, got {}); possible man-in-the-middle",
                    expected_fingerprint, actual_fingerprint
                ),
            }),
        }
    }
}

impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        self.evaluate(server_public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KEY_A: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIOWAR1ZCAtb8QfpXlmqGOt/WEsmo7KeJfTAOSuInQikI";
    const KEY_B: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIPbGPfx01Fc5rPOaIRPGMAn9hq3hZlg4UiECJ+0bJBrT";

    fn public_key(b64: &str) -> PublicKey {
        russh::keys::parse_public_key_base64(b64).unwrap()
    }

    #[tokio::test]
    async fn test_missing_key_file_is_key_load() {
        let err = load_private_key("/definitely/not/here/id_ed25519", None)
            .await
            .err()
            .expect("missing key must fail");
        assert!(err.is_key_load(), "{}", err);
    }

    #[tokio::test]
    async fn test_garbage_key_file_is_key_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not a private key").unwrap();

        let err = load_private_key(file.path().to_str().unwrap(), None)
            .await
            .err()
            .expect("garbage key must fail");
        assert!(err.is_key_load(), "{}", err);
    }

    #[tokio::test]
    async fn test_connect_fails_on_key_before_network() {
        // TEST-NET-1: a real connect attempt would hang until the timeout
        let config = OverSsh::with_key_file("192.0.2.1", "ops", "/definitely/not/here/id_rsa");
        let client = SshClient::new(config);

        let result =
            tokio::time::timeout(Duration::from_secs(2), client.connect()).await;
        let err = result
            .expect("key failure must not wait on the network")
            .err()
            .expect("connect must fail");
        assert!(err.is_key_load(), "{}", err);
    }

    #[tokio::test]
    async fn test_silent_gateway_times_out() {
        // Accepts the TCP connection but never speaks SSH
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let mut config = OverSsh::with_password("127.0.0.1", "ops", "pw").port(port);
        config.timeout_secs = 1;
        let client = SshClient::new(config);

        let err = tokio::time::timeout(Duration::from_secs(5), client.connect())
            .await
            .expect("connect must honor timeout_secs")
            .err()
            .expect("connect must fail");
        assert!(matches!(err, SshError::Timeout(_)), "{}", err);
        assert_eq!(err.kind(), crate::ssh::SshErrorKind::Dial);
        server.abort();
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/etc/ssh/key"), "/etc/ssh/key");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_tilde("~/.ssh/id_rsa"),
                home.join(".ssh/id_rsa").to_string_lossy()
            );
        }
    }

    #[test]
    fn test_insecure_accepts_any_key() {
        let handler = ClientHandler::new("gw".into(), 22, HostKeyCheck::Insecure);
        assert!(handler.evaluate(&public_key(KEY_A)).unwrap());
    }

    #[tokio::test]
    async fn test_known_hosts_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");
        std::fs::write(&path, format!("gw ssh-ed25519 {}\n", KEY_A)).unwrap();
        let store = Arc::new(KnownHostsStore::load(&path).await.unwrap());

        let handler = ClientHandler::new("gw".into(), 22, HostKeyCheck::KnownHosts(store.clone()));
        assert!(handler.evaluate(&public_key(KEY_A)).unwrap());
        assert!(matches!(
            handler.evaluate(&public_key(KEY_B)),
            Err(SshError::HostKeyRejected { .. })
        ));

        let stranger = ClientHandler::new("other".into(), 22, HostKeyCheck::KnownHosts(store));
        assert!(matches!(
            stranger.evaluate(&public_key(KEY_A)),
            Err(SshError::HostKeyRejected { .. })
        ));
    }
}
