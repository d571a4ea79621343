use std::sync::Arc;

use super::config::MiniProgramConfig;
use crate::credential::AccessTokenProvider;
use crate::http::{ApiError, HttpClient, ReqwestClient};

/// Shared state for mini-program API calls
#[derive(Clone)]
pub struct MiniProgramContext {
    config: MiniProgramConfig,
    token: Arc<dyn AccessTokenProvider>,
    http: Arc<dyn HttpClient>,
}

impl MiniProgramContext {
    pub fn new(
        config: MiniProgramConfig,
        token: Arc<dyn AccessTokenProvider>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            config,
            token,
            http,
        }
    }

    /// Context using a default reqwest transport
    pub fn with_default_http(
        config: MiniProgramConfig,
        token: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self, ApiError> {
        Ok(Self::new(config, token, Arc::new(ReqwestClient::new()?)))
    }

    pub fn config(&self) -> &MiniProgramConfig {
        &self.config
    }

    pub fn http(&self) -> &dyn HttpClient {
        self.http.as_ref()
    }

    pub async fn access_token(&self) -> Result<String, ApiError> {
        self.token.access_token().await
    }

    /// Fetch a token and build the authenticated URL for `path`
    pub async fn authed_url(&self, path: &str) -> Result<String, ApiError> {
        let token = self.access_token().await?;
        Ok(self.config.endpoint(path, &token))
    }
}
