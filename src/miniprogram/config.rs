//! Mini-program configuration

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://api.weixin.qq.com";

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniProgramConfig {
    #[serde(default)]
    pub app_id: String,

    /// Scheme and host every endpoint is resolved against
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for MiniProgramConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            api_base: default_api_base(),
        }
    }
}

impl MiniProgramConfig {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            ..Default::default()
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Full URL for `path`, authenticated with `access_token`
    pub fn endpoint(&self, path: &str, access_token: &str) -> String {
        format!(
            "{}{}?access_token={}",
            self.api_base.trim_end_matches('/'),
            path,
            access_token
        )
    }
}
