//! API error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to obtain access token: {0}")]
    Token(String),

    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("{api}: failed to decode response: {source}")]
    Decode {
        api: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{api} error: errcode={code}, errmsg={msg}")]
    Common { api: String, code: i64, msg: String },
}

impl ApiError {
    /// Platform error code, when the call reached the API and was refused
    pub fn code(&self) -> Option<i64> {
        match self {
            ApiError::Common { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest includes the URL, which carries the access token
        ApiError::Transport(err.without_url().to_string())
    }
}

/// `{errcode, errmsg}` envelope present on every API response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonError {
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
}

impl CommonError {
    pub fn is_ok(&self) -> bool {
        self.errcode == 0
    }

    pub fn check(&self, api: &str) -> Result<(), ApiError> {
        if self.is_ok() {
            return Ok(());
        }
        Err(ApiError::Common {
            api: api.to_string(),
            code: self.errcode,
            msg: self.errmsg.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_error_defaults() {
        let ok: CommonError = serde_json::from_str("{}").unwrap();
        assert!(ok.is_ok());
        assert!(ok.check("Ping").is_ok());

        let failed: CommonError =
            serde_json::from_str(r#"{"errcode":40001,"errmsg":"invalid credential"}"#).unwrap();
        let err = failed.check("CreateActivityID").unwrap_err();
        assert_eq!(err.code(), Some(40001));
        assert_eq!(
            err.to_string(),
            "CreateActivityID error: errcode=40001, errmsg=invalid credential"
        );
    }
}
