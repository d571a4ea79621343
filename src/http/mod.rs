//! HTTP transport and response decoding for platform API calls

mod error;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

pub use error::{ApiError, CommonError};

/// Raw request/response transport.
///
/// Implementations return the body of a 2xx response and an error otherwise.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<Vec<u8>, ApiError>;

    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, ApiError>;
}

/// URL with its query string removed, safe for logs
pub fn redact_url(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

/// [`HttpClient`] backed by reqwest
#[derive(Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Result<Self, ApiError> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn read_body(url: &str, response: reqwest::Response) -> Result<Vec<u8>, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: redact_url(url).to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        debug!("{} -> {} ({} bytes)", redact_url(url), status, bytes.len());
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        debug!("GET {}", redact_url(url));
        let response = self.client.get(url).send().await?;
        Self::read_body(url, response).await
    }

    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, ApiError> {
        debug!("POST {}", redact_url(url));
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json;charset=utf-8")
            .body(body)
            .send()
            .await?;
        Self::read_body(url, response).await
    }
}

/// Serialize `payload` as JSON and POST it
pub async fn post_json<T>(client: &dyn HttpClient, url: &str, payload: &T) -> Result<Vec<u8>, ApiError>
where
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(payload).map_err(ApiError::Encode)?;
    client.post_json(url, body).await
}

/// Decode `body` into `T`, failing with [`ApiError::Common`] on a non-zero errcode
pub fn decode_with_error<T: DeserializeOwned>(body: &[u8], api: &str) -> Result<T, ApiError> {
    // Error bodies usually omit the payload fields
    decode_with_common_error(body, api)?;
    serde_json::from_slice(body).map_err(|source| ApiError::Decode {
        api: api.to_string(),
        source,
    })
}

/// Decode only the `{errcode, errmsg}` envelope
pub fn decode_with_common_error(body: &[u8], api: &str) -> Result<(), ApiError> {
    let common: CommonError = serde_json::from_slice(body).map_err(|source| ApiError::Decode {
        api: api.to_string(),
        source,
    })?;
    common.check(api)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Ticket {
        ticket: String,
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("https://api.weixin.qq.com/cgi-bin/x?access_token=SECRET"),
            "https://api.weixin.qq.com/cgi-bin/x"
        );
        assert_eq!(redact_url("https://example.com/a"), "https://example.com/a");
    }

    #[test]
    fn test_decode_with_error() {
        let ok: Ticket = decode_with_error(br#"{"errcode":0,"ticket":"t1"}"#, "GetTicket").unwrap();
        assert_eq!(ok.ticket, "t1");

        let err = decode_with_error::<Ticket>(
            br#"{"errcode":45009,"errmsg":"api freq out of limit"}"#,
            "GetTicket",
        )
        .unwrap_err();
        assert_eq!(err.code(), Some(45009));

        let err = decode_with_error::<Ticket>(br#"{"errcode":0,"errmsg":"ok"}"#, "GetTicket")
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));

        let err = decode_with_error::<Ticket>(b"<html>", "GetTicket").unwrap_err();
        assert!(matches!(err, ApiError::Decode { ref api, .. } if api == "GetTicket"));
    }

    #[test]
    fn test_decode_with_common_error() {
        decode_with_common_error(br#"{"errcode":0,"errmsg":"ok"}"#, "Send").unwrap();

        let err = decode_with_common_error(br#"{"errcode":-1,"errmsg":"system error"}"#, "Send")
            .unwrap_err();
        assert!(matches!(err, ApiError::Common { code: -1, ref msg, .. } if msg == "system error"));
    }
}
