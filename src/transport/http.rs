//! Raw HTTP GET primitive and its reqwest implementation.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::RecoverableError;

/// Status code plus raw body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
  pub status: u16,
  pub body: String,
}

impl RawResponse {
  pub fn new(status: u16, body: impl Into<String>) -> Self {
    Self {
      status,
      body: body.into(),
    }
  }
}

/// Performs a GET against a fully resolved URL.
///
/// Only transport-level failures (connect, timeout, body read) are errors
/// here; any status code the server answers with is a successful call.
#[async_trait]
pub trait HttpGet: Send + Sync {
  async fn get(
    &self,
    url: &str,
    headers: &BTreeMap<String, String>,
  ) -> Result<RawResponse, RecoverableError>;
}

/// `HttpGet` backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestHttp {
  client: reqwest::Client,
}

impl ReqwestHttp {
  /// Build a client whose requests give up after `timeout`.
  pub fn new(timeout: Duration) -> Result<Self, RecoverableError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| RecoverableError::Network(format!("Failed to build HTTP client: {}", e)))?;

    Ok(Self { client })
  }

  /// Wrap an already configured client.
  pub fn with_client(client: reqwest::Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl HttpGet for ReqwestHttp {
  async fn get(
    &self,
    url: &str,
    headers: &BTreeMap<String, String>,
  ) -> Result<RawResponse, RecoverableError> {
    let mut request = self.client.get(url);
    for (name, value) in headers {
      request = request.header(name.as_str(), value.as_str());
    }

    let response = request
      .send()
      .await
      .map_err(|e| RecoverableError::Network(format!("GET {} failed: {}", url, e)))?;

    let status = response.status().as_u16();
    let body = response
      .text()
      .await
      .map_err(|e| RecoverableError::Network(format!("Failed to read body of {}: {}", url, e)))?;

    Ok(RawResponse { status, body })
  }
}
