//! HTTP transport used by provider clients.
//!
//! The transport performs exactly one POST and reports the status and raw
//! body. Status interpretation, retries and envelope parsing live in
//! [`ProviderClient`](super::client::ProviderClient).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ProviderError, ProviderResult};

/// A fully-built JSON POST request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// Status and body of an HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for issuing a single HTTP request
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST the request body as JSON; network failures map to `Transport`
    async fn post_json(&self, request: &HttpRequest) -> ProviderResult<HttpReply>;
}

/// Transport backed by a shared `reqwest::Client`
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(&self, request: &HttpRequest) -> ProviderResult<HttpReply> {
        let mut builder = self.client.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpReply { status, body })
    }
}
