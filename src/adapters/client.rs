//! Provider client: one generation request with bounded retry.
//!
//! A [`ProviderClient`] pairs a [`WireFormat`] (how a backend wants its
//! request shaped and where it puts the answer) with a [`Transport`].
//! Configuration is validated once at construction; retries only cover
//! transport failures and non-success statuses.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use super::transport::{HttpRequest, Transport};
use crate::config::ProviderConfig;
use crate::core::RetryPolicy;
use crate::error::{ProviderError, ProviderResult};

/// Role tag of a prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
}

/// One role-tagged message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// An instruction payload: ordered role-tagged messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    pub messages: Vec<Message>,
}

impl Prompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message {
            role: Role::System,
            content: content.into(),
        });
        self
    }

    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message {
            role: Role::User,
            content: content.into(),
        });
        self
    }

    /// System messages joined by blank lines, if any
    pub fn system_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }

    pub fn user_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role == Role::User)
    }
}

/// Endpoint settings that survived validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub endpoint: String,
    pub credential: String,
    pub model: String,
}

/// Request shape and response envelope of one backend
pub trait WireFormat: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &'static str;

    /// Environment variables that supply the required settings
    fn config_hint(&self) -> &'static str;

    /// Build the HTTP request; `schema` requests structured (JSON) output
    fn build_request(&self, target: &Target, prompt: &Prompt, schema: Option<&Value>) -> HttpRequest;

    /// Pull the generated text out of a parsed response body
    fn extract_text(&self, body: &Value) -> ProviderResult<String>;
}

/// Issues generation requests against one backend
pub struct ProviderClient {
    wire: Box<dyn WireFormat>,
    transport: Arc<dyn Transport>,
    target: Target,
    retry: RetryPolicy,
}

impl ProviderClient {
    /// Validate `config` and build a client
    ///
    /// Fails with `ProviderError::Configuration` when the endpoint,
    /// credential or model is missing, or the retry bound is zero.
    pub fn new(
        config: ProviderConfig,
        wire: impl WireFormat + 'static,
        transport: Arc<dyn Transport>,
    ) -> ProviderResult<Self> {
        let missing = |field: &str| {
            ProviderError::Configuration(format!(
                "{} {} not set. Please set {}",
                wire.name(),
                field,
                wire.config_hint()
            ))
        };

        let endpoint = non_empty(config.endpoint).ok_or_else(|| missing("endpoint"))?;
        let credential = non_empty(config.credential).ok_or_else(|| missing("credential"))?;
        let model = non_empty(config.model_name).ok_or_else(|| missing("model name"))?;

        if config.retry.max_attempts == 0 {
            return Err(ProviderError::Configuration(format!(
                "{} retry limit must be at least 1",
                wire.name()
            )));
        }

        Ok(Self {
            wire: Box::new(wire),
            transport,
            target: Target {
                endpoint,
                credential,
                model,
            },
            retry: config.retry,
        })
    }

    pub fn name(&self) -> &'static str {
        self.wire.name()
    }

    pub fn model(&self) -> &str {
        &self.target.model
    }

    /// Send a prompt and return the raw generated text
    ///
    /// With `schema` set, the backend is asked for JSON matching it; the
    /// returned text is still unparsed.
    pub async fn send(&self, prompt: &Prompt, schema: Option<&Value>) -> ProviderResult<String> {
        let request = self.wire.build_request(&self.target, prompt, schema);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(
                provider = self.name(),
                model = self.model(),
                attempt,
                structured = schema.is_some(),
                "Sending request"
            );

            match self.attempt(&request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        provider = self.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(provider = self.name(), attempt, error = %e, "Request failed permanently");
                    return Err(e);
                }
            }
        }
    }

    async fn attempt(&self, request: &HttpRequest) -> ProviderResult<String> {
        let reply = self.transport.post_json(request).await?;

        if !reply.is_success() {
            return Err(ProviderError::Provider {
                status: reply.status,
                body: reply.body,
            });
        }

        let body: Value = serde_json::from_str(&reply.body).map_err(|e| {
            ProviderError::malformed(format!("{} returned a non-JSON body: {}", self.name(), e))
        })?;

        self.wire.extract_text(&body)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
