//! Google Gemini provider (generateContent REST API).
//!
//! Structured output is requested with `responseMimeType:
//! application/json` plus a `responseSchema`, so prompts do not need to
//! spell out the JSON shape.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::client::{Prompt, ProviderClient, Target, WireFormat};
use super::prompts;
use super::transport::{HttpRequest, Transport};
use super::Provider;
use crate::config::ProviderConfig;
use crate::domain::{Artifact, PlanItem};
use crate::error::{ProviderError, ProviderResult};

/// Request/response format of the Gemini API
pub struct GeminiWire;

impl WireFormat for GeminiWire {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    fn config_hint(&self) -> &'static str {
        "GEMINI_API_KEY (or API_KEY)"
    }

    fn build_request(&self, target: &Target, prompt: &Prompt, schema: Option<&Value>) -> HttpRequest {
        let contents: Vec<Value> = prompt
            .user_messages()
            .map(|m| json!({ "role": "user", "parts": [{ "text": m.content }] }))
            .collect();

        let mime_type = if schema.is_some() {
            "application/json"
        } else {
            "text/plain"
        };
        let mut generation_config = json!({ "responseMimeType": mime_type });
        if let Some(schema) = schema {
            generation_config["responseSchema"] = schema.clone();
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(system) = prompt.system_text() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        HttpRequest {
            url: format!(
                "{}/models/{}:generateContent",
                target.endpoint.trim_end_matches('/'),
                target.model
            ),
            headers: vec![("x-goog-api-key".to_string(), target.credential.clone())],
            body,
        }
    }

    fn extract_text(&self, body: &Value) -> ProviderResult<String> {
        let candidate = body
            .pointer("/candidates/0")
            .ok_or_else(|| match body.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
                Some(reason) => ProviderError::malformed(format!("Gemini blocked the prompt: {}", reason)),
                None => ProviderError::malformed("Invalid response structure from Gemini API"),
            })?;

        let parts = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::malformed("Gemini candidate has no content parts"))?;

        let text: String = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect();

        if text.is_empty() {
            return Err(ProviderError::malformed("Gemini candidate has no text"));
        }
        Ok(text)
    }
}

/// Gemini-backed modernization provider
pub struct GeminiProvider {
    client: ProviderClient,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig, transport: Arc<dyn Transport>) -> ProviderResult<Self> {
        Ok(Self {
            client: ProviderClient::new(config, GeminiWire, transport)?,
        })
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn analyze(&self, files: &[Artifact]) -> ProviderResult<String> {
        let prompt = Prompt::new()
            .system(prompts::ASSISTANT_ROLE)
            .user(prompts::analysis_request(files));
        self.client.send(&prompt, None).await
    }

    async fn plan(&self, analysis: &str) -> ProviderResult<Vec<PlanItem>> {
        let prompt = Prompt::new()
            .system(prompts::ASSISTANT_ROLE)
            .user(prompts::plan_request(analysis));
        let text = self.client.send(&prompt, Some(&prompts::plan_schema())).await?;
        prompts::parse_plan(&text)
    }

    async fn transform(&self, files: &[Artifact], plan: &[PlanItem]) -> ProviderResult<Vec<Artifact>> {
        let prompt = Prompt::new()
            .system(prompts::ENGINE_ROLE)
            .user(prompts::transform_request(files, plan));
        let text = self
            .client
            .send(&prompt, Some(&prompts::transform_schema()))
            .await?;
        prompts::parse_output_files(&text)
    }

    async fn chat(&self, message: &str) -> ProviderResult<String> {
        let prompt = Prompt::new()
            .system(prompts::CHAT_ROLE)
            .user(prompts::chat_request(message));
        self.client.send(&prompt, None).await
    }
}
