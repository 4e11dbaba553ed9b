//! Azure OpenAI provider (chat completions).
//!
//! The endpoint must be the full deployment URL, e.g.
//! `https://<resource>.openai.azure.com/openai/deployments/<deployment>/chat/completions?api-version=2024-02-01`.
//! Structured output uses `response_format: json_object`; the JSON shape is
//! described in the prompt because the API takes no schema in that mode.

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

const TEMPERATURE: f64 = 0.2;
const MAX_TOKENS: u32 = 4096;

/// Request/response format of the Azure OpenAI chat completions API
pub struct AzureWire;

impl WireFormat for AzureWire {
    fn name(&self) -> &'static str {
        "Azure OpenAI"
    }

    fn config_hint(&self) -> &'static str {
        "AZURE_OAI_API_KEY and AZURE_OAI_ENDPOINT"
    }

    fn build_request(&self, target: &Target, prompt: &Prompt, schema: Option<&Value>) -> HttpRequest {
        let mut body = json!({
            "messages": prompt.messages,
            "model": target.model,
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });
        if schema.is_some() {
            body["response_format"] = json!({ "type": "json_object" });
        }

        HttpRequest {
            url: target.endpoint.clone(),
            headers: vec![("api-key".to_string(), target.credential.clone())],
            body,
        }
    }

    fn extract_text(&self, body: &Value) -> ProviderResult<String> {
        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::malformed("Invalid response structure from Azure OpenAI API"))
    }
}

/// Azure OpenAI-backed modernization provider
pub struct AzureProvider {
    client: ProviderClient,
}

impl AzureProvider {
    pub fn new(config: ProviderConfig, transport: Arc<dyn Transport>) -> ProviderResult<Self> {
        Ok(Self {
            client: ProviderClient::new(config, AzureWire, transport)?,
        })
    }
}

#[async_trait]
impl Provider for AzureProvider {
    fn name(&self) -> &str {
        "azure"
    }

    async fn analyze(&self, files: &[Artifact]) -> ProviderResult<String> {
        let prompt = Prompt::new()
            .system(prompts::ASSISTANT_ROLE)
            .user(prompts::analysis_request(files));
        self.client.send(&prompt, None).await
    }

    async fn plan(&self, analysis: &str) -> ProviderResult<Vec<PlanItem>> {
        let prompt = Prompt::new()
            .system(format!("{} {}", prompts::ASSISTANT_ROLE, prompts::JSON_ONLY))
            .user(format!("{}\n\n{}", prompts::plan_request(analysis), prompts::PLAN_FORMAT));
        let text = self.client.send(&prompt, Some(&prompts::plan_schema())).await?;
        prompts::parse_plan(&text)
    }

    async fn transform(&self, files: &[Artifact], plan: &[PlanItem]) -> ProviderResult<Vec<Artifact>> {
        let prompt = Prompt::new()
            .system(format!("{} {}", prompts::ENGINE_ROLE, prompts::JSON_ONLY))
            .user(format!(
                "{}\n\n{}",
                prompts::transform_request(files, plan),
                prompts::TRANSFORM_FORMAT
            ));
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
