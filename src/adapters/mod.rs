//! Provider interfaces for external text-generation backends.
//!
//! Every backend implements [`Provider`], so the pipeline controller can
//! swap Gemini for Azure OpenAI (or a test double) without caring about
//! prompts, schemas or response envelopes.

pub mod azure;
pub mod client;
pub mod gemini;
pub mod prompts;
pub mod transport;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::domain::{Artifact, PlanItem};
use crate::error::ProviderResult;

pub use azure::AzureProvider;
pub use client::{Prompt, ProviderClient};
pub use gemini::GeminiProvider;
pub use transport::{HttpReply, HttpRequest, ReqwestTransport, Transport};

/// Trait for modernization providers
///
/// Implementations are stateless per call and never keep artifacts
/// between invocations.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Summarize the purpose, I/O, external calls and key logic of the sources
    async fn analyze(&self, files: &[Artifact]) -> ProviderResult<String>;

    /// Turn an analysis into an ordered modernization plan
    async fn plan(&self, analysis: &str) -> ProviderResult<Vec<PlanItem>>;

    /// Translate the sources following the plan; returns generated artifacts
    async fn transform(&self, files: &[Artifact], plan: &[PlanItem]) -> ProviderResult<Vec<Artifact>>;

    /// Answer a free-form question
    async fn chat(&self, message: &str) -> ProviderResult<String>;
}

/// Supported provider backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Google Gemini
    Gemini,

    /// Azure OpenAI
    Azure,
}

impl Default for ProviderKind {
    fn default() -> Self {
        Self::Gemini
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini => f.write_str("gemini"),
            Self::Azure => f.write_str("azure"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "azure" | "azure_openai" | "azure-openai" => Ok(Self::Azure),
            other => Err(format!("unknown provider '{}' (expected gemini or azure)", other)),
        }
    }
}

/// Build a provider over the given transport
pub fn build_provider_with(
    kind: ProviderKind,
    config: ProviderConfig,
    transport: Arc<dyn Transport>,
) -> ProviderResult<Arc<dyn Provider>> {
    let provider: Arc<dyn Provider> = match kind {
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(config, transport)?),
        ProviderKind::Azure => Arc::new(AzureProvider::new(config, transport)?),
    };
    Ok(provider)
}

/// Build a provider that talks HTTP via reqwest
pub fn build_provider(kind: ProviderKind, config: ProviderConfig) -> ProviderResult<Arc<dyn Provider>> {
    let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
    build_provider_with(kind, config, transport)
}
