//! Configuration for modernize.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (credentials, MODERNIZE_PROVIDER, model overrides)
//! 2. Config file (.modernize/config.yaml, searched upwards from the cwd)
//! 3. User config file (~/.config/modernize/config.yaml)
//! 4. Defaults
//!
//! Credentials are never read from files.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::ProviderKind;
use crate::core::RetryPolicy;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<Settings, String>> = OnceLock::new();

pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_AZURE_MODEL: &str = "gpt-4o";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub provider: Option<ProviderKind>,
    #[serde(default)]
    pub accepted_extensions: Option<Vec<String>>,
    #[serde(default)]
    pub gemini: ProviderSection,
    #[serde(default)]
    pub azure: ProviderSection,
}

/// Per-provider tuning from the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderSection {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub retry_limit: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
}

/// Resolved application settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Provider used when none is given on the command line
    pub provider: ProviderKind,
    /// Upload extensions, without the dot
    pub accepted_extensions: Vec<String>,
    pub gemini: ProviderSection,
    pub azure: ProviderSection,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            accepted_extensions: default_extensions(),
            gemini: ProviderSection::default(),
            azure: ProviderSection::default(),
            config_file: None,
        }
    }
}

pub fn default_extensions() -> Vec<String> {
    vec!["cbl".to_string(), "cob".to_string()]
}

/// Everything a provider client needs to issue requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Target URL (full chat-completions URL for Azure, API base for Gemini)
    pub endpoint: Option<String>,
    /// API key
    pub credential: Option<String>,
    /// Backend model identifier
    pub model_name: Option<String>,
    /// Attempt bound and backoff unit
    pub retry: RetryPolicy,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            credential: None,
            model_name: None,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl Settings {
    pub fn section(&self, kind: ProviderKind) -> &ProviderSection {
        match kind {
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::Azure => &self.azure,
        }
    }

    /// Build the provider configuration from the process environment
    pub fn provider_config(&self, kind: ProviderKind) -> ProviderConfig {
        self.provider_config_with(kind, |key| std::env::var(key).ok())
    }

    /// Build the provider configuration using a custom variable lookup
    pub fn provider_config_with<F>(&self, kind: ProviderKind, env: F) -> ProviderConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let section = self.section(kind);
        let var = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let (endpoint, credential, model_name) = match kind {
            ProviderKind::Gemini => (
                section
                    .endpoint
                    .clone()
                    .or_else(|| Some(DEFAULT_GEMINI_ENDPOINT.to_string())),
                var("GEMINI_API_KEY").or_else(|| var("API_KEY")),
                var("GEMINI_MODEL")
                    .or_else(|| section.model.clone())
                    .or_else(|| Some(DEFAULT_GEMINI_MODEL.to_string())),
            ),
            ProviderKind::Azure => (
                var("AZURE_OAI_ENDPOINT").or_else(|| section.endpoint.clone()),
                var("AZURE_OAI_API_KEY"),
                var("AZURE_OAI_MODEL")
                    .or_else(|| section.model.clone())
                    .or_else(|| Some(DEFAULT_AZURE_MODEL.to_string())),
            ),
        };

        let defaults = RetryPolicy::default();
        ProviderConfig {
            endpoint,
            credential,
            model_name,
            retry: RetryPolicy {
                max_attempts: section.retry_limit.unwrap_or(defaults.max_attempts),
                delay_unit_ms: section.retry_delay_ms.unwrap_or(defaults.delay_unit_ms),
            },
            request_timeout: Duration::from_secs(section.request_timeout_seconds.unwrap_or(120)),
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".modernize").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    let user_config = dirs::config_dir()?.join("modernize").join("config.yaml");
    user_config.exists().then_some(user_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config_file(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn parse_config_file(content: &str) -> Result<ConfigFile> {
    Ok(serde_yaml::from_str(content)?)
}

/// Merge a parsed config file over the defaults
fn resolve(file: ConfigFile, config_file: Option<PathBuf>, provider_env: Option<String>) -> Result<Settings> {
    let provider = match provider_env {
        Some(name) => name
            .parse::<ProviderKind>()
            .map_err(|e| anyhow::anyhow!("MODERNIZE_PROVIDER: {}", e))?,
        None => file.provider.unwrap_or(ProviderKind::Gemini),
    };

    let accepted_extensions = file
        .accepted_extensions
        .map(|exts| {
            exts.into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|exts| !exts.is_empty())
        .unwrap_or_else(default_extensions);

    Ok(Settings {
        provider,
        accepted_extensions,
        gemini: file.gemini,
        azure: file.azure,
        config_file,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<Settings> {
    let config_file = find_config_file();
    let file = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    resolve(file, config_file, std::env::var("MODERNIZE_PROVIDER").ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static Settings> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Load configuration from an explicit file, bypassing discovery and the cache
pub fn load_from(path: &Path) -> Result<Settings> {
    let file = load_config_file(path)?;
    resolve(file, Some(path.to_path_buf()), std::env::var("MODERNIZE_PROVIDER").ok())
}
