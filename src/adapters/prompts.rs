//! Prompt text and structured-response parsing shared by all providers.

use serde::Deserialize;
use serde_json::Value;

use crate::domain::{plan, Artifact, PlanItem};
use crate::error::{ProviderError, ProviderResult};

pub const ASSISTANT_ROLE: &str = "You are an expert COBOL modernization assistant.";
pub const ENGINE_ROLE: &str = "You are an expert COBOL to Java modernization engine.";
pub const CHAT_ROLE: &str = "You are a helpful COBOL modernization assistant.";
pub const JSON_ONLY: &str = "You must respond with a valid JSON object.";

/// Every file as a labelled, fenced block
pub fn code_blocks(files: &[Artifact]) -> String {
    files
        .iter()
        .map(|f| format!("--- {} ---\n```{}\n{}\n```", f.name, f.language(), f.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn analysis_request(files: &[Artifact]) -> String {
    format!(
        "Analyze the following COBOL code files.\n\
         Provide a concise summary of the program's purpose, identify all file I/O operations, \
         database calls, and external program calls (CALL statements).\n\
         List the key business logic sections.\n\
         Focus on providing a high-level overview that will be useful for planning a Java migration.\n\n\
         {}",
        code_blocks(files)
    )
}

pub fn plan_request(analysis: &str) -> String {
    format!(
        "Based on the following analysis of a COBOL program, create a detailed modernization plan \
         to convert it to modern, object-oriented Java.\n\
         The plan should be a series of actionable steps. For each step, provide a clear title and \
         a detailed description.\n\n\
         Analysis:\n{}",
        analysis
    )
}

/// Explicit JSON shape for backends without schema support
pub const PLAN_FORMAT: &str = "Respond with a JSON object containing a single key \"plan\" which is an array of objects. \
     Each object must have \"title\" (string) and \"description\" (string) properties.";

pub fn transform_request(files: &[Artifact], plan_items: &[PlanItem]) -> String {
    format!(
        "Convert the following COBOL code to clean, readable, and maintainable Java.\n\
         Follow the provided modernization plan to guide your transformation. The Java code should \
         be functionally equivalent to the COBOL code.\n\
         Add Javadoc comments to explain complex logic.\n\n\
         Modernization Plan:\n{}\n\n\
         COBOL Code:\n{}",
        plan::numbered(plan_items),
        code_blocks(files)
    )
}

pub const TRANSFORM_FORMAT: &str = "Respond with a JSON object containing a single key \"javaFiles\" which is an array of objects. \
     Each object must have \"fileName\" (string) and \"code\" (string) properties.";

pub fn chat_request(question: &str) -> String {
    format!(
        "A user has a question. Provide a helpful and concise response. User question: \"{}\"",
        question
    )
}

#[derive(Debug, Deserialize)]
struct PlanEnvelope {
    plan: Option<Vec<PlanEntry>>,
}

#[derive(Debug, Deserialize)]
struct PlanEntry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransformEnvelope {
    java_files: Option<Vec<OutputEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputEntry {
    file_name: String,
    code: String,
}

/// Parse structured text, tolerating a surrounding ```json fence
fn parse_json<T: for<'de> Deserialize<'de>>(text: &str) -> ProviderResult<T> {
    let trimmed = strip_fence(text.trim());
    serde_json::from_str(trimmed)
        .map_err(|e| ProviderError::malformed(format!("response is not the expected JSON object: {}", e)))
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag line ("json") and the closing fence.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse `{"plan": [{title, description}]}` into ordered plan items
pub fn parse_plan(text: &str) -> ProviderResult<Vec<PlanItem>> {
    let envelope: PlanEnvelope = parse_json(text)?;
    let entries = envelope
        .plan
        .ok_or_else(|| ProviderError::malformed("response has no \"plan\" array"))?;
    if entries.is_empty() {
        return Err(ProviderError::malformed("response has an empty \"plan\" array"));
    }

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            if entry.title.trim().is_empty() {
                return Err(ProviderError::malformed(format!(
                    "plan item {} has an empty title",
                    index + 1
                )));
            }
            Ok(PlanItem::new(entry.title, entry.description))
        })
        .collect()
}

/// Parse `{"javaFiles": [{fileName, code}]}` into generated artifacts
pub fn parse_output_files(text: &str) -> ProviderResult<Vec<Artifact>> {
    let envelope: TransformEnvelope = parse_json(text)?;
    let entries = envelope
        .java_files
        .ok_or_else(|| ProviderError::malformed("response has no \"javaFiles\" array"))?;

    Ok(entries
        .into_iter()
        .map(|entry| Artifact::generated(entry.file_name, entry.code))
        .collect())
}

/// JSON schema for the plan response
pub fn plan_schema() -> Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "plan": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "description": { "type": "STRING" }
                    },
                    "required": ["title", "description"]
                }
            }
        },
        "required": ["plan"]
    })
}

/// JSON schema for the transform response
pub fn transform_schema() -> Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "javaFiles": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "fileName": { "type": "STRING" },
                        "code": { "type": "STRING" }
                    },
                    "required": ["fileName", "code"]
                }
            }
        },
        "required": ["javaFiles"]
    })
}
