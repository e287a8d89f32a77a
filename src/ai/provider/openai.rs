//! OpenAI-Compatible API Provider
//!
//! Completion provider speaking the Chat Completions wire format, usable
//! against OpenAI or any compatible endpoint. Returns `CompletionResponse`
//! with token usage metrics.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    CompletionProvider, CompletionResponse, ProviderConfig, ResponseMetadata, ResponseTiming,
    TokenUsage,
};
use crate::types::{CompletionError, ErrorCategory, NarrativeError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI-compatible provider with secure API key handling
pub struct OpenAiCompatProvider {
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiCompatProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key_str = config
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                NarrativeError::Config(
                    "API key not found. Set OPENAI_API_KEY env var or provide in config"
                        .to_string(),
                )
            })?;

        let api_base = config
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        url::Url::parse(&api_base)
            .map_err(|e| NarrativeError::Config(format!("Invalid api_base '{api_base}': {e}")))?;

        let model = config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NarrativeError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            api_key: SecretString::from(api_key_str),
            api_base,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn build_request(&self, prompt: &str, shape: &Value) -> ChatCompletionRequest {
        let (system_content, response_format) = if shape.is_null() {
            (
                "You are an expert research writer producing precise, evidence-grounded prose."
                    .to_string(),
                None,
            )
        } else {
            let shape_str = serde_json::to_string_pretty(shape)
                .unwrap_or_else(|_| shape.to_string());
            (
                format!(
                    "You are an expert research writer. Always respond with valid JSON matching this schema:\n\n```json\n{shape_str}\n```\n\nRespond ONLY with valid JSON, no explanation."
                ),
                Some(ResponseFormat {
                    format_type: "json_object".to_string(),
                }),
            )
        };

        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_content,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            response_format,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    async fn complete(&self, prompt: &str, shape: &Value) -> Result<CompletionResponse> {
        debug!(model = %self.model, "sending chat completion request");

        let start_time = Instant::now();
        let request = self.build_request(prompt, shape);
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::classify(&e.to_string(), "openai-compat"))?;

        let elapsed = start_time.elapsed();

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, "chat completion request failed");
            return Err(CompletionError::classify_http_status(
                status,
                &body,
                "openai-compat",
            )
            .into());
        }

        let response_body: ChatCompletionResponse = response.json().await.map_err(|e| {
            CompletionError::new(
                ErrorCategory::ParseError,
                format!("Failed to parse completion response: {e}"),
            )
        })?;

        let usage = response_body
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let content_str = response_body
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| {
                CompletionError::new(ErrorCategory::ParseError, "No content in completion response")
            })?;

        let content = if shape.is_null() {
            Value::String(content_str.clone())
        } else {
            extract_json(content_str)?
        };

        info!(
            model = %self.model,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            elapsed_ms = elapsed.as_millis() as u64,
            "chat completion succeeded"
        );

        Ok(CompletionResponse::with_metrics(
            content,
            usage,
            ResponseTiming::from_duration(elapsed),
            ResponseMetadata {
                model: self.model.clone(),
                provider: "openai-compat".to_string(),
            },
        ))
    }

    fn name(&self) -> &str {
        "openai-compat"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Extract a JSON value from model output that may wrap it in code fences
/// or surrounding prose
fn extract_json(text: &str) -> Result<Value> {
    let trimmed = text.trim();

    // Direct parse first
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    // Strip markdown code fences
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.rsplit_once("```"))
        .map(|(body, _)| body.trim());
    if let Some(body) = unfenced
        && let Ok(value) = serde_json::from_str(body)
    {
        return Ok(value);
    }

    // Last resort: widest braced span
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && start < end
        && let Ok(value) = serde_json::from_str(&trimmed[start..=end])
    {
        return Ok(value);
    }

    Err(CompletionError::new(
        ErrorCategory::ParseError,
        "Response did not contain valid JSON",
    )
    .into())
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}
