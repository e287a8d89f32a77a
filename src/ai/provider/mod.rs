//! Completion Provider Abstraction
//!
//! Defines the `CompletionProvider` trait the narrative pipeline drives.
//! All providers return `CompletionResponse` with token usage metrics.
//! Providers must be safe to call concurrently from multiple orchestrator
//! tasks; the trait takes `&self` and requires `Send + Sync`.

mod openai;

pub use openai::OpenAiCompatProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::constants::retry as retry_constants;
use crate::types::{NarrativeError, Result};

// =============================================================================
// Completion Response
// =============================================================================

/// Complete response from the completion service, including usage metrics
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content: a JSON string for free-form completions, or a
    /// structured value when a shape was requested
    pub content: Value,
    /// Token usage metrics
    pub usage: TokenUsage,
    /// Response timing
    pub timing: ResponseTiming,
    /// Provider and model info
    pub metadata: ResponseMetadata,
}

impl CompletionResponse {
    /// Create a response with content only (usage unknown)
    pub fn content_only(content: Value) -> Self {
        Self {
            content,
            usage: TokenUsage::default(),
            timing: ResponseTiming::default(),
            metadata: ResponseMetadata::default(),
        }
    }

    /// Create a full response with all metrics
    pub fn with_metrics(
        content: Value,
        usage: TokenUsage,
        timing: ResponseTiming,
        metadata: ResponseMetadata,
    ) -> Self {
        Self {
            content,
            usage,
            timing,
            metadata,
        }
    }

    /// The response content as plain text.
    ///
    /// String content is returned as-is; structured content is serialized.
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Deserialize the response content into the requested shape
    pub fn structured_output<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.content.clone())?)
    }
}

/// Token usage metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens (prompt)
    pub input_tokens: u32,
    /// Output tokens (response)
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used (input + output)
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Response timing metrics
#[derive(Debug, Clone, Default)]
pub struct ResponseTiming {
    /// Total response time in milliseconds (wall clock)
    pub total_ms: u64,
}

impl ResponseTiming {
    pub fn from_duration(duration: Duration) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
        }
    }
}

/// Response metadata
#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    /// Model used
    pub model: String,
    /// Provider name
    pub provider: String,
}

/// Shared provider type for concurrent access across pipeline stages
pub type SharedProvider = Arc<dyn CompletionProvider>;

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for completion providers
///
/// API keys are never serialized to output and are redacted in debug
/// output; providers convert the key to a `SecretString` internally.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Model name (provider-specific)
    pub model: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Temperature for generation (0.0 = deterministic)
    pub temperature: f32,
    /// API key, never serialized
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL (for custom endpoints)
    #[serde(default)]
    pub api_base: Option<String>,
    /// Maximum tokens to generate per request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

fn default_max_tokens() -> usize {
    4096
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: None,
            timeout_secs: crate::constants::network::DEFAULT_TIMEOUT_SECS,
            temperature: 0.3,
            api_key: None,
            api_base: None,
            max_tokens: 4096,
        }
    }
}

// =============================================================================
// Completion Provider Trait
// =============================================================================

/// The external completion-service boundary.
///
/// `shape` describes the expected response structure as a JSON Schema;
/// pass `Value::Null` for free-form text. How the model behind this trait
/// is chosen or authenticated is the caller's concern.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Submit a prompt and return the completion
    async fn complete(&self, prompt: &str, shape: &Value) -> Result<CompletionResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;
}

// =============================================================================
// Retry Helper
// =============================================================================

/// Submit a completion with bounded retries for retryable error categories.
///
/// Exponential backoff with jitter; non-retryable categories (auth, bad
/// request, token limit) fail immediately. Callers still convert terminal
/// failures into stage fallbacks - this helper only smooths over transient
/// provider hiccups.
pub async fn complete_with_retry(
    provider: &dyn CompletionProvider,
    prompt: &str,
    shape: &Value,
    max_retries: usize,
) -> Result<CompletionResponse> {
    let mut attempt = 0;
    loop {
        match provider.complete(prompt, shape).await {
            Ok(response) => return Ok(response),
            Err(NarrativeError::Completion(err)) if err.is_retryable() && attempt < max_retries => {
                let delay = backoff_delay(attempt, err.recommended_delay());
                warn!(
                    provider = provider.name(),
                    attempt,
                    category = %err.category,
                    delay_ms = delay.as_millis() as u64,
                    "completion failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                debug!(provider = provider.name(), attempt, "completion failed terminally");
                return Err(err);
            }
        }
    }
}

/// Exponential backoff with random jitter, capped, never below the
/// provider's own retry hint
fn backoff_delay(attempt: usize, recommended: Duration) -> Duration {
    let base = retry_constants::BASE_DELAY_MS as f64
        * retry_constants::BACKOFF_FACTOR.powi(attempt as i32);
    let capped = (base as u64).min(retry_constants::MAX_DELAY_SECS * 1000);
    let backoff = Duration::from_millis(capped).max(recommended);

    // up to 25% jitter so concurrent tasks don't retry in lockstep
    let max_jitter_ms = (backoff.as_millis() as u64 / 4).max(1);
    let jitter_ms = rand::rng().random_range(0..max_jitter_ms);
    backoff + Duration::from_millis(jitter_ms)
}

// =============================================================================
// Test Support
// =============================================================================
