//! Coherence Enhancement
//!
//! Post-processes the assembled document. Short narratives go through an
//! expansion step; everything else is re-chunked and improved chunk by
//! chunk, order preserved. Never fails outward: any error returns the
//! pre-enhancement narrative unchanged.
//!
//! Both the per-chunk improvement and the expansion step are strategy
//! traits with identity defaults, so LLM-backed rewriting is opt-in.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::ai::provider::{SharedProvider, complete_with_retry};
use crate::constants::narrative as narrative_constants;
use crate::narrative::chunker::{ContentChunker, PromptChunk};
use crate::narrative::prompts;
use crate::types::context::ResearchContext;
use crate::types::narrative::{DegradeReason, StageOutcome};
use crate::types::Result;

// =============================================================================
// Strategy Traits
// =============================================================================

/// Per-chunk coherence improvement.
///
/// Contract: return the chunk unchanged or an improved equivalent
/// preserving meaning.
#[async_trait]
pub trait ChunkCoherence: Send + Sync {
    async fn improve(&self, chunk: &PromptChunk, context: &ResearchContext) -> Result<String>;
}

/// Identity improvement pass
pub struct IdentityChunkCoherence;

#[async_trait]
impl ChunkCoherence for IdentityChunkCoherence {
    async fn improve(&self, chunk: &PromptChunk, _context: &ResearchContext) -> Result<String> {
        Ok(chunk.content.clone())
    }
}

/// LLM-backed improvement pass
pub struct LlmChunkCoherence {
    provider: SharedProvider,
    max_retries: usize,
}

impl LlmChunkCoherence {
    pub fn new(provider: SharedProvider, max_retries: usize) -> Self {
        Self {
            provider,
            max_retries,
        }
    }
}

#[async_trait]
impl ChunkCoherence for LlmChunkCoherence {
    async fn improve(&self, chunk: &PromptChunk, context: &ResearchContext) -> Result<String> {
        let prompt = prompts::chunk_coherence_prompt(&chunk.content, context);
        let response = complete_with_retry(
            self.provider.as_ref(),
            &prompt,
            &Value::Null,
            self.max_retries,
        )
        .await?;
        Ok(response.text())
    }
}

/// Expansion step for under-length narratives.
///
/// Contract: output length >= input length, content preserved or extended,
/// never truncated.
#[async_trait]
pub trait NarrativeExpansion: Send + Sync {
    async fn expand(&self, narrative: &str, context: &ResearchContext) -> Result<String>;
}

/// Identity expansion (keeps the narrative as-is)
pub struct IdentityExpansion;

#[async_trait]
impl NarrativeExpansion for IdentityExpansion {
    async fn expand(&self, narrative: &str, _context: &ResearchContext) -> Result<String> {
        Ok(narrative.to_string())
    }
}

// =============================================================================
// Coherence Enhancer
// =============================================================================

/// Post-processing pass over the assembled narrative
pub struct CoherenceEnhancer {
    chunker: Arc<ContentChunker>,
    chunk_coherence: Arc<dyn ChunkCoherence>,
    expansion: Arc<dyn NarrativeExpansion>,
    target_chars: usize,
}

impl CoherenceEnhancer {
    pub fn new(
        chunker: Arc<ContentChunker>,
        chunk_coherence: Arc<dyn ChunkCoherence>,
        expansion: Arc<dyn NarrativeExpansion>,
        target_chars: usize,
    ) -> Self {
        Self {
            chunker,
            chunk_coherence,
            expansion,
            target_chars,
        }
    }

    /// Enhance the narrative. Never fails; any error returns the input
    /// unchanged.
    pub async fn enhance(
        &self,
        narrative: &str,
        context: &ResearchContext,
    ) -> StageOutcome<String> {
        match self.enhance_inner(narrative, context).await {
            Ok(enhanced) => StageOutcome::Full(enhanced),
            Err(err) => {
                warn!(error = %err, "coherence enhancement failed, keeping narrative as assembled");
                StageOutcome::Degraded(
                    narrative.to_string(),
                    DegradeReason::EnhancementFailed(err.to_string()),
                )
            }
        }
    }

    async fn enhance_inner(&self, narrative: &str, context: &ResearchContext) -> Result<String> {
        let length = narrative.chars().count();
        let expansion_floor =
            (self.target_chars as f64 * narrative_constants::EXPANSION_TRIGGER_RATIO) as usize;

        if length < expansion_floor {
            debug!(length, expansion_floor, "narrative below target, expanding");
            let expanded = self.expansion.expand(narrative, context).await?;
            // the expansion contract forbids truncation; keep the original
            // if a strategy violates it
            if expanded.chars().count() < length {
                warn!("expansion strategy shrank the narrative, keeping the original");
                return Ok(narrative.to_string());
            }
            return Ok(expanded);
        }

        let chunks = self.chunker.chunk_narrative(narrative);
        debug!(chunks = chunks.len(), "improving narrative coherence per chunk");

        let mut improved = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            improved.push(self.chunk_coherence.improve(chunk, context).await?);
        }

        Ok(improved.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::testing::StubProvider;
    use crate::types::{CompletionError, ErrorCategory};

    fn enhancer_with(
        chunk_coherence: Arc<dyn ChunkCoherence>,
        window_tokens: usize,
        target_chars: usize,
    ) -> CoherenceEnhancer {
        CoherenceEnhancer::new(
            Arc::new(ContentChunker::new(window_tokens, 0.15)),
            chunk_coherence,
            Arc::new(IdentityExpansion),
            target_chars,
        )
    }

    fn long_narrative() -> String {
        (0..60)
            .map(|i| format!("Paragraph {i} with several words of body text."))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[tokio::test]
    async fn test_short_narrative_takes_expansion_path() {
        let enhancer = enhancer_with(Arc::new(IdentityChunkCoherence), 32_000, 8000);
        let outcome = enhancer
            .enhance("tiny narrative", &ResearchContext::new("q"))
            .await;
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.into_value(), "tiny narrative");
    }

    #[tokio::test]
    async fn test_long_narrative_is_rechunked_and_rejoined() {
        let narrative = long_narrative();
        // small window forces several chunks, tiny target skips expansion
        let enhancer = enhancer_with(Arc::new(IdentityChunkCoherence), 64, 100);
        let outcome = enhancer.enhance(&narrative, &ResearchContext::new("q")).await;
        assert!(!outcome.is_degraded());

        let enhanced = outcome.into_value();
        // identity improvement preserves every paragraph, in order
        assert!(enhanced.contains("Paragraph 0"));
        assert!(enhanced.contains("Paragraph 59"));
        let first = enhanced.find("Paragraph 0 ").unwrap();
        let last = enhanced.find("Paragraph 59").unwrap();
        assert!(first < last);
    }

    #[tokio::test]
    async fn test_enhancement_failure_returns_input_unchanged() {
        struct FailingCoherence;

        #[async_trait]
        impl ChunkCoherence for FailingCoherence {
            async fn improve(
                &self,
                _chunk: &PromptChunk,
                _context: &ResearchContext,
            ) -> Result<String> {
                Err(CompletionError::new(ErrorCategory::Unavailable, "down").into())
            }
        }

        let narrative = long_narrative();
        let enhancer = enhancer_with(Arc::new(FailingCoherence), 64, 100);
        let outcome = enhancer.enhance(&narrative, &ResearchContext::new("q")).await;

        assert!(outcome.is_degraded());
        assert_eq!(outcome.into_value(), narrative);
    }

    #[tokio::test]
    async fn test_llm_chunk_coherence_rewrites_through_provider() {
        let provider = Arc::new(StubProvider::new("smoothed text"));
        let coherence = LlmChunkCoherence::new(provider, 0);

        let chunk = PromptChunk {
            index: 0,
            total: 1,
            content: "rough text".into(),
        };
        let improved = coherence
            .improve(&chunk, &ResearchContext::new("q"))
            .await
            .unwrap();
        assert_eq!(improved, "smoothed text");
    }

    #[tokio::test]
    async fn test_shrinking_expansion_is_rejected() {
        struct TruncatingExpansion;

        #[async_trait]
        impl NarrativeExpansion for TruncatingExpansion {
            async fn expand(
                &self,
                _narrative: &str,
                _context: &ResearchContext,
            ) -> Result<String> {
                Ok("x".to_string())
            }
        }

        let enhancer = CoherenceEnhancer::new(
            Arc::new(ContentChunker::new(32_000, 0.15)),
            Arc::new(IdentityChunkCoherence),
            Arc::new(TruncatingExpansion),
            8000,
        );

        let outcome = enhancer
            .enhance("a short but real narrative", &ResearchContext::new("q"))
            .await;
        assert_eq!(outcome.into_value(), "a short but real narrative");
    }
}
