//! Section Generation
//!
//! Generates one narrative section from its relevant content chunks via
//! the completion service. Never fails outward: any error degrades to a
//! deterministic fallback paragraph referencing the section focus and the
//! original query.
//!
//! Chunk relevance and the section-level coherence pass are strategy
//! traits with trivial defaults, so smarter ranking or rewriting can be
//! plugged in without touching generation flow.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::ai::provider::{SharedProvider, complete_with_retry};
use crate::ai::tokenizer::TokenCounter;
use crate::constants::narrative as narrative_constants;
use crate::narrative::chunker::{ContentChunk, ContentChunker};
use crate::narrative::prompts;
use crate::types::context::ResearchContext;
use crate::types::narrative::{DegradeReason, NarrativeSection, StageOutcome};
use crate::types::Result;

// =============================================================================
// Strategy Traits
// =============================================================================

/// Selects the content chunks relevant to one section.
///
/// The default takes the first K chunks; implementations may rank by
/// similarity instead.
pub trait ChunkRelevance: Send + Sync {
    fn select<'a>(
        &self,
        section: &NarrativeSection,
        chunks: &'a [ContentChunk],
    ) -> Vec<&'a ContentChunk>;
}

/// Leading-chunks relevance: the first K chunks in order
pub struct FirstChunks(pub usize);

impl Default for FirstChunks {
    fn default() -> Self {
        Self(narrative_constants::RELEVANT_CHUNK_LIMIT)
    }
}

impl ChunkRelevance for FirstChunks {
    fn select<'a>(
        &self,
        _section: &NarrativeSection,
        chunks: &'a [ContentChunk],
    ) -> Vec<&'a ContentChunk> {
        chunks.iter().take(self.0).collect()
    }
}

/// Section-level coherence pass over the concatenated chunk outputs.
///
/// Contract: return the text unchanged or an improved equivalent
/// preserving meaning.
pub trait SectionCoherence: Send + Sync {
    fn refine(&self, text: String, section: &NarrativeSection) -> String;
}

/// Identity coherence pass
pub struct IdentityCoherence;

impl SectionCoherence for IdentityCoherence {
    fn refine(&self, text: String, _section: &NarrativeSection) -> String {
        text
    }
}

// =============================================================================
// Section Generator
// =============================================================================

/// Generates the text of one section
pub struct SectionGenerator {
    provider: SharedProvider,
    chunker: Arc<ContentChunker>,
    relevance: Arc<dyn ChunkRelevance>,
    coherence: Arc<dyn SectionCoherence>,
    counter: TokenCounter,
    max_retries: usize,
}

impl SectionGenerator {
    pub fn new(
        provider: SharedProvider,
        chunker: Arc<ContentChunker>,
        relevance: Arc<dyn ChunkRelevance>,
        coherence: Arc<dyn SectionCoherence>,
        max_retries: usize,
    ) -> Self {
        Self {
            provider,
            chunker,
            relevance,
            coherence,
            counter: TokenCounter::default(),
            max_retries,
        }
    }

    /// Generate one section's text. Never fails; the fallback references
    /// the section focus and the original query.
    pub async fn generate(
        &self,
        section: &NarrativeSection,
        chunks: &[ContentChunk],
        context: &ResearchContext,
    ) -> StageOutcome<String> {
        match self.generate_inner(section, chunks, context).await {
            Ok(text) => StageOutcome::Full(text),
            Err(err) => {
                warn!(title = %section.title, error = %err, "section generation failed, using fallback");
                StageOutcome::Degraded(
                    Self::fallback_section(section, context),
                    DegradeReason::SectionFailed {
                        title: section.title.clone(),
                        detail: err.to_string(),
                    },
                )
            }
        }
    }

    async fn generate_inner(
        &self,
        section: &NarrativeSection,
        chunks: &[ContentChunk],
        context: &ResearchContext,
    ) -> Result<String> {
        let relevant = self.relevance.select(section, chunks);
        debug!(
            title = %section.title,
            chunks = relevant.len(),
            "generating section"
        );

        // Chunk requests are sequential and in chunk order so partial
        // outputs compose predictably
        let mut parts = Vec::with_capacity(relevant.len());
        for chunk in relevant {
            let mut prompt = prompts::section_prompt(section, &chunk.content, context);

            if self
                .counter
                .exceeds_budget(&prompt, self.chunker.window_tokens())
            {
                prompt = self
                    .chunker
                    .compress_prompt(&prompt, self.chunker.window_tokens());
            }

            let response = complete_with_retry(
                self.provider.as_ref(),
                &prompt,
                &Value::Null,
                self.max_retries,
            )
            .await?;
            parts.push(response.text());
        }

        let raw = parts.join("\n\n");
        Ok(self.coherence.refine(raw, section))
    }

    /// Deterministic fallback section text
    pub fn fallback_section(section: &NarrativeSection, context: &ResearchContext) -> String {
        format!(
            "This section covers {} for the topic: {}",
            section.focus, context.original_query
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::testing::StubProvider;
    use crate::types::narrative::SectionPriority;
    use crate::types::ErrorCategory;

    fn section() -> NarrativeSection {
        NarrativeSection::new("Scheduling", "task scheduling", 900, SectionPriority::High)
    }

    fn context() -> ResearchContext {
        ResearchContext::new("rust async runtimes")
    }

    fn content_chunks(n: usize) -> Vec<ContentChunk> {
        (0..n)
            .map(|i| ContentChunk {
                index: i,
                offset: i * 100,
                content: format!("chunk-{i} body"),
            })
            .collect()
    }

    fn generator(provider: Arc<StubProvider>, window_tokens: usize) -> SectionGenerator {
        SectionGenerator::new(
            provider,
            Arc::new(ContentChunker::new(window_tokens, 0.15)),
            Arc::new(FirstChunks::default()),
            Arc::new(IdentityCoherence),
            0,
        )
    }

    #[tokio::test]
    async fn test_generate_concatenates_chunk_outputs() {
        let provider = Arc::new(
            StubProvider::new("generic")
                .on("chunk-0", "first part")
                .on("chunk-1", "second part"),
        );
        let generator = generator(Arc::clone(&provider), 32_000);

        let outcome = generator
            .generate(&section(), &content_chunks(2), &context())
            .await;
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.into_value(), "first part\n\nsecond part");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_relevance_limits_chunk_requests() {
        let provider = Arc::new(StubProvider::new("part"));
        let generator = generator(Arc::clone(&provider), 32_000);

        let outcome = generator
            .generate(&section(), &content_chunks(9), &context())
            .await;
        assert!(!outcome.is_degraded());
        // default relevance takes the first 5 chunks only
        assert_eq!(provider.call_count(), 5);
    }

    #[tokio::test]
    async fn test_generate_degrades_to_fallback_on_failure() {
        let provider =
            Arc::new(StubProvider::new("x").fail_on("Scheduling", ErrorCategory::Unavailable));
        let generator = generator(provider, 32_000);

        let outcome = generator
            .generate(&section(), &content_chunks(2), &context())
            .await;
        assert!(outcome.is_degraded());
        let text = outcome.into_value();
        assert!(text.contains("task scheduling"));
        assert!(text.contains("rust async runtimes"));
    }

    #[tokio::test]
    async fn test_oversized_prompt_is_compressed_before_submission() {
        let provider = Arc::new(StubProvider::new("part"));
        // Window far smaller than the section prompt scaffolding
        let generator = generator(Arc::clone(&provider), 100);

        let big_chunk = vec![ContentChunk {
            index: 0,
            offset: 0,
            content: "filler ".repeat(400),
        }];
        let outcome = generator.generate(&section(), &big_chunk, &context()).await;
        assert!(!outcome.is_degraded());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_no_chunks_yields_empty_section() {
        let provider = Arc::new(StubProvider::new("part"));
        let generator = generator(Arc::clone(&provider), 32_000);

        let outcome = generator.generate(&section(), &[], &context()).await;
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.into_value(), "");
        assert_eq!(provider.call_count(), 0);
    }
}
