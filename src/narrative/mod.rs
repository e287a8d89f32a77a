//! Narrative Generation Pipeline
//!
//! Turns synthesized research material into a long-form, multi-section
//! narrative: adaptive structure planning, context-window-aware chunking,
//! parallel per-section generation with isolated fallback, deterministic
//! assembly, and a coherence-enhancement pass.
//!
//! Every stage degrades to a deterministic lower-quality result instead of
//! propagating its failure; the top-level [`NarrativeBuilder::build`] only
//! errors on malformed input.

pub mod assembler;
pub mod chunker;
pub mod enhancer;
pub mod generator;
pub mod orchestrator;
pub mod planner;
mod prompts;

pub use assembler::NarrativeAssembler;
pub use chunker::{ContentChunk, ContentChunker, PromptChunk};
pub use enhancer::{
    ChunkCoherence, CoherenceEnhancer, IdentityChunkCoherence, IdentityExpansion,
    LlmChunkCoherence, NarrativeExpansion,
};
pub use generator::{
    ChunkRelevance, FirstChunks, IdentityCoherence, SectionCoherence, SectionGenerator,
};
pub use orchestrator::ParallelOrchestrator;
pub use planner::StructurePlanner;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::ai::provider::SharedProvider;
use crate::constants::{chunking, narrative as narrative_constants, retry};
use crate::types::context::ResearchContext;
use crate::types::{NarrativeError, Result};

/// Tuning knobs for one narrative pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    /// Target length of the final narrative, in characters
    pub target_narrative_chars: usize,
    /// Context-window limit in estimated tokens
    pub context_window_tokens: usize,
    /// Overlap between consecutive content chunks
    pub chunk_overlap_ratio: f64,
    /// Concurrent section-generation workers
    pub max_workers: usize,
    /// Retries per completion request for transient failures
    pub max_completion_retries: usize,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            target_narrative_chars: narrative_constants::TARGET_NARRATIVE_CHARS,
            context_window_tokens: chunking::CONTEXT_WINDOW_TOKENS,
            chunk_overlap_ratio: chunking::CHUNK_OVERLAP_RATIO,
            max_workers: narrative_constants::DEFAULT_MAX_WORKERS,
            max_completion_retries: retry::DEFAULT_MAX_RETRIES,
        }
    }
}

/// Top-level entry point for narrative builds.
///
/// Construction wires the default strategies; each can be swapped before
/// the first build. A single builder is reusable across builds and safe to
/// share - all per-build state is created fresh inside [`build`].
///
/// [`build`]: NarrativeBuilder::build
pub struct NarrativeBuilder {
    provider: SharedProvider,
    config: NarrativeConfig,
    relevance: Arc<dyn ChunkRelevance>,
    section_coherence: Arc<dyn SectionCoherence>,
    chunk_coherence: Arc<dyn ChunkCoherence>,
    expansion: Arc<dyn NarrativeExpansion>,
}

impl NarrativeBuilder {
    pub fn new(provider: SharedProvider) -> Self {
        Self::with_config(provider, NarrativeConfig::default())
    }

    pub fn with_config(provider: SharedProvider, config: NarrativeConfig) -> Self {
        Self {
            provider,
            config,
            relevance: Arc::new(FirstChunks::default()),
            section_coherence: Arc::new(IdentityCoherence),
            chunk_coherence: Arc::new(IdentityChunkCoherence),
            expansion: Arc::new(IdentityExpansion),
        }
    }

    /// Swap the chunk-relevance strategy
    pub fn with_relevance(mut self, relevance: Arc<dyn ChunkRelevance>) -> Self {
        self.relevance = relevance;
        self
    }

    /// Swap the section-level coherence pass
    pub fn with_section_coherence(mut self, coherence: Arc<dyn SectionCoherence>) -> Self {
        self.section_coherence = coherence;
        self
    }

    /// Swap the per-chunk narrative coherence pass
    pub fn with_chunk_coherence(mut self, coherence: Arc<dyn ChunkCoherence>) -> Self {
        self.chunk_coherence = coherence;
        self
    }

    /// Swap the under-length expansion step
    pub fn with_expansion(mut self, expansion: Arc<dyn NarrativeExpansion>) -> Self {
        self.expansion = expansion;
        self
    }

    /// Build the narrative for one research context.
    ///
    /// Never fails for well-formed input: the worst case is the minimal
    /// fallback narrative (heading plus the raw synthesized knowledge).
    /// Only malformed invocation - an empty query or empty knowledge -
    /// surfaces an error.
    #[instrument(skip_all, fields(session = %context.session_id))]
    pub async fn build(
        &self,
        context: &ResearchContext,
        synthesized_knowledge: &str,
    ) -> Result<String> {
        if context.original_query.trim().is_empty() {
            return Err(NarrativeError::InvalidInput(
                "original query must not be empty".into(),
            ));
        }
        if synthesized_knowledge.trim().is_empty() {
            return Err(NarrativeError::InvalidInput(
                "synthesized knowledge must not be empty".into(),
            ));
        }

        match self.run_pipeline(context, synthesized_knowledge).await {
            Ok(narrative) => Ok(narrative),
            Err(err) => {
                warn!(error = %err, "narrative pipeline failed, returning fallback narrative");
                Ok(Self::fallback_narrative(synthesized_knowledge))
            }
        }
    }

    async fn run_pipeline(
        &self,
        context: &ResearchContext,
        synthesized_knowledge: &str,
    ) -> Result<String> {
        let chunker = Arc::new(ContentChunker::new(
            self.config.context_window_tokens,
            self.config.chunk_overlap_ratio,
        ));

        let planner = StructurePlanner::new(
            Arc::clone(&self.provider),
            (*chunker).clone(),
            self.config.max_completion_retries,
        );
        let structure_outcome = planner.plan(context).await;
        if let Some(reason) = structure_outcome.reason() {
            warn!(%reason, "continuing with fallback structure");
        }
        let structure = structure_outcome.into_value();
        info!(sections = structure.len(), "structure finalized");

        let chunks = Arc::new(chunker.chunk_content(synthesized_knowledge));
        info!(chunks = chunks.len(), "synthesized knowledge chunked");

        let generator = Arc::new(SectionGenerator::new(
            Arc::clone(&self.provider),
            Arc::clone(&chunker),
            Arc::clone(&self.relevance),
            Arc::clone(&self.section_coherence),
            self.config.max_completion_retries,
        ));
        let orchestrator = ParallelOrchestrator::new(generator, self.config.max_workers);
        let sections_outcome = orchestrator
            .generate_all(&structure, chunks, Arc::new(context.clone()))
            .await;
        if let Some(reason) = sections_outcome.reason() {
            warn!(%reason, "continuing with placeholder sections");
        }
        let sections = sections_outcome.into_value();

        let narrative = NarrativeAssembler.assemble(&structure, &sections, context);

        let enhancer = CoherenceEnhancer::new(
            chunker,
            Arc::clone(&self.chunk_coherence),
            Arc::clone(&self.expansion),
            self.config.target_narrative_chars,
        );
        let enhanced_outcome = enhancer.enhance(&narrative, context).await;
        if let Some(reason) = enhanced_outcome.reason() {
            warn!(%reason, "keeping narrative as assembled");
        }
        let enhanced = enhanced_outcome.into_value();

        info!(
            chars = enhanced.chars().count(),
            "narrative build complete"
        );
        Ok(enhanced)
    }

    /// Minimal last-resort narrative
    fn fallback_narrative(synthesized_knowledge: &str) -> String {
        format!("# Fallback Narrative\n\n{synthesized_knowledge}")
    }
}
