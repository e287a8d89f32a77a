//! NarraWeave - AI-Driven Research Narrative Builder
//!
//! Assembles long-form, multi-section narrative documents from synthesized
//! research material by driving a language-model completion service
//! through a multi-stage pipeline.
//!
//! ## Core Features
//!
//! - **Adaptive Planning**: section structure scaled to research complexity
//! - **Context-Window Chunking**: overlapping chunks under a token budget
//! - **Parallel Generation**: bounded fan-out with per-section isolation
//! - **Graceful Degradation**: every stage falls back to a deterministic
//!   result; the build always yields a usable document
//! - **Pluggable Strategies**: relevance ranking, coherence passes, and
//!   token estimation are injectable
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use narraweave::{NarrativeBuilder, ResearchContext};
//! use narraweave::provider::{OpenAiCompatProvider, ProviderConfig};
//!
//! let provider = Arc::new(OpenAiCompatProvider::new(ProviderConfig::default())?);
//! let builder = NarrativeBuilder::new(provider);
//!
//! let context = ResearchContext::new("rust async runtimes");
//! let narrative = builder.build(&context, &synthesized_knowledge).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: completion-service abstraction and token estimation
//! - [`narrative`]: the generation pipeline
//! - [`types`]: research context, structure types, and errors

pub mod ai;
pub mod constants;
pub mod narrative;
pub mod types;

pub use ai::provider;

// =============================================================================
// Core Re-exports
// =============================================================================

// Error Types
pub use types::error::{CompletionError, ErrorCategory, NarrativeError, Result};

// Research Context
pub use types::context::{
    Citation, ResearchContext, ResearchDepth, ResearchOptions, ResearchQuestion,
};

// Structure Types
pub use types::narrative::{
    DegradeReason, NarrativeSection, NarrativeStructure, SectionMap, SectionPriority, StageOutcome,
};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use narrative::{
    ContentChunk, ContentChunker, NarrativeAssembler, NarrativeBuilder, NarrativeConfig,
    ParallelOrchestrator, PromptChunk, SectionGenerator, StructurePlanner,
};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    CompletionProvider, CompletionResponse, OpenAiCompatProvider, ProviderConfig, SharedProvider,
    TokenCounter, TokenEstimator, complete_with_retry,
};
