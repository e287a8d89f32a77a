//! Core Types
//!
//! Shared data model: research context, narrative structure, and the
//! unified error types.

pub mod context;
pub mod error;
pub mod narrative;

pub use context::{Citation, ResearchContext, ResearchDepth, ResearchOptions, ResearchQuestion};
pub use error::{CompletionError, ErrorCategory, NarrativeError, Result};
pub use narrative::{
    DegradeReason, NarrativeSection, NarrativeStructure, SectionMap, SectionPriority, StageOutcome,
};
