//! Narrative Structure Types
//!
//! The planned outline of a narrative document, plus the explicit
//! degradation model pipeline stages report through. Every stage returns a
//! usable value; `StageOutcome` records whether it came from the primary
//! path or a deterministic fallback.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Generated section text keyed by section title.
///
/// Titles are the join key between structure and content; the planner
/// guarantees uniqueness within one structure.
pub type SectionMap = HashMap<String, String>;

/// Section priority as planned by the structure planner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl SectionPriority {
    /// Parse a priority from free-form planner output, defaulting to Medium
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl std::fmt::Display for SectionPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::Low => write!(f, "Low"),
        }
    }
}

/// One titled subdivision of the final document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeSection {
    /// Unique within one structure
    pub title: String,
    /// What the section should concentrate on
    pub focus: String,
    /// Target word count, always positive
    pub target_words: usize,
    pub priority: SectionPriority,
    /// Titles of sections this one builds on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl NarrativeSection {
    pub fn new(
        title: impl Into<String>,
        focus: impl Into<String>,
        target_words: usize,
        priority: SectionPriority,
    ) -> Self {
        Self {
            title: title.into(),
            focus: focus.into(),
            target_words: target_words.max(1),
            priority,
            depends_on: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, depends_on: Vec<String>) -> Self {
        self.depends_on = depends_on;
        self
    }
}

/// Ordered set of sections defining document order.
///
/// Pipeline-facing structures are never empty; the planner substitutes its
/// default structure before one could escape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeStructure {
    sections: Vec<NarrativeSection>,
}

impl NarrativeStructure {
    pub fn new(sections: Vec<NarrativeSection>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[NarrativeSection] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.title.as_str())
    }
}

// =============================================================================
// Stage Degradation Model
// =============================================================================

/// Why a pipeline stage fell back to its deterministic substitute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradeReason {
    /// Structure planning failed; the fixed default structure was used
    PlanningFailed(String),
    /// One section's generation failed; its fallback text was used
    SectionFailed { title: String, detail: String },
    /// The parallel execution substrate could not run at all; every section
    /// got minimal placeholder text
    BatchFailed(String),
    /// Coherence enhancement failed; the pre-enhancement narrative was kept
    EnhancementFailed(String),
}

impl std::fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlanningFailed(detail) => write!(f, "planning failed: {detail}"),
            Self::SectionFailed { title, detail } => {
                write!(f, "section '{title}' failed: {detail}")
            }
            Self::BatchFailed(detail) => write!(f, "batch orchestration failed: {detail}"),
            Self::EnhancementFailed(detail) => write!(f, "enhancement failed: {detail}"),
        }
    }
}

/// How a pipeline stage arrived at its value.
///
/// The public contract of every stage is "always yields a usable value";
/// this type keeps the degradation path explicit and testable instead of
/// hiding it behind exception interception.
#[derive(Debug, Clone)]
pub enum StageOutcome<T> {
    /// Primary path succeeded
    Full(T),
    /// Primary path failed; the value is the deterministic fallback
    Degraded(T, DegradeReason),
}

impl<T> StageOutcome<T> {
    pub fn into_value(self) -> T {
        match self {
            Self::Full(value) | Self::Degraded(value, _) => value,
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Full(value) | Self::Degraded(value, _) => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(..))
    }

    pub fn reason(&self) -> Option<&DegradeReason> {
        match self {
            Self::Full(_) => None,
            Self::Degraded(_, reason) => Some(reason),
        }
    }
}
