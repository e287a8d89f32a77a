//! Research Context
//!
//! The read-only input to one narrative build: the original query, explored
//! research questions, accumulated insights, and the citation set. Owned by
//! the caller; the pipeline never mutates it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How deep the surrounding research process went.
///
/// The ordinal feeds the structure planner's complexity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchDepth {
    Basic,
    #[default]
    Standard,
    Comprehensive,
    Exhaustive,
}

impl ResearchDepth {
    /// Ordinal position (0..=3)
    pub fn level(&self) -> usize {
        match self {
            Self::Basic => 0,
            Self::Standard => 1,
            Self::Comprehensive => 2,
            Self::Exhaustive => 3,
        }
    }
}

impl std::fmt::Display for ResearchDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Standard => write!(f, "standard"),
            Self::Comprehensive => write!(f, "comprehensive"),
            Self::Exhaustive => write!(f, "exhaustive"),
        }
    }
}

/// Options the caller's research configuration exposes to the pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchOptions {
    pub depth: ResearchDepth,
}

/// One research question explored during the session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchQuestion {
    pub text: String,
    /// Thematic category, used to summarize breadth for the planner
    pub category: String,
}

impl ResearchQuestion {
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
        }
    }
}

/// A retrieved source backing the narrative
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_at: Option<DateTime<Utc>>,
}

impl Citation {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            url: None,
            retrieved_at: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_retrieved_at(mut self, at: DateTime<Utc>) -> Self {
        self.retrieved_at = Some(at);
        self
    }
}

/// Read-only research state for one narrative build.
///
/// Insights use a `BTreeMap` so iteration order is deterministic; prompt
/// construction and tests depend on that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchContext {
    pub session_id: Uuid,
    pub original_query: String,
    pub questions: Vec<ResearchQuestion>,
    pub insights: BTreeMap<String, String>,
    pub citations: Vec<Citation>,
    pub options: ResearchOptions,
}

impl ResearchContext {
    pub fn new(original_query: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            original_query: original_query.into(),
            questions: Vec::new(),
            insights: BTreeMap::new(),
            citations: Vec::new(),
            options: ResearchOptions::default(),
        }
    }

    pub fn with_depth(mut self, depth: ResearchDepth) -> Self {
        self.options.depth = depth;
        self
    }

    pub fn add_question(mut self, question: ResearchQuestion) -> Self {
        self.questions.push(question);
        self
    }

    pub fn add_insight(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.insights.insert(key.into(), text.into());
        self
    }

    pub fn add_citation(mut self, citation: Citation) -> Self {
        self.citations.push(citation);
        self
    }

    /// Distinct question categories in first-seen order
    pub fn distinct_categories(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for q in &self.questions {
            if !seen.contains(&q.category.as_str()) {
                seen.push(q.category.as_str());
            }
        }
        seen
    }
}
