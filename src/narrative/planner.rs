//! Adaptive Structure Planning
//!
//! Derives an ordered set of narrative sections from the research context
//! via the completion service, scaled by an estimated complexity score.
//! Planning never fails outward: any provider or parse problem degrades to
//! a fixed default structure.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::ai::provider::{SharedProvider, complete_with_retry};
use crate::constants::planner as planner_constants;
use crate::narrative::chunker::ContentChunker;
use crate::narrative::prompts;
use crate::types::context::ResearchContext;
use crate::types::narrative::{
    DegradeReason, NarrativeSection, NarrativeStructure, SectionPriority, StageOutcome,
};
use crate::types::Result;

static TARGET_LENGTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("static regex"));

/// Plans the narrative structure, degrading to a default on any failure
pub struct StructurePlanner {
    provider: SharedProvider,
    chunker: ContentChunker,
    max_retries: usize,
}

impl StructurePlanner {
    pub fn new(provider: SharedProvider, chunker: ContentChunker, max_retries: usize) -> Self {
        Self {
            provider,
            chunker,
            max_retries,
        }
    }

    /// Plan the structure for one build. Never fails; the fallback is the
    /// fixed default structure.
    pub async fn plan(&self, context: &ResearchContext) -> StageOutcome<NarrativeStructure> {
        match self.plan_inner(context).await {
            Ok(structure) if !structure.is_empty() => {
                debug!(sections = structure.len(), "structure planned");
                StageOutcome::Full(structure)
            }
            Ok(_) => {
                warn!("planner produced no sections, using default structure");
                StageOutcome::Degraded(
                    Self::default_structure(),
                    DegradeReason::PlanningFailed("no sections derived".into()),
                )
            }
            Err(err) => {
                warn!(error = %err, "structure planning failed, using default structure");
                StageOutcome::Degraded(
                    Self::default_structure(),
                    DegradeReason::PlanningFailed(err.to_string()),
                )
            }
        }
    }

    async fn plan_inner(&self, context: &ResearchContext) -> Result<NarrativeStructure> {
        let complexity = Self::complexity_score(context);
        let prompt = prompts::structure_planning_prompt(context, complexity);

        // The planning prompt itself may exceed the window; submit it as an
        // ordered sequence and merge the partial structures
        let pieces = self.chunker.chunk_prompt(&prompt);
        debug!(complexity, pieces = pieces.len(), "planning structure");

        let mut sections: Vec<NarrativeSection> = Vec::new();
        let mut seen_titles: HashSet<String> = HashSet::new();

        for piece in &pieces {
            let response = complete_with_retry(
                self.provider.as_ref(),
                &piece.content,
                &Value::Null,
                self.max_retries,
            )
            .await?;

            merge_sections(&mut sections, &mut seen_titles, parse_sections(&response.text()));
        }

        Ok(NarrativeStructure::new(sections))
    }

    /// Research complexity in [0, 10].
    ///
    /// Safe at zero counts: integer division never divides by the inputs.
    pub fn complexity_score(context: &ResearchContext) -> usize {
        let mut complexity = 0;
        complexity += (context.questions.len() / 2).min(3);
        complexity += (context.citations.len() / 20).min(3);
        complexity += if context.insights.len() > 10 { 2 } else { 1 };
        complexity += context.options.depth.level() + 1;
        complexity.min(10)
    }

    /// The fixed three-section fallback structure
    pub fn default_structure() -> NarrativeStructure {
        NarrativeStructure::new(vec![
            NarrativeSection::new(
                "Introduction",
                "Overview of the research topic",
                800,
                SectionPriority::High,
            ),
            NarrativeSection::new(
                "Technical Analysis",
                "Technical deep dive",
                1200,
                SectionPriority::High,
            ),
            NarrativeSection::new(
                "Implementation Guide",
                "Practical implementation",
                1000,
                SectionPriority::Medium,
            ),
        ])
    }
}

/// Merge newly parsed sections into the running structure.
///
/// Order-preserving and associative: sections append in the order parsed,
/// and the first section carrying a given title wins. Later duplicates are
/// dropped, which keeps titles unique for the title-keyed result map.
fn merge_sections(
    sections: &mut Vec<NarrativeSection>,
    seen_titles: &mut HashSet<String>,
    parsed: Vec<NarrativeSection>,
) {
    for section in parsed {
        if seen_titles.insert(section.title.clone()) {
            sections.push(section);
        } else {
            debug!(title = %section.title, "dropping duplicate planned section");
        }
    }
}

/// Parse `SECTION:` blocks from a planning response.
///
/// Tolerant of surrounding prose: lines outside a recognized field are
/// ignored, missing fields fall back to defaults.
fn parse_sections(text: &str) -> Vec<NarrativeSection> {
    struct Draft {
        title: String,
        focus: Option<String>,
        target_words: Option<usize>,
        priority: Option<SectionPriority>,
        depends_on: Vec<String>,
    }

    fn finish(draft: Draft) -> NarrativeSection {
        let focus = draft
            .focus
            .unwrap_or_else(|| format!("Coverage of {}", draft.title));
        NarrativeSection::new(
            draft.title,
            focus,
            draft
                .target_words
                .unwrap_or(planner_constants::DEFAULT_SECTION_WORDS),
            draft.priority.unwrap_or_default(),
        )
        .with_dependencies(draft.depends_on)
    }

    let mut out = Vec::new();
    let mut current: Option<Draft> = None;

    for line in text.lines() {
        let line = line.trim().trim_start_matches(['-', '*', ' ']);

        if let Some(raw) = field(line, "SECTION") {
            if let Some(draft) = current.take() {
                out.push(finish(draft));
            }
            if raw.is_empty() {
                continue;
            }
            current = Some(Draft {
                title: raw.to_string(),
                focus: None,
                target_words: None,
                priority: None,
                depends_on: Vec::new(),
            });
        } else if let Some(draft) = current.as_mut() {
            if let Some(raw) = field(line, "FOCUS") {
                draft.focus = Some(raw.to_string());
            } else if let Some(raw) = field(line, "TARGET_LENGTH") {
                draft.target_words = TARGET_LENGTH_RE
                    .find(raw)
                    .and_then(|m| m.as_str().parse().ok())
                    .filter(|n| *n > 0);
            } else if let Some(raw) = field(line, "PRIORITY") {
                draft.priority = Some(SectionPriority::parse(raw));
            } else if let Some(raw) = field(line, "DEPENDENCIES") {
                draft.depends_on = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty() && !d.eq_ignore_ascii_case("none"))
                    .map(String::from)
                    .collect();
            }
        }
    }

    if let Some(draft) = current.take() {
        out.push(finish(draft));
    }
    out
}

/// Extract the value of a `NAME: value` field line, stripping planner
/// bracket decoration
fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.trim_start();
    let value = rest.strip_prefix(':')?.trim();
    Some(value.trim_start_matches('[').trim_end_matches(']').trim())
}
