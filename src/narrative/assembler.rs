//! Narrative Assembly
//!
//! Deterministically orders the generated pieces into one document:
//! executive summary, sections in structure order with transitions between
//! them, conclusion, and bibliography. Pure string work - no provider
//! calls, no dependence on the order parallel tasks completed in.

use crate::types::context::ResearchContext;
use crate::types::narrative::{NarrativeSection, NarrativeStructure, SectionMap};

/// Assembles the final document from structure and section texts
pub struct NarrativeAssembler;

impl NarrativeAssembler {
    /// Deterministic assembly; missing section titles render as empty
    /// bodies rather than errors.
    pub fn assemble(
        &self,
        structure: &NarrativeStructure,
        sections: &SectionMap,
        context: &ResearchContext,
    ) -> String {
        let mut narrative = String::new();

        narrative.push_str(&self.executive_summary(context));
        narrative.push_str("\n\n");

        let planned = structure.sections();
        for (i, section) in planned.iter().enumerate() {
            narrative.push_str(&format!("## {}\n\n", section.title));
            narrative.push_str(
                sections
                    .get(&section.title)
                    .map(String::as_str)
                    .unwrap_or(""),
            );

            if let Some(next) = planned.get(i + 1) {
                narrative.push_str("\n\n");
                narrative.push_str(&self.transition(section, next));
            }

            narrative.push_str("\n\n");
        }

        narrative.push_str(&self.conclusion(context));
        narrative.push_str("\n\n");
        narrative.push_str(&self.bibliography(context));

        narrative
    }

    fn executive_summary(&self, context: &ResearchContext) -> String {
        format!(
            "# Executive Summary\n\nComprehensive analysis of: {}",
            context.original_query
        )
    }

    /// Bridge sentence referencing both sections' focus areas
    fn transition(&self, current: &NarrativeSection, next: &NarrativeSection) -> String {
        format!(
            "Having explored {}, we now examine {}...",
            current.focus, next.focus
        )
    }

    fn conclusion(&self, context: &ResearchContext) -> String {
        format!(
            "# Conclusion\n\nThis research provides comprehensive insights into {}",
            context.original_query
        )
    }

    fn bibliography(&self, context: &ResearchContext) -> String {
        format!("# References\n\n{} sources analyzed.", context.citations.len())
    }
}
