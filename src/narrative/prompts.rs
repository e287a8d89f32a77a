//! Prompt Construction
//!
//! Builders for the structure-planning and section-generation prompts.
//! Block headers here are load-bearing: `compress_prompt` recognizes the
//! evidence headers when it needs to shed weight, so renaming one means
//! updating `constants::prompt::EVIDENCE_HEADERS` too.

use crate::constants::prompt as prompt_constants;
use crate::types::context::{Citation, ResearchContext};
use crate::types::narrative::NarrativeSection;

/// Truncate to a character budget, marking the cut with an ellipsis
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// The adaptive structure-planning prompt
pub(crate) fn structure_planning_prompt(context: &ResearchContext, complexity: usize) -> String {
    let categories = context.distinct_categories().join(", ");
    let insights_summary = condensed_insights(context);

    format!(
        r#"Plan a comprehensive research narrative for: "{query}"

RESEARCH ANALYSIS:
- Complexity Score: {complexity}/10
- Questions Explored: {questions}
- Sources Analyzed: {citations}
- Research Categories: {categories}
- Processing Depth: {depth}

EXISTING INSIGHTS OVERVIEW:
{insights_summary}

Create a detailed narrative structure with:
1. Adaptive section hierarchy based on research complexity
2. Each section should be 1000-1500 words
3. Focus on implementation details, case studies, and quantitative insights
4. Ensure logical flow and seamless transitions
5. Prioritize actionable, evidence-based recommendations

Structure Format:
SECTION: [Title]
FOCUS: [Specific focus area]
TARGET_LENGTH: [Word count]
PRIORITY: [High/Medium/Low]
DEPENDENCIES: [Related sections]

Plan the adaptive structure:
"#,
        query = context.original_query,
        questions = context.questions.len(),
        citations = context.citations.len(),
        depth = context.options.depth,
    )
}

/// One section-generation prompt for one content chunk
pub(crate) fn section_prompt(
    section: &NarrativeSection,
    chunk_content: &str,
    context: &ResearchContext,
) -> String {
    format!(
        r#"Write a comprehensive section: "{title}"

SECTION SPECIFICATIONS:
- Focus: {focus}
- Target Length: {target} words
- Priority: {priority}
- Main Topic: {query}

RELEVANT CONTENT CHUNK:
{chunk_content}

SUPPORTING INSIGHTS:
{insights}

AUTHORITATIVE SOURCES:
{citations}

WRITING REQUIREMENTS:
1. Write approximately {target} words of detailed, technical content
2. Include specific examples, implementations, and quantitative data
3. Maintain an authoritative, professional tone throughout
4. Include inline source references [1], [2], etc.
5. Avoid generic statements - be specific and data-driven
6. Connect concepts to real-world applications

Generate the complete section content:
"#,
        title = section.title,
        focus = section.focus,
        target = section.target_words,
        priority = section.priority,
        query = context.original_query,
        insights = format_insights(context),
        citations = format_citations(&context.citations),
    )
}

/// Per-chunk coherence-improvement prompt used by the LLM-backed enhancer
pub(crate) fn chunk_coherence_prompt(chunk_content: &str, context: &ResearchContext) -> String {
    format!(
        r#"Improve the flow and coherence of this research narrative excerpt about "{query}".
Preserve all facts, citations, and headings; only smooth transitions and wording.

EXCERPT:
{chunk_content}

Return the improved excerpt only:
"#,
        query = context.original_query,
    )
}

/// Condensed insight overview for the planning prompt
fn condensed_insights(context: &ResearchContext) -> String {
    if context.insights.is_empty() {
        return "- (no insights recorded)".to_string();
    }
    context
        .insights
        .values()
        .take(prompt_constants::SUMMARY_INSIGHT_LIMIT)
        .map(|text| format!("- {}", truncate(text, prompt_constants::SUMMARY_INSIGHT_CHARS)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Up to `INSIGHT_LIMIT` supporting insights, each excerpted
fn format_insights(context: &ResearchContext) -> String {
    if context.insights.is_empty() {
        return "(none)".to_string();
    }
    context
        .insights
        .values()
        .take(prompt_constants::INSIGHT_LIMIT)
        .map(|text| format!("- {}", truncate(text, prompt_constants::INSIGHT_EXCERPT_CHARS)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Up to `CITATION_LIMIT` numbered citations, bodies excerpted
fn format_citations(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return "(none)".to_string();
    }
    citations
        .iter()
        .take(prompt_constants::CITATION_LIMIT)
        .enumerate()
        .map(|(i, citation)| {
            format!(
                "[{}] {}: {}",
                i + 1,
                citation.title,
                truncate(&citation.content, prompt_constants::CITATION_EXCERPT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::context::ResearchQuestion;
    use crate::types::narrative::SectionPriority;

    fn sample_context() -> ResearchContext {
        ResearchContext::new("rust async runtimes")
            .add_question(ResearchQuestion::new("how do wakers work", "internals"))
            .add_insight("wakers", "Wakers are cheap to clone and wake tasks by id")
            .add_citation(Citation::new("Tokio docs", "The runtime multiplexes tasks"))
    }

    #[test]
    fn test_truncate_marks_cut() {
        assert_eq!(truncate("short", 10), "short");
        let cut = truncate("a much longer piece of text", 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_planning_prompt_embeds_analysis() {
        let prompt = structure_planning_prompt(&sample_context(), 7);
        assert!(prompt.contains("rust async runtimes"));
        assert!(prompt.contains("Complexity Score: 7/10"));
        assert!(prompt.contains("internals"));
        assert!(prompt.contains("SECTION: [Title]"));
    }

    #[test]
    fn test_section_prompt_embeds_spec_and_evidence() {
        let section =
            NarrativeSection::new("Scheduling", "task scheduling", 900, SectionPriority::High);
        let prompt = section_prompt(&section, "chunk body", &sample_context());

        assert!(prompt.contains("\"Scheduling\""));
        assert!(prompt.contains("Target Length: 900 words"));
        assert!(prompt.contains("chunk body"));
        assert!(prompt.contains("[1] Tokio docs"));
        assert!(prompt.contains("SUPPORTING INSIGHTS:"));
        assert!(prompt.contains("WRITING REQUIREMENTS:"));
    }

    #[test]
    fn test_citation_numbering_caps_at_limit() {
        let citations: Vec<Citation> = (0..8)
            .map(|i| Citation::new(format!("Source {i}"), "body"))
            .collect();
        let formatted = format_citations(&citations);
        assert!(formatted.contains("[4] Source 3"));
        assert!(!formatted.contains("[5]"));
    }
}
