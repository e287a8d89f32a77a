//! Context-Aware Chunking
//!
//! Splits arbitrary-length text into ordered, overlapping segments that
//! individually fit the configured context window, and compresses
//! over-budget prompts down to a token budget.
//!
//! Sizes are checked against the injected [`TokenCounter`], a length-based
//! heuristic rather than an exact tokenizer; the chunker shrinks windows
//! until the estimate fits, so the guarantee is only as good as the
//! estimate.

use crate::ai::tokenizer::TokenCounter;
use crate::constants::chunking::{APPROX_CHARS_PER_TOKEN, MIN_COMPRESS_BUDGET};
use crate::constants::prompt::EVIDENCE_HEADERS;

/// A bounded-size slice of source material used as generation context
#[derive(Debug, Clone)]
pub struct ContentChunk {
    /// Position in chunk order
    pub index: usize,
    /// Char offset of this chunk within the source text
    pub offset: usize,
    pub content: String,
}

/// A bounded-size slice of an outbound request to the completion service
#[derive(Debug, Clone)]
pub struct PromptChunk {
    /// Position in submission order
    pub index: usize,
    /// Total number of chunks the request was split into
    pub total: usize,
    pub content: String,
}

/// Splits content and prompts against a context-window token budget
#[derive(Debug, Clone)]
pub struct ContentChunker {
    counter: TokenCounter,
    window_tokens: usize,
    overlap_ratio: f64,
}

impl ContentChunker {
    pub fn new(window_tokens: usize, overlap_ratio: f64) -> Self {
        Self {
            counter: TokenCounter::default(),
            window_tokens: window_tokens.max(1),
            overlap_ratio: overlap_ratio.clamp(0.0, 0.9),
        }
    }

    /// Substitute a different token-estimation strategy
    pub fn with_counter(mut self, counter: TokenCounter) -> Self {
        self.counter = counter;
        self
    }

    pub fn window_tokens(&self) -> usize {
        self.window_tokens
    }

    /// Split source material into ordered, overlapping content chunks.
    ///
    /// Consecutive chunks overlap by the configured ratio so section
    /// context is not lost at a split boundary; the last chunk may be
    /// shorter.
    pub fn chunk_content(&self, content: &str) -> Vec<ContentChunk> {
        self.windows(content, false, self.overlap_ratio)
            .into_iter()
            .enumerate()
            .map(|(index, (offset, content))| ContentChunk {
                index,
                offset,
                content,
            })
            .collect()
    }

    /// Split an over-budget outbound prompt into an ordered request sequence
    pub fn chunk_prompt(&self, prompt: &str) -> Vec<PromptChunk> {
        self.prompt_chunks(prompt, false, self.overlap_ratio)
    }

    /// Split an assembled narrative for per-chunk post-processing.
    ///
    /// Prefers paragraph boundaries in the back half of each window so
    /// coherence passes see whole paragraphs. Narrative chunks partition
    /// the text without overlap: they are reconcatenated after
    /// improvement, and overlap would duplicate passages in the output.
    pub fn chunk_narrative(&self, narrative: &str) -> Vec<PromptChunk> {
        self.prompt_chunks(narrative, true, 0.0)
    }

    fn prompt_chunks(
        &self,
        text: &str,
        prefer_paragraphs: bool,
        overlap_ratio: f64,
    ) -> Vec<PromptChunk> {
        let windows = self.windows(text, prefer_paragraphs, overlap_ratio);
        let total = windows.len();
        windows
            .into_iter()
            .enumerate()
            .map(|(index, (_, content))| PromptChunk {
                index,
                total,
                content,
            })
            .collect()
    }

    /// Compress a prompt until its estimate fits `token_budget`.
    ///
    /// Deterministic for identical input and idempotent: a prompt that
    /// already fits is returned unchanged. Evidence blocks are truncated
    /// before structural instructions; only as a last resort is the text
    /// cut to the largest prefix that fits.
    pub fn compress_prompt(&self, prompt: &str, token_budget: usize) -> String {
        let budget = token_budget.max(MIN_COMPRESS_BUDGET);
        if self.counter.fits_budget(prompt, budget) {
            return prompt.to_string();
        }

        let mut compressed = prompt.to_string();
        for header in EVIDENCE_HEADERS {
            compressed = truncate_block(&compressed, header);
            if self.counter.fits_budget(&compressed, budget) {
                return compressed;
            }
        }

        self.largest_fitting_prefix(&compressed, budget)
    }

    /// Ordered `(char_offset, content)` windows whose estimates fit the
    /// context window
    fn windows(
        &self,
        text: &str,
        prefer_paragraphs: bool,
        overlap_ratio: f64,
    ) -> Vec<(usize, String)> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let approx_window = (self.window_tokens * APPROX_CHARS_PER_TOKEN).max(1);
        let mut windows = Vec::new();
        let mut start = 0;

        loop {
            let mut end = (start + approx_window).min(chars.len());
            let mut piece: String = chars[start..end].iter().collect();

            // The char-based guess can overshoot other estimators; shrink
            // until the injected counter agrees
            while end > start + 1 && self.counter.exceeds_budget(&piece, self.window_tokens) {
                let shrink = ((end - start) / 10).max(1);
                end -= shrink;
                piece = chars[start..end].iter().collect();
            }

            if prefer_paragraphs && end < chars.len() {
                if let Some(cut) = paragraph_cut(&chars, start, end) {
                    end = cut;
                    piece = chars[start..end].iter().collect();
                }
            }

            windows.push((start, piece));

            if end >= chars.len() {
                break;
            }

            let len = end - start;
            let overlap = (len as f64 * overlap_ratio) as usize;
            start += len.saturating_sub(overlap).max(1);
        }

        windows
    }

    /// Largest prefix (by char count) whose estimate fits the budget
    fn largest_fitting_prefix(&self, text: &str, budget: usize) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut lo = 0usize;
        let mut hi = chars.len();
        while lo < hi {
            let mid = lo + (hi - lo).div_ceil(2);
            let candidate: String = chars[..mid].iter().collect();
            if self.counter.fits_budget(&candidate, budget) {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        chars[..lo].iter().collect()
    }
}

/// Cut position after the last paragraph break in the back half of
/// `[start, end)`, if any
fn paragraph_cut(chars: &[char], start: usize, end: usize) -> Option<usize> {
    let half = start + (end - start) / 2;
    for i in (half..end.saturating_sub(1)).rev() {
        if chars[i] == '\n' && chars[i + 1] == '\n' {
            return Some(i + 2);
        }
    }
    None
}

/// Replace the body of a named prompt block with a short marker, leaving
/// the header line and all other blocks untouched
fn truncate_block(text: &str, header: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let Some(header_at) = lines
        .iter()
        .position(|line| line.trim_start().starts_with(header))
    else {
        return text.to_string();
    };

    let body_end = lines[header_at + 1..]
        .iter()
        .position(|line| is_block_header(line))
        .map(|i| header_at + 1 + i)
        .unwrap_or(lines.len());

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    out.extend(&lines[..=header_at]);
    out.push("[trimmed for length]");
    out.push("");
    out.extend(&lines[body_end..]);
    out.join("\n")
}

/// A block header is a non-empty line of uppercase text ending with ':'
fn is_block_header(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() > 1
        && trimmed.ends_with(':')
        && trimmed
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_whitespace() || c == ':' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_text(words: usize) -> String {
        (0..words)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_empty_content_produces_no_chunks() {
        let chunker = ContentChunker::new(100, 0.15);
        assert!(chunker.chunk_content("").is_empty());
    }

    #[test]
    fn test_small_content_is_one_chunk() {
        let chunker = ContentChunker::new(100, 0.15);
        let chunks = chunker.chunk_content("small piece of text");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].offset, 0);
        assert_eq!(chunks[0].content, "small piece of text");
    }

    #[test]
    fn test_chunks_overlap_and_cover() {
        let chunker = ContentChunker::new(25, 0.15);
        let text = sample_text(200);
        let chunks = chunker.chunk_content(&text);
        assert!(chunks.len() > 1);

        let total_chars = text.chars().count();
        let mut prev_end = 0;
        for chunk in &chunks {
            let len = chunk.content.chars().count();
            // no gap: each chunk starts at or before the previous end
            assert!(chunk.offset <= prev_end);
            // content matches the original slice at its offset
            let original: String = text
                .chars()
                .skip(chunk.offset)
                .take(len)
                .collect();
            assert_eq!(chunk.content, original);
            prev_end = chunk.offset + len;
        }
        assert_eq!(prev_end, total_chars);

        // consecutive chunks actually overlap
        assert!(chunks[1].offset < chunks[0].content.chars().count());
    }

    #[test]
    fn test_prompt_chunks_are_numbered() {
        let chunker = ContentChunker::new(25, 0.15);
        let chunks = chunker.chunk_prompt(&sample_text(200));
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.total, chunks.len());
        }
    }

    #[test]
    fn test_narrative_chunks_prefer_paragraph_breaks() {
        let chunker = ContentChunker::new(30, 0.15);
        let paragraphs: Vec<String> = (0..20).map(|_| sample_text(12)).collect();
        let narrative = paragraphs.join("\n\n");
        let chunks = chunker.chunk_narrative(&narrative);
        assert!(chunks.len() > 1);
        // every non-final chunk ends at a paragraph boundary
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.content.ends_with("\n\n"), "chunk should end at a paragraph break");
        }
    }

    #[test]
    fn test_narrative_chunks_partition_without_duplication() {
        let chunker = ContentChunker::new(30, 0.15);
        let narrative = (0..20)
            .map(|_| sample_text(12))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunker.chunk_narrative(&narrative);
        assert!(chunks.len() > 1);

        let rejoined: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(rejoined, narrative);
    }

    #[test]
    fn test_compress_noop_when_within_budget() {
        let chunker = ContentChunker::new(32_000, 0.15);
        let prompt = "short prompt";
        assert_eq!(chunker.compress_prompt(prompt, 1000), prompt);
    }

    #[test]
    fn test_compress_drops_evidence_before_instructions() {
        let chunker = ContentChunker::new(32_000, 0.15);
        let evidence = sample_text(600);
        let prompt = format!(
            "Write the section.\n\nSUPPORTING INSIGHTS:\n{evidence}\n\nWRITING REQUIREMENTS:\n1. Stay factual\n"
        );
        let budget = 120;
        let compressed = chunker.compress_prompt(&prompt, budget);

        assert!(TokenCounter::default().fits_budget(&compressed, budget));
        assert!(compressed.contains("WRITING REQUIREMENTS:"));
        assert!(compressed.contains("SUPPORTING INSIGHTS:"));
        assert!(!compressed.contains("word599"));
    }

    #[test]
    fn test_compress_is_idempotent() {
        let chunker = ContentChunker::new(32_000, 0.15);
        let prompt = sample_text(2000);
        let once = chunker.compress_prompt(&prompt, 200);
        let twice = chunker.compress_prompt(&once, 200);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_block_header_detection() {
        assert!(is_block_header("SUPPORTING INSIGHTS:"));
        assert!(is_block_header("  WRITING REQUIREMENTS:"));
        assert!(!is_block_header("Not a header:"));
        assert!(!is_block_header(""));
        assert!(!is_block_header("1. Stay factual"));
    }

    proptest! {
        #[test]
        fn prop_chunk_estimates_never_exceed_window(
            text in "\\PC{0,1500}",
            window in 8usize..200,
        ) {
            let chunker = ContentChunker::new(window, 0.15);
            let counter = TokenCounter::default();
            for chunk in chunker.chunk_content(&text) {
                prop_assert!(counter.count(&chunk.content) <= window);
            }
        }

        #[test]
        fn prop_chunks_cover_source_without_gaps(
            text in "\\PC{1,1500}",
            window in 8usize..200,
        ) {
            let chunker = ContentChunker::new(window, 0.15);
            let chunks = chunker.chunk_content(&text);
            prop_assert!(!chunks.is_empty());

            let mut prev_end = 0;
            for chunk in &chunks {
                prop_assert!(chunk.offset <= prev_end);
                prev_end = chunk.offset + chunk.content.chars().count();
            }
            prop_assert_eq!(prev_end, text.chars().count());
        }

        #[test]
        fn prop_compress_fits_budget_and_is_idempotent(
            text in "\\PC{0,2000}",
            budget in 64usize..400,
        ) {
            let chunker = ContentChunker::new(32_000, 0.15);
            let counter = TokenCounter::default();
            let once = chunker.compress_prompt(&text, budget);
            prop_assert!(counter.fits_budget(&once, budget));
            prop_assert_eq!(&chunker.compress_prompt(&once, budget), &once);
        }
    }
}
