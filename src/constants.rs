//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Narrative pipeline constants
pub mod narrative {
    /// Target length of the final narrative, in characters
    pub const TARGET_NARRATIVE_CHARS: usize = 8000;

    /// Narratives shorter than this fraction of the target go through
    /// the expansion path instead of per-chunk coherence improvement
    pub const EXPANSION_TRIGGER_RATIO: f64 = 0.8;

    /// Default number of concurrent section-generation workers
    pub const DEFAULT_MAX_WORKERS: usize = 4;

    /// Default number of content chunks fed into one section
    pub const RELEVANT_CHUNK_LIMIT: usize = 5;
}

/// Context-window chunking constants
pub mod chunking {
    /// Default context-window limit in estimated tokens
    pub const CONTEXT_WINDOW_TOKENS: usize = 32_000;

    /// Fraction of a chunk repeated at the start of the next chunk
    pub const CHUNK_OVERLAP_RATIO: f64 = 0.15;

    /// Smallest budget `compress_prompt` accepts before clamping
    pub const MIN_COMPRESS_BUDGET: usize = 64;

    /// Rough characters-per-token used to size the initial chunk window
    /// before the injected counter verifies the estimate
    pub const APPROX_CHARS_PER_TOKEN: usize = 4;
}

/// Prompt construction limits
pub mod prompt {
    /// Maximum supporting insights embedded in a section prompt
    pub const INSIGHT_LIMIT: usize = 3;

    /// Character cap for each embedded insight
    pub const INSIGHT_EXCERPT_CHARS: usize = 250;

    /// Maximum numbered citations embedded in a section prompt
    pub const CITATION_LIMIT: usize = 4;

    /// Character cap for each embedded citation body
    pub const CITATION_EXCERPT_CHARS: usize = 150;

    /// Insights summarized in the structure-planning prompt
    pub const SUMMARY_INSIGHT_LIMIT: usize = 3;

    /// Character cap for each summarized insight
    pub const SUMMARY_INSIGHT_CHARS: usize = 100;

    /// Prompt block headers that may be truncated during compression,
    /// in truncation order (least essential first)
    pub const EVIDENCE_HEADERS: [&str; 3] = [
        "SUPPORTING INSIGHTS",
        "AUTHORITATIVE SOURCES",
        "RELEVANT CONTENT CHUNK",
    ];
}

/// Completion retry constants
pub mod retry {
    /// Default maximum retries per completion request
    pub const DEFAULT_MAX_RETRIES: usize = 2;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f64 = 2.0;
}

/// Structure planning constants
pub mod planner {
    /// Section word target used when the model omits TARGET_LENGTH
    pub const DEFAULT_SECTION_WORDS: usize = 1000;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
}
