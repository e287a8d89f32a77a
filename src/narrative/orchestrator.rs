//! Parallel Section Orchestration
//!
//! Fans section generation out across bounded concurrent tasks and fans
//! the results back into a title-keyed map. Two degradation tiers:
//!
//! 1. A single task failing (or panicking) yields that section's fallback
//!    text without touching its siblings.
//! 2. The execution substrate being unavailable degrades the whole batch
//!    to minimal placeholder text per section, with no provider calls.
//!
//! Completion order never matters; document order is imposed later by the
//! assembler from structure order.

use std::sync::Arc;

use dashmap::DashMap;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::narrative::chunker::ContentChunk;
use crate::narrative::generator::SectionGenerator;
use crate::types::context::ResearchContext;
use crate::types::narrative::{DegradeReason, NarrativeStructure, SectionMap, StageOutcome};

/// Runs section generation across a bounded worker pool
pub struct ParallelOrchestrator {
    generator: Arc<SectionGenerator>,
    max_workers: usize,
}

impl ParallelOrchestrator {
    pub fn new(generator: Arc<SectionGenerator>, max_workers: usize) -> Self {
        Self {
            generator,
            max_workers: max_workers.max(1),
        }
    }

    /// Generate every section of the structure, keyed by title.
    ///
    /// Returns `Degraded` only for the whole-batch tier; individual section
    /// fallbacks are already substituted into the map by tier one.
    pub async fn generate_all(
        &self,
        structure: &NarrativeStructure,
        chunks: Arc<Vec<ContentChunk>>,
        context: Arc<ResearchContext>,
    ) -> StageOutcome<SectionMap> {
        // The fan-out needs a task spawner; without one (e.g. driven from a
        // foreign executor) fall back to sequential placeholders
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("no async runtime available, filling sections with placeholders");
            return StageOutcome::Degraded(
                Self::placeholder_sections(structure),
                DegradeReason::BatchFailed("async runtime unavailable".into()),
            );
        }

        let results: Arc<DashMap<String, String>> = Arc::new(DashMap::new());
        let mut degraded_sections = 0usize;

        debug!(
            sections = structure.len(),
            workers = self.max_workers,
            "starting parallel section generation"
        );

        let mut tasks = futures::stream::iter(structure.sections().to_vec())
            .map(|section| {
                let generator = Arc::clone(&self.generator);
                let chunks = Arc::clone(&chunks);
                let context = Arc::clone(&context);
                let results = Arc::clone(&results);
                async move {
                    let title = section.title.clone();
                    // computed up front so a panicking task still yields text
                    let panic_fallback = SectionGenerator::fallback_section(&section, &context);

                    let handle = tokio::spawn(async move {
                        generator.generate(&section, &chunks, &context).await
                    });

                    match handle.await {
                        Ok(outcome) => {
                            let degraded = outcome.is_degraded();
                            if let Some(reason) = outcome.reason() {
                                warn!(%reason, "section degraded");
                            }
                            results.insert(title, outcome.into_value());
                            degraded
                        }
                        Err(join_err) => {
                            warn!(title = %title, error = %join_err, "section task aborted");
                            results.insert(title, panic_fallback);
                            true
                        }
                    }
                }
            })
            .buffer_unordered(self.max_workers);

        while let Some(degraded) = tasks.next().await {
            if degraded {
                degraded_sections += 1;
            }
        }
        drop(tasks);

        info!(
            sections = structure.len(),
            degraded = degraded_sections,
            "section generation complete"
        );

        let map: SectionMap = match Arc::try_unwrap(results) {
            Ok(owned) => owned.into_iter().collect(),
            Err(shared) => shared
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        };
        StageOutcome::Full(map)
    }

    /// Minimal per-section placeholder map for the whole-batch tier
    pub fn placeholder_sections(structure: &NarrativeStructure) -> SectionMap {
        structure
            .sections()
            .iter()
            .map(|section| {
                (
                    section.title.clone(),
                    format!("Generated content for {}", section.title),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::testing::StubProvider;
    use crate::narrative::chunker::ContentChunker;
    use crate::narrative::generator::{FirstChunks, IdentityCoherence};
    use crate::types::narrative::{NarrativeSection, SectionPriority};
    use crate::types::ErrorCategory;

    fn structure(titles: &[&str]) -> NarrativeStructure {
        NarrativeStructure::new(
            titles
                .iter()
                .map(|t| {
                    NarrativeSection::new(*t, format!("{t} focus"), 800, SectionPriority::Medium)
                })
                .collect(),
        )
    }

    fn chunks() -> Arc<Vec<ContentChunk>> {
        Arc::new(vec![ContentChunk {
            index: 0,
            offset: 0,
            content: "shared research material".into(),
        }])
    }

    fn orchestrator(provider: Arc<StubProvider>, workers: usize) -> ParallelOrchestrator {
        let generator = SectionGenerator::new(
            provider,
            Arc::new(ContentChunker::new(32_000, 0.15)),
            Arc::new(FirstChunks::default()),
            Arc::new(IdentityCoherence),
            0,
        );
        ParallelOrchestrator::new(Arc::new(generator), workers)
    }

    #[tokio::test]
    async fn test_all_sections_present_in_result_map() {
        let provider = Arc::new(StubProvider::new("body"));
        let orchestrator = orchestrator(provider, 4);
        let structure = structure(&["Alpha", "Beta", "Gamma"]);

        let outcome = orchestrator
            .generate_all(
                &structure,
                chunks(),
                Arc::new(ResearchContext::new("query")),
            )
            .await;
        assert!(!outcome.is_degraded());
        let map = outcome.into_value();
        assert_eq!(map.len(), 3);
        for title in ["Alpha", "Beta", "Gamma"] {
            assert_eq!(map[title], "body");
        }
    }

    #[tokio::test]
    async fn test_single_failure_is_isolated_from_siblings() {
        let provider = Arc::new(
            StubProvider::new("normally generated text")
                .fail_on("Beta", ErrorCategory::Unavailable),
        );
        let orchestrator = orchestrator(provider, 4);
        let structure = structure(&["Alpha", "Beta", "Gamma"]);

        let outcome = orchestrator
            .generate_all(
                &structure,
                chunks(),
                Arc::new(ResearchContext::new("query")),
            )
            .await;
        let map = outcome.into_value();

        assert_eq!(map["Alpha"], "normally generated text");
        assert_eq!(map["Gamma"], "normally generated text");
        // the failed section got its deterministic fallback instead
        assert!(map["Beta"].contains("Beta focus"));
        assert!(map["Beta"].contains("query"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_order_does_not_affect_results() {
        // First-listed section finishes last
        let provider = Arc::new(
            StubProvider::new("fast")
                .on("Slow", "slow body")
                .delay_on("Slow", 5_000),
        );
        let orchestrator = orchestrator(provider, 4);
        let structure = structure(&["Slow", "Quick"]);

        let map = orchestrator
            .generate_all(
                &structure,
                chunks(),
                Arc::new(ResearchContext::new("query")),
            )
            .await
            .into_value();

        assert_eq!(map["Slow"], "slow body");
        assert_eq!(map["Quick"], "fast");
    }

    #[test]
    fn test_batch_degrades_without_async_runtime() {
        let provider = Arc::new(StubProvider::new("body"));
        let orchestrator = orchestrator(provider, 4);
        let structure = structure(&["Alpha", "Beta"]);

        // Driven from a non-tokio executor: the spawn substrate is missing
        let outcome = futures::executor::block_on(orchestrator.generate_all(
            &structure,
            chunks(),
            Arc::new(ResearchContext::new("query")),
        ));

        assert!(outcome.is_degraded());
        let map = outcome.into_value();
        assert_eq!(map["Alpha"], "Generated content for Alpha");
        assert_eq!(map["Beta"], "Generated content for Beta");
    }
}
