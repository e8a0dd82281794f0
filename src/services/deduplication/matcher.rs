//! Similarity matcher.
//!
//! Runs the ordered duplicate checks for one article:
//! 1. **Exact**: `content:<fingerprint>` exists
//! 2. **Source**: the URL is in `source:<name>`
//! 3. **Semantic**: term overlap against the lookback window
//! 4. **Cross-module**: the fingerprint is in `global:articles`
//!
//! Short-circuits on the first match. A failing check is logged, marks the
//! evaluation degraded, and the remaining checks still run.

use crate::Result;
use crate::models::{Article, Confidence, Decision, Evaluation};
use crate::storage::RecencyStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use super::config::DeduplicationConfig;
use super::exact_match::ExactMatchChecker;
use super::hasher::{compute_content_fingerprint, url_fingerprint};
use super::semantic::SemanticSimilarityChecker;
use super::source::SourceChecker;
use super::terms::compute_semantic_fingerprint;
use super::types::{Fingerprints, Provenance, SemanticEntry};

/// Computes both fingerprints of an article.
///
/// Articles whose text normalizes to nothing fall back to the URL
/// fingerprint; with no URL either, the content fingerprint is
/// unidentifiable.
#[must_use]
pub fn compute_fingerprints(article: &Article, top_n: usize) -> Fingerprints {
    let text = compute_content_fingerprint(&article.title, &article.description);
    let (content, url_only) = match article.url() {
        Some(url) if text.is_unidentifiable() => (url_fingerprint(url), true),
        _ => (text, false),
    };

    let semantic = compute_semantic_fingerprint(&article.title, &article.description, top_n);
    let semantic_key = semantic.key();

    Fingerprints {
        content,
        semantic,
        semantic_key,
        url_only,
    }
}

/// Runs a check, degrading on failure.
fn run_check<T>(
    checker: &'static str,
    degraded: &mut bool,
    call: impl FnOnce() -> Result<Option<T>>,
) -> Option<T> {
    match call() {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(checker, error = %e, "Duplicate check failed, continuing");
            *degraded = true;
            None
        },
    }
}

/// Matcher deciding duplicate, similar or novel.
pub struct SimilarityMatcher<S: RecencyStore + ?Sized> {
    enabled: bool,
    top_terms: usize,
    exact: ExactMatchChecker<S>,
    source: SourceChecker<S>,
    semantic: SemanticSimilarityChecker<S>,
}

impl<S: RecencyStore + ?Sized> SimilarityMatcher<S> {
    /// Creates a matcher over a store.
    #[must_use]
    pub fn new(store: Arc<S>, config: &DeduplicationConfig) -> Self {
        Self {
            enabled: config.enabled,
            top_terms: config.top_term_count,
            exact: ExactMatchChecker::new(Arc::clone(&store)),
            source: SourceChecker::new(Arc::clone(&store)),
            semantic: SemanticSimilarityChecker::new(store, config),
        }
    }

    /// Computes both fingerprints with the configured term count.
    #[must_use]
    pub fn fingerprints(&self, article: &Article) -> Fingerprints {
        compute_fingerprints(article, self.top_terms)
    }

    /// Loads the semantic lookback window once for a batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the window cannot be read.
    pub fn load_window(&self) -> Result<Vec<SemanticEntry>> {
        self.semantic.load_window()
    }

    /// Evaluates an article.
    #[must_use]
    pub fn evaluate(&self, article: &Article) -> Evaluation {
        let fingerprints = self.fingerprints(article);
        self.evaluate_with(article, &fingerprints, None, &[])
    }

    /// Evaluates an article with precomputed fingerprints.
    ///
    /// When `window` is given the semantic check compares against it instead
    /// of reading the lookback index. `pending` holds entries accepted earlier
    /// in the same batch that are not in the store yet; the semantic check
    /// considers them too.
    #[allow(clippy::cast_possible_truncation)] // Duration in ms won't exceed u64::MAX
    #[instrument(
        skip(self, article, fingerprints, window, pending),
        fields(
            operation = "evaluate",
            source = %article.source_name(),
            fingerprint = %fingerprints.content.short()
        )
    )]
    pub fn evaluate_with(
        &self,
        article: &Article,
        fingerprints: &Fingerprints,
        window: Option<&[SemanticEntry]>,
        pending: &[SemanticEntry],
    ) -> Evaluation {
        let start = Instant::now();
        let confidence = if article.is_partial() || fingerprints.url_only {
            Confidence::Low
        } else {
            Confidence::High
        };

        if !self.enabled {
            tracing::debug!("Deduplication disabled, skipping checks");
            return Evaluation::novel(
                fingerprints.content.clone(),
                start.elapsed().as_millis() as u64,
            )
            .with_confidence(confidence);
        }

        let mut degraded = false;
        let found = self.run_checks(article, fingerprints, window, pending, &mut degraded);

        let duration_ms = start.elapsed().as_millis() as u64;
        let evaluation = match found {
            Some((decision, provenance, overlap)) => {
                let evaluation = Evaluation::duplicate(
                    decision,
                    fingerprints.content.clone(),
                    provenance.source,
                    provenance.url,
                    duration_ms,
                );
                match overlap {
                    Some(score) => evaluation.with_overlap(score),
                    None => evaluation,
                }
            },
            None => Evaluation::novel(fingerprints.content.clone(), duration_ms),
        }
        .with_confidence(confidence)
        .with_degraded(degraded);

        record_evaluation_metrics(&evaluation);
        if evaluation.decision.is_duplicate() {
            tracing::info!(
                decision = %evaluation.decision.as_str(),
                matched_source = ?evaluation.matched_source,
                matched_url = ?evaluation.matched_url,
                overlap = ?evaluation.overlap_score,
                duration_ms,
                "Duplicate article"
            );
        } else {
            tracing::debug!(duration_ms, degraded, "Novel article");
        }

        evaluation
    }

    fn run_checks(
        &self,
        article: &Article,
        fingerprints: &Fingerprints,
        window: Option<&[SemanticEntry]>,
        pending: &[SemanticEntry],
        degraded: &mut bool,
    ) -> Option<(Decision, Provenance, Option<f32>)> {
        let content = &fingerprints.content;
        let identifiable = !content.is_unidentifiable();
        if !identifiable {
            tracing::warn!(
                source = %article.source_name(),
                "Article has no text and no url, nothing to match"
            );
        }

        // 1. Exact content
        if identifiable
            && let Some(provenance) = run_check("exact", degraded, || self.exact.check(content))
        {
            return Some((Decision::DuplicateExact, provenance, None));
        }

        // 2. Same source, same URL
        if let Some(url) = article.url()
            && let Some(provenance) = run_check("source", degraded, || {
                self.source.check(article.source_name(), url)
            })
        {
            return Some((Decision::DuplicateSource, provenance, None));
        }

        // 3. Semantic overlap
        let stored = match window {
            Some(window) => self.semantic.best_match(&fingerprints.semantic, window),
            None => run_check("semantic", degraded, || {
                self.semantic.check(&fingerprints.semantic)
            }),
        };
        let semantic = match (stored, self.semantic.best_match(&fingerprints.semantic, pending)) {
            (Some(stored), Some(local)) if local.overlap > stored.overlap => Some(local),
            (stored, local) => stored.or(local),
        };
        if let Some(found) = semantic {
            return Some((
                Decision::DuplicateSemantic,
                found.provenance,
                Some(found.overlap),
            ));
        }

        // 4. Any generator, any source
        if identifiable
            && let Some(provenance) = run_check("cross_module", degraded, || {
                self.exact.check_cross_module(content)
            })
        {
            return Some((Decision::DuplicateCrossModule, provenance, None));
        }

        None
    }
}

#[allow(clippy::cast_precision_loss)]
pub(super) fn record_evaluation_metrics(evaluation: &Evaluation) {
    metrics::counter!(
        "freshwire_evaluations_total",
        "decision" => evaluation.decision.as_str()
    )
    .increment(1);
    if evaluation.degraded {
        metrics::counter!("freshwire_degraded_evaluations_total").increment(1);
    }
    metrics::histogram!(
        "freshwire_check_duration_ms",
        "checker" => "total"
    )
    .record(evaluation.check_duration_ms as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::storage::{InMemoryStore, keys};
    use std::collections::HashSet;
    use std::time::Duration;

    /// Store that is always unreachable.
    struct DownStore;

    fn down<T>() -> Result<T> {
        Err(Error::StoreUnavailable {
            operation: "test".to_string(),
            cause: "connection refused".to_string(),
        })
    }

    impl RecencyStore for DownStore {
        fn backend_name(&self) -> &'static str {
            "down"
        }
        fn put(&self, _: &str, _: &str, _: Option<Duration>) -> Result<()> {
            down()
        }
        fn put_if_absent(&self, _: &str, _: &str, _: Option<Duration>) -> Result<bool> {
            down()
        }
        fn get(&self, _: &str) -> Result<Option<String>> {
            down()
        }
        fn exists(&self, _: &str) -> Result<bool> {
            down()
        }
        fn add_to_set(&self, _: &str, _: &str, _: Option<Duration>) -> Result<bool> {
            down()
        }
        fn remove_from_set(&self, _: &str, _: &[String]) -> Result<usize> {
            down()
        }
        fn is_member(&self, _: &str, _: &str) -> Result<bool> {
            down()
        }
        fn set_members(&self, _: &str) -> Result<HashSet<String>> {
            down()
        }
        fn push_capped(&self, _: &str, _: &str, _: usize, _: Option<Duration>) -> Result<()> {
            down()
        }
        fn list_range(&self, _: &str) -> Result<Vec<String>> {
            down()
        }
        fn delete(&self, _: &[String]) -> Result<usize> {
            down()
        }
        fn keys_with_prefix(&self, _: &str) -> Result<Vec<String>> {
            down()
        }
        fn ping(&self) -> Result<()> {
            down()
        }
    }

    fn article() -> Article {
        Article::new(
            "Exchange X settles with SEC over staking program",
            "The regulator announced a settlement covering the staking program.",
            "https://wire.example/x-settles",
            "wire",
        )
    }

    #[test]
    fn test_fingerprints_fall_back_to_url() {
        let blank = Article::new("", "   ", "https://wire.example/a", "wire");
        let fps = compute_fingerprints(&blank, 8);
        assert!(fps.url_only);
        assert!(!fps.content.is_unidentifiable());
        assert!(fps.semantic.is_empty());

        let nothing = Article::new("", "", "", "wire");
        assert!(compute_fingerprints(&nothing, 8).content.is_unidentifiable());
    }

    #[test]
    fn test_novel_on_empty_store() {
        let store = Arc::new(InMemoryStore::new(64));
        let matcher = SimilarityMatcher::new(store, &DeduplicationConfig::default());

        let evaluation = matcher.evaluate(&article());
        assert_eq!(evaluation.decision, Decision::Novel);
        assert!(!evaluation.degraded);
        assert_eq!(evaluation.confidence, Confidence::High);
    }

    #[test]
    fn test_source_check_runs_before_semantic() {
        let store = Arc::new(InMemoryStore::new(64));
        let matcher = SimilarityMatcher::new(Arc::clone(&store), &DeduplicationConfig::default());
        store
            .add_to_set(&keys::source("wire"), "https://wire.example/x-settles", None)
            .unwrap();

        let evaluation = matcher.evaluate(&article());
        assert_eq!(evaluation.decision, Decision::DuplicateSource);
        assert_eq!(evaluation.matched_source.as_deref(), Some("wire"));
    }

    #[test]
    fn test_cross_module_match() {
        let store = Arc::new(InMemoryStore::new(64));
        let matcher = SimilarityMatcher::new(Arc::clone(&store), &DeduplicationConfig::default());
        let fps = matcher.fingerprints(&article());
        store
            .add_to_set(keys::GLOBAL_ARTICLES, fps.content.as_str(), None)
            .unwrap();

        let evaluation = matcher.evaluate(&article());
        assert_eq!(evaluation.decision, Decision::DuplicateCrossModule);
        assert!(evaluation.matched_url.is_none());
    }

    #[test]
    fn test_unreachable_store_degrades_to_novel() {
        let matcher = SimilarityMatcher::new(Arc::new(DownStore), &DeduplicationConfig::default());

        let evaluation = matcher.evaluate(&article());
        assert_eq!(evaluation.decision, Decision::Novel);
        assert!(evaluation.degraded);
    }

    #[test]
    fn test_disabled_is_always_novel() {
        let config = DeduplicationConfig::default().with_enabled(false);
        let matcher = SimilarityMatcher::new(Arc::new(DownStore), &config);

        let evaluation = matcher.evaluate(&article());
        assert_eq!(evaluation.decision, Decision::Novel);
        assert!(!evaluation.degraded);
    }

    #[test]
    fn test_partial_article_has_low_confidence() {
        let store = Arc::new(InMemoryStore::new(64));
        let matcher = SimilarityMatcher::new(store, &DeduplicationConfig::default());
        let partial = Article::new("Headline only", "", "https://wire.example/h", "wire");

        assert_eq!(matcher.evaluate(&partial).confidence, Confidence::Low);
    }
}
