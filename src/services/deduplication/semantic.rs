//! Semantic similarity deduplication checker.
//!
//! Detects rewritten versions of the same story by comparing significant
//! term sets against a bounded lookback window of recent fingerprints.

use crate::Result;
use crate::models::SemanticFingerprint;
use crate::storage::{RecencyStore, keys};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use super::config::DeduplicationConfig;
use super::types::{Provenance, SemanticEntry, decode};

/// Computes the Jaccard overlap of two term lists.
///
/// Symmetric, within `[0, 1]`, and `0.0` when both lists are empty.
///
/// ```rust
/// use freshwire::services::deduplication::term_overlap;
///
/// let a = ["sec", "etf", "approve"].map(String::from);
/// let b = ["sec", "etf", "reject"].map(String::from);
/// assert!((term_overlap(&a, &b) - 0.5).abs() < f32::EPSILON);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn term_overlap(a: &[String], b: &[String]) -> f32 {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();

    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f32 / union as f32
}

/// Best qualifying semantic match.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticMatch {
    /// Where the matched article came from.
    pub provenance: Provenance,
    /// Term overlap with the matched fingerprint.
    pub overlap: f32,
}

/// Checker for semantic similarity using term overlap.
///
/// # How it works
///
/// 1. Reads the newest `semantic_lookback` keys of `semantic:recent`
/// 2. Fetches those entries in one round trip; expired ones come back empty
/// 3. Keeps entries with the same topic label and overlap at or above the
///    threshold
/// 4. Returns the highest-overlap qualifying entry
pub struct SemanticSimilarityChecker<S: RecencyStore + ?Sized> {
    store: Arc<S>,
    threshold: f32,
    min_terms: usize,
    lookback: usize,
}

impl<S: RecencyStore + ?Sized> SemanticSimilarityChecker<S> {
    /// Creates a new semantic similarity checker.
    #[must_use]
    pub const fn new(store: Arc<S>, config: &DeduplicationConfig) -> Self {
        Self {
            store,
            threshold: config.similarity_threshold,
            min_terms: config.min_semantic_terms,
            lookback: config.semantic_lookback,
        }
    }

    /// Returns true if the fingerprint has enough terms to compare.
    #[must_use]
    pub fn is_comparable(&self, fingerprint: &SemanticFingerprint) -> bool {
        !fingerprint.is_empty() && fingerprint.len() >= self.min_terms
    }

    /// Loads the live entries of the lookback window, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the index or the entries cannot be read.
    pub fn load_window(&self) -> Result<Vec<SemanticEntry>> {
        let mut seen = HashSet::new();
        let window: Vec<String> = self
            .store
            .list_range(keys::SEMANTIC_RECENT)?
            .into_iter()
            .filter(|key| seen.insert(key.clone()))
            .take(self.lookback)
            .map(|key| keys::semantic(&key))
            .collect();

        let entries = self
            .store
            .get_many(&window)?
            .into_iter()
            .flatten()
            .filter_map(|raw| match decode::<SemanticEntry>(&raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable semantic entry");
                    None
                },
            })
            .collect();

        Ok(entries)
    }

    /// Finds the best qualifying match within an already loaded window.
    #[must_use]
    pub fn best_match(
        &self,
        fingerprint: &SemanticFingerprint,
        window: &[SemanticEntry],
    ) -> Option<SemanticMatch> {
        if !self.is_comparable(fingerprint) {
            return None;
        }

        window
            .iter()
            .filter(|entry| entry.topic == fingerprint.topic)
            .map(|entry| (entry, term_overlap(&fingerprint.terms, &entry.terms)))
            .filter(|(_, overlap)| *overlap >= self.threshold)
            .fold(None, |best: Option<(&SemanticEntry, f32)>, candidate| match best {
                Some((_, best_overlap)) if best_overlap >= candidate.1 => best,
                _ => Some(candidate),
            })
            .map(|(entry, overlap)| SemanticMatch {
                provenance: Provenance {
                    source: Some(entry.source.clone()),
                    url: (!entry.url.is_empty()).then(|| entry.url.clone()),
                },
                overlap,
            })
    }

    /// Checks a fingerprint against the lookback window.
    ///
    /// Skips the store entirely when the fingerprint has fewer than
    /// `min_semantic_terms` terms.
    ///
    /// # Errors
    ///
    /// Returns an error if the window cannot be read.
    #[instrument(
        skip(self, fingerprint),
        fields(
            operation = "semantic_similarity_check",
            topic = %fingerprint.topic,
            terms = fingerprint.len()
        )
    )]
    #[allow(clippy::cast_precision_loss)]
    pub fn check(&self, fingerprint: &SemanticFingerprint) -> Result<Option<SemanticMatch>> {
        if !self.is_comparable(fingerprint) {
            tracing::debug!(
                terms = fingerprint.len(),
                min_terms = self.min_terms,
                "Too few terms for semantic check"
            );
            return Ok(None);
        }

        let start = Instant::now();
        let window = self.load_window()?;
        let found = self.best_match(fingerprint, &window);

        metrics::histogram!(
            "freshwire_check_duration_ms",
            "checker" => "semantic",
            "found" => if found.is_some() { "true" } else { "false" }
        )
        .record(start.elapsed().as_millis() as f64);

        tracing::debug!(
            window = window.len(),
            threshold = self.threshold,
            best = found.as_ref().map(|m| m.overlap),
            "Semantic window compared"
        );

        Ok(found)
    }
}
