//! Exact match deduplication checker.
//!
//! Detects duplicates by content fingerprint, both within the exact-content
//! family and across every generator through the global set.

use crate::Result;
use crate::models::ContentFingerprint;
use crate::storage::{RecencyStore, keys};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use super::types::{ContentEntry, Provenance, decode};

/// Checker for exact content match via fingerprint.
///
/// # How it works
///
/// 1. Looks up `content:<fingerprint>`; a hit is an exact duplicate
/// 2. Checks `global:articles` membership for cross-module duplicates, which
///    outlive the content entry itself
///
/// Provenance comes from the stored [`ContentEntry`] when it is still
/// readable.
pub struct ExactMatchChecker<S: RecencyStore + ?Sized> {
    store: Arc<S>,
}

impl<S: RecencyStore + ?Sized> ExactMatchChecker<S> {
    /// Creates a new exact match checker.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Checks if the fingerprint was committed recently.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lookup fails.
    #[instrument(
        skip(self, fingerprint),
        fields(operation = "exact_match_check", fingerprint = %fingerprint.short())
    )]
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for duration metrics
    pub fn check(&self, fingerprint: &ContentFingerprint) -> Result<Option<Provenance>> {
        let start = Instant::now();

        let raw = self.store.get(&keys::content(fingerprint.as_str()))?;
        let found = raw.as_deref().map(Self::provenance_of);

        metrics::histogram!(
            "freshwire_check_duration_ms",
            "checker" => "exact",
            "found" => if found.is_some() { "true" } else { "false" }
        )
        .record(start.elapsed().as_millis() as f64);

        Ok(found)
    }

    /// Checks if any generator committed the fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error if the membership check fails.
    #[instrument(
        skip(self, fingerprint),
        fields(operation = "cross_module_check", fingerprint = %fingerprint.short())
    )]
    #[allow(clippy::cast_precision_loss)]
    pub fn check_cross_module(
        &self,
        fingerprint: &ContentFingerprint,
    ) -> Result<Option<Provenance>> {
        let start = Instant::now();

        let found = if self
            .store
            .is_member(keys::GLOBAL_ARTICLES, fingerprint.as_str())?
        {
            // Content entry may have expired; the global set is longer lived
            let raw = self
                .store
                .get(&keys::content(fingerprint.as_str()))
                .unwrap_or_else(|e| {
                    tracing::debug!(error = %e, "Provenance lookup failed");
                    None
                });
            Some(
                raw.as_deref()
                    .map_or_else(Provenance::default, Self::provenance_of),
            )
        } else {
            None
        };

        metrics::histogram!(
            "freshwire_check_duration_ms",
            "checker" => "cross_module",
            "found" => if found.is_some() { "true" } else { "false" }
        )
        .record(start.elapsed().as_millis() as f64);

        Ok(found)
    }

    fn provenance_of(raw: &str) -> Provenance {
        match decode::<ContentEntry>(raw) {
            Ok(entry) => Provenance::from_entry(&entry),
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    "Unreadable content entry, matching without provenance"
                );
                Provenance::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::deduplication::types::encode;
    use crate::storage::InMemoryStore;

    fn fp(byte: &str) -> ContentFingerprint {
        ContentFingerprint::from_digest(byte.repeat(32))
    }

    fn entry(fingerprint: &ContentFingerprint) -> String {
        encode(&ContentEntry {
            fingerprint: fingerprint.clone(),
            url: "https://wire.example/1".to_string(),
            source: "wire".to_string(),
            inserted_at_ms: 0,
            expires_at_ms: 0,
        })
        .unwrap()
    }

    #[test]
    fn test_exact_hit_carries_provenance() {
        let store = Arc::new(InMemoryStore::new(16));
        let checker = ExactMatchChecker::new(Arc::clone(&store));
        let fingerprint = fp("aa");

        assert!(checker.check(&fingerprint).unwrap().is_none());

        store
            .put(&keys::content(fingerprint.as_str()), &entry(&fingerprint), None)
            .unwrap();
        let provenance = checker.check(&fingerprint).unwrap().unwrap();
        assert_eq!(provenance.source.as_deref(), Some("wire"));
        assert_eq!(provenance.url.as_deref(), Some("https://wire.example/1"));
    }

    #[test]
    fn test_corrupt_entry_still_matches() {
        let store = Arc::new(InMemoryStore::new(16));
        let checker = ExactMatchChecker::new(Arc::clone(&store));
        let fingerprint = fp("bb");
        store
            .put(&keys::content(fingerprint.as_str()), "garbage", None)
            .unwrap();

        assert_eq!(checker.check(&fingerprint).unwrap(), Some(Provenance::default()));
    }

    #[test]
    fn test_cross_module_outlives_content_entry() {
        let store = Arc::new(InMemoryStore::new(16));
        let checker = ExactMatchChecker::new(Arc::clone(&store));
        let fingerprint = fp("cc");

        assert!(checker.check_cross_module(&fingerprint).unwrap().is_none());

        store
            .add_to_set(keys::GLOBAL_ARTICLES, fingerprint.as_str(), None)
            .unwrap();
        assert_eq!(
            checker.check_cross_module(&fingerprint).unwrap(),
            Some(Provenance::default())
        );
    }
}
