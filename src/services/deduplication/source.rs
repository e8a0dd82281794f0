//! Same-source URL checker.

use crate::Result;
use crate::storage::{RecencyStore, keys};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use super::types::Provenance;

/// Checker for URLs a source already delivered.
///
/// Feeds re-deliver the same item with edited text; the URL stays stable.
pub struct SourceChecker<S: RecencyStore + ?Sized> {
    store: Arc<S>,
}

impl<S: RecencyStore + ?Sized> SourceChecker<S> {
    /// Creates a new source checker.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Checks if `url` is in the URL set of `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the membership check fails.
    #[instrument(skip(self), fields(operation = "source_check"))]
    #[allow(clippy::cast_precision_loss)]
    pub fn check(&self, source: &str, url: &str) -> Result<Option<Provenance>> {
        let start = Instant::now();
        let seen = self.store.is_member(&keys::source(source), url)?;

        metrics::histogram!(
            "freshwire_check_duration_ms",
            "checker" => "source",
            "found" => if seen { "true" } else { "false" }
        )
        .record(start.elapsed().as_millis() as f64);

        Ok(seen.then(|| Provenance {
            source: Some(source.to_string()),
            url: Some(url.to_string()),
        }))
    }
}
