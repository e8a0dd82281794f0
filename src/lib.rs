//! # Freshwire
//!
//! Content freshness and deduplication engine for news generators.
//!
//! Multiple content generators (scheduled posts, urgent-news alerts,
//! cross-posted summaries) consult freshwire as a single source of truth
//! before producing anything from an article.
//!
//! ## Features
//!
//! - Exact-content and lexical semantic fingerprints per article
//! - Shared recency store with per-key TTL (Redis or in-process LRU)
//! - Ordered duplicate checks: exact, same source, semantic, cross-module
//! - Advisory topic diversity pressure and crosspost throttling
//! - Degraded mode: an unreachable store never stalls content generation
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use freshwire::models::{Article, Decision};
//! use freshwire::services::deduplication::{DeduplicationConfig, DeduplicationService};
//! use freshwire::storage::InMemoryStore;
//!
//! let store = Arc::new(InMemoryStore::new(10_000));
//! let service = DeduplicationService::new(store, DeduplicationConfig::default())?;
//!
//! let article = Article::new(
//!     "SEC settles with Exchange X",
//!     "The regulator announced a settlement over unregistered securities.",
//!     "https://example.com/sec-exchange-x",
//!     "wire",
//! );
//!
//! assert_eq!(service.evaluate(&article).decision, Decision::Novel);
//! service.commit(&article)?;
//! assert!(service.evaluate(&article).decision.is_duplicate());
//! # Ok::<(), freshwire::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::FreshwireConfig;
pub use models::{Article, CommitOutcome, Decision, Evaluation, KeyFamily, TopicLabel};
pub use services::deduplication::{DeduplicationConfig, DeduplicationService};
pub use storage::{InMemoryStore, RecencyStore};

/// Error type for freshwire operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `StoreUnavailable` | Store connection refused, timed out, or circuit breaker open |
/// | `MalformedArticle` | Article carries no title, description, or URL to identify it |
/// | `Configuration` | Threshold or TTL out of range, unknown store backend |
/// | `OperationFailed` | I/O errors, parse failures, observability init |
/// | `FeatureNotEnabled` | Redis backend requested without the `redis` feature |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The recency store could not be reached.
    ///
    /// Raised when:
    /// - A Redis connection cannot be opened or times out
    /// - A command fails mid-flight
    /// - The store circuit breaker is open
    /// - The in-memory store lock is poisoned
    ///
    /// `DeduplicationService::evaluate` never surfaces this; it degrades to
    /// a novel decision with the degraded flag set.
    #[error("store unavailable during '{operation}': {cause}")]
    StoreUnavailable {
        /// The store operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// An article lacks the fields needed to identify it.
    #[error("malformed article: {0}")]
    MalformedArticle(String),

    /// Invalid configuration, fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - Filesystem I/O errors occur
    /// - Config or article files fail to parse
    /// - Logging or metrics initialization fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Feature not enabled (requires feature flag).
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),
}

impl Error {
    /// Returns true if this error means the store could not be reached.
    #[must_use]
    pub const fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

/// Result type alias for freshwire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// ```rust
/// let ts = freshwire::current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Returns the current Unix timestamp in milliseconds.
#[must_use]
pub fn current_timestamp_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MalformedArticle("no title".to_string());
        assert_eq!(err.to_string(), "malformed article: no title");

        let err = Error::StoreUnavailable {
            operation: "get".to_string(),
            cause: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "store unavailable during 'get': connection refused"
        );
        assert!(err.is_store_unavailable());

        let err = Error::Configuration("threshold".to_string());
        assert!(!err.is_store_unavailable());
        assert_eq!(err.to_string(), "configuration error: threshold");
    }

    #[test]
    fn test_timestamps_agree() {
        let secs = current_timestamp();
        let millis = current_timestamp_millis();
        assert!(millis / 1000 >= secs);
        assert!(millis / 1000 - secs <= 1);
    }
}
