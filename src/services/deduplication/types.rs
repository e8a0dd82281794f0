//! Deduplication record types.
//!
//! Values the engine stores under `content:` and `semantic:` keys, plus the
//! reports returned by administrative operations.

use crate::models::{
    Article, CommitOutcome, ContentFingerprint, Evaluation, KeyFamily, SemanticFingerprint,
    TopicLabel,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// First sighting of an exact content fingerprint.
///
/// Created on commit, never mutated, evicted by TTL or reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    /// The content fingerprint.
    pub fingerprint: ContentFingerprint,
    /// URL of the article that claimed the fingerprint.
    pub url: String,
    /// Source of that article.
    pub source: String,
    /// Insertion time, unix ms.
    pub inserted_at_ms: u64,
    /// Expiry time, unix ms.
    pub expires_at_ms: u64,
}

/// Cached semantic fingerprint with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticEntry {
    /// Stable key of the fingerprint.
    pub key: String,
    /// Significant terms.
    pub terms: Vec<String>,
    /// Topic label.
    pub topic: TopicLabel,
    /// URL of the article.
    pub url: String,
    /// Source of the article.
    pub source: String,
    /// Insertion time, unix ms.
    pub inserted_at_ms: u64,
}

impl SemanticEntry {
    /// Returns the cached value as a fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> SemanticFingerprint {
        SemanticFingerprint::new(self.terms.clone(), self.topic)
    }
}

/// Where a matched article came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    /// Source of the earlier article, when known.
    pub source: Option<String>,
    /// URL of the earlier article, when known.
    pub url: Option<String>,
}

impl Provenance {
    /// Provenance from a stored content entry.
    #[must_use]
    pub fn from_entry(entry: &ContentEntry) -> Self {
        Self {
            source: Some(entry.source.clone()),
            url: (!entry.url.is_empty()).then(|| entry.url.clone()),
        }
    }
}

/// Encodes a stored record.
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::OperationFailed {
        operation: "encode_entry".to_string(),
        cause: e.to_string(),
    })
}

/// Decodes a stored record.
pub(crate) fn decode<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| Error::OperationFailed {
        operation: "decode_entry".to_string(),
        cause: e.to_string(),
    })
}

/// Both fingerprints of an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fingerprints {
    /// Exact content fingerprint (URL fingerprint for text-less articles).
    pub content: ContentFingerprint,
    /// Semantic fingerprint.
    pub semantic: SemanticFingerprint,
    /// Stable key of the semantic fingerprint.
    pub semantic_key: String,
    /// True when the content fingerprint was derived from the URL.
    pub url_only: bool,
}

/// Number of keys removed per family by a reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    /// Keys removed, by family name.
    pub removed: BTreeMap<String, usize>,
}

impl ResetReport {
    /// Records removals for a family.
    pub fn record(&mut self, family: KeyFamily, count: usize) {
        *self.removed.entry(family.as_str().to_string()).or_default() += count;
    }

    /// Returns the removals for a family.
    #[must_use]
    pub fn removed_for(&self, family: KeyFamily) -> usize {
        self.removed.get(family.as_str()).copied().unwrap_or(0)
    }

    /// Returns the total number of keys removed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.removed.values().sum()
    }
}

/// Trait for deduplication checking.
///
/// Allows for different implementations (e.g., mock for testing).
pub trait Deduplicator: Send + Sync {
    /// Decides whether an article is fresh. Never fails.
    fn evaluate(&self, article: &Article) -> Evaluation;

    /// Records an accepted article.
    ///
    /// # Errors
    ///
    /// Returns an error if the article is unidentifiable or the store fails.
    fn commit(&self, article: &Article) -> Result<CommitOutcome>;
}
