//! Fingerprint types.

use super::TopicLabel;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 of the empty string, the digest of text that normalized away.
const EMPTY_DIGEST: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Hex digest of an article's normalized title and description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// Wraps an already computed hex digest.
    #[must_use]
    pub fn from_digest(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// Returns the digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a 16-character prefix for logs.
    #[must_use]
    pub fn short(&self) -> &str {
        let len = self.0.len().min(16);
        &self.0[..len]
    }

    /// Returns true if this is the digest of empty normalized text.
    ///
    /// Such fingerprints collide for every blank article and must never be
    /// written to the store.
    #[must_use]
    pub fn is_unidentifiable(&self) -> bool {
        self.0 == EMPTY_DIGEST
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lexical topic signature of an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticFingerprint {
    /// Significant terms, most frequent first.
    pub terms: Vec<String>,
    /// Coarse topic label.
    pub topic: TopicLabel,
}

impl SemanticFingerprint {
    /// Creates a semantic fingerprint.
    #[must_use]
    pub const fn new(terms: Vec<String>, topic: TopicLabel) -> Self {
        Self { terms, topic }
    }

    /// Returns a stable 16-character key for this signature.
    ///
    /// The key ignores term rank so two articles with the same term set and
    /// topic share a single cache slot.
    #[must_use]
    pub fn key(&self) -> String {
        let mut sorted: Vec<&str> = self.terms.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut hasher = Sha256::new();
        hasher.update(self.topic.as_str().as_bytes());
        for term in sorted {
            hasher.update(b"\n");
            hasher.update(term.as_bytes());
        }
        let digest = hex::encode(hasher.finalize());
        digest[..16].to_string()
    }

    /// Returns the number of terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Returns true if no significant terms were extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_digest_is_unidentifiable() {
        let hash = hex::encode(Sha256::digest(b""));
        assert!(ContentFingerprint::from_digest(hash).is_unidentifiable());
        assert!(!ContentFingerprint::from_digest("ab".repeat(32)).is_unidentifiable());
    }

    #[test]
    fn test_short_prefix() {
        let fp = ContentFingerprint::from_digest("0123456789abcdef0123");
        assert_eq!(fp.short(), "0123456789abcdef");
        assert_eq!(ContentFingerprint::from_digest("abc").short(), "abc");
    }

    #[test]
    fn test_semantic_key_ignores_term_order() {
        let a = SemanticFingerprint::new(
            vec!["sec".into(), "settlement".into(), "exchange".into()],
            TopicLabel::Regulatory,
        );
        let b = SemanticFingerprint::new(
            vec!["exchange".into(), "sec".into(), "settlement".into()],
            TopicLabel::Regulatory,
        );
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().len(), 16);
    }

    #[test]
    fn test_semantic_key_depends_on_topic() {
        let terms = vec!["bitcoin".to_string(), "price".to_string()];
        let a = SemanticFingerprint::new(terms.clone(), TopicLabel::MarketPrice);
        let b = SemanticFingerprint::new(terms, TopicLabel::General);
        assert_ne!(a.key(), b.key());
    }
}
