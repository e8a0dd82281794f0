//! Content hashing for exact-duplicate detection.
//!
//! Article text is normalized before hashing so that the same story
//! syndicated with different markup, casing or punctuation produces the
//! same fingerprint.

use crate::models::ContentFingerprint;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

static HTML_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?is)</?[^>]+>").ok());

/// Content hasher for deduplication.
///
/// # Normalization
///
/// Before hashing, content is normalized:
/// - HTML entities decoded, then tags stripped
/// - Converted to lowercase
/// - Punctuation and symbols replaced by spaces
/// - Whitespace collapsed to single spaces and trimmed
///
/// # Example
///
/// ```rust
/// use freshwire::services::deduplication::ContentHasher;
///
/// let hash = ContentHasher::hash("<p>Bitcoin &amp; Ether rally!</p>");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, ContentHasher::hash("bitcoin   ether RALLY"));
/// ```
pub struct ContentHasher;

impl ContentHasher {
    /// Computes the SHA256 hash of normalized content.
    ///
    /// Returns the lowercase hex-encoded digest (64 characters).
    #[must_use]
    pub fn hash(content: &str) -> String {
        Self::digest(Self::normalize(content).as_bytes())
    }

    /// Normalizes content for consistent hashing.
    ///
    /// ```rust
    /// use freshwire::services::deduplication::ContentHasher;
    ///
    /// assert_eq!(
    ///     ContentHasher::normalize("  SEC &amp; <b>CFTC</b>:  joint   statement. "),
    ///     "sec cftc joint statement"
    /// );
    /// ```
    #[must_use]
    pub fn normalize(content: &str) -> String {
        let decoded = html_escape::decode_html_entities(content);
        let stripped = HTML_TAG
            .as_ref()
            .map_or(decoded.clone(), |re| re.replace_all(&decoded, " "));

        let lowered: String = stripped
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();

        lowered.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn digest(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }
}

/// Computes the exact-content fingerprint of an article.
///
/// Title and description are normalized together, so moving a sentence
/// between them does not change the fingerprint. Text that normalizes to
/// nothing yields the unidentifiable fingerprint
/// (see [`ContentFingerprint::is_unidentifiable`]).
#[must_use]
pub fn compute_content_fingerprint(title: &str, description: &str) -> ContentFingerprint {
    let combined = format!("{title} {description}");
    ContentFingerprint::from_digest(ContentHasher::hash(&combined))
}

/// Computes a fingerprint from an article URL alone.
///
/// Used when an article carries no text. The fragment and trailing slash are
/// dropped; the digest is domain-separated from text fingerprints.
#[must_use]
pub fn url_fingerprint(url: &str) -> ContentFingerprint {
    let trimmed = url.trim();
    let without_fragment = trimmed.split_once('#').map_or(trimmed, |(base, _)| base);
    let canonical = without_fragment.trim_end_matches('/');

    ContentFingerprint::from_digest(ContentHasher::digest(
        format!("url\n{canonical}").as_bytes(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_produces_64_char_hex() {
        let hash = ContentHasher::hash("test content");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_different_content_different_hash() {
        assert_ne!(
            ContentHasher::hash("Bitcoin ETF approved"),
            ContentHasher::hash("Ether ETF approved")
        );
    }

    #[test]
    fn test_normalization_strips_markup_and_punctuation() {
        assert_eq!(
            ContentHasher::normalize("<a href=\"x\">Breaking:</a> Fed&nbsp;holds rates!!"),
            "breaking fed holds rates"
        );
    }

    #[test]
    fn test_normalization_keeps_unicode_letters() {
        assert_eq!(ContentHasher::normalize("Zürich  Börse"), "zürich börse");
    }

    #[test]
    fn test_fingerprint_ignores_title_description_split() {
        let a = compute_content_fingerprint("Fed holds rates", "Markets steady.");
        let b = compute_content_fingerprint("Fed holds rates markets", "steady");
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_text_is_unidentifiable() {
        assert!(compute_content_fingerprint("", "").is_unidentifiable());
        assert!(compute_content_fingerprint("  <br/> ", "!!!").is_unidentifiable());
        assert!(!compute_content_fingerprint("x", "").is_unidentifiable());
    }

    #[test]
    fn test_url_fingerprint_canonicalization() {
        let base = url_fingerprint("https://news.example/a");
        assert_eq!(base, url_fingerprint("  https://news.example/a/#comments "));
        assert_ne!(base, url_fingerprint("https://news.example/b"));
        assert_ne!(base, compute_content_fingerprint("https://news.example/a", ""));
    }
}
