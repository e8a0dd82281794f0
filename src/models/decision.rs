//! Evaluation and commit result types.

use super::ContentFingerprint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of evaluating an article against the recency store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Not seen before; safe to publish.
    Novel,
    /// Same normalized text already committed.
    DuplicateExact,
    /// Same URL already committed for this source.
    DuplicateSource,
    /// Same topic with enough shared terms as a recent article.
    DuplicateSemantic,
    /// Content already produced by another generator.
    DuplicateCrossModule,
}

impl Decision {
    /// Returns true for every reject decision.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        !matches!(self, Self::Novel)
    }

    /// Returns the decision as a metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Novel => "novel",
            Self::DuplicateExact => "duplicate_exact",
            Self::DuplicateSource => "duplicate_source",
            Self::DuplicateSemantic => "duplicate_semantic",
            Self::DuplicateCrossModule => "duplicate_cross_module",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How much the decision can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Both title and description contributed to the fingerprints.
    #[default]
    High,
    /// Title or description was missing.
    Low,
}

/// Result of `DeduplicationService::evaluate`.
///
/// ```rust
/// use freshwire::models::{ContentFingerprint, Decision, Evaluation};
///
/// let fp = ContentFingerprint::from_digest("ab".repeat(32));
/// let eval = Evaluation::novel(fp, 3);
/// assert_eq!(eval.decision, Decision::Novel);
/// assert!(!eval.degraded);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// The classification.
    pub decision: Decision,
    /// Source of the matched article, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_source: Option<String>,
    /// URL of the matched article, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_url: Option<String>,
    /// Best term overlap for semantic matches (0.0 to 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap_score: Option<f32>,
    /// Confidence in the fingerprints.
    pub confidence: Confidence,
    /// At least one store lookup failed and was skipped.
    pub degraded: bool,
    /// Exact fingerprint of the evaluated article.
    pub content_fingerprint: ContentFingerprint,
    /// Duration of the evaluation in milliseconds.
    pub check_duration_ms: u64,
}

impl Evaluation {
    /// Creates a novel evaluation.
    #[must_use]
    pub const fn novel(content_fingerprint: ContentFingerprint, duration_ms: u64) -> Self {
        Self {
            decision: Decision::Novel,
            matched_source: None,
            matched_url: None,
            overlap_score: None,
            confidence: Confidence::High,
            degraded: false,
            content_fingerprint,
            check_duration_ms: duration_ms,
        }
    }

    /// Creates a duplicate evaluation with provenance.
    #[must_use]
    pub const fn duplicate(
        decision: Decision,
        content_fingerprint: ContentFingerprint,
        matched_source: Option<String>,
        matched_url: Option<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            decision,
            matched_source,
            matched_url,
            overlap_score: None,
            confidence: Confidence::High,
            degraded: false,
            content_fingerprint,
            check_duration_ms: duration_ms,
        }
    }

    /// Sets the overlap score.
    #[must_use]
    pub const fn with_overlap(mut self, score: f32) -> Self {
        self.overlap_score = Some(score);
        self
    }

    /// Sets the confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// Sets the degraded flag.
    #[must_use]
    pub const fn with_degraded(mut self, degraded: bool) -> Self {
        self.degraded = degraded;
        self
    }

    /// Returns true if the article may be used.
    #[must_use]
    pub const fn is_novel(&self) -> bool {
        !self.decision.is_duplicate()
    }
}

/// Outcome of `DeduplicationService::commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOutcome {
    /// First commit of this content.
    Committed,
    /// The same article was already committed; writes were refreshed.
    AlreadyCommitted,
    /// Another article claimed this exact fingerprint first.
    ///
    /// Equivalent to a `DuplicateExact` evaluation; abandon publication.
    LostRace,
}

impl CommitOutcome {
    /// Returns the outcome as a metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::AlreadyCommitted => "already_committed",
            Self::LostRace => "lost_race",
        }
    }
}

impl fmt::Display for CommitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp() -> ContentFingerprint {
        ContentFingerprint::from_digest("cd".repeat(32))
    }

    #[test]
    fn test_duplicate_decisions() {
        assert!(!Decision::Novel.is_duplicate());
        assert!(Decision::DuplicateExact.is_duplicate());
        assert!(Decision::DuplicateSource.is_duplicate());
        assert!(Decision::DuplicateSemantic.is_duplicate());
        assert!(Decision::DuplicateCrossModule.is_duplicate());
    }

    #[test]
    fn test_decision_serializes_screaming_snake() {
        let json = serde_json::to_string(&Decision::DuplicateCrossModule).unwrap();
        assert_eq!(json, "\"DUPLICATE_CROSS_MODULE\"");
        assert_eq!(Decision::DuplicateSemantic.to_string(), "duplicate_semantic");
    }

    #[test]
    fn test_semantic_evaluation_builder() {
        let eval = Evaluation::duplicate(
            Decision::DuplicateSemantic,
            fp(),
            Some("reuters".into()),
            Some("https://r.example/a".into()),
            7,
        )
        .with_overlap(0.75)
        .with_confidence(Confidence::Low);

        assert!(!eval.is_novel());
        assert_eq!(eval.overlap_score, Some(0.75));
        assert_eq!(eval.confidence, Confidence::Low);
        assert_eq!(eval.matched_source.as_deref(), Some("reuters"));
    }

    #[test]
    fn test_novel_evaluation_omits_provenance_in_json() {
        let eval = Evaluation::novel(fp(), 1).with_degraded(true);
        let json = serde_json::to_value(&eval).unwrap();
        assert_eq!(json["decision"], "NOVEL");
        assert_eq!(json["degraded"], true);
        assert!(json.get("matched_source").is_none());
    }
}
