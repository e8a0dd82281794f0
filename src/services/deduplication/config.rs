//! Deduplication configuration.
//!
//! Thresholds, lookback sizes and TTLs for every key family the engine
//! writes.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::terms::DEFAULT_TOP_TERMS;

/// Longest lifetime accepted for any key family (ten years).
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Configuration for the deduplication service.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `FRESHWIRE_DEDUP_ENABLED` | bool | `true` | Enable deduplication |
/// | `FRESHWIRE_DEDUP_SIMILARITY_THRESHOLD` | f32 | `0.6` | Minimum term overlap for a semantic match |
/// | `FRESHWIRE_DEDUP_TOP_TERMS` | usize | `8` | Terms kept per semantic fingerprint |
/// | `FRESHWIRE_DEDUP_MIN_SEMANTIC_TERMS` | usize | `3` | Fewer terms skip the semantic check |
/// | `FRESHWIRE_DEDUP_SEMANTIC_LOOKBACK` | usize | `500` | Semantic fingerprints compared per evaluation |
/// | `FRESHWIRE_DEDUP_CONTENT_TTL_SECS` | u64 | `259200` | Exact fingerprint lifetime |
/// | `FRESHWIRE_DEDUP_SEMANTIC_TTL_SECS` | u64 | `172800` | Semantic fingerprint lifetime |
/// | `FRESHWIRE_DEDUP_SOURCE_TTL_SECS` | u64 | `259200` | Per-source URL set lifetime |
/// | `FRESHWIRE_DEDUP_GLOBAL_TTL_SECS` | u64 | `2592000` | Cross-module set lifetime, `0` for none |
/// | `FRESHWIRE_DEDUP_TOPIC_WINDOW_CAPACITY` | usize | `50` | Recent topics kept |
/// | `FRESHWIRE_DEDUP_TOPIC_WINDOW_MAX_AGE_SECS` | u64 | `86400` | Topic entry age limit, `0` for none |
/// | `FRESHWIRE_DEDUP_CROSSPOST_MIN_INTERVAL_SECS` | u64 | `7200` | Spacing between relays |
/// | `FRESHWIRE_DEDUP_EXCLUSIVE_COMMIT` | bool | `true` | Set-if-absent exact fingerprint writes |
///
/// # Example
///
/// ```rust
/// use freshwire::services::deduplication::DeduplicationConfig;
///
/// let config = DeduplicationConfig::default();
/// assert!(config.enabled);
/// assert!((config.similarity_threshold - 0.6).abs() < f32::EPSILON);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeduplicationConfig {
    /// Enable/disable entire deduplication.
    pub enabled: bool,

    /// Minimum Jaccard overlap for a semantic duplicate, in `[0, 1]`.
    pub similarity_threshold: f32,

    /// Number of significant terms kept per semantic fingerprint.
    pub top_term_count: usize,

    /// Minimum number of terms for the semantic check to run.
    ///
    /// Very short articles share terms by accident.
    pub min_semantic_terms: usize,

    /// Capacity of the semantic lookback index.
    pub semantic_lookback: usize,

    /// Lifetime of exact content fingerprints, in seconds.
    pub content_ttl_secs: u64,

    /// Lifetime of semantic fingerprints, in seconds.
    pub semantic_ttl_secs: u64,

    /// Lifetime of per-source URL sets, in seconds.
    pub source_ttl_secs: u64,

    /// Lifetime of the cross-module fingerprint set; `0` keeps it forever.
    pub global_ttl_secs: u64,

    /// Capacity of the recent topics window.
    pub topic_window_capacity: usize,

    /// Age limit of recent topic entries; `0` bounds by count only.
    pub topic_window_max_age_secs: u64,

    /// Minimum spacing between relays to one destination, in seconds.
    pub crosspost_min_interval_secs: u64,

    /// Write the exact fingerprint with set-if-absent on commit.
    pub exclusive_commit: bool,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_threshold: 0.6,
            top_term_count: DEFAULT_TOP_TERMS,
            min_semantic_terms: 3,
            semantic_lookback: 500,
            content_ttl_secs: 3 * 24 * 3600,
            semantic_ttl_secs: 48 * 3600,
            source_ttl_secs: 3 * 24 * 3600,
            global_ttl_secs: 30 * 24 * 3600,
            topic_window_capacity: 50,
            topic_window_max_age_secs: 24 * 3600,
            crosspost_min_interval_secs: 2 * 3600,
            exclusive_commit: true,
        }
    }
}

/// Parses a boolean flag; `false`, `0`, `no` and `off` disable.
fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

impl DeduplicationConfig {
    /// Creates a new configuration from environment variables.
    ///
    /// Falls back to defaults for any unset or unparsable variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            lookup(key).and_then(|v| v.trim().parse().ok())
        }

        if let Some(v) = lookup("FRESHWIRE_DEDUP_ENABLED") {
            self.enabled = parse_flag(&v);
        }
        if let Some(v) = parsed(&lookup, "FRESHWIRE_DEDUP_SIMILARITY_THRESHOLD") {
            self.similarity_threshold = v;
        }
        if let Some(v) = parsed(&lookup, "FRESHWIRE_DEDUP_TOP_TERMS") {
            self.top_term_count = v;
        }
        if let Some(v) = parsed(&lookup, "FRESHWIRE_DEDUP_MIN_SEMANTIC_TERMS") {
            self.min_semantic_terms = v;
        }
        if let Some(v) = parsed(&lookup, "FRESHWIRE_DEDUP_SEMANTIC_LOOKBACK") {
            self.semantic_lookback = v;
        }
        if let Some(v) = parsed(&lookup, "FRESHWIRE_DEDUP_CONTENT_TTL_SECS") {
            self.content_ttl_secs = v;
        }
        if let Some(v) = parsed(&lookup, "FRESHWIRE_DEDUP_SEMANTIC_TTL_SECS") {
            self.semantic_ttl_secs = v;
        }
        if let Some(v) = parsed(&lookup, "FRESHWIRE_DEDUP_SOURCE_TTL_SECS") {
            self.source_ttl_secs = v;
        }
        if let Some(v) = parsed(&lookup, "FRESHWIRE_DEDUP_GLOBAL_TTL_SECS") {
            self.global_ttl_secs = v;
        }
        if let Some(v) = parsed(&lookup, "FRESHWIRE_DEDUP_TOPIC_WINDOW_CAPACITY") {
            self.topic_window_capacity = v;
        }
        if let Some(v) = parsed(&lookup, "FRESHWIRE_DEDUP_TOPIC_WINDOW_MAX_AGE_SECS") {
            self.topic_window_max_age_secs = v;
        }
        if let Some(v) = parsed(&lookup, "FRESHWIRE_DEDUP_CROSSPOST_MIN_INTERVAL_SECS") {
            self.crosspost_min_interval_secs = v;
        }
        if let Some(v) = lookup("FRESHWIRE_DEDUP_EXCLUSIVE_COMMIT") {
            self.exclusive_commit = parse_flag(&v);
        }
        self
    }

    /// Validates ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first invalid option.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::Configuration(format!(
                "similarity_threshold must be within 0..=1, got {}",
                self.similarity_threshold
            )));
        }

        let positive_counts = [
            ("top_term_count", self.top_term_count),
            ("semantic_lookback", self.semantic_lookback),
            ("topic_window_capacity", self.topic_window_capacity),
        ];
        if let Some((name, _)) = positive_counts.iter().find(|(_, value)| *value == 0) {
            return Err(Error::Configuration(format!("{name} must be at least 1")));
        }

        let positive_ttls = [
            ("content_ttl_secs", self.content_ttl_secs),
            ("semantic_ttl_secs", self.semantic_ttl_secs),
            ("source_ttl_secs", self.source_ttl_secs),
            ("crosspost_min_interval_secs", self.crosspost_min_interval_secs),
        ];
        if let Some((name, _)) = positive_ttls.iter().find(|(_, value)| *value == 0) {
            return Err(Error::Configuration(format!("{name} must be positive")));
        }

        let bounded_ttls = [
            ("content_ttl_secs", self.content_ttl_secs),
            ("semantic_ttl_secs", self.semantic_ttl_secs),
            ("source_ttl_secs", self.source_ttl_secs),
            ("global_ttl_secs", self.global_ttl_secs),
            ("topic_window_max_age_secs", self.topic_window_max_age_secs),
            ("crosspost_min_interval_secs", self.crosspost_min_interval_secs),
        ];
        if let Some((name, value)) = bounded_ttls.iter().find(|(_, value)| *value > MAX_TTL_SECS) {
            return Err(Error::Configuration(format!(
                "{name} must be at most {MAX_TTL_SECS}, got {value}"
            )));
        }

        if self.min_semantic_terms > self.top_term_count {
            return Err(Error::Configuration(format!(
                "min_semantic_terms ({}) exceeds top_term_count ({}), the semantic check could never run",
                self.min_semantic_terms, self.top_term_count
            )));
        }

        Ok(())
    }

    /// Lifetime of exact content fingerprints.
    #[must_use]
    pub const fn content_ttl(&self) -> Duration {
        Duration::from_secs(self.content_ttl_secs)
    }

    /// Lifetime of semantic fingerprints.
    #[must_use]
    pub const fn semantic_ttl(&self) -> Duration {
        Duration::from_secs(self.semantic_ttl_secs)
    }

    /// Lifetime of per-source URL sets.
    #[must_use]
    pub const fn source_ttl(&self) -> Duration {
        Duration::from_secs(self.source_ttl_secs)
    }

    /// Lifetime of the cross-module set, `None` when unbounded.
    #[must_use]
    pub const fn global_ttl(&self) -> Option<Duration> {
        if self.global_ttl_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.global_ttl_secs))
        }
    }

    /// Age limit of topic entries, `None` when bounded by count only.
    #[must_use]
    pub const fn topic_window_max_age(&self) -> Option<Duration> {
        if self.topic_window_max_age_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.topic_window_max_age_secs))
        }
    }

    /// Minimum spacing between relays.
    #[must_use]
    pub const fn crosspost_min_interval(&self) -> Duration {
        Duration::from_secs(self.crosspost_min_interval_secs)
    }

    /// Builder method to set enabled state.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder method to set the similarity threshold.
    #[must_use]
    pub const fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Builder method to set the number of terms per fingerprint.
    #[must_use]
    pub const fn with_top_term_count(mut self, count: usize) -> Self {
        self.top_term_count = count;
        self
    }

    /// Builder method to set the minimum semantic term count.
    #[must_use]
    pub const fn with_min_semantic_terms(mut self, count: usize) -> Self {
        self.min_semantic_terms = count;
        self
    }

    /// Builder method to set the semantic lookback capacity.
    #[must_use]
    pub const fn with_semantic_lookback(mut self, capacity: usize) -> Self {
        self.semantic_lookback = capacity;
        self
    }

    /// Builder method to set the content TTL.
    #[must_use]
    pub const fn with_content_ttl(mut self, ttl: Duration) -> Self {
        self.content_ttl_secs = ttl.as_secs();
        self
    }

    /// Builder method to set the semantic TTL.
    #[must_use]
    pub const fn with_semantic_ttl(mut self, ttl: Duration) -> Self {
        self.semantic_ttl_secs = ttl.as_secs();
        self
    }

    /// Builder method to set the source set TTL.
    #[must_use]
    pub const fn with_source_ttl(mut self, ttl: Duration) -> Self {
        self.source_ttl_secs = ttl.as_secs();
        self
    }

    /// Builder method to set the global set TTL; `None` keeps it forever.
    #[must_use]
    pub const fn with_global_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.global_ttl_secs = match ttl {
            Some(ttl) => ttl.as_secs(),
            None => 0,
        };
        self
    }

    /// Builder method to set the topic window capacity.
    #[must_use]
    pub const fn with_topic_window_capacity(mut self, capacity: usize) -> Self {
        self.topic_window_capacity = capacity;
        self
    }

    /// Builder method to set the topic window age limit.
    #[must_use]
    pub const fn with_topic_window_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.topic_window_max_age_secs = match max_age {
            Some(age) => age.as_secs(),
            None => 0,
        };
        self
    }

    /// Builder method to set the crosspost interval.
    #[must_use]
    pub const fn with_crosspost_min_interval(mut self, interval: Duration) -> Self {
        self.crosspost_min_interval_secs = interval.as_secs();
        self
    }

    /// Builder method to toggle exclusive commits.
    #[must_use]
    pub const fn with_exclusive_commit(mut self, exclusive: bool) -> Self {
        self.exclusive_commit = exclusive;
        self
    }
}
