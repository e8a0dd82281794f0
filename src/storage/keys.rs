//! Logical key layout of the recency store.
//!
//! | Key | Type | Holds |
//! |-----|------|-------|
//! | `content:<fingerprint>` | string | JSON `ContentEntry` |
//! | `semantic:<key>` | string | JSON `SemanticEntry` |
//! | `semantic:recent` | list | semantic keys, newest first |
//! | `source:<name>` | set | article URLs |
//! | `global:articles` | set | content fingerprints |
//! | `recent_topics` | list | `label|timestamp_ms` entries |
//! | `crosspost:<destination>` | string | last relay, unix ms |
//! | `registry:<family>` | set | keys written for the family |

use crate::models::KeyFamily;

/// Lookback index of semantic keys.
pub const SEMANTIC_RECENT: &str = "semantic:recent";

/// Cross-module set of content fingerprints.
pub const GLOBAL_ARTICLES: &str = "global:articles";

/// Topic diversity window.
pub const RECENT_TOPICS: &str = "recent_topics";

/// Prefix of the per-family key registries.
pub const REGISTRY_PREFIX: &str = "registry:";

/// Key of an exact content entry.
#[must_use]
pub fn content(fingerprint: &str) -> String {
    format!("{}{fingerprint}", KeyFamily::Content.prefix())
}

/// Key of a semantic entry.
#[must_use]
pub fn semantic(key: &str) -> String {
    format!("{}{key}", KeyFamily::Semantic.prefix())
}

/// Key of a source URL set.
///
/// Source names are case-folded so `Reuters` and `reuters` share a set.
#[must_use]
pub fn source(name: &str) -> String {
    format!(
        "{}{}",
        KeyFamily::Source.prefix(),
        name.trim().to_lowercase()
    )
}

/// Key of a crosspost marker.
#[must_use]
pub fn crosspost(destination: &str) -> String {
    format!(
        "{}{}",
        KeyFamily::Crosspost.prefix(),
        destination.trim().to_lowercase()
    )
}

/// Key of the registry set for a family.
#[must_use]
pub fn registry(family: KeyFamily) -> String {
    format!("{REGISTRY_PREFIX}{}", family.as_str())
}

/// Returns the family a logical key belongs to, if any.
#[must_use]
pub fn family_of(key: &str) -> Option<KeyFamily> {
    KeyFamily::all()
        .iter()
        .copied()
        .find(|family| key.starts_with(family.prefix()))
}
