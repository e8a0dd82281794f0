//! Key families of the recency store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Group of store keys that share a prefix and are reset together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFamily {
    /// `content:<fingerprint>` entries.
    Content,
    /// `semantic:<key>` entries and the `semantic:recent` index.
    Semantic,
    /// `source:<name>` URL sets.
    Source,
    /// `global:articles`.
    Global,
    /// `recent_topics`.
    Topics,
    /// `crosspost:<destination>` markers.
    Crosspost,
}

impl KeyFamily {
    /// Returns all key families.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Content,
            Self::Semantic,
            Self::Source,
            Self::Global,
            Self::Topics,
            Self::Crosspost,
        ]
    }

    /// Returns the family name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Semantic => "semantic",
            Self::Source => "source",
            Self::Global => "global",
            Self::Topics => "topics",
            Self::Crosspost => "crosspost",
        }
    }

    /// Returns the key prefix every key of this family starts with.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Content => "content:",
            Self::Semantic => "semantic:",
            Self::Source => "source:",
            Self::Global => "global:",
            Self::Topics => "recent_topics",
            Self::Crosspost => "crosspost:",
        }
    }

    /// Parses a family name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "content" => Some(Self::Content),
            "semantic" => Some(Self::Semantic),
            "source" | "sources" => Some(Self::Source),
            "global" => Some(Self::Global),
            "topics" | "recent_topics" => Some(Self::Topics),
            "crosspost" | "crossposts" => Some(Self::Crosspost),
            _ => None,
        }
    }
}

impl fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_are_disjoint() {
        for a in KeyFamily::all() {
            for b in KeyFamily::all() {
                if a != b {
                    assert!(!a.prefix().starts_with(b.prefix()), "{a} vs {b}");
                }
            }
        }
    }

    #[test]
    fn test_parse_all() {
        for family in KeyFamily::all() {
            assert_eq!(KeyFamily::parse(family.as_str()), Some(*family));
        }
        assert_eq!(KeyFamily::parse("registry"), None);
    }
}
