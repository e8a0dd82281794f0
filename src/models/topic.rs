//! Topic taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse subject category of an article.
///
/// Declaration order is the classification priority: the first label whose
/// triggers appear in an article wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopicLabel {
    /// Regulators, enforcement, legislation, court rulings.
    Regulatory,
    /// Price moves, rallies, selloffs, liquidations.
    MarketPrice,
    /// Hacks, exploits, breaches, scams.
    SecurityIncident,
    /// Forks, upgrades, mainnet launches, protocol releases.
    ProtocolUpgrade,
    /// Institutional and consumer adoption, integrations, ETFs.
    Adoption,
    /// Inflation, interest rates, central banks, jobs data.
    Macro,
    /// No taxonomy trigger matched.
    #[default]
    General,
}

impl TopicLabel {
    /// Returns all labels in classification order, `General` last.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Regulatory,
            Self::MarketPrice,
            Self::SecurityIncident,
            Self::ProtocolUpgrade,
            Self::Adoption,
            Self::Macro,
            Self::General,
        ]
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regulatory => "regulatory",
            Self::MarketPrice => "market-price",
            Self::SecurityIncident => "security-incident",
            Self::ProtocolUpgrade => "protocol-upgrade",
            Self::Adoption => "adoption",
            Self::Macro => "macro",
            Self::General => "general",
        }
    }

    /// Parses a label, accepting `-` or `_` separators.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "regulatory" => Some(Self::Regulatory),
            "market-price" | "market" | "price" => Some(Self::MarketPrice),
            "security-incident" | "security" => Some(Self::SecurityIncident),
            "protocol-upgrade" | "protocol" => Some(Self::ProtocolUpgrade),
            "adoption" => Some(Self::Adoption),
            "macro" => Some(Self::Macro),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

impl fmt::Display for TopicLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrips_as_str() {
        for label in TopicLabel::all() {
            assert_eq!(TopicLabel::parse(label.as_str()), Some(*label));
        }
    }

    #[test]
    fn test_parse_underscore_and_case() {
        assert_eq!(
            TopicLabel::parse("Market_Price"),
            Some(TopicLabel::MarketPrice)
        );
        assert_eq!(TopicLabel::parse("weather"), None);
    }

    #[test]
    fn test_serde_kebab_case() {
        let json = serde_json::to_string(&TopicLabel::SecurityIncident).unwrap();
        assert_eq!(json, "\"security-incident\"");
    }
}
