//! Keyword-to-topic classification.

use crate::models::TopicLabel;

/// Trigger phrases per topic, in precedence order.
///
/// Matched as whole words against normalized text. A story about a hack
/// that triggered a regulatory response is filed as regulatory.
const TRIGGERS: &[(TopicLabel, &[&str])] = &[
    (
        TopicLabel::Regulatory,
        &[
            "sec", "cftc", "regulator", "regulators", "regulatory", "regulation", "regulations",
            "lawsuit", "sues", "sued", "settlement", "settles", "ban", "bans", "banned",
            "compliance", "legislation", "lawmakers", "senate", "congress", "court", "judge",
            "license", "licence", "sanction", "sanctions", "mica", "enforcement",
        ],
    ),
    (
        TopicLabel::MarketPrice,
        &[
            "price", "prices", "rally", "rallies", "surge", "surges", "plunge", "plunges",
            "slump", "slumps", "soars", "tumbles", "all time high", "market cap",
            "trading volume", "liquidations", "bull run", "bear market", "sell off",
        ],
    ),
    (
        TopicLabel::SecurityIncident,
        &[
            "hack", "hacked", "hacker", "hackers", "exploit", "exploited", "breach", "stolen",
            "phishing", "vulnerability", "drained", "attacker", "attackers", "rug pull", "scam",
        ],
    ),
    (
        TopicLabel::ProtocolUpgrade,
        &[
            "upgrade", "upgrades", "hard fork", "soft fork", "mainnet", "testnet", "eip", "bip",
            "roadmap", "layer 2", "client release", "activation",
        ],
    ),
    (
        TopicLabel::Adoption,
        &[
            "adopt", "adopts", "adoption", "partnership", "partners", "integrates",
            "integration", "accepts", "payments", "institutional", "custody", "onboards",
        ],
    ),
    (
        TopicLabel::Macro,
        &[
            "inflation", "interest rate", "interest rates", "fed", "federal reserve", "cpi",
            "recession", "gdp", "jobs report", "unemployment", "rate hike", "rate cut",
            "treasury yields", "tariff", "tariffs",
        ],
    ),
];

/// Classifies normalized text into a topic label.
///
/// The first label in precedence order with any trigger present wins;
/// [`TopicLabel::General`] when nothing matches.
#[must_use]
pub fn classify(normalized: &str) -> TopicLabel {
    let padded = format!(" {normalized} ");
    TRIGGERS
        .iter()
        .find(|(_, triggers)| {
            triggers
                .iter()
                .any(|trigger| padded.contains(&format!(" {trigger} ")))
        })
        .map_or(TopicLabel::General, |(label, _)| *label)
}

/// Returns the trigger phrases of a label.
#[must_use]
pub fn triggers(label: TopicLabel) -> &'static [&'static str] {
    TRIGGERS
        .iter()
        .find(|(candidate, _)| *candidate == label)
        .map(|(_, triggers)| *triggers)
        .unwrap_or_default()
}
