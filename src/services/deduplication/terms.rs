//! Significant-term extraction for semantic fingerprints.
//!
//! A lexical stand-in for embeddings: two write-ups of the same story share
//! most of their rare words even when the wording differs.

use crate::models::SemanticFingerprint;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use super::hasher::ContentHasher;
use super::taxonomy;

/// Default number of terms kept per fingerprint.
pub const DEFAULT_TOP_TERMS: usize = 8;

/// Function words and newswire filler ignored during extraction.
pub static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        // Function words
        "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "from", "as", "is", "was", "are", "were", "been", "be", "being", "have", "has", "had",
        "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
        "can", "need", "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us",
        "them", "my", "your", "his", "its", "our", "their", "this", "that", "these", "those",
        "what", "which", "who", "whom", "how", "when", "where", "why", "all", "each", "every",
        "both", "few", "more", "most", "other", "some", "such", "no", "nor", "not", "only",
        "own", "same", "so", "than", "too", "very", "just", "also", "now", "here", "there",
        "then", "once", "about", "into", "over", "after", "before", "under", "again", "further",
        "out", "up", "down", "off", "above", "below", "between", "through", "during", "while",
        "if", "because", "until", "against", "any", "amid", "via", "per", "yet", "still",
        // Newswire filler
        "says", "said", "say", "report", "reports", "reported", "according", "new", "news",
        "today", "yesterday", "week", "weeks", "month", "year", "years", "latest", "update",
        "updates", "breaking", "amp", "nbsp", "read", "full", "story", "first", "last", "one",
        "two", "three", "million", "billion", "percent",
    ]
    .into_iter()
    .collect()
});

/// Splits normalized text into candidate tokens.
///
/// Tokens shorter than three characters are dropped unless they contain a
/// digit (`l2`, `q3`).
pub fn tokenize(normalized: &str) -> impl Iterator<Item = &str> {
    normalized.split_whitespace().filter(|token| {
        let chars = token.chars().count();
        chars >= 3 || (chars == 2 && token.chars().any(|c| c.is_ascii_digit()))
    })
}

/// Light suffix stemmer.
///
/// Folds the plural and tense variants newswire copy rotates through
/// (`approve`, `approves`, `approved`, `approving`) onto one stem by
/// stripping the suffix, undoubling a final consonant (`shipped` to `ship`)
/// and dropping a trailing `e`. Not a full Porter stemmer; short words are
/// left alone.
#[must_use]
pub fn stem(token: &str) -> String {
    let len = token.chars().count();
    if len > 4
        && let Some(base) = token
            .strip_suffix("ies")
            .or_else(|| token.strip_suffix("ied"))
    {
        return format!("{base}y");
    }
    if token.ends_with("eed") {
        // agreed -> agree; speed, freed stay whole
        return if len > 5 {
            token[..token.len() - 1].to_string()
        } else {
            token.to_string()
        };
    }

    let stemmed = if len > 5
        && let Some(base) = token.strip_suffix("ing")
    {
        undouble(base)
    } else if len > 4
        && let Some(base) = token.strip_suffix("ed")
    {
        undouble(base)
    } else if len > 3
        && !token.ends_with("ss")
        && let Some(base) = token.strip_suffix('s')
    {
        base
    } else {
        token
    };

    drop_final_e(stemmed).to_string()
}

/// Drops one of a doubled final consonant left by `-ed` or `-ing`.
fn undouble(base: &str) -> &str {
    let mut tail = base.chars().rev();
    match (tail.next(), tail.next()) {
        (Some(last), Some(prev))
            if last == prev
                && base.chars().count() >= 4
                && last.is_ascii_alphabetic()
                && !matches!(last, 'a' | 'e' | 'i' | 'o' | 'u' | 'l' | 's' | 'z') =>
        {
            &base[..base.len() - 1]
        },
        _ => base,
    }
}

/// Drops a silent trailing `e` so `approve` and `approv(ed)` meet.
fn drop_final_e(stemmed: &str) -> &str {
    if stemmed.chars().count() > 3 && stemmed.ends_with('e') && !stemmed.ends_with("ee") {
        &stemmed[..stemmed.len() - 1]
    } else {
        stemmed
    }
}

/// Ranks significant terms of normalized text.
///
/// Returns at most `top_n` stems, most frequent first; ties keep the order of
/// first occurrence.
#[must_use]
pub fn significant_terms(normalized: &str, top_n: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();

    for (position, token) in tokenize(normalized)
        .filter(|token| !STOP_WORDS.contains(token))
        .enumerate()
    {
        let stemmed = stem(token);
        if STOP_WORDS.contains(stemmed.as_str()) {
            continue;
        }
        counts
            .entry(stemmed)
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, position));
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(term, (count, first))| (term, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(top_n)
        .map(|(term, _, _)| term)
        .collect()
}

/// Computes the semantic fingerprint of an article.
///
/// Pure: the same title and description always yield the same terms in the
/// same order and the same topic label.
///
/// ```rust
/// use freshwire::models::TopicLabel;
/// use freshwire::services::deduplication::compute_semantic_fingerprint;
///
/// let fp = compute_semantic_fingerprint(
///     "Exchange hacked, hot wallets drained",
///     "Attackers drained hot wallets at the exchange overnight.",
///     8,
/// );
/// assert_eq!(fp.topic, TopicLabel::SecurityIncident);
/// assert_eq!(fp.terms[0], "exchang");
/// assert!(fp.terms.iter().any(|term| term == "drain"));
/// ```
#[must_use]
pub fn compute_semantic_fingerprint(
    title: &str,
    description: &str,
    top_n: usize,
) -> SemanticFingerprint {
    let normalized = ContentHasher::normalize(&format!("{title} {description}"));
    let terms = significant_terms(&normalized, top_n);
    let topic = taxonomy::classify(&normalized);
    SemanticFingerprint::new(terms, topic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TopicLabel;
    use test_case::test_case;

    #[test_case("approves" => "approv"; "plural verb")]
    #[test_case("approved" => "approv"; "past tense")]
    #[test_case("trading" => "trad"; "gerund")]
    #[test_case("shipped" => "ship"; "doubled consonant")]
    #[test_case("agreed" => "agree"; "eed past tense")]
    #[test_case("policies" => "policy"; "ies plural")]
    #[test_case("studied" => "study"; "ied past tense")]
    #[test_case("bitcoin" => "bitcoin"; "no suffix")]
    #[test_case("gas" => "gas"; "short word untouched")]
    #[test_case("address" => "address"; "double s kept")]
    #[test_case("sing" => "sing"; "short ing untouched")]
    fn test_stem(token: &str) -> String {
        stem(token)
    }

    #[test_case(&["approve", "approves", "approved", "approving"]; "silent e verb")]
    #[test_case(&["ship", "ships", "shipped", "shipping"]; "doubled consonant verb")]
    #[test_case(&["halt", "halts", "halted", "halting"]; "plain verb")]
    #[test_case(&["exchange", "exchanges"]; "silent e noun")]
    #[test_case(&["agree", "agrees", "agreed", "agreeing"]; "double e verb")]
    #[test_case(&["apply", "applies", "applied"]; "y verb")]
    #[test_case(&["bill", "bills", "billed", "billing"]; "double l kept")]
    fn test_stem_folds_inflections(forms: &[&str]) {
        let stems: HashSet<String> = forms.iter().map(|form| stem(form)).collect();
        assert_eq!(stems.len(), 1, "{forms:?} stemmed to {stems:?}");
    }

    #[test]
    fn test_tokenize_length_rule() {
        let tokens: Vec<&str> = tokenize("a l2 to eth q3 x9z 42").collect();
        assert_eq!(tokens, vec!["l2", "eth", "q3", "x9z", "42"]);
    }

    #[test]
    fn test_stop_words_removed() {
        let terms = significant_terms("the sec said that the exchange was fined", 8);
        assert_eq!(terms, vec!["sec", "exchang", "fin"]);
    }

    #[test]
    fn test_rank_by_frequency_then_first_occurrence() {
        let terms = significant_terms("solana outage solana validators outage solana", 8);
        assert_eq!(terms, vec!["solana", "outag", "validator"]);
    }

    #[test]
    fn test_top_n_truncates() {
        let terms = significant_terms("alpha beta gamma delta epsilon", 2);
        assert_eq!(terms, vec!["alpha", "beta"]);
        assert!(significant_terms("alpha beta", 0).is_empty());
    }

    #[test]
    fn test_semantic_fingerprint_is_deterministic() {
        let a = compute_semantic_fingerprint("SEC sues exchange", "Regulator files lawsuit", 8);
        let b = compute_semantic_fingerprint("SEC sues exchange", "Regulator files lawsuit", 8);
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.topic, TopicLabel::Regulatory);
    }

    #[test]
    fn test_empty_text_has_no_terms() {
        let fp = compute_semantic_fingerprint("", "", 8);
        assert!(fp.is_empty());
        assert_eq!(fp.topic, TopicLabel::General);
    }
}
