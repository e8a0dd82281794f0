//! Article input type.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fetched news article.
///
/// Articles arrive from feed collaborators and are never mutated by the
/// engine. Missing text fields deserialize to empty strings so a partially
/// filled record can still be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Article {
    /// Headline.
    #[serde(default)]
    pub title: String,
    /// Description or body snippet.
    #[serde(default, alias = "summary", alias = "body")]
    pub description: String,
    /// Canonical URL.
    #[serde(default, alias = "link")]
    pub url: String,
    /// Feed or publisher name.
    #[serde(default)]
    pub source: String,
    /// Publication time, when the feed reports one.
    #[serde(default, alias = "publishedAt", skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Article {
    /// Creates an article without a publication timestamp.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            url: url.into(),
            source: source.into(),
            published_at: None,
        }
    }

    /// Sets the publication timestamp.
    #[must_use]
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    /// Returns true if the headline is present.
    #[must_use]
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    /// Returns true if the description is present.
    #[must_use]
    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }

    /// Returns true if either the headline or the description is missing.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !(self.has_title() && self.has_description())
    }

    /// Returns true if neither headline nor description carries text.
    #[must_use]
    pub fn has_no_text(&self) -> bool {
        !self.has_title() && !self.has_description()
    }

    /// Returns the trimmed URL, or `None` when blank.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        let url = self.url.trim();
        (!url.is_empty()).then_some(url)
    }

    /// Returns the trimmed source name, falling back to `unknown`.
    #[must_use]
    pub fn source_name(&self) -> &str {
        let source = self.source.trim();
        if source.is_empty() { "unknown" } else { source }
    }

    /// Parses a JSON batch: either an array of articles or a single object.
    ///
    /// ```rust
    /// use freshwire::models::Article;
    ///
    /// let one = Article::parse_batch(r#"{"title": "Fed holds", "url": "https://a/1"}"#)?;
    /// let many = Article::parse_batch(r#"[{"title": "a"}, {"title": "b"}]"#)?;
    /// assert_eq!((one.len(), many.len()), (1, 2));
    /// # Ok::<(), freshwire::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the input is neither shape.
    pub fn parse_batch(input: &str) -> Result<Vec<Self>> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Batch {
            Many(Vec<Article>),
            One(Box<Article>),
        }

        let batch: Batch = serde_json::from_str(input).map_err(|e| Error::OperationFailed {
            operation: "parse_articles".to_string(),
            cause: e.to_string(),
        })?;
        Ok(match batch {
            Batch::Many(articles) => articles,
            Batch::One(article) => vec![*article],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_completeness() {
        let full = Article::new("Title", "Body", "https://a.example/1", "wire");
        assert!(!full.is_partial());
        assert!(!full.has_no_text());

        let headline_only = Article::new("Title", "  ", "https://a.example/1", "wire");
        assert!(headline_only.is_partial());
        assert!(!headline_only.has_no_text());

        let empty = Article::new("", "", "https://a.example/1", "wire");
        assert!(empty.has_no_text());
    }

    #[test]
    fn test_article_source_fallback() {
        let article = Article::new("t", "d", "", "   ");
        assert_eq!(article.source_name(), "unknown");
        assert_eq!(article.url(), None);
    }

    #[test]
    fn test_article_deserializes_feed_aliases() {
        let json = r#"{
            "title": "Bitcoin ETF inflows",
            "summary": "Spot ETFs drew record inflows",
            "link": "https://news.example/etf",
            "source": "coindesk",
            "publishedAt": "2024-03-01T12:00:00Z"
        }"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.description, "Spot ETFs drew record inflows");
        assert_eq!(article.url, "https://news.example/etf");
        assert!(article.published_at.is_some());
    }

    #[test]
    fn test_parse_batch_shapes() {
        let batch = Article::parse_batch(
            r#"[{"title": "a", "source": "wire"}, {"title": "b", "url": "https://b"}]"#,
        )
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].url(), Some("https://b"));

        assert_eq!(Article::parse_batch(r#"{"title": "solo"}"#).unwrap().len(), 1);
        assert!(Article::parse_batch("[]").unwrap().is_empty());
        assert!(matches!(
            Article::parse_batch("\"headline\""),
            Err(Error::OperationFailed { .. })
        ));
    }

    #[test]
    fn test_article_missing_fields_default() {
        let article: Article = serde_json::from_str(r#"{"url": "https://x.example"}"#).unwrap();
        assert!(article.has_no_text());
        assert_eq!(article.url(), Some("https://x.example"));
    }
}
