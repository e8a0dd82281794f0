//! Deduplication service facade.
//!
//! The single entry point generators call: evaluate, commit, and the topic
//! and crosspost passthroughs. Owns every key the engine writes.

use crate::models::{Article, CommitOutcome, Decision, Evaluation, KeyFamily, TopicLabel};
use crate::services::crosspost::{CrosspostState, CrosspostThrottle};
use crate::services::registry::KeyRegistry;
use crate::services::topics::TopicDiversityTracker;
use crate::storage::{RecencyStore, keys};
use crate::{Error, Result, current_timestamp_millis};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use super::config::DeduplicationConfig;
use super::matcher::{SimilarityMatcher, record_evaluation_metrics};
use super::types::{
    ContentEntry, Deduplicator, Fingerprints, Provenance, ResetReport, SemanticEntry, decode,
    encode,
};

/// Service for deduplication checking.
///
/// Generic over the store so tests can use [`crate::storage::InMemoryStore`]
/// directly while the binary picks a backend at runtime through
/// `Arc<dyn RecencyStore>`.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use freshwire::models::{Article, CommitOutcome};
/// use freshwire::services::deduplication::{DeduplicationConfig, DeduplicationService};
/// use freshwire::storage::InMemoryStore;
///
/// let service =
///     DeduplicationService::new(Arc::new(InMemoryStore::new(1_000)), DeduplicationConfig::default())?;
/// let article = Article::new("Fed holds rates", "The FOMC left rates unchanged.", "https://a/1", "wire");
///
/// assert_eq!(service.commit(&article)?, CommitOutcome::Committed);
/// assert_eq!(service.commit(&article)?, CommitOutcome::AlreadyCommitted);
/// # Ok::<(), freshwire::Error>(())
/// ```
pub struct DeduplicationService<S: RecencyStore + ?Sized> {
    /// Configuration.
    config: DeduplicationConfig,
    /// Shared store.
    store: Arc<S>,
    /// Per-family key registry.
    registry: KeyRegistry<S>,
    /// Ordered duplicate checks.
    matcher: SimilarityMatcher<S>,
    /// Recent topics window.
    topics: TopicDiversityTracker<S>,
    /// Relay spacing.
    crosspost: CrosspostThrottle<S>,
}

impl<S: RecencyStore + ?Sized> DeduplicationService<S> {
    /// Creates a new deduplication service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the configuration is invalid.
    pub fn new(store: Arc<S>, config: DeduplicationConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            registry: KeyRegistry::new(Arc::clone(&store)),
            matcher: SimilarityMatcher::new(Arc::clone(&store), &config),
            topics: TopicDiversityTracker::new(
                Arc::clone(&store),
                config.topic_window_capacity,
                config.topic_window_max_age(),
            ),
            crosspost: CrosspostThrottle::new(Arc::clone(&store), config.crosspost_min_interval()),
            store,
            config,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &DeduplicationConfig {
        &self.config
    }

    /// Returns the store backend name.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Returns true if deduplication is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Computes both fingerprints of an article without touching the store.
    #[must_use]
    pub fn fingerprints(&self, article: &Article) -> Fingerprints {
        self.matcher.fingerprints(article)
    }

    /// Decides whether an article is fresh.
    ///
    /// Read-only and idempotent. Store failures never surface here: the
    /// evaluation comes back novel with `degraded` set.
    #[must_use]
    pub fn evaluate(&self, article: &Article) -> Evaluation {
        self.matcher.evaluate(article)
    }

    /// Evaluates a finite batch.
    ///
    /// The semantic window is read once. Each novel article is folded into
    /// the batch state, so a later article in the same batch is flagged
    /// against it: same content fingerprint is an exact duplicate, same
    /// source and URL a source duplicate, and enough term overlap a semantic
    /// duplicate.
    #[instrument(skip(self, articles), fields(operation = "evaluate_batch", size = articles.len()))]
    pub fn evaluate_batch(&self, articles: &[Article]) -> Vec<Evaluation> {
        if !self.config.enabled {
            return articles.iter().map(|article| self.evaluate(article)).collect();
        }

        let window = self
            .matcher
            .load_window()
            .map_err(|e| {
                tracing::warn!(error = %e, "Semantic window read failed, checking per article");
            })
            .ok();

        let mut batch = BatchState::default();
        articles
            .iter()
            .map(|article| {
                let fingerprints = self.matcher.fingerprints(article);

                if let Some(evaluation) = batch.find(article, &fingerprints) {
                    tracing::debug!(
                        decision = %evaluation.decision.as_str(),
                        fingerprint = %fingerprints.content.short(),
                        "Duplicate within batch"
                    );
                    record_evaluation_metrics(&evaluation);
                    return evaluation;
                }

                let evaluation = self.matcher.evaluate_with(
                    article,
                    &fingerprints,
                    window.as_deref(),
                    &batch.entries,
                );
                if evaluation.is_novel() {
                    batch.accept(article, &fingerprints);
                }
                evaluation
            })
            .collect()
    }

    /// Records an accepted article.
    ///
    /// Writes the exact fingerprint, the semantic fingerprint, source-set
    /// membership and global-set membership, each with its family TTL.
    /// Committing the same article twice leaves equivalent state.
    ///
    /// With `exclusive_commit`, the exact fingerprint is claimed with
    /// set-if-absent; if a different URL already owns it the outcome is
    /// [`CommitOutcome::LostRace`] and nothing else is written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedArticle`] for an article with no text and no
    /// URL, or a store error if a write fails.
    #[instrument(
        skip(self, article),
        fields(operation = "commit", source = %article.source_name())
    )]
    pub fn commit(&self, article: &Article) -> Result<CommitOutcome> {
        let fingerprints = self.matcher.fingerprints(article);
        if fingerprints.content.is_unidentifiable() {
            return Err(Error::MalformedArticle(
                "article has no title, description, or url".to_string(),
            ));
        }

        let outcome = self.claim_content(article, &fingerprints)?;
        if outcome == CommitOutcome::LostRace {
            tracing::info!(
                fingerprint = %fingerprints.content.short(),
                "Lost commit race, another article owns this fingerprint"
            );
            Self::record_commit_metrics(outcome);
            return Ok(outcome);
        }

        self.write_semantic(article, &fingerprints)?;
        self.write_memberships(article, &fingerprints)?;

        tracing::info!(
            fingerprint = %fingerprints.content.short(),
            outcome = %outcome,
            "Article committed"
        );
        Self::record_commit_metrics(outcome);
        Ok(outcome)
    }

    /// Writes the content entry and decides the outcome.
    fn claim_content(&self, article: &Article, fingerprints: &Fingerprints) -> Result<CommitOutcome> {
        let key = keys::content(fingerprints.content.as_str());
        let ttl = self.config.content_ttl();
        let now = current_timestamp_millis();
        let url = article.url().unwrap_or_default();
        let entry = ContentEntry {
            fingerprint: fingerprints.content.clone(),
            url: url.to_string(),
            source: article.source_name().to_string(),
            inserted_at_ms: now,
            expires_at_ms: now.saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)),
        };
        let value = encode(&entry)?;

        let outcome = if self.config.exclusive_commit {
            if self.store.put_if_absent(&key, &value, Some(ttl))? {
                CommitOutcome::Committed
            } else {
                self.resolve_existing(&key, &value, url, ttl)?
            }
        } else if self.store.exists(&key)? {
            CommitOutcome::AlreadyCommitted
        } else {
            self.store.put(&key, &value, Some(ttl))?;
            CommitOutcome::Committed
        };

        if outcome != CommitOutcome::LostRace {
            self.registry.register(KeyFamily::Content, &key, Some(ttl))?;
        }
        Ok(outcome)
    }

    /// Decides between a re-commit and a lost race for an existing entry.
    fn resolve_existing(
        &self,
        key: &str,
        value: &str,
        url: &str,
        ttl: Duration,
    ) -> Result<CommitOutcome> {
        match self.store.get(key)? {
            Some(raw) => match decode::<ContentEntry>(&raw) {
                Ok(existing) if existing.url == url => Ok(CommitOutcome::AlreadyCommitted),
                Ok(_) => Ok(CommitOutcome::LostRace),
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable content entry, treating as taken");
                    Ok(CommitOutcome::LostRace)
                },
            },
            // Expired between the two calls
            None => Ok(if self.store.put_if_absent(key, value, Some(ttl))? {
                CommitOutcome::Committed
            } else {
                CommitOutcome::LostRace
            }),
        }
    }

    fn write_semantic(&self, article: &Article, fingerprints: &Fingerprints) -> Result<()> {
        if fingerprints.semantic.is_empty() {
            return Ok(());
        }

        let ttl = Some(self.config.semantic_ttl());
        let key = keys::semantic(&fingerprints.semantic_key);
        let entry = semantic_entry(article, fingerprints);

        // Only a new slot enters the lookback index, keeping re-commits idempotent
        if self.store.put_if_absent(&key, &encode(&entry)?, ttl)? {
            self.store.push_capped(
                keys::SEMANTIC_RECENT,
                &fingerprints.semantic_key,
                self.config.semantic_lookback,
                ttl,
            )?;
        }
        self.registry.register(KeyFamily::Semantic, &key, ttl)?;
        Ok(())
    }

    fn write_memberships(&self, article: &Article, fingerprints: &Fingerprints) -> Result<()> {
        if let Some(url) = article.url() {
            let key = keys::source(article.source_name());
            let ttl = Some(self.config.source_ttl());
            self.store.add_to_set(&key, url, ttl)?;
            self.registry.register(KeyFamily::Source, &key, ttl)?;
        }

        let ttl = self.config.global_ttl();
        self.store
            .add_to_set(keys::GLOBAL_ARTICLES, fingerprints.content.as_str(), ttl)?;
        self.registry
            .register(KeyFamily::Global, keys::GLOBAL_ARTICLES, ttl)?;
        Ok(())
    }

    fn record_commit_metrics(outcome: CommitOutcome) {
        metrics::counter!(
            "freshwire_commits_total",
            "outcome" => outcome.as_str()
        )
        .increment(1);
    }

    /// Deletes every registered key of the given families.
    ///
    /// # Errors
    ///
    /// Returns a store error; families reset before the failure stay reset.
    #[instrument(skip(self), fields(operation = "reset"))]
    pub fn reset(&self, families: &[KeyFamily]) -> Result<ResetReport> {
        let mut report = ResetReport::default();
        for family in families {
            let removed = self.registry.clear(*family)?;
            tracing::info!(family = %family, removed, "Key family reset");
            report.record(*family, removed);
        }
        Ok(report)
    }

    /// Deletes every key with the given families' prefixes.
    ///
    /// Cursor-based scan; use for keys written before the registry existed.
    ///
    /// # Errors
    ///
    /// Returns a store error; families purged before the failure stay purged.
    #[instrument(skip(self), fields(operation = "purge"))]
    pub fn purge(&self, families: &[KeyFamily]) -> Result<ResetReport> {
        let mut report = ResetReport::default();
        for family in families {
            let removed = self.registry.purge(*family)?;
            tracing::info!(family = %family, removed, "Key family purged");
            report.record(*family, removed);
        }
        Ok(report)
    }

    /// Lists the live keys of a family.
    ///
    /// # Errors
    ///
    /// Returns a store error if the scan fails.
    pub fn keys(&self, family: KeyFamily) -> Result<Vec<String>> {
        self.store.keys_with_prefix(family.prefix())
    }

    /// Checks that the store answers.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub fn ping(&self) -> Result<()> {
        self.store.ping()
    }

    /// Returns true if a relay to `destination` may go out now.
    ///
    /// Fails closed: an unreachable store answers `false`.
    #[must_use]
    pub fn can_crosspost(&self, destination: &str) -> bool {
        self.crosspost.can_crosspost(destination).unwrap_or_else(|e| {
            tracing::warn!(destination, error = %e, "Crosspost check failed, holding relay");
            false
        })
    }

    /// Returns the relay state of a destination.
    ///
    /// # Errors
    ///
    /// Returns a store error if the marker cannot be read.
    pub fn crosspost_state(&self, destination: &str) -> Result<CrosspostState> {
        self.crosspost.state(destination)
    }

    /// Records a relay to `destination`.
    ///
    /// # Errors
    ///
    /// Returns a store error if the marker cannot be written.
    pub fn mark_crossposted(&self, destination: &str) -> Result<()> {
        self.crosspost.mark_crossposted(destination)
    }

    /// Appends a covered topic to the diversity window.
    ///
    /// # Errors
    ///
    /// Returns a store error if the window cannot be written.
    pub fn record_topic(&self, label: TopicLabel) -> Result<()> {
        self.topics.record_topic(label)
    }

    /// Returns the advisory pressure of a topic; `0.0` if the store fails.
    #[must_use]
    pub fn topic_pressure(&self, label: TopicLabel) -> f32 {
        self.topics.topic_pressure(label).unwrap_or_else(|e| {
            tracing::warn!(topic = %label, error = %e, "Topic pressure unavailable");
            0.0
        })
    }

    /// Counts per label over the topic window.
    ///
    /// # Errors
    ///
    /// Returns a store error if the window cannot be read.
    pub fn topic_distribution(&self) -> Result<Vec<(TopicLabel, usize)>> {
        self.topics.distribution()
    }

    /// Returns the least covered candidate topic.
    ///
    /// # Errors
    ///
    /// Returns a store error if the window cannot be read.
    pub fn least_covered_topic(&self, candidates: &[TopicLabel]) -> Result<Option<TopicLabel>> {
        self.topics.least_covered(candidates)
    }
}

fn semantic_entry(article: &Article, fingerprints: &Fingerprints) -> SemanticEntry {
    SemanticEntry {
        key: fingerprints.semantic_key.clone(),
        terms: fingerprints.semantic.terms.clone(),
        topic: fingerprints.semantic.topic,
        url: article.url().unwrap_or_default().to_string(),
        source: article.source_name().to_string(),
        inserted_at_ms: current_timestamp_millis(),
    }
}

/// Articles accepted earlier in a batch, not yet in the store.
#[derive(Default)]
struct BatchState {
    /// Content fingerprint to provenance.
    exact: HashMap<String, Provenance>,
    /// `(source, url)` pairs.
    urls: HashSet<(String, String)>,
    /// Semantic entries, oldest first.
    entries: Vec<SemanticEntry>,
}

impl BatchState {
    /// Checks an article against the exact and source state.
    fn find(&self, article: &Article, fingerprints: &Fingerprints) -> Option<Evaluation> {
        let content = &fingerprints.content;
        let (decision, provenance) = if !content.is_unidentifiable()
            && let Some(provenance) = self.exact.get(content.as_str())
        {
            (Decision::DuplicateExact, provenance.clone())
        } else if let Some(url) = article.url()
            && self
                .urls
                .contains(&(article.source_name().to_string(), url.to_string()))
        {
            let provenance = Provenance {
                source: Some(article.source_name().to_string()),
                url: Some(url.to_string()),
            };
            (Decision::DuplicateSource, provenance)
        } else {
            return None;
        };

        Some(Evaluation::duplicate(
            decision,
            content.clone(),
            provenance.source,
            provenance.url,
            0,
        ))
    }

    /// Folds a novel article into the batch.
    fn accept(&mut self, article: &Article, fingerprints: &Fingerprints) {
        let url = article.url().map(ToString::to_string);
        if !fingerprints.content.is_unidentifiable() {
            self.exact
                .entry(fingerprints.content.as_str().to_string())
                .or_insert_with(|| Provenance {
                    source: Some(article.source_name().to_string()),
                    url: url.clone(),
                });
        }
        if let Some(url) = url {
            self.urls.insert((article.source_name().to_string(), url));
        }
        if !fingerprints.semantic.is_empty() {
            self.entries.push(semantic_entry(article, fingerprints));
        }
    }
}

impl<S: RecencyStore + ?Sized> Deduplicator for DeduplicationService<S> {
    fn evaluate(&self, article: &Article) -> Evaluation {
        Self::evaluate(self, article)
    }

    fn commit(&self, article: &Article) -> Result<CommitOutcome> {
        Self::commit(self, article)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn service(config: DeduplicationConfig) -> (Arc<InMemoryStore>, DeduplicationService<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new(1_000));
        let service = DeduplicationService::new(Arc::clone(&store), config).unwrap();
        (store, service)
    }

    fn article(url: &str) -> Article {
        Article::new(
            "Solana validators push emergency patch after outage",
            "Validators coordinated a restart following a five hour outage of the network.",
            url,
            "wire",
        )
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let store = Arc::new(InMemoryStore::new(10));
        let config = DeduplicationConfig::default().with_similarity_threshold(2.0);
        assert!(matches!(
            DeduplicationService::new(store, config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_commit_then_evaluate_is_exact_duplicate() {
        let (_, service) = service(DeduplicationConfig::default());
        let first = article("https://wire.example/1");

        assert!(service.evaluate(&first).is_novel());
        assert_eq!(service.commit(&first).unwrap(), CommitOutcome::Committed);

        let evaluation = service.evaluate(&first);
        assert_eq!(evaluation.decision, Decision::DuplicateExact);
        assert_eq!(evaluation.matched_url.as_deref(), Some("https://wire.example/1"));
    }

    #[test]
    fn test_commit_writes_every_family() {
        let (store, service) = service(DeduplicationConfig::default());
        let first = article("https://wire.example/1");
        service.commit(&first).unwrap();
        let fps = service.fingerprints(&first);

        assert!(store.exists(&keys::content(fps.content.as_str())).unwrap());
        assert!(store.exists(&keys::semantic(&fps.semantic_key)).unwrap());
        assert_eq!(store.list_range(keys::SEMANTIC_RECENT).unwrap(), vec![fps.semantic_key.clone()]);
        assert!(store.is_member(&keys::source("wire"), "https://wire.example/1").unwrap());
        assert!(store.is_member(keys::GLOBAL_ARTICLES, fps.content.as_str()).unwrap());
    }

    #[test]
    fn test_recommit_is_idempotent() {
        let (store, service) = service(DeduplicationConfig::default());
        let first = article("https://wire.example/1");

        service.commit(&first).unwrap();
        assert_eq!(service.commit(&first).unwrap(), CommitOutcome::AlreadyCommitted);
        assert_eq!(store.list_range(keys::SEMANTIC_RECENT).unwrap().len(), 1);
        assert_eq!(store.set_members(keys::GLOBAL_ARTICLES).unwrap().len(), 1);
    }

    #[test]
    fn test_exclusive_commit_lost_race() {
        let (store, service) = service(DeduplicationConfig::default());
        service.commit(&article("https://wire.example/1")).unwrap();

        let syndicated = Article::new(
            "Solana validators push emergency patch after outage",
            "Validators coordinated a restart following a five hour outage of the network.",
            "https://desk.example/copy",
            "desk",
        );
        assert_eq!(service.commit(&syndicated).unwrap(), CommitOutcome::LostRace);
        assert!(store.set_members(&keys::source("desk")).unwrap().is_empty());
    }

    #[test]
    fn test_non_exclusive_commit_never_loses() {
        let config = DeduplicationConfig::default().with_exclusive_commit(false);
        let (store, service) = service(config);
        service.commit(&article("https://wire.example/1")).unwrap();

        let copy = Article::new(
            "Solana validators push emergency patch after outage",
            "Validators coordinated a restart following a five hour outage of the network.",
            "https://desk.example/copy",
            "desk",
        );
        assert_eq!(service.commit(&copy).unwrap(), CommitOutcome::AlreadyCommitted);
        assert!(store.is_member(&keys::source("desk"), "https://desk.example/copy").unwrap());
    }

    #[test]
    fn test_commit_refuses_unidentifiable_article() {
        let (_, service) = service(DeduplicationConfig::default());
        let blank = Article::new("", "", "", "wire");
        assert!(matches!(service.commit(&blank), Err(Error::MalformedArticle(_))));
    }

    #[test]
    fn test_url_only_article_matches_by_url() {
        let (_, service) = service(DeduplicationConfig::default());
        let bare = Article::new("", "", "https://wire.example/bare", "wire");

        service.commit(&bare).unwrap();
        let evaluation = service.evaluate(&bare);
        assert_eq!(evaluation.decision, Decision::DuplicateExact);
        assert_eq!(evaluation.confidence, crate::models::Confidence::Low);
    }

    #[test]
    fn test_batch_flags_intra_batch_duplicates() {
        let (_, service) = service(DeduplicationConfig::default());
        let batch = vec![
            article("https://wire.example/1"),
            article("https://desk.example/2"),
            Article::new("Fed holds rates", "FOMC statement unchanged", "https://a/3", "wire"),
        ];

        let evaluations = service.evaluate_batch(&batch);
        assert_eq!(evaluations.len(), 3);
        assert!(evaluations[0].is_novel());
        assert_eq!(evaluations[1].decision, Decision::DuplicateExact);
        assert_eq!(evaluations[1].matched_url.as_deref(), Some("https://wire.example/1"));
        assert!(evaluations[2].is_novel());
    }

    #[test]
    fn test_batch_flags_same_url_with_edited_headline() {
        let (_, service) = service(DeduplicationConfig::default());
        let batch = vec![
            article("https://wire.example/1"),
            Article::new(
                "UPDATE: network back online",
                "Block production resumed after validators upgraded.",
                "https://wire.example/1",
                "wire",
            ),
        ];

        let evaluations = service.evaluate_batch(&batch);
        assert!(evaluations[0].is_novel());
        assert_eq!(evaluations[1].decision, Decision::DuplicateSource);
        assert_eq!(evaluations[1].matched_url.as_deref(), Some("https://wire.example/1"));
    }

    #[test]
    fn test_batch_duplicates_are_counted() {
        use metrics_exporter_prometheus::PrometheusBuilder;

        let (_, service) = service(DeduplicationConfig::default());
        let batch = vec![article("https://wire.example/1"), article("https://desk.example/2")];
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            service.evaluate_batch(&batch);
        });

        let rendered = handle.render();
        assert!(rendered.contains("decision=\"novel\""));
        assert!(rendered.contains("decision=\"duplicate_exact\""));
    }

    #[test]
    fn test_reset_only_touches_requested_families() {
        let (store, service) = service(DeduplicationConfig::default());
        let first = article("https://wire.example/1");
        service.commit(&first).unwrap();
        service.mark_crossposted("telegram").unwrap();

        let report = service.reset(&[KeyFamily::Content]).unwrap();
        assert_eq!(report.removed_for(KeyFamily::Content), 1);

        // Global set still knows the story
        assert_eq!(service.evaluate(&first).decision, Decision::DuplicateSource);
        assert!(!service.can_crosspost("telegram"));

        let report = service.reset(KeyFamily::all()).unwrap();
        assert!(report.total() >= 4);
        assert!(service.evaluate(&first).is_novel());
        assert!(service.can_crosspost("telegram"));
        assert!(store.keys_with_prefix("registry:").unwrap().is_empty());
    }

    #[test]
    fn test_topic_passthroughs() {
        let (_, service) = service(DeduplicationConfig::default());
        service.record_topic(TopicLabel::Regulatory).unwrap();
        service.record_topic(TopicLabel::Macro).unwrap();

        assert!((service.topic_pressure(TopicLabel::Macro) - 0.5).abs() < f32::EPSILON);
        assert_eq!(
            service
                .least_covered_topic(&[TopicLabel::Regulatory, TopicLabel::Adoption])
                .unwrap(),
            Some(TopicLabel::Adoption)
        );
    }
}
