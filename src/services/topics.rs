//! Topic diversity tracking.
//!
//! Keeps a bounded, time-ordered window of recently covered topics so
//! generators can steer away from saturated subjects. Advisory only: nothing
//! here blocks an article.

use crate::models::{KeyFamily, TopicLabel};
use crate::services::registry::KeyRegistry;
use crate::storage::{RecencyStore, keys};
use crate::{Result, current_timestamp_millis};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// One covered topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicEntry {
    /// Topic label.
    pub label: TopicLabel,
    /// When it was covered, unix ms.
    pub recorded_at_ms: u64,
}

impl TopicEntry {
    fn encode(&self) -> String {
        format!("{}|{}", self.label.as_str(), self.recorded_at_ms)
    }

    fn decode(raw: &str) -> Option<Self> {
        let (label, ts) = raw.split_once('|')?;
        Some(Self {
            label: TopicLabel::parse(label)?,
            recorded_at_ms: ts.parse().ok()?,
        })
    }
}

/// Tracker for the recent topics window.
pub struct TopicDiversityTracker<S: RecencyStore + ?Sized> {
    store: Arc<S>,
    registry: KeyRegistry<S>,
    capacity: usize,
    max_age: Option<Duration>,
}

impl<S: RecencyStore + ?Sized> TopicDiversityTracker<S> {
    /// Creates a tracker.
    ///
    /// `max_age` of `None` bounds the window by count only.
    #[must_use]
    pub fn new(store: Arc<S>, capacity: usize, max_age: Option<Duration>) -> Self {
        Self {
            registry: KeyRegistry::new(Arc::clone(&store)),
            store,
            capacity: capacity.max(1),
            max_age,
        }
    }

    /// Appends a topic to the window.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    #[instrument(skip(self), fields(operation = "record_topic", topic = %label))]
    pub fn record_topic(&self, label: TopicLabel) -> Result<()> {
        let entry = TopicEntry {
            label,
            recorded_at_ms: current_timestamp_millis(),
        };
        self.store
            .push_capped(keys::RECENT_TOPICS, &entry.encode(), self.capacity, self.max_age)?;
        self.registry
            .register(KeyFamily::Topics, keys::RECENT_TOPICS, self.max_age)?;
        Ok(())
    }

    /// Returns the in-window entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the window cannot be read.
    pub fn entries(&self) -> Result<Vec<TopicEntry>> {
        let now = current_timestamp_millis();
        let cutoff = self.max_age.map(|age| {
            now.saturating_sub(u64::try_from(age.as_millis()).unwrap_or(u64::MAX))
        });

        Ok(self
            .store
            .list_range(keys::RECENT_TOPICS)?
            .iter()
            .take(self.capacity)
            .filter_map(|raw| TopicEntry::decode(raw))
            .filter(|entry| cutoff.is_none_or(|cutoff| entry.recorded_at_ms >= cutoff))
            .collect())
    }

    /// Fraction of in-window entries labeled `label`; `0.0` on an empty window.
    ///
    /// # Errors
    ///
    /// Returns an error if the window cannot be read.
    #[allow(clippy::cast_precision_loss)]
    pub fn topic_pressure(&self, label: TopicLabel) -> Result<f32> {
        let entries = self.entries()?;
        if entries.is_empty() {
            return Ok(0.0);
        }
        let matching = entries.iter().filter(|entry| entry.label == label).count();
        Ok(matching as f32 / entries.len() as f32)
    }

    /// Counts per label over the window, in taxonomy order.
    ///
    /// # Errors
    ///
    /// Returns an error if the window cannot be read.
    pub fn distribution(&self) -> Result<Vec<(TopicLabel, usize)>> {
        let entries = self.entries()?;
        Ok(TopicLabel::all()
            .iter()
            .map(|label| {
                let count = entries.iter().filter(|entry| entry.label == *label).count();
                (*label, count)
            })
            .collect())
    }

    /// Returns the candidate with the lowest pressure.
    ///
    /// Ties go to the earlier candidate; `None` when `candidates` is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the window cannot be read.
    pub fn least_covered(&self, candidates: &[TopicLabel]) -> Result<Option<TopicLabel>> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let distribution = self.distribution()?;
        let count_of = |label: TopicLabel| {
            distribution
                .iter()
                .find(|(candidate, _)| *candidate == label)
                .map_or(0, |(_, count)| *count)
        };

        Ok(candidates
            .iter()
            .copied()
            .enumerate()
            .min_by_key(|(position, label)| (count_of(*label), *position))
            .map(|(_, label)| label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn tracker(capacity: usize, max_age: Option<Duration>) -> TopicDiversityTracker<InMemoryStore> {
        TopicDiversityTracker::new(Arc::new(InMemoryStore::new(64)), capacity, max_age)
    }

    #[test]
    fn test_empty_window_has_zero_pressure() {
        let tracker = tracker(10, None);
        assert!(tracker.topic_pressure(TopicLabel::Macro).unwrap().abs() < f32::EPSILON);
    }

    #[test]
    fn test_pressure_is_fraction_of_window() {
        let tracker = tracker(10, None);
        tracker.record_topic(TopicLabel::Regulatory).unwrap();
        tracker.record_topic(TopicLabel::Regulatory).unwrap();
        tracker.record_topic(TopicLabel::Regulatory).unwrap();
        tracker.record_topic(TopicLabel::Macro).unwrap();

        let pressure = tracker.topic_pressure(TopicLabel::Regulatory).unwrap();
        assert!((pressure - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn test_capacity_trims_oldest() {
        let tracker = tracker(2, None);
        tracker.record_topic(TopicLabel::Adoption).unwrap();
        tracker.record_topic(TopicLabel::Macro).unwrap();
        tracker.record_topic(TopicLabel::Macro).unwrap();

        assert!(tracker.topic_pressure(TopicLabel::Adoption).unwrap().abs() < f32::EPSILON);
        assert!((tracker.topic_pressure(TopicLabel::Macro).unwrap() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_max_age_drops_old_entries() {
        let tracker = tracker(10, Some(Duration::from_millis(50)));
        tracker.record_topic(TopicLabel::Adoption).unwrap();
        std::thread::sleep(Duration::from_millis(100));

        assert!(tracker.entries().unwrap().is_empty());
    }

    #[test]
    fn test_distribution_and_least_covered() {
        let tracker = tracker(10, None);
        tracker.record_topic(TopicLabel::MarketPrice).unwrap();
        tracker.record_topic(TopicLabel::MarketPrice).unwrap();
        tracker.record_topic(TopicLabel::Regulatory).unwrap();

        let distribution = tracker.distribution().unwrap();
        assert_eq!(distribution.len(), TopicLabel::all().len());
        assert!(distribution.contains(&(TopicLabel::MarketPrice, 2)));

        let least = tracker
            .least_covered(&[TopicLabel::MarketPrice, TopicLabel::Regulatory, TopicLabel::Macro])
            .unwrap();
        assert_eq!(least, Some(TopicLabel::Macro));

        let tie = tracker
            .least_covered(&[TopicLabel::Adoption, TopicLabel::Macro])
            .unwrap();
        assert_eq!(tie, Some(TopicLabel::Adoption));
        assert_eq!(tracker.least_covered(&[]).unwrap(), None);
    }

    #[test]
    fn test_entry_encoding() {
        let entry = TopicEntry {
            label: TopicLabel::SecurityIncident,
            recorded_at_ms: 42,
        };
        assert_eq!(entry.encode(), "security-incident|42");
        assert_eq!(TopicEntry::decode("security-incident|42"), Some(entry));
        assert_eq!(TopicEntry::decode("bogus"), None);
    }
}
