//! Crosspost throttling.
//!
//! One marker per destination holds the time of the last relay. The marker
//! expires after the minimum interval, so an absent marker means ready.

use crate::models::KeyFamily;
use crate::services::registry::KeyRegistry;
use crate::storage::{RecencyStore, keys};
use crate::{Result, current_timestamp_millis};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Relay state of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CrosspostState {
    /// A relay may go out now.
    Ready,
    /// The last relay is too recent.
    Cooling {
        /// Time until the destination is ready again.
        #[serde(rename = "remaining_ms", serialize_with = "serialize_millis")]
        remaining: Duration,
    },
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_millis<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u128(duration.as_millis())
}

impl CrosspostState {
    /// Returns true if a relay may go out now.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for CrosspostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Cooling { remaining } => {
                write!(f, "cooling ({}s remaining)", remaining.as_secs())
            },
        }
    }
}

/// Minimum-spacing throttle for relays to secondary destinations.
pub struct CrosspostThrottle<S: RecencyStore + ?Sized> {
    store: Arc<S>,
    registry: KeyRegistry<S>,
    min_interval: Duration,
}

impl<S: RecencyStore + ?Sized> CrosspostThrottle<S> {
    /// Creates a throttle.
    #[must_use]
    pub fn new(store: Arc<S>, min_interval: Duration) -> Self {
        Self {
            registry: KeyRegistry::new(Arc::clone(&store)),
            store,
            min_interval,
        }
    }

    /// Returns the relay state of a destination.
    ///
    /// An unreadable marker counts as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker cannot be read.
    pub fn state(&self, destination: &str) -> Result<CrosspostState> {
        let Some(raw) = self.store.get(&keys::crosspost(destination))? else {
            return Ok(CrosspostState::Ready);
        };
        let Ok(marked_at) = raw.trim().parse::<u64>() else {
            tracing::warn!(destination, marker = %raw, "Unreadable crosspost marker, ignoring");
            return Ok(CrosspostState::Ready);
        };

        let elapsed = Duration::from_millis(current_timestamp_millis().saturating_sub(marked_at));
        Ok(if elapsed >= self.min_interval {
            CrosspostState::Ready
        } else {
            CrosspostState::Cooling {
                remaining: self.min_interval.saturating_sub(elapsed),
            }
        })
    }

    /// Returns true if the destination has no marker younger than the interval.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker cannot be read.
    pub fn can_crosspost(&self, destination: &str) -> Result<bool> {
        Ok(self.state(destination)?.is_ready())
    }

    /// Sets the destination's marker to now.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker cannot be written.
    #[instrument(skip(self), fields(operation = "mark_crossposted"))]
    pub fn mark_crossposted(&self, destination: &str) -> Result<()> {
        let key = keys::crosspost(destination);
        let ttl = Some(self.min_interval);
        self.store
            .put(&key, &current_timestamp_millis().to_string(), ttl)?;
        self.registry.register(KeyFamily::Crosspost, &key, ttl)?;
        tracing::info!(destination, "Crosspost marked");
        Ok(())
    }
}
