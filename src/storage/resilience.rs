//! Store resilience wrapper with circuit breaking.
//!
//! When the recency store stops answering, every call would otherwise wait
//! out the full network timeout before the matcher degrades. The breaker
//! trips after consecutive failures and rejects calls immediately until a
//! trial call succeeds.
//!
//! # Circuit Breaker States
//!
//! ```text
//! +--------+     failures >= threshold     +------+
//! | Closed | --------------------------->  | Open |
//! +--------+                               +------+
//!     ^                                        |
//!     |  success                               | timeout elapsed
//!     |                                        v
//!     +--------------------------------  +-----------+
//!                                        | Half-Open |
//!                                        +-----------+
//! ```
//!
//! # Usage
//!
//! ```rust
//! use freshwire::storage::{InMemoryStore, RecencyStore, ResilienceConfig, ResilientStore};
//!
//! let store = ResilientStore::new(InMemoryStore::new(100), ResilienceConfig::default());
//! store.put("content:abc", "{}", None)?;
//! # Ok::<(), freshwire::Error>(())
//! ```

use super::traits::RecencyStore;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Circuit breaker configuration for the recency store.
///
/// # Environment Variables
///
/// | Variable | Type | Default |
/// |----------|------|---------|
/// | `FRESHWIRE_STORE_BREAKER_FAILURE_THRESHOLD` | u32 | `5` |
/// | `FRESHWIRE_STORE_BREAKER_RESET_MS` | u64 | `30000` |
/// | `FRESHWIRE_STORE_BREAKER_HALF_OPEN_MAX_CALLS` | u32 | `1` |
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Consecutive failures before opening the circuit.
    pub breaker_failure_threshold: u32,
    /// How long to keep the circuit open before half-open.
    pub breaker_reset_timeout_ms: u64,
    /// Maximum trial calls while half-open.
    pub breaker_half_open_max_calls: u32,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            breaker_failure_threshold: 5,
            breaker_reset_timeout_ms: 30_000,
            breaker_half_open_max_calls: 1,
        }
    }
}

impl ResilienceConfig {
    /// Loads configuration from environment variables.
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
        if let Some(parsed) = lookup("FRESHWIRE_STORE_BREAKER_FAILURE_THRESHOLD")
            .and_then(|v| v.parse::<u32>().ok())
        {
            self.breaker_failure_threshold = parsed.max(1);
        }
        if let Some(parsed) =
            lookup("FRESHWIRE_STORE_BREAKER_RESET_MS").and_then(|v| v.parse::<u64>().ok())
        {
            self.breaker_reset_timeout_ms = parsed;
        }
        if let Some(parsed) = lookup("FRESHWIRE_STORE_BREAKER_HALF_OPEN_MAX_CALLS")
            .and_then(|v| v.parse::<u32>().ok())
        {
            self.breaker_half_open_max_calls = parsed.max(1);
        }
        self
    }

    /// Sets the failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.breaker_failure_threshold = threshold;
        self
    }

    /// Sets the reset timeout in milliseconds.
    #[must_use]
    pub const fn with_reset_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.breaker_reset_timeout_ms = timeout_ms;
        self
    }

    /// Sets the half-open max calls.
    #[must_use]
    pub const fn with_half_open_max_calls(mut self, max_calls: u32) -> Self {
        self.breaker_half_open_max_calls = max_calls;
        self
    }
}

/// Circuit breaker state machine.
#[derive(Debug)]
enum BreakerState {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { attempts: u32 },
}

/// Circuit breaker for a store backend.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: BreakerState,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_calls: u32,
    backend_name: &'static str,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker with the given configuration.
    #[must_use]
    pub fn new(config: &ResilienceConfig, backend_name: &'static str) -> Self {
        Self {
            state: BreakerState::Closed { failures: 0 },
            failure_threshold: config.breaker_failure_threshold.max(1),
            reset_timeout: Duration::from_millis(config.breaker_reset_timeout_ms),
            half_open_max_calls: config.breaker_half_open_max_calls.max(1),
            backend_name,
        }
    }

    /// Returns `true` if a request may proceed.
    pub fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { opened_at } => {
                if opened_at.elapsed() >= self.reset_timeout {
                    tracing::info!(
                        backend = self.backend_name,
                        "Circuit breaker transitioning to half-open"
                    );
                    // The transitioning call is the first trial
                    self.state = BreakerState::HalfOpen { attempts: 1 };
                    true
                } else {
                    false
                }
            },
            BreakerState::HalfOpen { ref mut attempts } => {
                if *attempts >= self.half_open_max_calls {
                    false
                } else {
                    *attempts += 1;
                    true
                }
            },
        }
    }

    /// Records a successful operation, closing the circuit.
    pub fn on_success(&mut self) {
        if !matches!(self.state, BreakerState::Closed { failures: 0 }) {
            tracing::info!(
                backend = self.backend_name,
                "Circuit breaker closing after success"
            );
        }
        self.state = BreakerState::Closed { failures: 0 };
    }

    /// Records a failed operation.
    ///
    /// Returns `true` if the circuit just opened.
    pub fn on_failure(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { ref mut failures } => {
                *failures += 1;
                if *failures >= self.failure_threshold {
                    tracing::warn!(
                        backend = self.backend_name,
                        failures = *failures,
                        threshold = self.failure_threshold,
                        "Circuit breaker opened after consecutive failures"
                    );
                    self.state = BreakerState::Open {
                        opened_at: Instant::now(),
                    };
                    return true;
                }
            },
            BreakerState::HalfOpen { .. } => {
                tracing::warn!(
                    backend = self.backend_name,
                    "Circuit breaker re-opened after half-open failure"
                );
                self.state = BreakerState::Open {
                    opened_at: Instant::now(),
                };
                return true;
            },
            BreakerState::Open { .. } => {},
        }
        false
    }

    /// Returns the state as a metric value: 0 closed, 1 open, 2 half-open.
    #[must_use]
    pub const fn state_value(&self) -> u8 {
        match self.state {
            BreakerState::Closed { .. } => 0,
            BreakerState::Open { .. } => 1,
            BreakerState::HalfOpen { .. } => 2,
        }
    }

    /// Returns the state name.
    #[must_use]
    pub const fn state_name(&self) -> &'static str {
        match self.state {
            BreakerState::Closed { .. } => "closed",
            BreakerState::Open { .. } => "open",
            BreakerState::HalfOpen { .. } => "half-open",
        }
    }
}

/// Recency store wrapper with circuit breaker protection.
///
/// Only [`Error::StoreUnavailable`] counts as a breaker failure; a rejected
/// command (wrong key type) means the store answered.
pub struct ResilientStore<S: RecencyStore> {
    inner: S,
    breaker: Mutex<CircuitBreaker>,
    backend_name: &'static str,
}

impl<S: RecencyStore> ResilientStore<S> {
    /// Wraps a store.
    #[must_use]
    pub fn new(inner: S, config: ResilienceConfig) -> Self {
        let backend_name = inner.backend_name();
        Self {
            inner,
            breaker: Mutex::new(CircuitBreaker::new(&config, backend_name)),
            backend_name,
        }
    }

    /// Returns the wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the current breaker state name.
    pub fn breaker_state(&self) -> &'static str {
        self.breaker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .state_name()
    }

    fn execute<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut breaker = self
            .breaker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if !breaker.allow() {
            let state = breaker.state_value();
            drop(breaker);
            Self::record_metrics(self.backend_name, operation, "circuit_open", state);
            return Err(Error::StoreUnavailable {
                operation: format!("store_{operation}"),
                cause: format!("circuit breaker open for backend '{}'", self.backend_name),
            });
        }
        drop(breaker);

        let result = call();

        let mut breaker = self
            .breaker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        match &result {
            Err(e) if e.is_store_unavailable() => {
                let tripped = breaker.on_failure();
                let state = breaker.state_value();
                drop(breaker);
                Self::record_metrics(self.backend_name, operation, "error", state);
                if tripped {
                    metrics::counter!(
                        "freshwire_store_circuit_breaker_trips_total",
                        "backend" => self.backend_name,
                        "operation" => operation
                    )
                    .increment(1);
                }
            },
            _ => {
                breaker.on_success();
                let state = breaker.state_value();
                drop(breaker);
                Self::record_metrics(self.backend_name, operation, "success", state);
            },
        }

        result
    }

    fn record_metrics(
        backend: &'static str,
        operation: &'static str,
        status: &'static str,
        state: u8,
    ) {
        metrics::counter!(
            "freshwire_store_requests_total",
            "backend" => backend,
            "operation" => operation,
            "status" => status
        )
        .increment(1);
        metrics::gauge!(
            "freshwire_store_circuit_breaker_state",
            "backend" => backend
        )
        .set(f64::from(state));
    }
}

impl<S: RecencyStore> RecencyStore for ResilientStore<S> {
    fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.execute("put", || self.inner.put(key, value, ttl))
    }

    fn put_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        self.execute("put_if_absent", || self.inner.put_if_absent(key, value, ttl))
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.execute("get", || self.inner.get(key))
    }

    fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.execute("get_many", || self.inner.get_many(keys))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        self.execute("exists", || self.inner.exists(key))
    }

    fn add_to_set(&self, set: &str, member: &str, ttl: Option<Duration>) -> Result<bool> {
        self.execute("add_to_set", || self.inner.add_to_set(set, member, ttl))
    }

    fn remove_from_set(&self, set: &str, members: &[String]) -> Result<usize> {
        self.execute("remove_from_set", || self.inner.remove_from_set(set, members))
    }

    fn is_member(&self, set: &str, member: &str) -> Result<bool> {
        self.execute("is_member", || self.inner.is_member(set, member))
    }

    fn set_members(&self, set: &str) -> Result<HashSet<String>> {
        self.execute("set_members", || self.inner.set_members(set))
    }

    fn push_capped(
        &self,
        list: &str,
        value: &str,
        capacity: usize,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.execute("push_capped", || {
            self.inner.push_capped(list, value, capacity, ttl)
        })
    }

    fn list_range(&self, list: &str) -> Result<Vec<String>> {
        self.execute("list_range", || self.inner.list_range(list))
    }

    fn delete(&self, keys: &[String]) -> Result<usize> {
        self.execute("delete", || self.inner.delete(keys))
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.execute("keys_with_prefix", || self.inner.keys_with_prefix(prefix))
    }

    fn delete_by_prefix(&self, prefix: &str) -> Result<usize> {
        self.execute("delete_by_prefix", || self.inner.delete_by_prefix(prefix))
    }

    fn ping(&self) -> Result<()> {
        self.execute("ping", || self.inner.ping())
    }
}
