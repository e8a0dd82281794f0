//! Recency store layer.
//!
//! Every check and write of the deduplication engine goes through the
//! [`RecencyStore`] trait, a small TTL-aware key/set/list surface:
//! - **Memory**: process-local LRU store for tests and single-process runs
//! - **Redis**: shared store for multi-process deployments
//! - **Resilient**: circuit breaker wrapper around either backend

// Allow significant_drop_tightening - lock guards live for a single command.
#![allow(clippy::significant_drop_tightening)]
// Allow match_same_arms for explicit enum handling.
#![allow(clippy::match_same_arms)]

pub mod keys;
pub mod memory;
pub mod redis;
pub mod resilience;
pub mod traits;

pub use memory::InMemoryStore;
pub use redis::RedisStore;
pub use resilience::{CircuitBreaker, ResilienceConfig, ResilientStore};
pub use traits::RecencyStore;
