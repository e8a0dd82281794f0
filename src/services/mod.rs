//! Business logic services.
//!
//! Services orchestrate the recency store and provide the operations
//! generators call.

pub mod crosspost;
pub mod deduplication;
pub mod registry;
pub mod topics;

pub use crosspost::{CrosspostState, CrosspostThrottle};
pub use deduplication::{DeduplicationConfig, DeduplicationService, Deduplicator};
pub use registry::KeyRegistry;
pub use topics::{TopicDiversityTracker, TopicEntry};
