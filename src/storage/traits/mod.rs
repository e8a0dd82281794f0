//! Storage backend traits.

mod recency;

pub use recency::RecencyStore;
