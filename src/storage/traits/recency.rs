//! Recency store trait.

use crate::Result;
use std::collections::HashSet;
use std::time::Duration;

/// Key-value store with per-key expiration.
///
/// Every method is a single round trip to the backing store. A `ttl` of
/// `None` stores the key without expiry. Backends report unreachable stores
/// as [`crate::Error::StoreUnavailable`].
///
/// Keys are logical (`content:<fp>`, `source:<name>`); backends that share a
/// server with other tenants add their own namespace prefix.
pub trait RecencyStore: Send + Sync {
    /// Short backend name for logs and metrics.
    fn backend_name(&self) -> &'static str;

    /// Stores a string value, replacing any existing value.
    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Stores a value only if the key does not exist.
    ///
    /// Returns `true` if this call created the key.
    fn put_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool>;

    /// Reads a string value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Reads several string values, preserving order.
    fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Returns true if the key exists and has not expired.
    fn exists(&self, key: &str) -> Result<bool>;

    /// Adds a member to a set and refreshes the set TTL.
    ///
    /// Returns `true` if the member was newly added.
    fn add_to_set(&self, set: &str, member: &str, ttl: Option<Duration>) -> Result<bool>;

    /// Returns true if `member` belongs to `set`.
    fn is_member(&self, set: &str, member: &str) -> Result<bool>;

    /// Removes members from a set, returning how many were present.
    fn remove_from_set(&self, set: &str, members: &[String]) -> Result<usize>;

    /// Returns all members of a set.
    fn set_members(&self, set: &str) -> Result<HashSet<String>>;

    /// Pushes onto the head of a list, trimming it to `capacity` entries.
    fn push_capped(
        &self,
        list: &str,
        value: &str,
        capacity: usize,
        ttl: Option<Duration>,
    ) -> Result<()>;

    /// Returns list entries, newest first.
    fn list_range(&self, list: &str) -> Result<Vec<String>>;

    /// Deletes keys, returning how many existed.
    fn delete(&self, keys: &[String]) -> Result<usize>;

    /// Enumerates keys starting with `prefix`.
    ///
    /// Administrative only: backends iterate incrementally but still visit
    /// the whole keyspace.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Deletes every key starting with `prefix`.
    fn delete_by_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.keys_with_prefix(prefix)?;
        if keys.is_empty() {
            return Ok(0);
        }
        self.delete(&keys)
    }

    /// Checks the store is reachable.
    fn ping(&self) -> Result<()>;
}
