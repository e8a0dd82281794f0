//! In-process recency store.
//!
//! Holds strings, sets, and lists in an LRU cache with per-entry deadlines.
//! Expired entries are invisible to reads and dropped lazily on the next
//! write that touches them, so there is no background sweeper.

use super::traits::RecencyStore;
use crate::{Error, Result};
use lru::LruCache;
use std::collections::{HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Stored value.
#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(HashSet<String>),
    List(VecDeque<String>),
}

impl Value {
    const fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Set(_) => "set",
            Self::List(_) => "list",
        }
    }
}

/// Entry with an optional deadline.
#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.and_then(deadline),
        }
    }

    fn is_live(&self) -> bool {
        self.expires_at.is_none_or(|deadline| Instant::now() < deadline)
    }

    fn refresh(&mut self, ttl: Option<Duration>) {
        if let Some(ttl) = ttl {
            self.expires_at = deadline(ttl);
        }
    }
}

/// Deadline `ttl` from now; a lifetime past the clock's range never expires.
fn deadline(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

/// Recency store backed by an in-process LRU cache.
///
/// Suitable for tests and single-process deployments. When the cache is full
/// the least recently written key is evicted, which can only cause a missed
/// duplicate, never a false one.
///
/// # Lock Poisoning
///
/// A poisoned lock is reported as [`Error::StoreUnavailable`], which the
/// matcher treats like any other unreachable store.
///
/// # Example
///
/// ```rust
/// use freshwire::storage::{InMemoryStore, RecencyStore};
/// use std::time::Duration;
///
/// let store = InMemoryStore::new(100);
/// store.put("content:abc", "{}", Some(Duration::from_secs(60)))?;
/// assert!(store.exists("content:abc")?);
/// # Ok::<(), freshwire::Error>(())
/// ```
pub struct InMemoryStore {
    entries: RwLock<LruCache<String, Slot>>,
}

impl InMemoryStore {
    /// Default number of keys held.
    pub const DEFAULT_CAPACITY: usize = 100_000;

    /// Creates a store holding at most `capacity` keys (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(cap)),
        }
    }

    /// Returns the number of keys held, including expired ones not yet dropped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Returns true if no keys are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let mut entries = self.write("purge_expired")?;
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, slot)| !slot.is_live())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        Ok(expired.len())
    }

    fn read(&self, operation: &str) -> Result<RwLockReadGuard<'_, LruCache<String, Slot>>> {
        self.entries.read().map_err(|e| Error::StoreUnavailable {
            operation: format!("memory_{operation}"),
            cause: e.to_string(),
        })
    }

    fn write(&self, operation: &str) -> Result<RwLockWriteGuard<'_, LruCache<String, Slot>>> {
        self.entries.write().map_err(|e| Error::StoreUnavailable {
            operation: format!("memory_{operation}"),
            cause: e.to_string(),
        })
    }

    /// Returns the live slot for `key`, dropping it first if expired.
    fn live_slot_mut<'a>(
        entries: &'a mut LruCache<String, Slot>,
        key: &str,
    ) -> Option<&'a mut Slot> {
        if entries.peek(key).is_some_and(|slot| !slot.is_live()) {
            entries.pop(key);
        }
        entries.get_mut(key)
    }

    fn wrong_type(operation: &str, key: &str, found: &Value) -> Error {
        Error::OperationFailed {
            operation: format!("memory_{operation}"),
            cause: format!("WRONGTYPE key '{key}' holds a {}", found.type_name()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl RecencyStore for InMemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.write("put")?;
        entries.put(key.to_string(), Slot::new(Value::Str(value.to_string()), ttl));
        Ok(())
    }

    fn put_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        let mut entries = self.write("put_if_absent")?;
        if Self::live_slot_mut(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.put(key.to_string(), Slot::new(Value::Str(value.to_string()), ttl));
        Ok(true)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.read("get")?;
        match entries.peek(key) {
            Some(slot) if slot.is_live() => match &slot.value {
                Value::Str(value) => Ok(Some(value.clone())),
                other => Err(Self::wrong_type("get", key, other)),
            },
            _ => Ok(None),
        }
    }

    fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let entries = self.read("get_many")?;
        Ok(keys
            .iter()
            .map(|key| match entries.peek(key.as_str()) {
                Some(slot) if slot.is_live() => match &slot.value {
                    Value::Str(value) => Some(value.clone()),
                    _ => None,
                },
                _ => None,
            })
            .collect())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let entries = self.read("exists")?;
        Ok(entries.peek(key).is_some_and(Slot::is_live))
    }

    fn add_to_set(&self, set: &str, member: &str, ttl: Option<Duration>) -> Result<bool> {
        let mut entries = self.write("add_to_set")?;
        if let Some(slot) = Self::live_slot_mut(&mut entries, set) {
            let added = match &mut slot.value {
                Value::Set(members) => members.insert(member.to_string()),
                other => return Err(Self::wrong_type("add_to_set", set, other)),
            };
            slot.refresh(ttl);
            return Ok(added);
        }
        let members = HashSet::from([member.to_string()]);
        entries.put(set.to_string(), Slot::new(Value::Set(members), ttl));
        Ok(true)
    }

    fn remove_from_set(&self, set: &str, members: &[String]) -> Result<usize> {
        let mut entries = self.write("remove_from_set")?;
        let Some(slot) = Self::live_slot_mut(&mut entries, set) else {
            return Ok(0);
        };
        match &mut slot.value {
            Value::Set(current) => Ok(members.iter().filter(|m| current.remove(*m)).count()),
            other => Err(Self::wrong_type("remove_from_set", set, other)),
        }
    }

    fn is_member(&self, set: &str, member: &str) -> Result<bool> {
        let entries = self.read("is_member")?;
        match entries.peek(set) {
            Some(slot) if slot.is_live() => match &slot.value {
                Value::Set(members) => Ok(members.contains(member)),
                other => Err(Self::wrong_type("is_member", set, other)),
            },
            _ => Ok(false),
        }
    }

    fn set_members(&self, set: &str) -> Result<HashSet<String>> {
        let entries = self.read("set_members")?;
        match entries.peek(set) {
            Some(slot) if slot.is_live() => match &slot.value {
                Value::Set(members) => Ok(members.clone()),
                other => Err(Self::wrong_type("set_members", set, other)),
            },
            _ => Ok(HashSet::new()),
        }
    }

    fn push_capped(
        &self,
        list: &str,
        value: &str,
        capacity: usize,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let mut entries = self.write("push_capped")?;
        if let Some(slot) = Self::live_slot_mut(&mut entries, list) {
            match &mut slot.value {
                Value::List(items) => {
                    items.push_front(value.to_string());
                    items.truncate(capacity.max(1));
                },
                other => return Err(Self::wrong_type("push_capped", list, other)),
            }
            slot.refresh(ttl);
            return Ok(());
        }
        let items = VecDeque::from([value.to_string()]);
        entries.put(list.to_string(), Slot::new(Value::List(items), ttl));
        Ok(())
    }

    fn list_range(&self, list: &str) -> Result<Vec<String>> {
        let entries = self.read("list_range")?;
        match entries.peek(list) {
            Some(slot) if slot.is_live() => match &slot.value {
                Value::List(items) => Ok(items.iter().cloned().collect()),
                other => Err(Self::wrong_type("list_range", list, other)),
            },
            _ => Ok(Vec::new()),
        }
    }

    fn delete(&self, keys: &[String]) -> Result<usize> {
        let mut entries = self.write("delete")?;
        Ok(keys
            .iter()
            .filter_map(|key| entries.pop(key.as_str()))
            .filter(Slot::is_live)
            .count())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.read("keys_with_prefix")?;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(key, slot)| key.starts_with(prefix) && slot.is_live())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    fn ping(&self) -> Result<()> {
        self.read("ping").map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const MINUTE: Option<Duration> = Some(Duration::from_secs(60));

    #[test]
    fn test_put_get_exists() {
        let store = InMemoryStore::new(10);
        store.put("content:a", "one", MINUTE).unwrap();

        assert_eq!(store.get("content:a").unwrap().as_deref(), Some("one"));
        assert!(store.exists("content:a").unwrap());
        assert!(!store.exists("content:b").unwrap());
    }

    #[test]
    fn test_put_if_absent_only_first_wins() {
        let store = InMemoryStore::new(10);
        assert!(store.put_if_absent("k", "first", MINUTE).unwrap());
        assert!(!store.put_if_absent("k", "second", MINUTE).unwrap());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("first"));
    }

    #[test]
    fn test_ttl_past_clock_range_never_expires() {
        let store = InMemoryStore::new(10);
        let forever = Some(Duration::from_secs(u64::MAX));

        store.put("content:a", "v", forever).unwrap();
        assert!(store.put_if_absent("content:b", "v", forever).unwrap());
        assert!(store.add_to_set("global:articles", "fp", forever).unwrap());
        store.push_capped("semantic:recent", "key", 4, forever).unwrap();

        assert!(store.exists("content:a").unwrap());
        assert!(store.exists("content:b").unwrap());
        assert!(store.is_member("global:articles", "fp").unwrap());
        assert_eq!(store.list_range("semantic:recent").unwrap(), vec!["key"]);
    }

    #[test]
    fn test_ttl_expiry() {
        let store = InMemoryStore::new(10);
        store
            .put("content:a", "v", Some(Duration::from_millis(50)))
            .unwrap();
        assert!(store.exists("content:a").unwrap());

        thread::sleep(Duration::from_millis(100));

        assert!(!store.exists("content:a").unwrap());
        assert_eq!(store.get("content:a").unwrap(), None);
        // Expired key can be claimed again
        assert!(store.put_if_absent("content:a", "w", MINUTE).unwrap());
    }

    #[test]
    fn test_set_operations_are_idempotent() {
        let store = InMemoryStore::new(10);
        assert!(store.add_to_set("source:wire", "u1", MINUTE).unwrap());
        assert!(!store.add_to_set("source:wire", "u1", MINUTE).unwrap());
        assert!(store.add_to_set("source:wire", "u2", MINUTE).unwrap());

        assert!(store.is_member("source:wire", "u1").unwrap());
        assert!(!store.is_member("source:wire", "u3").unwrap());
        assert_eq!(store.set_members("source:wire").unwrap().len(), 2);
        assert!(store.set_members("source:none").unwrap().is_empty());
    }

    #[test]
    fn test_set_ttl_refreshed_on_insert() {
        let store = InMemoryStore::new(10);
        let ttl = Some(Duration::from_millis(150));
        store.add_to_set("s", "a", ttl).unwrap();
        thread::sleep(Duration::from_millis(100));
        store.add_to_set("s", "b", ttl).unwrap();
        thread::sleep(Duration::from_millis(100));

        // 200ms since first insert, but refreshed at 100ms
        assert!(store.is_member("s", "a").unwrap());
    }

    #[test]
    fn test_push_capped_newest_first() {
        let store = InMemoryStore::new(10);
        for value in ["a", "b", "c", "d"] {
            store.push_capped("recent_topics", value, 3, None).unwrap();
        }
        assert_eq!(
            store.list_range("recent_topics").unwrap(),
            vec!["d".to_string(), "c".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_wrong_type_is_error() {
        let store = InMemoryStore::new(10);
        store.put("k", "v", None).unwrap();
        assert!(store.add_to_set("k", "m", None).is_err());
        assert!(store.list_range("k").is_err());
    }

    #[test]
    fn test_get_many_preserves_order() {
        let store = InMemoryStore::new(10);
        store.put("a", "1", None).unwrap();
        store.put("c", "3", None).unwrap();
        let values = store
            .get_many(&["a".to_string(), "b".to_string(), "c".to_string()])
            .unwrap();
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("3".to_string())]
        );
    }

    #[test]
    fn test_delete_by_prefix() {
        let store = InMemoryStore::new(10);
        store.put("content:a", "1", None).unwrap();
        store.put("content:b", "2", None).unwrap();
        store.put("crosspost:x", "3", None).unwrap();

        assert_eq!(
            store.keys_with_prefix("content:").unwrap(),
            vec!["content:a".to_string(), "content:b".to_string()]
        );
        assert_eq!(store.delete_by_prefix("content:").unwrap(), 2);
        assert!(store.exists("crosspost:x").unwrap());
        assert_eq!(store.delete_by_prefix("content:").unwrap(), 0);
    }

    #[test]
    fn test_lru_capacity_evicts_oldest() {
        let store = InMemoryStore::new(2);
        store.put("a", "1", None).unwrap();
        store.put("b", "2", None).unwrap();
        store.put("c", "3", None).unwrap();
        assert!(!store.exists("a").unwrap());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let store = InMemoryStore::new(0);
        store.put("a", "1", None).unwrap();
        assert!(store.exists("a").unwrap());
    }

    #[test]
    fn test_purge_expired() {
        let store = InMemoryStore::new(10);
        store.put("a", "1", Some(Duration::from_millis(10))).unwrap();
        store.put("b", "2", None).unwrap();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.len(), 1);
    }
}
