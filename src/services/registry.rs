//! Per-family key registry.
//!
//! Every key the engine writes is also recorded in `registry:<family>`, so a
//! reset deletes exactly what was written without scanning the keyspace.
//! Members whose key has expired are swept out every few hundred new
//! registrations, keeping each registry close to the live key count.

use crate::Result;
use crate::models::KeyFamily;
use crate::storage::{RecencyStore, keys};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// New registrations between sweeps of expired members.
pub const DEFAULT_PRUNE_INTERVAL: usize = 256;

/// Keys of a family that live outside the registry.
const fn fixed_keys(family: KeyFamily) -> &'static [&'static str] {
    match family {
        KeyFamily::Semantic => &[keys::SEMANTIC_RECENT],
        KeyFamily::Global => &[keys::GLOBAL_ARTICLES],
        KeyFamily::Topics => &[keys::RECENT_TOPICS],
        KeyFamily::Content | KeyFamily::Source | KeyFamily::Crosspost => &[],
    }
}

/// Records and clears the keys written per family.
pub struct KeyRegistry<S: RecencyStore + ?Sized> {
    store: Arc<S>,
    prune_every: usize,
    additions: AtomicUsize,
}

impl<S: RecencyStore + ?Sized> KeyRegistry<S> {
    /// Creates a registry over a store.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self::with_prune_interval(store, DEFAULT_PRUNE_INTERVAL)
    }

    /// Creates a registry that sweeps expired members every `prune_every`
    /// new registrations.
    #[must_use]
    pub const fn with_prune_interval(store: Arc<S>, prune_every: usize) -> Self {
        Self {
            store,
            prune_every: if prune_every == 0 { 1 } else { prune_every },
            additions: AtomicUsize::new(0),
        }
    }

    /// Records a key.
    ///
    /// The registry TTL is refreshed to the key's TTL so the registry never
    /// expires before the newest key it lists. A failed sweep is logged and
    /// does not fail the registration.
    pub fn register(&self, family: KeyFamily, key: &str, ttl: Option<Duration>) -> Result<()> {
        let added = self.store.add_to_set(&keys::registry(family), key, ttl)?;
        if added
            && (self.additions.fetch_add(1, Ordering::Relaxed) + 1).is_multiple_of(self.prune_every)
        {
            match self.prune(family) {
                Ok(0) => {},
                Ok(pruned) => tracing::debug!(family = %family, pruned, "Pruned registry"),
                Err(e) => tracing::warn!(family = %family, error = %e, "Registry sweep failed"),
            }
        }
        Ok(())
    }

    /// Drops members whose key no longer exists.
    ///
    /// Returns the number of members removed.
    pub fn prune(&self, family: KeyFamily) -> Result<usize> {
        let registry = keys::registry(family);
        let mut stale = Vec::new();
        for key in self.store.set_members(&registry)? {
            if !self.store.exists(&key)? {
                stale.push(key);
            }
        }
        self.store.remove_from_set(&registry, &stale)
    }

    /// Returns the registered keys of a family, sorted.
    pub fn members(&self, family: KeyFamily) -> Result<Vec<String>> {
        let mut members: Vec<String> = self
            .store
            .set_members(&keys::registry(family))?
            .into_iter()
            .collect();
        members.sort_unstable();
        Ok(members)
    }

    /// Deletes every registered key of a family and the registry itself.
    ///
    /// Returns the number of family keys removed.
    pub fn clear(&self, family: KeyFamily) -> Result<usize> {
        let mut targets = self.members(family)?;
        for fixed in fixed_keys(family) {
            if !targets.iter().any(|key| key == fixed) {
                targets.push((*fixed).to_string());
            }
        }

        let removed = self.store.delete(&targets)?;
        self.store.delete(&[keys::registry(family)])?;
        Ok(removed)
    }

    /// Deletes every key with the family prefix, registered or not.
    pub fn purge(&self, family: KeyFamily) -> Result<usize> {
        let removed = self.store.delete_by_prefix(family.prefix())?;
        self.store.delete(&[keys::registry(family)])?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    #[test]
    fn test_clear_removes_registered_and_fixed_keys() {
        let store = Arc::new(InMemoryStore::new(64));
        let registry = KeyRegistry::new(Arc::clone(&store));

        store.put("content:a", "{}", None).unwrap();
        store.put("content:b", "{}", None).unwrap();
        registry.register(KeyFamily::Content, "content:a", None).unwrap();
        registry.register(KeyFamily::Content, "content:b", None).unwrap();
        store.add_to_set(keys::GLOBAL_ARTICLES, "a", None).unwrap();

        assert_eq!(registry.clear(KeyFamily::Content).unwrap(), 2);
        assert!(!store.exists("content:a").unwrap());
        assert!(!store.exists(&keys::registry(KeyFamily::Content)).unwrap());
        assert!(store.exists(keys::GLOBAL_ARTICLES).unwrap());

        assert_eq!(registry.clear(KeyFamily::Global).unwrap(), 1);
        assert!(!store.exists(keys::GLOBAL_ARTICLES).unwrap());
    }

    #[test]
    fn test_purge_finds_unregistered_keys() {
        let store = Arc::new(InMemoryStore::new(64));
        let registry = KeyRegistry::new(Arc::clone(&store));
        store.add_to_set("source:wire", "https://a", None).unwrap();
        store.add_to_set("source:desk", "https://b", None).unwrap();

        assert_eq!(registry.clear(KeyFamily::Source).unwrap(), 0);
        assert_eq!(registry.purge(KeyFamily::Source).unwrap(), 2);
        assert!(store.keys_with_prefix("source:").unwrap().is_empty());
    }

    #[test]
    fn test_prune_drops_expired_members() {
        let store = Arc::new(InMemoryStore::new(64));
        let registry = KeyRegistry::new(Arc::clone(&store));
        let short = Some(Duration::from_millis(40));

        store.put("content:old", "{}", short).unwrap();
        registry.register(KeyFamily::Content, "content:old", None).unwrap();
        store.put("content:live", "{}", None).unwrap();
        registry.register(KeyFamily::Content, "content:live", None).unwrap();

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(registry.prune(KeyFamily::Content).unwrap(), 1);
        assert_eq!(registry.members(KeyFamily::Content).unwrap(), vec!["content:live"]);
        assert_eq!(registry.prune(KeyFamily::Content).unwrap(), 0);
    }

    #[test]
    fn test_register_sweeps_expired_members() {
        let store = Arc::new(InMemoryStore::new(64));
        let registry = KeyRegistry::with_prune_interval(Arc::clone(&store), 3);
        let short = Some(Duration::from_millis(40));

        for key in ["content:a", "content:b"] {
            store.put(key, "{}", short).unwrap();
            registry.register(KeyFamily::Content, key, None).unwrap();
        }
        std::thread::sleep(Duration::from_millis(80));

        // Third new member triggers a sweep of the two expired ones
        store.put("content:c", "{}", None).unwrap();
        registry.register(KeyFamily::Content, "content:c", None).unwrap();
        assert_eq!(registry.members(KeyFamily::Content).unwrap(), vec!["content:c"]);

        // Re-registering an existing member is not a new addition
        registry.register(KeyFamily::Content, "content:c", None).unwrap();
        assert_eq!(registry.members(KeyFamily::Content).unwrap(), vec!["content:c"]);
    }

    #[test]
    fn test_members_sorted() {
        let store = Arc::new(InMemoryStore::new(64));
        let registry = KeyRegistry::new(store);
        registry.register(KeyFamily::Crosspost, "crosspost:x", None).unwrap();
        registry.register(KeyFamily::Crosspost, "crosspost:a", None).unwrap();
        assert_eq!(
            registry.members(KeyFamily::Crosspost).unwrap(),
            vec!["crosspost:a", "crosspost:x"]
        );
    }
}
