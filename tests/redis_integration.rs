//! Redis Integration Tests
//!
//! Exercises the Redis recency store against a live server:
//! - Plain and conditional writes with TTLs
//! - Set membership and capped lists
//! - Prefix scans and deletion
//! - The deduplication engine end to end
//!
//! These tests require a running Redis server. Set the environment variable
//! `FRESHWIRE_TEST_REDIS_URL` to enable them:
//!
//! ```bash
//! export FRESHWIRE_TEST_REDIS_URL="redis://localhost:6379"
//! cargo test --features redis redis_integration
//! ```
//!
//! Every test works inside a fresh namespace and removes it afterwards.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic, clippy::doc_markdown)]
#![cfg(feature = "redis")]

use freshwire::models::{Article, CommitOutcome, Decision, KeyFamily};
use freshwire::services::deduplication::{DeduplicationConfig, DeduplicationService};
use freshwire::storage::{RecencyStore, RedisStore, keys};
use std::env;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// Environment variable for Redis test connection URL.
const REDIS_URL_ENV: &str = "FRESHWIRE_TEST_REDIS_URL";

/// Returns the Redis connection URL if available, or None to skip tests.
fn get_redis_url() -> Option<String> {
    env::var(REDIS_URL_ENV).ok()
}

/// Macro to skip tests when Redis is not available.
macro_rules! require_redis {
    () => {
        match get_redis_url() {
            Some(url) => url,
            None => {
                eprintln!(
                    "Skipping test: {} not set. Set this environment variable to run Redis tests.",
                    REDIS_URL_ENV
                );
                return;
            },
        }
    };
}

/// Opens a store in a namespace no other test touches.
fn fresh_store(url: &str) -> RedisStore {
    let namespace = format!("freshwire_test_{}", Uuid::new_v4().simple());
    RedisStore::new(url, namespace, Duration::from_secs(2)).expect("Failed to connect to Redis")
}

/// Removes every key under the store's namespace.
fn cleanup(store: &RedisStore) {
    let _ = store.delete_by_prefix("");
}

// ============================================================================
// Store Operations
// ============================================================================

#[test]
fn test_ping() {
    let url = require_redis!();
    let store = fresh_store(&url);
    assert!(store.ping().is_ok());
    assert_eq!(store.backend_name(), "redis");
}

#[test]
fn test_put_get_and_conditional_write() {
    let url = require_redis!();
    let store = fresh_store(&url);

    store.put("content:abc", "first", None).unwrap();
    assert_eq!(store.get("content:abc").unwrap().as_deref(), Some("first"));
    assert!(store.exists("content:abc").unwrap());

    assert!(!store.put_if_absent("content:abc", "second", None).unwrap());
    assert_eq!(store.get("content:abc").unwrap().as_deref(), Some("first"));

    assert!(store.put_if_absent("content:def", "other", None).unwrap());
    let values = store
        .get_many(&["content:abc".to_string(), "content:missing".to_string()])
        .unwrap();
    assert_eq!(values, vec![Some("first".to_string()), None]);

    cleanup(&store);
}

#[test]
fn test_ttl_expiry() {
    let url = require_redis!();
    let store = fresh_store(&url);

    store
        .put("content:short", "v", Some(Duration::from_millis(200)))
        .unwrap();
    assert!(store.exists("content:short").unwrap());

    thread::sleep(Duration::from_millis(400));
    assert!(!store.exists("content:short").unwrap());
    assert!(store.get("content:short").unwrap().is_none());

    cleanup(&store);
}

#[test]
fn test_sets() {
    let url = require_redis!();
    let store = fresh_store(&url);
    let set = keys::source("wire");

    assert!(store.add_to_set(&set, "https://a", None).unwrap());
    assert!(!store.add_to_set(&set, "https://a", None).unwrap());
    assert!(store.add_to_set(&set, "https://b", None).unwrap());

    assert!(store.is_member(&set, "https://a").unwrap());
    assert!(!store.is_member(&set, "https://c").unwrap());
    assert_eq!(store.set_members(&set).unwrap().len(), 2);

    let removed = store
        .remove_from_set(&set, &["https://a".to_string(), "https://c".to_string()])
        .unwrap();
    assert_eq!(removed, 1);
    assert!(!store.is_member(&set, "https://a").unwrap());
    assert_eq!(store.remove_from_set(&set, &[]).unwrap(), 0);

    cleanup(&store);
}

#[test]
fn test_push_capped_keeps_newest() {
    let url = require_redis!();
    let store = fresh_store(&url);

    for i in 0..5 {
        store
            .push_capped(keys::SEMANTIC_RECENT, &format!("entry-{i}"), 3, None)
            .unwrap();
    }

    let entries = store.list_range(keys::SEMANTIC_RECENT).unwrap();
    assert_eq!(entries, vec!["entry-4", "entry-3", "entry-2"]);

    cleanup(&store);
}

#[test]
fn test_prefix_scan_and_delete() {
    let url = require_redis!();
    let store = fresh_store(&url);

    store.put("crosspost:x", "1", None).unwrap();
    store.put("crosspost:y", "1", None).unwrap();
    store.put("content:z", "1", None).unwrap();
    // Glob metacharacters in keys must not widen the match
    store.put("crosspost*", "1", None).unwrap();

    let found = store.keys_with_prefix("crosspost:").unwrap();
    assert_eq!(found, vec!["crosspost:x", "crosspost:y"]);

    assert_eq!(store.delete_by_prefix("crosspost:").unwrap(), 2);
    assert!(store.exists("content:z").unwrap());
    assert!(store.exists("crosspost*").unwrap());
    assert_eq!(store.delete(&["content:z".to_string()]).unwrap(), 1);

    cleanup(&store);
}

#[test]
fn test_namespaces_are_isolated() {
    let url = require_redis!();
    let first = fresh_store(&url);
    let second = fresh_store(&url);

    first.put("content:shared", "1", None).unwrap();
    assert!(!second.exists("content:shared").unwrap());

    cleanup(&first);
    cleanup(&second);
}

// ============================================================================
// Engine End to End
// ============================================================================

#[test]
fn test_engine_roundtrip() {
    let url = require_redis!();
    let store = Arc::new(fresh_store(&url));
    let engine = DeduplicationService::new(Arc::clone(&store), DeduplicationConfig::default())
        .expect("valid config");

    let article = Article::new(
        "Ethereum client ships Pectra upgrade",
        "Core developers shipped the Pectra upgrade to the main Ethereum client.",
        "https://wire.example/pectra",
        "wire",
    );

    assert_eq!(engine.evaluate(&article).decision, Decision::Novel);
    assert_eq!(engine.commit(&article).unwrap(), CommitOutcome::Committed);
    assert_eq!(engine.commit(&article).unwrap(), CommitOutcome::AlreadyCommitted);
    assert_eq!(engine.evaluate(&article).decision, Decision::DuplicateExact);

    for family in [KeyFamily::Content, KeyFamily::Semantic, KeyFamily::Source, KeyFamily::Global] {
        assert!(!engine.keys(family).unwrap().is_empty(), "{family} should be populated");
    }

    let report = engine
        .reset(&[KeyFamily::Content, KeyFamily::Semantic, KeyFamily::Source])
        .unwrap();
    assert!(report.removed_for(KeyFamily::Content) >= 1);
    // The global set outlives the per-module keys
    assert_eq!(
        engine.evaluate(&article).decision,
        Decision::DuplicateCrossModule
    );

    cleanup(&store);
}
