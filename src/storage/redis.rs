//! Redis-backed recency store.
//!
//! All freshwire keys live under one namespace prefix (`<namespace>:<key>`)
//! so the store can share a Redis instance with other applications.
//!
//! # Connection Reuse
//!
//! A single connection is cached per store and reused across calls. A call
//! that fails drops its connection so the next call reconnects. Concurrent
//! callers that find the cache empty open their own connection; only one is
//! kept afterwards.
//!
//! # Command Timeout
//!
//! Connect, read, and write timeouts all use the configured store timeout so
//! an unresponsive server costs one timeout per call, after which the
//! caller's degraded-mode policy applies.

#[cfg(feature = "redis")]
mod implementation {
    use crate::storage::traits::RecencyStore;
    use crate::{Error, Result};
    use redis::{Client, Connection, RedisError, RedisResult};
    use std::collections::{BTreeSet, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Keys per `SCAN` page and per `DEL` batch.
    const BATCH_SIZE: usize = 500;

    /// Redis-backed recency store.
    pub struct RedisStore {
        /// Redis client.
        client: Client,
        /// Namespace prepended to every key.
        namespace: String,
        /// Connect, read, and write timeout.
        timeout: Duration,
        /// Cached connection for reuse.
        connection: Mutex<Option<Connection>>,
    }

    impl RedisStore {
        /// Default Redis URL.
        pub const DEFAULT_URL: &'static str = "redis://127.0.0.1:6379";

        /// Default key namespace.
        pub const DEFAULT_NAMESPACE: &'static str = "freshwire";

        /// Creates a Redis store.
        ///
        /// Only the URL is validated here; the first command opens the
        /// connection, so a store that is down at startup degrades instead of
        /// aborting the process.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Configuration`] if the URL cannot be parsed.
        pub fn new(url: &str, namespace: impl Into<String>, timeout: Duration) -> Result<Self> {
            let client = Client::open(url)
                .map_err(|e| Error::Configuration(format!("invalid redis url: {e}")))?;

            Ok(Self {
                client,
                namespace: namespace.into(),
                timeout,
                connection: Mutex::new(None),
            })
        }

        /// Creates a store on localhost with the default namespace.
        ///
        /// # Errors
        ///
        /// Returns an error if the default URL cannot be parsed.
        pub fn with_defaults() -> Result<Self> {
            Self::new(
                Self::DEFAULT_URL,
                Self::DEFAULT_NAMESPACE,
                Duration::from_secs(2),
            )
        }

        /// Returns the key namespace.
        #[must_use]
        pub fn namespace(&self) -> &str {
            &self.namespace
        }

        fn full_key(&self, key: &str) -> String {
            format!("{}:{key}", self.namespace)
        }

        fn strip_namespace<'a>(&self, key: &'a str) -> Option<&'a str> {
            key.strip_prefix(self.namespace.as_str())
                .and_then(|rest| rest.strip_prefix(':'))
        }

        fn ttl_millis(ttl: Duration) -> u64 {
            u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
        }

        /// Takes the cached connection or opens a new one.
        fn get_connection(&self) -> Result<Connection> {
            if let Ok(mut guard) = self.connection.lock() {
                if let Some(conn) = guard.take() {
                    return Ok(conn);
                }
            }

            let conn = self
                .client
                .get_connection_with_timeout(self.timeout)
                .map_err(|e| unavailable("connect", &e))?;
            conn.set_read_timeout(Some(self.timeout))
                .map_err(|e| unavailable("set_read_timeout", &e))?;
            conn.set_write_timeout(Some(self.timeout))
                .map_err(|e| unavailable("set_write_timeout", &e))?;

            Ok(conn)
        }

        /// Returns a healthy connection to the cache.
        fn return_connection(&self, conn: Connection) {
            if let Ok(mut guard) = self.connection.lock() {
                *guard = Some(conn);
            }
        }

        /// Runs `call` on a connection, recycling it only on success.
        fn with_connection<T, F>(&self, operation: &'static str, call: F) -> Result<T>
        where
            F: FnOnce(&mut Connection) -> RedisResult<T>,
        {
            let mut conn = self.get_connection()?;
            match call(&mut conn) {
                Ok(value) => {
                    self.return_connection(conn);
                    Ok(value)
                },
                Err(e) => {
                    tracing::debug!(operation, error = %e, "Redis command failed, dropping connection");
                    Err(map_redis_error(operation, &e))
                },
            }
        }

        /// Builds a `SCAN MATCH` pattern for keys under `prefix`.
        fn scan_pattern(&self, prefix: &str) -> String {
            format!("{}*", escape_glob(&self.full_key(prefix)))
        }

        /// Walks `SCAN` pages for a prefix, handing each page of full keys
        /// to `visit`.
        fn scan_pages<F>(&self, prefix: &str, mut visit: F) -> Result<()>
        where
            F: FnMut(Vec<String>) -> Result<()>,
        {
            let pattern = self.scan_pattern(prefix);
            let mut cursor: u64 = 0;
            loop {
                let (next, page): (u64, Vec<String>) = self.with_connection("scan", |conn| {
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(BATCH_SIZE)
                        .query(conn)
                })?;
                if !page.is_empty() {
                    visit(page)?;
                }
                if next == 0 {
                    return Ok(());
                }
                cursor = next;
            }
        }

        fn delete_full_keys(&self, keys: &[String]) -> Result<usize> {
            let mut deleted = 0;
            for chunk in keys.chunks(BATCH_SIZE) {
                let count: usize =
                    self.with_connection("delete", |conn| redis::cmd("DEL").arg(chunk).query(conn))?;
                deleted += count;
            }
            Ok(deleted)
        }
    }

    impl RecencyStore for RedisStore {
        fn backend_name(&self) -> &'static str {
            "redis"
        }

        fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
            let key = self.full_key(key);
            self.with_connection("put", |conn| {
                let mut cmd = redis::cmd("SET");
                cmd.arg(&key).arg(value);
                if let Some(ttl) = ttl {
                    cmd.arg("PX").arg(Self::ttl_millis(ttl));
                }
                cmd.query::<()>(conn)
            })
        }

        fn put_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
            let key = self.full_key(key);
            let reply: Option<String> = self.with_connection("put_if_absent", |conn| {
                let mut cmd = redis::cmd("SET");
                cmd.arg(&key).arg(value).arg("NX");
                if let Some(ttl) = ttl {
                    cmd.arg("PX").arg(Self::ttl_millis(ttl));
                }
                cmd.query(conn)
            })?;
            Ok(reply.is_some())
        }

        fn get(&self, key: &str) -> Result<Option<String>> {
            let key = self.full_key(key);
            self.with_connection("get", |conn| redis::cmd("GET").arg(&key).query(conn))
        }

        fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
            if keys.is_empty() {
                return Ok(Vec::new());
            }
            let full: Vec<String> = keys.iter().map(|k| self.full_key(k)).collect();
            self.with_connection("get_many", |conn| redis::cmd("MGET").arg(&full).query(conn))
        }

        fn exists(&self, key: &str) -> Result<bool> {
            let key = self.full_key(key);
            let count: u64 =
                self.with_connection("exists", |conn| redis::cmd("EXISTS").arg(&key).query(conn))?;
            Ok(count > 0)
        }

        fn add_to_set(&self, set: &str, member: &str, ttl: Option<Duration>) -> Result<bool> {
            let key = self.full_key(set);
            let (added,): (u64,) = self.with_connection("add_to_set", |conn| {
                let mut pipe = redis::pipe();
                pipe.atomic().cmd("SADD").arg(&key).arg(member);
                if let Some(ttl) = ttl {
                    pipe.cmd("PEXPIRE")
                        .arg(&key)
                        .arg(Self::ttl_millis(ttl))
                        .ignore();
                }
                pipe.query(conn)
            })?;
            Ok(added > 0)
        }

        fn remove_from_set(&self, set: &str, members: &[String]) -> Result<usize> {
            if members.is_empty() {
                return Ok(0);
            }
            let key = self.full_key(set);
            let mut removed = 0;
            for chunk in members.chunks(BATCH_SIZE) {
                let count: usize = self.with_connection("remove_from_set", |conn| {
                    redis::cmd("SREM").arg(&key).arg(chunk).query(conn)
                })?;
                removed += count;
            }
            Ok(removed)
        }

        fn is_member(&self, set: &str, member: &str) -> Result<bool> {
            let key = self.full_key(set);
            self.with_connection("is_member", |conn| {
                redis::cmd("SISMEMBER").arg(&key).arg(member).query(conn)
            })
        }

        fn set_members(&self, set: &str) -> Result<HashSet<String>> {
            let key = self.full_key(set);
            self.with_connection("set_members", |conn| {
                redis::cmd("SMEMBERS").arg(&key).query(conn)
            })
        }

        fn push_capped(
            &self,
            list: &str,
            value: &str,
            capacity: usize,
            ttl: Option<Duration>,
        ) -> Result<()> {
            let key = self.full_key(list);
            let last = isize::try_from(capacity.max(1) - 1).unwrap_or(isize::MAX);
            self.with_connection("push_capped", |conn| {
                let mut pipe = redis::pipe();
                pipe.atomic()
                    .cmd("LPUSH")
                    .arg(&key)
                    .arg(value)
                    .ignore()
                    .cmd("LTRIM")
                    .arg(&key)
                    .arg(0)
                    .arg(last)
                    .ignore();
                if let Some(ttl) = ttl {
                    pipe.cmd("PEXPIRE")
                        .arg(&key)
                        .arg(Self::ttl_millis(ttl))
                        .ignore();
                }
                pipe.query::<()>(conn)
            })
        }

        fn list_range(&self, list: &str) -> Result<Vec<String>> {
            let key = self.full_key(list);
            self.with_connection("list_range", |conn| {
                redis::cmd("LRANGE").arg(&key).arg(0).arg(-1).query(conn)
            })
        }

        fn delete(&self, keys: &[String]) -> Result<usize> {
            let full: Vec<String> = keys.iter().map(|k| self.full_key(k)).collect();
            self.delete_full_keys(&full)
        }

        fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
            let mut found = BTreeSet::new();
            self.scan_pages(prefix, |page| {
                found.extend(
                    page.iter()
                        .filter_map(|key| self.strip_namespace(key))
                        .map(str::to_string),
                );
                Ok(())
            })?;
            Ok(found.into_iter().collect())
        }

        fn delete_by_prefix(&self, prefix: &str) -> Result<usize> {
            let mut deleted = 0;
            self.scan_pages(prefix, |page| {
                deleted += self.delete_full_keys(&page)?;
                Ok(())
            })?;
            Ok(deleted)
        }

        fn ping(&self) -> Result<()> {
            self.with_connection("ping", |conn| redis::cmd("PING").query::<String>(conn))
                .map(|_| ())
        }
    }

    fn unavailable(operation: &str, e: &RedisError) -> Error {
        Error::StoreUnavailable {
            operation: format!("redis_{operation}"),
            cause: e.to_string(),
        }
    }

    /// Server-side type errors stay `OperationFailed`; everything else means
    /// the store could not serve the call.
    fn map_redis_error(operation: &str, e: &RedisError) -> Error {
        let message = e.to_string();
        if message.contains("WRONGTYPE") {
            Error::OperationFailed {
                operation: format!("redis_{operation}"),
                cause: message,
            }
        } else {
            unavailable(operation, e)
        }
    }

    /// Escapes Redis glob metacharacters.
    fn escape_glob(raw: &str) -> String {
        let mut escaped = String::with_capacity(raw.len());
        for c in raw.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped
    }

}

#[cfg(feature = "redis")]
pub use implementation::RedisStore;

#[cfg(not(feature = "redis"))]
mod stub {
    use crate::storage::traits::RecencyStore;
    use crate::{Error, Result};
    use std::collections::HashSet;
    use std::time::Duration;

    /// Stub Redis store when the feature is not enabled.
    pub struct RedisStore;

    impl RedisStore {
        /// Default Redis URL.
        pub const DEFAULT_URL: &'static str = "redis://127.0.0.1:6379";

        /// Default key namespace.
        pub const DEFAULT_NAMESPACE: &'static str = "freshwire";

        /// Creates a Redis store (stub).
        ///
        /// # Errors
        ///
        /// Always returns an error because the feature is not enabled.
        pub fn new(_url: &str, _namespace: impl Into<String>, _timeout: Duration) -> Result<Self> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        /// Creates a store with default settings (stub).
        ///
        /// # Errors
        ///
        /// Always returns an error because the feature is not enabled.
        pub fn with_defaults() -> Result<Self> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }
    }

    fn disabled<T>() -> Result<T> {
        Err(Error::FeatureNotEnabled("redis".to_string()))
    }

    impl RecencyStore for RedisStore {
        fn backend_name(&self) -> &'static str {
            "redis"
        }

        fn put(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<()> {
            disabled()
        }

        fn put_if_absent(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<bool> {
            disabled()
        }

        fn get(&self, _key: &str) -> Result<Option<String>> {
            disabled()
        }

        fn exists(&self, _key: &str) -> Result<bool> {
            disabled()
        }

        fn add_to_set(&self, _set: &str, _member: &str, _ttl: Option<Duration>) -> Result<bool> {
            disabled()
        }

        fn remove_from_set(&self, _set: &str, _members: &[String]) -> Result<usize> {
            disabled()
        }

        fn is_member(&self, _set: &str, _member: &str) -> Result<bool> {
            disabled()
        }

        fn set_members(&self, _set: &str) -> Result<HashSet<String>> {
            disabled()
        }

        fn push_capped(
            &self,
            _list: &str,
            _value: &str,
            _capacity: usize,
            _ttl: Option<Duration>,
        ) -> Result<()> {
            disabled()
        }

        fn list_range(&self, _list: &str) -> Result<Vec<String>> {
            disabled()
        }

        fn delete(&self, _keys: &[String]) -> Result<usize> {
            disabled()
        }

        fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>> {
            disabled()
        }

        fn ping(&self) -> Result<()> {
            disabled()
        }
    }
}

#[cfg(not(feature = "redis"))]
pub use stub::RedisStore;
