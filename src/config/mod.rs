//! Configuration management.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, `.env`, then
//! process environment variables.
//!
//! ```toml
//! [store]
//! backend = "redis"
//! url = "redis://127.0.0.1:6379"
//! namespace = "freshwire"
//! timeout_ms = 2000
//!
//! [store.breaker]
//! breaker_failure_threshold = 5
//!
//! [dedup]
//! similarity_threshold = 0.6
//! exclusive_commit = true
//!
//! [logging]
//! format = "json"
//!
//! [metrics]
//! enabled = true
//! port = 9090
//! ```

use crate::services::deduplication::DeduplicationConfig;
use crate::storage::{InMemoryStore, RecencyStore, RedisStore, ResilienceConfig, ResilientStore};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "FRESHWIRE_CONFIG_PATH";

/// Recency store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// In-process LRU store; state dies with the process.
    #[default]
    Memory,
    /// Shared Redis store.
    Redis,
}

impl StoreBackend {
    /// Parses a backend name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unknown name.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" | "inmemory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(Error::Configuration(format!(
                "unknown store backend '{other}' (expected memory or redis)"
            ))),
        }
    }

    /// Returns the backend name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
        }
    }
}

/// Recency store settings.
#[derive(Debug)]
pub struct StoreSettings {
    /// Backend kind.
    pub backend: StoreBackend,
    /// Redis URL; may carry credentials.
    pub url: Option<SecretString>,
    /// Key namespace.
    pub namespace: String,
    /// Per-call timeout.
    pub timeout_ms: u64,
    /// Entry capacity of the in-memory backend.
    pub memory_capacity: usize,
    /// Circuit breaker around the Redis backend.
    pub breaker: ResilienceConfig,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: None,
            namespace: RedisStore::DEFAULT_NAMESPACE.to_string(),
            timeout_ms: 2_000,
            memory_capacity: 100_000,
            breaker: ResilienceConfig::default(),
        }
    }
}

impl StoreSettings {
    /// Returns the per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Logging settings from the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directive, e.g. `freshwire=debug`.
    pub filter: Option<String>,
    /// Log file; stderr when absent.
    pub file: Option<PathBuf>,
}

/// Metrics settings from the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsSettings {
    /// Whether the Prometheus recorder is installed.
    pub enabled: Option<bool>,
    /// Listener port.
    pub port: Option<u16>,
}

/// Main configuration for freshwire.
#[derive(Debug, Default)]
pub struct FreshwireConfig {
    /// Recency store.
    pub store: StoreSettings,
    /// Deduplication engine.
    pub dedup: DeduplicationConfig,
    /// Logging.
    pub logging: LoggingSettings,
    /// Metrics.
    pub metrics: MetricsSettings,
    /// File the configuration was loaded from, if any.
    pub source_path: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Store section.
    pub store: Option<ConfigFileStore>,
    /// Dedup section.
    pub dedup: Option<DeduplicationConfig>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Metrics section.
    pub metrics: Option<MetricsSettings>,
}

/// Store section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStore {
    /// Backend name.
    pub backend: Option<String>,
    /// Redis URL.
    pub url: Option<String>,
    /// Key namespace.
    pub namespace: Option<String>,
    /// Per-call timeout.
    pub timeout_ms: Option<u64>,
    /// In-memory capacity.
    pub memory_capacity: Option<usize>,
    /// Breaker thresholds.
    pub breaker: Option<ResilienceConfig>,
}

impl FreshwireConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration for the process.
    ///
    /// Uses `path` if given, else `FRESHWIRE_CONFIG_PATH`, else the platform
    /// config dir. A missing default file is not an error; a missing
    /// explicit file is. Environment overrides and validation follow.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, or if the
    /// resulting configuration is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Missing .env is the common case
        let _ = dotenvy::dotenv();

        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        let config = match explicit {
            Some(path) => Self::load_from_file(&path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::load_from_file(&path)?,
                None => Self::default(),
            },
        };

        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the platform config file location.
    ///
    /// `~/.config/freshwire/config.toml` on Linux,
    /// `~/Library/Application Support/freshwire/config.toml` on macOS.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("freshwire").join("config.toml"))
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let mut config = Self::from_toml(&contents)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config file.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Self::from_config_file(file)
    }

    /// Converts a `ConfigFile` to `FreshwireConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(store) = file.store {
            if let Some(backend) = store.backend {
                config.store.backend = StoreBackend::parse(&backend)?;
            }
            config.store.url = store.url.map(SecretString::from);
            if let Some(namespace) = store.namespace {
                config.store.namespace = namespace;
            }
            if let Some(timeout_ms) = store.timeout_ms {
                config.store.timeout_ms = timeout_ms;
            }
            if let Some(capacity) = store.memory_capacity {
                config.store.memory_capacity = capacity;
            }
            if let Some(breaker) = store.breaker {
                config.store.breaker = breaker;
            }
        }
        if let Some(dedup) = file.dedup {
            config.dedup = dedup;
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        if let Some(metrics) = file.metrics {
            config.metrics = metrics;
        }

        Ok(config)
    }

    /// Applies environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if `FRESHWIRE_STORE_BACKEND` names an unknown backend.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend override names an unknown backend.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(backend) = lookup("FRESHWIRE_STORE_BACKEND") {
            self.store.backend = StoreBackend::parse(&backend)?;
        }
        if let Some(url) = lookup("FRESHWIRE_REDIS_URL").filter(|v| !v.trim().is_empty()) {
            self.store.url = Some(SecretString::from(url));
        }
        if let Some(namespace) = lookup("FRESHWIRE_STORE_NAMESPACE") {
            self.store.namespace = namespace;
        }
        if let Some(parsed) =
            lookup("FRESHWIRE_STORE_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok())
        {
            self.store.timeout_ms = parsed;
        }
        if let Some(parsed) =
            lookup("FRESHWIRE_STORE_MEMORY_CAPACITY").and_then(|v| v.parse::<usize>().ok())
        {
            self.store.memory_capacity = parsed;
        }
        if let Some(filter) = lookup("FRESHWIRE_LOG_FILTER") {
            self.logging.filter = Some(filter);
        }
        if let Some(format) = lookup("FRESHWIRE_LOG_FORMAT") {
            self.logging.format = Some(format);
        }
        if let Some(file) = lookup("FRESHWIRE_LOG_FILE").filter(|v| !v.trim().is_empty()) {
            self.logging.file = Some(PathBuf::from(file));
        }
        if let Some(enabled) = lookup("FRESHWIRE_METRICS_ENABLED") {
            let enabled = enabled.to_lowercase();
            self.metrics.enabled = Some(enabled == "true" || enabled == "1" || enabled == "yes");
        }
        if let Some(port) = lookup("FRESHWIRE_METRICS_PORT").and_then(|v| v.parse::<u16>().ok()) {
            self.metrics.port = Some(port);
        }

        self.store.breaker = self.store.breaker.with_overrides(&lookup);
        self.dedup = self.dedup.with_overrides(&lookup);
        Ok(self)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.dedup.validate()?;

        if self.store.timeout_ms == 0 {
            return Err(Error::Configuration(
                "store.timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.store.namespace.trim().is_empty() {
            return Err(Error::Configuration(
                "store.namespace must not be empty".to_string(),
            ));
        }
        if self.store.backend == StoreBackend::Memory && self.store.memory_capacity == 0 {
            return Err(Error::Configuration(
                "store.memory_capacity must be greater than 0".to_string(),
            ));
        }
        if self.store.breaker.breaker_failure_threshold == 0 {
            return Err(Error::Configuration(
                "store.breaker.breaker_failure_threshold must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the configured recency store.
    ///
    /// The Redis backend is wrapped in a circuit breaker; the in-memory
    /// backend cannot be unreachable and is returned bare.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unparsable Redis URL, or
    /// [`Error::FeatureNotEnabled`] when Redis support is compiled out.
    pub fn build_store(&self) -> Result<Arc<dyn RecencyStore>> {
        match self.store.backend {
            StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new(self.store.memory_capacity))),
            StoreBackend::Redis => {
                let url = self
                    .store
                    .url
                    .as_ref()
                    .map_or(RedisStore::DEFAULT_URL, |url| url.expose_secret());
                let redis = RedisStore::new(url, self.store.namespace.clone(), self.store.timeout())?;
                tracing::debug!(namespace = %self.store.namespace, "Redis store configured");
                Ok(Arc::new(ResilientStore::new(
                    redis,
                    self.store.breaker.clone(),
                )))
            },
        }
    }
}
