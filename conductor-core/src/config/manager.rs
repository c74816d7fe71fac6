//! Layered configuration manager

use super::error::ConfigError;
use super::interpolate::{deep_merge, get_path, interpolate, set_path};
use super::provider::{ConfigMap, ConfigProvider, DictProvider, EnvProvider, FileProvider};
use super::source::ConfigSource;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default priority of file sources
pub const FILE_PRIORITY: i32 = 0;
/// Default priority of dictionary sources
pub const DICT_PRIORITY: i32 = 50;
/// Default priority of environment sources
pub const ENV_PRIORITY: i32 = 100;

/// Handle returned by [`ConfigManager::watch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

type SyncWatcher = Arc<dyn Fn(&ConfigMap) + Send + Sync>;
type AsyncWatcher = Arc<dyn Fn(ConfigMap) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone)]
enum Watcher {
    Sync(SyncWatcher),
    Async(AsyncWatcher),
}

struct Registered {
    provider: Arc<dyn ConfigProvider>,
    source: ConfigSource,
    seq: u64,
}

/// Merges prioritized providers into one view
///
/// Sources are kept sorted by descending priority, the most recently added
/// first among equals. [`load`](Self::load) reads all of them, deep-merges so
/// higher priorities (then later registrations) win at every depth, then
/// substitutes `${VAR}`/`$VAR` references from the process environment.
///
/// Every accessor fails with [`ConfigError::NotLoaded`] until `load()` has
/// completed once.
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), conductor_core::config::ConfigError> {
/// use conductor_core::config::ConfigManager;
///
/// let config = ConfigManager::new();
/// config.add_file_source("conductor.yaml", 0);
/// config.add_env_source("APP_", 100);
/// config.load().await?;
///
/// let port: u16 = config.get_typed("server.port", 8080)?;
/// # let _ = port;
/// # Ok(())
/// # }
/// ```
pub struct ConfigManager {
    providers: RwLock<Vec<Registered>>,
    config: RwLock<Option<ConfigMap>>,
    watchers: RwLock<Vec<(WatchId, Watcher)>>,
    next_watch: AtomicU64,
    next_seq: AtomicU64,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("sources", &self.sources())
            .field("loaded", &self.is_loaded())
            .field("watchers", &self.watchers.read().len())
            .finish()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            config: RwLock::new(None),
            watchers: RwLock::new(Vec::new()),
            next_watch: AtomicU64::new(0),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register a provider
    pub fn add_provider(&self, provider: Arc<dyn ConfigProvider>) {
        let source = provider.source();
        tracing::debug!(source = %source.name, priority = source.priority, "Added config provider");
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut providers = self.providers.write();
        providers.push(Registered {
            provider,
            source,
            seq,
        });
        providers.sort_by(|a, b| {
            b.source
                .priority
                .cmp(&a.source.priority)
                .then(b.seq.cmp(&a.seq))
        });
    }

    /// Register a JSON, YAML or TOML file
    pub fn add_file_source(&self, path: impl Into<PathBuf>, priority: i32) {
        self.add_provider(Arc::new(FileProvider::new(path, priority)));
    }

    /// Register every file matching a glob pattern, in path order
    ///
    /// Returns how many files were added.
    pub fn add_file_glob(&self, pattern: &str, priority: i32) -> Result<usize, ConfigError> {
        let paths = glob::glob(pattern)
            .map_err(|e| ConfigError::Invalid(format!("bad glob '{}': {}", pattern, e)))?;
        let mut matched: Vec<PathBuf> = paths
            .filter_map(|entry| match entry {
                Ok(path) if path.is_file() => Some(path),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "Skipping unreadable glob match");
                    None
                }
            })
            .collect();
        matched.sort();
        let count = matched.len();
        for path in matched {
            self.add_file_source(path, priority);
        }
        Ok(count)
    }

    /// Register environment variables under a prefix
    pub fn add_env_source(&self, prefix: impl Into<String>, priority: i32) {
        self.add_provider(Arc::new(EnvProvider::new(prefix, priority)));
    }

    /// Register an in-memory map
    pub fn add_dict_source(&self, config: ConfigMap, name: impl Into<String>, priority: i32) {
        self.add_provider(Arc::new(DictProvider::new(config, name, priority)));
    }

    /// Sources in priority order, highest first
    pub fn sources(&self) -> Vec<ConfigSource> {
        self.providers
            .read()
            .iter()
            .map(|entry| entry.source.clone())
            .collect()
    }

    /// Check whether `load()` has completed
    pub fn is_loaded(&self) -> bool {
        self.config.read().is_some()
    }

    /// Read every source and rebuild the merged view
    ///
    /// A provider that fails to load is skipped with a logged error.
    pub async fn load(&self) -> Result<(), ConfigError> {
        let providers: Vec<(Arc<dyn ConfigProvider>, String)> = self
            .providers
            .read()
            .iter()
            .map(|entry| (entry.provider.clone(), entry.source.name.clone()))
            .collect();

        let mut merged = ConfigMap::new();
        for (provider, name) in providers.iter().rev() {
            match provider.load().await {
                Ok(config) => {
                    tracing::debug!(source = %name, keys = config.len(), "Loaded config source");
                    deep_merge(&mut merged, config);
                }
                Err(e) => {
                    tracing::error!(source = %name, error = %e, "Error loading config source");
                }
            }
        }

        let mut root = Value::Object(merged);
        interpolate(&mut root, &|name: &str| std::env::var(name).ok());
        let Value::Object(merged) = root else {
            return Err(ConfigError::Invalid("merged configuration is not a map".to_string()));
        };

        *self.config.write() = Some(merged);
        self.refresh_sources();
        tracing::info!(sources = providers.len(), "Configuration loaded");
        Ok(())
    }

    /// Load again and notify watchers
    pub async fn reload(&self) -> Result<(), ConfigError> {
        self.load().await?;
        self.notify();
        Ok(())
    }

    fn refresh_sources(&self) {
        for entry in self.providers.write().iter_mut() {
            entry.source = entry.provider.source();
        }
    }

    fn with_config<R>(&self, f: impl FnOnce(&ConfigMap) -> R) -> Result<R, ConfigError> {
        self.config
            .read()
            .as_ref()
            .map(f)
            .ok_or(ConfigError::NotLoaded)
    }

    /// Value at a dotted path
    pub fn get(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        self.with_config(|config| get_path(config, key).cloned())
    }

    /// Value at a dotted path, or `default` when absent
    pub fn get_or(&self, key: &str, default: Value) -> Result<Value, ConfigError> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Value at a dotted path coerced to `T`
    ///
    /// Strings are parsed as JSON when that fits `T`; for booleans
    /// `"true"`, `"1"`, `"yes"` and `"on"` are true and any other string is
    /// false. Numbers and booleans coerce to strings. A value that cannot be
    /// coerced logs a warning and yields `default`.
    pub fn get_typed<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        let Some(value) = self.get(key)? else {
            return Ok(default);
        };
        match coerce::<T>(&value) {
            Some(typed) => Ok(typed),
            None => {
                tracing::warn!(
                    key = %key,
                    value = %value,
                    target = std::any::type_name::<T>(),
                    "Config value has the wrong type, using default"
                );
                Ok(default)
            }
        }
    }

    /// Deserialize the subtree at `key`; an empty key means the whole view
    ///
    /// A missing key deserializes from an empty map so serde defaults apply.
    pub fn extract<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let value = if key.is_empty() {
            self.with_config(|config| Value::Object(config.clone()))?
        } else {
            self.get(key)?
                .unwrap_or_else(|| Value::Object(ConfigMap::new()))
        };
        serde_json::from_value(value).map_err(|e| ConfigError::Deserialize {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Copy of the merged view
    pub fn get_all(&self) -> Result<ConfigMap, ConfigError> {
        self.with_config(ConfigMap::clone)
    }

    /// Write a dotted path in the merged view and notify watchers
    ///
    /// Providers are not touched; use [`save`](Self::save) to persist.
    pub fn set(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        {
            let mut guard = self.config.write();
            let config = guard.as_mut().ok_or(ConfigError::NotLoaded)?;
            set_path(config, key, value)?;
        }
        tracing::debug!(key = %key, "Config value set");
        self.notify();
        Ok(())
    }

    /// Deep-merge a map into the merged view and notify watchers
    pub fn update(&self, updates: ConfigMap) -> Result<(), ConfigError> {
        {
            let mut guard = self.config.write();
            let config = guard.as_mut().ok_or(ConfigError::NotLoaded)?;
            deep_merge(config, updates);
        }
        tracing::debug!("Config updated");
        self.notify();
        Ok(())
    }

    /// Persist the merged view through the named source
    pub async fn save(&self, source_name: &str) -> Result<(), ConfigError> {
        let config = self.get_all()?;
        let provider = self
            .providers
            .read()
            .iter()
            .find(|entry| entry.source.name == source_name)
            .map(|entry| entry.provider.clone())
            .ok_or_else(|| ConfigError::provider(source_name, "no such source"))?;
        provider.save(&config).await?;
        self.refresh_sources();
        Ok(())
    }

    /// Call `watcher` with a copy of the view after every change
    pub fn watch<F>(&self, watcher: F) -> WatchId
    where
        F: Fn(&ConfigMap) + Send + Sync + 'static,
    {
        self.add_watcher(Watcher::Sync(Arc::new(watcher)))
    }

    /// Spawn `watcher` with a copy of the view after every change
    ///
    /// Requires a Tokio runtime at notification time; without one the
    /// notification is skipped with a warning.
    pub fn watch_async<F, Fut>(&self, watcher: F) -> WatchId
    where
        F: Fn(ConfigMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_watcher(Watcher::Async(Arc::new(
            move |config| -> BoxFuture<'static, ()> { Box::pin(watcher(config)) },
        )))
    }

    /// Remove a watcher
    pub fn unwatch(&self, id: WatchId) -> bool {
        let mut watchers = self.watchers.write();
        let before = watchers.len();
        watchers.retain(|(existing, _)| *existing != id);
        before != watchers.len()
    }

    fn add_watcher(&self, watcher: Watcher) -> WatchId {
        let id = WatchId(self.next_watch.fetch_add(1, Ordering::Relaxed));
        self.watchers.write().push((id, watcher));
        id
    }

    fn notify(&self) {
        let watchers: Vec<Watcher> = self
            .watchers
            .read()
            .iter()
            .map(|(_, watcher)| watcher.clone())
            .collect();
        if watchers.is_empty() {
            return;
        }
        let Ok(snapshot) = self.get_all() else {
            return;
        };

        for watcher in watchers {
            match watcher {
                Watcher::Sync(callback) => {
                    let outcome =
                        std::panic::catch_unwind(AssertUnwindSafe(|| callback(&snapshot)));
                    if outcome.is_err() {
                        tracing::error!("Config watcher panicked");
                    }
                }
                Watcher::Async(callback) => match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(callback(snapshot.clone()));
                    }
                    Err(_) => {
                        tracing::warn!("No async runtime, skipping async config watcher");
                    }
                },
            }
        }
    }
}

fn coerce<T: DeserializeOwned>(value: &Value) -> Option<T> {
    if let Ok(typed) = serde_json::from_value::<T>(value.clone()) {
        return Some(typed);
    }
    match value {
        Value::String(raw) => {
            let trimmed = raw.trim();
            if let Ok(parsed) = serde_json::from_str::<Value>(trimmed)
                && let Ok(typed) = serde_json::from_value::<T>(parsed)
            {
                return Some(typed);
            }
            let truthy = matches!(
                trimmed.to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            );
            serde_json::from_value::<T>(Value::Bool(truthy)).ok()
        }
        Value::Number(_) | Value::Bool(_) => {
            serde_json::from_value::<T>(Value::String(value.to_string())).ok()
        }
        _ => None,
    }
}
