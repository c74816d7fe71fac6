//! Result cache keyed on tool name and input
//!
//! Keys are the SHA-256 of the tool name and the canonical JSON of the
//! context input (object keys sorted), so logically equal inputs share an
//! entry regardless of key order. Entries expire after the configured TTL;
//! once the cache is over capacity, expired entries are purged first and
//! then the least recently accessed ones are evicted.

use super::{Middleware, MiddlewareError, Outcome};
use crate::executor::ExecutionContext;
use crate::tools::Tool;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Metadata key set to `true` when a response came from the cache
pub const CACHE_HIT_KEY: &str = "cache_hit";

const CACHE_KEY_KEY: &str = "cache_key";

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time an entry stays valid
    #[serde(default = "default_ttl", with = "humantime_serde")]
    pub ttl: Duration,
    /// Maximum number of entries
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_max_entries() -> usize {
    1000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    /// Builder: set TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Builder: set capacity
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }
}

/// Cache counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Live entries
    pub entries: usize,
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that missed
    pub misses: u64,
    /// Entries removed to respect the capacity
    pub evictions: u64,
    /// Entries removed because they expired
    pub expirations: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheEntry {
    value: Value,
    created_at: Instant,
    last_accessed: Instant,
}

/// Compute the cache key for a tool invocation
pub fn cache_key(tool_name: &str, input: &Value) -> String {
    let canonical = canonicalize(input);
    let mut hasher = Sha256::new();
    hasher.update(tool_name.as_bytes());
    hasher.update(b"\0");
    hasher.update(canonical.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Caches successful tool results
pub struct CachingMiddleware {
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl Default for CachingMiddleware {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl CachingMiddleware {
    /// Create a cache
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Current counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.lock().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        tracing::debug!(count, "Cache cleared");
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.duration_since(entry.created_at) >= self.config.ttl
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired = match entries.get_mut(key) {
            Some(entry) if !self.is_expired(entry, now) => {
                entry.last_accessed = now;
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        None
    }

    fn store(&self, key: String, value: Value) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                last_accessed: now,
            },
        );

        if entries.len() <= self.config.max_entries {
            return;
        }

        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        self.expirations
            .fetch_add((before - entries.len()) as u64, Ordering::Relaxed);

        while entries.len() > self.config.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl Middleware for CachingMiddleware {
    fn name(&self) -> &str {
        "caching"
    }

    async fn pre_process(
        &self,
        tool: &dyn Tool,
        mut context: ExecutionContext,
    ) -> Result<ExecutionContext, MiddlewareError> {
        let key = cache_key(tool.name(), &context.input);

        match self.lookup(&key) {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(tool = %tool.name(), "Cache hit");
                context
                    .metadata
                    .insert(CACHE_HIT_KEY.to_string(), Value::Bool(true));
                context.respond_with(value);
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(tool = %tool.name(), "Cache miss");
                context
                    .metadata
                    .insert(CACHE_HIT_KEY.to_string(), Value::Bool(false));
            }
        }
        context
            .metadata
            .insert(CACHE_KEY_KEY.to_string(), Value::String(key));
        Ok(context)
    }

    async fn post_process(
        &self,
        tool: &dyn Tool,
        context: &ExecutionContext,
        outcome: &Outcome,
    ) -> Result<(), MiddlewareError> {
        if context.metadata.get(CACHE_HIT_KEY) == Some(&Value::Bool(true)) {
            return Ok(());
        }
        let Ok(value) = outcome else {
            return Ok(());
        };

        let key = match context.metadata.get(CACHE_KEY_KEY).and_then(Value::as_str) {
            Some(key) => key.to_string(),
            None => cache_key(tool.name(), &context.input),
        };
        self.store(key, value.clone());
        Ok(())
    }
}
