//! Configuration providers
//!
//! A provider reads one backing store into a JSON map. Files are parsed with
//! `figment` (JSON, YAML or TOML by extension), the environment is read
//! through figment's `Env` provider, and dictionaries live in memory.

use super::error::ConfigError;
use super::source::{ConfigSource, SourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Configuration as loaded from one source
pub type ConfigMap = Map<String, Value>;

/// Reads (and optionally writes) one configuration source
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Source metadata; `priority` decides merge precedence
    fn source(&self) -> ConfigSource;

    /// Read the source
    async fn load(&self) -> Result<ConfigMap, ConfigError>;

    /// Persist a map to the source
    async fn save(&self, _config: &ConfigMap) -> Result<(), ConfigError> {
        Err(ConfigError::Unsupported {
            provider: self.source().name,
            operation: "save".to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Json,
    Yaml,
    Toml,
    Unknown,
}

impl FileFormat {
    fn of(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => FileFormat::Json,
            Some("yml") | Some("yaml") => FileFormat::Yaml,
            Some("toml") => FileFormat::Toml,
            _ => FileFormat::Unknown,
        }
    }
}

/// Reads a JSON, YAML or TOML file
///
/// A missing file loads as an empty map. Files without a known extension are
/// parsed as JSON first, then as YAML.
#[derive(Debug, Clone)]
pub struct FileProvider {
    path: PathBuf,
    priority: i32,
}

impl FileProvider {
    /// Provider for `path` with the given priority
    pub fn new(path: impl Into<PathBuf>, priority: i32) -> Self {
        Self {
            path: path.into(),
            priority,
        }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modified(&self) -> Option<DateTime<Utc>> {
        std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    fn parse(&self) -> Result<ConfigMap, figment::Error> {
        let path = self.path.as_path();
        match FileFormat::of(path) {
            FileFormat::Json => Figment::from(Json::file(path)).extract(),
            FileFormat::Yaml => Figment::from(Yaml::file(path)).extract(),
            FileFormat::Toml => Figment::from(Toml::file(path)).extract(),
            FileFormat::Unknown => Figment::from(Json::file(path))
                .extract()
                .or_else(|_| Figment::from(Yaml::file(path)).extract()),
        }
    }

    fn render(&self, config: &ConfigMap) -> Result<String, ConfigError> {
        let name = self.source().name;
        match FileFormat::of(&self.path) {
            FileFormat::Json => {
                serde_json::to_string_pretty(config).map_err(|e| ConfigError::provider(name, e))
            }
            FileFormat::Toml => {
                toml::to_string_pretty(config).map_err(|e| ConfigError::provider(name, e))
            }
            FileFormat::Yaml | FileFormat::Unknown => {
                serde_yaml::to_string(config).map_err(|e| ConfigError::provider(name, e))
            }
        }
    }
}

#[async_trait]
impl ConfigProvider for FileProvider {
    fn source(&self) -> ConfigSource {
        let source = ConfigSource::new(
            format!("file:{}", self.path.display()),
            SourceKind::File,
            self.priority,
        )
        .with_path(&self.path);
        match self.modified() {
            Some(modified) => source.with_last_modified(modified),
            None => source,
        }
    }

    async fn load(&self) -> Result<ConfigMap, ConfigError> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            tracing::debug!(path = %self.path.display(), "Config file not found, using empty map");
            return Ok(ConfigMap::new());
        }
        self.parse()
            .map_err(|e| ConfigError::provider(self.source().name, e))
    }

    async fn save(&self, config: &ConfigMap) -> Result<(), ConfigError> {
        let name = self.source().name;
        let contents = self.render(config)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::provider(&name, e))?;
        }
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|e| ConfigError::provider(&name, e))?;
        tracing::debug!(path = %self.path.display(), "Config saved");
        Ok(())
    }
}

/// Reads environment variables
///
/// Variables are filtered on the prefix (when one is set), which is then
/// stripped. Keys are lowercased and `__` nests, so `APP_DATABASE__PORT=5432`
/// with prefix `APP_` loads as `{"database": {"port": 5432}}`. Values become
/// booleans, integers, floats or JSON where they parse as such.
#[derive(Debug, Clone)]
pub struct EnvProvider {
    prefix: String,
    priority: i32,
}

impl EnvProvider {
    /// Provider for variables starting with `prefix`; empty reads everything
    pub fn new(prefix: impl Into<String>, priority: i32) -> Self {
        Self {
            prefix: prefix.into(),
            priority,
        }
    }

    /// Variable prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn figment(&self) -> Figment {
        let env = if self.prefix.is_empty() {
            Env::raw()
        } else {
            Env::prefixed(&self.prefix)
        };
        Figment::from(env.split("__"))
    }
}

#[async_trait]
impl ConfigProvider for EnvProvider {
    fn source(&self) -> ConfigSource {
        ConfigSource::new(format!("env:{}", self.prefix), SourceKind::Env, self.priority)
    }

    async fn load(&self) -> Result<ConfigMap, ConfigError> {
        let mut config: ConfigMap = self
            .figment()
            .extract()
            .map_err(|e| ConfigError::provider(self.source().name, e))?;
        for value in config.values_mut() {
            decode_json_strings(value);
        }
        Ok(config)
    }
}

/// Parse string values that hold JSON arrays or objects
fn decode_json_strings(value: &mut Value) {
    match value {
        Value::String(raw) => {
            let trimmed = raw.trim_start();
            if (trimmed.starts_with('{') || trimmed.starts_with('['))
                && let Ok(parsed) = serde_json::from_str::<Value>(raw)
            {
                *value = parsed;
            }
        }
        Value::Object(map) => map.values_mut().for_each(decode_json_strings),
        Value::Array(items) => items.iter_mut().for_each(decode_json_strings),
        _ => {}
    }
}

/// In-memory configuration
///
/// `save` replaces the stored map.
#[derive(Debug)]
pub struct DictProvider {
    name: String,
    priority: i32,
    config: RwLock<ConfigMap>,
}

impl DictProvider {
    /// Provider serving `config`
    pub fn new(config: ConfigMap, name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            config: RwLock::new(config),
        }
    }
}

#[async_trait]
impl ConfigProvider for DictProvider {
    fn source(&self) -> ConfigSource {
        ConfigSource::new(self.name.clone(), SourceKind::Dict, self.priority)
    }

    async fn load(&self) -> Result<ConfigMap, ConfigError> {
        Ok(self.config.read().clone())
    }

    async fn save(&self, config: &ConfigMap) -> Result<(), ConfigError> {
        *self.config.write() = config.clone();
        Ok(())
    }
}
