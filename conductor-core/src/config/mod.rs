//! Configuration
//!
//! Two layers live here:
//!
//! - [`ConfigManager`] merges prioritized [`ConfigProvider`]s (files, the
//!   environment, in-memory maps) into a JSON view with dotted-path access,
//!   `${VAR}` interpolation, runtime mutation and change watchers.
//! - [`ConductorConfig`] holds the typed settings of the runtime itself and
//!   loads them with `figment` from defaults, `conductor.toml` and
//!   `CONDUCTOR_` environment variables.
//!
//! `ConductorConfig` can also be read out of a loaded manager with
//! [`ConfigManager::extract`].

mod error;
mod interpolate;
mod manager;
mod provider;
mod runtime;
mod source;

#[cfg(test)]
mod tests;

pub use error::ConfigError;
pub use interpolate::{deep_merge, get_path, interpolate, set_path};
pub use manager::{ConfigManager, DICT_PRIORITY, ENV_PRIORITY, FILE_PRIORITY, WatchId};
pub use provider::{ConfigMap, ConfigProvider, DictProvider, EnvProvider, FileProvider};
pub use runtime::{CONFIG_PATH_ENV, ConductorConfig, DEFAULT_CONFIG_FILE, LoggingConfig};
pub use source::{ConfigSource, SourceKind};
