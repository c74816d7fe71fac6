//! Configuration source metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Kind of backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// JSON, YAML or TOML file
    File,
    /// Process environment
    Env,
    /// In-memory map
    Dict,
}

impl SourceKind {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Env => "env",
            SourceKind::Dict => "dict",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, prioritized source of configuration
///
/// Higher `priority` wins on key conflicts when sources are merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Display name, e.g. `file:app.yaml`
    pub name: String,
    /// Backing store
    pub kind: SourceKind,
    /// File path for file sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Merge priority
    pub priority: i32,
    /// Modification time of the backing file, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl ConfigSource {
    /// Create source metadata
    pub fn new(name: impl Into<String>, kind: SourceKind, priority: i32) -> Self {
        Self {
            name: name.into(),
            kind,
            path: None,
            priority,
            last_modified: None,
        }
    }

    /// Attach a file path
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach a modification time
    pub fn with_last_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(modified);
        self
    }
}
