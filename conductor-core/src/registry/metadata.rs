//! Registration metadata and lifecycle states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lifecycle of a registered tool
///
/// ```text
/// Registered -> Initializing -> Ready -> Disposed
///                    |
///                    +--> Error
/// ```
///
/// A tool in `Error` is constructed again on the next resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Registered, not yet constructed
    Registered,
    /// Construction in progress
    Initializing,
    /// Constructed and initialized
    Ready,
    /// Construction or initialization failed
    Error,
    /// Torn down
    Disposed,
}

impl Lifecycle {
    /// Every state, in declaration order
    pub const ALL: [Lifecycle; 5] = [
        Lifecycle::Registered,
        Lifecycle::Initializing,
        Lifecycle::Ready,
        Lifecycle::Error,
        Lifecycle::Disposed,
    ];

    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Registered => "registered",
            Lifecycle::Initializing => "initializing",
            Lifecycle::Ready => "ready",
            Lifecycle::Error => "error",
            Lifecycle::Disposed => "disposed",
        }
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata stored for each registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Unique name
    pub name: String,
    /// Names this tool depends on, in declaration order
    pub dependencies: Vec<String>,
    /// Share a single instance across resolutions
    pub singleton: bool,
    /// Defer construction until first resolution
    pub lazy: bool,
    /// Ordering hint for listings and warm-up
    pub priority: i32,
    /// Free-form tags
    pub tags: BTreeSet<String>,
    /// Human readable description
    pub description: String,
    /// Version string
    pub version: String,
    /// Author, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Registration time
    pub created_at: DateTime<Utc>,
    /// Current lifecycle state
    pub lifecycle: Lifecycle,
}

impl ToolMetadata {
    pub(crate) fn from_options(name: &str, options: RegistrationOptions) -> Self {
        Self {
            name: name.to_string(),
            dependencies: options.dependencies,
            singleton: options.singleton,
            lazy: options.lazy,
            priority: options.priority,
            tags: options.tags,
            description: options.description,
            version: options.version,
            author: options.author,
            created_at: Utc::now(),
            lifecycle: Lifecycle::Registered,
        }
    }

    /// Check for a tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Options accepted by [`ToolRegistry::register`](super::ToolRegistry::register)
#[derive(Debug, Clone)]
pub struct RegistrationOptions {
    pub(crate) dependencies: Vec<String>,
    pub(crate) singleton: bool,
    pub(crate) lazy: bool,
    pub(crate) priority: i32,
    pub(crate) tags: BTreeSet<String>,
    pub(crate) description: String,
    pub(crate) version: String,
    pub(crate) author: Option<String>,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            dependencies: Vec::new(),
            singleton: true,
            lazy: true,
            priority: 0,
            tags: BTreeSet::new(),
            description: String::new(),
            version: "1.0.0".to_string(),
            author: None,
        }
    }
}

impl RegistrationOptions {
    /// Singleton, lazy, no dependencies
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.dependencies.contains(&name) {
            self.dependencies.push(name);
        }
        self
    }

    /// Replace the dependency list
    pub fn with_dependencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.clear();
        for name in names {
            self = self.depends_on(name);
        }
        self
    }

    /// Build a new instance on every resolution
    pub fn transient(mut self) -> Self {
        self.singleton = false;
        self
    }

    /// Set singleton behavior
    pub fn with_singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    /// Construct during warm-up instead of on first use
    pub fn eager(mut self) -> Self {
        self.lazy = false;
        self
    }

    /// Set lazy behavior
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Set priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set author
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}
