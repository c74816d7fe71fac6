//! Tool registry implementation

use super::error::RegistryError;
use super::factory::{BuildContext, Dependencies, SharedFactory, ToolFactory};
use super::graph::DependencyGraph;
use super::metadata::{Lifecycle, RegistrationOptions, ToolMetadata};
use crate::tools::SharedTool;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

struct ToolEntry {
    metadata: ToolMetadata,
    factory: SharedFactory,
}

/// Registry statistics
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    /// Number of registrations
    pub total_registered: usize,
    /// Number of live singleton instances
    pub total_instances: usize,
    /// Registrations per lifecycle state
    pub lifecycle_counts: BTreeMap<String, usize>,
    /// Declared dependency edges
    pub dependency_edges: usize,
    /// Registry has been disposed
    pub disposed: bool,
}

/// State carried through one top-level resolution
#[derive(Default)]
struct Resolution {
    stack: Vec<String>,
    resolved: HashMap<String, SharedTool>,
}

/// Named component registry with dependency resolution
///
/// Resolution is serialized by a single async lock held for the whole of a
/// `get` call, so concurrent first requests for a singleton construct it
/// once. Factories and `initialize()` run while that lock is held and must
/// not call back into the same registry.
pub struct ToolRegistry {
    entries: RwLock<HashMap<String, ToolEntry>>,
    graph: RwLock<DependencyGraph>,
    instances: Mutex<HashMap<String, SharedTool>>,
    disposed: AtomicBool,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("registered", &self.entries.read().len())
            .field("disposed", &self.disposed.load(Ordering::SeqCst))
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            graph: RwLock::new(DependencyGraph::new()),
            instances: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
        }
    }

    fn ensure_active(&self) -> Result<(), RegistryError> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(RegistryError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Register a tool factory under a unique name
    ///
    /// Dependencies may name tools that are registered later; missing ones
    /// are reported by [`validate_dependencies`](Self::validate_dependencies)
    /// and fail at resolution.
    pub fn register<F>(
        &self,
        name: impl Into<String>,
        factory: F,
        options: RegistrationOptions,
    ) -> Result<(), RegistryError>
    where
        F: ToolFactory + 'static,
    {
        self.ensure_active()?;
        let name = name.into();

        let mut entries = self.entries.write();
        if entries.contains_key(&name) {
            return Err(RegistryError::DuplicateRegistration(name));
        }

        let metadata = ToolMetadata::from_options(&name, options);
        self.graph.write().insert(&name, &metadata.dependencies);

        tracing::info!(
            tool = %name,
            dependencies = ?metadata.dependencies,
            singleton = metadata.singleton,
            lazy = metadata.lazy,
            "Registered tool"
        );

        entries.insert(
            name,
            ToolEntry {
                metadata,
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    /// Resolve a tool, constructing it and its dependencies as needed
    pub async fn get(&self, name: &str) -> Result<SharedTool, RegistryError> {
        self.get_with_config(name, None).await
    }

    /// Resolve a tool, passing configuration to its factory
    ///
    /// The configuration only reaches the factory of `name` itself, and only
    /// when a new instance is built; a cached singleton is returned as is.
    pub async fn get_with_config(
        &self,
        name: &str,
        config: Option<Value>,
    ) -> Result<SharedTool, RegistryError> {
        self.ensure_active()?;
        let mut instances = self.instances.lock().await;
        // dispose_all may have completed while we waited for the lock
        self.ensure_active()?;

        let mut resolution = Resolution::default();
        self.resolve(name, config, &mut instances, &mut resolution)
            .await
    }

    fn resolve<'a>(
        &'a self,
        name: &'a str,
        config: Option<Value>,
        instances: &'a mut HashMap<String, SharedTool>,
        resolution: &'a mut Resolution,
    ) -> BoxFuture<'a, Result<SharedTool, RegistryError>> {
        Box::pin(async move {
            if let Some(index) = resolution.stack.iter().position(|n| n == name) {
                let mut path = resolution.stack[index..].to_vec();
                path.push(name.to_string());
                tracing::error!(path = %path.join(" -> "), "Circular dependency detected");
                return Err(RegistryError::CircularDependency { path });
            }

            let (singleton, dependencies, factory) = {
                let entries = self.entries.read();
                let entry = entries
                    .get(name)
                    .ok_or_else(|| RegistryError::Unregistered(name.to_string()))?;
                (
                    entry.metadata.singleton,
                    entry.metadata.dependencies.clone(),
                    entry.factory.clone(),
                )
            };

            if singleton {
                if let Some(instance) = instances.get(name) {
                    return Ok(instance.clone());
                }
            }
            if let Some(instance) = resolution.resolved.get(name) {
                return Ok(instance.clone());
            }

            resolution.stack.push(name.to_string());
            let mut resolved = Dependencies::default();
            for dependency in &dependencies {
                match self.resolve(dependency, None, instances, resolution).await {
                    Ok(tool) => resolved.push(dependency.clone(), tool),
                    Err(e) if e.is_circular() => {
                        resolution.stack.pop();
                        return Err(e);
                    }
                    Err(e) => {
                        resolution.stack.pop();
                        self.set_lifecycle(name, Lifecycle::Error);
                        tracing::error!(tool = %name, dependency = %dependency, error = %e, "Dependency resolution failed");
                        return Err(RegistryError::initialization(
                            name,
                            super::error::InitializationCause::Dependency {
                                dependency: dependency.clone(),
                                error: e,
                            },
                        ));
                    }
                }
            }
            resolution.stack.pop();

            let instance = self.construct(name, config, resolved, factory).await?;

            if singleton {
                instances.insert(name.to_string(), instance.clone());
            }
            resolution.resolved.insert(name.to_string(), instance.clone());
            Ok(instance)
        })
    }

    async fn construct(
        &self,
        name: &str,
        config: Option<Value>,
        dependencies: Dependencies,
        factory: SharedFactory,
    ) -> Result<SharedTool, RegistryError> {
        self.set_lifecycle(name, Lifecycle::Initializing);
        tracing::debug!(tool = %name, "Constructing tool");

        let context = BuildContext::new(name, config, dependencies);
        let tool = match factory.build(context).await {
            Ok(tool) => tool,
            Err(e) => {
                self.set_lifecycle(name, Lifecycle::Error);
                tracing::error!(tool = %name, error = %e, "Tool construction failed");
                return Err(RegistryError::initialization(name, e));
            }
        };

        if let Err(e) = tool.initialize().await {
            self.set_lifecycle(name, Lifecycle::Error);
            tracing::error!(tool = %name, error = %e, "Tool initialization failed");
            if let Err(dispose_err) = tool.dispose().await {
                tracing::warn!(tool = %name, error = %dispose_err, "Cleanup after failed initialization failed");
            }
            return Err(RegistryError::initialization(name, e));
        }

        self.set_lifecycle(name, Lifecycle::Ready);
        tracing::info!(tool = %name, "Tool ready");
        Ok(tool)
    }

    fn set_lifecycle(&self, name: &str, lifecycle: Lifecycle) {
        if let Some(entry) = self.entries.write().get_mut(name) {
            entry.metadata.lifecycle = lifecycle;
        }
    }

    /// Check the registration set without constructing anything
    ///
    /// Returns one message per unregistered dependency reference plus one for
    /// a dependency cycle, if any. An empty list means every registration can
    /// be resolved.
    pub fn validate_dependencies(&self) -> Vec<String> {
        let graph = self.graph.read();
        let mut errors: Vec<String> = graph
            .missing_dependencies()
            .into_iter()
            .map(|(name, dependency)| {
                format!(
                    "Tool '{}' depends on unregistered tool '{}'",
                    name, dependency
                )
            })
            .collect();

        if let Err(cycle) = graph.disposal_order() {
            errors.push(
                RegistryError::CircularDependency { path: cycle.cycle }.to_string(),
            );
        }

        errors
    }

    /// Construct every eagerly registered tool
    ///
    /// Tools registered with `lazy = false` are resolved in dependency
    /// order. Returns the number of tools resolved.
    pub async fn warm_up(&self) -> Result<usize, RegistryError> {
        self.ensure_active()?;
        let order = self
            .graph
            .read()
            .construction_order()
            .map_err(|cycle| RegistryError::CircularDependency { path: cycle.cycle })?;

        let eager: Vec<String> = {
            let entries = self.entries.read();
            order
                .into_iter()
                .filter(|name| entries.get(name).is_some_and(|e| !e.metadata.lazy))
                .collect()
        };

        for name in &eager {
            self.get(name).await?;
        }
        tracing::info!(count = eager.len(), "Eager tools initialized");
        Ok(eager.len())
    }

    /// Dispose every live singleton, dependents before their dependencies
    ///
    /// Disposal failures are logged and do not stop the remaining disposals.
    /// Afterwards the registry rejects `register` and `get`; calling this
    /// again is a no-op.
    pub async fn dispose_all(&self) {
        let mut instances = self.instances.lock().await;
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let order = match self.graph.read().disposal_order() {
            Ok(order) => order,
            Err(cycle) => {
                tracing::warn!(
                    cycle = %cycle.cycle.join(" -> "),
                    "Dependency cycle present, disposing in name order"
                );
                let mut names: Vec<String> = instances.keys().cloned().collect();
                names.sort();
                names
            }
        };

        let mut disposed = 0usize;
        for name in order {
            if let Some(tool) = instances.remove(&name) {
                self.dispose_instance(&name, tool).await;
                disposed += 1;
            }
        }

        // Instances whose registration is no longer in the graph
        for (name, tool) in instances.drain() {
            self.dispose_instance(&name, tool).await;
            disposed += 1;
        }

        tracing::info!(count = disposed, "Registry disposed");
    }

    async fn dispose_instance(&self, name: &str, tool: SharedTool) {
        match tool.dispose().await {
            Ok(()) => tracing::debug!(tool = %name, "Tool disposed"),
            Err(e) => tracing::error!(tool = %name, error = %e, "Tool disposal failed"),
        }
        self.set_lifecycle(name, Lifecycle::Disposed);
    }

    /// Remove a registration, disposing its live singleton
    ///
    /// The name can be registered again afterwards.
    pub async fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        self.ensure_active()?;
        let mut instances = self.instances.lock().await;

        if !self.entries.read().contains_key(name) {
            return Err(RegistryError::Unregistered(name.to_string()));
        }

        if let Some(tool) = instances.remove(name) {
            self.dispose_instance(name, tool).await;
        }

        let dependents = self.graph.read().dependents_of(name);
        if !dependents.is_empty() {
            tracing::warn!(tool = %name, dependents = ?dependents, "Unregistered tool still has dependents");
        }

        self.graph.write().remove(name);
        self.entries.write().remove(name);
        tracing::info!(tool = %name, "Unregistered tool");
        Ok(())
    }

    /// Check whether a name is registered
    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Metadata snapshot for one tool
    pub fn metadata(&self, name: &str) -> Option<ToolMetadata> {
        self.entries.read().get(name).map(|e| e.metadata.clone())
    }

    /// Current lifecycle of one tool
    pub fn lifecycle(&self, name: &str) -> Option<Lifecycle> {
        self.entries.read().get(name).map(|e| e.metadata.lifecycle)
    }

    /// Metadata of all registrations, optionally filtered by tag
    ///
    /// Sorted by descending priority, then by name.
    pub fn list(&self, tag: Option<&str>) -> Vec<ToolMetadata> {
        let entries = self.entries.read();
        let mut listed: Vec<ToolMetadata> = entries
            .values()
            .filter(|e| tag.is_none_or(|t| e.metadata.has_tag(t)))
            .map(|e| e.metadata.clone())
            .collect();
        listed.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        listed
    }

    /// Snapshot of the dependency graph
    pub fn dependency_graph(&self) -> DependencyGraph {
        self.graph.read().clone()
    }

    /// Registry statistics
    pub async fn stats(&self) -> RegistryStats {
        let total_instances = self.instances.lock().await.len();
        let entries = self.entries.read();

        let mut lifecycle_counts: BTreeMap<String, usize> = Lifecycle::ALL
            .iter()
            .map(|l| (l.as_str().to_string(), 0))
            .collect();
        for entry in entries.values() {
            *lifecycle_counts
                .entry(entry.metadata.lifecycle.as_str().to_string())
                .or_default() += 1;
        }

        RegistryStats {
            total_registered: entries.len(),
            total_instances,
            lifecycle_counts,
            dependency_edges: self.graph.read().edge_count(),
            disposed: self.disposed.load(Ordering::SeqCst),
        }
    }

    /// Check whether the registry has been disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}
