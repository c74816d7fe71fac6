//! Tests for the tool registry

use super::*;
use crate::tools::{SharedTool, Tool, ToolError, downcast_tool};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared log of lifecycle calls across tools
#[derive(Default, Clone)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    fn position(&self, entry: &str) -> usize {
        self.entries()
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("'{entry}' not in journal: {:?}", self.entries()))
    }
}

struct Component {
    name: String,
    journal: Journal,
    fail_init: bool,
    fail_dispose: bool,
}

#[async_trait]
impl Tool for Component {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self) -> Result<(), ToolError> {
        self.journal.record(format!("init:{}", self.name));
        if self.fail_init {
            return Err(ToolError::initialization("connection refused"));
        }
        Ok(())
    }

    async fn dispose(&self) -> Result<(), ToolError> {
        self.journal.record(format!("dispose:{}", self.name));
        if self.fail_dispose {
            return Err(ToolError::disposal("socket already closed"));
        }
        Ok(())
    }
}

fn component(name: &str, journal: &Journal) -> impl ToolFactory + 'static {
    component_with(name, journal, false, false)
}

fn component_with(
    name: &str,
    journal: &Journal,
    fail_init: bool,
    fail_dispose: bool,
) -> impl ToolFactory + 'static {
    let name = name.to_string();
    let journal = journal.clone();
    move |ctx: BuildContext| {
        let name = name.clone();
        let journal = journal.clone();
        async move {
            let deps: Vec<&str> = ctx.dependencies().names().collect();
            journal.record(format!("build:{}{:?}", name, deps));
            Ok::<SharedTool, ToolError>(Arc::new(Component {
                name,
                journal,
                fail_init,
                fail_dispose,
            }))
        }
    }
}

#[tokio::test]
async fn test_dependency_initialized_before_dependent_is_built() {
    let registry = ToolRegistry::new();
    let journal = Journal::default();

    registry
        .register("db", component("db", &journal), RegistrationOptions::new())
        .unwrap();
    registry
        .register(
            "api",
            component("api", &journal),
            RegistrationOptions::new().depends_on("db"),
        )
        .unwrap();

    let api = registry.get("api").await.unwrap();
    assert_eq!(api.name(), "api");
    assert!(journal.position("init:db") < journal.position("build:api[\"db\"]"));

    let db_first = registry.get("db").await.unwrap();
    let db_again = registry.get("db").await.unwrap();
    assert!(Arc::ptr_eq(&db_first, &db_again));
    assert_eq!(
        journal.entries().iter().filter(|e| *e == "init:db").count(),
        1
    );
    assert_eq!(registry.lifecycle("db"), Some(Lifecycle::Ready));
}

#[tokio::test]
async fn test_typed_dependency_injection() {
    struct Database {
        url: String,
    }
    impl Tool for Database {
        fn name(&self) -> &str {
            "db"
        }
    }

    struct Repository {
        db: Arc<Database>,
    }
    impl Tool for Repository {
        fn name(&self) -> &str {
            "repo"
        }
    }

    let registry = ToolRegistry::new();
    registry
        .register(
            "db",
            |ctx: BuildContext| async move {
                let url = ctx
                    .config()
                    .and_then(|c| c.get("url"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("sqlite::memory:")
                    .to_string();
                Ok::<SharedTool, ToolError>(Arc::new(Database { url }))
            },
            RegistrationOptions::new(),
        )
        .unwrap();
    registry
        .register(
            "repo",
            |ctx: BuildContext| async move {
                let db = ctx.dependency::<Database>("db")?;
                Ok::<SharedTool, ToolError>(Arc::new(Repository { db }))
            },
            RegistrationOptions::new().depends_on("db"),
        )
        .unwrap();

    let repo = downcast_tool::<Repository>(registry.get("repo").await.unwrap()).unwrap();
    assert_eq!(repo.db.url, "sqlite::memory:");
}

#[tokio::test]
async fn test_config_reaches_requested_factory() {
    let registry = ToolRegistry::new();
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();

    registry
        .register(
            "client",
            move |ctx: BuildContext| {
                let sink = sink.clone();
                async move {
                    *sink.lock() = ctx.config().cloned();
                    Ok::<SharedTool, ToolError>(Arc::new(Component {
                        name: "client".to_string(),
                        journal: Journal::default(),
                        fail_init: false,
                        fail_dispose: false,
                    }))
                }
            },
            RegistrationOptions::new(),
        )
        .unwrap();

    registry
        .get_with_config("client", Some(json!({"timeout": 30})))
        .await
        .unwrap();
    assert_eq!(*seen.lock(), Some(json!({"timeout": 30})));
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let registry = ToolRegistry::new();
    let journal = Journal::default();

    registry
        .register("db", component("db", &journal), RegistrationOptions::new())
        .unwrap();
    let err = registry
        .register("db", component("db", &journal), RegistrationOptions::new())
        .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateRegistration(name) if name == "db"));
}

#[tokio::test]
async fn test_unregistered_name() {
    let registry = ToolRegistry::new();
    let err = registry.get("ghost").await.err().unwrap();
    assert!(matches!(err, RegistryError::Unregistered(name) if name == "ghost"));
}

#[tokio::test]
async fn test_cycle_detected_by_validation_and_resolution() {
    let registry = ToolRegistry::new();
    let journal = Journal::default();

    registry
        .register(
            "a",
            component("a", &journal),
            RegistrationOptions::new().depends_on("b"),
        )
        .unwrap();
    registry
        .register(
            "b",
            component("b", &journal),
            RegistrationOptions::new().depends_on("a"),
        )
        .unwrap();

    let errors = registry.validate_dependencies();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Circular dependency"));

    let err = registry.get("a").await.err().unwrap();
    match err {
        RegistryError::CircularDependency { path } => assert_eq!(path, vec!["a", "b", "a"]),
        other => panic!("expected cycle, got {other:?}"),
    }
    assert!(journal.entries().is_empty());
    assert_eq!(registry.lifecycle("a"), Some(Lifecycle::Registered));
}

#[tokio::test]
async fn test_validation_reports_missing_dependency() {
    let registry = ToolRegistry::new();
    let journal = Journal::default();

    registry
        .register(
            "api",
            component("api", &journal),
            RegistrationOptions::new().depends_on("db"),
        )
        .unwrap();

    assert_eq!(
        registry.validate_dependencies(),
        vec!["Tool 'api' depends on unregistered tool 'db'".to_string()]
    );

    let err = registry.get("api").await.err().unwrap();
    assert!(matches!(err, RegistryError::Initialization { ref name, .. } if name == "api"));
    assert_eq!(registry.lifecycle("api"), Some(Lifecycle::Error));

    // Registering the missing dependency repairs resolution
    registry
        .register("db", component("db", &journal), RegistrationOptions::new())
        .unwrap();
    assert!(registry.validate_dependencies().is_empty());
    registry.get("api").await.unwrap();
    assert_eq!(registry.lifecycle("api"), Some(Lifecycle::Ready));
}

#[tokio::test]
async fn test_initialization_failure_sets_error_and_retries() {
    let registry = ToolRegistry::new();
    let journal = Journal::default();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let inner_journal = journal.clone();

    registry
        .register(
            "flaky",
            move |_ctx: BuildContext| {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                let journal = inner_journal.clone();
                async move {
                    Ok::<SharedTool, ToolError>(Arc::new(Component {
                        name: "flaky".to_string(),
                        journal,
                        fail_init: attempt == 0,
                        fail_dispose: false,
                    }))
                }
            },
            RegistrationOptions::new(),
        )
        .unwrap();

    let err = registry.get("flaky").await.err().unwrap();
    match &err {
        RegistryError::Initialization { name, source } => {
            assert_eq!(name, "flaky");
            assert!(matches!(source.as_ref(), InitializationCause::Tool(_)));
        }
        other => panic!("expected initialization error, got {other:?}"),
    }
    assert_eq!(registry.lifecycle("flaky"), Some(Lifecycle::Error));
    // A failed initialize is followed by cleanup
    assert!(journal.entries().contains(&"dispose:flaky".to_string()));

    registry.get("flaky").await.unwrap();
    assert_eq!(registry.lifecycle("flaky"), Some(Lifecycle::Ready));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_factory_error_is_wrapped() {
    let registry = ToolRegistry::new();
    registry
        .register(
            "broken",
            |_ctx: BuildContext| async {
                Err::<SharedTool, ToolError>(ToolError::failed("missing API key"))
            },
            RegistrationOptions::new(),
        )
        .unwrap();

    let err = registry.get("broken").await.err().unwrap();
    assert!(err.to_string().contains("missing API key"));
    assert_eq!(registry.lifecycle("broken"), Some(Lifecycle::Error));
}

#[tokio::test]
async fn test_dependency_failure_propagates_to_dependent() {
    let registry = ToolRegistry::new();
    let journal = Journal::default();

    registry
        .register(
            "db",
            component_with("db", &journal, true, false),
            RegistrationOptions::new(),
        )
        .unwrap();
    registry
        .register(
            "api",
            component("api", &journal),
            RegistrationOptions::new().depends_on("db"),
        )
        .unwrap();

    let err = registry.get("api").await.err().unwrap();
    match err {
        RegistryError::Initialization { name, source } => {
            assert_eq!(name, "api");
            assert!(matches!(
                *source,
                InitializationCause::Dependency { ref dependency, .. } if dependency == "db"
            ));
        }
        other => panic!("expected initialization error, got {other:?}"),
    }
    assert_eq!(registry.lifecycle("db"), Some(Lifecycle::Error));
    assert_eq!(registry.lifecycle("api"), Some(Lifecycle::Error));
    assert!(!journal.entries().iter().any(|e| e.starts_with("build:api")));
}

#[tokio::test]
async fn test_concurrent_singleton_resolution_builds_once() {
    let registry = Arc::new(ToolRegistry::new());
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();

    registry
        .register(
            "pool",
            move |_ctx: BuildContext| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    Ok::<SharedTool, ToolError>(Arc::new(Component {
                        name: "pool".to_string(),
                        journal: Journal::default(),
                        fail_init: false,
                        fail_dispose: false,
                    }))
                }
            },
            RegistrationOptions::new(),
        )
        .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.get("pool").await.unwrap() })
        })
        .collect();

    let mut instances = Vec::new();
    for handle in handles {
        instances.push(handle.await.unwrap());
    }

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[tokio::test]
async fn test_transient_builds_each_time_and_shares_within_resolution() {
    let registry = ToolRegistry::new();
    let journal = Journal::default();

    registry
        .register(
            "conn",
            component("conn", &journal),
            RegistrationOptions::new().transient(),
        )
        .unwrap();
    registry
        .register(
            "reader",
            component("reader", &journal),
            RegistrationOptions::new().depends_on("conn").transient(),
        )
        .unwrap();
    registry
        .register(
            "service",
            component("service", &journal),
            RegistrationOptions::new()
                .depends_on("reader")
                .depends_on("conn")
                .transient(),
        )
        .unwrap();

    let first = registry.get("conn").await.unwrap();
    let second = registry.get("conn").await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));

    journal.0.lock().clear();
    registry.get("service").await.unwrap();
    // "conn" is reached twice through the diamond but built once
    assert_eq!(
        journal
            .entries()
            .iter()
            .filter(|e| e.starts_with("build:conn"))
            .count(),
        1
    );
    assert_eq!(registry.stats().await.total_instances, 0);
}

#[tokio::test]
async fn test_dispose_all_disposes_dependents_first() {
    let registry = ToolRegistry::new();
    let journal = Journal::default();

    registry
        .register("config", component("config", &journal), RegistrationOptions::new())
        .unwrap();
    registry
        .register(
            "db",
            component("db", &journal),
            RegistrationOptions::new().depends_on("config"),
        )
        .unwrap();
    registry
        .register(
            "api",
            component("api", &journal),
            RegistrationOptions::new().depends_on("db").depends_on("config"),
        )
        .unwrap();

    registry.get("api").await.unwrap();
    registry.dispose_all().await;

    assert!(journal.position("dispose:api") < journal.position("dispose:db"));
    assert!(journal.position("dispose:db") < journal.position("dispose:config"));
    assert_eq!(registry.lifecycle("api"), Some(Lifecycle::Disposed));
    assert_eq!(registry.lifecycle("config"), Some(Lifecycle::Disposed));
}

#[tokio::test]
async fn test_dispose_failure_does_not_stop_others() {
    let registry = ToolRegistry::new();
    let journal = Journal::default();

    registry
        .register("db", component("db", &journal), RegistrationOptions::new())
        .unwrap();
    registry
        .register(
            "api",
            component_with("api", &journal, false, true),
            RegistrationOptions::new().depends_on("db"),
        )
        .unwrap();

    registry.get("api").await.unwrap();
    registry.dispose_all().await;

    let entries = journal.entries();
    assert!(entries.contains(&"dispose:api".to_string()));
    assert!(entries.contains(&"dispose:db".to_string()));
}

#[tokio::test]
async fn test_disposed_registry_rejects_use() {
    let registry = ToolRegistry::new();
    let journal = Journal::default();

    registry
        .register("db", component("db", &journal), RegistrationOptions::new())
        .unwrap();
    registry.get("db").await.unwrap();

    registry.dispose_all().await;
    registry.dispose_all().await;
    assert_eq!(
        journal.entries().iter().filter(|e| *e == "dispose:db").count(),
        1
    );

    assert!(registry.is_disposed());
    assert!(matches!(
        registry.get("db").await,
        Err(RegistryError::Disposed)
    ));
    assert!(matches!(
        registry.register("cache", component("cache", &journal), RegistrationOptions::new()),
        Err(RegistryError::Disposed)
    ));
}

#[tokio::test]
async fn test_unregister_disposes_and_allows_reregistration() {
    let registry = ToolRegistry::new();
    let journal = Journal::default();

    registry
        .register("db", component("db", &journal), RegistrationOptions::new())
        .unwrap();
    let first = registry.get("db").await.unwrap();

    registry.unregister("db").await.unwrap();
    assert!(!registry.is_registered("db"));
    assert!(journal.entries().contains(&"dispose:db".to_string()));

    registry
        .register("db", component("db", &journal), RegistrationOptions::new())
        .unwrap();
    let second = registry.get("db").await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));

    assert!(matches!(
        registry.unregister("ghost").await,
        Err(RegistryError::Unregistered(_))
    ));
}

#[tokio::test]
async fn test_warm_up_resolves_eager_tools_in_order() {
    let registry = ToolRegistry::new();
    let journal = Journal::default();

    registry
        .register("db", component("db", &journal), RegistrationOptions::new())
        .unwrap();
    registry
        .register(
            "api",
            component("api", &journal),
            RegistrationOptions::new().depends_on("db").eager(),
        )
        .unwrap();
    registry
        .register("report", component("report", &journal), RegistrationOptions::new())
        .unwrap();

    assert_eq!(registry.warm_up().await.unwrap(), 1);
    assert_eq!(registry.lifecycle("api"), Some(Lifecycle::Ready));
    assert_eq!(registry.lifecycle("db"), Some(Lifecycle::Ready));
    assert_eq!(registry.lifecycle("report"), Some(Lifecycle::Registered));
}

#[tokio::test]
async fn test_list_and_stats() {
    let registry = ToolRegistry::new();
    let journal = Journal::default();

    registry
        .register(
            "search",
            component("search", &journal),
            RegistrationOptions::new().with_tag("web").with_priority(1),
        )
        .unwrap();
    registry
        .register(
            "browse",
            component("browse", &journal),
            RegistrationOptions::new()
                .with_tag("web")
                .with_priority(5)
                .depends_on("search"),
        )
        .unwrap();
    registry
        .register(
            "db",
            component("db", &journal),
            RegistrationOptions::new()
                .with_description("Primary database")
                .with_author("platform"),
        )
        .unwrap();

    let web: Vec<String> = registry
        .list(Some("web"))
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(web, vec!["browse", "search"]);
    assert_eq!(registry.list(None).len(), 3);

    let metadata = registry.metadata("db").unwrap();
    assert_eq!(metadata.description, "Primary database");
    assert_eq!(metadata.author.as_deref(), Some("platform"));

    registry.get("browse").await.unwrap();
    let stats = registry.stats().await;
    assert_eq!(stats.total_registered, 3);
    assert_eq!(stats.total_instances, 2);
    assert_eq!(stats.dependency_edges, 1);
    assert_eq!(stats.lifecycle_counts.get("ready"), Some(&2));
    assert_eq!(stats.lifecycle_counts.get("registered"), Some(&1));
    assert!(!stats.disposed);

    let graph = registry.dependency_graph();
    assert_eq!(graph.dependents_of("search"), vec!["browse"]);
}
