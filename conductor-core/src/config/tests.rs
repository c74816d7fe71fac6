use super::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn map(value: Value) -> ConfigMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

struct BrokenProvider;

#[async_trait]
impl ConfigProvider for BrokenProvider {
    fn source(&self) -> ConfigSource {
        ConfigSource::new("broken", SourceKind::Dict, 200)
    }

    async fn load(&self) -> Result<ConfigMap, ConfigError> {
        Err(ConfigError::provider("broken", "backend unreachable"))
    }
}

#[tokio::test]
async fn test_higher_priority_merges_over_lower() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "base.json", r#"{"a": {"b": 1}, "name": "file"}"#);

    let config = ConfigManager::new();
    config.add_file_source(&file, 0);
    config.add_dict_source(map(json!({"a": {"c": 2}, "name": "dict"})), "overrides", 10);
    config.load().await.unwrap();

    assert_eq!(config.get("a").unwrap(), Some(json!({"b": 1, "c": 2})));
    assert_eq!(config.get("name").unwrap(), Some(json!("dict")));
}

#[tokio::test]
async fn test_env_references_are_interpolated() {
    unsafe {
        std::env::set_var("CONDUCTOR_TEST_INTERP_FOO", "bar");
    }
    let config = ConfigManager::new();
    config.add_dict_source(
        map(json!({
            "dir": "${CONDUCTOR_TEST_INTERP_FOO}/path",
            "short": "$CONDUCTOR_TEST_INTERP_FOO",
            "list": ["${CONDUCTOR_TEST_INTERP_MISSING}"],
        })),
        "dict",
        DICT_PRIORITY,
    );
    config.load().await.unwrap();

    assert_eq!(config.get("dir").unwrap(), Some(json!("bar/path")));
    assert_eq!(config.get("short").unwrap(), Some(json!("bar")));
    assert_eq!(
        config.get("list.0").unwrap(),
        Some(json!("${CONDUCTOR_TEST_INTERP_MISSING}"))
    );
    unsafe {
        std::env::remove_var("CONDUCTOR_TEST_INTERP_FOO");
    }
}

#[tokio::test]
async fn test_access_before_load_fails() {
    let config = ConfigManager::new();
    config.add_dict_source(map(json!({"a": 1})), "dict", DICT_PRIORITY);

    assert_eq!(config.get("a").unwrap_err(), ConfigError::NotLoaded);
    assert_eq!(config.get_typed("a", 0i64).unwrap_err(), ConfigError::NotLoaded);
    assert_eq!(config.set("a", json!(2)).unwrap_err(), ConfigError::NotLoaded);
    assert_eq!(config.update(ConfigMap::new()).unwrap_err(), ConfigError::NotLoaded);
    assert!(config.get_all().is_err());
    assert!(!config.is_loaded());

    config.load().await.unwrap();
    assert_eq!(config.get("a").unwrap(), Some(json!(1)));
}

#[tokio::test]
async fn test_failing_providers_are_skipped() {
    let dir = TempDir::new().unwrap();
    let malformed = write(&dir, "broken.json", "{ not json");

    let config = ConfigManager::new();
    config.add_provider(Arc::new(BrokenProvider));
    config.add_file_source(&malformed, 5);
    config.add_dict_source(map(json!({"ok": true})), "dict", 1);
    config.load().await.unwrap();

    assert!(config.is_loaded());
    assert_eq!(config.get_all().unwrap(), map(json!({"ok": true})));
}

#[tokio::test]
async fn test_missing_paths_fall_back_to_defaults() {
    let config = ConfigManager::new();
    config.add_dict_source(map(json!({"server": {"port": 80}})), "dict", 0);
    config.load().await.unwrap();

    assert_eq!(config.get("server.host").unwrap(), None);
    assert_eq!(
        config.get_or("server.host", json!("localhost")).unwrap(),
        json!("localhost")
    );
    assert_eq!(config.get_typed("server.timeout", 30u64).unwrap(), 30);
}

#[tokio::test]
async fn test_get_typed_coercion() {
    let config = ConfigManager::new();
    config.add_dict_source(
        map(json!({
            "flags": {"yes": "yes", "on": "ON", "one": "1", "no": "no", "native": true},
            "port": "8080",
            "ratio": "0.25",
            "count": 3,
            "name": "svc",
            "tags": "[\"a\", \"b\"]",
        })),
        "dict",
        0,
    );
    config.load().await.unwrap();

    assert!(config.get_typed("flags.yes", false).unwrap());
    assert!(config.get_typed("flags.on", false).unwrap());
    assert!(config.get_typed("flags.one", false).unwrap());
    assert!(!config.get_typed("flags.no", true).unwrap());
    assert!(config.get_typed("flags.native", false).unwrap());

    assert_eq!(config.get_typed("port", 0u16).unwrap(), 8080);
    assert_eq!(config.get_typed("ratio", 0.0f64).unwrap(), 0.25);
    assert_eq!(config.get_typed("count", String::new()).unwrap(), "3");
    assert_eq!(
        config.get_typed("tags", Vec::<String>::new()).unwrap(),
        vec!["a".to_string(), "b".to_string()]
    );

    // uncoercible values warn and return the default
    assert_eq!(config.get_typed("name", 7u32).unwrap(), 7);
    assert_eq!(config.get_typed("flags", 9i64).unwrap(), 9);
}

#[tokio::test]
async fn test_set_and_update_mutate_the_view() {
    let config = ConfigManager::new();
    config.add_dict_source(map(json!({"db": {"host": "a", "port": 1}})), "dict", 0);
    config.load().await.unwrap();

    config.set("cache.redis.url", json!("redis://x")).unwrap();
    assert_eq!(
        config.get("cache").unwrap(),
        Some(json!({"redis": {"url": "redis://x"}}))
    );

    config.update(map(json!({"db": {"port": 2}}))).unwrap();
    assert_eq!(config.get("db").unwrap(), Some(json!({"host": "a", "port": 2})));

    let err = config.set("db.host.name", json!("b")).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidKey { .. }));

    // the provider is untouched
    config.load().await.unwrap();
    assert_eq!(config.get("cache").unwrap(), None);
}

#[tokio::test]
async fn test_watchers_receive_snapshots() {
    let config = ConfigManager::new();
    config.add_dict_source(ConfigMap::new(), "dict", 0);
    config.load().await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let id = config.watch(move |snapshot| sink.lock().push(snapshot.clone()));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    config.watch_async(move |snapshot| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(snapshot);
        }
    });
    config.watch(|snapshot| {
        if !snapshot.is_empty() {
            panic!("watcher bug");
        }
    });

    config.set("a", json!(1)).unwrap();
    config.update(map(json!({"b": 2}))).unwrap();

    let recorded = seen.lock().clone();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0], map(json!({"a": 1})));
    assert_eq!(recorded[1], map(json!({"a": 1, "b": 2})));

    let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, map(json!({"a": 1})));

    assert!(config.unwatch(id));
    assert!(!config.unwatch(id));
    config.set("c", json!(3)).unwrap();
    assert_eq!(seen.lock().len(), 2);
}

#[tokio::test]
async fn test_reload_notifies_watchers() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "app.json", r#"{"version": 1}"#);

    let config = ConfigManager::new();
    config.add_file_source(&path, FILE_PRIORITY);
    config.load().await.unwrap();

    let versions = Arc::new(Mutex::new(Vec::new()));
    let sink = versions.clone();
    config.watch(move |snapshot| sink.lock().push(snapshot["version"].clone()));

    std::fs::write(&path, r#"{"version": 2}"#).unwrap();
    config.reload().await.unwrap();
    assert_eq!(*versions.lock(), vec![json!(2)]);
}

#[tokio::test]
async fn test_file_formats() {
    let dir = TempDir::new().unwrap();
    let yaml = write(&dir, "a.yaml", "server:\n  port: 8080\n  tls: true\n");
    let toml = write(&dir, "b.toml", "[cache]\nttl = \"5m\"\nsize = 10\n");
    let json_unknown = write(&dir, "c.conf", r#"{"mode": "json"}"#);
    let yaml_unknown = write(&dir, "d.cfg", "style: yaml\n");

    for (path, key, expected) in [
        (&yaml, "server.port", json!(8080)),
        (&toml, "cache.size", json!(10)),
        (&json_unknown, "mode", json!("json")),
        (&yaml_unknown, "style", json!("yaml")),
    ] {
        let loaded = FileProvider::new(path, 0).load().await.unwrap();
        assert_eq!(get_path(&loaded, key), Some(&expected), "{}", path.display());
    }

    let missing = FileProvider::new(dir.path().join("absent.json"), 0);
    assert!(missing.load().await.unwrap().is_empty());
    assert!(missing.source().last_modified.is_none());
}

#[tokio::test]
async fn test_file_save_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("saved.yaml");
    let provider = FileProvider::new(&path, 0);

    let config = map(json!({"service": {"name": "api", "replicas": 3}}));
    provider.save(&config).await.unwrap();
    assert_eq!(provider.load().await.unwrap(), config);
    assert!(provider.source().last_modified.is_some());
}

#[tokio::test]
async fn test_manager_save_through_named_source() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");

    let config = ConfigManager::new();
    config.add_file_source(&path, 0);
    config.load().await.unwrap();
    config.set("feature.enabled", json!(true)).unwrap();

    let name = format!("file:{}", path.display());
    config.save(&name).await.unwrap();

    let reread = ConfigManager::new();
    reread.add_file_source(&path, 0);
    reread.load().await.unwrap();
    assert!(reread.get_typed("feature.enabled", false).unwrap());

    assert!(matches!(
        config.save("nope").await.unwrap_err(),
        ConfigError::Provider { .. }
    ));
}

#[tokio::test]
async fn test_env_provider_strips_prefix_and_nests() {
    unsafe {
        std::env::set_var("CONDUCTOR_TEST_ENVP_DATABASE__PORT", "5432");
        std::env::set_var("CONDUCTOR_TEST_ENVP_DEBUG", "true");
        std::env::set_var("CONDUCTOR_TEST_ENVP_RATIO", "0.5");
        std::env::set_var("CONDUCTOR_TEST_ENVP_NAME", "svc");
        std::env::set_var("CONDUCTOR_TEST_ENVP_LIMITS", r#"{"cpu": 2}"#);
    }

    let provider = EnvProvider::new("CONDUCTOR_TEST_ENVP_", ENV_PRIORITY);
    let loaded = provider.load().await.unwrap();

    assert_eq!(get_path(&loaded, "database.port"), Some(&json!(5432)));
    assert_eq!(loaded.get("debug"), Some(&json!(true)));
    assert_eq!(loaded.get("ratio"), Some(&json!(0.5)));
    assert_eq!(loaded.get("name"), Some(&json!("svc")));
    assert_eq!(get_path(&loaded, "limits.cpu"), Some(&json!(2)));
    assert!(provider.save(&loaded).await.is_err());

    unsafe {
        for key in ["DATABASE__PORT", "DEBUG", "RATIO", "NAME", "LIMITS"] {
            std::env::remove_var(format!("CONDUCTOR_TEST_ENVP_{key}"));
        }
    }
}

#[tokio::test]
async fn test_env_source_overrides_files() {
    unsafe {
        std::env::set_var("CONDUCTOR_TEST_LAYER_SERVER__PORT", "9090");
    }
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "app.toml", "[server]\nport = 80\nhost = \"0.0.0.0\"\n");

    let config = ConfigManager::new();
    config.add_env_source("CONDUCTOR_TEST_LAYER_", ENV_PRIORITY);
    config.add_file_source(&file, FILE_PRIORITY);
    config.load().await.unwrap();

    assert_eq!(config.get_typed("server.port", 0u16).unwrap(), 9090);
    assert_eq!(config.get("server.host").unwrap(), Some(json!("0.0.0.0")));
    unsafe {
        std::env::remove_var("CONDUCTOR_TEST_LAYER_SERVER__PORT");
    }
}

#[tokio::test]
async fn test_sources_sorted_by_priority() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "a.json", "{}");

    let config = ConfigManager::new();
    config.add_file_source(&file, FILE_PRIORITY);
    config.add_env_source("CONDUCTOR_TEST_NOTHING_", ENV_PRIORITY);
    config.add_dict_source(ConfigMap::new(), "defaults", DICT_PRIORITY);

    let sources = config.sources();
    let kinds: Vec<SourceKind> = sources.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![SourceKind::Env, SourceKind::Dict, SourceKind::File]);
    assert_eq!(sources[0].name, "env:CONDUCTOR_TEST_NOTHING_");
    assert_eq!(sources[2].path.as_deref(), Some(file.as_path()));
    assert!(sources[2].last_modified.is_some());
}

#[tokio::test]
async fn test_glob_adds_matching_files() {
    let dir = TempDir::new().unwrap();
    write(&dir, "10-base.yaml", "level: base\nkeep: 1\n");
    write(&dir, "20-site.yaml", "level: site\n");
    write(&dir, "notes.txt", "ignored");

    let config = ConfigManager::new();
    let pattern = format!("{}/*.yaml", dir.path().display());
    assert_eq!(config.add_file_glob(&pattern, 0).unwrap(), 2);
    config.load().await.unwrap();

    // equal priorities: the later file wins
    assert_eq!(config.get("level").unwrap(), Some(json!("site")));
    assert_eq!(config.get("keep").unwrap(), Some(json!(1)));

    assert!(matches!(
        config.add_file_glob("[", 0).unwrap_err(),
        ConfigError::Invalid(_)
    ));
}

#[tokio::test]
async fn test_extract_runtime_config_from_manager() {
    let config = ConfigManager::new();
    config.add_dict_source(
        map(json!({
            "conductor": {
                "cache": {"ttl": "10m", "max_entries": 5},
                "circuit_breaker": {"failure_threshold": 2},
            }
        })),
        "dict",
        0,
    );
    config.load().await.unwrap();

    let runtime: ConductorConfig = config.extract("conductor").unwrap();
    assert_eq!(runtime.cache.ttl, Duration::from_secs(600));
    assert_eq!(runtime.cache.max_entries, 5);
    assert_eq!(runtime.circuit_breaker.failure_threshold, 2);
    assert_eq!(runtime.circuit_breaker.recovery_timeout, Duration::from_secs(60));

    let defaults: ConductorConfig = config.extract("absent").unwrap();
    assert_eq!(defaults, ConductorConfig::default());

    let err = config.extract::<u32>("conductor").unwrap_err();
    assert!(matches!(err, ConfigError::Deserialize { .. }));
}

#[test]
fn test_runtime_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "conductor.toml",
        r#"
[event_bus]
history_capacity = 50

[circuit_breaker]
failure_threshold = 3
recovery_timeout = "30s"

[validation]
strict = true

[logging]
level = "debug"
"#,
    );

    let config = ConductorConfig::from_file(&path).unwrap();
    assert_eq!(config.event_bus.history_capacity, 50);
    assert_eq!(config.circuit_breaker.failure_threshold, 3);
    assert_eq!(config.circuit_breaker.recovery_timeout, Duration::from_secs(30));
    assert!(config.validation.strict);
    assert!(config.validation.validate_input);
    assert_eq!(config.logging.tracing_level().unwrap(), tracing::Level::DEBUG);
    assert_eq!(config.cache, crate::middleware::CacheConfig::default());
}

#[test]
fn test_runtime_config_validation() {
    let dir = TempDir::new().unwrap();
    let zero = write(&dir, "zero.toml", "[cache]\nmax_entries = 0\n");
    assert!(matches!(
        ConductorConfig::from_file(&zero).unwrap_err(),
        ConfigError::Invalid(_)
    ));

    let mut config = ConductorConfig::default();
    assert!(config.validate().is_ok());
    config.logging.level = "loud".to_string();
    assert!(config.validate().is_err());
    config.logging.level = "warn".to_string();
    config.circuit_breaker.failure_threshold = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_runtime_config_load_reads_env() {
    unsafe {
        std::env::set_var("CONDUCTOR_CACHE__MAX_ENTRIES", "42");
    }
    let config = ConductorConfig::load().unwrap();
    assert_eq!(config.cache.max_entries, 42);
    unsafe {
        std::env::remove_var("CONDUCTOR_CACHE__MAX_ENTRIES");
    }
}
