//! Merging, interpolation and dotted-path access over JSON maps

use super::error::ConfigError;
use super::provider::ConfigMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

static ENV_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Merge `source` into `target`; `source` wins
///
/// Objects present on both sides merge recursively. Any other value in
/// `source` replaces the target value wholesale.
pub fn deep_merge(target: &mut ConfigMap, source: ConfigMap) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

/// Substitute `${VAR}` and `$VAR` references in every string
///
/// `lookup` resolves a variable name; unresolved references stay verbatim.
pub fn interpolate<F>(value: &mut Value, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(text) => {
            if let Some(replaced) = interpolate_str(text, lookup) {
                *text = replaced;
            }
        }
        Value::Object(map) => map.values_mut().for_each(|v| interpolate(v, lookup)),
        Value::Array(items) => items.iter_mut().for_each(|v| interpolate(v, lookup)),
        _ => {}
    }
}

fn interpolate_str<F>(text: &str, lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if !text.contains('$') {
        return None;
    }
    let replaced = ENV_REFERENCE.replace_all(text, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        lookup(name).unwrap_or_else(|| caps[0].to_string())
    });
    Some(replaced.into_owned())
}

/// Look up a dotted path such as `database.replicas.0.host`
///
/// Numeric segments index into arrays.
pub fn get_path<'a>(root: &'a ConfigMap, key: &str) -> Option<&'a Value> {
    let mut segments = key.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write a dotted path, creating intermediate objects
///
/// Fails if an intermediate segment holds something other than an object.
pub fn set_path(root: &mut ConfigMap, key: &str, value: Value) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidKey {
        key: key.to_string(),
        reason,
    };
    if key.is_empty() || key.split('.').any(str::is_empty) {
        return Err(invalid("empty path segment".to_string()));
    }

    let segments: Vec<&str> = key.split('.').collect();
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| invalid("empty key".to_string()))?;

    let mut current = root;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(ConfigMap::new()));
        current = match entry {
            Value::Object(map) => map,
            other => {
                return Err(invalid(format!(
                    "'{}' holds a {} and cannot contain keys",
                    segment,
                    kind_of(other)
                )));
            }
        };
    }
    current.insert(last.to_string(), value);
    Ok(())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
