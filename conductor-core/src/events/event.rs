//! Event message format

use super::error::EventError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Immutable, timestamped event
///
/// The name is validated at construction; an `Event` value with an empty name
/// cannot exist, so the bus never has to reject one at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent")]
pub struct Event {
    name: String,
    data: Map<String, Value>,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

impl Event {
    /// Create an event with an empty payload
    pub fn new(name: impl Into<String>) -> Result<Self, EventError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EventError::EmptyName);
        }
        Ok(Self {
            name,
            data: Map::new(),
            timestamp: Utc::now(),
            source: None,
            correlation_id: None,
        })
    }

    /// Create an event carrying a JSON object payload
    ///
    /// Non-object payloads are stored under a single `"value"` key.
    pub fn with_payload(name: impl Into<String>, payload: Value) -> Result<Self, EventError> {
        let mut event = Self::new(name)?;
        event.data = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Ok(event)
    }

    /// Add a payload entry
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Set the publishing component
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the correlation id used to tie related events together
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event payload
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Single payload entry
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Creation time
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Publishing component, if known
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Correlation id, if any
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }
}

#[derive(Deserialize)]
struct RawEvent {
    name: String,
    #[serde(default)]
    data: Map<String, Value>,
    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    correlation_id: Option<String>,
}

impl TryFrom<RawEvent> for Event {
    type Error = EventError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let mut event = Event::new(raw.name)?;
        event.data = raw.data;
        event.timestamp = raw.timestamp;
        event.source = raw.source;
        event.correlation_id = raw.correlation_id;
        Ok(event)
    }
}
