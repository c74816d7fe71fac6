//! Subscription patterns
//!
//! A pattern is either an exact event name or a wildcard expression where `*`
//! matches any substring (including the empty string and dots). No other
//! character is special: `?` and `[` match themselves.

use super::error::EventError;

/// Compiled subscription pattern
#[derive(Debug, Clone)]
pub struct EventPattern {
    raw: String,
    glob: Option<glob::Pattern>,
}

impl EventPattern {
    /// Compile a pattern
    pub fn new(pattern: impl Into<String>) -> Result<Self, EventError> {
        let raw = pattern.into();
        if raw.is_empty() {
            return Err(EventError::InvalidPattern {
                pattern: raw,
                reason: "pattern cannot be empty".to_string(),
            });
        }

        let glob = if raw.contains('*') {
            // Runs of `*` mean the same as one; glob reserves `**` for paths
            let mut escaped = String::with_capacity(raw.len());
            for (i, literal) in raw.split('*').enumerate() {
                if i > 0 && !escaped.ends_with('*') {
                    escaped.push('*');
                }
                escaped.push_str(&glob::Pattern::escape(literal));
            }
            let compiled =
                glob::Pattern::new(&escaped).map_err(|e| EventError::InvalidPattern {
                    pattern: raw.clone(),
                    reason: e.to_string(),
                })?;
            Some(compiled)
        } else {
            None
        };

        Ok(Self { raw, glob })
    }

    /// Pattern text as subscribed
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern contains a wildcard
    pub fn is_wildcard(&self) -> bool {
        self.glob.is_some()
    }

    /// Check an event name against this pattern
    pub fn matches(&self, event_name: &str) -> bool {
        if self.raw == event_name {
            return true;
        }
        match &self.glob {
            Some(glob) => glob.matches(event_name),
            None => false,
        }
    }
}
