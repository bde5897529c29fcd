//! Event-type subscription patterns.
//!
//! An endpoint subscribes to events with a set of patterns. A pattern is
//! either an exact event name (`bio.created`), a wildcard suffix
//! (`bio.*`, matching any event that starts with `bio.`), or a lone `*`
//! matching every event.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A parsed event subscription pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EventPattern {
    /// Matches exactly one event type.
    Exact(String),
    /// Matches any event type starting with the stored prefix. The prefix
    /// includes the trailing dot (`bio.` for the pattern `bio.*`).
    Prefix(String),
    /// Matches every event type.
    Any,
}

impl EventPattern {
    /// Parse and validate a pattern string.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidPattern {
            pattern: raw.to_owned(),
            reason: reason.to_owned(),
        };

        if raw.is_empty() {
            return Err(invalid("pattern is empty"));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(invalid("pattern contains whitespace"));
        }
        if raw == "*" {
            return Ok(Self::Any);
        }

        if let Some(prefix) = raw.strip_suffix(".*") {
            if prefix.is_empty() {
                return Err(invalid("wildcard needs a prefix before `.*`"));
            }
            if prefix.contains('*') {
                return Err(invalid("`*` is only allowed as the final segment"));
            }
            return Ok(Self::Prefix(format!("{prefix}.")));
        }

        if raw.contains('*') {
            return Err(invalid("`*` is only allowed as the final segment"));
        }
        Ok(Self::Exact(raw.to_owned()))
    }

    /// Whether this pattern matches the given event type.
    #[must_use]
    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            Self::Exact(name) => name == event_type,
            Self::Prefix(prefix) => event_type.starts_with(prefix.as_str()),
            Self::Any => true,
        }
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(name) => f.write_str(name),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
            Self::Any => f.write_str("*"),
        }
    }
}

impl FromStr for EventPattern {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EventPattern {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EventPattern> for String {
    fn from(pattern: EventPattern) -> Self {
        pattern.to_string()
    }
}

/// Returns `true` if any pattern in the set matches `event_type`.
#[must_use]
pub fn matches_any(patterns: &[EventPattern], event_type: &str) -> bool {
    patterns.iter().any(|p| p.matches(event_type))
}

/// Validate an event type name as emitted by the application.
pub fn validate_event_type(event_type: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidEventType {
        event_type: event_type.to_owned(),
        reason: reason.to_owned(),
    };
    if event_type.is_empty() {
        return Err(invalid("event type is empty"));
    }
    if event_type.chars().any(char::is_whitespace) {
        return Err(invalid("event type contains whitespace"));
    }
    if event_type.contains('*') {
        return Err(invalid("event type must not contain wildcards"));
    }
    Ok(())
}
