//! Analytics event schema.
//!
//! An [`Event`] is the unit of work the ingress queue carries to the aggregation engine.
//! It is immutable once accepted: `properties` is left as raw [`serde_json::Value`] so the
//! aggregator can type-check individual lookups (`page`, `element`, `amount`) without the
//! crate committing to a fixed event schema.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AggregatorError;

/// The maximum number of events accepted in a single batch ingestion call.
pub const MAX_BATCH_SIZE: usize = 1000;

/// A single analytics event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Opaque event identifier. Auto-assigned if absent on ingest.
    #[serde(default = "Event::generate_id")]
    pub id: String,

    /// Event type, e.g. `"pageview"`, `"click"`, `"purchase"`. Required and non-empty.
    #[serde(rename = "type")]
    pub event_type: String,

    /// UTC instant the event occurred. Auto-assigned to "now" if absent on ingest.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Optional user identifier, used for unique-user aggregation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Optional session identifier, used for unique-session aggregation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Arbitrary, untyped event properties.
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

impl Event {
    fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Fills in a missing `id`/`timestamp` and rejects an empty `type`. Called once per
    /// event at the ingress boundary; the aggregator itself only ever sees normalized events.
    pub fn normalize(mut self) -> Result<Self, AggregatorError> {
        if self.event_type.trim().is_empty() {
            return Err(AggregatorError::BadRequest(
                "event type must not be empty".to_string(),
            ));
        }
        if self.id.trim().is_empty() {
            self.id = Self::generate_id();
        }
        Ok(self)
    }

    /// Non-empty `user_id`, per the "non-empty" admission rule used throughout §4.5.2.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|s| !s.is_empty())
    }

    /// Non-empty `session_id`.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|s| !s.is_empty())
    }

    /// Looks up a string-valued property, silently returning `None` on type mismatch.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        match self.properties.get(key) {
            Some(serde_json::Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Looks up a numeric property, silently returning `None` on type mismatch.
    pub fn property_f64(&self, key: &str) -> Option<f64> {
        match self.properties.get(key) {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }
}

/// Validates a batch size before any per-item processing; `[1, MAX_BATCH_SIZE]` inclusive.
pub fn validate_batch_size(len: usize) -> Result<(), AggregatorError> {
    if len == 0 || len > MAX_BATCH_SIZE {
        return Err(AggregatorError::BadRequest(format!(
            "batch size must be between 1 and {MAX_BATCH_SIZE}, got {len}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_fills_missing_id() {
        let event = Event {
            id: String::new(),
            event_type: "pageview".to_string(),
            timestamp: Utc::now(),
            user_id: None,
            session_id: None,
            properties: HashMap::new(),
        }
        .normalize()
        .unwrap();
        assert!(!event.id.is_empty());
    }

    #[test]
    fn normalize_rejects_empty_type() {
        let event = Event {
            id: "e1".to_string(),
            event_type: "   ".to_string(),
            timestamp: Utc::now(),
            user_id: None,
            session_id: None,
            properties: HashMap::new(),
        };
        assert!(matches!(
            event.normalize(),
            Err(AggregatorError::BadRequest(_))
        ));
    }

    #[test]
    fn property_lookups_skip_type_mismatches() {
        let mut properties = HashMap::new();
        properties.insert("page".to_string(), serde_json::json!("/home"));
        properties.insert("amount".to_string(), serde_json::json!(true));
        let event = Event {
            id: "e1".to_string(),
            event_type: "pageview".to_string(),
            timestamp: Utc::now(),
            user_id: None,
            session_id: None,
            properties,
        };
        assert_eq!(event.property_str("page"), Some("/home"));
        assert_eq!(event.property_f64("amount"), None);
        assert_eq!(event.property_str("missing"), None);
    }

    #[test]
    fn batch_size_boundaries() {
        assert!(validate_batch_size(0).is_err());
        assert!(validate_batch_size(1).is_ok());
        assert!(validate_batch_size(MAX_BATCH_SIZE).is_ok());
        assert!(validate_batch_size(MAX_BATCH_SIZE + 1).is_err());
    }
}
