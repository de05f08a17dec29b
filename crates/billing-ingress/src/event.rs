//! Provider event envelope and the fields handlers read from it.

use chrono::{DateTime, Datelike};
use serde::Deserialize;
use serde_json::Value;

use crate::error::IngressError;

/// Parsed webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Provider event id, the idempotency key.
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
    /// Unix seconds.
    #[serde(default)]
    pub created: Option<i64>,
}

/// Webhook event data.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The object that triggered the event.
    pub object: Value,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, IngressError> {
        serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse billing event payload");
            IngressError::InvalidPayload("malformed event envelope".to_string())
        })
    }

    fn object(&self) -> &Value {
        &self.data.object
    }

    fn missing(&self, field: &'static str) -> IngressError {
        IngressError::MissingField {
            event_id: self.id.clone(),
            field,
        }
    }

    pub fn object_has(&self, field: &str) -> bool {
        self.object().get(field).is_some_and(|v| !v.is_null())
    }

    pub fn str_field(&self, field: &'static str) -> Option<&str> {
        self.object().get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn require_str(&self, field: &'static str) -> Result<&str, IngressError> {
        self.str_field(field).ok_or_else(|| self.missing(field))
    }

    pub fn require_amount(&self, field: &'static str) -> Result<i64, IngressError> {
        self.object()
            .get(field)
            .and_then(Value::as_i64)
            .ok_or_else(|| self.missing(field))
    }

    /// Student the payment belongs to: `client_reference_id`, then
    /// `metadata.student_id`. Either may be a string or a number.
    pub fn student_id(&self) -> Option<i64> {
        let from = |v: &Value| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        self.object()
            .get("client_reference_id")
            .and_then(from)
            .or_else(|| self.object().pointer("/metadata/student_id").and_then(from))
    }

    pub fn require_student_id(&self) -> Result<i64, IngressError> {
        self.student_id().ok_or_else(|| self.missing("client_reference_id"))
    }

    /// Day of month of a unix timestamp field, or of the event itself.
    pub fn cycle_day(&self, field: &'static str) -> Option<i64> {
        self.object()
            .get(field)
            .and_then(Value::as_i64)
            .or(self.created)
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .map(|dt| i64::from(dt.day()))
    }
}
