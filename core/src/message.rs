//! Message record and lifecycle state machine.
//!
//! A [`PrioritizationMessage`] is created by the Prioritize stage from a raw
//! topic record and mutated only through the
//! [`StateStore`](crate::store::StateStore) as it moves through the pipeline.
//! The pipeline itself never deletes records; retention is the Clean sweep's
//! responsibility.
//!
//! # State Machine
//!
//! ```text
//! RECEIVED ──▶ AGGREGATED ──▶ COMPLETED
//!    │  ▲                        (terminal)
//!    ▼  │
//!   WAIT┘─────▶ EXPIRED  (terminal, via expiry sweep, any pre-completion state)
//!    │
//!    └────────▶ ERROR    (terminal, via aggregation failure)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a [`PrioritizationMessage`].
///
/// Serialized in SCREAMING_SNAKE_CASE (`"RECEIVED"`, `"WAIT"`, ...) to keep
/// the wire and store representation stable string identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageState {
    /// Persisted by the Prioritize stage, not yet resolved.
    Received,
    /// Held back waiting for correlation peers to arrive.
    Wait,
    /// Resolved by the Aggregate stage, pending finalization.
    Aggregated,
    /// Finalized and delivered to the output sink. Terminal.
    Completed,
    /// Reaped by the expiry sweep after its wait window elapsed. Terminal.
    Expired,
    /// Failed during aggregation; `error` carries the cause. Terminal.
    Error,
}

impl MessageState {
    /// Whether this state is terminal (no further transitions).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Expired | Self::Error)
    }

    /// The terminal states, in one place for retention queries.
    pub const TERMINAL: [Self; 3] = [Self::Completed, Self::Expired, Self::Error];

    /// Stable string identifier, matching the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Wait => "WAIT",
            Self::Aggregated => "AGGREGATED",
            Self::Completed => "COMPLETED",
            Self::Expired => "EXPIRED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message tracked by the prioritization pipeline.
///
/// The `id` is assigned by the producer and is the record's identity
/// everywhere: store primary key, transport key, and idempotency handle for
/// downstream consumers. `payload` is opaque to the pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizationMessage {
    /// Unique id assigned by the producer.
    pub id: String,
    /// Message classifier; part of the correlation key.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Comma-separated peer id list; `None` means no correlation.
    #[serde(default)]
    pub correlation_id: Option<String>,
    /// Current lifecycle state.
    #[serde(rename = "status")]
    pub state: MessageState,
    /// Opaque message body; never inspected by the pipeline.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Error text captured when the message entered [`MessageState::Error`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the producer created the message.
    pub created_at: DateTime<Utc>,
    /// Last state-store mutation time.
    pub updated_at: DateTime<Utc>,
    /// End of the allowed wait window; drives the store-side expiry predicate.
    pub expires_at: DateTime<Utc>,
}

impl PrioritizationMessage {
    /// Whether this message carries a non-empty correlation id list.
    #[must_use]
    pub fn has_correlation(&self) -> bool {
        self.correlation_id
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty())
    }
}

/// Extract the ids from a batch of messages, preserving order.
#[must_use]
pub fn ids(messages: &[PrioritizationMessage]) -> Vec<String> {
    messages.iter().map(|m| m.id.clone()).collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    fn message(state: MessageState) -> PrioritizationMessage {
        let now = Utc::now();
        PrioritizationMessage {
            id: "m1".to_string(),
            message_type: "alarm".to_string(),
            correlation_id: None,
            state,
            payload: serde_json::json!({"detail": "link down"}),
            error: None,
            created_at: now,
            updated_at: now,
            expires_at: now,
        }
    }

    #[test]
    fn terminal_states() {
        assert!(MessageState::Completed.is_terminal());
        assert!(MessageState::Expired.is_terminal());
        assert!(MessageState::Error.is_terminal());
        assert!(!MessageState::Received.is_terminal());
        assert!(!MessageState::Wait.is_terminal());
        assert!(!MessageState::Aggregated.is_terminal());
    }

    #[test]
    fn state_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&MessageState::Received).expect("serialize");
        assert_eq!(json, "\"RECEIVED\"");
        let back: MessageState = serde_json::from_str("\"AGGREGATED\"").expect("deserialize");
        assert_eq!(back, MessageState::Aggregated);
    }

    #[test]
    fn message_wire_field_names() {
        let json = serde_json::to_value(message(MessageState::Received)).expect("serialize");
        assert_eq!(json["type"], "alarm");
        assert_eq!(json["status"], "RECEIVED");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("error").is_none(), "error omitted when absent");
    }

    #[test]
    fn message_round_trips() {
        let original = message(MessageState::Wait);
        let json = serde_json::to_vec(&original).expect("serialize");
        let back: PrioritizationMessage = serde_json::from_slice(&json).expect("deserialize");
        assert_eq!(back, original);
    }

    #[test]
    fn has_correlation_ignores_blank() {
        let mut msg = message(MessageState::Received);
        assert!(!msg.has_correlation());
        msg.correlation_id = Some("  ".to_string());
        assert!(!msg.has_correlation());
        msg.correlation_id = Some("m2,m3".to_string());
        assert!(msg.has_correlation());
    }
}
