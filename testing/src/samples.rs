//! Builders for representative message fixtures.
//!
//! Mirrors the wire shapes the pipeline ingests: `raw_record` yields the
//! JSON bytes a producer would publish, the other builders yield stored
//! records for seeding the in-memory store.

use chrono::{Duration, Utc};
use prioritizer_core::message::{MessageState, PrioritizationMessage};

/// Default wait window the fixtures allow before expiry.
const WAIT_WINDOW_DAYS: i64 = 3;

/// A freshly received message with the default wait window.
#[must_use]
pub fn message(
    id: &str,
    message_type: &str,
    correlation_id: Option<&str>,
) -> PrioritizationMessage {
    let now = Utc::now();
    PrioritizationMessage {
        id: id.to_string(),
        message_type: message_type.to_string(),
        correlation_id: correlation_id.map(ToString::to_string),
        state: MessageState::Received,
        payload: serde_json::json!({ "body": format!("sample payload for {id}") }),
        error: None,
        created_at: now,
        updated_at: now,
        expires_at: now + Duration::days(WAIT_WINDOW_DAYS),
    }
}

/// A message whose wait window already elapsed, eligible for the expiry sweep.
#[must_use]
pub fn expired_message(id: &str, message_type: &str) -> PrioritizationMessage {
    let mut msg = message(id, message_type, None);
    msg.created_at = Utc::now() - Duration::days(WAIT_WINDOW_DAYS + 1);
    msg.expires_at = Utc::now() - Duration::days(1);
    msg
}

/// Raw JSON record bytes as a producer would publish them.
///
/// # Panics
///
/// Serialization of the fixture message cannot fail.
#[must_use]
#[allow(clippy::expect_used)]
pub fn raw_record(id: &str, message_type: &str, correlation_id: Option<&str>) -> Vec<u8> {
    serde_json::to_vec(&message(id, message_type, correlation_id))
        .expect("fixture message always serializes")
}

/// A batch of messages sharing one correlation group: each carries the full
/// comma-separated member id list.
#[must_use]
pub fn correlated_group(message_type: &str, ids: &[&str]) -> Vec<PrioritizationMessage> {
    let correlation = ids.join(",");
    ids.iter()
        .map(|id| message(id, message_type, Some(&correlation)))
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn raw_record_deserializes_back() {
        let bytes = raw_record("x1", "alarm", None);
        let msg: PrioritizationMessage =
            serde_json::from_slice(&bytes).expect("round trip");
        assert_eq!(msg.id, "x1");
        assert_eq!(msg.state, MessageState::Received);
    }

    #[test]
    fn correlated_group_shares_member_list() {
        let group = correlated_group("alarm", &["m1", "m2"]);
        assert_eq!(group.len(), 2);
        assert_eq!(group[0].correlation_id.as_deref(), Some("m1,m2"));
        assert_eq!(group[1].correlation_id.as_deref(), Some("m1,m2"));
    }
}
