//! Canonical grouping key for correlated messages.
//!
//! Two messages belong to the same correlation group when they share a
//! `type` and the same correlation-id *set*, regardless of the original
//! ordering or whitespace of the list. [`TypeCorrelationKey`] captures that
//! by normalizing the list: split on commas, trim each token, sort
//! ascending, rejoin. Empty tokens are kept rather than filtered, so a
//! malformed list never silently collapses into a smaller group.
//!
//! The key is used only for grouping and store lookups; it is never a
//! record's identity.

use crate::message::PrioritizationMessage;
use std::fmt;

/// Grouping key: `(type, normalized correlation)`.
///
/// Construction is deterministic and side-effect free, safe to call
/// concurrently from any worker.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeCorrelationKey {
    /// The message `type` classifier.
    pub message_type: String,
    /// Comma-joined, trimmed, ascending-sorted correlation tokens.
    pub correlation: String,
}

impl TypeCorrelationKey {
    /// Build a key from a message type and its raw correlation id list.
    #[must_use]
    pub fn new(message_type: &str, correlation_id: &str) -> Self {
        Self {
            message_type: message_type.to_string(),
            correlation: normalize(correlation_id),
        }
    }

    /// Build the key for a message, using an empty correlation when absent.
    #[must_use]
    pub fn for_message(message: &PrioritizationMessage) -> Self {
        Self::new(
            &message.message_type,
            message.correlation_id.as_deref().unwrap_or(""),
        )
    }

    /// The individual member ids named by the normalized correlation list.
    #[must_use]
    pub fn member_ids(&self) -> Vec<&str> {
        self.correlation.split(',').collect()
    }
}

impl fmt::Display for TypeCorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.message_type, self.correlation)
    }
}

/// Normalize a raw correlation id list into its canonical form.
///
/// Tokens are trimmed but empty tokens are NOT filtered out.
#[must_use]
pub fn normalize(correlation_id: &str) -> String {
    let mut tokens: Vec<&str> = correlation_id.split(',').map(str::trim).collect();
    tokens.sort_unstable();
    tokens.join(",")
}
