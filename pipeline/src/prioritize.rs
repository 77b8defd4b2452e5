//! Prioritize stage: entry point for every raw record.
//!
//! On receipt the stage deserializes the record, persists it at `RECEIVED`
//! — before any forwarding decision, establishing at-least-once
//! recoverability — and then either forwards it straight to the Aggregate
//! stage (no correlation) or runs the correlation-hold bookkeeping.
//!
//! # Correlation Hold
//!
//! Correlated messages form a wait-set keyed by
//! [`TypeCorrelationKey`]: the normalized correlation list names the member
//! ids the group expects. On each arrival the stage queries the store for
//! peers still held in `RECEIVED`/`WAIT`; once every expected id is present
//! the whole group is forwarded to the Aggregate stage, otherwise the held
//! records are parked in `WAIT`. Groups that never complete are reaped by
//! the expiry sweep.

use crate::aggregate::AggregateStage;
use crate::error::PipelineError;
use prioritizer_core::correlation::{self, TypeCorrelationKey};
use prioritizer_core::message::{self, MessageState, PrioritizationMessage};
use prioritizer_core::store::StateStore;
use std::collections::HashSet;
use std::sync::Arc;

/// Ingests raw records and decides immediate forward vs. correlation hold.
pub struct PrioritizeStage {
    store: Arc<dyn StateStore>,
    aggregate: AggregateStage,
}

impl PrioritizeStage {
    /// Wire the stage against the shared store and the downstream
    /// Aggregate stage.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, aggregate: AggregateStage) -> Self {
        Self { store, aggregate }
    }

    /// Handle one raw record payload.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MalformedRecord`] when the payload does not
    /// deserialize (fatal for that delivery, nothing was persisted), or
    /// propagates store/sink failures from downstream stages.
    pub async fn process(&self, payload: &[u8]) -> Result<(), PipelineError> {
        let mut message: PrioritizationMessage = serde_json::from_slice(payload)
            .map_err(|e| PipelineError::MalformedRecord(e.to_string()))?;
        tracing::info!(
            id = %message.id,
            message_type = %message.message_type,
            "received in prioritize stage"
        );

        message.state = MessageState::Received;
        if message.has_correlation() {
            // canonical form before persisting, so key lookups match
            message.correlation_id = message.correlation_id.as_deref().map(correlation::normalize);
        }
        self.store.save_message(&message).await?;

        if message.has_correlation() {
            self.correlate(&message).await
        } else {
            tracing::debug!(id = %message.id, "no correlation, forwarding to aggregate");
            self.aggregate.process(&message.id).await
        }
    }

    /// Match the message against previously held peers and release the
    /// group once every expected member has arrived.
    async fn correlate(&self, message: &PrioritizationMessage) -> Result<(), PipelineError> {
        let key = TypeCorrelationKey::for_message(message);
        let held = self
            .store
            .get_correlated_messages(&key, &[MessageState::Received, MessageState::Wait])
            .await?;
        let held_ids: HashSet<&str> = held.iter().map(|m| m.id.as_str()).collect();
        let satisfied = key.member_ids().iter().all(|id| held_ids.contains(id));

        if satisfied {
            let group = message::ids(&held).join(",");
            tracing::info!(key = %key, group = %group, "correlation satisfied, forwarding group");
            self.aggregate.process(&group).await
        } else {
            let wait_ids = message::ids(&held);
            tracing::debug!(
                key = %key,
                held = wait_ids.len(),
                expected = key.member_ids().len(),
                "correlation incomplete, holding group"
            );
            self.store
                .set_messages_state(&wait_ids, MessageState::Wait)
                .await?;
            Ok(())
        }
    }
}
