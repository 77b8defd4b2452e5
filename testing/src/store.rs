//! In-memory [`StateStore`] for deterministic tests.

use chrono::{DateTime, Utc};
use prioritizer_core::correlation::TypeCorrelationKey;
use prioritizer_core::message::{MessageState, PrioritizationMessage};
use prioritizer_core::store::{StateStore, StateStoreError, StoreFuture};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory state store keyed by message id.
///
/// Mirrors the store-side responsibilities the pipeline relies on: the
/// expiry eligibility predicate (pre-completion state with an elapsed wait
/// window) and created-at ordering for correlation queries. Safe for
/// concurrent use from multiple workers.
#[derive(Default)]
pub struct InMemoryStateStore {
    records: Mutex<HashMap<String, PrioritizationMessage>>,
}

impl InMemoryStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing the pipeline.
    pub async fn insert(&self, message: PrioritizationMessage) {
        self.records
            .lock()
            .await
            .insert(message.id.clone(), message);
    }

    /// Snapshot of one record, if present.
    pub async fn get(&self, id: &str) -> Option<PrioritizationMessage> {
        self.records.lock().await.get(id).cloned()
    }

    /// Current state of one record, if present.
    pub async fn state_of(&self, id: &str) -> Option<MessageState> {
        self.records.lock().await.get(id).map(|m| m.state)
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

fn sorted_by_created_at(mut messages: Vec<PrioritizationMessage>) -> Vec<PrioritizationMessage> {
    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    messages
}

impl StateStore for InMemoryStateStore {
    fn save_message<'a>(&'a self, message: &'a PrioritizationMessage) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut records = self.records.lock().await;
            let mut stored = message.clone();
            stored.updated_at = Utc::now();
            records.insert(stored.id.clone(), stored);
            Ok(())
        })
    }

    fn get_messages<'a>(
        &'a self,
        ids: &'a [String],
    ) -> StoreFuture<'a, Vec<PrioritizationMessage>> {
        Box::pin(async move {
            let records = self.records.lock().await;
            Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
        })
    }

    fn set_messages_state<'a>(
        &'a self,
        ids: &'a [String],
        state: MessageState,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut records = self.records.lock().await;
            let now = Utc::now();
            for id in ids {
                if let Some(message) = records.get_mut(id) {
                    message.state = state;
                    message.updated_at = now;
                }
            }
            Ok(())
        })
    }

    fn set_message_state_and_error<'a>(
        &'a self,
        id: &'a str,
        state: MessageState,
        error: &'a str,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut records = self.records.lock().await;
            let message = records
                .get_mut(id)
                .ok_or_else(|| StateStoreError::MessageNotFound(id.to_string()))?;
            message.state = state;
            message.error = Some(error.to_string());
            message.updated_at = Utc::now();
            Ok(())
        })
    }

    fn update_message_state<'a>(
        &'a self,
        id: &'a str,
        state: MessageState,
    ) -> StoreFuture<'a, PrioritizationMessage> {
        Box::pin(async move {
            let mut records = self.records.lock().await;
            let message = records
                .get_mut(id)
                .ok_or_else(|| StateStoreError::MessageNotFound(id.to_string()))?;
            message.state = state;
            message.updated_at = Utc::now();
            Ok(message.clone())
        })
    }

    fn update_messages_state<'a>(
        &'a self,
        ids: &'a [String],
        state: MessageState,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut records = self.records.lock().await;
            let now = Utc::now();
            for id in ids {
                let message = records
                    .get_mut(id)
                    .ok_or_else(|| StateStoreError::MessageNotFound(id.clone()))?;
                message.state = state;
                message.updated_at = now;
            }
            Ok(())
        })
    }

    fn get_expiry_eligible_messages(
        &self,
        limit: usize,
    ) -> StoreFuture<'_, Vec<PrioritizationMessage>> {
        Box::pin(async move {
            let records = self.records.lock().await;
            let now = Utc::now();
            let eligible: Vec<PrioritizationMessage> = records
                .values()
                .filter(|m| !m.state.is_terminal() && m.expires_at < now)
                .cloned()
                .collect();
            let mut eligible = sorted_by_created_at(eligible);
            eligible.truncate(limit);
            Ok(eligible)
        })
    }

    fn get_correlated_messages<'a>(
        &'a self,
        key: &'a TypeCorrelationKey,
        states: &'a [MessageState],
    ) -> StoreFuture<'a, Vec<PrioritizationMessage>> {
        Box::pin(async move {
            let records = self.records.lock().await;
            let held: Vec<PrioritizationMessage> = records
                .values()
                .filter(|m| {
                    m.has_correlation()
                        && states.contains(&m.state)
                        && TypeCorrelationKey::for_message(m) == *key
                })
                .cloned()
                .collect();
            Ok(sorted_by_created_at(held))
        })
    }

    fn delete_messages_in_states<'a>(
        &'a self,
        states: &'a [MessageState],
        older_than: DateTime<Utc>,
    ) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let mut records = self.records.lock().await;
            let before = records.len();
            records.retain(|_, m| !(states.contains(&m.state) && m.updated_at < older_than));
            Ok((before - records.len()) as u64)
        })
    }
}
