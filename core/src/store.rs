//! State store boundary.
//!
//! Persistence of message records is out of core scope, but its call
//! contract is part of the pipeline boundary. Every stage mutates lifecycle
//! state exclusively through this trait; it is the only shared mutable
//! resource across stages and partitions, and implementations must support
//! safe concurrent bulk updates and queries from multiple workers.
//!
//! All calls are awaited to completion by the calling worker before it
//! proceeds to the next delivery — a slow store throttles that partition's
//! throughput by design rather than reordering it.
//!
//! # Implementations
//!
//! - `InMemoryStateStore` (in `prioritizer-testing`): deterministic testing
//! - Production deployments back this with their relational / document store

use crate::correlation::TypeCorrelationKey;
use crate::message::{MessageState, PrioritizationMessage};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors surfaced by state store operations.
///
/// Store unavailability is not specially recovered by the pipeline; it
/// propagates to the runtime driver, which leaves the offset uncommitted so
/// the substrate redelivers the record.
#[derive(Error, Debug)]
pub enum StateStoreError {
    /// No record exists for the given id.
    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// The backing store rejected or failed the operation.
    #[error("store operation failed: {0}")]
    OperationFailed(String),
}

/// Boxed future returned by [`StateStore`] operations.
pub type StoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, StateStoreError>> + Send + 'a>>;

/// Persistence contract for message lifecycle state.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so stages can hold the
/// store as `Arc<dyn StateStore>`.
pub trait StateStore: Send + Sync {
    /// Persist a message record, inserting or replacing by id.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::OperationFailed`] if the write fails.
    fn save_message<'a>(&'a self, message: &'a PrioritizationMessage) -> StoreFuture<'a, ()>;

    /// Fetch the current records for the given ids. Ids with no record are
    /// silently absent from the result.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::OperationFailed`] if the query fails.
    fn get_messages<'a>(&'a self, ids: &'a [String]) -> StoreFuture<'a, Vec<PrioritizationMessage>>;

    /// Bulk-set the state of every listed id in one direct update.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::OperationFailed`] if the update fails.
    fn set_messages_state<'a>(
        &'a self,
        ids: &'a [String],
        state: MessageState,
    ) -> StoreFuture<'a, ()>;

    /// Set one message's state together with the captured error text.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::MessageNotFound`] if the id is unknown.
    fn set_message_state_and_error<'a>(
        &'a self,
        id: &'a str,
        state: MessageState,
        error: &'a str,
    ) -> StoreFuture<'a, ()>;

    /// Transition one message's state and return the refreshed record.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::MessageNotFound`] if the id is unknown —
    /// for the Output stage this is a fatal precondition violation, since
    /// every id reaching it was persisted by the Prioritize stage.
    fn update_message_state<'a>(
        &'a self,
        id: &'a str,
        state: MessageState,
    ) -> StoreFuture<'a, PrioritizationMessage>;

    /// Bulk read-modify-write of every listed id's state, refreshing
    /// `updated_at` per record.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::MessageNotFound`] for the first unknown id.
    fn update_messages_state<'a>(
        &'a self,
        ids: &'a [String],
        state: MessageState,
    ) -> StoreFuture<'a, ()>;

    /// Up to `limit` records eligible for expiry: pre-completion state with
    /// an elapsed wait window, oldest first.
    ///
    /// A record already in [`MessageState::Expired`] (or any other terminal
    /// state) must never be returned, so repeated sweep firings never
    /// double-expire the same id.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::OperationFailed`] if the query fails.
    fn get_expiry_eligible_messages(
        &self,
        limit: usize,
    ) -> StoreFuture<'_, Vec<PrioritizationMessage>>;

    /// Records held for one correlation key in any of the given states,
    /// oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::OperationFailed`] if the query fails.
    fn get_correlated_messages<'a>(
        &'a self,
        key: &'a TypeCorrelationKey,
        states: &'a [MessageState],
    ) -> StoreFuture<'a, Vec<PrioritizationMessage>>;

    /// Delete records in any of the given states whose `updated_at` is
    /// older than the cutoff, returning how many were removed. The Clean
    /// sweep only ever passes terminal states.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::OperationFailed`] if the delete fails.
    fn delete_messages_in_states<'a>(
        &'a self,
        states: &'a [MessageState],
        older_than: DateTime<Utc>,
    ) -> StoreFuture<'a, u64>;
}
