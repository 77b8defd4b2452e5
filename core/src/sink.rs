//! Terminal delivery sinks.
//!
//! A [`MessageSink`] is one named edge out of the topology: the output sink
//! receives completed and errored records, the expired sink receives records
//! reaped by the expiry sweep. Production sinks publish to a topic; the
//! testing crate provides a recording sink.
//!
//! Sends carry at-least-once semantics: a stage writes to the state store
//! first and forwards second, so a crash between the two re-forwards the
//! record on redelivery. Downstream consumers deduplicate by message id.

use crate::message::PrioritizationMessage;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors surfaced by sink deliveries.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The record could not be delivered to the underlying transport.
    #[error("delivery failed for message '{id}': {reason}")]
    DeliveryFailed {
        /// Id of the record that failed to deliver.
        id: String,
        /// Transport-level failure cause.
        reason: String,
    },

    /// The record could not be serialized for the wire.
    #[error("serialization failed for message '{id}': {reason}")]
    SerializationFailed {
        /// Id of the record that failed to serialize.
        id: String,
        /// Serializer failure cause.
        reason: String,
    },
}

/// Boxed future returned by [`MessageSink::send`].
pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;

/// One terminal delivery edge of the topology.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so a topology can hold its
/// sinks as `Arc<dyn MessageSink>`.
pub trait MessageSink: Send + Sync {
    /// Deliver one finalized record.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if serialization or transport delivery fails.
    fn send<'a>(&'a self, message: &'a PrioritizationMessage) -> SinkFuture<'a>;
}
