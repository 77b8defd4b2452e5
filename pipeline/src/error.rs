//! Pipeline error taxonomy.

use prioritizer_core::sink::SinkError;
use prioritizer_core::store::StateStoreError;
use thiserror::Error;

/// Errors escaping a pipeline stage to the runtime driver.
///
/// Aggregation-hook failures never appear here: the Aggregate stage
/// recovers them per member by transitioning the records to `ERROR` and
/// routing them to the terminal sink.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The raw record payload could not be deserialized. Fatal for that
    /// single delivery — no valid id exists to track, and no state was
    /// written. Redelivery cannot repair it.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// A state store call failed; the driver leaves the offset uncommitted
    /// so the substrate redelivers.
    #[error(transparent)]
    Store(#[from] StateStoreError),

    /// A terminal sink delivery failed; handled like a store failure.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl PipelineError {
    /// Whether this failure is permanent for the delivery that caused it.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::MalformedRecord(_))
    }
}
