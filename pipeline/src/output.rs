//! Output stage: finalizes a message and forwards it for delivery.

use crate::error::PipelineError;
use prioritizer_core::message::MessageState;
use prioritizer_core::sink::MessageSink;
use prioritizer_core::store::StateStore;
use std::sync::Arc;

/// Transitions a record to `COMPLETED` and delivers it to the output sink.
pub struct OutputStage {
    store: Arc<dyn StateStore>,
    output_sink: Arc<dyn MessageSink>,
}

impl OutputStage {
    /// Wire the stage against the shared store and the output sink.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, output_sink: Arc<dyn MessageSink>) -> Self {
        Self { store, output_sink }
    }

    /// Finalize one message id.
    ///
    /// The id is assumed to exist in the store — every id reaching this
    /// stage was persisted by the Prioritize stage, so a missing record is
    /// a precondition violation surfacing as a store error.
    ///
    /// # Errors
    ///
    /// Propagates store and sink failures to the driver.
    pub async fn process(&self, id: &str) -> Result<(), PipelineError> {
        tracing::info!(id = %id, "received in output stage");
        let message = self
            .store
            .update_message_state(id, MessageState::Completed)
            .await?;
        self.output_sink.send(&message).await?;
        tracing::debug!(id = %id, "completed message delivered to output sink");
        Ok(())
    }
}
