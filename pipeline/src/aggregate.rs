//! Aggregate stage: resolves a correlation group to one outcome.
//!
//! Single-member groups pass straight through to the Output stage; the
//! aggregation hook is only invoked for groups of two or more. Hook
//! failures are isolated per member: every member is transitioned to
//! `ERROR` and routed directly to the terminal sink, and a secondary
//! failure while handling one member never blocks the others.
//!
//! Post-condition: every id in an input group ends in `AGGREGATED` or
//! `ERROR` after this stage runs, never left `RECEIVED`.

use crate::error::PipelineError;
use crate::output::OutputStage;
use prioritizer_core::aggregation::AggregationHandler;
use prioritizer_core::message::{MessageState, PrioritizationMessage};
use prioritizer_core::sink::MessageSink;
use prioritizer_core::store::StateStore;
use std::sync::Arc;

/// Resolves comma-separated member id groups via the pluggable hook.
pub struct AggregateStage {
    store: Arc<dyn StateStore>,
    handler: Arc<dyn AggregationHandler>,
    output: OutputStage,
    /// Terminal sink for errored members, bypassing the Output stage.
    error_sink: Arc<dyn MessageSink>,
}

impl AggregateStage {
    /// Wire the stage against the shared store, the deployment's
    /// aggregation hook, the downstream Output stage and the terminal sink
    /// used for errored members.
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        handler: Arc<dyn AggregationHandler>,
        output: OutputStage,
        error_sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            store,
            handler,
            output,
            error_sink,
        }
    }

    /// Resolve one group given as a comma-separated list of member ids.
    ///
    /// # Errors
    ///
    /// Propagates store/sink failures from the success path. A hook failure
    /// is recovered here and never escapes this stage.
    pub async fn process(&self, group: &str) -> Result<(), PipelineError> {
        tracing::info!(group = %group, "received in aggregate stage");
        let ids: Vec<String> = group.split(',').map(|s| s.trim().to_string()).collect();

        if let [single] = ids.as_slice() {
            // single-member groups are a no-op pass-through, hook not invoked
            return self.output.process(single).await;
        }

        match self.handler.handle(&ids).await {
            Ok(forward) => {
                // every member is AGGREGATED before Output completes any of them
                self.store
                    .set_messages_state(&ids, MessageState::Aggregated)
                    .await?;
                for id in &forward {
                    self.output.process(id).await?;
                }
                Ok(())
            }
            Err(err) => {
                let error_text = format!("failed in aggregate for group({group}): {err}");
                tracing::error!(group = %group, error = %err, "aggregation hook failed");
                let stored = self.store.get_messages(&ids).await?;
                for message in &stored {
                    if let Err(member_err) = self.fail_member(message, &error_text).await {
                        tracing::error!(
                            id = %message.id,
                            error = %member_err,
                            "failed to mark/route errored member, skipping"
                        );
                    }
                }
                Ok(())
            }
        }
    }

    /// Transition one member to `ERROR` and deliver it to the terminal sink.
    async fn fail_member(
        &self,
        message: &PrioritizationMessage,
        error_text: &str,
    ) -> Result<(), PipelineError> {
        self.store
            .set_message_state_and_error(&message.id, MessageState::Error, error_text)
            .await?;
        let mut errored = message.clone();
        errored.state = MessageState::Error;
        errored.error = Some(error_text.to_string());
        self.error_sink.send(&errored).await?;
        Ok(())
    }
}
