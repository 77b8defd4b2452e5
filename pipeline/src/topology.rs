//! Topology assembly: wiring stages, sweeps and sinks into one pipeline.
//!
//! Assembly is pure configuration logic with no runtime state of its own:
//! building several topologies from the same configuration yields fully
//! isolated instances (the state store being the only shared resource, by
//! contract).

use crate::aggregate::AggregateStage;
use crate::error::PipelineError;
use crate::output::OutputStage;
use crate::prioritize::PrioritizeStage;
use crate::sweep::{CleanSweep, ExpirySweep};
use prioritizer_core::aggregation::AggregationHandler;
use prioritizer_core::config::PrioritizationConfig;
use prioritizer_core::sink::MessageSink;
use prioritizer_core::store::StateStore;
use std::sync::Arc;

/// Stable string identifiers for the topology's nodes and edges, usable by
/// configuration and tooling.
pub mod names {
    /// Source node subscribing to the input topics.
    pub const SOURCE_INPUT: &str = "source-input";
    /// Prioritize stage node.
    pub const PROCESSOR_PRIORITIZE: &str = "prioritize";
    /// Aggregate stage node.
    pub const PROCESSOR_AGGREGATE: &str = "aggregate";
    /// Output stage node.
    pub const PROCESSOR_OUTPUT: &str = "output";
    /// Terminal sink edge to the output topic.
    pub const SINK_OUTPUT: &str = "output-sink";
    /// Sink edge to the expired topic.
    pub const SINK_EXPIRED: &str = "expired-sink";
}

/// One assembled pipeline instance: source → Prioritize → Aggregate →
/// Output, plus the two sweeps.
pub struct Topology {
    input_topics: Vec<String>,
    prioritize: PrioritizeStage,
    expiry: ExpirySweep,
    clean: CleanSweep,
}

impl Topology {
    /// Assemble a topology from one configuration and its collaborators.
    ///
    /// The output sink receives completed records from the Output stage and
    /// errored records straight from the Aggregate stage; the expired sink
    /// receives records reaped by the expiry sweep.
    #[must_use]
    pub fn build(
        config: &PrioritizationConfig,
        store: Arc<dyn StateStore>,
        handler: Arc<dyn AggregationHandler>,
        output_sink: Arc<dyn MessageSink>,
        expired_sink: Arc<dyn MessageSink>,
    ) -> Self {
        let input_topics = config.input_topics();
        tracing::info!(topics = ?input_topics, "assembling prioritization topology");

        let output = OutputStage::new(Arc::clone(&store), Arc::clone(&output_sink));
        let aggregate = AggregateStage::new(
            Arc::clone(&store),
            handler,
            output,
            Arc::clone(&output_sink),
        );
        let prioritize = PrioritizeStage::new(Arc::clone(&store), aggregate);
        let expiry = ExpirySweep::new(
            Arc::clone(&store),
            expired_sink,
            config.expiry_configuration.max_poll_record,
        );
        let clean = CleanSweep::new(store, config.clean_configuration.expired_records_hold_days);

        Self {
            input_topics,
            prioritize,
            expiry,
            clean,
        }
    }

    /// The input topics this topology's source subscribes to.
    #[must_use]
    pub fn input_topics(&self) -> &[String] {
        &self.input_topics
    }

    /// Feed one raw record payload to the Prioritize stage.
    ///
    /// # Errors
    ///
    /// See [`PrioritizeStage::process`].
    pub async fn handle_record(&self, payload: &[u8]) -> Result<(), PipelineError> {
        self.prioritize.process(payload).await
    }

    /// Fire one expiry sweep tick.
    ///
    /// # Errors
    ///
    /// See [`ExpirySweep::tick`].
    pub async fn expiry_tick(&self) -> Result<usize, PipelineError> {
        self.expiry.tick().await
    }

    /// Fire one clean sweep tick.
    ///
    /// # Errors
    ///
    /// See [`CleanSweep::tick`].
    pub async fn clean_tick(&self) -> Result<u64, PipelineError> {
        self.clean.tick().await
    }
}
