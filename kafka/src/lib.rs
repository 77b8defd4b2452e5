//! Kafka runtime driver for the message prioritization pipeline.
//!
//! This crate starts an assembled
//! [`Topology`](prioritizer_pipeline::Topology) against a Kafka-compatible
//! partitioned log (Kafka, Redpanda, MSK, ...) using rdkafka:
//!
//! - a [`KafkaMessageSink`] per terminal edge, publishing records as JSON
//!   with the message id as the transport key
//! - a [`PrioritizationRuntime`] owning one worker task that interleaves
//!   record deliveries with the wall-clock sweep ticks
//!
//! # Delivery Semantics
//!
//! **At-least-once** with manual offset commits:
//! - Offsets are committed only AFTER a record is fully processed; a crash
//!   before commit redelivers the record, so downstream consumers
//!   deduplicate by message id
//! - Malformed records are logged and committed — redelivery cannot repair
//!   a payload that does not deserialize
//! - Store or sink failures leave the offset uncommitted so the substrate
//!   redelivers
//! - Ordering is guaranteed within a partition: the worker awaits each
//!   record (and each sweep tick) to completion before the next delivery
//!
//! # Shutdown
//!
//! [`PrioritizationRuntime::shutdown`] signals the worker, which stops both
//! sweep schedules and lets any in-flight record finish before the consumer
//! is dropped — a sweep never fires against a torn-down processing context.
//!
//! # Example
//!
//! ```no_run
//! use prioritizer_kafka::PrioritizationRuntime;
//! # async fn example(
//! #     config: prioritizer_core::config::PrioritizationConfig,
//! #     store: std::sync::Arc<dyn prioritizer_core::store::StateStore>,
//! #     handler: std::sync::Arc<dyn prioritizer_core::aggregation::AggregationHandler>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = PrioritizationRuntime::builder()
//!     .brokers("localhost:9092")
//!     .consumer_group("prioritizer")
//!     .start(config, store, handler)?;
//!
//! // ... serve until shutdown is requested ...
//! runtime.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use futures::StreamExt;
use prioritizer_core::aggregation::AggregationHandler;
use prioritizer_core::config::PrioritizationConfig;
use prioritizer_core::message::PrioritizationMessage;
use prioritizer_core::sink::{MessageSink, SinkError, SinkFuture};
use prioritizer_core::store::StateStore;
use prioritizer_pipeline::Topology;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Errors raised while starting or stopping the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Could not create the producer or consumer client.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Could not subscribe to the input topics.
    #[error("subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe.
        topics: Vec<String>,
        /// The reason for failure.
        reason: String,
    },

    /// The worker task did not stop cleanly.
    #[error("shutdown failed: {0}")]
    ShutdownFailed(String),
}

/// Terminal sink publishing records to one Kafka topic.
///
/// Records are serialized as JSON; the message id is the transport key, so
/// all lifecycle records of one message land on the same partition.
pub struct KafkaMessageSink {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaMessageSink {
    /// Create a sink over an existing producer.
    #[must_use]
    pub const fn new(producer: FutureProducer, topic: String, timeout: Duration) -> Self {
        Self {
            producer,
            topic,
            timeout,
        }
    }
}

impl MessageSink for KafkaMessageSink {
    fn send<'a>(&'a self, message: &'a PrioritizationMessage) -> SinkFuture<'a> {
        Box::pin(async move {
            let payload =
                serde_json::to_vec(message).map_err(|e| SinkError::SerializationFailed {
                    id: message.id.clone(),
                    reason: e.to_string(),
                })?;
            let record = FutureRecord::to(&self.topic)
                .payload(&payload)
                .key(message.id.as_bytes());

            match self.producer.send(record, Timeout::After(self.timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %self.topic,
                        partition,
                        offset,
                        id = %message.id,
                        state = %message.state,
                        "record delivered"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => Err(SinkError::DeliveryFailed {
                    id: message.id.clone(),
                    reason: kafka_error.to_string(),
                }),
            }
        })
    }
}

/// Builder for a [`PrioritizationRuntime`].
#[derive(Default)]
pub struct PrioritizationRuntimeBuilder {
    brokers: Option<String>,
    consumer_group: Option<String>,
    auto_offset_reset: Option<String>,
    producer_acks: Option<String>,
    send_timeout: Option<Duration>,
}

impl PrioritizationRuntimeBuilder {
    /// Set the broker addresses (comma-separated).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the consumer group ID. If not set, a group is derived from the
    /// sorted input topics.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Set where new consumer groups start reading (default: "latest").
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Set the producer acknowledgment mode: "0", "1" or "all" (default: "1").
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set the producer send timeout (default: 5 seconds).
    #[must_use]
    pub const fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Assemble the topology and start consuming.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ConnectionFailed`] if the clients cannot be
    /// created, or [`RuntimeError::SubscriptionFailed`] if subscribing to
    /// the input topics fails.
    pub fn start(
        self,
        config: PrioritizationConfig,
        store: Arc<dyn StateStore>,
        handler: Arc<dyn AggregationHandler>,
    ) -> Result<PrioritizationRuntime, RuntimeError> {
        let brokers = self
            .brokers
            .ok_or_else(|| RuntimeError::ConnectionFailed("brokers not configured".to_string()))?;
        let send_timeout = self.send_timeout.unwrap_or(Duration::from_secs(5));

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", self.producer_acks.as_deref().unwrap_or("1"))
            .create()
            .map_err(|e| {
                RuntimeError::ConnectionFailed(format!("failed to create producer: {e}"))
            })?;

        let output_sink = Arc::new(KafkaMessageSink::new(
            producer.clone(),
            config.output_topic.clone(),
            send_timeout,
        ));
        let expired_sink = Arc::new(KafkaMessageSink::new(
            producer,
            config.expired_topic.clone(),
            send_timeout,
        ));
        let topology = Topology::build(&config, store, handler, output_sink, expired_sink);
        let topics = topology.input_topics().to_vec();

        let consumer_group = self.consumer_group.unwrap_or_else(|| {
            let mut sorted = topics.clone();
            sorted.sort();
            format!("prioritizer-{}", sorted.join("-"))
        });

        // manual commits for at-least-once delivery
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("group.id", &consumer_group)
            .set("enable.auto.commit", "false")
            .set(
                "auto.offset.reset",
                self.auto_offset_reset.as_deref().unwrap_or("latest"),
            )
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| RuntimeError::SubscriptionFailed {
                topics: topics.clone(),
                reason: format!("failed to create consumer: {e}"),
            })?;

        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topic_refs)
            .map_err(|e| RuntimeError::SubscriptionFailed {
                topics: topics.clone(),
                reason: format!("failed to subscribe: {e}"),
            })?;

        tracing::info!(
            topics = ?topics,
            consumer_group = %consumer_group,
            brokers = %brokers,
            "prioritization runtime starting"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let expiry_every = config.expiry_configuration.frequency();
        let clean_every = config.clean_configuration.hold_duration();
        let worker = tokio::spawn(run_worker(
            consumer,
            topology,
            expiry_every,
            clean_every,
            shutdown_rx,
        ));

        Ok(PrioritizationRuntime {
            shutdown_tx,
            worker,
        })
    }
}

/// Handle to a running prioritization topology.
pub struct PrioritizationRuntime {
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl PrioritizationRuntime {
    /// Create a new builder for configuring the runtime.
    #[must_use]
    pub fn builder() -> PrioritizationRuntimeBuilder {
        PrioritizationRuntimeBuilder::default()
    }

    /// Stop the topology: sweep schedules are cancelled first, any in-flight
    /// record completes, then the consumer is closed.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ShutdownFailed`] if the worker task panicked
    /// or was cancelled.
    pub async fn shutdown(self) -> Result<(), RuntimeError> {
        let _ = self.shutdown_tx.send(true);
        self.worker
            .await
            .map_err(|e| RuntimeError::ShutdownFailed(e.to_string()))
    }
}

/// The partition worker: one record or one sweep tick at a time, awaited to
/// completion before the next delivery.
async fn run_worker(
    consumer: StreamConsumer,
    topology: Topology,
    expiry_every: Duration,
    clean_every: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // intervals start one period out so a fresh topology doesn't sweep
    // before it has consumed anything
    let mut expiry = interval_at(Instant::now() + expiry_every, expiry_every);
    expiry.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut clean = interval_at(Instant::now() + clean_every, clean_every);
    clean.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut stream = consumer.stream();
    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                tracing::info!("shutdown requested, stopping worker");
                break;
            }
            _ = expiry.tick() => {
                if let Err(e) = topology.expiry_tick().await {
                    tracing::error!(error = %e, "expiry sweep failed, retrying next firing");
                }
            }
            _ = clean.tick() => {
                if let Err(e) = topology.clean_tick().await {
                    tracing::error!(error = %e, "clean sweep failed, retrying next firing");
                }
            }
            delivery = stream.next() => {
                match delivery {
                    Some(Ok(record)) => handle_delivery(&consumer, &topology, &record).await,
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "failed to receive record");
                    }
                    None => {
                        tracing::warn!("consumer stream ended, stopping worker");
                        break;
                    }
                }
            }
        }
    }

    // sweep schedules are cancelled before the consumer closes
    drop(expiry);
    drop(clean);
    drop(stream);
    drop(consumer);
    tracing::info!("prioritization worker exited");
}

/// Process one delivery and commit its offset only on success.
async fn handle_delivery(
    consumer: &StreamConsumer,
    topology: &Topology,
    record: &BorrowedMessage<'_>,
) {
    let Some(payload) = record.payload() else {
        tracing::warn!(
            topic = record.topic(),
            partition = record.partition(),
            offset = record.offset(),
            "record has no payload, skipping"
        );
        commit(consumer, record);
        return;
    };

    match topology.handle_record(payload).await {
        Ok(()) => commit(consumer, record),
        Err(err) if err.is_permanent() => {
            // redelivery cannot repair a malformed payload
            tracing::error!(
                topic = record.topic(),
                partition = record.partition(),
                offset = record.offset(),
                error = %err,
                "dropping unprocessable record"
            );
            commit(consumer, record);
        }
        Err(err) => {
            tracing::error!(
                topic = record.topic(),
                partition = record.partition(),
                offset = record.offset(),
                error = %err,
                "record processing failed, leaving offset uncommitted for redelivery"
            );
        }
    }
}

fn commit(consumer: &StreamConsumer, record: &BorrowedMessage<'_>) {
    if let Err(e) = consumer.commit_message(record, CommitMode::Async) {
        tracing::warn!(
            topic = record.topic(),
            partition = record.partition(),
            offset = record.offset(),
            error = %e,
            "failed to commit offset (record may be redelivered)"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_handle_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<PrioritizationRuntime>();
        assert_sync::<PrioritizationRuntime>();
        assert_send::<KafkaMessageSink>();
        assert_sync::<KafkaMessageSink>();
    }

    #[test]
    fn builder_default_works() {
        let _builder = PrioritizationRuntime::builder();
    }

    #[test]
    fn builder_requires_brokers() {
        let result = PrioritizationRuntime::builder().start(
            sample_config(),
            Arc::new(NoopStore),
            Arc::new(prioritizer_core::aggregation::IdentityAggregation),
        );
        assert!(matches!(result, Err(RuntimeError::ConnectionFailed(_))));
    }

    fn sample_config() -> PrioritizationConfig {
        use prioritizer_core::config::{CleanConfig, ExpiryConfig};
        PrioritizationConfig {
            input_topic_selector: "prioritize-input".to_string(),
            output_topic: "prioritize-output".to_string(),
            expired_topic: "prioritize-expired".to_string(),
            expiry_configuration: ExpiryConfig {
                max_poll_record: 100,
                frequency_milli: 1_000,
            },
            clean_configuration: CleanConfig {
                expired_records_hold_days: 1,
            },
        }
    }

    struct NoopStore;

    impl StateStore for NoopStore {
        fn save_message<'a>(
            &'a self,
            _message: &'a PrioritizationMessage,
        ) -> prioritizer_core::store::StoreFuture<'a, ()> {
            Box::pin(async { Ok(()) })
        }

        fn get_messages<'a>(
            &'a self,
            _ids: &'a [String],
        ) -> prioritizer_core::store::StoreFuture<'a, Vec<PrioritizationMessage>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn set_messages_state<'a>(
            &'a self,
            _ids: &'a [String],
            _state: prioritizer_core::message::MessageState,
        ) -> prioritizer_core::store::StoreFuture<'a, ()> {
            Box::pin(async { Ok(()) })
        }

        fn set_message_state_and_error<'a>(
            &'a self,
            id: &'a str,
            _state: prioritizer_core::message::MessageState,
            _error: &'a str,
        ) -> prioritizer_core::store::StoreFuture<'a, ()> {
            let id = id.to_string();
            Box::pin(async move {
                Err(prioritizer_core::store::StateStoreError::MessageNotFound(id))
            })
        }

        fn update_message_state<'a>(
            &'a self,
            id: &'a str,
            _state: prioritizer_core::message::MessageState,
        ) -> prioritizer_core::store::StoreFuture<'a, PrioritizationMessage> {
            let id = id.to_string();
            Box::pin(async move {
                Err(prioritizer_core::store::StateStoreError::MessageNotFound(id))
            })
        }

        fn update_messages_state<'a>(
            &'a self,
            _ids: &'a [String],
            _state: prioritizer_core::message::MessageState,
        ) -> prioritizer_core::store::StoreFuture<'a, ()> {
            Box::pin(async { Ok(()) })
        }

        fn get_expiry_eligible_messages(
            &self,
            _limit: usize,
        ) -> prioritizer_core::store::StoreFuture<'_, Vec<PrioritizationMessage>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn get_correlated_messages<'a>(
            &'a self,
            _key: &'a prioritizer_core::correlation::TypeCorrelationKey,
            _states: &'a [prioritizer_core::message::MessageState],
        ) -> prioritizer_core::store::StoreFuture<'a, Vec<PrioritizationMessage>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn delete_messages_in_states<'a>(
            &'a self,
            _states: &'a [prioritizer_core::message::MessageState],
            _older_than: chrono::DateTime<chrono::Utc>,
        ) -> prioritizer_core::store::StoreFuture<'a, u64> {
            Box::pin(async { Ok(0) })
        }
    }
}
