//! End-to-end tests for the prioritization topology over the in-memory
//! state store.

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use prioritizer_core::aggregation::{
    AggregationError, AggregationFuture, AggregationHandler, IdentityAggregation,
};
use prioritizer_core::config::{CleanConfig, ExpiryConfig, PrioritizationConfig};
use prioritizer_core::message::{MessageState, PrioritizationMessage};
use prioritizer_core::sink::{MessageSink, SinkFuture};
use prioritizer_core::store::StateStore;
use prioritizer_pipeline::{PipelineError, Topology};
use prioritizer_testing::{InMemoryStateStore, RecordingSink, samples};
use std::sync::Arc;
use tokio::sync::Mutex;

fn test_config() -> PrioritizationConfig {
    PrioritizationConfig {
        input_topic_selector: "prioritize-input".to_string(),
        output_topic: "prioritize-output".to_string(),
        expired_topic: "prioritize-expired".to_string(),
        expiry_configuration: ExpiryConfig {
            max_poll_record: 100,
            frequency_milli: 1_000,
        },
        clean_configuration: CleanConfig {
            expired_records_hold_days: 5,
        },
    }
}

/// Aggregation hook that records every invocation and forwards unchanged.
#[derive(Default)]
struct CountingHandler {
    calls: Mutex<Vec<Vec<String>>>,
}

impl AggregationHandler for CountingHandler {
    fn handle<'a>(&'a self, ids: &'a [String]) -> AggregationFuture<'a> {
        Box::pin(async move {
            self.calls.lock().await.push(ids.to_vec());
            Ok(ids.to_vec())
        })
    }
}

/// Aggregation hook that always fails.
struct FailingHandler;

impl AggregationHandler for FailingHandler {
    fn handle<'a>(&'a self, _ids: &'a [String]) -> AggregationFuture<'a> {
        Box::pin(async move { Err(AggregationError::new("boom")) })
    }
}

struct Fixture {
    store: Arc<InMemoryStateStore>,
    output: Arc<RecordingSink>,
    expired: Arc<RecordingSink>,
    topology: Topology,
}

fn fixture(handler: Arc<dyn AggregationHandler>) -> Fixture {
    let store = Arc::new(InMemoryStateStore::new());
    let output = Arc::new(RecordingSink::new());
    let expired = Arc::new(RecordingSink::new());
    let topology = Topology::build(
        &test_config(),
        Arc::clone(&store) as Arc<dyn StateStore>,
        handler,
        Arc::clone(&output) as Arc<dyn MessageSink>,
        Arc::clone(&expired) as Arc<dyn MessageSink>,
    );
    Fixture {
        store,
        output,
        expired,
        topology,
    }
}

#[tokio::test]
async fn uncorrelated_message_completes_end_to_end() {
    let fx = fixture(Arc::new(IdentityAggregation));

    fx.topology
        .handle_record(&samples::raw_record("x1", "alarm", None))
        .await
        .expect("record handled");

    assert_eq!(fx.store.state_of("x1").await, Some(MessageState::Completed));
    assert_eq!(fx.output.ids().await, vec!["x1"], "exactly one delivery");
    assert!(fx.expired.is_empty().await);
}

#[tokio::test]
async fn no_correlation_message_reaches_output_unchanged() {
    let fx = fixture(Arc::new(IdentityAggregation));
    let original: PrioritizationMessage =
        serde_json::from_slice(&samples::raw_record("x2", "alarm", Some("")))
            .expect("fixture deserializes");

    fx.topology
        .handle_record(&samples::raw_record("x2", "alarm", Some("")))
        .await
        .expect("record handled");

    let sent = fx.output.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, original.id);
    assert_eq!(sent[0].payload, original.payload);
}

#[tokio::test]
async fn single_member_group_skips_aggregation_hook() {
    let handler = Arc::new(CountingHandler::default());
    let fx = fixture(Arc::clone(&handler) as Arc<dyn AggregationHandler>);

    fx.topology
        .handle_record(&samples::raw_record("m1", "alarm", None))
        .await
        .expect("record handled");

    assert!(
        handler.calls.lock().await.is_empty(),
        "hook must not run for single-member groups"
    );
    assert_eq!(fx.store.state_of("m1").await, Some(MessageState::Completed));
}

/// Sink that snapshots the whole group's stored states at each delivery,
/// to observe the AGGREGATED-before-COMPLETED ordering.
struct GroupStateSink {
    store: Arc<InMemoryStateStore>,
    group: Vec<String>,
    snapshots: Mutex<Vec<Vec<MessageState>>>,
}

impl MessageSink for GroupStateSink {
    fn send<'a>(&'a self, _message: &'a PrioritizationMessage) -> SinkFuture<'a> {
        Box::pin(async move {
            let mut states = Vec::new();
            for id in &self.group {
                if let Some(state) = self.store.state_of(id).await {
                    states.push(state);
                }
            }
            self.snapshots.lock().await.push(states);
            Ok(())
        })
    }
}

#[tokio::test]
async fn multi_member_group_aggregates_before_completing() {
    let store = Arc::new(InMemoryStateStore::new());
    let group = vec!["m1".to_string(), "m2".to_string(), "m3".to_string()];
    for msg in samples::correlated_group("alarm", &["m1", "m2", "m3"]) {
        store.insert(msg).await;
    }
    let sink = Arc::new(GroupStateSink {
        store: Arc::clone(&store),
        group: group.clone(),
        snapshots: Mutex::new(Vec::new()),
    });
    let topology = Topology::build(
        &test_config(),
        Arc::clone(&store) as Arc<dyn StateStore>,
        Arc::new(IdentityAggregation),
        Arc::clone(&sink) as Arc<dyn MessageSink>,
        Arc::new(RecordingSink::new()),
    );

    // last arrival releases the wait-set; the group was seeded directly
    topology
        .handle_record(&samples::raw_record("m3", "alarm", Some("m1,m2,m3")))
        .await
        .expect("record handled");

    for id in &group {
        assert_eq!(store.state_of(id).await, Some(MessageState::Completed));
    }
    let snapshots = sink.snapshots.lock().await;
    assert_eq!(snapshots.len(), 3, "one delivery per member");
    for states in snapshots.iter() {
        for state in states {
            assert!(
                matches!(state, MessageState::Aggregated | MessageState::Completed),
                "every member is AGGREGATED before any completes, found {state}"
            );
        }
    }
}

#[tokio::test]
async fn aggregation_failure_isolates_members() {
    let fx = fixture(Arc::new(FailingHandler));
    for msg in samples::correlated_group("alarm", &["m4", "m5"]) {
        fx.store.insert(msg).await;
    }

    fx.topology
        .handle_record(&samples::raw_record("m5", "alarm", Some("m4,m5")))
        .await
        .expect("hook failure is recovered, not propagated");

    for id in ["m4", "m5"] {
        let stored = fx.store.get(id).await.expect("record kept");
        assert_eq!(stored.state, MessageState::Error);
        assert!(
            stored.error.as_deref().is_some_and(|e| !e.is_empty()),
            "error text captured for {id}"
        );
    }
    let mut delivered = fx.output.ids().await;
    delivered.sort();
    assert_eq!(delivered, vec!["m4", "m5"], "both routed to terminal sink");
    assert!(
        fx.output.sent().await.iter().all(|m| m.state == MessageState::Error),
        "neither reaches COMPLETED"
    );
}

#[tokio::test]
async fn secondary_failure_does_not_block_remaining_members() {
    let fx = fixture(Arc::new(FailingHandler));
    for msg in samples::correlated_group("alarm", &["m6", "m7"]) {
        fx.store.insert(msg).await;
    }
    fx.output.fail_next(1);

    fx.topology
        .handle_record(&samples::raw_record("m7", "alarm", Some("m6,m7")))
        .await
        .expect("secondary failure is logged and skipped");

    // both members were marked, only the second delivery went through
    assert_eq!(fx.store.state_of("m6").await, Some(MessageState::Error));
    assert_eq!(fx.store.state_of("m7").await, Some(MessageState::Error));
    assert_eq!(fx.output.len().await, 1);
}

#[tokio::test]
async fn correlation_hold_waits_for_all_peers() {
    let fx = fixture(Arc::new(IdentityAggregation));

    fx.topology
        .handle_record(&samples::raw_record("m1", "alarm", Some("m2, m1")))
        .await
        .expect("first arrival handled");

    assert_eq!(fx.store.state_of("m1").await, Some(MessageState::Wait));
    assert!(fx.output.is_empty().await, "held messages are not forwarded");

    fx.topology
        .handle_record(&samples::raw_record("m2", "alarm", Some("m1,m2")))
        .await
        .expect("second arrival handled");

    assert_eq!(fx.store.state_of("m1").await, Some(MessageState::Completed));
    assert_eq!(fx.store.state_of("m2").await, Some(MessageState::Completed));
    let mut delivered = fx.output.ids().await;
    delivered.sort();
    assert_eq!(delivered, vec!["m1", "m2"]);
}

#[tokio::test]
async fn expiry_sweep_is_idempotent() {
    let fx = fixture(Arc::new(IdentityAggregation));
    fx.store.insert(samples::expired_message("e1", "alarm")).await;
    fx.store.insert(samples::expired_message("e2", "alarm")).await;

    let reaped = fx.topology.expiry_tick().await.expect("first tick");
    assert_eq!(reaped, 2);
    assert_eq!(fx.store.state_of("e1").await, Some(MessageState::Expired));
    assert_eq!(fx.expired.len().await, 2);
    assert!(
        fx.expired.sent().await.iter().all(|m| m.state == MessageState::Expired),
        "forwarded records carry the EXPIRED state"
    );

    let reaped_again = fx.topology.expiry_tick().await.expect("second tick");
    assert_eq!(reaped_again, 0, "already-expired records are never returned");
    assert_eq!(fx.expired.len().await, 2, "no double-forward");
}

#[tokio::test]
async fn clean_sweep_purges_only_old_terminal_records() {
    let fx = fixture(Arc::new(IdentityAggregation));
    let mut old_done = samples::message("c1", "alarm", None);
    old_done.state = MessageState::Completed;
    old_done.updated_at = chrono::Utc::now() - chrono::Duration::days(10);
    fx.store.insert(old_done).await;
    fx.store.insert(samples::message("c2", "alarm", None)).await;

    let removed = fx.topology.clean_tick().await.expect("clean tick");
    assert_eq!(removed, 1);
    assert!(fx.store.get("c1").await.is_none());
    assert_eq!(
        fx.store.state_of("c2").await,
        Some(MessageState::Received),
        "pre-completion records are never touched"
    );
}

#[tokio::test]
async fn malformed_record_is_fatal_and_writes_nothing() {
    let fx = fixture(Arc::new(IdentityAggregation));

    let result = fx.topology.handle_record(b"not json at all").await;

    match result {
        Err(err @ PipelineError::MalformedRecord(_)) => {
            assert!(err.is_permanent());
        }
        other => panic!("expected MalformedRecord, got {other:?}"),
    }
    assert!(fx.store.is_empty().await, "no partial state was written");
    assert!(fx.output.is_empty().await);
}

#[tokio::test]
async fn topology_builds_are_independent() {
    let config = test_config();
    let store = Arc::new(InMemoryStateStore::new());
    let first = Topology::build(
        &config,
        Arc::clone(&store) as Arc<dyn StateStore>,
        Arc::new(IdentityAggregation),
        Arc::new(RecordingSink::new()),
        Arc::new(RecordingSink::new()),
    );
    let second = Topology::build(
        &config,
        Arc::clone(&store) as Arc<dyn StateStore>,
        Arc::new(IdentityAggregation),
        Arc::new(RecordingSink::new()),
        Arc::new(RecordingSink::new()),
    );
    assert_eq!(first.input_topics(), second.input_topics());
    assert_eq!(first.input_topics(), ["prioritize-input"]);
}
