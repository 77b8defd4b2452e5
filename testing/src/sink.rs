//! Recording [`MessageSink`] with injectable failures.

use prioritizer_core::message::PrioritizationMessage;
use prioritizer_core::sink::{MessageSink, SinkError, SinkFuture};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Sink that records every delivered message.
///
/// Failures can be injected with [`RecordingSink::fail_next`] to exercise
/// the pipeline's per-member error isolation; failed sends are not recorded.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<PrioritizationMessage>>,
    fail_remaining: AtomicUsize,
}

impl RecordingSink {
    /// Create an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` sends fail with a delivery error.
    pub fn fail_next(&self, count: usize) {
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    /// Snapshot of every recorded message, in delivery order.
    pub async fn sent(&self) -> Vec<PrioritizationMessage> {
        self.sent.lock().await.clone()
    }

    /// Ids of every recorded message, in delivery order.
    pub async fn ids(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|m| m.id.clone()).collect()
    }

    /// Number of recorded deliveries.
    pub async fn len(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Whether nothing has been delivered yet.
    pub async fn is_empty(&self) -> bool {
        self.sent.lock().await.is_empty()
    }
}

impl MessageSink for RecordingSink {
    fn send<'a>(&'a self, message: &'a PrioritizationMessage) -> SinkFuture<'a> {
        Box::pin(async move {
            let remaining = self.fail_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
                return Err(SinkError::DeliveryFailed {
                    id: message.id.clone(),
                    reason: "injected failure".to_string(),
                });
            }
            self.sent.lock().await.push(message.clone());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::samples;

    #[tokio::test]
    async fn records_sends_in_order() {
        let sink = RecordingSink::new();
        sink.send(&samples::message("m1", "alarm", None))
            .await
            .expect("send succeeds");
        sink.send(&samples::message("m2", "alarm", None))
            .await
            .expect("send succeeds");
        assert_eq!(sink.ids().await, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let sink = RecordingSink::new();
        sink.fail_next(1);
        let first = sink.send(&samples::message("m1", "alarm", None)).await;
        assert!(first.is_err());
        let second = sink.send(&samples::message("m2", "alarm", None)).await;
        assert!(second.is_ok());
        assert_eq!(sink.ids().await, vec!["m2"]);
    }
}
