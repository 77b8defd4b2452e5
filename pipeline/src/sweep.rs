//! Time-triggered sweeps, independent of message arrival.
//!
//! Both sweeps are fired by the runtime driver on wall-clock intervals, on
//! the same worker that processes records for the partition — a sweep tick
//! never runs concurrently with record handling on that worker.

use crate::error::PipelineError;
use chrono::{Duration, Utc};
use prioritizer_core::message::{self, MessageState};
use prioritizer_core::sink::MessageSink;
use prioritizer_core::store::StateStore;
use std::sync::Arc;

/// Reaps messages whose wait window elapsed before completion.
pub struct ExpirySweep {
    store: Arc<dyn StateStore>,
    expired_sink: Arc<dyn MessageSink>,
    max_poll_record: usize,
}

impl ExpirySweep {
    /// Wire the sweep against the shared store and the expired sink.
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        expired_sink: Arc<dyn MessageSink>,
        max_poll_record: usize,
    ) -> Self {
        Self {
            store,
            expired_sink,
            max_poll_record,
        }
    }

    /// One sweep firing: bulk-expire up to `max_poll_record` eligible
    /// records and forward each to the expired sink.
    ///
    /// Repeated firings are idempotent: the store never returns records
    /// already in a terminal state, so nothing is double-expired or
    /// double-forwarded.
    ///
    /// # Errors
    ///
    /// Propagates store and sink failures to the driver; the next firing
    /// retries anything left unexpired.
    pub async fn tick(&self) -> Result<usize, PipelineError> {
        let eligible = self
            .store
            .get_expiry_eligible_messages(self.max_poll_record)
            .await?;
        if eligible.is_empty() {
            return Ok(0);
        }

        let ids = message::ids(&eligible);
        self.store
            .update_messages_state(&ids, MessageState::Expired)
            .await?;

        let count = eligible.len();
        for mut expired in eligible {
            expired.state = MessageState::Expired;
            self.expired_sink.send(&expired).await?;
        }
        tracing::info!(count, "expiry sweep reaped messages");
        Ok(count)
    }
}

/// Purges terminal-state records older than the retention window.
///
/// Only ever acts on records already in a terminal state, so it is safe to
/// run concurrently with the expiry sweep, which touches only
/// pre-completion records.
pub struct CleanSweep {
    store: Arc<dyn StateStore>,
    hold_days: u32,
}

impl CleanSweep {
    /// Wire the sweep against the shared store with the configured
    /// retention window.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, hold_days: u32) -> Self {
        Self { store, hold_days }
    }

    /// One sweep firing: delete terminal records last touched before the
    /// retention cutoff, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Propagates store failures to the driver.
    pub async fn tick(&self) -> Result<u64, PipelineError> {
        let cutoff = Utc::now() - Duration::days(i64::from(self.hold_days));
        let removed = self
            .store
            .delete_messages_in_states(&MessageState::TERMINAL, cutoff)
            .await?;
        if removed > 0 {
            tracing::info!(removed, hold_days = self.hold_days, "clean sweep purged records");
        }
        Ok(removed)
    }
}
