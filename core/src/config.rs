//! Pipeline configuration model.
//!
//! One [`PrioritizationConfig`] is built per topology and shared read-only
//! (behind an `Arc`) by every stage instance of that topology. It is
//! immutable after construction; building several topologies from the same
//! configuration yields isolated runtime state.

use serde::Deserialize;
use std::time::Duration;

/// Tunables for the expiry sweep.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryConfig {
    /// Maximum number of records one sweep firing may reap.
    pub max_poll_record: usize,
    /// Wall-clock interval between sweep firings, in milliseconds.
    pub frequency_milli: u64,
}

impl ExpiryConfig {
    /// The sweep firing interval as a [`Duration`].
    #[must_use]
    pub const fn frequency(&self) -> Duration {
        Duration::from_millis(self.frequency_milli)
    }
}

/// Tunables for the clean sweep.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanConfig {
    /// Retention window for terminal-state records, in days. Also the
    /// firing interval of the clean sweep.
    pub expired_records_hold_days: u32,
}

impl CleanConfig {
    /// The retention window (and sweep interval) as a [`Duration`].
    #[must_use]
    pub fn hold_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.expired_records_hold_days) * 86_400)
    }
}

/// Configuration for one prioritization topology.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizationConfig {
    /// Comma-separated list of input topic names to subscribe to.
    pub input_topic_selector: String,
    /// Topic receiving completed and errored records.
    pub output_topic: String,
    /// Topic receiving expired records.
    pub expired_topic: String,
    /// Expiry sweep tunables.
    pub expiry_configuration: ExpiryConfig,
    /// Clean sweep tunables.
    pub clean_configuration: CleanConfig,
}

impl PrioritizationConfig {
    /// The input topics derived by splitting the selector on commas.
    #[must_use]
    pub fn input_topics(&self) -> Vec<String> {
        self.input_topic_selector
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}
