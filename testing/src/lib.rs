//! # Prioritizer Testing
//!
//! Testing utilities for the message prioritization pipeline.
//!
//! This crate provides:
//! - [`store::InMemoryStateStore`]: deterministic in-memory `StateStore`
//! - [`sink::RecordingSink`]: captures delivered records, with optional
//!   injected failures
//! - [`samples`]: builders for representative message fixtures
//!
//! ## Example
//!
//! ```ignore
//! use prioritizer_testing::{InMemoryStateStore, RecordingSink, samples};
//!
//! #[tokio::test]
//! async fn completes_uncorrelated_message() {
//!     let store = Arc::new(InMemoryStateStore::new());
//!     let output = Arc::new(RecordingSink::new());
//!     let topology = Topology::build(config, store, handler, output.clone(), expired);
//!
//!     topology.handle_record(&samples::raw_record("x1", "alarm", None)).await?;
//!     assert_eq!(output.ids(), vec!["x1"]);
//! }
//! ```

pub mod samples;
pub mod sink;
pub mod store;

pub use sink::RecordingSink;
pub use store::InMemoryStateStore;

/// Initialize a compact tracing subscriber for test output.
///
/// Safe to call from multiple tests; only the first call installs the
/// subscriber.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .compact()
        .try_init();
}
