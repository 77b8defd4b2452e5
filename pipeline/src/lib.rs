//! # Prioritizer Pipeline
//!
//! Processing stages, time-triggered sweeps and topology assembly for the
//! message prioritization pipeline.
//!
//! ## Topology
//!
//! ```text
//!  input topics ──▶ Prioritize ──▶ Aggregate ──▶ Output ──▶ output sink
//!                       │              │ on error              ▲
//!                       │              └──────────────────────┘
//!                       ▼
//!                  state store ◀── Expiry sweep ──▶ expired sink
//!                       ▲
//!                       └────────── Clean sweep
//! ```
//!
//! [`topology::Topology`] wires the stages against a shared
//! [`StateStore`](prioritizer_core::store::StateStore) and two terminal
//! sinks. The runtime driver (the `prioritizer-kafka` crate) feeds it raw
//! records and fires the sweep ticks on wall-clock intervals.
//!
//! ## Ordering Model
//!
//! All entry points are plain `async fn`s awaited to completion by the
//! caller. The driver processes one record (or one sweep tick) at a time
//! per partition worker, which preserves per-partition ordering: a sweep
//! never runs concurrently with record processing on the same worker, and
//! a slow store call throttles that worker rather than reordering it.

pub mod aggregate;
pub mod error;
pub mod output;
pub mod prioritize;
pub mod sweep;
pub mod topology;

pub use aggregate::AggregateStage;
pub use error::PipelineError;
pub use output::OutputStage;
pub use prioritize::PrioritizeStage;
pub use sweep::{CleanSweep, ExpirySweep};
pub use topology::Topology;
