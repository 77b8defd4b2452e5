//! # Prioritizer Core
//!
//! Core types and boundary traits for the message prioritization pipeline.
//!
//! This crate defines the vocabulary shared by every stage of the pipeline:
//!
//! - **Message model**: [`message::PrioritizationMessage`] and its lifecycle
//!   state machine [`message::MessageState`]
//! - **Correlation**: [`correlation::TypeCorrelationKey`], the canonical
//!   grouping key for messages that belong to the same unit of work
//! - **Configuration**: [`config::PrioritizationConfig`], the immutable
//!   tunables shared by all stages of one topology
//! - **State store boundary**: [`store::StateStore`], the persistence
//!   collaborator every stage mutates lifecycle state through
//! - **Sink boundary**: [`sink::MessageSink`], the terminal delivery edges
//! - **Aggregation strategy**: [`aggregation::AggregationHandler`], the
//!   pluggable hook invoked for multi-member correlation groups
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  source(s)  │  N partitioned input topics
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Prioritize  │────▶│  Aggregate  │────▶│   Output    │
//! └──────┬──────┘     └──────┬──────┘     └──────┬──────┘
//!        │                   │ on error          │
//!        ▼                   ▼                   ▼
//!   state store         output sink         output sink
//! ```
//!
//! Stages persist to the state store first and forward second; a crash
//! between the two yields an at-least-once duplicate forward, so downstream
//! consumers must be idempotent by message id.
//!
//! ## Dyn Compatibility
//!
//! The boundary traits return explicit `Pin<Box<dyn Future>>` instead of
//! `async fn` so stages can hold them as trait objects
//! (`Arc<dyn StateStore>`, `Arc<dyn MessageSink>`).

pub mod aggregation;
pub mod config;
pub mod correlation;
pub mod message;
pub mod sink;
pub mod store;

pub use aggregation::{AggregationError, AggregationHandler, IdentityAggregation};
pub use config::{CleanConfig, ExpiryConfig, PrioritizationConfig};
pub use correlation::TypeCorrelationKey;
pub use message::{MessageState, PrioritizationMessage};
pub use sink::{MessageSink, SinkError};
pub use store::{StateStore, StateStoreError};
