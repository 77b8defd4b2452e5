//! Pluggable aggregation strategy.
//!
//! The Aggregate stage resolves a multi-member correlation group through an
//! injected [`AggregationHandler`], selected per deployment. The handler may
//! synthesize a combined record (through its own state store handle) and
//! decides which ids flow onward to the Output stage. The default,
//! [`IdentityAggregation`], forwards every member id unchanged.
//!
//! A handler error never escapes the Aggregate stage: the stage transitions
//! every member to `ERROR` and routes the records to the terminal sink.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Failure raised by an aggregation handler.
#[derive(Error, Debug)]
#[error("aggregation failed: {0}")]
pub struct AggregationError(pub String);

impl AggregationError {
    /// Build an error from any displayable cause.
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

/// Boxed future returned by [`AggregationHandler::handle`].
pub type AggregationFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<String>, AggregationError>> + Send + 'a>>;

/// Strategy invoked for every multi-member correlation group.
///
/// Receives the member ids and returns the ids to forward to the Output
/// stage — the members themselves, a subset, or a freshly synthesized
/// combined record's id.
pub trait AggregationHandler: Send + Sync {
    /// Resolve one correlation group.
    ///
    /// # Errors
    ///
    /// Returns [`AggregationError`] when the group cannot be resolved; the
    /// Aggregate stage then fails every member independently.
    fn handle<'a>(&'a self, ids: &'a [String]) -> AggregationFuture<'a>;
}

/// Default strategy: forward every member id unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityAggregation;

impl AggregationHandler for IdentityAggregation {
    fn handle<'a>(&'a self, ids: &'a [String]) -> AggregationFuture<'a> {
        Box::pin(async move { Ok(ids.to_vec()) })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn identity_forwards_members_unchanged() {
        let ids = vec!["m1".to_string(), "m2".to_string(), "m3".to_string()];
        let forwarded = IdentityAggregation
            .handle(&ids)
            .await
            .expect("identity never fails");
        assert_eq!(forwarded, ids);
    }
}
