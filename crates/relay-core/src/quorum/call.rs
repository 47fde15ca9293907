//! Per-call quorum reducer.

use super::QuorumStrategy;
use crate::{types::JsonRpcResponse, upstream::errors::UpstreamError};
use thiserror::Error;
use tracing::{debug, trace};

/// Why a call could not be answered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuorumError {
    #[error("No upstream responded")]
    NoResponse,

    #[error("All responses came from lagging upstreams ({0} ignored)")]
    AllLagging(usize),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Accumulates the responses of one call until its strategy is satisfied.
///
/// ```
/// use relay_core::quorum::{CallQuorum, QuorumStrategy};
/// use relay_core::types::JsonRpcResponse;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let mut quorum = CallQuorum::new(QuorumStrategy::NotLagging(1));
/// let response = JsonRpcResponse::success(json!("0x10"), Arc::new(json!(1)));
///
/// assert!(!quorum.record(5, Ok(response.clone()))); // too far behind
/// assert!(quorum.record(0, Ok(response)));
/// assert!(quorum.finish().is_ok());
/// ```
#[derive(Debug)]
pub struct CallQuorum {
    strategy: QuorumStrategy,
    resolved: Option<JsonRpcResponse>,
    null_fallback: Option<JsonRpcResponse>,
    error_response: Option<JsonRpcResponse>,
    last_error: Option<UpstreamError>,
    ignored_lagging: usize,
    successes: usize,
}

impl CallQuorum {
    #[must_use]
    pub fn new(strategy: QuorumStrategy) -> Self {
        Self {
            strategy,
            resolved: None,
            null_fallback: None,
            error_response: None,
            last_error: None,
            ignored_lagging: 0,
            successes: 0,
        }
    }

    #[must_use]
    pub fn strategy(&self) -> QuorumStrategy {
        self.strategy
    }

    /// Feeds one upstream outcome. Returns `true` once the call is resolved.
    pub fn record(&mut self, lag: u64, outcome: Result<JsonRpcResponse, UpstreamError>) -> bool {
        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                trace!(error = %err, "quorum recorded upstream failure");
                self.last_error = Some(err);
                return self.is_resolved();
            }
        };

        if !self.strategy.accepts_lag(lag) {
            debug!(lag, strategy = %self.strategy, "ignoring response from lagging upstream");
            self.ignored_lagging += 1;
            return self.is_resolved();
        }

        if response.error.is_some() {
            self.error_response.get_or_insert(response);
            return self.is_resolved();
        }

        self.successes += 1;
        if self.resolved.is_some() {
            return true;
        }

        if self.strategy == QuorumStrategy::NotNull && response.is_null_result() {
            self.null_fallback.get_or_insert(response);
            return false;
        }

        self.resolved = Some(response);
        true
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Whether the caller should keep dispatching the call to more upstreams.
    ///
    /// Broadcast calls go to every upstream even after the first success.
    #[must_use]
    pub fn wants_more(&self) -> bool {
        self.strategy == QuorumStrategy::Broadcast || !self.is_resolved()
    }

    /// Number of successful responses accepted so far.
    #[must_use]
    pub fn successes(&self) -> usize {
        self.successes
    }

    /// Produces the answer for the client.
    ///
    /// Falls back, in order, to a null result (for `NotNull`), a JSON-RPC error returned by an
    /// upstream, and finally the last transport failure.
    ///
    /// # Errors
    ///
    /// Returns a [`QuorumError`] when no usable response was recorded.
    pub fn finish(self) -> Result<JsonRpcResponse, QuorumError> {
        if let Some(response) = self.resolved.or(self.null_fallback).or(self.error_response) {
            return Ok(response);
        }
        if let Some(err) = self.last_error {
            return Err(QuorumError::Upstream(err));
        }
        if self.ignored_lagging > 0 {
            return Err(QuorumError::AllLagging(self.ignored_lagging));
        }
        Err(QuorumError::NoResponse)
    }
}
