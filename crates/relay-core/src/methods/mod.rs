//! Per-chain call policies.
//!
//! A [`CallMethods`] table answers four questions about a JSON-RPC method on a given chain:
//!
//! 1. may it be forwarded at all ([`is_callable`](CallMethods::is_callable))?
//! 2. how many upstreams must agree ([`quorum_for`](CallMethods::quorum_for))?
//! 3. can the gateway answer it locally ([`is_hardcoded`](CallMethods::is_hardcoded))?
//! 4. which methods form an opt-in group ([`methods_in_group`](CallMethods::methods_in_group))?
//!
//! ```text
//!                      ┌───────────────────────┐
//!   Chain ──family──►  │      CallTargets      │  cached per chain
//!                      └───────────┬───────────┘
//!          ┌──────────────┬────────┴──────┬──────────────┐
//!          ▼              ▼               ▼              ▼
//!   EthereumMethods  BitcoinMethods  PolkadotMethods  NearMethods
//!          │
//!          ▼ (operator overrides)
//!   ManagedCallMethods
//! ```
//!
//! Tables are immutable after construction and shared as `Arc<dyn CallMethods>`.

pub mod bitcoin;
pub mod ethereum;
pub mod managed;
pub mod near;
pub mod polkadot;
pub mod registry;

pub use bitcoin::BitcoinMethods;
pub use ethereum::EthereumMethods;
pub use managed::{ManagedCallMethods, ManagedCallMethodsBuilder};
pub use near::NearMethods;
pub use polkadot::PolkadotMethods;
pub use registry::CallTargets;

use crate::{chain::Chain, quorum::QuorumStrategy, types::JsonRpcError};
use bytes::Bytes;
use std::collections::BTreeSet;
use thiserror::Error;

/// JSON-RPC code for an unknown method.
pub const METHOD_NOT_FOUND_CODE: i32 = -32601;

/// JSON-RPC code for invalid parameters, also used when a chain has no identity literal.
pub const INVALID_PARAMS_CODE: i32 = -32602;

/// Errors raised by call-policy tables.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MethodsError {
    #[error("Method not found")]
    MethodNotFound(String),

    #[error("Invalid chain")]
    InvalidChain(Chain),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(Chain),

    #[error("Invalid static response for {method}: {reason}")]
    InvalidStaticResponse { method: String, reason: String },
}

impl MethodsError {
    /// JSON-RPC error code reported to the client.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::MethodNotFound(_) => METHOD_NOT_FOUND_CODE,
            Self::InvalidChain(_) | Self::UnsupportedChain(_) => INVALID_PARAMS_CODE,
            Self::InvalidStaticResponse { .. } => -32603,
        }
    }

    #[must_use]
    pub fn to_rpc_error(&self) -> JsonRpcError {
        JsonRpcError::new(self.code(), self.to_string())
    }
}

/// Call policy of one chain (or one upstream, with overrides applied).
pub trait CallMethods: Send + Sync + std::fmt::Debug {
    /// Whether the method may be routed to upstreams or answered locally.
    fn is_callable(&self, method: &str) -> bool;

    /// Quorum strategy for the method. Total: unknown methods get the default strategy.
    fn quorum_for(&self, method: &str) -> QuorumStrategy;

    /// Whether the method is answered locally without contacting an upstream.
    fn is_hardcoded(&self, method: &str) -> bool;

    /// Literal JSON result of a hardcoded method.
    ///
    /// # Errors
    ///
    /// [`MethodsError::MethodNotFound`] for methods that are not hardcoded, or
    /// [`MethodsError::InvalidChain`] when the chain has no value for the method.
    fn execute_hardcoded(&self, method: &str) -> Result<Bytes, MethodsError>;

    /// Methods belonging to an opt-in group. Unknown groups are empty.
    fn methods_in_group(&self, group: &str) -> BTreeSet<String>;

    /// Every callable method, sorted.
    fn supported_methods(&self) -> BTreeSet<String>;
}

/// Collects static method names into an owned sorted set.
pub(crate) fn owned_set<'a>(methods: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    methods.into_iter().map(str::to_string).collect()
}
