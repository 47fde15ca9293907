//! Call policy for NEAR.

use super::{owned_set, CallMethods, MethodsError};
use crate::quorum::QuorumStrategy;
use bytes::Bytes;
use std::collections::BTreeSet;

const READ_METHODS: &[&str] = &[
    "view_access_key",
    "query",
    "EXPERIMENTAL_changes",
    "block",
    "chunk",
    "EXPERIMENTAL_changes_in_block",
    "gas_price",
    "status",
    "network_info",
    "validators",
    "tx",
    "EXPERIMENTAL_tx_status",
    "EXPERIMENTAL_receipt",
];

const BROADCAST_METHODS: &[&str] = &["broadcast_tx_async", "broadcast_tx_commit"];

#[derive(Debug, Default)]
pub struct NearMethods;

impl NearMethods {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl CallMethods for NearMethods {
    fn is_callable(&self, method: &str) -> bool {
        READ_METHODS.contains(&method) || BROADCAST_METHODS.contains(&method)
    }

    fn quorum_for(&self, method: &str) -> QuorumStrategy {
        if BROADCAST_METHODS.contains(&method) {
            QuorumStrategy::Broadcast
        } else {
            QuorumStrategy::Always
        }
    }

    fn is_hardcoded(&self, _method: &str) -> bool {
        false
    }

    fn execute_hardcoded(&self, method: &str) -> Result<Bytes, MethodsError> {
        Err(MethodsError::MethodNotFound(method.to_string()))
    }

    /// The `default` group names every supported method.
    fn methods_in_group(&self, group: &str) -> BTreeSet<String> {
        match group {
            "default" => self.supported_methods(),
            _ => BTreeSet::new(),
        }
    }

    fn supported_methods(&self) -> BTreeSet<String> {
        owned_set(READ_METHODS.iter().chain(BROADCAST_METHODS).copied())
    }
}
