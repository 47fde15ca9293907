//! Call policy for Bitcoin-style UTXO chains.

use super::{owned_set, CallMethods, MethodsError};
use crate::quorum::QuorumStrategy;
use bytes::Bytes;
use std::collections::BTreeSet;

const READ_METHODS: &[&str] = &["getblock", "getblockhash", "getrawtransaction", "gettxout"];

/// Answers describing the current tip; only a node at the head may answer them.
const HEAD_METHODS: &[&str] = &["getblockcount", "getbestblockhash", "getblockchaininfo"];

const BROADCAST_METHODS: &[&str] = &["sendrawtransaction"];

/// Call policy for UTXO chains. Nothing is hardcoded.
#[derive(Debug, Default)]
pub struct BitcoinMethods;

impl BitcoinMethods {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl CallMethods for BitcoinMethods {
    fn is_callable(&self, method: &str) -> bool {
        READ_METHODS.contains(&method) ||
            HEAD_METHODS.contains(&method) ||
            BROADCAST_METHODS.contains(&method)
    }

    fn quorum_for(&self, method: &str) -> QuorumStrategy {
        if BROADCAST_METHODS.contains(&method) {
            QuorumStrategy::Broadcast
        } else if HEAD_METHODS.contains(&method) {
            QuorumStrategy::NotLagging(0)
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

    fn methods_in_group(&self, _group: &str) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn supported_methods(&self) -> BTreeSet<String> {
        owned_set(READ_METHODS.iter().chain(HEAD_METHODS).chain(BROADCAST_METHODS).copied())
    }
}
