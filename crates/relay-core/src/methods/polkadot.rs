//! Call policy for Substrate chains.

use super::{owned_set, CallMethods, MethodsError};
use crate::{chain::Chain, quorum::QuorumStrategy};
use bytes::Bytes;
use std::collections::BTreeSet;

const READ_METHODS: &[&str] = &[
    "chain_getBlock",
    "chain_getBlockHash",
    "chain_getHead",
    "chain_getHeader",
    "state_call",
    "state_getStorage",
    "system_health",
];

const BROADCAST_METHODS: &[&str] = &["author_submitExtrinsic"];

const HARDCODED_METHODS: &[&str] = &["system_chain"];

/// Call policy for one Substrate chain. `system_chain` is answered with the chain name.
#[derive(Debug)]
pub struct PolkadotMethods {
    chain: Chain,
}

impl PolkadotMethods {
    #[must_use]
    pub fn new(chain: Chain) -> Self {
        Self { chain }
    }
}

impl CallMethods for PolkadotMethods {
    fn is_callable(&self, method: &str) -> bool {
        READ_METHODS.contains(&method) ||
            BROADCAST_METHODS.contains(&method) ||
            HARDCODED_METHODS.contains(&method)
    }

    fn quorum_for(&self, method: &str) -> QuorumStrategy {
        if BROADCAST_METHODS.contains(&method) {
            QuorumStrategy::Broadcast
        } else {
            QuorumStrategy::Always
        }
    }

    fn is_hardcoded(&self, method: &str) -> bool {
        HARDCODED_METHODS.contains(&method)
    }

    fn execute_hardcoded(&self, method: &str) -> Result<Bytes, MethodsError> {
        match method {
            "system_chain" => {
                let literal = serde_json::to_vec(self.chain.name()).map_err(|e| {
                    MethodsError::InvalidStaticResponse {
                        method: method.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Bytes::from(literal))
            }
            other => Err(MethodsError::MethodNotFound(other.to_string())),
        }
    }

    fn methods_in_group(&self, _group: &str) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn supported_methods(&self) -> BTreeSet<String> {
        owned_set(READ_METHODS.iter().chain(BROADCAST_METHODS).chain(HARDCODED_METHODS).copied())
    }
}
