//! Call policy for Ethereum-compatible chains.

use super::{owned_set, CallMethods, MethodsError};
use crate::{chain::Chain, quorum::QuorumStrategy};
use ahash::AHashSet;
use bytes::Bytes;
use std::collections::BTreeSet;

/// Methods addressing a previously installed filter; must go back to the same node.
pub const WITH_FILTER_ID_METHODS: &[&str] =
    &["eth_getFilterChanges", "eth_getFilterLogs", "eth_uninstallFilter"];

pub const NEW_FILTER_METHODS: &[&str] =
    &["eth_newFilter", "eth_newBlockFilter", "eth_newPendingTransactionFilter"];

pub const TRACE_METHODS: &[&str] = &[
    "trace_call",
    "trace_callMany",
    "trace_rawTransaction",
    "trace_replayBlockTransactions",
    "trace_replayTransaction",
    "trace_block",
    "trace_filter",
    "trace_get",
    "trace_transaction",
];

pub const DEBUG_METHODS: &[&str] = &[
    "debug_storageRangeAt",
    "debug_traceBlock",
    "debug_traceBlockByHash",
    "debug_traceBlockByNumber",
    "debug_traceCall",
    "debug_traceCallMany",
    "debug_traceTransaction",
];

/// Any answer from a synced node is acceptable.
pub const ANY_RESPONSE_METHODS: &[&str] = &["eth_gasPrice", "eth_call", "eth_estimateGas"];

/// Lookups that may legitimately return `null` on a node that has not indexed the data yet.
pub const POSSIBLE_NOT_INDEXED_METHODS: &[&str] =
    &["eth_getTransactionByHash", "eth_getTransactionReceipt"];

/// Immutable data addressed by hash or height; the first answer wins.
pub const FIRST_VALUE_METHODS: &[&str] = &[
    "eth_getBlockTransactionCountByHash",
    "eth_getUncleCountByBlockHash",
    "eth_getBlockByHash",
    "eth_getBlockByNumber",
    "eth_getTransactionByBlockHashAndIndex",
    "eth_getTransactionByBlockNumberAndIndex",
    "eth_getStorageAt",
    "eth_getCode",
    "eth_getUncleByBlockHashAndIndex",
    "eth_getLogs",
];

pub const SPECIAL_METHODS: &[&str] =
    &["eth_getTransactionCount", "eth_blockNumber", "eth_getBalance", "eth_sendRawTransaction"];

/// Height-relative lookups that need a node at the head.
pub const HEAD_VERIFIED_METHODS: &[&str] = &[
    "eth_getBlockTransactionCountByNumber",
    "eth_getUncleCountByBlockNumber",
    "eth_getUncleByBlockNumberAndIndex",
    "eth_feeHistory",
];

pub const HARDCODED_METHODS: &[&str] = &[
    "net_version",
    "net_peerCount",
    "net_listening",
    "web3_clientVersion",
    "eth_protocolVersion",
    "eth_syncing",
    "eth_coinbase",
    "eth_mining",
    "eth_hashrate",
    "eth_accounts",
    "eth_chainId",
];

const OPTIMISM_METHODS: &[&str] = &["rollup_gasPrices"];

const POLYGON_METHODS: &[&str] = &[
    "bor_getAuthor",
    "bor_getCurrentValidators",
    "bor_getCurrentProposer",
    "bor_getRootHash",
    "bor_getSignersAtHash",
    "eth_getRootHash",
];

const POLYGON_ZKEVM_METHODS: &[&str] = &[
    "zkevm_consolidatedBlockNumber",
    "zkevm_isBlockConsolidated",
    "zkevm_isBlockVirtualized",
    "zkevm_batchNumberByBlockNumber",
    "zkevm_batchNumber",
    "zkevm_virtualBatchNumber",
    "zkevm_verifiedBatchNumber",
    "zkevm_getBatchByNumber",
    "zkevm_getBroadcastURI",
];

const ZKSYNC_METHODS: &[&str] = &[
    "zks_estimateFee",
    "zks_estimateGasL1ToL2",
    "zks_getAllAccountBalances",
    "zks_getBlockDetails",
    "zks_getBridgeContracts",
    "zks_getBytecodeByHash",
    "zks_getConfirmedTokens",
    "zks_getL1BatchBlockRange",
    "zks_getL1BatchDetails",
    "zks_getL2ToL1LogProof",
    "zks_getL2ToL1MsgProof",
    "zks_getMainContract",
    "zks_getRawBlockTransactions",
    "zks_getTestnetPaymaster",
    "zks_getTokenPrice",
    "zks_getTransactionDetails",
    "zks_L1BatchNumber",
    "zks_L1ChainId",
];

const CLIENT_VERSION: &str = concat!("\"relay/v", env!("CARGO_PKG_VERSION"), "\"");

/// Methods only some EVM chains implement.
fn chain_extensions(chain: Chain) -> &'static [&'static str] {
    match chain {
        Chain::OptimismMainnet | Chain::OptimismGoerli => OPTIMISM_METHODS,
        Chain::PolygonPosMainnet | Chain::PolygonPosMumbai => POLYGON_METHODS,
        Chain::PolygonZkevmMainnet | Chain::PolygonZkevmTestnet => POLYGON_ZKEVM_METHODS,
        Chain::ZksyncMainnet | Chain::ZksyncTestnet => ZKSYNC_METHODS,
        _ => &[],
    }
}

/// Methods a chain is known not to serve even though the common table lists them.
fn chain_unsupported(chain: Chain) -> &'static [&'static str] {
    match chain {
        Chain::OptimismMainnet => &["eth_getAccounts"],
        _ => &[],
    }
}

/// Call policy for one EVM chain.
///
/// Filter, trace and debug methods are not callable by default; they are enabled per upstream
/// through the `filter`, `trace` and `debug` groups.
#[derive(Debug)]
pub struct EthereumMethods {
    chain: Chain,
    callable: AHashSet<&'static str>,
    extensions: &'static [&'static str],
}

impl EthereumMethods {
    #[must_use]
    pub fn new(chain: Chain) -> Self {
        let extensions = chain_extensions(chain);
        let unsupported = chain_unsupported(chain);

        let callable = [
            ANY_RESPONSE_METHODS,
            FIRST_VALUE_METHODS,
            POSSIBLE_NOT_INDEXED_METHODS,
            SPECIAL_METHODS,
            HEAD_VERIFIED_METHODS,
            HARDCODED_METHODS,
            extensions,
        ]
        .into_iter()
        .flatten()
        .copied()
        .filter(|method| !unsupported.contains(method))
        .collect();

        Self { chain, callable, extensions }
    }

    #[must_use]
    pub fn chain(&self) -> Chain {
        self.chain
    }

    fn extension_quorum(method: &str) -> QuorumStrategy {
        match method {
            "bor_getAuthor" | "bor_getRootHash" | "eth_getRootHash" => {
                QuorumStrategy::NotLagging(4)
            }
            "bor_getCurrentValidators" | "bor_getCurrentProposer" => QuorumStrategy::NotLagging(0),
            _ => QuorumStrategy::Always,
        }
    }
}

impl CallMethods for EthereumMethods {
    fn is_callable(&self, method: &str) -> bool {
        self.callable.contains(method)
    }

    fn quorum_for(&self, method: &str) -> QuorumStrategy {
        if WITH_FILTER_ID_METHODS.contains(&method) {
            QuorumStrategy::Always
        } else if NEW_FILTER_METHODS.contains(&method) {
            QuorumStrategy::NotLagging(4)
        } else if HARDCODED_METHODS.contains(&method) || FIRST_VALUE_METHODS.contains(&method) {
            QuorumStrategy::Always
        } else if ANY_RESPONSE_METHODS.contains(&method) {
            QuorumStrategy::NotLagging(4)
        } else if HEAD_VERIFIED_METHODS.contains(&method) {
            QuorumStrategy::NotLagging(1)
        } else if POSSIBLE_NOT_INDEXED_METHODS.contains(&method) {
            QuorumStrategy::NotNull
        } else if SPECIAL_METHODS.contains(&method) {
            match method {
                "eth_sendRawTransaction" => QuorumStrategy::Broadcast,
                _ => QuorumStrategy::NotLagging(0),
            }
        } else if self.extensions.contains(&method) {
            Self::extension_quorum(method)
        } else {
            QuorumStrategy::Always
        }
    }

    fn is_hardcoded(&self, method: &str) -> bool {
        HARDCODED_METHODS.contains(&method)
    }

    fn execute_hardcoded(&self, method: &str) -> Result<Bytes, MethodsError> {
        let literal: String = match method {
            "net_version" => {
                let version =
                    self.chain.net_version().ok_or(MethodsError::InvalidChain(self.chain))?;
                format!("\"{version}\"")
            }
            "eth_chainId" => {
                let id = self.chain.chain_id().ok_or(MethodsError::InvalidChain(self.chain))?;
                format!("\"{id}\"")
            }
            "net_peerCount" => "\"0x2a\"".to_string(),
            "net_listening" => "true".to_string(),
            "web3_clientVersion" => CLIENT_VERSION.to_string(),
            "eth_protocolVersion" => "\"0x3f\"".to_string(),
            "eth_syncing" | "eth_mining" => "false".to_string(),
            "eth_coinbase" => "\"0x0000000000000000000000000000000000000000\"".to_string(),
            "eth_hashrate" => "\"0x0\"".to_string(),
            "eth_accounts" => "[]".to_string(),
            other => return Err(MethodsError::MethodNotFound(other.to_string())),
        };
        Ok(Bytes::from(literal))
    }

    fn methods_in_group(&self, group: &str) -> BTreeSet<String> {
        match group {
            "filter" => owned_set(WITH_FILTER_ID_METHODS.iter().chain(NEW_FILTER_METHODS).copied()),
            "trace" => owned_set(TRACE_METHODS.iter().copied()),
            "debug" => owned_set(DEBUG_METHODS.iter().copied()),
            _ => BTreeSet::new(),
        }
    }

    fn supported_methods(&self) -> BTreeSet<String> {
        owned_set(self.callable.iter().copied())
    }
}
