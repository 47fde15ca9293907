//! Chain identities and per-upstream head tracking.
//!
//! [`Chain`] is the closed set of logical chains the gateway routes for. Each chain belongs to a
//! [`ChainFamily`], which selects the call-policy table used for it, and optionally carries the
//! literal values returned for `net_version` / `eth_chainId`.
//!
//! ```text
//!   config "polygon" ──► Chain::PolygonPosMainnet ──► ChainFamily::Evm ──► EthereumMethods
//!                                                 └─► net_version "137", eth_chainId "0x89"
//! ```
//!
//! [`HeadTracker`] keeps the latest height reported by one upstream and fans every observation
//! out to subscribers such as the liveness validator.

pub mod head;

pub use head::HeadTracker;

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Protocol family of a chain. Decides which call-policy table applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    /// Ethereum-compatible JSON-RPC.
    Evm,
    /// Bitcoin-style UTXO chains.
    Utxo,
    /// Substrate-based chains.
    Substrate,
    /// Chains with their own RPC dialect (NEAR, Starknet).
    Other,
}

/// A logical chain served by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Chain {
    EthereumMainnet,
    EthereumClassicMainnet,
    EthereumMorden,
    EthereumRopsten,
    EthereumRinkeby,
    EthereumKovan,
    EthereumGoerli,
    EthereumSepolia,
    PolygonPosMainnet,
    PolygonPosMumbai,
    ArbitrumMainnet,
    ArbitrumGoerli,
    ArbitrumNovaMainnet,
    OptimismMainnet,
    OptimismGoerli,
    PolygonZkevmMainnet,
    PolygonZkevmTestnet,
    ZksyncMainnet,
    ZksyncTestnet,
    /// Local or private EVM network without a registered chain id.
    EvmDevnet,
    BitcoinMainnet,
    BitcoinTestnet,
    PolkadotMainnet,
    KusamaMainnet,
    NearMainnet,
    NearTestnet,
    StarknetMainnet,
}

/// Static facts about a chain.
#[derive(Debug)]
pub struct ChainInfo {
    /// Identifier used in configuration files.
    pub code: &'static str,
    /// Human readable name.
    pub name: &'static str,
    pub family: ChainFamily,
    /// Literal returned for `net_version`.
    pub net_version: Option<&'static str>,
    /// Literal returned for `eth_chainId`.
    pub chain_id: Option<&'static str>,
}

impl Chain {
    /// Every known chain, in declaration order.
    pub const ALL: [Chain; 27] = [
        Chain::EthereumMainnet,
        Chain::EthereumClassicMainnet,
        Chain::EthereumMorden,
        Chain::EthereumRopsten,
        Chain::EthereumRinkeby,
        Chain::EthereumKovan,
        Chain::EthereumGoerli,
        Chain::EthereumSepolia,
        Chain::PolygonPosMainnet,
        Chain::PolygonPosMumbai,
        Chain::ArbitrumMainnet,
        Chain::ArbitrumGoerli,
        Chain::ArbitrumNovaMainnet,
        Chain::OptimismMainnet,
        Chain::OptimismGoerli,
        Chain::PolygonZkevmMainnet,
        Chain::PolygonZkevmTestnet,
        Chain::ZksyncMainnet,
        Chain::ZksyncTestnet,
        Chain::EvmDevnet,
        Chain::BitcoinMainnet,
        Chain::BitcoinTestnet,
        Chain::PolkadotMainnet,
        Chain::KusamaMainnet,
        Chain::NearMainnet,
        Chain::NearTestnet,
        Chain::StarknetMainnet,
    ];

    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn info(self) -> &'static ChainInfo {
        use ChainFamily::{Evm, Other, Substrate, Utxo};

        match self {
            Chain::EthereumMainnet => &ChainInfo {
                code: "ethereum",
                name: "Ethereum",
                family: Evm,
                net_version: Some("1"),
                chain_id: Some("0x1"),
            },
            Chain::EthereumClassicMainnet => &ChainInfo {
                code: "ethereum-classic",
                name: "Ethereum Classic",
                family: Evm,
                net_version: Some("1"),
                chain_id: Some("0x3d"),
            },
            Chain::EthereumMorden => &ChainInfo {
                code: "morden",
                name: "Morden Testnet",
                family: Evm,
                net_version: Some("2"),
                chain_id: Some("0x3c"),
            },
            Chain::EthereumRopsten => &ChainInfo {
                code: "ropsten",
                name: "Ropsten Testnet",
                family: Evm,
                net_version: Some("3"),
                chain_id: Some("0x3"),
            },
            Chain::EthereumRinkeby => &ChainInfo {
                code: "rinkeby",
                name: "Rinkeby Testnet",
                family: Evm,
                net_version: Some("4"),
                chain_id: Some("0x4"),
            },
            Chain::EthereumKovan => &ChainInfo {
                code: "kovan",
                name: "Kovan Testnet",
                family: Evm,
                net_version: Some("42"),
                chain_id: Some("0x2a"),
            },
            Chain::EthereumGoerli => &ChainInfo {
                code: "goerli",
                name: "Goerli Testnet",
                family: Evm,
                net_version: Some("5"),
                chain_id: Some("0x5"),
            },
            Chain::EthereumSepolia => &ChainInfo {
                code: "sepolia",
                name: "Sepolia Testnet",
                family: Evm,
                net_version: Some("11155111"),
                chain_id: Some("0xaa36a7"),
            },
            Chain::PolygonPosMainnet => &ChainInfo {
                code: "polygon",
                name: "Polygon PoS",
                family: Evm,
                net_version: Some("137"),
                chain_id: Some("0x89"),
            },
            Chain::PolygonPosMumbai => &ChainInfo {
                code: "polygon-mumbai",
                name: "Polygon Mumbai",
                family: Evm,
                net_version: Some("80001"),
                chain_id: Some("0x13881"),
            },
            Chain::ArbitrumMainnet => &ChainInfo {
                code: "arbitrum",
                name: "Arbitrum One",
                family: Evm,
                net_version: Some("42161"),
                chain_id: Some("0xa4b1"),
            },
            Chain::ArbitrumGoerli => &ChainInfo {
                code: "arbitrum-goerli",
                name: "Arbitrum Goerli",
                family: Evm,
                net_version: Some("421613"),
                chain_id: Some("0x66eed"),
            },
            Chain::ArbitrumNovaMainnet => &ChainInfo {
                code: "arbitrum-nova",
                name: "Arbitrum Nova",
                family: Evm,
                net_version: Some("42170"),
                chain_id: Some("0xa4ba"),
            },
            Chain::OptimismMainnet => &ChainInfo {
                code: "optimism",
                name: "Optimism",
                family: Evm,
                net_version: Some("10"),
                chain_id: Some("0xa"),
            },
            Chain::OptimismGoerli => &ChainInfo {
                code: "optimism-goerli",
                name: "Optimism Goerli",
                family: Evm,
                net_version: Some("420"),
                chain_id: Some("0x1A4"),
            },
            Chain::PolygonZkevmMainnet => &ChainInfo {
                code: "polygon-zkevm",
                name: "Polygon zkEVM",
                family: Evm,
                net_version: Some("1101"),
                chain_id: Some("0x44d"),
            },
            Chain::PolygonZkevmTestnet => &ChainInfo {
                code: "polygon-zkevm-testnet",
                name: "Polygon zkEVM Testnet",
                family: Evm,
                net_version: Some("1442"),
                chain_id: Some("0x5a2"),
            },
            Chain::ZksyncMainnet => &ChainInfo {
                code: "zksync",
                name: "zkSync Era",
                family: Evm,
                net_version: Some("324"),
                chain_id: Some("0x144"),
            },
            Chain::ZksyncTestnet => &ChainInfo {
                code: "zksync-testnet",
                name: "zkSync Era Testnet",
                family: Evm,
                net_version: Some("280"),
                chain_id: Some("0x118"),
            },
            Chain::EvmDevnet => &ChainInfo {
                code: "evm-devnet",
                name: "EVM Devnet",
                family: Evm,
                net_version: None,
                chain_id: None,
            },
            Chain::BitcoinMainnet => &ChainInfo {
                code: "bitcoin",
                name: "Bitcoin",
                family: Utxo,
                net_version: None,
                chain_id: None,
            },
            Chain::BitcoinTestnet => &ChainInfo {
                code: "bitcoin-testnet",
                name: "Bitcoin Testnet",
                family: Utxo,
                net_version: None,
                chain_id: None,
            },
            Chain::PolkadotMainnet => &ChainInfo {
                code: "polkadot",
                name: "Polkadot",
                family: Substrate,
                net_version: None,
                chain_id: None,
            },
            Chain::KusamaMainnet => &ChainInfo {
                code: "kusama",
                name: "Kusama",
                family: Substrate,
                net_version: None,
                chain_id: None,
            },
            Chain::NearMainnet => &ChainInfo {
                code: "near",
                name: "NEAR",
                family: Other,
                net_version: None,
                chain_id: None,
            },
            Chain::NearTestnet => &ChainInfo {
                code: "near-testnet",
                name: "NEAR Testnet",
                family: Other,
                net_version: None,
                chain_id: None,
            },
            Chain::StarknetMainnet => &ChainInfo {
                code: "starknet",
                name: "Starknet",
                family: Other,
                net_version: None,
                chain_id: None,
            },
        }
    }

    #[inline]
    #[must_use]
    pub fn code(self) -> &'static str {
        self.info().code
    }

    #[inline]
    #[must_use]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    #[inline]
    #[must_use]
    pub fn family(self) -> ChainFamily {
        self.info().family
    }

    #[inline]
    #[must_use]
    pub fn net_version(self) -> Option<&'static str> {
        self.info().net_version
    }

    #[inline]
    #[must_use]
    pub fn chain_id(self) -> Option<&'static str> {
        self.info().chain_id
    }
}

/// Error returned when a configuration string names no known chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown chain: {0}")]
pub struct UnknownChain(pub String);

impl FromStr for Chain {
    type Err = UnknownChain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Chain::ALL
            .iter()
            .copied()
            .find(|chain| chain.code() == wanted)
            .ok_or_else(|| UnknownChain(s.to_string()))
    }
}

impl TryFrom<String> for Chain {
    type Error = UnknownChain;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Chain> for String {
    fn from(chain: Chain) -> Self {
        chain.code().to_string()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
