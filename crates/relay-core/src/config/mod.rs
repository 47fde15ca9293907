//! Core configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: `#[serde(default)]` functions and `Default` implementations
//! 2. **Config file**: TOML file specified by the `RELAY_CONFIG` env var
//! 3. **Environment variables**: `RELAY__*` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - [`ChainsConfig`]: lag thresholds and expected block time, per chain with a shared default
//! - [`UpstreamSettings`]: upstream ids, node ids, roles, method overrides
//! - [`LivenessConfig`]: head-liveness validation
//! - [`LowerBoundConfig`]: lower-bound detection schedule
//! - [`LoggingConfig`]: log level and format
//!
//! # Example
//!
//! ```toml
//! [chains.default]
//! syncing_lag_size = 6
//! lagging_lag_size = 1
//!
//! [chains.chains.polygon]
//! expected_block_time_ms = 2000
//!
//! [[upstreams]]
//! id = "infura-main"
//! chain = "ethereum"
//!
//! [upstreams.methods]
//! enabled = [{ name = "debug_traceTransaction", quorum = "not_lagging:2" }]
//! disabled = ["eth_getLogs"]
//! ```

use crate::{
    chain::Chain,
    methods::CallTargets,
    quorum::QuorumStrategy,
    upstream::{
        identity::is_valid_id,
        state::{UpstreamOptions, UpstreamRole},
    },
};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    path::Path,
    time::Duration,
};
use thiserror::Error;

/// Configuration loading or validation failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

const DEFAULT_SYNCING_LAG_SIZE: u64 = 6;
const DEFAULT_LAGGING_LAG_SIZE: u64 = 1;
const DEFAULT_EXPECTED_BLOCK_TIME_MS: u64 = 12_000;

/// Fully resolved per-chain settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Lag beyond which an `Ok` upstream is reported as `Syncing`.
    pub syncing_lag_size: u64,
    /// Lag beyond which an `Ok` upstream is reported as `Lagging`.
    pub lagging_lag_size: u64,
    pub expected_block_time: Duration,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            syncing_lag_size: DEFAULT_SYNCING_LAG_SIZE,
            lagging_lag_size: DEFAULT_LAGGING_LAG_SIZE,
            expected_block_time: Duration::from_millis(DEFAULT_EXPECTED_BLOCK_TIME_MS),
        }
    }
}

/// Partially specified chain settings. Unset fields inherit from the layer below.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChainConfig {
    #[serde(default)]
    pub syncing_lag_size: Option<u64>,
    #[serde(default)]
    pub lagging_lag_size: Option<u64>,
    #[serde(default)]
    pub expected_block_time_ms: Option<u64>,
}

impl RawChainConfig {
    /// Field-by-field merge; values set in `patch` win.
    #[must_use]
    pub fn patch(&self, patch: &RawChainConfig) -> RawChainConfig {
        RawChainConfig {
            syncing_lag_size: patch.syncing_lag_size.or(self.syncing_lag_size),
            lagging_lag_size: patch.lagging_lag_size.or(self.lagging_lag_size),
            expected_block_time_ms: patch.expected_block_time_ms.or(self.expected_block_time_ms),
        }
    }

    /// Fills unset fields from the compiled defaults.
    #[must_use]
    pub fn resolve(&self) -> ChainConfig {
        ChainConfig {
            syncing_lag_size: self.syncing_lag_size.unwrap_or(DEFAULT_SYNCING_LAG_SIZE),
            lagging_lag_size: self.lagging_lag_size.unwrap_or(DEFAULT_LAGGING_LAG_SIZE),
            expected_block_time: Duration::from_millis(
                self.expected_block_time_ms.unwrap_or(DEFAULT_EXPECTED_BLOCK_TIME_MS),
            ),
        }
    }
}

/// Built-in block times for chains that are far off the 12 second default.
fn builtin_chain_config(chain: Chain) -> RawChainConfig {
    let (block_time_ms, syncing, lagging) = match chain {
        Chain::PolygonPosMainnet | Chain::PolygonPosMumbai => (2_000, 20, 10),
        Chain::ArbitrumMainnet | Chain::ArbitrumGoerli | Chain::ArbitrumNovaMainnet => {
            (250, 40, 20)
        }
        Chain::OptimismMainnet | Chain::OptimismGoerli => (2_000, 20, 10),
        Chain::PolygonZkevmMainnet | Chain::PolygonZkevmTestnet => (3_000, 20, 10),
        Chain::ZksyncMainnet | Chain::ZksyncTestnet => (1_000, 40, 20),
        Chain::BitcoinMainnet | Chain::BitcoinTestnet => (600_000, 3, 1),
        Chain::PolkadotMainnet | Chain::KusamaMainnet => (6_000, 6, 2),
        Chain::NearMainnet | Chain::NearTestnet => (1_000, 10, 5),
        _ => return RawChainConfig::default(),
    };
    RawChainConfig {
        syncing_lag_size: Some(syncing),
        lagging_lag_size: Some(lagging),
        expected_block_time_ms: Some(block_time_ms),
    }
}

/// Chain settings: a shared default plus per-chain overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainsConfig {
    #[serde(default)]
    pub default: RawChainConfig,
    #[serde(default)]
    pub chains: HashMap<Chain, RawChainConfig>,
}

impl ChainsConfig {
    /// Merges another layer over this one, chain by chain and field by field.
    #[must_use]
    pub fn patch(&self, patch: &ChainsConfig) -> ChainsConfig {
        let mut chains = self.chains.clone();
        for (chain, raw) in &patch.chains {
            let merged = chains.get(chain).map_or_else(|| raw.clone(), |base| base.patch(raw));
            chains.insert(*chain, merged);
        }
        ChainsConfig { default: self.default.patch(&patch.default), chains }
    }

    /// Resolves the effective settings of `chain`: compiled defaults, then built-in chain
    /// values, then the configured default, then the configured chain entry.
    #[must_use]
    pub fn resolve(&self, chain: Chain) -> ChainConfig {
        let mut raw = builtin_chain_config(chain).patch(&self.default);
        if let Some(specific) = self.chains.get(&chain) {
            raw = raw.patch(specific);
        }
        raw.resolve()
    }
}

/// One operator method override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSetting {
    pub name: String,
    #[serde(default)]
    pub quorum: Option<QuorumStrategy>,
    /// Literal JSON returned without contacting an upstream.
    #[serde(default, rename = "static")]
    pub static_response: Option<String>,
}

/// Per-upstream method overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodsSettings {
    #[serde(default)]
    pub enabled: Vec<MethodSetting>,
    #[serde(default)]
    pub disabled: Vec<String>,
}

/// Per-upstream method group overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodGroupsSettings {
    #[serde(default)]
    pub enabled: HashSet<String>,
    #[serde(default)]
    pub disabled: HashSet<String>,
}

/// An upstream as written by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamSettings {
    pub id: String,
    pub chain: Chain,
    #[serde(default)]
    pub node_id: Option<u8>,
    #[serde(default)]
    pub role: UpstreamRole,
    #[serde(default)]
    pub options: UpstreamOptions,
    #[serde(default)]
    pub methods: Option<MethodsSettings>,
    #[serde(default)]
    pub method_groups: Option<MethodGroupsSettings>,
}

impl UpstreamSettings {
    #[must_use]
    pub fn new(id: impl Into<String>, chain: Chain) -> Self {
        Self {
            id: id.into(),
            chain,
            node_id: None,
            role: UpstreamRole::default(),
            options: UpstreamOptions::default(),
            methods: None,
            method_groups: None,
        }
    }

    /// Whether any method or group override is present.
    #[must_use]
    pub fn has_method_overrides(&self) -> bool {
        self.methods.is_some() || self.method_groups.is_some()
    }
}

/// Head-liveness validation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Consecutive heights required before an upstream is reported live.
    #[serde(default = "default_checked_blocks_until_live")]
    pub checked_blocks_until_live: usize,
}

/// Lower-bound detection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowerBoundConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between detection rounds. Defaults to 180.
    #[serde(default = "default_lower_bound_period_seconds")]
    pub period_seconds: u64,

    /// Heights probed after an unavailable one before trusting the answer. Defaults to 20.
    #[serde(default = "default_max_offset")]
    pub max_offset: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` or `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_true() -> bool {
    true
}

fn default_checked_blocks_until_live() -> usize {
    3
}

fn default_lower_bound_period_seconds() -> u64 {
    180
}

fn default_max_offset() -> u64 {
    20
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self { enabled: true, checked_blocks_until_live: default_checked_blocks_until_live() }
    }
}

impl Default for LowerBoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period_seconds: default_lower_bound_period_seconds(),
            max_offset: default_max_offset(),
        }
    }
}

impl LowerBoundConfig {
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_seconds)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

/// Root configuration of the routing core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub chains: ChainsConfig,

    #[serde(default)]
    pub upstreams: Vec<UpstreamSettings>,

    #[serde(default)]
    pub liveness: LivenessConfig,

    #[serde(default)]
    pub lower_bound: LowerBoundConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Use `__` as a separator for nested fields (e.g.,
    /// `RELAY__LOWER_BOUND__PERIOD_SECONDS=60`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("RELAY").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Loads configuration from `config/relay.toml`, or the file named by `RELAY_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("RELAY_CONFIG").unwrap_or_else(|_| "config/relay.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Validates the configuration for correctness.
    ///
    /// Checks that:
    /// - upstream ids are well formed and unique
    /// - explicit node ids are unique per chain
    /// - lag thresholds are ordered for every configured chain
    /// - periods are non-zero and the logging format is known
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();
        let mut node_ids: HashSet<(Chain, u8)> = HashSet::new();

        for upstream in &self.upstreams {
            if !is_valid_id(&upstream.id) {
                return Err(ConfigError::Invalid(format!("Invalid upstream id: {}", upstream.id)));
            }
            if !CallTargets::supports(upstream.chain) {
                return Err(ConfigError::Invalid(format!(
                    "Chain {} has no call policy (upstream {})",
                    upstream.chain, upstream.id
                )));
            }
            if !ids.insert(upstream.id.as_str()) {
                return Err(ConfigError::Invalid(format!("Duplicate upstream id: {}", upstream.id)));
            }
            if let Some(node_id) = upstream.node_id {
                if node_id == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "Node id 0 is reserved (upstream {})",
                        upstream.id
                    )));
                }
                if !node_ids.insert((upstream.chain, node_id)) {
                    return Err(ConfigError::Invalid(format!(
                        "Duplicate node id {node_id} on chain {} (upstream {})",
                        upstream.chain, upstream.id
                    )));
                }
            }
        }

        let configured =
            self.upstreams.iter().map(|u| u.chain).chain(self.chains.chains.keys().copied());
        for chain in configured {
            let resolved = self.chains.resolve(chain);
            if resolved.lagging_lag_size > resolved.syncing_lag_size {
                return Err(ConfigError::Invalid(format!(
                    "Lagging lag size exceeds syncing lag size for chain {chain}"
                )));
            }
            if resolved.expected_block_time.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "Expected block time must be greater than 0 for chain {chain}"
                )));
            }
        }

        if self.liveness.checked_blocks_until_live < 2 {
            return Err(ConfigError::Invalid(
                "Liveness requires at least 2 checked blocks".to_string(),
            ));
        }

        if self.lower_bound.period_seconds == 0 {
            return Err(ConfigError::Invalid(
                "Lower bound period must be greater than 0".to_string(),
            ));
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err(ConfigError::Invalid(
                "Logging format must be 'json' or 'pretty'".to_string(),
            ));
        }

        Ok(())
    }
}
