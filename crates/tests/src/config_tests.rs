//! Integration tests for configuration loading and validation.

use relay_core::{
    chain::Chain,
    config::{ChainsConfig, CoreConfig, RawChainConfig},
    quorum::QuorumStrategy,
    upstream::{UpstreamBuilder, UpstreamRole},
};
use std::{io::Write, time::Duration};

const CONFIG: &str = r#"
[chains.default]
syncing_lag_size = 8
lagging_lag_size = 2

[chains.chains.arbitrum]
syncing_lag_size = 60

[liveness]
checked_blocks_until_live = 4

[[upstreams]]
id = "alchemy-arb"
chain = "arbitrum"
role = "fallback"

[[upstreams]]
id = "own-archive"
chain = "ethereum"
node_id = 3

[upstreams.methods]
enabled = [{ name = "trace_block", quorum = "not_lagging:1" }]
disabled = ["eth_getLogs"]

[upstreams.method_groups]
enabled = ["debug"]
"#;

#[test]
fn test_file_to_upstreams() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();

    let config = CoreConfig::from_file(file.path()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.liveness.checked_blocks_until_live, 4);
    assert_eq!(config.lower_bound.period(), Duration::from_secs(180));

    let builder = UpstreamBuilder::new(config.chains.clone());
    let upstreams = builder.build_all(&config).unwrap();

    let arbitrum = &upstreams[0];
    assert_eq!(arbitrum.state().role(), UpstreamRole::Fallback);
    let resolved = arbitrum.state().chain_config();
    // configured default < configured chain, builtin fills the rest
    assert_eq!(resolved.syncing_lag_size, 60);
    assert_eq!(resolved.lagging_lag_size, 2);
    assert_eq!(resolved.expected_block_time, Duration::from_millis(250));

    let archive = &upstreams[1];
    assert_eq!(archive.node_id(), 3);
    assert!(archive.methods().is_callable("trace_block"));
    assert_eq!(archive.methods().quorum_for("trace_block"), QuorumStrategy::NotLagging(1));
    assert!(archive.methods().is_callable("debug_traceTransaction"));
    assert!(!archive.methods().is_callable("eth_getLogs"));
}

#[test]
fn test_validation_catches_conflicts() {
    let mut config: CoreConfig = toml::from_str(CONFIG).unwrap();
    config.upstreams[0].node_id = Some(3);
    config.upstreams[0].chain = Chain::EthereumMainnet;
    assert!(config.validate().is_err(), "duplicate node id on one chain");

    let mut config: CoreConfig = toml::from_str(CONFIG).unwrap();
    config.upstreams[1].id = "alchemy-arb".to_string();
    assert!(config.validate().is_err(), "duplicate upstream id");

    let mut config: CoreConfig = toml::from_str(CONFIG).unwrap();
    config.chains.chains.insert(
        Chain::PolygonPosMainnet,
        RawChainConfig {
            syncing_lag_size: Some(1),
            lagging_lag_size: Some(5),
            ..Default::default()
        },
    );
    assert!(config.validate().is_err(), "lagging threshold above syncing threshold");
}

#[test]
fn test_unknown_chain_is_rejected() {
    let toml = r#"
[[upstreams]]
id = "mystery"
chain = "dogecoin"
"#;
    assert!(toml::from_str::<CoreConfig>(toml).is_err());
}

#[test]
fn test_chains_patch_layers_field_by_field() {
    let base: ChainsConfig = toml::from_str(
        r#"
[default]
syncing_lag_size = 6

[chains.polygon]
lagging_lag_size = 4
"#,
    )
    .unwrap();
    let patch: ChainsConfig = toml::from_str(
        r#"
[default]
lagging_lag_size = 2

[chains.polygon]
expected_block_time_ms = 1500
"#,
    )
    .unwrap();

    let merged = base.patch(&patch);
    assert_eq!(merged.default.syncing_lag_size, Some(6));
    assert_eq!(merged.default.lagging_lag_size, Some(2));

    let polygon = merged.resolve(Chain::PolygonPosMainnet);
    assert_eq!(polygon.syncing_lag_size, 6);
    assert_eq!(polygon.lagging_lag_size, 4);
    assert_eq!(polygon.expected_block_time, Duration::from_millis(1500));
}

#[test]
fn test_chain_without_call_policy_fails_validation() {
    let toml = r#"
[[upstreams]]
id = "stark-node"
chain = "starknet"
"#;
    let config: CoreConfig = toml::from_str(toml).unwrap();
    assert!(config.validate().is_err());
}
