//! Integration tests for the upstream lifecycle.
//!
//! These tests verify that:
//! - Upstreams built from configuration get unique node ids and their chain settings
//! - Chain status and lag combine into the routed availability
//! - Head liveness supervision flips the live flag and stops on shutdown
//! - Disabled supervision is not started

use crate::mock_reader::MockNode;
use relay_core::{
    chain::Chain,
    config::{
        ChainsConfig, CoreConfig, LivenessConfig, LowerBoundConfig, RawChainConfig,
        UpstreamSettings,
    },
    quorum::QuorumStrategy,
    upstream::{LowerBoundKind, Upstream, UpstreamAvailability, UpstreamBuilder},
};
use std::{collections::HashSet, sync::Arc, time::Duration};
use tokio::sync::broadcast;

fn ethereum_upstream(id: &str) -> Upstream {
    let mut chains = ChainsConfig::default();
    chains.chains.insert(
        Chain::EthereumMainnet,
        RawChainConfig {
            syncing_lag_size: Some(6),
            lagging_lag_size: Some(1),
            expected_block_time_ms: Some(12_000),
        },
    );
    UpstreamBuilder::new(chains)
        .build(&UpstreamSettings::new(id, Chain::EthereumMainnet))
        .expect("valid upstream")
}

#[test]
fn test_build_all_assigns_unique_node_ids_per_chain() {
    let mut config = CoreConfig::default();
    for i in 0..20 {
        config.upstreams.push(UpstreamSettings::new(format!("eth-{i}"), Chain::EthereumMainnet));
        config.upstreams.push(UpstreamSettings::new(format!("poly-{i}"), Chain::PolygonPosMainnet));
    }
    config.validate().unwrap();

    let builder = UpstreamBuilder::new(config.chains.clone());
    let upstreams = builder.build_all(&config).unwrap();
    assert_eq!(upstreams.len(), 40);

    for chain in [Chain::EthereumMainnet, Chain::PolygonPosMainnet] {
        let ids: HashSet<u8> =
            upstreams.iter().filter(|u| u.chain() == chain).map(|u| u.node_id()).collect();
        assert_eq!(ids.len(), 20, "node ids must be unique on {chain}");
        assert!(!ids.contains(&0));
    }

    let polygon = upstreams.iter().find(|u| u.chain() == Chain::PolygonPosMainnet).unwrap();
    assert_eq!(polygon.state().chain_config().expected_block_time, Duration::from_secs(2));
}

#[test]
fn test_build_all_stops_on_invalid_upstream() {
    let mut config = CoreConfig::default();
    config.upstreams.push(UpstreamSettings::new("good-node", Chain::EthereumMainnet));
    config.upstreams.push(UpstreamSettings::new("!!", Chain::EthereumMainnet));

    let builder = UpstreamBuilder::new(config.chains.clone());
    let err = builder.build_all(&config).unwrap_err();
    assert!(err.is_configuration_fatal());
}

#[test]
fn test_released_node_id_is_reusable() {
    let builder = UpstreamBuilder::new(ChainsConfig::default());
    let mut settings = UpstreamSettings::new("node-a", Chain::EthereumMainnet);
    settings.node_id = Some(7);

    let first = builder.build(&settings).unwrap();
    assert_eq!(first.node_id(), 7);

    assert!(builder.release(&first));
    assert!(!builder.release(&first));

    let second = builder.build(&settings).unwrap();
    assert_eq!(second.node_id(), 7);
    assert!(builder.release(&second));
}

#[test]
fn test_status_follows_chain_status_and_lag() {
    let upstream = ethereum_upstream("node-a");
    let state = upstream.state();
    assert_eq!(state.status(), UpstreamAvailability::Unavailable);

    state.on_chain_status(Some(1));
    upstream.on_head(100, None);
    upstream.update_lag(100);
    assert_eq!(state.status(), UpstreamAvailability::Ok);

    upstream.update_lag(102);
    assert_eq!(state.status(), UpstreamAvailability::Lagging);
    assert!(upstream.accepts(QuorumStrategy::Always));
    assert!(!upstream.accepts(QuorumStrategy::NotLagging(1)));

    upstream.update_lag(110);
    assert_eq!(state.status(), UpstreamAvailability::Syncing);
    assert!(!upstream.accepts(QuorumStrategy::Always));

    // an upstream ahead of the reference head counts as fully synced
    upstream.update_lag(90);
    assert_eq!(state.lag(), 0);
    assert_eq!(state.status(), UpstreamAvailability::Ok);

    state.on_chain_status(Some(3));
    assert_eq!(state.status(), UpstreamAvailability::Immature);
    state.on_chain_status(None);
    assert_eq!(state.status(), UpstreamAvailability::Unavailable);
}

#[tokio::test]
async fn test_status_subscription_sees_distinct_changes() {
    let upstream = ethereum_upstream("node-a");
    let state = Arc::clone(upstream.state());
    state.set_lag(0);
    let mut changes = state.observe_status();

    state.set_status(UpstreamAvailability::Ok);
    state.set_lag(1);
    state.set_lag(3);
    state.set_lag(3);
    state.set_lag(20);

    assert_eq!(changes.recv().await, Some(UpstreamAvailability::Ok));
    assert_eq!(changes.recv().await, Some(UpstreamAvailability::Lagging));
    assert_eq!(changes.recv().await, Some(UpstreamAvailability::Syncing));
}

#[tokio::test(start_paused = true)]
async fn test_liveness_tracks_head_progress() {
    let upstream = ethereum_upstream("node-a");
    upstream.state().set_status(UpstreamAvailability::Ok);
    upstream.state().set_lag(0);
    let (shutdown_tx, _) = broadcast::channel(1);

    let handle =
        upstream.start_liveness(&LivenessConfig::default(), shutdown_tx.subscribe()).unwrap();
    assert!(upstream.is_live());

    // no heads for longer than 12s * 2 * 3
    tokio::time::sleep(Duration::from_secs(80)).await;
    assert!(!upstream.is_live());
    assert!(!upstream.accepts(QuorumStrategy::Always));

    for height in 100..=102 {
        upstream.on_head(height, None);
    }
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(upstream.is_live());
    assert!(upstream.accepts(QuorumStrategy::Always));

    upstream.on_head(105, None);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!upstream.is_live());

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_disabled_supervision_is_not_started() {
    let upstream = ethereum_upstream("node-a");
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let liveness = LivenessConfig { enabled: false, ..LivenessConfig::default() };
    assert!(upstream.start_liveness(&liveness, shutdown_tx.subscribe()).is_none());

    let lower_bound = LowerBoundConfig { enabled: false, ..LowerBoundConfig::default() };
    let reader = Arc::new(MockNode::new(0, 0));
    assert!(upstream.start_lower_bounds(reader, &lower_bound, shutdown_tx.subscribe()).is_none());
}

#[tokio::test]
async fn test_lower_bounds_only_for_evm_upstreams() {
    let builder = UpstreamBuilder::new(ChainsConfig::default());
    let bitcoin = builder.build(&UpstreamSettings::new("btc-node", Chain::BitcoinMainnet)).unwrap();
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let reader = Arc::new(MockNode::new(0, 0));
    let handle =
        bitcoin.start_lower_bounds(reader, &LowerBoundConfig::default(), shutdown_tx.subscribe());
    assert!(handle.is_none());
    assert_eq!(bitcoin.lower_bound(LowerBoundKind::Tx), None);
}

#[tokio::test(start_paused = true)]
async fn test_lower_bounds_published_on_upstream() {
    let upstream = ethereum_upstream("node-a");
    upstream.on_head(1_000_000, None);
    let mut updates = upstream.lower_bounds().subscribe();
    let (shutdown_tx, _) = broadcast::channel(1);

    let reader = Arc::new(MockNode::new(250_000, 900_000));
    let handle = upstream
        .start_lower_bounds(reader, &LowerBoundConfig::default(), shutdown_tx.subscribe())
        .unwrap();

    let mut kinds = HashSet::new();
    for _ in 0..2 {
        kinds.insert(updates.recv().await.unwrap().kind);
    }
    assert_eq!(kinds.len(), 2);
    assert_eq!(upstream.lower_bound(LowerBoundKind::Tx), Some(250_000));
    assert_eq!(upstream.lower_bound(LowerBoundKind::State), Some(900_000));

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
}
