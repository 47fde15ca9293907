//! Integration tests for call policies and quorum resolution.
//!
//! These tests verify that:
//! - Chain tables, operator overrides and upstream state decide where a call may go
//! - Hardcoded methods answer locally, with operator static responses taking precedence
//! - A simulated fan-out resolves each quorum strategy the way the router relies on

use relay_core::{
    chain::Chain,
    config::{ChainsConfig, MethodGroupsSettings, MethodSetting, MethodsSettings, UpstreamSettings},
    methods::{CallMethods, CallTargets, ManagedCallMethods, MethodsError},
    quorum::{CallQuorum, QuorumError, QuorumStrategy},
    types::{JsonRpcError, JsonRpcResponse},
    upstream::{Upstream, UpstreamAvailability, UpstreamBuilder, UpstreamError},
};
use serde_json::{json, Value};
use std::sync::Arc;

fn ok(value: Value) -> Result<JsonRpcResponse, UpstreamError> {
    Ok(JsonRpcResponse::success(value, Arc::new(json!(1))))
}

/// Upstream that is routable with the given lag.
fn routable(builder: &UpstreamBuilder, id: &str, lag: u64) -> Upstream {
    let upstream = builder.build(&UpstreamSettings::new(id, Chain::EthereumMainnet)).unwrap();
    upstream.state().set_status(UpstreamAvailability::Ok);
    upstream.state().set_lag(lag);
    upstream
}

#[test]
fn test_chain_tables_are_shared_between_upstreams() {
    let targets = Arc::new(CallTargets::new());
    let builder = UpstreamBuilder::new(ChainsConfig::default()).with_targets(Arc::clone(&targets));

    let a = builder.build(&UpstreamSettings::new("node-a", Chain::EthereumMainnet)).unwrap();
    let b = builder.build(&UpstreamSettings::new("node-b", Chain::EthereumMainnet)).unwrap();
    let c = builder.build(&UpstreamSettings::new("btc-a", Chain::BitcoinMainnet)).unwrap();

    assert!(Arc::ptr_eq(a.methods(), b.methods()));
    assert!(!Arc::ptr_eq(a.methods(), c.methods()));
    assert_eq!(targets.len(), 2);
}

#[test]
fn test_hardcoded_identity_literals() {
    let targets = CallTargets::new();

    let ethereum = targets.get(Chain::EthereumMainnet).unwrap();
    assert_eq!(ethereum.execute_hardcoded("eth_chainId").unwrap(), "\"0x1\"");
    assert_eq!(ethereum.execute_hardcoded("net_version").unwrap(), "\"1\"");

    let polygon = targets.get(Chain::PolygonPosMainnet).unwrap();
    assert_eq!(polygon.execute_hardcoded("eth_chainId").unwrap(), "\"0x89\"");

    let devnet = targets.get(Chain::EvmDevnet).unwrap();
    let err = devnet.execute_hardcoded("eth_chainId").unwrap_err();
    assert_eq!(err, MethodsError::InvalidChain(Chain::EvmDevnet));
    assert_eq!(err.to_rpc_error(), JsonRpcError::new(-32602, "Invalid chain"));

    let err = ethereum.execute_hardcoded("eth_call").unwrap_err();
    assert_eq!(err.to_rpc_error(), JsonRpcError::new(-32601, "Method not found"));
}

#[test]
fn test_operator_overrides_per_upstream() {
    let builder = UpstreamBuilder::new(ChainsConfig::default());
    let mut settings = UpstreamSettings::new("archive-1", Chain::EthereumMainnet);
    settings.methods = Some(MethodsSettings {
        enabled: vec![
            MethodSetting {
                name: "debug_traceTransaction".to_string(),
                quorum: Some(QuorumStrategy::NotLagging(2)),
                static_response: None,
            },
            MethodSetting {
                name: "eth_chainId".to_string(),
                quorum: None,
                static_response: Some("\"0x539\"".to_string()),
            },
        ],
        disabled: vec!["eth_getLogs".to_string()],
    });
    settings.method_groups = Some(MethodGroupsSettings {
        enabled: ["filter".to_string()].into_iter().collect(),
        disabled: Default::default(),
    });

    let archive = builder.build(&settings).unwrap();
    let plain = builder.build(&UpstreamSettings::new("plain-1", Chain::EthereumMainnet)).unwrap();

    let methods = archive.methods();
    assert!(methods.is_callable("debug_traceTransaction"));
    assert!(!plain.methods().is_callable("debug_traceTransaction"));
    assert_eq!(methods.quorum_for("debug_traceTransaction"), QuorumStrategy::NotLagging(2));

    assert!(!methods.is_callable("eth_getLogs"));
    assert!(plain.methods().is_callable("eth_getLogs"));

    assert!(methods.is_callable("eth_newFilter"));
    assert_eq!(methods.quorum_for("eth_newFilter"), QuorumStrategy::NotLagging(4));
    assert!(!methods.is_callable("trace_block"));

    assert_eq!(methods.execute_hardcoded("eth_chainId").unwrap(), "\"0x539\"");
    assert_eq!(plain.methods().execute_hardcoded("eth_chainId").unwrap(), "\"0x1\"");
}

#[test]
fn test_invalid_static_response_rejected_at_build() {
    let builder = UpstreamBuilder::new(ChainsConfig::default());
    let mut settings = UpstreamSettings::new("node-a", Chain::EthereumMainnet);
    settings.methods = Some(MethodsSettings {
        enabled: vec![MethodSetting {
            name: "eth_chainId".to_string(),
            quorum: None,
            static_response: Some("{not json".to_string()),
        }],
        disabled: Vec::new(),
    });

    let err = builder.build(&settings).unwrap_err();
    assert!(err.is_configuration_fatal());
}

#[test]
fn test_managed_methods_over_non_evm_chain() {
    let targets = CallTargets::new();
    let managed = ManagedCallMethods::builder(targets.get(Chain::BitcoinMainnet).unwrap())
        .disable("gettxout")
        .quorum("getblock", QuorumStrategy::NotNull)
        .static_response("getnetworkinfo", r#"{"version":270000}"#)
        .build()
        .unwrap();

    assert!(!managed.is_callable("gettxout"));
    assert_eq!(managed.quorum_for("getblock"), QuorumStrategy::NotNull);
    assert_eq!(managed.quorum_for("sendrawtransaction"), QuorumStrategy::Broadcast);
    assert!(managed.is_hardcoded("getnetworkinfo"));
    assert!(!managed.is_hardcoded("getblock"));
}

#[test]
fn test_fan_out_not_lagging_skips_behind_upstreams() {
    let builder = UpstreamBuilder::new(ChainsConfig::default());
    let upstreams = [
        routable(&builder, "node-a", 3),
        routable(&builder, "node-b", 0),
        routable(&builder, "node-c", 1),
    ];

    let strategy = builder.chain_quorum(Chain::EthereumMainnet, "eth_getBalance").unwrap();
    assert_eq!(strategy, QuorumStrategy::NotLagging(0));

    let eligible: Vec<_> = upstreams.iter().filter(|u| u.accepts(strategy)).collect();
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].id().as_str(), "node-b");

    let mut quorum = CallQuorum::new(strategy);
    for upstream in &upstreams {
        let resolved = quorum.record(upstream.state().lag(), ok(json!("0x10")));
        if resolved {
            break;
        }
    }
    assert_eq!(quorum.finish().unwrap().result, Some(json!("0x10")));
}

#[test]
fn test_fan_out_broadcast_reaches_every_upstream() {
    let builder = UpstreamBuilder::new(ChainsConfig::default());
    let upstreams: Vec<_> = (0..3).map(|i| routable(&builder, &format!("node-{i}"), i)).collect();

    let strategy = builder.chain_quorum(Chain::EthereumMainnet, "eth_sendRawTransaction").unwrap();
    let mut quorum = CallQuorum::new(strategy);
    let mut sent = 0;
    for upstream in upstreams.iter().filter(|u| u.accepts(strategy)) {
        if !quorum.wants_more() {
            break;
        }
        sent += 1;
        quorum.record(upstream.state().lag(), ok(json!("0xabc")));
    }

    assert_eq!(sent, 3);
    assert!(quorum.is_resolved());
    assert_eq!(quorum.successes(), 3);
}

#[test]
fn test_fan_out_not_null_waits_for_indexed_upstream() {
    let builder = UpstreamBuilder::new(ChainsConfig::default());
    let strategy =
        builder.chain_quorum(Chain::EthereumMainnet, "eth_getTransactionReceipt").unwrap();
    assert_eq!(strategy, QuorumStrategy::NotNull);

    let mut quorum = CallQuorum::new(strategy);
    assert!(!quorum.record(0, ok(Value::Null)));
    assert!(!quorum.record(0, Err(UpstreamError::Timeout)));
    assert!(quorum.record(0, ok(json!({"status": "0x1"}))));
    assert_eq!(quorum.finish().unwrap().result, Some(json!({"status": "0x1"})));

    // nobody has it indexed yet
    let mut quorum = CallQuorum::new(strategy);
    quorum.record(0, ok(Value::Null));
    let response = quorum.finish().unwrap();
    assert!(response.is_null_result());
}

#[test]
fn test_fan_out_failures() {
    let mut quorum = CallQuorum::new(QuorumStrategy::Always);
    quorum.record(0, Err(UpstreamError::Timeout));
    assert_eq!(quorum.finish(), Err(QuorumError::Upstream(UpstreamError::Timeout)));

    let mut quorum = CallQuorum::new(QuorumStrategy::NotLagging(1));
    quorum.record(5, ok(json!(1)));
    quorum.record(9, ok(json!(1)));
    assert_eq!(quorum.finish(), Err(QuorumError::AllLagging(2)));

    assert_eq!(CallQuorum::new(QuorumStrategy::Always).finish(), Err(QuorumError::NoResponse));
}
