//! Integration tests for lower-bound detection against simulated nodes.

use crate::mock_reader::MockNode;
use relay_core::{
    chain::HeadTracker,
    config::LowerBoundConfig,
    upstream::{
        LowerBoundDetector, LowerBoundKind, LowerBoundProbe, StateLowerBoundProbe,
        TxLowerBoundProbe, UpstreamId,
    },
};
use std::{sync::Arc, time::Duration};
use tokio::sync::broadcast;

fn detector(node: Arc<MockNode>, head: u64, config: &LowerBoundConfig) -> LowerBoundDetector {
    let tracker = Arc::new(HeadTracker::new("pruned-node"));
    tracker.observe(head, None);
    let probes: Vec<Arc<dyn LowerBoundProbe>> =
        vec![Arc::new(TxLowerBoundProbe), Arc::new(StateLowerBoundProbe)];
    LowerBoundDetector::new(UpstreamId::new("pruned-node").unwrap(), node, tracker, config)
        .with_probes(probes)
}

#[tokio::test]
async fn test_detects_each_kind_independently() {
    let node = Arc::new(MockNode::new(17_000_000, 18_900_000));
    let detector = detector(Arc::clone(&node), 19_000_000, &LowerBoundConfig::default());

    let detected = detector.detect_once().await;
    assert_eq!(detected.len(), 2);

    let bounds = detector.bounds();
    assert_eq!(bounds.get(LowerBoundKind::Tx).unwrap().bound, 17_000_000);
    assert_eq!(bounds.get(LowerBoundKind::State).unwrap().bound, 18_900_000);

    let all: Vec<_> = bounds.all().into_iter().map(|data| data.kind).collect();
    assert_eq!(all, vec![LowerBoundKind::Tx, LowerBoundKind::State]);
}

#[tokio::test]
async fn test_search_cost_is_logarithmic() {
    let node = Arc::new(MockNode::new(123_456, 123_456));
    let detector = detector(Arc::clone(&node), 20_000_000, &LowerBoundConfig::default());

    detector.detect_once().await;
    // two kinds, each an exponential walk plus a binary search, plus offset confirmations
    assert!(node.calls() < 2 * 64 * 21, "too many probes: {}", node.calls());
}

#[tokio::test]
async fn test_archive_node_reports_genesis() {
    let node = Arc::new(MockNode::new(0, 0));
    let detector = detector(node, 5_000, &LowerBoundConfig::default());

    detector.detect_once().await;
    assert_eq!(detector.bounds().get(LowerBoundKind::Tx).unwrap().bound, 0);
    assert_eq!(detector.bounds().get(LowerBoundKind::State).unwrap().bound, 0);
}

#[tokio::test(start_paused = true)]
async fn test_bound_moves_as_node_prunes() {
    let node = Arc::new(MockNode::new(1_000, 1_000));
    let config = LowerBoundConfig { period_seconds: 60, ..LowerBoundConfig::default() };
    let detector = detector(Arc::clone(&node), 100_000, &config);
    let mut updates = detector.bounds().subscribe();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let handle = detector.start_with_shutdown(shutdown_rx);

    for _ in 0..2 {
        assert_eq!(updates.recv().await.unwrap().bound, 1_000);
    }

    node.prune_to(40_000);
    for _ in 0..2 {
        assert_eq!(updates.recv().await.unwrap().bound, 40_000);
    }
    assert_eq!(detector.bounds().get(LowerBoundKind::Tx).unwrap().bound, 40_000);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
}
