use super::{
    identity::{UpstreamId, UpstreamIdentity},
    liveness::HeadLivenessValidator,
    lower_bound::{
        JsonRpcReader, LowerBoundDetector, LowerBoundKind, LowerBoundProbe, LowerBounds,
        StateLowerBoundProbe, TxLowerBoundProbe,
    },
    state::{UpstreamAvailability, UpstreamState},
};
use crate::{
    chain::{Chain, ChainFamily, HeadTracker},
    config::{LivenessConfig, LowerBoundConfig},
    methods::CallMethods,
    quorum::QuorumStrategy,
    types::Hash32,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, trace};

/// A configured upstream of one chain.
///
/// Holds everything the router needs to decide whether to use it: availability state, head,
/// liveness flag, lower bounds and the call policy in effect for it. Supervisory tasks are
/// started explicitly with the `start_*` methods and stop on the shared shutdown signal.
pub struct Upstream {
    identity: UpstreamIdentity,
    chain: Chain,
    state: Arc<UpstreamState>,
    head: Arc<HeadTracker>,
    methods: Arc<dyn CallMethods>,
    lower_bounds: Arc<LowerBounds>,
    /// Last verdict of the liveness validator. Starts optimistic until a validator reports.
    live: Arc<AtomicBool>,
}

impl Upstream {
    #[must_use]
    pub fn new(
        identity: UpstreamIdentity,
        chain: Chain,
        state: UpstreamState,
        methods: Arc<dyn CallMethods>,
    ) -> Self {
        let head = Arc::new(HeadTracker::new(identity.id.as_str()));
        Self {
            identity,
            chain,
            state: Arc::new(state),
            head,
            methods,
            lower_bounds: Arc::new(LowerBounds::new()),
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    #[must_use]
    pub fn id(&self) -> &UpstreamId {
        &self.identity.id
    }

    #[must_use]
    pub fn node_id(&self) -> u8 {
        self.identity.node_id
    }

    #[must_use]
    pub fn identity(&self) -> &UpstreamIdentity {
        &self.identity
    }

    #[must_use]
    pub fn chain(&self) -> Chain {
        self.chain
    }

    #[must_use]
    pub fn state(&self) -> &Arc<UpstreamState> {
        &self.state
    }

    #[must_use]
    pub fn head(&self) -> &Arc<HeadTracker> {
        &self.head
    }

    #[must_use]
    pub fn methods(&self) -> &Arc<dyn CallMethods> {
        &self.methods
    }

    #[must_use]
    pub fn lower_bounds(&self) -> &Arc<LowerBounds> {
        &self.lower_bounds
    }

    #[must_use]
    pub fn lower_bound(&self, kind: LowerBoundKind) -> Option<u64> {
        self.lower_bounds.get(kind).map(|data| data.bound)
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Relaxed)
    }

    /// Records a head reported by the node.
    pub fn on_head(&self, height: u64, hash: Option<Hash32>) {
        self.head.observe(height, hash);
    }

    /// Recomputes the lag against the best height known for the chain.
    pub fn update_lag(&self, best_height: u64) {
        if let Some(lag) = self.head.lag_behind(best_height) {
            trace!(upstream = %self.identity.id, lag, "lag updated");
            self.state.set_lag_signed(lag);
        }
    }

    /// Whether a call governed by `quorum` may be sent to this upstream right now.
    #[must_use]
    pub fn accepts(&self, quorum: QuorumStrategy) -> bool {
        self.state.is_available() && self.is_live() && quorum.accepts_lag(self.state.lag())
    }

    /// Whether the upstream may serve `method` at all.
    #[must_use]
    pub fn can_serve(&self, method: &str) -> bool {
        self.methods.is_callable(method) &&
            self.state.status() != UpstreamAvailability::Unavailable
    }

    /// Spawns the head liveness validator and the task that keeps [`is_live`](Self::is_live)
    /// current. Returns the validator's handle, or `None` when liveness checks are disabled.
    #[must_use]
    pub fn start_liveness(
        &self,
        config: &LivenessConfig,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Option<JoinHandle<()>> {
        if !config.enabled {
            debug!(upstream = %self.identity.id, "liveness validation disabled");
            return None;
        }

        let validator = HeadLivenessValidator::new(
            self.identity.id.clone(),
            self.state.chain_config().expected_block_time,
            config.checked_blocks_until_live,
        );
        let (tx, mut rx) = mpsc::channel(16);
        let handle = validator.start_with_shutdown(self.head.heights(), tx, shutdown_rx);

        let live = Arc::clone(&self.live);
        let upstream = self.identity.id.clone();
        tokio::spawn(async move {
            while let Some(verdict) = rx.recv().await {
                live.store(verdict, Ordering::Relaxed);
            }
            debug!(upstream = %upstream, "liveness updates ended");
        });

        Some(handle)
    }

    /// Spawns the lower-bound detector, publishing into [`lower_bounds`](Self::lower_bounds).
    ///
    /// EVM upstreams are probed for transaction and state data. Returns `None` when detection
    /// is disabled globally, for this upstream, or for its chain family.
    #[must_use]
    pub fn start_lower_bounds(
        &self,
        reader: Arc<dyn JsonRpcReader>,
        config: &LowerBoundConfig,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Option<JoinHandle<()>> {
        if !config.enabled ||
            !self.state.options().detect_lower_bounds ||
            self.chain.family() != ChainFamily::Evm
        {
            debug!(upstream = %self.identity.id, "lower bound detection disabled");
            return None;
        }

        let probes: Vec<Arc<dyn LowerBoundProbe>> =
            vec![Arc::new(TxLowerBoundProbe), Arc::new(StateLowerBoundProbe)];
        let head = Arc::clone(&self.head);
        let detector = LowerBoundDetector::new(self.identity.id.clone(), reader, head, config)
            .with_probes(probes)
            .with_bounds(Arc::clone(&self.lower_bounds));
        Some(detector.start_with_shutdown(shutdown_rx))
    }
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("id", &self.identity.id)
            .field("node_id", &self.identity.node_id)
            .field("chain", &self.chain)
            .field("status", &self.state.status())
            .field("live", &self.is_live())
            .finish_non_exhaustive()
    }
}
