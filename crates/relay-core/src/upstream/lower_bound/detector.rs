use super::{
    JsonRpcReader, LowerBoundData, LowerBoundKind, LowerBoundProbe, LowerBoundSearch, LowerBounds,
    TxLowerBoundProbe,
};
use crate::{
    chain::HeadTracker,
    config::LowerBoundConfig,
    upstream::{errors::UpstreamError, identity::UpstreamId},
};
use ahash::AHashMap;
use parking_lot::Mutex;
use std::{fmt, sync::Arc, time::Duration};
use tokio::{sync::broadcast, task::JoinHandle, time::interval};
use tracing::{debug, info, trace, warn};

/// Periodically searches the lower bound of every configured data kind of one upstream.
///
/// A round that hits an inconclusive probe error keeps its search state, and the next round
/// continues where it stopped instead of starting over from the head.
#[derive(Clone)]
pub struct LowerBoundDetector {
    upstream: UpstreamId,
    reader: Arc<dyn JsonRpcReader>,
    head: Arc<HeadTracker>,
    probes: Vec<Arc<dyn LowerBoundProbe>>,
    bounds: Arc<LowerBounds>,
    pending: Arc<Mutex<AHashMap<LowerBoundKind, LowerBoundSearch>>>,
    period: Duration,
    max_offset: u64,
}

impl LowerBoundDetector {
    /// Creates a detector for transaction data.
    #[must_use]
    pub fn new(
        upstream: UpstreamId,
        reader: Arc<dyn JsonRpcReader>,
        head: Arc<HeadTracker>,
        config: &LowerBoundConfig,
    ) -> Self {
        Self {
            upstream,
            reader,
            head,
            probes: vec![Arc::new(TxLowerBoundProbe)],
            bounds: Arc::new(LowerBounds::new()),
            pending: Arc::new(Mutex::new(AHashMap::new())),
            period: config.period(),
            max_offset: config.max_offset,
        }
    }

    /// Replaces the probed data kinds.
    #[must_use]
    pub fn with_probes(mut self, probes: Vec<Arc<dyn LowerBoundProbe>>) -> Self {
        self.probes = probes;
        self
    }

    #[must_use]
    pub fn with_bounds(mut self, bounds: Arc<LowerBounds>) -> Self {
        self.bounds = bounds;
        self
    }

    #[must_use]
    pub fn bounds(&self) -> Arc<LowerBounds> {
        Arc::clone(&self.bounds)
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawns the periodic detection loop. The first round runs immediately.
    #[must_use]
    pub fn start_with_shutdown(&self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let detector = self.clone();

        tokio::spawn(async move {
            let mut interval = interval(detector.period);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        detector.detect_once().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!(upstream = %detector.upstream, "lower bound detector shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Runs one detection round for every kind and returns the bounds found in it.
    pub async fn detect_once(&self) -> Vec<LowerBoundData> {
        let Some(head) = self.head.height() else {
            debug!(upstream = %self.upstream, "no head yet, skipping lower bound detection");
            return Vec::new();
        };

        let mut detected = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            let kind = probe.kind();
            let search =
                self.pending.lock().remove(&kind).unwrap_or_else(|| LowerBoundSearch::new(head));

            match self.run_search(probe.as_ref(), search).await {
                Ok(bound) => {
                    debug!(
                        upstream = %self.upstream,
                        kind = %kind,
                        block = bound,
                        "lower bound detected"
                    );
                    detected.push(self.bounds.update(bound, kind));
                }
                Err((search, e)) => {
                    warn!(
                        upstream = %self.upstream,
                        kind = %kind,
                        error = %e,
                        "lower bound probe failed, resuming next round"
                    );
                    self.pending.lock().insert(kind, search);
                }
            }
        }
        detected
    }

    async fn run_search(
        &self,
        probe: &dyn LowerBoundProbe,
        mut search: LowerBoundSearch,
    ) -> Result<u64, (LowerBoundSearch, UpstreamError)> {
        while let Some(height) = search.next_probe() {
            match self.probe_with_offset(probe, height, search.available()).await {
                Ok(Some(available)) => search.record(available, true),
                Ok(None) => search.record(height, false),
                Err(e) => return Err((search, e)),
            }
        }
        Ok(search.result().unwrap_or_else(|| search.available()))
    }

    /// Probes `height`; if it looks pruned, probes the following heights below `known_available`
    /// and returns the first available one.
    async fn probe_with_offset(
        &self,
        probe: &dyn LowerBoundProbe,
        height: u64,
        known_available: u64,
    ) -> Result<Option<u64>, UpstreamError> {
        let reader = self.reader.as_ref();
        let last = height.saturating_add(self.max_offset).min(known_available.saturating_sub(1));

        for candidate in height..=last.max(height) {
            let available = probe.probe(reader, candidate).await?;
            trace!(
                upstream = %self.upstream,
                kind = %probe.kind(),
                block = candidate,
                available,
                "lower bound probe"
            );
            if available {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

impl fmt::Debug for LowerBoundDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LowerBoundDetector")
            .field("upstream", &self.upstream)
            .field("probes", &self.probes)
            .field("period", &self.period)
            .field("max_offset", &self.max_offset)
            .finish_non_exhaustive()
    }
}
