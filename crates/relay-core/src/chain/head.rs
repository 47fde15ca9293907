//! Per-upstream head tracking.
//!
//! `HeadTracker` stores the most recent block an upstream reported and republishes every
//! observation (including repeated or lower heights) to subscribers. The liveness validator
//! consumes the raw sequence; lag computation reads the latest value.

use crate::types::Hash32;
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

const HEAD_CHANNEL_CAPACITY: usize = 64;

/// One observed head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    pub height: u64,
    pub hash: Option<Hash32>,
    pub observed_at: DateTime<Utc>,
}

/// Latest head of a single upstream.
///
/// Reads are wait-free (`ArcSwapOption`); every `observe` call is fanned out on a broadcast
/// channel whose slow receivers lose the oldest heights first.
pub struct HeadTracker {
    label: Arc<str>,
    head: ArcSwapOption<Head>,
    heights_tx: broadcast::Sender<u64>,
}

impl HeadTracker {
    #[must_use]
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        let (heights_tx, _) = broadcast::channel(HEAD_CHANNEL_CAPACITY);
        Self { label: label.into(), head: ArcSwapOption::empty(), heights_tx }
    }

    /// Records a head reported by the upstream.
    ///
    /// Returns `true` if the height moved forward.
    pub fn observe(&self, height: u64, hash: Option<Hash32>) -> bool {
        let head = Head { height, hash, observed_at: Utc::now() };
        let previous = self.head.swap(Some(Arc::new(head)));
        let advanced = previous.map_or(true, |prev| height > prev.height);

        trace!(upstream = %self.label, block = height, advanced, "head observed");
        let _ = self.heights_tx.send(height);
        advanced
    }

    #[must_use]
    pub fn current(&self) -> Option<Arc<Head>> {
        self.head.load_full()
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> Option<u64> {
        self.head.load().as_ref().map(|head| head.height)
    }

    /// Signed distance between `best_height` and this upstream's head.
    ///
    /// Negative when the upstream is ahead of the reference. `None` until a head was observed.
    #[must_use]
    pub fn lag_behind(&self, best_height: u64) -> Option<i64> {
        self.height().map(|height| {
            i64::try_from(best_height).unwrap_or(i64::MAX) -
                i64::try_from(height).unwrap_or(i64::MAX)
        })
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.heights_tx.subscribe()
    }

    /// Stream of future observed heights. Ends when the tracker is dropped.
    pub fn heights(&self) -> impl Stream<Item = u64> + Send + 'static {
        futures::stream::unfold(self.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(height) => return Some((height, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }
}

impl std::fmt::Debug for HeadTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadTracker")
            .field("label", &self.label)
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}
