//! Head liveness: is the height reported by an upstream actually moving forward one block at a
//! time?
//!
//! [`LivenessWindow`] holds the pure detection rule. [`HeadLivenessValidator`] runs it over a
//! live height stream with a timeout, as a long-lived task per upstream.

use super::identity::UpstreamId;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time::{sleep, Instant},
};
use tracing::{debug, info, warn};

/// Default number of heights that must advance consecutively before an upstream is live.
pub const DEFAULT_CHECKED_BLOCKS_UNTIL_LIVE: usize = 3;

/// Sliding window over the last two observed heights.
#[derive(Debug, Clone)]
pub struct LivenessWindow {
    previous: Option<u64>,
    consecutive: usize,
    threshold: usize,
}

impl LivenessWindow {
    /// `checked_blocks_until_live` heights in a row make `checked_blocks_until_live - 1`
    /// consecutive pairs, which is the threshold for reporting `true`.
    #[must_use]
    pub fn new(checked_blocks_until_live: usize) -> Self {
        Self {
            previous: None,
            consecutive: 0,
            threshold: checked_blocks_until_live.saturating_sub(1).max(1),
        }
    }

    /// Feeds one height.
    ///
    /// Returns `Some(true)` once enough consecutive pairs were seen (and for every consecutive
    /// pair after that), `Some(false)` on any gap, repeat or step back, `None` while
    /// accumulating.
    pub fn observe(&mut self, height: u64) -> Option<bool> {
        let previous = self.previous.replace(height)?;

        if height.checked_sub(previous) == Some(1) {
            self.consecutive += 1;
            (self.consecutive >= self.threshold).then_some(true)
        } else {
            self.consecutive = 0;
            Some(false)
        }
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.consecutive = 0;
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

/// Supervises the head of one upstream and reports liveness on a channel.
#[derive(Debug, Clone)]
pub struct HeadLivenessValidator {
    upstream: UpstreamId,
    expected_block_time: Duration,
    checked_blocks_until_live: usize,
}

impl HeadLivenessValidator {
    #[must_use]
    pub fn new(
        upstream: UpstreamId,
        expected_block_time: Duration,
        checked_blocks_until_live: usize,
    ) -> Self {
        Self { upstream, expected_block_time, checked_blocks_until_live }
    }

    /// Longest time without a verdict before the upstream is reported not live.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        let blocks = u32::try_from(self.checked_blocks_until_live).unwrap_or(u32::MAX);
        self.expected_block_time.saturating_mul(2).saturating_mul(blocks)
    }

    /// Spawns the validation loop.
    ///
    /// Every verdict of the window is sent on `output`. When no verdict is produced within
    /// [`timeout`](Self::timeout), `false` is sent and detection restarts from an empty window.
    /// The task ends when `heights` ends, `output` is closed or shutdown is signalled.
    #[must_use]
    pub fn start_with_shutdown<S>(
        &self,
        heights: S,
        output: mpsc::Sender<bool>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()>
    where
        S: Stream<Item = u64> + Send + 'static,
    {
        let upstream = self.upstream.clone();
        let timeout = self.timeout();
        let mut window = LivenessWindow::new(self.checked_blocks_until_live);

        tokio::spawn(async move {
            let mut heights = Box::pin(heights);
            let deadline = sleep(timeout);
            tokio::pin!(deadline);
            let mut last: Option<bool> = None;

            loop {
                let verdict = tokio::select! {
                    height = heights.next() => {
                        let Some(height) = height else {
                            debug!(upstream = %upstream, "head source ended, stopping liveness");
                            break;
                        };
                        match window.observe(height) {
                            Some(live) => live,
                            None => continue,
                        }
                    }
                    () = &mut deadline => {
                        warn!(
                            upstream = %upstream,
                            timeout_secs = timeout.as_secs_f64(),
                            "no head progress within timeout"
                        );
                        window.reset();
                        false
                    }
                    _ = shutdown_rx.recv() => {
                        info!(upstream = %upstream, "liveness validator shutting down");
                        break;
                    }
                };

                deadline.as_mut().reset(Instant::now() + timeout);

                if last != Some(verdict) {
                    info!(upstream = %upstream, live = verdict, "head liveness changed");
                    last = Some(verdict);
                }
                if output.send(verdict).await.is_err() {
                    debug!(upstream = %upstream, "liveness receiver dropped");
                    break;
                }
            }
        })
    }
}
