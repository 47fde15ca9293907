//! Upstream availability state machine.
//!
//! Each upstream keeps a status triple `(lag, raw, derived)`:
//!
//! - `raw` is what the upstream itself (or its transport) reports;
//! - `lag` is how many blocks the upstream is behind the best known head;
//! - `derived` is what routing uses: a healthy upstream is downgraded to `Lagging` or `Syncing`
//!   when its lag crosses the chain's thresholds.
//!
//! The triple is one immutable value behind an `ArcSwap`, so readers never observe a lag from
//! one update combined with a status from another. Every update publishes the derived value on
//! a best-effort broadcast channel; subscribers see only changes.

use super::identity::UpstreamId;
use crate::config::ChainConfig;
use arc_swap::ArcSwap;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};
use tokio::sync::broadcast;
use tracing::trace;

const STATUS_CHANNEL_CAPACITY: usize = 32;

/// Availability of an upstream, ordered from best to worst.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpstreamAvailability {
    Ok,
    Lagging,
    Immature,
    Syncing,
    #[default]
    Unavailable,
}

impl UpstreamAvailability {
    /// Maps a numeric availability code as reported by remote gateways.
    ///
    /// `1..=5` map to `Ok`..`Unavailable`; anything else (including the "unknown" code 0) is
    /// treated as `Unavailable`.
    #[must_use]
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(1) => Self::Ok,
            Some(2) => Self::Lagging,
            Some(3) => Self::Immature,
            Some(4) => Self::Syncing,
            _ => Self::Unavailable,
        }
    }

    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Ok => 1,
            Self::Lagging => 2,
            Self::Immature => 3,
            Self::Syncing => 4,
            Self::Unavailable => 5,
        }
    }

    /// Whether requests may be routed to an upstream in this state.
    #[must_use]
    pub fn is_routable(self) -> bool {
        matches!(self, Self::Ok | Self::Lagging)
    }
}

impl fmt::Display for UpstreamAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::Lagging => "LAGGING",
            Self::Immature => "IMMATURE",
            Self::Syncing => "SYNCING",
            Self::Unavailable => "UNAVAILABLE",
        };
        f.write_str(s)
    }
}

/// Routing role of an upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamRole {
    #[default]
    Primary,
    Secondary,
    Fallback,
}

impl FromStr for UpstreamRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" | "standard" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            "fallback" => Ok(Self::Fallback),
            other => Err(format!("Unknown upstream role: {other}")),
        }
    }
}

/// Per-upstream behavioural switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamOptions {
    /// Trust the raw status as-is; never downgrade on lag.
    #[serde(default)]
    pub disable_validation: bool,

    /// Check the peer count of the node when validating it.
    #[serde(default = "default_true")]
    pub validate_peers: bool,

    /// Minimum peers required when `validate_peers` is set.
    #[serde(default = "default_min_peers")]
    pub min_peers: u32,

    /// Check that the node is not syncing when validating it.
    #[serde(default = "default_true")]
    pub validate_syncing: bool,

    /// Run the lower-bound detector for this upstream.
    #[serde(default = "default_true")]
    pub detect_lower_bounds: bool,
}

fn default_true() -> bool {
    true
}

fn default_min_peers() -> u32 {
    1
}

impl Default for UpstreamOptions {
    fn default() -> Self {
        Self {
            disable_validation: false,
            validate_peers: true,
            min_peers: default_min_peers(),
            validate_syncing: true,
            detect_lower_bounds: true,
        }
    }
}

/// Immutable status triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamStatus {
    pub lag: u64,
    pub raw: UpstreamAvailability,
    pub derived: UpstreamAvailability,
}

/// Computes the routed availability from the raw status and lag.
#[must_use]
pub fn derive_availability(
    lag: u64,
    raw: UpstreamAvailability,
    chain: &ChainConfig,
    disable_validation: bool,
) -> UpstreamAvailability {
    if disable_validation || raw != UpstreamAvailability::Ok {
        return raw;
    }
    if lag > chain.syncing_lag_size {
        UpstreamAvailability::Syncing
    } else if lag > chain.lagging_lag_size {
        UpstreamAvailability::Lagging
    } else {
        UpstreamAvailability::Ok
    }
}

/// Shared, lock-free availability state of one upstream.
pub struct UpstreamState {
    id: UpstreamId,
    role: UpstreamRole,
    options: UpstreamOptions,
    chain_config: ChainConfig,
    status: ArcSwap<UpstreamStatus>,
    status_tx: broadcast::Sender<UpstreamAvailability>,
}

impl UpstreamState {
    /// Creates a state that starts `Unavailable` with an unknown (maximal) lag.
    #[must_use]
    pub fn new(id: UpstreamId, options: UpstreamOptions, chain_config: ChainConfig) -> Self {
        let initial = UpstreamStatus {
            lag: u64::MAX,
            raw: UpstreamAvailability::Unavailable,
            derived: UpstreamAvailability::Unavailable,
        };
        Self::with_status(id, options, chain_config, initial)
    }

    /// Creates a state that starts `Ok` with zero lag.
    #[must_use]
    pub fn new_available(
        id: UpstreamId,
        options: UpstreamOptions,
        chain_config: ChainConfig,
    ) -> Self {
        let initial = UpstreamStatus {
            lag: 0,
            raw: UpstreamAvailability::Ok,
            derived: UpstreamAvailability::Ok,
        };
        Self::with_status(id, options, chain_config, initial)
    }

    fn with_status(
        id: UpstreamId,
        options: UpstreamOptions,
        chain_config: ChainConfig,
        initial: UpstreamStatus,
    ) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            id,
            role: UpstreamRole::default(),
            options,
            chain_config,
            status: ArcSwap::from_pointee(initial),
            status_tx,
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: UpstreamRole) -> Self {
        self.role = role;
        self
    }

    #[must_use]
    pub fn id(&self) -> &UpstreamId {
        &self.id
    }

    #[must_use]
    pub fn role(&self) -> UpstreamRole {
        self.role
    }

    #[must_use]
    pub fn options(&self) -> &UpstreamOptions {
        &self.options
    }

    #[must_use]
    pub fn chain_config(&self) -> &ChainConfig {
        &self.chain_config
    }

    /// Derived availability.
    #[inline]
    #[must_use]
    pub fn status(&self) -> UpstreamAvailability {
        self.status.load().derived
    }

    #[inline]
    #[must_use]
    pub fn lag(&self) -> u64 {
        self.status.load().lag
    }

    /// Consistent copy of the whole triple.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> UpstreamStatus {
        **self.status.load()
    }

    #[inline]
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status().is_routable()
    }

    /// Replaces the raw status and recomputes the derived one.
    pub fn set_status(&self, raw: UpstreamAvailability) {
        self.update(|current| UpstreamStatus { raw, ..*current });
    }

    /// Maps a numeric availability code and applies it as the raw status.
    pub fn on_chain_status(&self, code: Option<i32>) {
        self.set_status(UpstreamAvailability::from_code(code));
    }

    /// Replaces the lag and recomputes the derived status.
    pub fn set_lag(&self, lag: u64) {
        self.update(|current| UpstreamStatus { lag, ..*current });
    }

    /// Like [`set_lag`](Self::set_lag) but accepts a signed distance; negative values (the
    /// upstream is ahead of the reference head) count as zero lag.
    pub fn set_lag_signed(&self, lag: i64) {
        self.set_lag(u64::try_from(lag).unwrap_or(0));
    }

    fn update(&self, change: impl Fn(&UpstreamStatus) -> UpstreamStatus) {
        let mut next = None;
        self.status.rcu(|current| {
            let mut updated = change(current);
            updated.derived = derive_availability(
                updated.lag,
                updated.raw,
                &self.chain_config,
                self.options.disable_validation,
            );
            let updated = Arc::new(updated);
            next = Some(Arc::clone(&updated));
            updated
        });

        if let Some(next) = next {
            trace!(
                upstream = %self.id,
                lag = next.lag,
                raw = %next.raw,
                status = %next.derived,
                "upstream status updated"
            );
            // no subscribers is fine
            let _ = self.status_tx.send(next.derived);
        }
    }

    /// Subscribes to future changes of the derived availability.
    #[must_use]
    pub fn observe_status(&self) -> StatusSubscription {
        StatusSubscription { rx: self.status_tx.subscribe(), last: None }
    }
}

impl fmt::Debug for UpstreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamState")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("status", &self.snapshot())
            .finish_non_exhaustive()
    }
}

/// Receiver of derived availability changes with consecutive duplicates suppressed.
pub struct StatusSubscription {
    rx: broadcast::Receiver<UpstreamAvailability>,
    last: Option<UpstreamAvailability>,
}

impl StatusSubscription {
    /// Waits for the next distinct availability. Returns `None` once the state is dropped.
    ///
    /// A receiver that fell behind jumps straight to the newest value.
    pub async fn recv(&mut self) -> Option<UpstreamAvailability> {
        loop {
            let value = match self.rx.recv().await {
                Ok(value) => value,
                Err(broadcast::error::RecvError::Lagged(_)) => match self.drain_to_newest() {
                    Some(value) => value,
                    None => continue,
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            };

            if self.last != Some(value) {
                self.last = Some(value);
                return Some(value);
            }
        }
    }

    fn drain_to_newest(&mut self) -> Option<UpstreamAvailability> {
        let mut newest = None;
        loop {
            match self.rx.try_recv() {
                Ok(value) => newest = Some(value),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return newest,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = UpstreamAvailability> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription.recv().await.map(|value| (value, subscription))
        })
    }
}
