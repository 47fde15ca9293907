//! Upstream nodes: identity, availability and supervision.
//!
//! An upstream is one backend node of a chain. This module covers everything tracked per
//! upstream:
//! - [`identity`]: validated operator id
//! - [`node_id`]: compact per-chain node id allocation
//! - [`state`]: lock-free availability state machine with change notifications
//! - [`liveness`]: head liveness validation
//! - [`lower_bound`]: detection of the oldest height still served
//! - [`endpoint`] / [`builder`]: the assembled [`Upstream`] and its construction from
//!   configuration
//!
//! # Status Derivation
//!
//! ```text
//! chain status ──► raw ──┐
//!                        ├──► derived = raw            if raw != OK or validation disabled
//! head lag ──────► lag ──┘             SYNCING         if lag > syncing_lag_size
//!                                      LAGGING         if lag > lagging_lag_size
//!                                      OK              otherwise
//! ```
//!
//! Supervisory tasks ([`HeadLivenessValidator`], [`LowerBoundDetector`]) follow the
//! `start_with_shutdown` convention: they are spawned on the runtime and stop when the shared
//! shutdown broadcast fires.

pub mod builder;
pub mod endpoint;
pub mod errors;
pub mod identity;
pub mod liveness;
pub mod lower_bound;
pub mod node_id;
pub mod state;

pub use builder::{BuilderError, UpstreamBuilder};
pub use endpoint::Upstream;
pub use errors::UpstreamError;
pub use identity::{UpstreamId, UpstreamIdentity};
pub use liveness::{HeadLivenessValidator, LivenessWindow};
pub use lower_bound::{
    JsonRpcReader, LowerBoundData, LowerBoundDetector, LowerBoundKind, LowerBoundProbe,
    LowerBoundSearch, LowerBounds, StateLowerBoundProbe, TxLowerBoundProbe,
};
pub use node_id::NodeIdAllocator;
pub use state::{
    StatusSubscription, UpstreamAvailability, UpstreamOptions, UpstreamRole, UpstreamState,
    UpstreamStatus,
};
