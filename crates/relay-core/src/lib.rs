//! # Relay Core
//!
//! Routing and consistency core of a multi-chain JSON-RPC gateway.
//!
//! The gateway receives calls for a logical chain and serves them from several redundant
//! upstream nodes of varying freshness. This crate decides which upstreams may be used and how
//! their answers are reconciled; it never performs network I/O itself.
//!
//! - **[`upstream`]**: upstream identity, node id allocation, the availability state machine,
//!   head liveness validation and lower-bound detection.
//!
//! - **[`methods`]**: per-chain call policies (callable methods, quorum per method, hardcoded
//!   responses, method groups) and the operator override layer.
//!
//! - **[`quorum`]**: quorum strategies and the per-call reducer that combines upstream answers.
//!
//! - **[`stream`]**: incremental classification of upstream HTTP bodies.
//!
//! - **[`chain`]**: chain identities, families and per-upstream head tracking.
//!
//! - **[`config`]**: configuration loading and validation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        request router                        │
//! │   quorum_for / is_callable         accepts(quorum)           │
//! └────────┬────────────────────────────────┬────────────────────┘
//!          │                                │
//!  ┌───────▼────────┐              ┌────────▼─────────┐
//!  │  CallMethods   │              │     Upstream     │
//!  │ (CallTargets,  │              │ UpstreamState    │◄── chain status, lag
//!  │  Managed...)   │              │ HeadTracker      │◄── heads
//!  └────────────────┘              │ liveness flag    │◄── HeadLivenessValidator
//!                                  │ LowerBounds      │◄── LowerBoundDetector
//!                                  └────────┬─────────┘
//!                                           │ raw HTTP body
//!                                  ┌────────▼─────────┐      ┌────────────┐
//!                                  │  stream::classify├─────►│ CallQuorum │
//!                                  └──────────────────┘      └────────────┘
//! ```

pub mod chain;
pub mod config;
pub mod logging;
pub mod methods;
pub mod quorum;
pub mod stream;
pub mod types;
pub mod upstream;
