//! Integration Tests for the Relay routing core
//!
//! This crate contains various test modules:
//!
//! - `upstream_lifecycle_tests`: building upstreams from configuration, status and lag handling,
//!   liveness supervision and shutdown
//! - `call_policy_tests`: per-chain call policies, operator overrides and quorum resolution
//! - `stream_classifier_tests`: response shape classification over chunked bodies
//! - `lower_bound_tests`: lower-bound detection against simulated pruned nodes
//! - `config_tests`: TOML loading, layering and validation
//! - `mock_reader`: scripted [`JsonRpcReader`](relay_core::upstream::JsonRpcReader)
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tests
//! ```

#[cfg(test)]
mod mock_reader;

#[cfg(test)]
mod upstream_lifecycle_tests;

#[cfg(test)]
mod call_policy_tests;

#[cfg(test)]
mod stream_classifier_tests;

#[cfg(test)]
mod lower_bound_tests;

#[cfg(test)]
mod config_tests;
