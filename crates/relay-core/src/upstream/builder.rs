//! Assembly of [`Upstream`]s from configuration.

use super::{
    endpoint::Upstream,
    errors::UpstreamError,
    identity::{UpstreamId, UpstreamIdentity},
    node_id::{seed_for, NodeIdAllocator},
    state::UpstreamState,
};
use crate::{
    chain::Chain,
    config::{ChainsConfig, CoreConfig, UpstreamSettings},
    methods::{CallMethods, CallTargets, ManagedCallMethods, MethodsError},
    quorum::QuorumStrategy,
};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Errors that can occur while building an upstream.
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Methods(#[from] MethodsError),
}

impl BuilderError {
    /// Every builder error aborts the upstream; this tells whether the whole chain is affected.
    #[must_use]
    pub fn is_configuration_fatal(&self) -> bool {
        match self {
            Self::Upstream(e) => e.is_configuration_fatal(),
            Self::Methods(_) => true,
        }
    }
}

/// Builds upstreams, allocating node ids per chain and sharing chain call policies.
///
/// # Examples
///
/// ```
/// use relay_core::{chain::Chain, config::{ChainsConfig, UpstreamSettings}};
/// use relay_core::upstream::UpstreamBuilder;
///
/// let builder = UpstreamBuilder::new(ChainsConfig::default());
/// let upstream = builder.build(&UpstreamSettings::new("infura-main", Chain::EthereumMainnet))?;
/// assert_ne!(upstream.node_id(), 0);
/// assert!(upstream.methods().is_callable("eth_call"));
/// # Ok::<(), relay_core::upstream::BuilderError>(())
/// ```
#[derive(Debug)]
pub struct UpstreamBuilder {
    chains: ChainsConfig,
    targets: Arc<CallTargets>,
    allocators: DashMap<Chain, NodeIdAllocator>,
}

impl UpstreamBuilder {
    #[must_use]
    pub fn new(chains: ChainsConfig) -> Self {
        Self { chains, targets: Arc::new(CallTargets::new()), allocators: DashMap::new() }
    }

    /// Shares an existing call-policy cache.
    #[must_use]
    pub fn with_targets(mut self, targets: Arc<CallTargets>) -> Self {
        self.targets = targets;
        self
    }

    #[must_use]
    pub fn targets(&self) -> &Arc<CallTargets> {
        &self.targets
    }

    /// Builds one upstream.
    ///
    /// The upstream starts `Unavailable`. Its node id stays reserved until
    /// [`release`](Self::release) is called.
    ///
    /// # Errors
    ///
    /// Fails on an invalid id, an exhausted node id space, a chain without call policy or an
    /// invalid static response override.
    pub fn build(&self, settings: &UpstreamSettings) -> Result<Upstream, BuilderError> {
        let id = UpstreamId::new(&settings.id)?;
        let methods = self.call_methods(settings)?;

        let node_id = self
            .allocators
            .entry(settings.chain)
            .or_default()
            .allocate(settings.node_id, seed_for(id.as_str()))?;

        let state = UpstreamState::new(
            id.clone(),
            settings.options.clone(),
            self.chains.resolve(settings.chain),
        )
        .with_role(settings.role);

        info!(
            upstream = %id,
            chain = %settings.chain,
            node_id,
            role = ?settings.role,
            "upstream configured"
        );

        Ok(Upstream::new(UpstreamIdentity { id, node_id }, settings.chain, state, methods))
    }

    /// Builds every configured upstream, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`BuilderError`]; ids allocated for earlier upstreams stay reserved.
    pub fn build_all(&self, config: &CoreConfig) -> Result<Vec<Arc<Upstream>>, BuilderError> {
        config
            .upstreams
            .iter()
            .map(|settings| {
                self.build(settings).map(Arc::new).inspect_err(|e| {
                    error!(upstream = %settings.id, error = %e, "failed to build upstream");
                })
            })
            .collect()
    }

    /// Frees the node id of a removed upstream.
    pub fn release(&self, upstream: &Upstream) -> bool {
        self.allocators
            .get_mut(&upstream.chain())
            .is_some_and(|mut allocator| allocator.release(upstream.node_id()))
    }

    /// Chain policy, wrapped with the upstream's overrides when it has any.
    fn call_methods(
        &self,
        settings: &UpstreamSettings,
    ) -> Result<Arc<dyn CallMethods>, MethodsError> {
        let base = self.targets.get(settings.chain)?;
        if !settings.has_method_overrides() {
            return Ok(base);
        }
        let managed = ManagedCallMethods::from_settings(
            base,
            settings.methods.as_ref(),
            settings.method_groups.as_ref(),
        )?;
        Ok(Arc::new(managed))
    }

    /// Quorum of `method` for `chain` without upstream overrides.
    ///
    /// # Errors
    ///
    /// Returns [`MethodsError::UnsupportedChain`] for chains without call policy.
    pub fn chain_quorum(&self, chain: Chain, method: &str) -> Result<QuorumStrategy, MethodsError> {
        Ok(self.targets.get(chain)?.quorum_for(method))
    }
}
