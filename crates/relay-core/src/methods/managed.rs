//! Operator overrides layered on top of a chain's call policy.

use super::{CallMethods, MethodsError};
use crate::{
    config::{MethodGroupsSettings, MethodsSettings},
    quorum::QuorumStrategy,
};
use ahash::{AHashMap, AHashSet};
use bytes::Bytes;
use std::{collections::BTreeSet, sync::Arc};
use tracing::debug;

/// Call policy of a single upstream: a chain table plus operator overrides.
///
/// Callable methods are `(base ∪ enabled ∪ enabled groups) − disabled − disabled groups`.
/// A method with a static response is answered locally, and it stays callable as long as the
/// operator did not disable it.
#[derive(Debug)]
pub struct ManagedCallMethods {
    delegate: Arc<dyn CallMethods>,
    callable: AHashSet<String>,
    quorums: AHashMap<String, QuorumStrategy>,
    static_responses: AHashMap<String, Bytes>,
}

impl ManagedCallMethods {
    #[must_use]
    pub fn builder(delegate: Arc<dyn CallMethods>) -> ManagedCallMethodsBuilder {
        ManagedCallMethodsBuilder::new(delegate)
    }

    /// Applies the overrides of an upstream's configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MethodsError::InvalidStaticResponse`] if a static response is not valid JSON.
    pub fn from_settings(
        delegate: Arc<dyn CallMethods>,
        methods: Option<&MethodsSettings>,
        groups: Option<&MethodGroupsSettings>,
    ) -> Result<Self, MethodsError> {
        let mut builder = Self::builder(delegate);

        if let Some(methods) = methods {
            for setting in &methods.enabled {
                builder = builder.enable(&setting.name);
                if let Some(quorum) = setting.quorum {
                    builder = builder.quorum(&setting.name, quorum);
                }
                if let Some(response) = &setting.static_response {
                    builder = builder.static_response(&setting.name, response);
                }
            }
            for name in &methods.disabled {
                builder = builder.disable(name);
            }
        }

        if let Some(groups) = groups {
            for group in &groups.enabled {
                builder = builder.enable_group(group);
            }
            for group in &groups.disabled {
                builder = builder.disable_group(group);
            }
        }

        builder.build()
    }
}

impl CallMethods for ManagedCallMethods {
    fn is_callable(&self, method: &str) -> bool {
        self.callable.contains(method)
    }

    fn quorum_for(&self, method: &str) -> QuorumStrategy {
        self.quorums.get(method).copied().unwrap_or_else(|| self.delegate.quorum_for(method))
    }

    fn is_hardcoded(&self, method: &str) -> bool {
        self.callable.contains(method) &&
            (self.static_responses.contains_key(method) || self.delegate.is_hardcoded(method))
    }

    fn execute_hardcoded(&self, method: &str) -> Result<Bytes, MethodsError> {
        match self.static_responses.get(method) {
            Some(response) => Ok(response.clone()),
            None => self.delegate.execute_hardcoded(method),
        }
    }

    fn methods_in_group(&self, group: &str) -> BTreeSet<String> {
        self.delegate.methods_in_group(group)
    }

    fn supported_methods(&self) -> BTreeSet<String> {
        self.callable.iter().cloned().collect()
    }
}

/// Builder for [`ManagedCallMethods`].
#[derive(Debug)]
pub struct ManagedCallMethodsBuilder {
    delegate: Arc<dyn CallMethods>,
    enabled: BTreeSet<String>,
    disabled: BTreeSet<String>,
    groups_enabled: BTreeSet<String>,
    groups_disabled: BTreeSet<String>,
    quorums: AHashMap<String, QuorumStrategy>,
    static_responses: Vec<(String, String)>,
}

impl ManagedCallMethodsBuilder {
    #[must_use]
    pub fn new(delegate: Arc<dyn CallMethods>) -> Self {
        Self {
            delegate,
            enabled: BTreeSet::new(),
            disabled: BTreeSet::new(),
            groups_enabled: BTreeSet::new(),
            groups_disabled: BTreeSet::new(),
            quorums: AHashMap::new(),
            static_responses: Vec::new(),
        }
    }

    #[must_use]
    pub fn enable(mut self, method: impl Into<String>) -> Self {
        self.enabled.insert(method.into());
        self
    }

    #[must_use]
    pub fn disable(mut self, method: impl Into<String>) -> Self {
        self.disabled.insert(method.into());
        self
    }

    #[must_use]
    pub fn enable_group(mut self, group: impl Into<String>) -> Self {
        self.groups_enabled.insert(group.into());
        self
    }

    #[must_use]
    pub fn disable_group(mut self, group: impl Into<String>) -> Self {
        self.groups_disabled.insert(group.into());
        self
    }

    /// Overrides the quorum of a method.
    #[must_use]
    pub fn quorum(mut self, method: impl Into<String>, quorum: QuorumStrategy) -> Self {
        self.quorums.insert(method.into(), quorum);
        self
    }

    /// Makes a method hardcoded with the given JSON literal. Implies [`enable`](Self::enable).
    #[must_use]
    pub fn static_response(mut self, method: impl Into<String>, json: impl Into<String>) -> Self {
        let method = method.into();
        self.enabled.insert(method.clone());
        self.static_responses.push((method, json.into()));
        self
    }

    /// # Errors
    ///
    /// Returns [`MethodsError::InvalidStaticResponse`] if a static response is not valid JSON.
    pub fn build(self) -> Result<ManagedCallMethods, MethodsError> {
        let mut static_responses = AHashMap::with_capacity(self.static_responses.len());
        for (method, json) in self.static_responses {
            if let Err(e) = serde_json::from_str::<serde::de::IgnoredAny>(&json) {
                return Err(MethodsError::InvalidStaticResponse { method, reason: e.to_string() });
            }
            static_responses.insert(method, Bytes::from(json));
        }

        let group_methods = |groups: &BTreeSet<String>| -> BTreeSet<String> {
            groups.iter().flat_map(|group| self.delegate.methods_in_group(group)).collect()
        };
        let enabled_by_group = group_methods(&self.groups_enabled);
        let disabled_by_group = group_methods(&self.groups_disabled);

        let callable: AHashSet<String> = self
            .delegate
            .supported_methods()
            .into_iter()
            .chain(self.enabled.iter().cloned())
            .chain(enabled_by_group)
            .filter(|method| !self.disabled.contains(method) && !disabled_by_group.contains(method))
            .collect();

        debug!(
            callable = callable.len(),
            enabled = self.enabled.len(),
            disabled = self.disabled.len(),
            static_responses = static_responses.len(),
            "built managed call methods"
        );

        Ok(ManagedCallMethods {
            delegate: self.delegate,
            callable,
            quorums: self.quorums,
            static_responses,
        })
    }
}
