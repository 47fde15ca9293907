use super::{
    BitcoinMethods, CallMethods, EthereumMethods, MethodsError, NearMethods, PolkadotMethods,
};
use crate::chain::{Chain, ChainFamily};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Chain-level call policies, built on first use and cached for the process lifetime.
#[derive(Debug, Default)]
pub struct CallTargets {
    tables: DashMap<Chain, Arc<dyn CallMethods>>,
}

impl CallTargets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the call policy of `chain`, building it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`MethodsError::UnsupportedChain`] for chains without a policy table.
    pub fn get(&self, chain: Chain) -> Result<Arc<dyn CallMethods>, MethodsError> {
        if let Some(table) = self.tables.get(&chain) {
            return Ok(Arc::clone(table.value()));
        }

        let built = Self::build(chain)?;
        let table = self.tables.entry(chain).or_insert_with(|| {
            debug!(chain = %chain, family = ?chain.family(), "built call policy table");
            built
        });
        Ok(Arc::clone(table.value()))
    }

    /// Whether `chain` has a call policy table at all.
    #[must_use]
    pub fn supports(chain: Chain) -> bool {
        match chain.family() {
            ChainFamily::Evm | ChainFamily::Utxo | ChainFamily::Substrate => true,
            ChainFamily::Other => matches!(chain, Chain::NearMainnet | Chain::NearTestnet),
        }
    }

    fn build(chain: Chain) -> Result<Arc<dyn CallMethods>, MethodsError> {
        if !Self::supports(chain) {
            return Err(MethodsError::UnsupportedChain(chain));
        }

        let table: Arc<dyn CallMethods> = match chain.family() {
            ChainFamily::Evm => Arc::new(EthereumMethods::new(chain)),
            ChainFamily::Utxo => Arc::new(BitcoinMethods::new()),
            ChainFamily::Substrate => Arc::new(PolkadotMethods::new(chain)),
            ChainFamily::Other => Arc::new(NearMethods::new()),
        };
        Ok(table)
    }

    /// Number of chains with a cached table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
