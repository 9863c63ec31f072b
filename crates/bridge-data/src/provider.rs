//! Contract-source provider boundary.
//!
//! A provider answers "is this address a verified contract, and what is its
//! ABI". `Ok(None)` means not verified — the lookup continues and the address
//! is simply absent from a transaction's contract map. Only transport-level
//! failures are errors.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::error::{EngineError, Result};
use crate::types::VerifiedSource;

#[async_trait]
pub trait ContractProvider: Send + Sync {
    /// Fetch the verified source/ABI payload for an address.
    async fn fetch_contract(&self, address: Address) -> Result<Option<VerifiedSource>>;
}

/// Provider backed by preloaded sources: offline ABI archives and test
/// fixtures. Counts fetches so cache single-flight behavior is observable.
#[derive(Default)]
pub struct StaticProvider {
    sources: HashMap<Address, VerifiedSource>,
    fetches: AtomicUsize,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one verified contract.
    pub fn insert(&mut self, address: Address, source: VerifiedSource) {
        self.sources.insert(address, source);
    }

    /// Loads every `{address}.json` file in a directory, each holding a
    /// serialized [`VerifiedSource`]. This is the offline counterpart of the
    /// block-explorer client in [`crate::scanner`].
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut provider = Self::new();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| EngineError::Config(format!("cannot read ABI dir {dir:?}: {e}")))?;
        for entry in entries {
            let entry =
                entry.map_err(|e| EngineError::Config(format!("cannot read ABI dir entry: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let text = std::fs::read_to_string(&path)
                .map_err(|e| EngineError::Config(format!("cannot read {path:?}: {e}")))?;
            let source: VerifiedSource = serde_json::from_str(&text)
                .map_err(|e| EngineError::Config(format!("invalid contract file {path:?}: {e}")))?;
            let address = source
                .address
                .parse::<Address>()
                .map_err(|e| EngineError::Config(format!("bad address in {path:?}: {e}")))?;
            provider.insert(address, source);
        }
        Ok(provider)
    }

    /// Number of `fetch_contract` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContractProvider for StaticProvider {
    async fn fetch_contract(&self, address: Address) -> Result<Option<VerifiedSource>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.sources.get(&address).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_source(address: Address) -> VerifiedSource {
        VerifiedSource {
            address: format!("{address:#x}"),
            source_code: "contract Token {}".to_string(),
            abi_json: "[]".to_string(),
            contract_name: "Token".to_string(),
            constructor_args: String::new(),
        }
    }

    #[tokio::test]
    async fn unknown_address_is_none_not_error() {
        let provider = StaticProvider::new();
        let fetched = provider
            .fetch_contract(Address::ZERO)
            .await
            .expect("static provider never fails");
        assert!(fetched.is_none());
        assert_eq!(provider.fetch_count(), 1);
    }

    #[tokio::test]
    async fn known_address_round_trips() {
        let address = Address::repeat_byte(0x11);
        let mut provider = StaticProvider::new();
        provider.insert(address, sample_source(address));

        let fetched = provider
            .fetch_contract(address)
            .await
            .expect("static provider never fails")
            .expect("address is registered");
        assert_eq!(fetched.contract_name, "Token");
    }
}
