//! Address-keyed contract cache shared across concurrent requests.
//!
//! Contracts are immutable for the process lifetime, so the first successful
//! fetch-and-parse per address is the only one. Negative answers ("address is
//! not a verified contract") are cached too. Concurrent misses for the same
//! address coordinate through a per-key cell so the provider sees at most one
//! in-flight fetch per address; a failed fetch leaves the cell empty and the
//! next caller retries.

use std::sync::Arc;

use alloy::primitives::Address;
use dashmap::DashMap;
use tokio::sync::OnceCell;

use bridge_data::error::{EngineError, Result};
use bridge_data::provider::ContractProvider;

use crate::contract::Contract;

type Slot = Arc<OnceCell<Option<Arc<Contract>>>>;

pub struct ContractCache {
    provider: Arc<dyn ContractProvider>,
    entries: DashMap<Address, Slot>,
}

impl ContractCache {
    pub fn new(provider: Arc<dyn ContractProvider>) -> Self {
        Self {
            provider,
            entries: DashMap::new(),
        }
    }

    /// The contract at `address`, or `None` if it has no verified source.
    /// Repeated calls return the same `Arc` instance.
    pub async fn get_contract(&self, address: Address) -> Result<Option<Arc<Contract>>> {
        let slot: Slot = self.entries.entry(address).or_default().value().clone();

        let cached = slot
            .get_or_try_init(|| async {
                let fetched = self.provider.fetch_contract(address).await?;
                match fetched {
                    None => Ok::<_, EngineError>(None),
                    Some(source) => {
                        let contract = Contract::from_source(address, &source)?;
                        tracing::debug!(
                            address = %address,
                            name = %contract.name,
                            functions = contract.functions().len(),
                            "loaded verified contract"
                        );
                        Ok(Some(Arc::new(contract)))
                    }
                }
            })
            .await?;

        Ok(cached.clone())
    }

    /// Number of addresses with a settled answer (verified or not).
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.value().get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
