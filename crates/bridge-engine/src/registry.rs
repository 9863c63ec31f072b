//! Registry of configured bridges across chain contexts: routing a bare
//! transaction hash to its chain and bridge, batch linking, and export.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use bridge_abi::contract::ClassifyPolicy;
use bridge_abi::ContractCache;
use bridge_data::error::{EngineError, Result};
use bridge_data::store::TraceStore;
use bridge_data::types::Chain;

use crate::bridge::{Bridge, LinkOptions, LinkReport, LinkState};
use crate::config::{Binding, BridgesConfig};
use crate::endpoint::Endpoint;
use crate::report::{CorrelationRecord, ExportFormat, InvalidRecord};

/// Everything the engine needs for one chain: its trace store and a contract
/// cache backed by that chain's source provider.
#[derive(Clone)]
pub struct ChainContext {
    pub chain: Chain,
    pub store: Arc<TraceStore>,
    pub cache: Arc<ContractCache>,
}

/// All configured bridges over all configured chains. Link results
/// accumulate per source hash; relinking a hash replaces its report.
pub struct Registry {
    chains: Vec<ChainContext>,
    bridges: Vec<Bridge>,
    results: HashMap<String, LinkReport>,
}

impl Registry {
    /// Binds every configured bridge endpoint against the chain contexts.
    /// Fails on the first unknown chain name, unverified bridge contract,
    /// or unbindable function/event name.
    pub async fn build(
        config: &BridgesConfig,
        chains: Vec<ChainContext>,
        base_options: LinkOptions,
        policy: ClassifyPolicy,
    ) -> Result<Self> {
        let mut bridges = Vec::with_capacity(config.0.len());
        for (name, bridge_config) in &config.0 {
            let mut options = base_options;
            options.match_token = bridge_config.match_token;
            let mut bridge = Bridge::new(name.clone(), options);

            for (chain_name, endpoint_config) in &bridge_config.chains {
                let chain: Chain = chain_name.parse()?;
                let context = chains
                    .iter()
                    .find(|c| c.chain == chain)
                    .ok_or_else(|| {
                        EngineError::Config(format!(
                            "bridge {name} names chain {chain} but no chain context is loaded"
                        ))
                    })?;
                let address = endpoint_config.address.parse().map_err(|_| {
                    EngineError::Config(format!(
                        "bridge {name} on {chain}: bad address {}",
                        endpoint_config.address
                    ))
                })?;
                let endpoint = Endpoint::bind(
                    chain,
                    address,
                    context.store.clone(),
                    context.cache.clone(),
                    policy,
                    &Binding::as_pairs(&endpoint_config.outbound_functions),
                    &Binding::as_pairs(&endpoint_config.inbound_functions),
                    &Binding::names(&endpoint_config.outbound_events),
                    &Binding::names(&endpoint_config.inbound_events),
                )
                .await?;
                bridge.add_endpoint(endpoint);
            }
            bridges.push(bridge);
        }
        Ok(Registry {
            chains,
            bridges,
            results: HashMap::new(),
        })
    }

    pub fn bridges(&self) -> &[Bridge] {
        &self.bridges
    }

    pub fn results(&self) -> &HashMap<String, LinkReport> {
        &self.results
    }

    /// Finds the chain a hash lives on by probing every loaded store in
    /// chain order. More than one match is a collision worth flagging; the
    /// first match wins.
    pub fn route(&self, hash: &str) -> Result<Option<Chain>> {
        let mut matches = Vec::new();
        for context in &self.chains {
            if context.store.tx_exists(context.chain, hash)? {
                matches.push(context.chain);
            }
        }
        if matches.len() > 1 {
            let names: Vec<&str> = matches.iter().map(|c| c.name()).collect();
            warn!(hash, chains = %names.join(","), "hash found on multiple chains, using first");
        }
        Ok(matches.first().copied())
    }

    /// Links one hash: route it to a chain, match it to a bridge by the
    /// transaction's recipient address, and run that bridge's pipeline. The
    /// report is stored and returned by reference.
    pub async fn link(&mut self, hash: &str) -> Result<&LinkReport> {
        let report = self.link_inner(hash).await?;
        Ok(match self.results.entry(hash.to_string()) {
            Entry::Occupied(mut slot) => {
                slot.insert(report);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(report),
        })
    }

    async fn link_inner(&self, hash: &str) -> Result<LinkReport> {
        let Some(chain) = self.route(hash)? else {
            return Ok(LinkReport::unlinkable("", "hash not found on any loaded chain", hash));
        };
        let context = self
            .chains
            .iter()
            .find(|c| c.chain == chain)
            .ok_or_else(|| EngineError::Config(format!("no context for chain {chain}")))?;
        let record = context.store.get_tx(chain, hash)?.ok_or_else(|| {
            EngineError::TransactionNotFound {
                chain,
                hash: hash.to_string(),
            }
        })?;

        let Some(bridge) = self
            .bridges
            .iter()
            .find(|bridge| bridge.endpoint_by_address(&record.to).is_some_and(|e| e.chain == chain))
        else {
            debug!(hash, to = %record.to, "recipient is not a configured bridge");
            return Ok(LinkReport::unlinkable(
                "",
                "recipient is not a configured bridge",
                hash,
            ));
        };
        bridge.link(chain.id(), hash).await
    }

    /// Links a batch of hashes. A failure on one hash becomes an unlinkable
    /// report rather than aborting the rest.
    pub async fn link_all(&mut self, hashes: &[String]) -> Result<()> {
        for hash in hashes {
            match self.link_inner(hash).await {
                Ok(report) => {
                    self.results.insert(hash.clone(), report);
                }
                Err(e) => {
                    warn!(hash = %hash, error = %e, "link failed");
                    self.results
                        .insert(hash.clone(), LinkReport::unlinkable("", "link failed", hash));
                }
            }
        }
        Ok(())
    }

    pub fn linked_count(&self) -> usize {
        self.results
            .values()
            .filter(|r| r.state == LinkState::Linked)
            .count()
    }

    /// Renders every stored result, ordered by source hash for stable
    /// output. Correlated records come first, then invalid records with
    /// their reasons, so failed links are visible in the same report.
    pub fn export(&self, format: ExportFormat) -> String {
        let mut hashes: Vec<&String> = self.results.keys().collect();
        hashes.sort();
        let mut correlated: Vec<CorrelationRecord> = Vec::new();
        let mut invalid: Vec<InvalidRecord> = Vec::new();
        for hash in hashes {
            let report = &self.results[hash];
            correlated.extend(report.correlated.iter().cloned());
            invalid.extend(report.invalid.iter().cloned());
        }
        format.render(&correlated, &invalid)
    }
}
