//! A bridge spanning several chains, and the correlation pipeline that links
//! one source-side transaction to its destination-side counterpart.

use std::collections::HashMap;

use tracing::{debug, info};

use bridge_data::blockindex::BlockIndex;
use bridge_data::error::{EngineError, Result};

use crate::endpoint::{Endpoint, RejectedLeg, SendLeg};
use crate::report::{CorrelationRecord, InvalidRecord};

/// Where a link attempt stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Unloaded,
    SourceLoaded,
    DestScanned,
    Linked,
    Unlinkable,
}

/// Tuning for the destination-side scan window.
#[derive(Clone, Copy, Debug)]
pub struct LinkOptions {
    /// Blocks scanned after the timestamp-matched destination block.
    pub block_range: u64,
    /// Cap on candidate transactions per scan.
    pub max_results: u32,
    /// Require the destination transfer token to equal the source token.
    pub match_token: bool,
}

impl Default for LinkOptions {
    fn default() -> Self {
        LinkOptions {
            block_range: 100,
            max_results: 100,
            match_token: false,
        }
    }
}

/// Outcome of linking one source transaction.
pub struct LinkReport {
    pub bridge: String,
    pub state: LinkState,
    pub correlated: Vec<CorrelationRecord>,
    pub invalid: Vec<InvalidRecord>,
    pub rejected: Vec<RejectedLeg>,
}

impl LinkReport {
    pub fn unlinkable(bridge: &str, reason: &'static str, hash: &str) -> Self {
        LinkReport {
            bridge: bridge.to_string(),
            state: LinkState::Unlinkable,
            correlated: Vec::new(),
            invalid: vec![InvalidRecord {
                hash: hash.to_string(),
                chain_id: 0,
                reason: reason.to_string(),
            }],
            rejected: Vec::new(),
        }
    }
}

/// A named bridge with one endpoint per chain it spans, keyed by chain id.
pub struct Bridge {
    pub name: String,
    pub endpoints: HashMap<u64, Endpoint>,
    pub options: LinkOptions,
}

impl Bridge {
    pub fn new(name: impl Into<String>, options: LinkOptions) -> Self {
        Bridge {
            name: name.into(),
            endpoints: HashMap::new(),
            options,
        }
    }

    pub fn add_endpoint(&mut self, endpoint: Endpoint) {
        self.endpoints.insert(endpoint.chain.id(), endpoint);
    }

    /// The endpoint whose bridge contract address matches `address` in its
    /// lowercase hex form.
    pub fn endpoint_by_address(&self, address: &str) -> Option<&Endpoint> {
        self.endpoints.values().find(|e| e.address_hex == address)
    }

    /// Links one source-side transaction end to end: extract the send leg,
    /// translate its block to the destination chain by timestamp, scan the
    /// window, verify candidates, and join on the receiver.
    pub async fn link(&self, src_chain_id: u64, hash: &str) -> Result<LinkReport> {
        let mut report = LinkReport {
            bridge: self.name.clone(),
            state: LinkState::Unloaded,
            correlated: Vec::new(),
            invalid: Vec::new(),
            rejected: Vec::new(),
        };

        let source = self.endpoints.get(&src_chain_id).ok_or_else(|| {
            EngineError::Config(format!(
                "bridge {} has no endpoint on chain {src_chain_id}",
                self.name
            ))
        })?;
        let Some(leg) = source.load_source_leg(hash).await? else {
            report.state = LinkState::Unlinkable;
            report.invalid.push(InvalidRecord {
                hash: hash.to_string(),
                chain_id: src_chain_id,
                reason: "not a send through this bridge".to_string(),
            });
            return Ok(report);
        };
        report.state = LinkState::SourceLoaded;
        debug!(
            bridge = %self.name,
            hash,
            dest_chain_id = leg.dest_chain_id,
            value = %leg.value,
            "source leg loaded"
        );

        let Some(dest) = self.endpoints.get(&leg.dest_chain_id) else {
            report.state = LinkState::Unlinkable;
            report.invalid.push(InvalidRecord {
                hash: hash.to_string(),
                chain_id: src_chain_id,
                reason: format!(
                    "bridge {} has no endpoint on destination chain {}",
                    self.name, leg.dest_chain_id
                ),
            });
            return Ok(report);
        };

        let Some(start) = self.dest_scan_start(source, dest, &leg)? else {
            report.state = LinkState::Unlinkable;
            report.invalid.push(InvalidRecord {
                hash: hash.to_string(),
                chain_id: src_chain_id,
                reason: "no destination block index covers the source timestamp".to_string(),
            });
            return Ok(report);
        };

        let mut outcome = dest
            .scan_destination_range(start, start + self.options.block_range, self.options.max_results)
            .await?;
        report.state = LinkState::DestScanned;

        let src_token_hex = format!("{:#x}", leg.token);
        let expected_token = self.options.match_token.then_some(src_token_hex.as_str());
        Endpoint::verify_leg(&mut outcome, Some(&dest.address_hex), expected_token);

        let receiver_hex = format!("{:#x}", leg.receiver);
        for candidate in &outcome.retained {
            // The payout is any bridge-sent token transfer to the expected
            // receiver; fee transfers earlier in the log never hide it.
            let Some(transfer) = candidate.transaction.token_transfers().find(|t| {
                t.to == receiver_hex
                    && t.from == dest.address_hex
                    && expected_token.map_or(true, |token| t.token == token)
            }) else {
                // An outer join: candidates that survived the scan but pay
                // someone else stay visible instead of vanishing.
                report.rejected.push(RejectedLeg {
                    hash: candidate.hash.clone(),
                    reason: "no transfer to the source receiver",
                });
                continue;
            };
            if transfer.amount > leg.value {
                report.invalid.push(InvalidRecord {
                    hash: candidate.hash.clone(),
                    chain_id: leg.dest_chain_id,
                    reason: "destination value exceeds source value".to_string(),
                });
                continue;
            }
            report.correlated.push(CorrelationRecord {
                src_hash: leg.hash.clone(),
                src_sender: leg.sender.clone(),
                src_receiver: receiver_hex.clone(),
                src_token: src_token_hex.clone(),
                src_chain_id,
                src_value: leg.value,
                dest_chain_id: leg.dest_chain_id,
                dest_receiver: transfer.to.clone(),
                dest_hash: candidate.hash.clone(),
                dest_sender: transfer.from.clone(),
                dest_token: transfer.token.clone(),
                dest_value: transfer.amount,
            });
        }
        report.rejected.extend(outcome.rejected);

        if report.correlated.is_empty() && report.invalid.is_empty() {
            report.state = LinkState::Unlinkable;
            report.invalid.push(InvalidRecord {
                hash: hash.to_string(),
                chain_id: src_chain_id,
                reason: "no destination leg found in window".to_string(),
            });
        } else if !report.correlated.is_empty() {
            report.state = LinkState::Linked;
            info!(
                bridge = %self.name,
                hash,
                matches = report.correlated.len(),
                "source transaction linked"
            );
        } else {
            report.state = LinkState::Unlinkable;
        }
        Ok(report)
    }

    /// Maps the source block to the closest destination block by timestamp.
    /// Ties between neighbours resolve to the earlier block so the forward
    /// scan window covers both.
    fn dest_scan_start(
        &self,
        source: &Endpoint,
        dest: &Endpoint,
        leg: &SendLeg,
    ) -> Result<Option<u64>> {
        let Some(src_ts) = source.store().block_timestamp(leg.chain, leg.block)? else {
            return Ok(None);
        };
        let index = BlockIndex::from_store(dest.store(), dest.chain)?;
        Ok(index.closest_block(src_ts))
    }
}
