//! One side of a bridge on one chain: the bridge contract, the functions and
//! events bound to it, and the scan/extract operations that produce transfer
//! legs from the local trace store.

use std::fmt;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use tracing::debug;

use bridge_abi::contract::{ClassifyPolicy, Contract, Event, Function};
use bridge_abi::ContractCache;
use bridge_data::error::{EngineError, Result};
use bridge_data::store::TraceStore;
use bridge_data::types::Chain;

use crate::transaction::Transaction;

/// A function bound to an endpoint role, with the calldata word index that
/// carries the destination chain id on send calls.
#[derive(Clone, Debug)]
pub struct BoundFunction {
    pub function: Function,
    pub chain_id_arg: usize,
}

/// Extracted source leg of a transfer: everything the correlation needs,
/// read from the send call's calldata and the transfer log.
#[derive(Clone, Debug)]
pub struct SendLeg {
    pub hash: String,
    pub chain: Chain,
    pub block: u64,
    pub sender: String,
    pub receiver: Address,
    pub token: Address,
    pub value: U256,
    pub dest_chain_id: u64,
}

/// A destination-side transaction that passed all retention checks. The
/// decoded transaction is kept so verification can re-examine its transfers.
#[derive(Debug)]
pub struct ReceiveLeg {
    pub hash: String,
    pub block: u64,
    pub transaction: Transaction,
}

/// A scanned transaction that failed a retention or verification check.
#[derive(Clone, Debug, PartialEq)]
pub struct RejectedLeg {
    pub hash: String,
    pub reason: &'static str,
}

/// Result of one destination-range scan. The caller owns it; scanning never
/// mutates the endpoint.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub retained: Vec<ReceiveLeg>,
    pub rejected: Vec<RejectedLeg>,
}

/// A bridge contract deployed on one chain, with its bound send/receive
/// functions and events.
pub struct Endpoint {
    pub chain: Chain,
    pub address: Address,
    /// Lowercase hex form, the representation trace lines use.
    pub address_hex: String,
    pub contract: Arc<Contract>,
    pub send_functions: Vec<BoundFunction>,
    pub receive_functions: Vec<BoundFunction>,
    pub send_events: Vec<Event>,
    pub receive_events: Vec<Event>,
    store: Arc<TraceStore>,
    cache: Arc<ContractCache>,
    policy: ClassifyPolicy,
}

impl Endpoint {
    /// Binds named functions and events against the bridge contract's
    /// verified ABI.
    ///
    /// # Errors
    /// `Config` if the bridge contract itself is unverified;
    /// `FunctionNotFound`/`EventNotFound` if a bound name is missing from
    /// the ABI. A misconfigured endpoint must fail loudly at setup, not
    /// produce empty correlations later.
    #[allow(clippy::too_many_arguments)]
    pub async fn bind(
        chain: Chain,
        address: Address,
        store: Arc<TraceStore>,
        cache: Arc<ContractCache>,
        policy: ClassifyPolicy,
        send_functions: &[(String, usize)],
        receive_functions: &[(String, usize)],
        send_events: &[String],
        receive_events: &[String],
    ) -> Result<Self> {
        let contract = cache.get_contract(address).await?.ok_or_else(|| {
            EngineError::Config(format!("bridge contract {address:#x} on {chain} is not verified"))
        })?;

        let bind_functions = |names: &[(String, usize)]| -> Result<Vec<BoundFunction>> {
            names
                .iter()
                .map(|(name, chain_id_arg)| {
                    Ok(BoundFunction {
                        function: contract.get_function(name)?.clone(),
                        chain_id_arg: *chain_id_arg,
                    })
                })
                .collect()
        };
        let bind_events = |names: &[String]| -> Result<Vec<Event>> {
            names.iter().map(|name| Ok(contract.get_event(name)?.clone())).collect()
        };

        Ok(Endpoint {
            chain,
            address,
            address_hex: format!("{address:#x}"),
            send_functions: bind_functions(send_functions)?,
            receive_functions: bind_functions(receive_functions)?,
            send_events: bind_events(send_events)?,
            receive_events: bind_events(receive_events)?,
            contract,
            store,
            cache,
            policy,
        })
    }

    pub fn store(&self) -> &TraceStore {
        &self.store
    }

    /// Extracts the source leg of a transfer from one transaction, if it is
    /// a token transfer that calls a bound send function on this bridge.
    ///
    /// Calldata layout on the matched send call: word 0 is the receiver,
    /// word 1 the destination token, and the bound `chain_id_arg` word the
    /// destination chain id.
    pub async fn load_source_leg(&self, hash: &str) -> Result<Option<SendLeg>> {
        let tx =
            Transaction::load(&self.store, &self.cache, self.chain, hash, self.policy).await?;

        let Some((call, bound)) = self.send_functions.iter().find_map(|bound| {
            tx.calls
                .iter()
                .find(|call| {
                    call.to == self.address_hex && call.selector == Some(bound.function.selector)
                })
                .map(|call| (call, bound))
        }) else {
            debug!(hash, chain = %self.chain, "no bound send function called");
            return Ok(None);
        };

        let Some(transfer) = tx.first_token_transfer() else {
            debug!(hash, chain = %self.chain, "send call without a token transfer");
            return Ok(None);
        };

        let (Some(receiver), Some(token), Some(dest_chain_id)) = (
            call.word_as_address(0),
            call.word_as_address(1),
            call.word_as_u64(bound.chain_id_arg),
        ) else {
            return Err(EngineError::MalformedField {
                kind: "call",
                field: "input",
                value: format!(
                    "{} calldata words, send binding needs word {}",
                    call.input_words.len(),
                    bound.chain_id_arg
                ),
            });
        };

        Ok(Some(SendLeg {
            hash: tx.hash.clone(),
            chain: self.chain,
            block: tx.block,
            sender: transfer.from.clone(),
            receiver,
            token,
            value: transfer.amount,
            dest_chain_id,
        }))
    }

    /// Scans `[start, end]` on this endpoint's chain for transactions that
    /// look like receive legs, bounded by `max`. A retained leg must call a
    /// bound receive function on the bridge, carry a token transfer, and
    /// emit a bound receive event when any is configured.
    pub async fn scan_destination_range(
        &self,
        start: u64,
        end: u64,
        max: u32,
    ) -> Result<ScanOutcome> {
        let hashes =
            self.store
                .get_block_range(self.chain, start, end, Some(&self.address_hex), max)?;
        let mut outcome = ScanOutcome::default();

        for hash in hashes {
            // A malformed candidate rejects that candidate, not the scan.
            // Store and provider failures still abort: they are not
            // per-transaction conditions.
            let tx = match Transaction::load(
                &self.store,
                &self.cache,
                self.chain,
                &hash,
                self.policy,
            )
            .await
            {
                Ok(tx) => tx,
                Err(EngineError::MalformedTrace { .. } | EngineError::MalformedField { .. }) => {
                    outcome.rejected.push(RejectedLeg {
                        hash,
                        reason: "malformed trace record",
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let receive_called = self.receive_functions.iter().any(|bound| {
                tx.contains_function(&self.address_hex, bound.function.selector)
            });
            if !receive_called {
                outcome.rejected.push(RejectedLeg {
                    hash,
                    reason: "no bound receive function called",
                });
                continue;
            }
            if !tx.is_token_transfer {
                outcome.rejected.push(RejectedLeg {
                    hash,
                    reason: "not a token transfer",
                });
                continue;
            }
            if !self.receive_events.is_empty() {
                let event_seen = self.receive_events.iter().any(|event| {
                    tx.events.iter().any(|line| {
                        line.topics
                            .first()
                            .and_then(|t| t.parse::<B256>().ok())
                            .is_some_and(|topic| topic == event.topic)
                    })
                });
                if !event_seen {
                    outcome.rejected.push(RejectedLeg {
                        hash,
                        reason: "missing receive event",
                    });
                    continue;
                }
            }

            outcome.retained.push(ReceiveLeg {
                hash,
                block: tx.block,
                transaction: tx,
            });
        }
        Ok(outcome)
    }

    /// Re-checks retained legs against the expected counterparties, moving
    /// failures into the rejected list. A leg passes when any of its token
    /// transfers matches; fee or burn transfers alongside the payout never
    /// disqualify it. `expected_sender` is normally this bridge's own
    /// address on the destination chain; `expected_token` is only checked
    /// when token matching is enabled for the bridge.
    pub fn verify_leg(
        outcome: &mut ScanOutcome,
        expected_sender: Option<&str>,
        expected_token: Option<&str>,
    ) {
        let retained = std::mem::take(&mut outcome.retained);
        for leg in retained {
            let sender_ok = expected_sender.map_or(true, |expected| {
                leg.transaction.token_transfers().any(|t| t.from == expected)
            });
            if !sender_ok {
                outcome.rejected.push(RejectedLeg {
                    hash: leg.hash,
                    reason: "transfer sender is not the bridge",
                });
                continue;
            }
            let token_ok = expected_token.map_or(true, |expected| {
                leg.transaction.token_transfers().any(|t| {
                    t.token == expected
                        && expected_sender.map_or(true, |sender| t.from == sender)
                })
            });
            if !token_ok {
                outcome.rejected.push(RejectedLeg {
                    hash: leg.hash,
                    reason: "transfer token mismatch",
                });
                continue;
            }
            outcome.retained.push(leg);
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("chain", &self.chain)
            .field("address", &self.address)
            .field("send_functions", &self.send_functions)
            .field("receive_functions", &self.receive_functions)
            .field("send_events", &self.send_events)
            .field("receive_events", &self.receive_events)
            .finish_non_exhaustive()
    }
}
