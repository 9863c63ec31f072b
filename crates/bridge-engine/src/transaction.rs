//! Trace decoder: one transaction's raw trace blobs turned into typed
//! call/transfer/event records, with every touched address resolved through
//! the contract cache.
//!
//! Decoding is all-or-nothing per transaction. A missing record or a
//! malformed line fails the whole decode; partial results would silently
//! corrupt the correlation downstream.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use alloy::primitives::{Address, FixedBytes, B256, U256};

use bridge_abi::contract::{ClassifyPolicy, Contract, Function, TokenStandard};
use bridge_abi::selector::{word_width, WORD_BYTES};
use bridge_abi::ContractCache;
use bridge_data::error::{EngineError, Result};
use bridge_data::schema::{parse_blob, CallKind, CallLine, EventLine, TransferLine};
use bridge_data::store::TraceStore;
use bridge_data::types::Chain;

/// Decoded event attached to the call that emitted it.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedEvent {
    /// Emitting contract address.
    pub address: String,
    /// Event name resolved from the emitter's ABI.
    pub name: String,
    /// Raw topic hashes, signature topic first.
    pub topics: Vec<String>,
    /// Non-indexed arguments decoded as 32-byte words.
    pub words: Vec<U256>,
}

/// One call frame of the transaction's call tree. Depth makes the tree
/// implicit; calls stay in index order.
#[derive(Clone, Debug)]
pub struct Call {
    pub index: u32,
    pub depth: u32,
    pub kind: CallKind,
    pub from: String,
    pub to: String,
    pub value: U256,
    pub gas: u64,
    /// 4-byte selector from the calldata, `None` for bare value transfers.
    pub selector: Option<FixedBytes<4>>,
    /// Calldata words after the selector, big-endian.
    pub input_words: Vec<U256>,
    pub output: String,
    /// Event emitted by this call, if one decoded.
    pub event: Option<DecodedEvent>,
}

/// One token transfer from the transfer log.
#[derive(Clone, Debug)]
pub struct Transfer {
    pub from: String,
    pub to: String,
    pub token: String,
    pub amount: U256,
    pub depth: u32,
    /// Standard of the token contract; `Unknown` when the token address is
    /// not a recognized contract.
    pub standard: TokenStandard,
}

/// Fully decoded transaction snapshot. Immutable after construction.
#[derive(Debug)]
pub struct Transaction {
    pub hash: String,
    pub chain: Chain,
    pub block: u64,
    pub to: String,
    pub from: String,
    pub value: U256,
    pub gas_price: u64,
    pub gas_used: u64,
    pub calls: Vec<Call>,
    pub transfers: Vec<Transfer>,
    /// Raw event lines, kept even when no ABI could decode them.
    pub events: Vec<EventLine>,
    /// Every verified contract the transaction touched, keyed by address.
    pub contracts: HashMap<Address, Arc<Contract>>,
    /// Function name to selectors across all touched contracts.
    pub selectors_by_name: HashMap<String, Vec<FixedBytes<4>>>,
    /// Whether any transfer resolved to a recognized token standard.
    pub is_token_transfer: bool,
}

impl Transaction {
    /// Decodes one transaction from the trace store, resolving addresses
    /// through the contract cache.
    ///
    /// # Errors
    /// `TransactionNotFound` if the store has no record for the hash;
    /// `MalformedTrace`/`MalformedField` on any bad trace line.
    pub async fn load(
        store: &TraceStore,
        cache: &ContractCache,
        chain: Chain,
        hash: &str,
        policy: ClassifyPolicy,
    ) -> Result<Self> {
        let record = store
            .get_tx(chain, hash)?
            .ok_or_else(|| EngineError::TransactionNotFound {
                chain,
                hash: hash.to_string(),
            })?;

        let call_lines = parse_blob(&record.functrace, CallLine::parse)?;
        let transfer_lines = parse_blob(&record.transferlogs, TransferLine::parse)?;
        let event_lines = parse_blob(&record.eventtrace, EventLine::parse)?;

        let mut calls = Vec::with_capacity(call_lines.len());
        let mut addresses: HashSet<Address> = HashSet::new();
        for line in call_lines {
            let (selector, input_words) = parse_calldata(&line.input)?;
            for party in [&line.from, &line.to] {
                // Create frames have an empty callee; anything unparsable is
                // simply not a contract-map candidate.
                if let Ok(address) = party.parse::<Address>() {
                    addresses.insert(address);
                }
            }
            calls.push(Call {
                index: line.index,
                depth: line.depth,
                kind: line.kind,
                from: line.from,
                to: line.to,
                value: line.value,
                gas: line.gas,
                selector,
                input_words,
                output: line.output,
                event: None,
            });
        }
        for line in &transfer_lines {
            if let Ok(address) = line.token.parse::<Address>() {
                addresses.insert(address);
            }
        }

        let mut contracts = HashMap::new();
        for address in addresses {
            if let Some(contract) = cache.get_contract(address).await? {
                contracts.insert(address, contract);
            }
        }

        let mut selectors_by_name: HashMap<String, Vec<FixedBytes<4>>> = HashMap::new();
        for contract in contracts.values() {
            for function in contract.functions() {
                selectors_by_name
                    .entry(function.name.clone())
                    .or_default()
                    .push(function.selector);
            }
        }

        let mut is_token_transfer = false;
        let transfers: Vec<Transfer> = transfer_lines
            .into_iter()
            .map(|line| {
                let standard = line
                    .token
                    .parse::<Address>()
                    .ok()
                    .and_then(|address| contracts.get(&address))
                    .map(|contract| contract.classify(policy))
                    .unwrap_or(TokenStandard::Unknown);
                is_token_transfer |= standard.is_token();
                Transfer {
                    from: line.from,
                    to: line.to,
                    token: line.token,
                    amount: line.amount,
                    depth: line.depth,
                    standard,
                }
            })
            .collect();

        for line in &event_lines {
            if let Some(decoded) = decode_event(line, &contracts)? {
                if let Some(call) = calls.iter_mut().find(|c| c.index == line.call_index) {
                    call.event = Some(decoded);
                }
            }
        }

        Ok(Transaction {
            hash: record.hash,
            chain,
            block: record.block,
            to: record.to,
            from: record.from,
            value: parse_decimal("transaction", "value", &record.value)?,
            gas_price: record.gas_price,
            gas_used: record.gas_used,
            calls,
            transfers,
            events: event_lines,
            contracts,
            selectors_by_name,
            is_token_transfer,
        })
    }

    /// The transaction's entry-point call (index 0).
    pub fn top_call(&self) -> Option<&Call> {
        self.calls.first()
    }

    /// Whether any call invokes `selector` on `address`.
    pub fn contains_function(&self, address: &str, selector: FixedBytes<4>) -> bool {
        self.calls
            .iter()
            .any(|call| call.to == address && call.selector == Some(selector))
    }

    /// Whether any call invokes `selector` on `address` with the calldata
    /// word at `word_index` equal to `value`.
    pub fn contains_function_value(
        &self,
        address: &str,
        selector: FixedBytes<4>,
        word_index: usize,
        value: u64,
    ) -> bool {
        self.calls.iter().any(|call| {
            call.to == address
                && call.selector == Some(selector)
                && call.input_words.get(word_index) == Some(&U256::from(value))
        })
    }

    /// First transfer that resolved to a token standard.
    pub fn first_token_transfer(&self) -> Option<&Transfer> {
        self.token_transfers().next()
    }

    /// All transfers that resolved to a token standard, in log order.
    pub fn token_transfers(&self) -> impl Iterator<Item = &Transfer> {
        self.transfers.iter().filter(|t| t.standard.is_token())
    }

    /// Calls whose selector resolves to a function in the callee's verified
    /// ABI, paired with that function.
    pub fn interacted_functions(&self) -> Vec<(&Call, &Function)> {
        self.calls
            .iter()
            .filter_map(|call| {
                let address = call.to.parse::<Address>().ok()?;
                let contract = self.contracts.get(&address)?;
                let function = contract.function_by_selector(call.selector?)?;
                Some((call, function))
            })
            .collect()
    }
}

impl Call {
    /// Calldata word at `index` read as a right-aligned address.
    pub fn word_as_address(&self, index: usize) -> Option<Address> {
        self.input_words.get(index).copied().map(word_to_address)
    }

    /// Calldata word at `index` as u64, `None` when absent or out of range.
    /// Calldata is untrusted; an oversized word is a malformed argument,
    /// never a crash.
    pub fn word_as_u64(&self, index: usize) -> Option<u64> {
        self.input_words
            .get(index)
            .and_then(|w| u64::try_from(*w).ok())
    }
}

/// Interprets a calldata word as a right-aligned 20-byte address.
pub fn word_to_address(word: U256) -> Address {
    Address::from_word(B256::from(word))
}

/// Splits 0x-prefixed calldata into the 4-byte selector and its 32-byte
/// argument words. An all-zero word decodes to 0, not an error.
fn parse_calldata(input: &str) -> Result<(Option<FixedBytes<4>>, Vec<U256>)> {
    let hex = input
        .strip_prefix("0x")
        .ok_or_else(|| malformed_input(input))?;
    if hex.is_empty() {
        return Ok((None, Vec::new()));
    }
    // Slicing below is byte-indexed; non-ASCII bytes in what should be hex
    // text must fail as data, not as a panic.
    if !hex.is_ascii() || hex.len() < 8 {
        return Err(malformed_input(input));
    }

    let selector_bits =
        u32::from_str_radix(&hex[..8], 16).map_err(|_| malformed_input(input))?;
    let selector = FixedBytes::<4>::from(selector_bits.to_be_bytes());

    let tail = &hex[8..];
    if tail.len() % (WORD_BYTES * 2) != 0 {
        return Err(malformed_input(input));
    }
    let mut words = Vec::with_capacity(tail.len() / (WORD_BYTES * 2));
    for chunk_start in (0..tail.len()).step_by(WORD_BYTES * 2) {
        let chunk = &tail[chunk_start..chunk_start + WORD_BYTES * 2];
        let word = U256::from_str_radix(chunk, 16).map_err(|_| malformed_input(input))?;
        words.push(word);
    }
    Ok((Some(selector), words))
}

fn malformed_input(input: &str) -> EngineError {
    EngineError::MalformedField {
        kind: "call",
        field: "input",
        value: input.to_string(),
    }
}

/// Decodes one event line against the emitter's ABI. Returns `Ok(None)` when
/// the emitter is unverified or the signature topic matches no declared
/// event; that is a normal outcome, not an error.
fn decode_event(
    line: &EventLine,
    contracts: &HashMap<Address, Arc<Contract>>,
) -> Result<Option<DecodedEvent>> {
    let Some(contract) = line
        .address
        .parse::<Address>()
        .ok()
        .and_then(|address| contracts.get(&address))
    else {
        return Ok(None);
    };
    let Some(topic0) = line.topics.first() else {
        return Ok(None);
    };
    let Some(topic0) = topic0.parse::<B256>().ok() else {
        return Ok(None);
    };
    let Some(event) = contract.event_by_topic(topic0) else {
        return Ok(None);
    };

    // Each non-indexed argument occupies one 32-byte slot; the width table
    // also rejects dynamic types we cannot decode from a flat data section.
    let arg_types = event.data_arg_types();
    for ty in &arg_types {
        word_width(ty)?;
    }

    let data = line.data.strip_prefix("0x").unwrap_or(&line.data);
    if !data.is_ascii() || data.len() != arg_types.len() * WORD_BYTES * 2 {
        return Err(EngineError::MalformedField {
            kind: "event",
            field: "data",
            value: line.data.clone(),
        });
    }
    let mut words = Vec::with_capacity(arg_types.len());
    for chunk_start in (0..data.len()).step_by(WORD_BYTES * 2) {
        let chunk = &data[chunk_start..chunk_start + WORD_BYTES * 2];
        let word = U256::from_str_radix(chunk, 16).map_err(|_| EngineError::MalformedField {
            kind: "event",
            field: "data",
            value: line.data.clone(),
        })?;
        words.push(word);
    }

    Ok(Some(DecodedEvent {
        address: line.address.clone(),
        name: event.name.clone(),
        topics: line.topics.clone(),
        words,
    }))
}

fn parse_decimal(kind: &'static str, field: &'static str, value: &str) -> Result<U256> {
    value
        .parse::<U256>()
        .map_err(|_| EngineError::MalformedField {
            kind,
            field,
            value: value.to_string(),
        })
}
