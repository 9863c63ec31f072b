//! The contract model: functions and events parsed from a verified ABI,
//! with token-standard classification.
//!
//! Identity and equality are defined solely by address. Deep structural
//! comparison of parsed ABIs is never needed and would be costly.

use std::collections::HashSet;
use std::fmt;

use alloy::primitives::{Address, FixedBytes, B256};
use serde::Deserialize;

use bridge_data::error::{EngineError, Result};
use bridge_data::types::VerifiedSource;

use crate::selector::{canonical_signature, event_topic, function_selector};

/// One typed parameter of a function or event.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub indexed: bool,
}

/// Raw ABI entry, discriminated by `type`. Entries other than `function`
/// and `event` (constructor, fallback, receive, error) are ignored.
#[derive(Debug, Deserialize)]
struct RawAbiEntry {
    #[serde(rename = "type", default = "default_entry_kind")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<AbiParam>,
    #[serde(default)]
    outputs: Vec<AbiParam>,
    #[serde(default)]
    payable: bool,
    #[serde(default)]
    constant: bool,
    #[serde(rename = "stateMutability", default)]
    state_mutability: String,
}

fn default_entry_kind() -> String {
    "function".to_string()
}

/// A contract function with its selector computed once at construction.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub inputs: Vec<AbiParam>,
    pub outputs: Vec<AbiParam>,
    pub payable: bool,
    pub constant: bool,
    pub state_mutability: String,
    pub selector: FixedBytes<4>,
}

impl Function {
    fn from_entry(entry: RawAbiEntry) -> Self {
        let input_types: Vec<&str> = entry.inputs.iter().map(|p| p.ty.as_str()).collect();
        let selector = function_selector(&entry.name, &input_types);
        Function {
            name: entry.name,
            inputs: entry.inputs,
            outputs: entry.outputs,
            payable: entry.payable,
            constant: entry.constant,
            state_mutability: entry.state_mutability,
            selector,
        }
    }

    /// Canonical signature string, e.g. `transfer(address,uint256)`.
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self.inputs.iter().map(|p| p.ty.as_str()).collect();
        canonical_signature(&self.name, &types)
    }
}

/// Two functions are equal iff their selectors are equal.
impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.selector == other.selector
    }
}
impl Eq for Function {}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.signature(), self.selector)
    }
}

/// A contract event with its topic hash computed once at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub name: String,
    pub args: Vec<AbiParam>,
    pub topic: B256,
}

impl Event {
    fn from_entry(entry: RawAbiEntry) -> Self {
        let arg_types: Vec<&str> = entry.inputs.iter().map(|p| p.ty.as_str()).collect();
        let topic = event_topic(&entry.name, &arg_types);
        Event {
            name: entry.name,
            args: entry.inputs,
            topic,
        }
    }

    /// Types of the non-indexed arguments, in declaration order. These are
    /// the arguments carried in a log's `data` section.
    pub fn data_arg_types(&self) -> Vec<&str> {
        self.args
            .iter()
            .filter(|arg| !arg.indexed)
            .map(|arg| arg.ty.as_str())
            .collect()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<&str> = self.args.iter().map(|a| a.ty.as_str()).collect();
        write!(f, "{} ({:x})", canonical_signature(&self.name, &types), self.topic)
    }
}

/// Token-standard classification outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStandard {
    Erc20,
    Erc721,
    Unknown,
}

impl TokenStandard {
    /// Report label; unclassified contracts use the empty string.
    pub fn as_str(self) -> &'static str {
        match self {
            TokenStandard::Erc20 => "ERC20",
            TokenStandard::Erc721 => "ERC721",
            TokenStandard::Unknown => "",
        }
    }

    pub fn is_token(self) -> bool {
        !matches!(self, TokenStandard::Unknown)
    }
}

/// Tie policy when a contract satisfies both the ERC20 and ERC721 required
/// sets. The sets are disjoint enough that this is unexpected, but it is not
/// impossible, so the outcome is an explicit choice rather than a guess.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClassifyPolicy {
    #[default]
    PreferErc20,
    PreferErc721,
    Unknown,
}

const ERC20_FUNCTIONS: &[(&str, &[&str])] = &[
    ("totalSupply", &[]),
    ("balanceOf", &["address"]),
    ("transfer", &["address", "uint256"]),
    ("transferFrom", &["address", "address", "uint256"]),
    ("approve", &["address", "uint256"]),
    ("allowance", &["address", "address"]),
];

const ERC20_EVENTS: &[(&str, &[&str])] = &[
    ("Transfer", &["address", "address", "uint256"]),
    ("Approval", &["address", "address", "uint256"]),
];

const ERC721_FUNCTIONS: &[(&str, &[&str])] = &[
    ("balanceOf", &["address"]),
    ("ownerOf", &["uint256"]),
    ("safeTransferFrom", &["address", "address", "uint256"]),
    ("transferFrom", &["address", "address", "uint256"]),
    ("approve", &["address", "uint256"]),
    ("setApprovalForAll", &["address", "bool"]),
    ("getApproved", &["uint256"]),
    ("isApprovedForAll", &["address", "address"]),
];

const ERC721_EVENTS: &[(&str, &[&str])] = &[
    ("Transfer", &["address", "address", "uint256"]),
    ("Approval", &["address", "address", "uint256"]),
    ("ApprovalForAll", &["address", "address", "bool"]),
];

/// A verified contract: address, name, and its parsed interface.
#[derive(Clone, Debug)]
pub struct Contract {
    pub address: Address,
    pub name: String,
    functions: Vec<Function>,
    events: Vec<Event>,
}

impl Contract {
    /// Parses a provider payload into a contract model. Selectors and topic
    /// hashes are computed here, exactly once.
    pub fn from_source(address: Address, source: &VerifiedSource) -> Result<Self> {
        Self::from_abi_json(address, &source.contract_name, &source.abi_json)
    }

    /// Parses an ABI JSON array string, keeping `function` and `event`
    /// entries in declaration order.
    pub fn from_abi_json(address: Address, name: &str, abi_json: &str) -> Result<Self> {
        let entries: Vec<RawAbiEntry> = serde_json::from_str(abi_json)
            .map_err(|e| EngineError::Config(format!("invalid ABI for {address:#x}: {e}")))?;

        let mut functions = Vec::new();
        let mut events = Vec::new();
        for entry in entries {
            match entry.kind.as_str() {
                "function" => functions.push(Function::from_entry(entry)),
                "event" => events.push(Event::from_entry(entry)),
                _ => {}
            }
        }

        Ok(Contract {
            address,
            name: name.to_string(),
            functions,
            events,
        })
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Function lookup by name; a configured binding that misses here is a
    /// configuration error, never silently skipped.
    pub fn get_function(&self, name: &str) -> Result<&Function> {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| EngineError::FunctionNotFound(name.to_string()))
    }

    pub fn get_event(&self, name: &str) -> Result<&Event> {
        self.events
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| EngineError::EventNotFound(name.to_string()))
    }

    pub fn function_by_selector(&self, selector: FixedBytes<4>) -> Option<&Function> {
        self.functions.iter().find(|f| f.selector == selector)
    }

    pub fn event_by_topic(&self, topic: B256) -> Option<&Event> {
        self.events.iter().find(|e| e.topic == topic)
    }

    /// Selectors of every function in the contract.
    pub fn selectors(&self) -> impl Iterator<Item = FixedBytes<4>> + '_ {
        self.functions.iter().map(|f| f.selector)
    }

    fn has_all(
        &self,
        functions: &[(&str, &[&str])],
        events: &[(&str, &[&str])],
    ) -> bool {
        let selectors: HashSet<FixedBytes<4>> = self.selectors().collect();
        let topics: HashSet<B256> = self.events.iter().map(|e| e.topic).collect();

        functions
            .iter()
            .all(|(name, types)| selectors.contains(&function_selector(name, types)))
            && events
                .iter()
                .all(|(name, types)| topics.contains(&event_topic(name, types)))
    }

    /// Classify the contract as a token standard. A standard matches only if
    /// the complete required selector and topic sets are present; partial
    /// matches never qualify. A both-match tie follows `policy`.
    pub fn classify(&self, policy: ClassifyPolicy) -> TokenStandard {
        let erc20 = self.has_all(ERC20_FUNCTIONS, ERC20_EVENTS);
        let erc721 = self.has_all(ERC721_FUNCTIONS, ERC721_EVENTS);

        match (erc20, erc721) {
            (true, false) => TokenStandard::Erc20,
            (false, true) => TokenStandard::Erc721,
            (true, true) => {
                tracing::debug!(
                    address = %self.address,
                    ?policy,
                    "contract satisfies both ERC20 and ERC721 required sets"
                );
                match policy {
                    ClassifyPolicy::PreferErc20 => TokenStandard::Erc20,
                    ClassifyPolicy::PreferErc721 => TokenStandard::Erc721,
                    ClassifyPolicy::Unknown => TokenStandard::Unknown,
                }
            }
            (false, false) => TokenStandard::Unknown,
        }
    }
}

impl PartialEq for Contract {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}
impl Eq for Contract {}

impl std::hash::Hash for Contract {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Contract {} at {:#x}", self.name, self.address)?;
        writeln!(f, "Functions:")?;
        for function in &self.functions {
            writeln!(f, "  {function}")?;
        }
        writeln!(f, "Events:")?;
        for event in &self.events {
            writeln!(f, "  {event}")?;
        }
        Ok(())
    }
}
