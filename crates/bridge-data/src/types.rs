//! Type definitions for the chain/trace data layer.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Supported chains, identified by their canonical numeric chain id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Ethereum mainnet (chain id 1).
    Eth,
    /// BNB Smart Chain (chain id 56).
    Bsc,
    /// Polygon PoS (chain id 137).
    Polygon,
    /// Fantom Opera (chain id 250).
    Fantom,
}

impl Chain {
    /// All supported chains, in canonical order.
    pub const ALL: [Chain; 4] = [Chain::Eth, Chain::Bsc, Chain::Polygon, Chain::Fantom];

    /// Numeric chain identifier.
    pub fn id(self) -> u64 {
        match self {
            Chain::Eth => 1,
            Chain::Bsc => 56,
            Chain::Polygon => 137,
            Chain::Fantom => 250,
        }
    }

    /// Resolve a numeric chain identifier back to a chain.
    pub fn from_id(id: u64) -> Option<Chain> {
        Chain::ALL.into_iter().find(|chain| chain.id() == id)
    }

    /// Symbolic name used in configuration documents and reports.
    pub fn name(self) -> &'static str {
        match self {
            Chain::Eth => "eth",
            Chain::Bsc => "bsc",
            Chain::Polygon => "polygon",
            Chain::Fantom => "fantom",
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Chain {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chain::ALL
            .into_iter()
            .find(|chain| chain.name() == s)
            .ok_or_else(|| EngineError::Config(format!("unknown chain name `{s}`")))
    }
}

/// One transaction's raw trace snapshot as stored in the trace archive.
///
/// The three trace blobs are newline-delimited, comma-separated text; their
/// exact line schema lives in [`crate::schema`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Transaction hash (lowercase hex with 0x prefix).
    pub hash: String,
    /// Chain the transaction executed on.
    pub chain: Chain,
    /// Block number.
    pub block: u64,
    /// Recipient address (hex text).
    pub to: String,
    /// Sender address (hex text).
    pub from: String,
    /// Native value in Wei (decimal text).
    pub value: String,
    /// Gas price in Wei.
    pub gas_price: u64,
    /// Gas used.
    pub gas_used: u64,
    /// Call trace blob, one call per line.
    pub functrace: String,
    /// Transfer log blob, one token transfer per line.
    pub transferlogs: String,
    /// Event trace blob, one emitted log per line.
    pub eventtrace: String,
}

/// Verified contract payload returned by a contract-source provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifiedSource {
    /// Contract address (lowercase hex with 0x prefix).
    pub address: String,
    /// Flattened verified source code.
    pub source_code: String,
    /// ABI as a JSON array string.
    pub abi_json: String,
    /// Contract name as verified.
    pub contract_name: String,
    /// Hex-encoded constructor arguments.
    pub constructor_args: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_id_round_trips_through_name() {
        for chain in Chain::ALL {
            let by_id = Chain::from_id(chain.id()).expect("known id");
            let by_name: Chain = chain.name().parse().expect("known name");
            assert_eq!(by_id, chain);
            assert_eq!(by_name, chain);
        }
    }

    #[test]
    fn unknown_chain_id_is_none() {
        assert_eq!(Chain::from_id(0), None);
        assert_eq!(Chain::from_id(42161), None);
    }

    #[test]
    fn unknown_chain_name_is_config_error() {
        let err = "solana".parse::<Chain>().unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
