//! Error kinds shared across the engine.
//!
//! "Contract not verified" is deliberately not an error: providers return
//! `Ok(None)` for it and lookups continue. Everything here either fails one
//! transaction's decode or aborts a misconfigured startup.

use crate::types::Chain;

/// Engine-level error. Per-transaction decode failures carry enough context
/// to be recorded per item without aborting a batch.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The trace store has no record for the requested hash.
    #[error("transaction {hash} not found in {chain} trace store")]
    TransactionNotFound { chain: Chain, hash: String },

    /// A configured bridge binding references a function absent from the ABI.
    #[error("function `{0}` not found in contract ABI")]
    FunctionNotFound(String),

    /// A configured bridge binding references an event absent from the ABI.
    #[error("event `{0}` not found in contract ABI")]
    EventNotFound(String),

    /// An ABI type with no fixed decode width (dynamic or unknown).
    #[error("unsupported ABI type `{0}`")]
    TypeNotFound(String),

    /// A trace line had the wrong field count. The schema is stable, so this
    /// fails the whole transaction's decode rather than truncating silently.
    #[error("malformed {kind} record: expected {expected} fields, got {got}")]
    MalformedTrace {
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    /// A trace field failed to parse into its declared type.
    #[error("malformed {kind} field `{field}`: {value:?}")]
    MalformedField {
        kind: &'static str,
        field: &'static str,
        value: String,
    },

    /// External provider request failure (non-2xx, rate limit, transport).
    /// Distinct from "not found" so the caller can decide retry policy.
    #[error("provider request failed: {0}")]
    Provider(String),

    /// Underlying trace store failure.
    #[error("trace store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Invalid bridge configuration. Aborts startup before any processing.
    #[error("invalid bridge configuration: {0}")]
    Config(String),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
