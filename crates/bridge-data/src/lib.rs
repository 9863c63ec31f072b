//! bridge-data crate
//!
//! Data layer for the cross-chain correlation engine: chain identifiers,
//! raw trace records and their line schema, the SQLite trace store, the
//! block-timestamp index, and the external contract-source providers.

pub mod blockindex;
pub mod error;
pub mod provider;
pub mod scanner;
pub mod schema;
pub mod store;
pub mod types;

pub use blockindex::BlockIndex;
pub use error::EngineError;
pub use store::TraceStore;
pub use types::{Chain, TraceRecord, VerifiedSource};
