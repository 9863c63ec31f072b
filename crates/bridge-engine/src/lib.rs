//! bridge-engine crate
//!
//! The cross-chain transfer correlation core: trace decoding into typed
//! call/transfer/event records, per-chain bridge endpoints, the two-phase
//! source/destination join, and the registry that routes transaction hashes
//! to the right bridge and aggregates results for reporting.

pub mod bridge;
pub mod config;
pub mod endpoint;
pub mod registry;
pub mod report;
pub mod transaction;

pub use bridge::{Bridge, LinkOptions, LinkReport, LinkState};
pub use config::BridgesConfig;
pub use endpoint::{Endpoint, ReceiveLeg, RejectedLeg, ScanOutcome, SendLeg};
pub use registry::{ChainContext, Registry};
pub use report::{CorrelationRecord, ExportFormat, InvalidRecord};
pub use transaction::Transaction;
