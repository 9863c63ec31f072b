//! bridge-abi crate
//!
//! Contract-interface introspection: canonical selector/topic computation,
//! the ABI-backed contract model with token-standard classification, and the
//! shared address-keyed contract cache.

pub mod cache;
pub mod contract;
pub mod selector;

pub use cache::ContractCache;
pub use contract::{AbiParam, ClassifyPolicy, Contract, Event, Function, TokenStandard};
