//! Shared test fixtures: a two-chain world with a bridge deployed on both
//! sides, backed by in-memory trace archives and a static contract provider.

#![allow(dead_code)]

use std::sync::Arc;

use bridge_abi::contract::ClassifyPolicy;
use bridge_abi::selector::function_selector;
use bridge_abi::ContractCache;
use bridge_data::provider::StaticProvider;
use bridge_data::store::TraceStore;
use bridge_data::types::{Chain, TraceRecord, VerifiedSource};
use bridge_engine::registry::ChainContext;
use bridge_engine::{BridgesConfig, LinkOptions, Registry};

pub const USER: &str = "0x00000000000000000000000000000000000000aa";
pub const BRIDGE_ETH: &str = "0x00000000000000000000000000000000000000bb";
pub const BRIDGE_POLYGON: &str = "0x00000000000000000000000000000000000000be";
pub const TOKEN_ETH: &str = "0x00000000000000000000000000000000000000cc";
pub const TOKEN_POLYGON: &str = "0x00000000000000000000000000000000000000cd";

pub fn bridge_abi_json() -> &'static str {
    concat!(
        r#"[{"type":"function","name":"swapOut","inputs":[{"name":"to","type":"address"},"#,
        r#"{"name":"token","type":"address"},{"name":"amount","type":"uint256"},"#,
        r#"{"name":"toChainID","type":"uint256"}],"outputs":[]},"#,
        r#"{"type":"function","name":"swapIn","inputs":[{"name":"to","type":"address"},"#,
        r#"{"name":"amount","type":"uint256"}],"outputs":[]},"#,
        r#"{"type":"event","name":"LogSwapOut","inputs":[{"name":"to","type":"address"},"#,
        r#"{"name":"amount","type":"uint256"}]},"#,
        r#"{"type":"event","name":"LogSwapIn","inputs":[{"name":"to","type":"address"},"#,
        r#"{"name":"amount","type":"uint256"}]}]"#,
    )
}

pub fn erc20_abi_json() -> &'static str {
    concat!(
        r#"[{"type":"function","name":"totalSupply","inputs":[],"outputs":[]},"#,
        r#"{"type":"function","name":"balanceOf","inputs":[{"name":"a","type":"address"}],"outputs":[]},"#,
        r#"{"type":"function","name":"transfer","inputs":[{"name":"a","type":"address"},{"name":"b","type":"uint256"}],"outputs":[]},"#,
        r#"{"type":"function","name":"transferFrom","inputs":[{"name":"a","type":"address"},{"name":"b","type":"address"},{"name":"c","type":"uint256"}],"outputs":[]},"#,
        r#"{"type":"function","name":"approve","inputs":[{"name":"a","type":"address"},{"name":"b","type":"uint256"}],"outputs":[]},"#,
        r#"{"type":"function","name":"allowance","inputs":[{"name":"a","type":"address"},{"name":"b","type":"address"}],"outputs":[]},"#,
        r#"{"type":"event","name":"Transfer","inputs":[{"name":"from","type":"address"},{"name":"to","type":"address"},{"name":"value","type":"uint256"}]},"#,
        r#"{"type":"event","name":"Approval","inputs":[{"name":"a","type":"address"},{"name":"b","type":"address"},{"name":"c","type":"uint256"}]}]"#,
    )
}

pub fn verified(address: &str, name: &str, abi: &str) -> VerifiedSource {
    VerifiedSource {
        address: address.to_string(),
        source_code: format!("contract {name} {{}}"),
        abi_json: abi.to_string(),
        contract_name: name.to_string(),
        constructor_args: String::new(),
    }
}

/// Provider knowing the bridge routers and tokens on both chains.
pub fn test_provider() -> Arc<StaticProvider> {
    let mut provider = StaticProvider::new();
    provider.insert(BRIDGE_ETH.parse().unwrap(), verified(BRIDGE_ETH, "Router", bridge_abi_json()));
    provider.insert(
        BRIDGE_POLYGON.parse().unwrap(),
        verified(BRIDGE_POLYGON, "Router", bridge_abi_json()),
    );
    provider.insert(TOKEN_ETH.parse().unwrap(), verified(TOKEN_ETH, "Token", erc20_abi_json()));
    provider.insert(
        TOKEN_POLYGON.parse().unwrap(),
        verified(TOKEN_POLYGON, "AnyToken", erc20_abi_json()),
    );
    Arc::new(provider)
}

/// One 32-byte calldata word as hex text.
pub fn word(value: u64) -> String {
    format!("{value:064x}")
}

/// An address left-padded to a 32-byte calldata word.
pub fn word_addr(address: &str) -> String {
    format!("{:0>64}", address.trim_start_matches("0x"))
}

pub fn swap_out_calldata(receiver: &str, token: &str, amount: u64, dest_chain_id: u64) -> String {
    let selector = function_selector("swapOut", &["address", "address", "uint256", "uint256"]);
    format!(
        "0x{selector:x}{}{}{}{}",
        word_addr(receiver),
        word_addr(token),
        word(amount),
        word(dest_chain_id),
    )
}

pub fn swap_in_calldata(receiver: &str, amount: u64) -> String {
    let selector = function_selector("swapIn", &["address", "uint256"]);
    format!("0x{selector:x}{}{}", word_addr(receiver), word(amount))
}

/// A source-side transaction: user calls `swapOut` on the Ethereum router
/// and the token moves from the user into the router.
pub fn send_record(hash: &str, block: u64, amount: u64, dest_chain_id: u64) -> TraceRecord {
    TraceRecord {
        hash: hash.to_string(),
        chain: Chain::Eth,
        block,
        to: BRIDGE_ETH.to_string(),
        from: USER.to_string(),
        value: "0".to_string(),
        gas_price: 30_000_000_000,
        gas_used: 180_000,
        functrace: format!(
            "0,call,0,{USER},{BRIDGE_ETH},0,180000,{},0x",
            swap_out_calldata(USER, TOKEN_POLYGON, amount, dest_chain_id),
        ),
        transferlogs: format!("{USER},{BRIDGE_ETH},{TOKEN_ETH},{amount},1"),
        eventtrace: String::new(),
    }
}

/// A destination-side transaction: the Polygon router receives `swapIn` and
/// pays `amount` of the wrapped token out to `receiver`.
pub fn receive_record(hash: &str, block: u64, receiver: &str, amount: u64) -> TraceRecord {
    TraceRecord {
        hash: hash.to_string(),
        chain: Chain::Polygon,
        block,
        to: BRIDGE_POLYGON.to_string(),
        from: BRIDGE_POLYGON.to_string(),
        value: "0".to_string(),
        gas_price: 50_000_000_000,
        gas_used: 120_000,
        functrace: format!(
            "0,call,0,{BRIDGE_POLYGON},{BRIDGE_POLYGON},0,120000,{},0x",
            swap_in_calldata(receiver, amount),
        ),
        transferlogs: format!("{BRIDGE_POLYGON},{receiver},{TOKEN_POLYGON},{amount},1"),
        eventtrace: String::new(),
    }
}

pub fn bridges_config() -> BridgesConfig {
    let json = format!(
        r#"{{
            "testbridge": {{
                "eth": {{
                    "address": "{BRIDGE_ETH}",
                    "outboundFunctions": ["swapOut"]
                }},
                "polygon": {{
                    "address": "{BRIDGE_POLYGON}",
                    "inboundFunctions": ["swapIn"]
                }}
            }}
        }}"#
    );
    BridgesConfig::from_json(&json).expect("fixture config is valid")
}

/// Two-chain world: in-memory archives for Ethereum and Polygon plus a
/// registry bound against the fixture bridge.
pub struct World {
    pub eth_store: Arc<TraceStore>,
    pub polygon_store: Arc<TraceStore>,
    pub registry: Registry,
}

/// Builds the world with block indexes already loaded. Ethereum block 500 is
/// at t=1000; Polygon blocks 900..=905 straddle that timestamp so the
/// correlation window starts at block 901.
pub async fn test_world() -> World {
    let provider = test_provider();
    let eth_store = Arc::new(TraceStore::new(":memory:").expect("in-memory store opens"));
    let polygon_store = Arc::new(TraceStore::new(":memory:").expect("in-memory store opens"));

    eth_store
        .insert_blocks(Chain::Eth, &[(499, 985), (500, 1000), (501, 1015)])
        .expect("block index inserts");
    polygon_store
        .insert_blocks(
            Chain::Polygon,
            &[(900, 998), (901, 1001), (902, 1004), (903, 1007), (904, 1010), (905, 1013)],
        )
        .expect("block index inserts");

    let contexts = vec![
        ChainContext {
            chain: Chain::Eth,
            store: eth_store.clone(),
            cache: Arc::new(ContractCache::new(provider.clone())),
        },
        ChainContext {
            chain: Chain::Polygon,
            store: polygon_store.clone(),
            cache: Arc::new(ContractCache::new(provider)),
        },
    ];
    let registry = Registry::build(
        &bridges_config(),
        contexts,
        LinkOptions::default(),
        ClassifyPolicy::default(),
    )
    .await
    .expect("fixture registry binds");

    World {
        eth_store,
        polygon_store,
        registry,
    }
}
