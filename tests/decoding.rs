//! Integration tests for trace decoding through the store and contract
//! cache: calldata words, transfer classification, and failure modes.

mod common;

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use bridge_abi::contract::{ClassifyPolicy, TokenStandard};
use bridge_abi::selector::function_selector;
use bridge_abi::ContractCache;
use bridge_data::error::EngineError;
use bridge_data::store::TraceStore;
use bridge_data::types::Chain;
use bridge_engine::Transaction;

use common::{
    receive_record, send_record, test_provider, BRIDGE_ETH, TOKEN_ETH, TOKEN_POLYGON, USER,
};

fn eth_setup() -> (Arc<TraceStore>, ContractCache) {
    let store = Arc::new(TraceStore::new(":memory:").expect("in-memory store opens"));
    let cache = ContractCache::new(test_provider());
    (store, cache)
}

#[tokio::test]
async fn send_transaction_decodes_calls_and_transfers() {
    let (store, cache) = eth_setup();
    store.insert_trace(&send_record("0xsend", 500, 100, 137)).unwrap();

    let tx = Transaction::load(&store, &cache, Chain::Eth, "0xsend", ClassifyPolicy::default())
        .await
        .expect("fixture decodes");

    assert_eq!(tx.calls.len(), 1);
    assert_eq!(tx.transfers.len(), 1);

    let call = tx.top_call().expect("entry call present");
    let expected =
        function_selector("swapOut", &["address", "address", "uint256", "uint256"]);
    assert_eq!(call.selector, Some(expected));
    assert_eq!(call.input_words.len(), 4);
    assert_eq!(call.input_words[2], U256::from(100u64));
    assert_eq!(call.input_words[3], U256::from(137u64));

    let transfer = &tx.transfers[0];
    assert_eq!(transfer.from, USER);
    assert_eq!(transfer.to, BRIDGE_ETH);
    assert_eq!(transfer.token, TOKEN_ETH);
    assert_eq!(transfer.standard, TokenStandard::Erc20);
    assert!(tx.is_token_transfer);
}

#[tokio::test]
async fn receive_transaction_decodes_on_destination_chain() {
    let store = Arc::new(TraceStore::new(":memory:").expect("in-memory store opens"));
    let cache = ContractCache::new(test_provider());
    store.insert_trace(&receive_record("0xrecv", 902, USER, 90)).unwrap();

    let tx = Transaction::load(&store, &cache, Chain::Polygon, "0xrecv", ClassifyPolicy::default())
        .await
        .expect("fixture decodes");

    let transfer = &tx.transfers[0];
    assert_eq!(transfer.to, USER);
    assert_eq!(transfer.token, TOKEN_POLYGON);
    assert_eq!(transfer.amount, U256::from(90u64));
    assert!(tx.is_token_transfer);
}

#[tokio::test]
async fn decode_is_chain_scoped() {
    let (store, cache) = eth_setup();
    store.insert_trace(&send_record("0xsend", 500, 100, 137)).unwrap();

    // Same hash, wrong chain: the archive key is (chain, hash).
    let err = Transaction::load(&store, &cache, Chain::Bsc, "0xsend", ClassifyPolicy::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TransactionNotFound { chain: Chain::Bsc, .. }));
}

#[tokio::test]
async fn truncated_trace_line_fails_decode() {
    let (store, cache) = eth_setup();
    let mut record = send_record("0xbad", 500, 100, 137);
    record.functrace = format!("0,call,0,{USER},{BRIDGE_ETH},0,180000,0xdead");
    store.insert_trace(&record).unwrap();

    let err = Transaction::load(&store, &cache, Chain::Eth, "0xbad", ClassifyPolicy::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MalformedTrace { kind: "call", expected: 9, got: 8 }));
}

#[tokio::test]
async fn ragged_calldata_fails_decode() {
    let (store, cache) = eth_setup();
    let mut record = send_record("0xragged", 500, 100, 137);
    // Selector plus a half word of arguments.
    record.functrace = format!(
        "0,call,0,{USER},{BRIDGE_ETH},0,180000,0xa9059cbb{:032x},0x",
        7u64
    );
    store.insert_trace(&record).unwrap();

    let err = Transaction::load(&store, &cache, Chain::Eth, "0xragged", ClassifyPolicy::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MalformedField { kind: "call", field: "input", .. }));
}

#[tokio::test]
async fn contract_map_covers_only_verified_addresses() {
    let (store, cache) = eth_setup();
    store.insert_trace(&send_record("0xsend", 500, 100, 137)).unwrap();

    let tx = Transaction::load(&store, &cache, Chain::Eth, "0xsend", ClassifyPolicy::default())
        .await
        .expect("fixture decodes");

    // Bridge and token are verified; the user EOA is not.
    assert_eq!(tx.contracts.len(), 2);
    assert!(tx.contracts.contains_key(&BRIDGE_ETH.parse::<Address>().unwrap()));
    assert!(tx.contracts.contains_key(&TOKEN_ETH.parse::<Address>().unwrap()));
    assert!(!tx.contracts.contains_key(&USER.parse::<Address>().unwrap()));

    assert!(tx.selectors_by_name.contains_key("swapOut"));
    assert!(tx.selectors_by_name.contains_key("transfer"));
}

#[tokio::test]
async fn interacted_functions_name_decoded_calls() {
    let (store, cache) = eth_setup();
    store.insert_trace(&send_record("0xsend", 500, 100, 137)).unwrap();

    let tx = Transaction::load(&store, &cache, Chain::Eth, "0xsend", ClassifyPolicy::default())
        .await
        .expect("fixture decodes");

    let pairs = tx.interacted_functions();
    assert_eq!(pairs.len(), 1);
    let (call, function) = pairs[0];
    assert_eq!(function.name, "swapOut");
    assert_eq!(call.selector, Some(function.selector));
}
