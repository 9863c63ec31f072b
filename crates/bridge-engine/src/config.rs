//! Bridge topology configuration: which contracts a bridge deploys on which
//! chains, and which ABI functions and events mark its send and receive
//! paths.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use bridge_data::error::{EngineError, Result};

/// Calldata word index that carries the destination chain id on send calls,
/// used when a binding does not name its own.
pub const DEFAULT_CHAIN_ID_ARG: usize = 3;

/// Top-level config: bridge name to bridge definition. BTreeMap keeps the
/// probe order of routing deterministic.
#[derive(Debug, Deserialize)]
pub struct BridgesConfig(pub BTreeMap<String, BridgeConfig>);

impl BridgesConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| EngineError::Config(format!("bad bridges config: {e}")))
    }
}

/// One bridge: per-chain endpoints plus bridge-wide correlation options.
#[derive(Debug, Deserialize)]
pub struct BridgeConfig {
    #[serde(default, rename = "matchToken")]
    pub match_token: bool,
    /// Chain name ("eth", "bsc", ...) to the endpoint deployed there.
    #[serde(flatten)]
    pub chains: BTreeMap<String, EndpointConfig>,
}

/// One endpoint: the bridge contract address and its role bindings.
#[derive(Debug, Deserialize)]
pub struct EndpointConfig {
    pub address: String,
    #[serde(default, rename = "outboundFunctions")]
    pub outbound_functions: Vec<Binding>,
    #[serde(default, rename = "inboundFunctions")]
    pub inbound_functions: Vec<Binding>,
    #[serde(default, rename = "outboundEvents")]
    pub outbound_events: Vec<Binding>,
    #[serde(default, rename = "inboundEvents")]
    pub inbound_events: Vec<Binding>,
}

/// One bound ABI item. In JSON either a bare name or a one-entry map with
/// per-binding settings:
///
/// ```json
/// ["swapOut", {"anySwapOut": {"chainIdArg": 2}}]
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub name: String,
    pub chain_id_arg: usize,
}

#[derive(Debug, Deserialize)]
struct BindingMeta {
    #[serde(default = "default_chain_id_arg", rename = "chainIdArg")]
    chain_id_arg: usize,
}

impl Default for BindingMeta {
    fn default() -> Self {
        BindingMeta {
            chain_id_arg: DEFAULT_CHAIN_ID_ARG,
        }
    }
}

fn default_chain_id_arg() -> usize {
    DEFAULT_CHAIN_ID_ARG
}

impl<'de> Deserialize<'de> for Binding {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BindingVisitor;

        impl<'de> Visitor<'de> for BindingVisitor {
            type Value = Binding;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a name string or a single-entry name-to-settings map")
            }

            fn visit_str<E: serde::de::Error>(self, value: &str) -> std::result::Result<Binding, E> {
                Ok(Binding {
                    name: value.to_string(),
                    chain_id_arg: DEFAULT_CHAIN_ID_ARG,
                })
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Binding, A::Error>
            where
                A: MapAccess<'de>,
            {
                let Some((name, meta)) = map.next_entry::<String, Option<BindingMeta>>()? else {
                    return Err(serde::de::Error::custom("binding map is empty"));
                };
                if map.next_key::<String>()?.is_some() {
                    return Err(serde::de::Error::custom(
                        "binding map must have exactly one entry",
                    ));
                }
                let meta = meta.unwrap_or_default();
                Ok(Binding {
                    name,
                    chain_id_arg: meta.chain_id_arg,
                })
            }
        }

        deserializer.deserialize_any(BindingVisitor)
    }
}

impl Binding {
    /// `(name, chain_id_arg)` pairs for `Endpoint::bind`.
    pub fn as_pairs(bindings: &[Binding]) -> Vec<(String, usize)> {
        bindings
            .iter()
            .map(|b| (b.name.clone(), b.chain_id_arg))
            .collect()
    }

    pub fn names(bindings: &[Binding]) -> Vec<String> {
        bindings.iter().map(|b| b.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_and_configured_bindings() {
        let json = r#"{
            "anyswap": {
                "matchToken": true,
                "eth": {
                    "address": "0x00000000000000000000000000000000000000bb",
                    "outboundFunctions": ["swapOut", {"anySwapOutUnderlying": {"chainIdArg": 2}}],
                    "outboundEvents": ["LogSwapOut"]
                },
                "polygon": {
                    "address": "0x00000000000000000000000000000000000000be",
                    "inboundFunctions": [{"swapIn": null}],
                    "inboundEvents": ["LogSwapIn"]
                }
            }
        }"#;

        let config = BridgesConfig::from_json(json).unwrap();
        let bridge = &config.0["anyswap"];
        assert!(bridge.match_token);

        let eth = &bridge.chains["eth"];
        assert_eq!(
            eth.outbound_functions,
            vec![
                Binding { name: "swapOut".to_string(), chain_id_arg: DEFAULT_CHAIN_ID_ARG },
                Binding { name: "anySwapOutUnderlying".to_string(), chain_id_arg: 2 },
            ]
        );

        let polygon = &bridge.chains["polygon"];
        assert_eq!(polygon.inbound_functions[0].name, "swapIn");
        assert_eq!(polygon.inbound_functions[0].chain_id_arg, DEFAULT_CHAIN_ID_ARG);
        assert!(polygon.outbound_functions.is_empty());
    }

    #[test]
    fn rejects_malformed_config() {
        assert!(BridgesConfig::from_json("not json").is_err());
        let multi_key = r#"{"b": {"eth": {"address": "0x00",
            "outboundFunctions": [{"a": null, "b": null}]}}}"#;
        assert!(BridgesConfig::from_json(multi_key).is_err());
    }
}
