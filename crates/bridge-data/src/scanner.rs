//! Block-explorer contract-source client (Etherscan-style APIs).
//!
//! One client type covers every supported explorer; the per-chain variant is
//! selected by configuration (base URL + API key), not by inheritance.

use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{EngineError, Result};
use crate::provider::ContractProvider;
use crate::types::{Chain, VerifiedSource};

/// `getsourcecode` response envelope.
#[derive(Debug, Deserialize)]
struct SourceResponse {
    status: String,
    #[serde(default)]
    result: Vec<SourceResult>,
}

#[derive(Debug, Deserialize)]
struct SourceResult {
    #[serde(rename = "SourceCode", default)]
    source_code: String,
    #[serde(rename = "ABI", default)]
    abi: String,
    #[serde(rename = "ContractName", default)]
    contract_name: String,
    #[serde(rename = "ConstructorArguments", default)]
    constructor_arguments: String,
}

/// HTTP client for one chain's block explorer.
pub struct EtherscanClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl EtherscanClient {
    /// Builds a client against an explicit explorer endpoint.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    /// Client for a supported chain's canonical explorer.
    pub fn for_chain(chain: Chain, api_key: impl Into<String>, timeout: Duration) -> Self {
        let base_url = match chain {
            Chain::Eth => "https://api.etherscan.io/api",
            Chain::Bsc => "https://api.bscscan.com/api",
            Chain::Polygon => "https://api.polygonscan.com/api",
            Chain::Fantom => "https://api.ftmscan.com/api",
        };
        Self::new(base_url, api_key, timeout)
    }
}

#[async_trait]
impl ContractProvider for EtherscanClient {
    #[tracing::instrument(skip(self), fields(address = %address))]
    async fn fetch_contract(&self, address: Address) -> Result<Option<VerifiedSource>> {
        let url = format!(
            "{}?module=contract&action=getsourcecode&address={:#x}&apikey={}",
            self.base_url, address, self.api_key
        );

        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| EngineError::Provider(format!("request to {} failed: {e}", self.base_url)))?;

        if !response.status().is_success() {
            return Err(EngineError::Provider(format!(
                "{} returned HTTP {}",
                self.base_url,
                response.status()
            )));
        }

        let body: SourceResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Provider(format!("invalid explorer response: {e}")))?;

        // status "0" or an empty SourceCode both mean "not verified".
        if body.status == "0" {
            tracing::debug!("no verified contract at address");
            return Ok(None);
        }
        let result = match body.result.into_iter().next() {
            Some(result) if !result.source_code.is_empty() => result,
            _ => {
                tracing::debug!("no verified contract at address");
                return Ok(None);
            }
        };

        Ok(Some(VerifiedSource {
            address: format!("{address:#x}"),
            source_code: result.source_code,
            abi_json: result.abi,
            contract_name: result.contract_name,
            constructor_args: result.constructor_arguments,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_envelope_parses() {
        let body = r#"{
            "status": "1",
            "message": "OK",
            "result": [{
                "SourceCode": "contract Bridge {}",
                "ABI": "[]",
                "ContractName": "Bridge",
                "ConstructorArguments": ""
            }]
        }"#;
        let parsed: SourceResponse = serde_json::from_str(body).expect("valid envelope");
        assert_eq!(parsed.status, "1");
        assert_eq!(parsed.result[0].contract_name, "Bridge");
    }

    #[test]
    fn for_chain_selects_explorer() {
        let client = EtherscanClient::for_chain(Chain::Bsc, "key", Duration::from_secs(10));
        assert!(client.base_url.contains("bscscan"));
    }
}
