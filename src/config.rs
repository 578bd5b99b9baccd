use std::path::Path;

use ethers_core::types::Address;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Per-chain GSN parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GsnConfig {
    /// Paymaster sponsoring relayed calls
    pub paymaster_address: Address,
    /// Trusted forwarder verifying relay requests
    pub forwarder_address: Address,
    /// Relay hub
    pub relay_hub_address: Address,
    /// Relay worker. Refreshed from the relay server before each submission.
    pub relay_worker_address: Address,
    /// Relay server base URL
    pub relay_url: url::Url,
    /// Node RPC URL
    pub rpc_url: url::Url,
    /// Chain id
    #[serde(with = "crate::ser::string_or_u64")]
    pub chain_id: u64,
    /// Max acceptance budget passed to the relay hub
    #[serde(with = "crate::ser::string_or_u64")]
    pub max_acceptance_budget: u64,
    /// Forwarder EIP-712 domain name
    pub domain_separator_name: String,
    /// Gas per nonzero calldata byte
    #[serde(with = "crate::ser::string_or_u64")]
    pub gtx_data_non_zero: u64,
    /// Gas per zero calldata byte
    #[serde(with = "crate::ser::string_or_u64")]
    pub gtx_data_zero: u64,
    /// Lifetime of a relay request in seconds
    #[serde(with = "crate::ser::string_or_u64")]
    pub request_valid_seconds: u64,
    /// Upper bound on paymaster data length, in bytes
    #[serde(with = "crate::ser::string_or_u64")]
    pub max_paymaster_data_length: u64,
    /// Upper bound on approval data length, in bytes
    #[serde(with = "crate::ser::string_or_u64")]
    pub max_approval_data_length: u64,
    /// How far ahead of the worker's nonce the relay may queue
    #[serde(with = "crate::ser::string_or_u64")]
    pub max_relay_nonce_gap: u64,
    /// Bearer token for the relay server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relayer_api_key: Option<String>,
}

/// Token contracts used by the network facade
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContractsConfig {
    /// Faucet dispensing the initial token balance
    pub token_faucet: Address,
    /// Default token for balances and transfers
    #[serde(rename = "rlyERC20")]
    pub rly_erc20: Address,
}

/// A chain the client talks to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// Token contracts
    pub contracts: ContractsConfig,
    /// GSN parameters
    pub gsn: GsnConfig,
}

impl NetworkConfig {
    /// Parse from a JSON string
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Read a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("reading {}: {}", path.display(), e))?;
        Ok(Self::from_json_str(&contents)?)
    }
}
