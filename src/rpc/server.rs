use serde::{Deserialize, Serialize};

use ethers_core::types::Address;

use crate::DecimalU256;

/// Response to `GET {relayUrl}/getaddr`. Only the fields the client uses are
/// kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfigUpdate {
    /// Worker that will submit the transaction
    pub relay_worker_address: Address,
    /// Lowest priority fee the relay accepts
    pub min_max_priority_fee_per_gas: DecimalU256,
    /// Highest max fee the relay accepts
    pub max_max_fee_per_gas: DecimalU256,
    /// Chain the relay serves
    #[serde(with = "crate::ser::string_or_u64")]
    pub chain_id: u64,
    /// Whether the relay is accepting requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    /// Relay server version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
