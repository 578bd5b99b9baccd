use serde::{Deserialize, Serialize};
use serde_json::Value;

use ethers_core::types::{Address, Bytes};

use crate::{eip712::RelayRequest, DecimalU256};

/// Body of `POST {relayUrl}/relay`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelayHttpRequest {
    /// The signed relay request
    pub relay_request: RelayRequest,
    /// Submission metadata
    pub metadata: RelayMetadata,
}

/// Metadata accompanying a relay request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelayMetadata {
    /// Max acceptance budget
    pub max_acceptance_budget: DecimalU256,
    /// Relay hub
    #[serde(serialize_with = "crate::ser::serialize_checksum_addr")]
    pub relay_hub_address: Address,
    /// User signature over the relay request
    pub signature: Bytes,
    /// Paymaster approval data. Always `0x` for this client
    pub approval_data: Bytes,
    /// Highest worker nonce the relay may use
    pub relay_max_nonce: u64,
    /// Worker transaction count when the request was built
    pub relay_last_known_nonce: u64,
    /// Forwarder domain name
    pub domain_separator_name: String,
    /// Short request id, see [`RelayRequest::request_id`]
    pub relay_request_id: String,
}

/// Response to a relay submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RelayHttpResponse {
    /// The server refused the request
    Rejected {
        /// Error payload, usually a string
        error: Value,
    },
    /// The worker signed a transaction
    Signed {
        /// Raw signed transaction
        #[serde(rename = "signedTx")]
        signed_tx: Bytes,
    },
}

impl RelayHttpResponse {
    /// Error message of a rejection
    pub fn error_message(&self) -> Option<String> {
        match self {
            RelayHttpResponse::Rejected { error: Value::String(s) } => Some(s.clone()),
            RelayHttpResponse::Rejected { error } => Some(error.to_string()),
            RelayHttpResponse::Signed { .. } => None,
        }
    }
}
