use ethers_core::types::{Address, Bytes, TransactionReceipt, H256, U256};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{GsnError, Result};

/// A uint256 carried on the wire as a decimal string.
///
/// GSN request structs keep every numeric field in this form so that values
/// wider than 64 bits survive JSON round trips. Conversions to and from hex are
/// explicit.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DecimalU256(U256);

impl DecimalU256 {
    /// Zero
    pub const fn zero() -> Self {
        Self(U256::zero())
    }

    /// Parse a base-10 string
    pub fn from_dec_str(s: &str) -> Result<Self> {
        U256::from_dec_str(s.trim())
            .map(Self)
            .map_err(|e| GsnError::InvalidArgument(format!("invalid decimal `{}`: {:?}", s, e)))
    }

    /// Parse a base-16 string, with or without the `0x` prefix. `0x` alone is
    /// zero.
    pub fn from_hex_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.is_empty() {
            return Ok(Self::zero());
        }
        U256::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|e| GsnError::InvalidArgument(format!("invalid hex `{}`: {:?}", s, e)))
    }

    /// Parse either representation. `0x`-prefixed input is read as hex.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
            Self::from_hex_str(trimmed)
        } else {
            Self::from_dec_str(trimmed)
        }
    }

    /// `0x`-prefixed lowercase hex with no leading zeros
    pub fn to_hex_string(&self) -> String {
        format!("{:#x}", self.0)
    }

    /// The inner value
    pub fn as_u256(&self) -> U256 {
        self.0
    }
}

impl std::fmt::Display for DecimalU256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DecimalU256 {
    type Err = GsnError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::ops::Deref for DecimalU256 {
    type Target = U256;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<U256> for DecimalU256 {
    fn from(v: U256) -> Self {
        Self(v)
    }
}

impl From<u64> for DecimalU256 {
    fn from(v: u64) -> Self {
        Self(v.into())
    }
}

impl From<DecimalU256> for U256 {
    fn from(v: DecimalU256) -> Self {
        v.0
    }
}

impl Serialize for DecimalU256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DecimalU256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(u64),
            Str(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Num(n) => Ok(n.into()),
            Repr::Str(s) => Self::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

/// Which on-chain mechanism moves tokens on behalf of the user
#[derive(Debug, Copy, Clone, Serialize_repr, Deserialize_repr, PartialEq, Eq)]
#[repr(u8)]
pub enum MetaTxMethod {
    /// ERC-2612 `permit` to the paymaster, paired with a `transferFrom`
    /// carried in the paymaster data
    Permit = 0,
    /// The token's own `executeMetaTransaction` entry point
    ExecuteMetaTransaction = 1,
}

/// Transport-ready transaction handed to the relay client.
///
/// Numeric fields serialize as `0x`-prefixed lowercase hex.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GsnTransactionDetails {
    /// User address
    pub from: Address,
    /// Calldata for `to`
    pub data: Bytes,
    /// Target contract
    pub to: Address,
    /// EIP-1559 max fee per gas
    #[serde(with = "crate::ser::hex_u256_lenient")]
    pub max_fee_per_gas: U256,
    /// EIP-1559 max priority fee per gas
    #[serde(with = "crate::ser::hex_u256_lenient")]
    pub max_priority_fee_per_gas: U256,
    /// Native value, always zero for token flows
    #[serde(with = "crate::ser::hex_u256_lenient")]
    pub value: U256,
    /// Gas limit as estimated by the node
    #[serde(with = "crate::ser::hex_u256_lenient")]
    pub gas: U256,
    /// Extra data for the paymaster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,
}

/// Result of submitting a relayed transaction
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// A receipt was observed
    Confirmed {
        /// Transaction hash
        tx_hash: H256,
        /// The receipt
        receipt: Box<TransactionReceipt>,
    },
    /// No receipt before the deadline or cancellation. The transaction may
    /// still be mined.
    Pending {
        /// Transaction hash
        tx_hash: H256,
    },
}

impl RelayOutcome {
    /// The transaction hash, whether or not it was confirmed
    pub fn tx_hash(&self) -> H256 {
        match self {
            RelayOutcome::Confirmed { tx_hash, .. } | RelayOutcome::Pending { tx_hash } => *tx_hash,
        }
    }

    /// True if a receipt was observed
    pub fn is_confirmed(&self) -> bool {
        matches!(self, RelayOutcome::Confirmed { .. })
    }
}
