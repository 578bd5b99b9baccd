//! Builders for the transactions the network relays: faucet claims and token
//! transfers by permit or by `executeMetaTransaction`

use ethers_core::types::{Address, U256};
use once_cell::sync::Lazy;

use crate::{abi, GsnError, GsnProvider, Result};

mod claim;
pub use claim::*;

mod permit;
pub use permit::*;

mod meta_tx;
pub use meta_tx::*;

/// Priority fee offered on every relayed transaction: 1.5 gwei
pub static PRIORITY_FEE_PER_GAS: Lazy<U256> = Lazy::new(|| U256::from(1_500_000_000u64));

/// Version string of the token EIP-712 domains
pub const TOKEN_DOMAIN_VERSION: &str = "1";

/// EIP-1559 fee pair
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Fees {
    /// `2 * baseFee + priority`
    pub max_fee_per_gas: U256,
    /// Fixed priority fee
    pub max_priority_fee_per_gas: U256,
}

impl Fees {
    /// Fees for a block with the given base fee. Tolerates one doubling of the
    /// base fee before the transaction is underpriced.
    pub fn from_base_fee(base_fee: U256) -> Self {
        let priority = *PRIORITY_FEE_PER_GAS;
        Self {
            max_fee_per_gas: base_fee.saturating_mul(U256::from(2u8)).saturating_add(priority),
            max_priority_fee_per_gas: priority,
        }
    }
}

/// Fees from the latest block's base fee
pub async fn suggested_fees<P: GsnProvider>(provider: &P) -> Result<Fees> {
    let block = provider.latest_block().await?;
    let base_fee = block
        .base_fee_per_gas
        .ok_or_else(|| GsnError::rpc("latest block has no base fee"))?;
    let fees = Fees::from_base_fee(base_fee);
    tracing::debug!(%base_fee, max_fee = %fees.max_fee_per_gas, "Suggested fees");
    Ok(fees)
}

/// Token `name()`
pub async fn token_name<P: GsnProvider>(provider: &P, token: Address) -> Result<String> {
    abi::decode_string(&provider.call(token, abi::name()).await?)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::provider::mock::MockProvider;

    #[test]
    fn fees_double_the_base_fee() {
        let fees = Fees::from_base_fee(10_000_000_000u64.into());
        assert_eq!(fees.max_priority_fee_per_gas, U256::from(1_500_000_000u64));
        assert_eq!(fees.max_fee_per_gas, U256::from(21_500_000_000u64));
    }

    #[tokio::test]
    async fn fees_need_a_base_fee() {
        let mut provider = MockProvider::new();
        provider.block.base_fee_per_gas = None;
        let err = suggested_fees(&provider).await.unwrap_err();
        assert!(matches!(err, GsnError::Rpc(_)));
    }
}
