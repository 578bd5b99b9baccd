use ethers_core::types::U256;
use ethers_signers::{LocalWallet, Signer};

use crate::{abi, tx::suggested_fees, GsnProvider, GsnTransactionDetails, NetworkConfig, Result};

/// Faucet `claim()` for the wallet, with a node gas estimate and current fees
#[tracing::instrument(skip_all, fields(from = ?wallet.address(), faucet = ?config.contracts.token_faucet))]
pub async fn build_claim_tx<P: GsnProvider>(
    wallet: &LocalWallet,
    config: &NetworkConfig,
    provider: &P,
) -> Result<GsnTransactionDetails> {
    let from = wallet.address();
    let faucet = config.contracts.token_faucet;
    let data = abi::claim();

    let gas = provider.estimate_gas(from, faucet, data.clone()).await?;
    let fees = suggested_fees(provider).await?;
    tracing::debug!(%gas, "Claim transaction");

    Ok(GsnTransactionDetails {
        from,
        data,
        to: faucet,
        max_fee_per_gas: fees.max_fee_per_gas,
        max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
        value: U256::zero(),
        gas,
        paymaster_data: None,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::test::config, eip712::relay_request::test::USER_KEY, provider::mock::MockProvider,
    };

    #[tokio::test]
    async fn it_targets_the_faucet() {
        let wallet: LocalWallet = USER_KEY.parse().unwrap();
        let config = config();
        let provider = MockProvider::new();

        let tx = build_claim_tx(&wallet, &config, &provider).await.unwrap();
        assert_eq!(tx.to, config.contracts.token_faucet);
        assert_eq!(tx.from, wallet.address());
        assert_eq!(tx.data, abi::claim());
        assert_eq!(tx.gas, U256::from(90_000));
        // base fee 1 gwei
        assert_eq!(tx.max_fee_per_gas, U256::from(3_500_000_000u64));
        assert!(tx.paymaster_data.is_none());
    }
}
