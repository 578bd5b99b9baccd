use ethers_core::types::{Address, U256};
use ethers_signers::{LocalWallet, Signer};

use crate::{
    abi,
    eip712::MetaTransaction,
    tx::{suggested_fees, token_name, TOKEN_DOMAIN_VERSION},
    GsnProvider, GsnTransactionDetails, NetworkConfig, Result,
};

/// Outcome of asking a token for `nonces(owner)`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NonceProbe {
    /// The token answered
    Ok(U256),
    /// The call failed or returned something other than a uint
    NotSupported,
}

/// Query the ERC-2612 `nonces(owner)` shape. Never errors: any failure is
/// [`NonceProbe::NotSupported`].
pub async fn probe_nonces<P: GsnProvider>(provider: &P, token: Address, owner: Address) -> NonceProbe {
    let ret = match provider.call(token, abi::nonces(owner)).await {
        Ok(ret) => ret,
        Err(e) => {
            tracing::debug!(error = %e, "nonces() call failed");
            return NonceProbe::NotSupported;
        }
    };
    abi::decode_uint(&ret)
        .map(NonceProbe::Ok)
        .unwrap_or(NonceProbe::NotSupported)
}

/// The sender's nonce on a token contract.
///
/// Tries `nonces(owner)` and falls back to `getNonce(from)` exactly once. An
/// error from the fallback propagates.
pub async fn get_sender_contract_nonce<P: GsnProvider>(
    provider: &P,
    token: Address,
    address: Address,
) -> Result<U256> {
    match probe_nonces(provider, token, address).await {
        NonceProbe::Ok(nonce) => Ok(nonce),
        NonceProbe::NotSupported => {
            tracing::warn!(token = ?token, "Token has no nonces(), falling back to getNonce()");
            abi::decode_uint(&provider.call(token, abi::get_nonce(address)).await?)
        }
    }
}

/// Transfer `amount` of `token` to `destination` through the token's
/// `executeMetaTransaction`.
///
/// The user signs the `transfer` calldata under the token's domain, whose salt
/// is the chain id, and the relayed call hands both to the token.
#[tracing::instrument(skip(wallet, config, provider), fields(from = ?wallet.address()))]
pub async fn build_execute_meta_tx<P: GsnProvider>(
    wallet: &LocalWallet,
    destination: Address,
    amount: U256,
    config: &NetworkConfig,
    token: Address,
    provider: &P,
) -> Result<GsnTransactionDetails> {
    let from = wallet.address();

    let nonce = get_sender_contract_nonce(provider, token, from).await?;
    let name = token_name(provider, token).await?;
    let function_signature = abi::transfer(destination, amount);
    tracing::debug!(%nonce, name = name.as_str(), "Signing meta transaction");

    let meta = MetaTransaction {
        name,
        version: TOKEN_DOMAIN_VERSION.to_owned(),
        chain_id: config.gsn.chain_id,
        verifying_contract: token,
        nonce,
        from,
        function_signature,
    };
    let sig = meta.sign_parts(wallet)?;
    let data = abi::execute_meta_transaction(from, &meta.function_signature, &sig);

    let gas = provider.estimate_gas(from, token, data.clone()).await?;
    let fees = suggested_fees(provider).await?;

    Ok(GsnTransactionDetails {
        from,
        data,
        to: token,
        max_fee_per_gas: fees.max_fee_per_gas,
        max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
        value: U256::zero(),
        gas,
        paymaster_data: None,
    })
}
