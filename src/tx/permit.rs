use ethers_core::types::{Address, Bytes, U256};
use ethers_signers::{LocalWallet, Signer};

use crate::{
    abi,
    eip712::Permit,
    tx::{suggested_fees, token_name, TOKEN_DOMAIN_VERSION},
    GsnProvider, GsnTransactionDetails, NetworkConfig, Result,
};

/// Seconds a permit stays valid past the latest block.
///
/// Fixed. On chains whose block interval exceeds this, the permit can expire
/// before inclusion.
pub const PERMIT_DEADLINE_SECONDS: u64 = 45;

/// Deadline for a permit signed now: latest block timestamp plus
/// [`PERMIT_DEADLINE_SECONDS`]
pub async fn permit_deadline<P: GsnProvider>(provider: &P) -> Result<U256> {
    let block = provider.latest_block().await?;
    Ok(block.timestamp.saturating_add(PERMIT_DEADLINE_SECONDS.into()))
}

/// Transfer `amount` of `token` to `destination` through an ERC-2612 permit.
///
/// The user signs a permit approving the paymaster. The relayed call is the
/// `permit` itself, and the paymaster data carries the token address followed
/// by the `transferFrom` the paymaster executes once approved.
#[tracing::instrument(skip(wallet, config, provider), fields(from = ?wallet.address()))]
pub async fn build_permit_tx<P: GsnProvider>(
    wallet: &LocalWallet,
    destination: Address,
    amount: U256,
    config: &NetworkConfig,
    token: Address,
    provider: &P,
) -> Result<GsnTransactionDetails> {
    let owner = wallet.address();
    let spender = config.gsn.paymaster_address;

    let nonce = abi::decode_uint(&provider.call(token, abi::nonces(owner)).await?)?;
    let name = token_name(provider, token).await?;
    let deadline = permit_deadline(provider).await?;
    let salt = abi::decode_eip712_domain_salt(&provider.call(token, abi::eip712_domain()).await?)?;
    tracing::debug!(%nonce, %deadline, name = name.as_str(), ?salt, "Signing permit");

    let permit = Permit {
        name,
        version: TOKEN_DOMAIN_VERSION.to_owned(),
        chain_id: config.gsn.chain_id,
        verifying_contract: token,
        owner,
        spender,
        value: amount,
        nonce,
        deadline,
        salt: Some(salt),
    };
    let sig = permit.sign_parts(wallet)?;

    let data = abi::permit(owner, spender, amount, deadline, &sig);
    let transfer_from = abi::transfer_from(owner, destination, amount);
    let paymaster_data: Bytes = token
        .as_bytes()
        .iter()
        .chain(transfer_from.iter())
        .copied()
        .collect::<Vec<u8>>()
        .into();

    let gas = provider.estimate_gas(owner, token, data.clone()).await?;
    let fees = suggested_fees(provider).await?;

    Ok(GsnTransactionDetails {
        from: owner,
        data,
        to: token,
        max_fee_per_gas: fees.max_fee_per_gas,
        max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
        value: U256::zero(),
        gas,
        paymaster_data: Some(paymaster_data),
    })
}
