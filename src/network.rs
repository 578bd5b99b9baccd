use ethers_core::types::{Address, U256};
use ethers_signers::{LocalWallet, Signer};

use crate::{
    abi,
    client::{RelayClient, Relayer},
    tx::{build_claim_tx, build_execute_meta_tx, build_permit_tx},
    utils::{balance_to_f64, parse_units},
    GsnError, GsnProvider, GsnTransactionDetails, MetaTxMethod, NetworkConfig, RelayOutcome,
    Result,
};

/// Largest `decimals()` whose scale fits in a uint256
const MAX_DECIMALS: u32 = 77;

/// User-facing operations on one chain: balances, the faucet claim and
/// gasless transfers.
///
/// Every operation needs an account, see [`Network::with_account`].
#[derive(Debug)]
pub struct Network<P, R = RelayClient> {
    config: NetworkConfig,
    provider: P,
    relayer: R,
    account: Option<LocalWallet>,
}

impl<P> Network<P, RelayClient>
where
    P: GsnProvider,
{
    /// Network relaying through the server named in `config`
    pub fn new(config: NetworkConfig, provider: P) -> Self {
        let relayer = RelayClient::from_config(&config.gsn);
        Self::with_relayer(config, provider, relayer)
    }
}

impl<P, R> Network<P, R>
where
    P: GsnProvider,
    R: Relayer,
{
    /// Network relaying through a custom [`Relayer`]
    pub fn with_relayer(config: NetworkConfig, provider: P, relayer: R) -> Self {
        Self {
            config,
            provider,
            relayer,
            account: None,
        }
    }

    /// Bind the signing account
    #[must_use]
    pub fn with_account(mut self, wallet: LocalWallet) -> Self {
        self.account = Some(wallet);
        self
    }

    /// Set the relay server API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.gsn.relayer_api_key = Some(api_key.into());
        self
    }

    /// The chain configuration
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// The node
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The bound account, or [`GsnError::InvalidState`]
    pub fn account(&self) -> Result<&LocalWallet> {
        self.account.as_ref().ok_or(GsnError::InvalidState)
    }

    fn token_or_default(&self, token: Option<Address>) -> Address {
        token.unwrap_or(self.config.contracts.rly_erc20)
    }

    /// Token balance of the account in base units. Defaults to the network's
    /// token.
    pub async fn balance(&self, token: Option<Address>) -> Result<U256> {
        let owner = self.account()?.address();
        let token = self.token_or_default(token);
        abi::decode_uint(&self.provider.call(token, abi::balance_of(owner)).await?)
    }

    /// Token `decimals()`
    pub async fn decimals(&self, token: Option<Address>) -> Result<u32> {
        let token = self.token_or_default(token);
        let decimals = abi::decode_uint(&self.provider.call(token, abi::decimals()).await?)?;
        if decimals > U256::from(MAX_DECIMALS) {
            return Err(GsnError::InvalidArgument(format!(
                "token {:?} reports {} decimals",
                token, decimals
            )));
        }
        Ok(decimals.low_u32())
    }

    /// Token balance scaled by the token's decimals, for display
    pub async fn display_balance(&self, token: Option<Address>) -> Result<f64> {
        let balance = self.balance(token).await?;
        let decimals = self.decimals(token).await?;
        balance_to_f64(balance, decimals)
    }

    /// Claim the faucet's initial balance. Fails with
    /// [`GsnError::PriorClaim`] if the account already holds tokens.
    #[tracing::instrument(skip(self))]
    pub async fn claim(&self) -> Result<RelayOutcome> {
        let wallet = self.account()?;
        let balance = self.balance(None).await?;
        if !balance.is_zero() {
            return Err(GsnError::PriorClaim { balance });
        }

        let tx = build_claim_tx(wallet, &self.config, &self.provider).await?;
        self.relay(tx).await
    }

    /// Alias of [`Network::claim`]
    pub async fn register_account(&self) -> Result<RelayOutcome> {
        self.claim().await
    }

    /// Transfer a human-readable `amount`, e.g. `"1.5"`, scaled by the token's
    /// decimals
    pub async fn transfer(
        &self,
        destination: Address,
        amount: &str,
        method: MetaTxMethod,
        token: Option<Address>,
    ) -> Result<RelayOutcome> {
        self.account()?;
        let decimals = self.decimals(token).await?;
        let amount = parse_units(amount, decimals)?;
        self.transfer_exact(destination, amount, method, token).await
    }

    /// Transfer `amount` base units.
    ///
    /// The balance is checked before anything is signed or submitted.
    #[tracing::instrument(skip(self))]
    pub async fn transfer_exact(
        &self,
        destination: Address,
        amount: U256,
        method: MetaTxMethod,
        token: Option<Address>,
    ) -> Result<RelayOutcome> {
        let wallet = self.account()?;
        let token = self.token_or_default(token);

        let balance = self.balance(Some(token)).await?;
        if balance < amount {
            return Err(GsnError::InsufficientBalance { balance, amount });
        }

        let tx = match method {
            MetaTxMethod::Permit => {
                build_permit_tx(wallet, destination, amount, &self.config, token, &self.provider)
                    .await?
            }
            MetaTxMethod::ExecuteMetaTransaction => {
                build_execute_meta_tx(
                    wallet,
                    destination,
                    amount,
                    &self.config,
                    token,
                    &self.provider,
                )
                .await?
            }
        };
        self.relay(tx).await
    }

    /// Relay a prepared transaction as the bound account
    pub async fn relay(&self, tx: GsnTransactionDetails) -> Result<RelayOutcome> {
        let wallet = self.account()?;
        self.relayer
            .relay(wallet, &self.config.gsn, &self.provider, tx)
            .await
    }
}
