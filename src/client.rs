use async_trait::async_trait;
use ethers_core::{
    types::{Bytes, H256, U256},
    utils::keccak256,
};
use ethers_signers::{LocalWallet, Signer};
use reqwest::{IntoUrl, Url};
use std::{str::FromStr, time::Duration};

use crate::{
    builders::build_relay_request,
    json_get, json_post,
    rpc::{RelayHttpRequest, RelayHttpResponse, RelayMetadata, ServerConfigUpdate},
    task::{CancellationToken, PendingReceipt, DEFAULT_POLL_INTERVAL, DEFAULT_RECEIPT_TIMEOUT},
    GsnConfig, GsnError, GsnProvider, GsnTransactionDetails, RelayOutcome, Result,
};

/// Chain on which the relay's max fee suggestion is replaced by the padded
/// priority fee
const MUMBAI_CHAIN_ID: u64 = 80001;

/// Submits GSN transactions and waits for them to land.
///
/// Implemented by [`RelayClient`]. The network facade is generic over it so
/// that other transports can be plugged in.
#[async_trait]
pub trait Relayer: Send + Sync + std::fmt::Debug {
    /// Relay `tx` signed by `wallet`
    async fn relay<P: GsnProvider>(
        &self,
        wallet: &LocalWallet,
        gsn: &GsnConfig,
        provider: &P,
        tx: GsnTransactionDetails,
    ) -> Result<RelayOutcome>;
}

/// A GSN relay server client
#[derive(Debug, Clone)]
pub struct RelayClient {
    url: Url,
    client: reqwest::Client,
    interval: Duration,
    timeout: Duration,
    cancel: Option<CancellationToken>,
}

impl RelayClient {
    /// Instantiate a new client with a specific URL
    ///
    /// # Errors
    ///
    /// If the url param cannot be parsed as a URL
    pub fn new<S>(url: S) -> Result<Self, reqwest::Error>
    where
        S: IntoUrl,
    {
        Ok(Self::with_url(url.into_url()?, Default::default()))
    }

    /// Instantiate a new client with a specific URL and a reqwest Client
    ///
    /// # Errors
    ///
    /// If the url param cannot be parsed as a URL
    pub fn new_with_client<S>(
        url: S,
        client: reqwest::Client,
    ) -> Result<Self, <reqwest::Url as FromStr>::Err>
    where
        S: AsRef<str>,
    {
        Ok(Self::with_url(url.as_ref().parse()?, client))
    }

    /// Client for the relay named in a GSN config
    pub fn from_config(gsn: &GsnConfig) -> Self {
        Self::with_url(gsn.relay_url.clone(), Default::default())
    }

    fn with_url(url: Url, client: reqwest::Client) -> Self {
        Self {
            url,
            client,
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_RECEIPT_TIMEOUT,
            cancel: None,
        }
    }

    /// Sets the receipt polling interval. Defaults to 2 seconds
    #[must_use]
    pub fn polling_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets how long to wait for a receipt. Defaults to 120 seconds
    #[must_use]
    pub fn receipt_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Stop receipt polls when `token` is cancelled
    #[must_use]
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The relay server base URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|_| GsnError::InvalidArgument(format!("relay url {} cannot be a base", self.url)))?
            .pop_if_empty()
            .push(path);
        Ok(url)
    }

    /// Fetch the relay's current worker and fee limits
    pub async fn server_config(&self) -> Result<ServerConfigUpdate> {
        json_get!(self.client, self.endpoint("getaddr")?, ServerConfigUpdate)
    }

    /// POST a signed request. Returns the hash of the transaction the worker
    /// signed.
    #[tracing::instrument(skip(self, body, api_key), fields(request_id = body.metadata.relay_request_id.as_str()))]
    pub async fn send_relay_request(
        &self,
        body: &RelayHttpRequest,
        api_key: Option<&str>,
    ) -> Result<H256> {
        let resp: RelayHttpResponse =
            json_post!(self.client, self.endpoint("relay")?, body, bearer = api_key)?;
        handle_relay_response(resp)
    }

    /// Sign `tx` as a relay request, submit it and poll for its receipt.
    ///
    /// The relay worker and the fees are refreshed from the server first.
    #[tracing::instrument(skip_all, fields(from = ?tx.from, to = ?tx.to))]
    pub async fn relay_transaction<P: GsnProvider>(
        &self,
        wallet: &LocalWallet,
        gsn: &GsnConfig,
        provider: &P,
        tx: GsnTransactionDetails,
    ) -> Result<RelayOutcome> {
        let mut gsn = gsn.clone();
        let mut tx = tx;
        let update = self.server_config().await?;
        apply_server_config(&mut gsn, &mut tx, &update);

        let request = build_relay_request(&tx, &gsn, provider).await?;
        let signature = request.sign(wallet, &gsn)?;
        let relay_request_id = request.request_id();

        let relay_last_known_nonce = provider
            .transaction_count(gsn.relay_worker_address)
            .await?
            .low_u64();
        let metadata = RelayMetadata {
            max_acceptance_budget: gsn.max_acceptance_budget.into(),
            relay_hub_address: gsn.relay_hub_address,
            signature: Bytes::from(signature.to_vec()),
            approval_data: Bytes::default(),
            relay_max_nonce: relay_max_nonce(relay_last_known_nonce, gsn.max_relay_nonce_gap),
            relay_last_known_nonce,
            domain_separator_name: gsn.domain_separator_name.clone(),
            relay_request_id,
        };
        let body = RelayHttpRequest {
            relay_request: request,
            metadata,
        };

        let tx_hash = self
            .send_relay_request(&body, gsn.relayer_api_key.as_deref())
            .await?;
        tracing::info!(
            tx_hash = ?tx_hash,
            request_id = body.metadata.relay_request_id.as_str(),
            signer = ?wallet.address(),
            "Relay accepted transaction"
        );

        let mut pending = PendingReceipt::new(tx_hash, provider)
            .polling_interval(self.interval)
            .timeout(self.timeout);
        if let Some(token) = &self.cancel {
            pending = pending.cancel_on(token.clone());
        }
        pending.await
    }
}

#[async_trait]
impl Relayer for RelayClient {
    async fn relay<P: GsnProvider>(
        &self,
        wallet: &LocalWallet,
        gsn: &GsnConfig,
        provider: &P,
        tx: GsnTransactionDetails,
    ) -> Result<RelayOutcome> {
        self.relay_transaction(wallet, gsn, provider, tx).await
    }
}

/// Adopt the relay's worker and priority fee.
///
/// The priority fee becomes the server minimum padded by 40%, rounded. The max
/// fee keeps the base fee heuristic, except on chain 80001 where the padded
/// priority fee is used for both. The max fee never drops below the priority
/// fee.
pub fn apply_server_config(
    gsn: &mut GsnConfig,
    tx: &mut GsnTransactionDetails,
    update: &ServerConfigUpdate,
) {
    gsn.relay_worker_address = update.relay_worker_address;

    let min_priority = *update.min_max_priority_fee_per_gas;
    let padded = min_priority
        .saturating_mul(U256::from(14u8))
        .saturating_add(U256::from(5u8))
        / U256::from(10u8);
    tx.max_priority_fee_per_gas = padded;
    if update.chain_id == MUMBAI_CHAIN_ID {
        tx.max_fee_per_gas = padded;
    }
    tx.max_fee_per_gas = tx.max_fee_per_gas.max(padded);
    tracing::debug!(
        worker = ?update.relay_worker_address,
        relay_max_fee = %update.max_max_fee_per_gas,
        max_fee = %tx.max_fee_per_gas,
        priority_fee = %tx.max_priority_fee_per_gas,
        "Applied relay server config"
    );
}

/// Highest worker nonce the relay may use for this request
fn relay_max_nonce(last_known_nonce: u64, max_relay_nonce_gap: u64) -> u64 {
    last_known_nonce.saturating_add(max_relay_nonce_gap)
}

/// Map a relay response to the hash of the signed transaction.
///
/// `{"error": ..}` becomes [`GsnError::RelayRejected`]. The hash is the
/// keccak256 of the raw signed transaction bytes.
pub fn handle_relay_response(resp: RelayHttpResponse) -> Result<H256> {
    match resp {
        RelayHttpResponse::Signed { signed_tx } => Ok(H256::from(keccak256(&signed_tx))),
        rejected => Err(GsnError::RelayRejected(
            rejected.error_message().unwrap_or_default(),
        )),
    }
}
