use std::time::{SystemTime, UNIX_EPOCH};

use ethers_core::types::{Address, Bytes};

use crate::{
    abi,
    calldata::{estimate_calldata_cost_for_request, estimate_gas_without_calldata},
    eip712::{ForwardRequest, RelayData, RelayRequest},
    DecimalU256, GsnConfig, GsnError, GsnProvider, GsnTransactionDetails, Result,
};

/// Client id stamped on every relay request
pub const DEFAULT_CLIENT_ID: u64 = 1;

/// Builder for a [`RelayRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelayRequestBuilder {
    /// User address. Required
    pub from: Option<Address>,
    /// Target contract. Required
    pub to: Option<Address>,
    /// Native value. Defaults to 0
    pub value: Option<DecimalU256>,
    /// Execution gas limit. Required
    pub gas: Option<DecimalU256>,
    /// Forwarder nonce of `from`. Required
    pub nonce: Option<DecimalU256>,
    /// Calldata for `to`. Defaults to empty bytes: `0x`
    pub data: Option<Bytes>,
    /// Expiry, unix seconds. Required
    pub valid_until_time: Option<DecimalU256>,
    /// EIP-1559 max fee. Required
    pub max_fee_per_gas: Option<DecimalU256>,
    /// EIP-1559 priority fee. Required
    pub max_priority_fee_per_gas: Option<DecimalU256>,
    /// Calldata gas billed by the hub. Defaults to 0 until estimated
    pub transaction_calldata_gas_used: Option<DecimalU256>,
    /// Relay worker. Required
    pub relay_worker: Option<Address>,
    /// Paymaster. Required
    pub paymaster: Option<Address>,
    /// Forwarder. Required
    pub forwarder: Option<Address>,
    /// Paymaster data. Defaults to empty bytes: `0x`
    pub paymaster_data: Option<Bytes>,
    /// Client id. Defaults to 1
    pub client_id: Option<DecimalU256>,
}

impl From<&GsnTransactionDetails> for RelayRequestBuilder {
    fn from(tx: &GsnTransactionDetails) -> Self {
        let mut builder = RelayRequestBuilder::default()
            .sender(tx.from)
            .to(tx.to)
            .data(tx.data.clone())
            .value(tx.value)
            .gas(tx.gas)
            .max_fee_per_gas(tx.max_fee_per_gas)
            .max_priority_fee_per_gas(tx.max_priority_fee_per_gas);

        if let Some(paymaster_data) = &tx.paymaster_data {
            builder = builder.paymaster_data(paymaster_data.clone());
        }

        builder
    }
}

impl RelayRequestBuilder {
    /// Set the sender, `from`. Required
    pub fn sender(mut self, val: Address) -> Self {
        self.from = Some(val);
        self
    }

    /// Set `to`. Required
    pub fn to(mut self, val: Address) -> Self {
        self.to = Some(val);
        self
    }

    /// Set `value`. Defaults to 0
    pub fn value(mut self, val: impl Into<DecimalU256>) -> Self {
        self.value = Some(val.into());
        self
    }

    /// Set `gas`. Required
    pub fn gas(mut self, val: impl Into<DecimalU256>) -> Self {
        self.gas = Some(val.into());
        self
    }

    /// Set `nonce`. Required
    pub fn nonce(mut self, val: impl Into<DecimalU256>) -> Self {
        self.nonce = Some(val.into());
        self
    }

    /// Set `data`. Defaults to empty bytes: `0x`
    pub fn data(mut self, val: Bytes) -> Self {
        self.data = Some(val);
        self
    }

    /// Set `valid_until_time`. Required
    pub fn valid_until_time(mut self, val: impl Into<DecimalU256>) -> Self {
        self.valid_until_time = Some(val.into());
        self
    }

    /// Set `max_fee_per_gas`. Required
    pub fn max_fee_per_gas(mut self, val: impl Into<DecimalU256>) -> Self {
        self.max_fee_per_gas = Some(val.into());
        self
    }

    /// Set `max_priority_fee_per_gas`. Required
    pub fn max_priority_fee_per_gas(mut self, val: impl Into<DecimalU256>) -> Self {
        self.max_priority_fee_per_gas = Some(val.into());
        self
    }

    /// Set `transaction_calldata_gas_used`. Defaults to 0
    pub fn transaction_calldata_gas_used(mut self, val: impl Into<DecimalU256>) -> Self {
        self.transaction_calldata_gas_used = Some(val.into());
        self
    }

    /// Set `relay_worker`. Required
    pub fn relay_worker(mut self, val: Address) -> Self {
        self.relay_worker = Some(val);
        self
    }

    /// Set `paymaster`. Required
    pub fn paymaster(mut self, val: Address) -> Self {
        self.paymaster = Some(val);
        self
    }

    /// Set `forwarder`. Required
    pub fn forwarder(mut self, val: Address) -> Self {
        self.forwarder = Some(val);
        self
    }

    /// Set `paymaster_data`. Defaults to empty bytes: `0x`
    pub fn paymaster_data(mut self, val: Bytes) -> Self {
        self.paymaster_data = Some(val);
        self
    }

    /// Set `client_id`. Defaults to 1
    pub fn client_id(mut self, val: impl Into<DecimalU256>) -> Self {
        self.client_id = Some(val.into());
        self
    }

    /// Take the relay worker, paymaster and forwarder from a GSN config
    pub fn gsn_config(self, gsn: &GsnConfig) -> Self {
        self.relay_worker(gsn.relay_worker_address)
            .paymaster(gsn.paymaster_address)
            .forwarder(gsn.forwarder_address)
    }

    /// Build this request
    pub fn build(self) -> eyre::Result<RelayRequest> {
        let mut missing = vec![];
        if self.from.is_none() { missing.push("from"); }
        if self.to.is_none() { missing.push("to"); }
        if self.gas.is_none() { missing.push("gas"); }
        if self.nonce.is_none() { missing.push("nonce"); }
        if self.valid_until_time.is_none() { missing.push("valid_until_time"); }
        if self.max_fee_per_gas.is_none() { missing.push("max_fee_per_gas"); }
        if self.max_priority_fee_per_gas.is_none() { missing.push("max_priority_fee_per_gas"); }
        if self.relay_worker.is_none() { missing.push("relay_worker"); }
        if self.paymaster.is_none() { missing.push("paymaster"); }
        if self.forwarder.is_none() { missing.push("forwarder"); }

        eyre::ensure!(
            missing.is_empty(),
            "Missing required values in build: {}",
            missing.join(", ")
        );

        let request = ForwardRequest {
            from: self.from.unwrap_or_default(),
            to: self.to.unwrap_or_default(),
            value: self.value.unwrap_or_default(),
            gas: self.gas.unwrap_or_default(),
            nonce: self.nonce.unwrap_or_default(),
            data: self.data.unwrap_or_default(),
            valid_until_time: self.valid_until_time.unwrap_or_default(),
        };
        let relay_data = RelayData {
            max_fee_per_gas: self.max_fee_per_gas.unwrap_or_default(),
            max_priority_fee_per_gas: self.max_priority_fee_per_gas.unwrap_or_default(),
            transaction_calldata_gas_used: self.transaction_calldata_gas_used.unwrap_or_default(),
            relay_worker: self.relay_worker.unwrap_or_default(),
            paymaster: self.paymaster.unwrap_or_default(),
            forwarder: self.forwarder.unwrap_or_default(),
            paymaster_data: self.paymaster_data.unwrap_or_default(),
            client_id: self.client_id.unwrap_or_else(|| DEFAULT_CLIENT_ID.into()),
        };

        Ok(RelayRequest::new(request, relay_data))
    }
}

/// Forwarder nonce of `sender`, via `Forwarder.getNonce(address)`
pub async fn get_sender_nonce<P: GsnProvider>(
    provider: &P,
    forwarder: Address,
    sender: Address,
) -> Result<DecimalU256> {
    let ret = provider.call(forwarder, abi::get_nonce(sender)).await?;
    Ok(abi::decode_uint(&ret)?.into())
}

/// Assemble the relay request for `tx` at time `now` (unix seconds).
///
/// The gas field excludes the calldata cost of `tx.data`, and
/// `transactionCalldataGasUsed` carries the worst-case `relayCall` estimate.
pub fn relay_request_for(
    tx: &GsnTransactionDetails,
    gsn: &GsnConfig,
    nonce: DecimalU256,
    now: u64,
) -> Result<RelayRequest> {
    let paymaster_data_len = tx.paymaster_data.as_ref().map_or(0, |d| d.len()) as u64;
    if paymaster_data_len > gsn.max_paymaster_data_length {
        return Err(GsnError::InvalidArgument(format!(
            "paymaster data is {} bytes, limit is {}",
            paymaster_data_len, gsn.max_paymaster_data_length
        )));
    }

    let gas = estimate_gas_without_calldata(tx, gsn.gtx_data_non_zero, gsn.gtx_data_zero);
    let mut request = RelayRequestBuilder::from(tx)
        .gas(gas)
        .nonce(nonce)
        .valid_until_time(now.saturating_add(gsn.request_valid_seconds))
        .gsn_config(gsn)
        .build()
        .map_err(|e| GsnError::InvalidArgument(e.to_string()))?;

    let calldata_gas = estimate_calldata_cost_for_request(&request, gsn)?;
    request.relay_data.transaction_calldata_gas_used = calldata_gas.into();
    Ok(request)
}

/// Read the sender's forwarder nonce and assemble the relay request for `tx`
#[tracing::instrument(skip(tx, gsn, provider), fields(from = ?tx.from, to = ?tx.to))]
pub async fn build_relay_request<P: GsnProvider>(
    tx: &GsnTransactionDetails,
    gsn: &GsnConfig,
    provider: &P,
) -> Result<RelayRequest> {
    let nonce = get_sender_nonce(provider, gsn.forwarder_address, tx.from).await?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    tracing::debug!(%nonce, now, "Building relay request");
    relay_request_for(tx, gsn, nonce, now)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{config::test::config, provider::mock::MockProvider};
    use ethers_core::{abi::Token, types::U256};

    fn details() -> GsnTransactionDetails {
        GsnTransactionDetails {
            from: Address::repeat_byte(0x11),
            data: vec![0x4e, 0x71, 0xd9, 0x2d].into(),
            to: Address::repeat_byte(0x22),
            max_fee_per_gas: 3_000_000_000u64.into(),
            max_priority_fee_per_gas: 1_500_000_000u64.into(),
            value: U256::zero(),
            gas: 90_000u64.into(),
            paymaster_data: None,
        }
    }

    #[test]
    fn it_reports_missing_fields() {
        let err = RelayRequestBuilder::default()
            .sender(Address::repeat_byte(0x11))
            .build()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("to"));
        assert!(msg.contains("nonce"));
        assert!(!msg.contains("from,"));
    }

    #[test]
    fn it_converts_transaction_details() {
        let mut tx = details();
        tx.paymaster_data = Some(vec![0xaa, 0xbb].into());
        let builder = RelayRequestBuilder::from(&tx);

        assert_eq!(builder.from, Some(tx.from));
        assert_eq!(builder.to, Some(tx.to));
        assert_eq!(builder.data, Some(tx.data.clone()));
        assert_eq!(builder.gas, Some(tx.gas.into()));
        assert_eq!(builder.max_fee_per_gas, Some(tx.max_fee_per_gas.into()));
        assert_eq!(builder.paymaster_data, tx.paymaster_data);
        assert!(builder.nonce.is_none());
    }

    #[test]
    fn it_fills_relay_fields() {
        let gsn = config().gsn;
        let req = relay_request_for(&details(), &gsn, 4u64.into(), 1_000).unwrap();

        // 4 nonzero selector bytes at 16 gas each
        assert_eq!(*req.request.gas, U256::from(90_000 - 64));
        assert_eq!(*req.request.nonce, U256::from(4));
        assert_eq!(*req.request.valid_until_time, U256::from(1_000 + 172_800));
        assert_eq!(*req.relay_data.client_id, U256::one());
        assert_eq!(req.relay_data.forwarder, gsn.forwarder_address);
        assert_eq!(req.relay_data.paymaster, gsn.paymaster_address);
        assert_eq!(req.relay_data.relay_worker, gsn.relay_worker_address);
        assert_eq!(
            *req.relay_data.transaction_calldata_gas_used,
            U256::from(estimate_calldata_cost_for_request(&req, &gsn).unwrap())
        );
    }

    #[test]
    fn it_enforces_paymaster_data_limit() {
        let gsn = config().gsn;
        let mut tx = details();
        tx.paymaster_data = Some(vec![0xff; 300].into());
        assert!(relay_request_for(&tx, &gsn, 0u64.into(), 0).is_ok());

        tx.paymaster_data = Some(vec![0xff; 301].into());
        let err = relay_request_for(&tx, &gsn, 0u64.into(), 0).unwrap_err();
        assert!(matches!(err, GsnError::InvalidArgument(m) if m.contains("301")));
    }

    #[tokio::test]
    async fn it_reads_the_forwarder_nonce() {
        let gsn = config().gsn;
        let provider = MockProvider::new();
        provider.on_call(
            gsn.forwarder_address,
            &abi::get_nonce(Address::zero()),
            vec![Token::Uint(9u64.into())],
        );

        let req = build_relay_request(&details(), &gsn, &provider).await.unwrap();
        assert_eq!(*req.request.nonce, U256::from(9));
        assert!(*req.request.valid_until_time > U256::from(gsn.request_valid_seconds));
    }
}
