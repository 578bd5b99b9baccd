use async_trait::async_trait;
use ethers_core::types::{
    transaction::eip2718::TypedTransaction, Address, BlockNumber, Bytes, TransactionReceipt,
    TransactionRequest, H256, U256,
};
use ethers_providers::{JsonRpcClient, Middleware, Provider};

use crate::{GsnError, Result};

/// The fields of the latest block the client reads
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BlockInfo {
    /// Unix timestamp
    pub timestamp: U256,
    /// EIP-1559 base fee. `None` on chains without a fee market.
    pub base_fee_per_gas: Option<U256>,
}

/// Node calls used by the transaction flows and the receipt poller.
///
/// Implemented for any `ethers_providers::Provider`. Failures are reported as
/// [`GsnError::Rpc`] and are not retried here.
#[async_trait]
pub trait GsnProvider: Send + Sync + std::fmt::Debug {
    /// `eth_call` against the latest block
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;

    /// `eth_estimateGas`
    async fn estimate_gas(&self, from: Address, to: Address, data: Bytes) -> Result<U256>;

    /// `eth_getBlockByNumber("latest")`
    async fn latest_block(&self) -> Result<BlockInfo>;

    /// `eth_getTransactionReceipt`. `None` until the transaction is mined.
    async fn transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>>;

    /// `eth_getTransactionCount` at the latest block
    async fn transaction_count(&self, address: Address) -> Result<U256>;
}

fn call_tx(from: Option<Address>, to: Address, data: Bytes) -> TypedTransaction {
    let mut tx = TransactionRequest::new().to(to).data(data);
    if let Some(from) = from {
        tx = tx.from(from);
    }
    tx.into()
}

#[async_trait]
impl<P> GsnProvider for Provider<P>
where
    P: JsonRpcClient + 'static,
{
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        Middleware::call(self, &call_tx(None, to, data), None)
            .await
            .map_err(GsnError::rpc)
    }

    async fn estimate_gas(&self, from: Address, to: Address, data: Bytes) -> Result<U256> {
        Middleware::estimate_gas(self, &call_tx(Some(from), to, data), None)
            .await
            .map_err(GsnError::rpc)
    }

    async fn latest_block(&self) -> Result<BlockInfo> {
        let block = self
            .get_block(BlockNumber::Latest)
            .await
            .map_err(GsnError::rpc)?
            .ok_or_else(|| GsnError::rpc("latest block not available"))?;
        Ok(BlockInfo {
            timestamp: block.timestamp,
            base_fee_per_gas: block.base_fee_per_gas,
        })
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>> {
        self.get_transaction_receipt(hash)
            .await
            .map_err(GsnError::rpc)
    }

    async fn transaction_count(&self, address: Address) -> Result<U256> {
        self.get_transaction_count(address, None)
            .await
            .map_err(GsnError::rpc)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::{
        collections::{HashMap, VecDeque},
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    use super::*;

    /// Scripted node. `eth_call` answers are keyed by contract and selector.
    #[derive(Debug, Default)]
    pub(crate) struct MockProvider {
        pub(crate) calls: Mutex<HashMap<(Address, [u8; 4]), std::result::Result<Bytes, String>>>,
        pub(crate) gas: U256,
        pub(crate) block: BlockInfo,
        pub(crate) receipts: Mutex<VecDeque<Option<TransactionReceipt>>>,
        pub(crate) tx_count: U256,
        pub(crate) receipt_polls: AtomicUsize,
        pub(crate) sent: Mutex<Vec<(Address, Bytes)>>,
    }

    impl MockProvider {
        pub(crate) fn new() -> Self {
            Self {
                gas: 90_000u64.into(),
                block: BlockInfo {
                    timestamp: 1_700_000_000u64.into(),
                    base_fee_per_gas: Some(1_000_000_000u64.into()),
                },
                tx_count: 12u64.into(),
                ..Default::default()
            }
        }

        pub(crate) fn on_call(&self, to: Address, selector: &[u8], ret: Vec<ethers_core::abi::Token>) {
            let mut key = [0u8; 4];
            key.copy_from_slice(&selector[..4]);
            self.calls
                .lock()
                .unwrap()
                .insert((to, key), Ok(ethers_core::abi::encode(&ret).into()));
        }

        pub(crate) fn fail_call(&self, to: Address, selector: &[u8]) {
            let mut key = [0u8; 4];
            key.copy_from_slice(&selector[..4]);
            self.calls
                .lock()
                .unwrap()
                .insert((to, key), Err("execution reverted".to_owned()));
        }

        pub(crate) fn push_receipt(&self, receipt: Option<TransactionReceipt>) {
            self.receipts.lock().unwrap().push_back(receipt);
        }

        pub(crate) fn selectors_called(&self, to: Address) -> Vec<[u8; 4]> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(addr, _)| *addr == to)
                .map(|(_, data)| {
                    let mut key = [0u8; 4];
                    key.copy_from_slice(&data[..4]);
                    key
                })
                .collect()
        }
    }

    #[async_trait]
    impl GsnProvider for MockProvider {
        async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
            self.sent.lock().unwrap().push((to, data.clone()));
            let mut key = [0u8; 4];
            key.copy_from_slice(&data[..4]);
            match self.calls.lock().unwrap().get(&(to, key)) {
                Some(Ok(ret)) => Ok(ret.clone()),
                Some(Err(e)) => Err(GsnError::rpc(e.clone())),
                None => Err(GsnError::rpc(format!(
                    "unexpected call to {:?}: 0x{}",
                    to,
                    hex::encode(key)
                ))),
            }
        }

        async fn estimate_gas(&self, _from: Address, _to: Address, _data: Bytes) -> Result<U256> {
            Ok(self.gas)
        }

        async fn latest_block(&self) -> Result<BlockInfo> {
            Ok(self.block)
        }

        async fn transaction_receipt(&self, _hash: H256) -> Result<Option<TransactionReceipt>> {
            self.receipt_polls.fetch_add(1, Ordering::SeqCst);
            Ok(self.receipts.lock().unwrap().pop_front().flatten())
        }

        async fn transaction_count(&self, _address: Address) -> Result<U256> {
            Ok(self.tx_count)
        }
    }
}
