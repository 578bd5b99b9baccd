use futures_timer::Delay;
use futures_util::{ready, task::AtomicWaker};
use pin_project::pin_project;

use ethers_core::types::{TransactionReceipt, H256};
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{Context, Poll},
    time::Duration,
};

use crate::{GsnProvider, RelayOutcome, Result};

/// Time between receipt requests
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// How long to wait for a receipt before reporting the transaction as pending
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

// convenience
type PinBoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    waker: AtomicWaker,
}

/// Cooperative cancellation for [`PendingReceipt`].
///
/// Clones share state. Cancelling wakes the most recent poller immediately;
/// any other poller sharing the token stops at its next tick.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<CancelState>,
}

impl CancellationToken {
    /// A fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.waker.wake();
    }

    /// True once [`CancellationToken::cancel`] was called
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    fn register(&self, cx: &Context<'_>) {
        self.inner.waker.register(cx.waker());
    }
}

/// A relayed transaction awaiting its receipt.
///
/// Requests the receipt immediately, then once per polling interval. Resolves
/// to [`RelayOutcome::Confirmed`] when a receipt appears, or to
/// [`RelayOutcome::Pending`] when the timeout elapses or the cancellation token
/// fires. RPC errors end the poll.
#[pin_project(project = PendingProj)]
pub struct PendingReceipt<'a, P> {
    /// Transaction hash
    tx_hash: H256,
    /// Node
    provider: &'a P,
    /// poll state
    state: ReceiptState<'a>,
    /// delay between requests
    interval: Duration,
    /// fires when the poll gives up
    deadline: Pin<Box<Delay>>,
    /// external stop signal
    cancel: Option<CancellationToken>,
}

enum ReceiptState<'a> {
    /// Waiting out the polling interval
    Delaying(Pin<Box<Delay>>),
    /// Receipt request in flight
    Requesting(PinBoxFut<'a, Result<Option<TransactionReceipt>>>),
}

impl<'a, P> std::fmt::Debug for PendingReceipt<'a, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReceipt")
            .field("tx_hash", &self.tx_hash)
            .field("interval", &self.interval)
            .finish()
    }
}

impl<'a, P> PendingReceipt<'a, P>
where
    P: GsnProvider,
{
    /// Start polling for `tx_hash`
    pub fn new(tx_hash: H256, provider: &'a P) -> Self {
        Self {
            tx_hash,
            provider,
            state: ReceiptState::Requesting(provider.transaction_receipt(tx_hash)),
            interval: DEFAULT_POLL_INTERVAL,
            deadline: Box::pin(Delay::new(DEFAULT_RECEIPT_TIMEOUT)),
            cancel: None,
        }
    }

    /// Sets the polling delay (the time between poll attempts)
    #[must_use]
    pub fn polling_interval<T: Into<Duration>>(mut self, duration: T) -> Self {
        self.interval = duration.into();

        if matches!(self.state, ReceiptState::Delaying(_)) {
            self.state = ReceiptState::Delaying(Box::pin(Delay::new(self.interval)))
        }

        self
    }

    /// Sets how long to wait for a receipt, counted from now
    #[must_use]
    pub fn timeout<T: Into<Duration>>(mut self, duration: T) -> Self {
        self.deadline = Box::pin(Delay::new(duration.into()));
        self
    }

    /// Stop polling when `token` is cancelled
    #[must_use]
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

macro_rules! make_request {
    ($cx:ident, $this:ident) => {
        *$this.state = ReceiptState::Requesting($this.provider.transaction_receipt(*$this.tx_hash));
        $cx.waker().wake_by_ref();
        return Poll::Pending
    };
}

macro_rules! delay_it {
    ($cx:ident, $this:ident) => {
        *$this.state = ReceiptState::Delaying(Box::pin(Delay::new(*$this.interval)));
        $cx.waker().wake_by_ref();
        return Poll::Pending
    };
}

impl<'a, P> Future for PendingReceipt<'a, P>
where
    P: GsnProvider,
{
    type Output = Result<RelayOutcome>;

    #[tracing::instrument(skip(self, cx), fields(tx_hash = ?self.tx_hash))]
    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let this = self.project();

        if let Some(token) = this.cancel {
            token.register(cx);
            if token.is_cancelled() {
                tracing::info!("Receipt poll cancelled");
                return Poll::Ready(Ok(RelayOutcome::Pending {
                    tx_hash: *this.tx_hash,
                }));
            }
        }

        if this.deadline.as_mut().poll(cx).is_ready() {
            tracing::warn!("No receipt before timeout");
            return Poll::Ready(Ok(RelayOutcome::Pending {
                tx_hash: *this.tx_hash,
            }));
        }

        let receipt_fut = match this.state {
            // early returns only :)
            ReceiptState::Delaying(delay) => {
                ready!(delay.as_mut().poll(cx));
                make_request!(cx, this);
            }
            // just unpack the future
            ReceiptState::Requesting(fut) => fut,
        };

        match ready!(receipt_fut.as_mut().poll(cx)) {
            Err(e) => Poll::Ready(Err(e)),
            Ok(Some(receipt)) => {
                tracing::info!(block = ?receipt.block_number, "Receipt received");
                Poll::Ready(Ok(RelayOutcome::Confirmed {
                    tx_hash: *this.tx_hash,
                    receipt: Box::new(receipt),
                }))
            }
            Ok(None) => {
                delay_it!(cx, this);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{provider::mock::MockProvider, GsnError};
    use ethers_core::types::{Address, Bytes, U256};

    fn receipt(hash: H256) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: hash,
            block_number: Some(42u64.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn it_resolves_on_receipt() {
        let hash = H256::repeat_byte(0xab);
        let provider = MockProvider::new();
        provider.push_receipt(None);
        provider.push_receipt(None);
        provider.push_receipt(Some(receipt(hash)));

        let outcome = PendingReceipt::new(hash, &provider)
            .polling_interval(Duration::from_millis(5))
            .await
            .unwrap();

        assert!(outcome.is_confirmed());
        assert_eq!(outcome.tx_hash(), hash);
        assert_eq!(provider.receipt_polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn it_gives_up_at_the_deadline() {
        let hash = H256::repeat_byte(0xab);
        let provider = MockProvider::new();

        let outcome = PendingReceipt::new(hash, &provider)
            .polling_interval(Duration::from_millis(5))
            .timeout(Duration::from_millis(60))
            .await
            .unwrap();

        assert_eq!(outcome, RelayOutcome::Pending { tx_hash: hash });
        assert!(provider.receipt_polls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn it_stops_when_cancelled() {
        let hash = H256::repeat_byte(0xab);
        let provider = MockProvider::new();
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            Delay::new(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let outcome = PendingReceipt::new(hash, &provider)
            .polling_interval(Duration::from_secs(30))
            .cancel_on(token.clone())
            .await
            .unwrap();

        assert!(token.is_cancelled());
        assert_eq!(outcome, RelayOutcome::Pending { tx_hash: hash });
        assert_eq!(provider.receipt_polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rpc_errors_end_the_poll() {
        #[derive(Debug)]
        struct Broken;

        #[async_trait::async_trait]
        impl GsnProvider for Broken {
            async fn call(&self, _: Address, _: Bytes) -> Result<Bytes> {
                unreachable!()
            }
            async fn estimate_gas(
                &self,
                _: Address,
                _: Address,
                _: Bytes,
            ) -> Result<U256> {
                unreachable!()
            }
            async fn latest_block(&self) -> Result<crate::BlockInfo> {
                unreachable!()
            }
            async fn transaction_receipt(&self, _: H256) -> Result<Option<TransactionReceipt>> {
                Err(GsnError::rpc("connection reset"))
            }
            async fn transaction_count(&self, _: Address) -> Result<U256> {
                unreachable!()
            }
        }

        let err = PendingReceipt::new(H256::zero(), &Broken).await.unwrap_err();
        assert!(matches!(err, GsnError::Rpc(_)));
    }
}
