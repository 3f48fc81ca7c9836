//! Per-account submission queue
//!
//! Every `submit` call enqueues a unit at the tail of an unbounded channel before
//! it returns its future, so units run in call order. A single worker task takes
//! units one at a time through nonce acquisition, signing and broadcast. As soon
//! as the broadcast attempt is over (accepted or not) the worker hands the receipt
//! wait to its own task and moves on: the pending nonce advances on acceptance,
//! not on confirmation.
//!
//! A failing unit reports to its own caller only. The worker keeps draining.

use super::sender::TransactionSender;
use super::types::{SentTransaction, TransactionRequest};
use crate::error::{WalletError, WalletResult};

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

struct QueuedSubmission {
    id: Uuid,
    request: TransactionRequest,
    enqueued: Instant,
    reply: oneshot::Sender<WalletResult<SentTransaction>>,
}

/// Serializes transaction-producing work for one account
pub struct SubmissionQueue {
    tail: mpsc::UnboundedSender<QueuedSubmission>,
    worker: JoinHandle<()>,
}

impl SubmissionQueue {
    /// Spawn the queue worker on the current Tokio runtime
    pub fn spawn(sender: Arc<TransactionSender>) -> Self {
        let (tail, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(sender, rx));
        Self { tail, worker }
    }

    /// Enqueue a submission.
    ///
    /// The unit joins the queue when this is called, not when the returned
    /// future is first polled.
    pub fn submit(
        &self,
        request: TransactionRequest,
    ) -> impl Future<Output = WalletResult<SentTransaction>> + Send + 'static {
        let id = Uuid::new_v4();
        let (reply, rx) = oneshot::channel();

        let queued = self
            .tail
            .send(QueuedSubmission {
                id,
                request,
                enqueued: Instant::now(),
                reply,
            })
            .map_err(|_| WalletError::QueueClosed);

        if queued.is_ok() {
            debug!("[{}] Submission queued", id);
        }

        async move {
            queued?;
            rx.await.map_err(|_| WalletError::QueueClosed)?
        }
    }

    /// Whether the worker task is still accepting submissions
    pub fn is_running(&self) -> bool {
        !self.worker.is_finished() && !self.tail.is_closed()
    }
}

async fn run_worker(
    sender: Arc<TransactionSender>,
    mut rx: mpsc::UnboundedReceiver<QueuedSubmission>,
) {
    let chain_id = sender.context().chain_id;
    info!("Submission queue started for {:?}", sender.context().address);

    while let Some(unit) = rx.recv().await {
        let QueuedSubmission {
            id,
            request,
            enqueued,
            reply,
        } = unit;

        match sender.broadcast(id, &request).await {
            Ok(broadcast) => {
                crate::metrics::record_tx_submitted(chain_id);

                // The next unit may read the pending nonce from here on
                let sender = sender.clone();
                tokio::spawn(async move {
                    let result = sender.confirm(id, broadcast, enqueued).await;
                    if let Err(e) = &result {
                        error!("[{}] Confirmation failed: {}", id, e);
                        crate::metrics::record_tx_failed(chain_id, e.stage());
                    }
                    let _ = reply.send(result);
                });
            }
            Err(e) => {
                error!("[{}] Submission failed at {} stage: {}", id, e.stage(), e);
                crate::metrics::record_tx_failed(chain_id, e.stage());
                let _ = reply.send(Err(e));
            }
        }
    }

    info!("Submission queue stopped for {:?}", sender.context().address);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::NetworkContext;
    use crate::config::GasConfig;
    use crate::signer::RemoteSigningClient;
    use crate::testing::{FakeChain, FakeSigner, SignMode};
    use crate::tx::gas::GasEstimator;
    use crate::tx::receipt::ReceiptWaiter;
    use crate::tx::ReceiptStatus;
    use ethers::types::{Address, Bytes, U256};
    use futures::future::join_all;
    use std::time::Duration;

    const CHAIN_ID: u64 = 84532;

    fn queue(chain: Arc<FakeChain>, signer: Arc<FakeSigner>) -> SubmissionQueue {
        let sender = TransactionSender::new(
            NetworkContext::new(CHAIN_ID, Address::repeat_byte(0x42)),
            chain.clone(),
            GasEstimator::new(&GasConfig::default()),
            RemoteSigningClient::new(signer),
            ReceiptWaiter::new(chain, Duration::from_millis(2)),
        );
        SubmissionQueue::spawn(Arc::new(sender))
    }

    fn request(value: u64) -> TransactionRequest {
        TransactionRequest::new(Address::repeat_byte(0xaa), U256::from(value), Bytes::default())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_get_gap_free_nonces() {
        let chain = Arc::new(FakeChain::new(CHAIN_ID, 7));
        let signer = Arc::new(FakeSigner::new(SignMode::Pending(Duration::from_millis(3))));
        let queue = queue(chain.clone(), signer);

        let pending: Vec<_> = (0..8).map(|i| queue.submit(request(i))).collect();
        let results = join_all(pending).await;

        let nonces: Vec<u64> = results.into_iter().map(|r| r.unwrap().nonce).collect();
        assert_eq!(nonces, (7..15).collect::<Vec<_>>());
        assert_eq!(chain.broadcast_nonces(), (7..15).collect::<Vec<_>>());
        assert_eq!(chain.pending_nonce(), 15);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_submissions_from_spawned_tasks_never_share_a_nonce() {
        let chain = Arc::new(FakeChain::new(CHAIN_ID, 0));
        let signer = Arc::new(FakeSigner::new(SignMode::Immediate));
        let queue = Arc::new(queue(chain.clone(), signer));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.submit(request(i)).await })
            })
            .collect();

        let mut nonces: Vec<u64> = join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap().nonce)
            .collect();
        nonces.sort_unstable();

        assert_eq!(nonces, (0..16).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_signing_failure_does_not_block_next_unit() {
        let chain = Arc::new(FakeChain::new(CHAIN_ID, 10));
        let signer = Arc::new(FakeSigner::new(SignMode::Immediate));
        signer.fail_call(1);
        let queue = queue(chain.clone(), signer);

        let first = queue.submit(request(1));
        let second = queue.submit(request(2));
        let third = queue.submit(request(3));

        assert_eq!(first.await.unwrap().nonce, 10);
        assert!(matches!(second.await, Err(WalletError::Signing(_))));
        assert_eq!(third.await.unwrap().nonce, 11);
    }

    #[tokio::test]
    async fn test_rejected_broadcast_leaves_nonce_for_next_unit() {
        let chain = Arc::new(FakeChain::new(CHAIN_ID, 4));
        let signer = Arc::new(FakeSigner::new(SignMode::Immediate));
        let queue = queue(chain.clone(), signer);

        chain.reject_next_broadcast();
        let rejected = queue.submit(request(1)).await;
        assert!(matches!(rejected, Err(WalletError::Broadcast(_))));

        let retried = queue.submit(request(1)).await.unwrap();
        assert_eq!(retried.nonce, 4);
    }

    #[tokio::test]
    async fn test_next_unit_broadcasts_before_previous_confirms() {
        let chain = Arc::new(FakeChain::new(CHAIN_ID, 0));
        chain.hold_receipts();
        let signer = Arc::new(FakeSigner::new(SignMode::Immediate));
        let queue = queue(chain.clone(), signer);

        let first = tokio::spawn(queue.submit(request(1)));
        let second = tokio::spawn(queue.submit(request(2)));

        tokio::time::timeout(Duration::from_secs(5), async {
            while chain.broadcasts().len() < 2 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("second unit should broadcast while the first is unconfirmed");

        assert!(!first.is_finished());
        chain.mine_all();

        assert_eq!(first.await.unwrap().unwrap().nonce, 0);
        assert_eq!(second.await.unwrap().unwrap().nonce, 1);
    }

    #[tokio::test]
    async fn test_reverted_receipt_is_returned_as_data() {
        let chain = Arc::new(FakeChain::new(CHAIN_ID, 2));
        chain.revert_nonce(2);
        let signer = Arc::new(FakeSigner::new(SignMode::Immediate));
        let queue = queue(chain.clone(), signer);

        let sent = queue.submit(request(0)).await.unwrap();
        assert_eq!(sent.receipt.status, ReceiptStatus::Reverted);

        let next = queue.submit(request(0)).await.unwrap();
        assert_eq!(next.receipt.status, ReceiptStatus::Success);
        assert_eq!(next.nonce, 3);
    }

    #[tokio::test]
    async fn test_queue_reports_running() {
        let chain = Arc::new(FakeChain::new(CHAIN_ID, 0));
        let signer = Arc::new(FakeSigner::new(SignMode::Immediate));
        let queue = queue(chain, signer);

        assert!(queue.is_running());
    }
}
