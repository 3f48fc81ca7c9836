//! Confirmation waiting
//!
//! Polls the chain-query endpoint until a receipt shows up. Mined-but-reverted
//! is reported through [`ReceiptStatus`](super::ReceiptStatus), not as an error.

use super::types::TxReceipt;
use crate::chain::ChainClient;
use crate::error::{WalletError, WalletResult};

use ethers::types::H256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Waits for transactions to be mined
#[derive(Clone)]
pub struct ReceiptWaiter {
    chain: Arc<dyn ChainClient>,
    poll_interval: Duration,
}

impl ReceiptWaiter {
    pub fn new(chain: Arc<dyn ChainClient>, poll_interval: Duration) -> Self {
        Self {
            chain,
            poll_interval,
        }
    }

    /// Suspend until `hash` is mined, with no deadline of its own
    pub async fn wait(&self, hash: H256) -> WalletResult<TxReceipt> {
        loop {
            if let Some(receipt) = self.chain.get_transaction_receipt(hash).await? {
                if receipt.succeeded() {
                    info!(
                        "Transaction {:?} mined in block {:?}",
                        hash, receipt.block_number
                    );
                } else {
                    warn!(
                        "Transaction {:?} reverted in block {:?}",
                        hash, receipt.block_number
                    );
                }
                return Ok(receipt);
            }

            debug!("Receipt for {:?} not available yet", hash);
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`
    pub async fn wait_with_timeout(&self, hash: H256, timeout: Duration) -> WalletResult<TxReceipt> {
        tokio::time::timeout(timeout, self.wait(hash))
            .await
            .map_err(|_| WalletError::Timeout {
                operation: format!("receipt of transaction {:?}", hash),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;
    use crate::tx::ReceiptStatus;
    use ethers::types::U256;

    fn receipt(hash: H256, status: ReceiptStatus) -> TxReceipt {
        TxReceipt {
            transaction_hash: hash,
            status,
            block_number: Some(42),
            gas_used: Some(U256::from(21_000)),
        }
    }

    #[tokio::test]
    async fn test_polls_until_mined() {
        let hash = H256::repeat_byte(0x01);
        let mut calls = 0;
        let mut chain = MockChainClient::new();
        chain
            .expect_get_transaction_receipt()
            .times(3)
            .returning(move |h| {
                calls += 1;
                if calls < 3 {
                    Ok(None)
                } else {
                    Ok(Some(receipt(h, ReceiptStatus::Success)))
                }
            });

        let waiter = ReceiptWaiter::new(Arc::new(chain), Duration::from_millis(1));
        let result = waiter.wait(hash).await.unwrap();

        assert_eq!(result.transaction_hash, hash);
        assert!(result.succeeded());
    }

    #[tokio::test]
    async fn test_reverted_is_data_not_error() {
        let hash = H256::repeat_byte(0x02);
        let mut chain = MockChainClient::new();
        chain
            .expect_get_transaction_receipt()
            .returning(|h| Ok(Some(receipt(h, ReceiptStatus::Reverted))));

        let waiter = ReceiptWaiter::new(Arc::new(chain), Duration::from_millis(1));
        let result = waiter.wait(hash).await.unwrap();

        assert_eq!(result.status, ReceiptStatus::Reverted);
        assert!(!result.succeeded());
    }

    #[tokio::test]
    async fn test_timeout_elapses() {
        let mut chain = MockChainClient::new();
        chain
            .expect_get_transaction_receipt()
            .returning(|_| Ok(None));

        let waiter = ReceiptWaiter::new(Arc::new(chain), Duration::from_millis(5));
        let result = waiter
            .wait_with_timeout(H256::repeat_byte(0x03), Duration::from_millis(30))
            .await;

        assert!(matches!(result, Err(WalletError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_query_failure_propagates() {
        let mut chain = MockChainClient::new();
        chain.expect_get_transaction_receipt().returning(|_| {
            Err(WalletError::ChainConnection {
                chain_id: 1,
                message: "connection refused".into(),
            })
        });

        let waiter = ReceiptWaiter::new(Arc::new(chain), Duration::from_millis(1));
        let result = waiter.wait(H256::zero()).await;

        assert!(matches!(result, Err(WalletError::ChainConnection { .. })));
    }
}
