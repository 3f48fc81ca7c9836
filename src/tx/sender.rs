//! One unit of queued work: nonce, fees, build, sign, encode, broadcast
//!
//! [`TransactionSender::broadcast`] covers everything up to and including the
//! broadcast attempt and must only run from the submission queue worker.
//! [`TransactionSender::confirm`] is the receipt wait and may overlap with the
//! next unit.

use super::encoding;
use super::gas::GasEstimator;
use super::receipt::ReceiptWaiter;
use super::types::{BroadcastTransaction, SentTransaction, TransactionRequest, UnsignedTransaction};
use crate::chain::{ChainClient, NetworkContext};
use crate::error::WalletResult;
use crate::signer::RemoteSigningClient;

use ethers::types::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Transaction sender for a single account
pub struct TransactionSender {
    /// Chain identity and account
    context: NetworkContext,
    /// Chain-query endpoint
    chain: Arc<dyn ChainClient>,
    /// Gas estimator
    gas_estimator: GasEstimator,
    /// Remote signer client
    signing: RemoteSigningClient,
    /// Receipt waiter
    receipts: ReceiptWaiter,
}

impl TransactionSender {
    pub fn new(
        context: NetworkContext,
        chain: Arc<dyn ChainClient>,
        gas_estimator: GasEstimator,
        signing: RemoteSigningClient,
        receipts: ReceiptWaiter,
    ) -> Self {
        Self {
            context,
            chain,
            gas_estimator,
            signing,
            receipts,
        }
    }

    /// Acquire a nonce and push a freshly signed transaction to the network
    pub async fn broadcast(
        &self,
        id: Uuid,
        request: &TransactionRequest,
    ) -> WalletResult<BroadcastTransaction> {
        let nonce = self
            .chain
            .get_transaction_count(self.context.address)
            .await?;
        debug!("[{}] Acquired nonce {} for {:?}", id, nonce, self.context.address);

        let gas = self
            .gas_estimator
            .estimate(self.chain.as_ref(), self.context.address, request)
            .await?;
        debug!(
            "[{}] Worst-case cost {} wei",
            id,
            GasEstimator::calculate_cost(&gas)
        );

        let tx = UnsignedTransaction::new(self.context.chain_id, nonce, request, &gas);
        let raw = self.sign_transaction(&tx).await?;

        let hash = self.chain.send_raw_transaction(raw).await?;
        info!("[{}] Transaction sent: {:?} (nonce {})", id, hash, nonce);

        Ok(BroadcastTransaction { hash, nonce })
    }

    /// Wait for the receipt of a broadcast transaction
    pub async fn confirm(
        &self,
        id: Uuid,
        broadcast: BroadcastTransaction,
        started: Instant,
    ) -> WalletResult<SentTransaction> {
        let receipt = self.receipts.wait(broadcast.hash).await?;

        crate::metrics::record_tx_latency(self.context.chain_id, started.elapsed().as_secs_f64());
        if !receipt.succeeded() {
            crate::metrics::record_tx_reverted(self.context.chain_id);
        }
        debug!("[{}] Submission complete: {:?}", id, receipt.status);

        Ok(SentTransaction {
            hash: broadcast.hash,
            nonce: broadcast.nonce,
            receipt,
        })
    }

    /// Sign and encode a transaction without broadcasting it
    pub async fn sign_transaction(&self, tx: &UnsignedTransaction) -> WalletResult<Bytes> {
        let digest = tx.signing_hash();
        let signature = self.signing.sign(digest).await?;
        encoding::encode(tx, &signature)
    }

    pub fn context(&self) -> &NetworkContext {
        &self.context
    }
}
