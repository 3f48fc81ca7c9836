//! Wallet facade over the submission pipeline
//!
//! Transaction-producing calls go through the [`SubmissionQueue`]. Message and
//! typed-data signing reuse the remote signer directly and never touch the queue
//! or the account nonce.

use crate::chain::{ChainClient, ChainProvider, NetworkContext};
use crate::config::{GasConfig, ReceiptConfig, Settings};
use crate::error::{WalletError, WalletResult};
use crate::signer::{HttpRemoteSigner, RemoteSigner, RemoteSigningClient};
use crate::tx::{
    GasEstimator, ReceiptWaiter, SentTransaction, SubmissionQueue, TransactionRequest,
    TransactionSender, TxReceipt, UnsignedTransaction,
};

use ethers::types::transaction::eip712::{Eip712, TypedData};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::{hash_message, parse_ether};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A single account whose key is held by a remote signer
pub struct Wallet {
    context: NetworkContext,
    chain: Arc<dyn ChainClient>,
    signing: RemoteSigningClient,
    sender: Arc<TransactionSender>,
    queue: SubmissionQueue,
    receipts: ReceiptWaiter,
}

impl Wallet {
    /// Build a wallet from settings, connecting to the configured endpoint
    /// and remote signer
    pub async fn connect(settings: &Settings) -> WalletResult<Self> {
        let address = settings
            .wallet
            .account_address()
            .map_err(|e| WalletError::Config(e.to_string()))?;

        let mut context = NetworkContext::new(settings.wallet.chain_id, address);
        if let Some(network_id) = &settings.wallet.network_id {
            context = context.with_network_id(network_id.clone());
        }

        let chain = Arc::new(ChainProvider::new(context.chain_id, &settings.rpc)?);
        let reported = chain.chain_id().await?;
        if reported != context.chain_id {
            return Err(WalletError::Config(format!(
                "RPC endpoint reports chain {} but wallet is configured for chain {}",
                reported, context.chain_id
            )));
        }

        let signer = Arc::new(HttpRemoteSigner::new(&settings.signer, address)?);

        Self::new(context, chain, signer, &settings.gas, &settings.receipt)
    }

    /// Assemble a wallet from its collaborators.
    ///
    /// Must be called from within a Tokio runtime, which hosts the queue worker.
    pub fn new(
        context: NetworkContext,
        chain: Arc<dyn ChainClient>,
        signer: Arc<dyn RemoteSigner>,
        gas: &GasConfig,
        receipt: &ReceiptConfig,
    ) -> WalletResult<Self> {
        if context.chain_id == 0 {
            return Err(WalletError::Config("chain id is not set".to_string()));
        }
        if context.address.is_zero() {
            return Err(WalletError::Config("account address is not set".to_string()));
        }
        tokio::runtime::Handle::try_current().map_err(|_| {
            WalletError::Config("wallet must be created inside a Tokio runtime".to_string())
        })?;

        let signing = RemoteSigningClient::new(signer);
        let receipts = ReceiptWaiter::new(chain.clone(), receipt.poll_interval());
        let sender = Arc::new(TransactionSender::new(
            context.clone(),
            chain.clone(),
            GasEstimator::new(gas),
            signing.clone(),
            receipts.clone(),
        ));
        let queue = SubmissionQueue::spawn(sender.clone());

        info!(
            "Wallet initialized for {:?} on chain {}",
            context.address, context.chain_id
        );

        Ok(Self {
            context,
            chain,
            signing,
            sender,
            queue,
            receipts,
        })
    }

    /// Queue a transaction and resolve with its hash once it is mined.
    ///
    /// The call joins the queue immediately; awaiting is only needed for the result.
    pub fn submit(
        &self,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> impl Future<Output = WalletResult<H256>> + Send + 'static {
        let sent = self.send_transaction(TransactionRequest::new(to, value, data));
        async move { sent.await.map(|sent| sent.hash) }
    }

    /// Queue a transaction and resolve with its hash, nonce and receipt
    pub fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> impl Future<Output = WalletResult<SentTransaction>> + Send + 'static {
        self.queue.submit(request)
    }

    /// Transfer `amount` ether (decimal string, e.g. "0.5") to `to`
    pub async fn native_transfer(&self, to: Address, amount: &str) -> WalletResult<H256> {
        let value = parse_ether(amount)
            .map_err(|e| WalletError::Config(format!("Invalid amount {}: {}", amount, e)))?;

        info!("Transferring {} wei to {:?}", value, to);
        self.submit(to, value, Bytes::default()).await
    }

    /// Sign an EIP-191 personal message
    pub async fn sign_message(&self, message: impl AsRef<[u8]>) -> WalletResult<Bytes> {
        self.signing.sign(hash_message(message)).await
    }

    /// Sign EIP-712 typed data
    pub async fn sign_typed_data(&self, typed_data: &TypedData) -> WalletResult<Bytes> {
        let digest = typed_data
            .encode_eip712()
            .map_err(|e| WalletError::Encoding(format!("Invalid typed data: {}", e)))?;

        self.signing.sign(H256::from(digest)).await
    }

    /// Sign and encode a caller-built transaction without queueing or broadcasting it
    pub async fn sign_transaction(&self, tx: &UnsignedTransaction) -> WalletResult<Bytes> {
        if tx.chain_id != self.context.chain_id {
            return Err(WalletError::Config(format!(
                "transaction targets chain {} but wallet is on chain {}",
                tx.chain_id, self.context.chain_id
            )));
        }
        self.sender.sign_transaction(tx).await
    }

    /// Wait for a receipt, optionally bounded by `timeout`
    pub async fn wait_for_transaction_receipt(
        &self,
        hash: H256,
        timeout: Option<Duration>,
    ) -> WalletResult<TxReceipt> {
        match timeout {
            Some(timeout) => self.receipts.wait_with_timeout(hash, timeout).await,
            None => self.receipts.wait(hash).await,
        }
    }

    /// Balance of the wallet account in wei
    pub async fn get_balance(&self) -> WalletResult<U256> {
        self.chain.get_balance(self.context.address).await
    }

    pub fn address(&self) -> Address {
        self.context.address
    }

    pub fn network(&self) -> &NetworkContext {
        &self.context
    }
}
