//! Chain module - network identity and the read/broadcast capabilities of
//! the chain-query endpoint

pub mod provider;

pub use provider::ChainProvider;

use crate::error::WalletResult;
use crate::tx::{FeeEstimate, TransactionRequest, TxReceipt};

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};

/// Chain identity and account for one wallet instance.
///
/// Fixed at wallet construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkContext {
    pub chain_id: u64,
    pub address: Address,
    pub network_id: Option<String>,
}

impl NetworkContext {
    pub fn new(chain_id: u64, address: Address) -> Self {
        Self {
            chain_id,
            address,
            network_id: None,
        }
    }

    pub fn with_network_id(mut self, network_id: impl Into<String>) -> Self {
        self.network_id = Some(network_id.into());
        self
    }
}

/// Operations the pipeline needs from a chain-query endpoint
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id reported by the endpoint
    async fn chain_id(&self) -> WalletResult<u64>;

    /// Transaction count including not-yet-mined transactions
    async fn get_transaction_count(&self, address: Address) -> WalletResult<u64>;

    /// Current fee-market levels, before any multiplier
    async fn estimate_fees_per_gas(&self) -> WalletResult<FeeEstimate>;

    /// Simulated gas usage of a call from `from`
    async fn estimate_gas(&self, from: Address, request: &TransactionRequest)
        -> WalletResult<U256>;

    /// Submit signed transaction bytes
    async fn send_raw_transaction(&self, raw: Bytes) -> WalletResult<H256>;

    /// Receipt of a mined transaction, `None` while still pending
    async fn get_transaction_receipt(&self, hash: H256) -> WalletResult<Option<TxReceipt>>;

    async fn get_balance(&self, address: Address) -> WalletResult<U256>;
}
