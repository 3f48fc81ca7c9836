//! JSON-RPC chain provider

use super::ChainClient;
use crate::config::RpcConfig;
use crate::error::{WalletError, WalletResult};
use crate::tx::{FeeEstimate, ReceiptStatus, TransactionRequest, TxReceipt};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::time::Duration;
use tracing::debug;

/// Chain-query endpoint backed by an HTTP JSON-RPC provider
pub struct ChainProvider {
    /// Configured chain ID, used for error context
    chain_id: u64,
    provider: Provider<Http>,
}

impl ChainProvider {
    /// Create a new chain provider
    pub fn new(chain_id: u64, config: &RpcConfig) -> WalletResult<Self> {
        let provider = Provider::<Http>::try_from(config.url.as_str())
            .map_err(|e| WalletError::Config(format!("Invalid RPC url {}: {}", config.url, e)))?
            .interval(Duration::from_millis(config.poll_interval_ms));

        debug!("Added HTTP provider for chain {}: {}", chain_id, config.url);

        Ok(Self { chain_id, provider })
    }

    fn connection_error(&self, e: impl std::fmt::Display) -> WalletError {
        WalletError::ChainConnection {
            chain_id: self.chain_id,
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl ChainClient for ChainProvider {
    async fn chain_id(&self) -> WalletResult<u64> {
        self.provider
            .get_chainid()
            .await
            .map(|id| id.as_u64())
            .map_err(|e| WalletError::Config(format!("Failed to query chain id: {}", e)))
    }

    async fn get_transaction_count(&self, address: Address) -> WalletResult<u64> {
        let nonce = self
            .provider
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| WalletError::Estimation(format!("Failed to fetch nonce: {}", e)))?;

        Ok(nonce.as_u64())
    }

    async fn estimate_fees_per_gas(&self) -> WalletResult<FeeEstimate> {
        let block = self
            .provider
            .get_block(BlockNumber::Latest)
            .await
            .map_err(|e| WalletError::Estimation(e.to_string()))?
            .ok_or_else(|| WalletError::Estimation("No latest block".to_string()))?;

        let base_fee = block
            .base_fee_per_gas
            .ok_or_else(|| WalletError::Estimation("No base fee in block".to_string()))?;

        let priority_fee: U256 = self
            .provider
            .request("eth_maxPriorityFeePerGas", ())
            .await
            .map_err(|e| WalletError::Estimation(format!("Failed to query priority fee: {}", e)))?;

        // Max fee = 2 * base_fee + priority_fee (buffer for block variability)
        let max_fee = base_fee * 2 + priority_fee;

        Ok(FeeEstimate {
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: priority_fee,
        })
    }

    async fn estimate_gas(
        &self,
        from: Address,
        request: &TransactionRequest,
    ) -> WalletResult<U256> {
        let call: TypedTransaction = Eip1559TransactionRequest::new()
            .from(from)
            .to(request.to)
            .value(request.value)
            .data(request.data.clone())
            .chain_id(self.chain_id)
            .into();

        self.provider
            .estimate_gas(&call, None)
            .await
            .map_err(|e| WalletError::Estimation(format!("Failed to estimate gas: {}", e)))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> WalletResult<H256> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| WalletError::Broadcast(e.to_string()))?;

        Ok(pending.tx_hash())
    }

    async fn get_transaction_receipt(&self, hash: H256) -> WalletResult<Option<TxReceipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| self.connection_error(e))?;

        Ok(receipt.map(|r| TxReceipt {
            transaction_hash: r.transaction_hash,
            status: if r.status == Some(1.into()) {
                ReceiptStatus::Success
            } else {
                ReceiptStatus::Reverted
            },
            block_number: r.block_number.map(|b| b.as_u64()),
            gas_used: r.gas_used,
        }))
    }

    async fn get_balance(&self, address: Address) -> WalletResult<U256> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(|e| self.connection_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_is_config_error() {
        let config = RpcConfig {
            url: "not a url".to_string(),
            poll_interval_ms: 100,
        };

        assert!(matches!(
            ChainProvider::new(1, &config),
            Err(WalletError::Config(_))
        ));
    }

    #[test]
    fn test_valid_url_accepted() {
        let config = RpcConfig {
            url: "http://localhost:8545".to_string(),
            poll_interval_ms: 100,
        };

        assert!(ChainProvider::new(31337, &config).is_ok());
    }
}
