//! Transaction data model shared by the pipeline stages

use ethers::types::{Address, Bytes, H256, U256};

/// A caller's request to send a transaction from the wallet account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl TransactionRequest {
    pub fn new(to: Address, value: U256, data: Bytes) -> Self {
        Self { to, value, data }
    }

    /// Plain value transfer with empty calldata
    pub fn transfer(to: Address, value: U256) -> Self {
        Self::new(to, value, Bytes::default())
    }
}

/// Fee levels and gas limit for one submission, after multipliers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasEstimate {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub gas_limit: U256,
}

/// Raw fee-market levels as reported by the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// A fee-market (type 2) transaction ready to be signed.
///
/// Built fresh for every submission and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: U256,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl UnsignedTransaction {
    pub fn new(chain_id: u64, nonce: u64, request: &TransactionRequest, gas: &GasEstimate) -> Self {
        Self {
            chain_id,
            nonce,
            max_priority_fee_per_gas: gas.max_priority_fee_per_gas,
            max_fee_per_gas: gas.max_fee_per_gas,
            gas_limit: gas.gas_limit,
            to: request.to,
            value: request.value,
            data: request.data.clone(),
        }
    }
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Receipt data surfaced to callers. A revert is data, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: H256,
    pub status: ReceiptStatus,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// A transaction accepted by the network and awaiting its receipt
#[derive(Debug, Clone)]
pub struct BroadcastTransaction {
    pub hash: H256,
    pub nonce: u64,
}

/// Final result of a queued submission
#[derive(Debug, Clone)]
pub struct SentTransaction {
    pub hash: H256,
    pub nonce: u64,
    pub receipt: TxReceipt,
}
