//! In-memory chain and signer used by the pipeline tests

use crate::chain::ChainClient;
use crate::error::{WalletError, WalletResult};
use crate::signer::{PendingSignature, RemoteSigner, SignResponse};
use crate::tx::encoding::{decode_signed, transaction_hash};
use crate::tx::{FeeEstimate, ReceiptStatus, TransactionRequest, TxReceipt};

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) const FIXTURE_SIGNATURE: &str = crate::tx::encoding::tests::GOLDEN_SIGNATURE;

struct ChainState {
    pending_nonce: u64,
    fees: FeeEstimate,
    gas: U256,
    balance: U256,
    auto_mine: bool,
    reject_next_broadcast: bool,
    reverting_nonces: HashSet<u64>,
    broadcasts: Vec<Bytes>,
    unmined: Vec<(H256, u64)>,
    receipts: HashMap<H256, TxReceipt>,
}

/// Chain that tracks the pending nonce and rejects out-of-order broadcasts
pub(crate) struct FakeChain {
    chain_id: u64,
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub(crate) fn new(chain_id: u64, pending_nonce: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(ChainState {
                pending_nonce,
                fees: FeeEstimate {
                    max_fee_per_gas: U256::from(10),
                    max_priority_fee_per_gas: U256::from(1),
                },
                gas: U256::from(21_000),
                balance: U256::exp10(18),
                auto_mine: true,
                reject_next_broadcast: false,
                reverting_nonces: HashSet::new(),
                broadcasts: Vec::new(),
                unmined: Vec::new(),
                receipts: HashMap::new(),
            }),
        }
    }

    /// Leave broadcast transactions without a receipt until `mine_all`
    pub(crate) fn hold_receipts(&self) {
        self.state.lock().unwrap().auto_mine = false;
    }

    pub(crate) fn mine_all(&self) {
        let mut state = self.state.lock().unwrap();
        let unmined = std::mem::take(&mut state.unmined);
        for (hash, nonce) in unmined {
            let receipt = receipt_for(&state, hash, nonce);
            state.receipts.insert(hash, receipt);
        }
    }

    pub(crate) fn reject_next_broadcast(&self) {
        self.state.lock().unwrap().reject_next_broadcast = true;
    }

    pub(crate) fn revert_nonce(&self, nonce: u64) {
        self.state.lock().unwrap().reverting_nonces.insert(nonce);
    }

    pub(crate) fn pending_nonce(&self) -> u64 {
        self.state.lock().unwrap().pending_nonce
    }

    pub(crate) fn broadcasts(&self) -> Vec<Bytes> {
        self.state.lock().unwrap().broadcasts.clone()
    }

    pub(crate) fn broadcast_nonces(&self) -> Vec<u64> {
        self.broadcasts()
            .iter()
            .map(|raw| decode_signed(raw).unwrap().0.nonce)
            .collect()
    }
}

fn receipt_for(state: &ChainState, hash: H256, nonce: u64) -> TxReceipt {
    TxReceipt {
        transaction_hash: hash,
        status: if state.reverting_nonces.contains(&nonce) {
            ReceiptStatus::Reverted
        } else {
            ReceiptStatus::Success
        },
        block_number: Some(100 + nonce),
        gas_used: Some(state.gas),
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn chain_id(&self) -> WalletResult<u64> {
        Ok(self.chain_id)
    }

    async fn get_transaction_count(&self, _address: Address) -> WalletResult<u64> {
        // Give other tasks a chance to interleave with the nonce read
        tokio::task::yield_now().await;
        Ok(self.state.lock().unwrap().pending_nonce)
    }

    async fn estimate_fees_per_gas(&self) -> WalletResult<FeeEstimate> {
        tokio::task::yield_now().await;
        Ok(self.state.lock().unwrap().fees)
    }

    async fn estimate_gas(
        &self,
        _from: Address,
        _request: &TransactionRequest,
    ) -> WalletResult<U256> {
        Ok(self.state.lock().unwrap().gas)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> WalletResult<H256> {
        tokio::task::yield_now().await;
        let (tx, _) = decode_signed(&raw)?;
        let mut state = self.state.lock().unwrap();

        if state.reject_next_broadcast {
            state.reject_next_broadcast = false;
            return Err(WalletError::Broadcast(
                "replacement transaction underpriced".to_string(),
            ));
        }
        if tx.nonce != state.pending_nonce {
            return Err(WalletError::Broadcast(format!(
                "nonce mismatch: expected {}, got {}",
                state.pending_nonce, tx.nonce
            )));
        }

        let hash = transaction_hash(&raw);
        state.pending_nonce += 1;
        state.broadcasts.push(raw);

        if state.auto_mine {
            let receipt = receipt_for(&state, hash, tx.nonce);
            state.receipts.insert(hash, receipt);
        } else {
            state.unmined.push((hash, tx.nonce));
        }

        Ok(hash)
    }

    async fn get_transaction_receipt(&self, hash: H256) -> WalletResult<Option<TxReceipt>> {
        Ok(self.state.lock().unwrap().receipts.get(&hash).cloned())
    }

    async fn get_balance(&self, _address: Address) -> WalletResult<U256> {
        Ok(self.state.lock().unwrap().balance)
    }
}

pub(crate) enum SignMode {
    Immediate,
    Pending(Duration),
}

/// Signer that returns a fixed signature and records every digest
pub(crate) struct FakeSigner {
    mode: SignMode,
    signature: Bytes,
    calls: AtomicUsize,
    failing_calls: Mutex<HashSet<usize>>,
    digests: Mutex<Vec<H256>>,
}

impl FakeSigner {
    pub(crate) fn new(mode: SignMode) -> Self {
        Self {
            mode,
            signature: Bytes::from(hex::decode(FIXTURE_SIGNATURE).unwrap()),
            calls: AtomicUsize::new(0),
            failing_calls: Mutex::new(HashSet::new()),
            digests: Mutex::new(Vec::new()),
        }
    }

    /// Make the zero-based `call`-th signing request fail
    pub(crate) fn fail_call(&self, call: usize) {
        self.failing_calls.lock().unwrap().insert(call);
    }

    pub(crate) fn signature(&self) -> Bytes {
        self.signature.clone()
    }

    pub(crate) fn digests(&self) -> Vec<H256> {
        self.digests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteSigner for FakeSigner {
    async fn remote_sign(&self, digest: H256) -> WalletResult<SignResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.digests.lock().unwrap().push(digest);

        if self.failing_calls.lock().unwrap().contains(&call) {
            return Err(WalletError::Signing("signer unavailable".to_string()));
        }

        match self.mode {
            SignMode::Immediate => Ok(SignResponse::Signed(self.signature.clone())),
            SignMode::Pending(delay) => {
                let signature = self.signature.clone();
                Ok(SignResponse::Pending(PendingSignature::new(
                    format!("op-{}", call),
                    async move {
                        tokio::time::sleep(delay).await;
                        Ok(Some(signature))
                    },
                )))
            }
        }
    }
}
