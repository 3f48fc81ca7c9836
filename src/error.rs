//! Error types for the wallet pipeline

use thiserror::Error;

/// Main error type for the wallet pipeline
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Estimation error: {0}")]
    Estimation(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Broadcast error: {0}")]
    Broadcast(String),

    #[error("Chain connection error for chain {chain_id}: {message}")]
    ChainConnection { chain_id: u64, message: String },

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Submission queue is closed")]
    QueueClosed,
}

impl WalletError {
    /// Check if a caller may retry the whole submission.
    ///
    /// The pipeline never retries on its own. A retry goes back through the
    /// queue and therefore gets a fresh nonce and fee estimate.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletError::Estimation(_)
                | WalletError::Broadcast(_)
                | WalletError::ChainConnection { .. }
                | WalletError::Timeout { .. }
        )
    }

    /// Pipeline stage label, used for failure metrics
    pub fn stage(&self) -> &'static str {
        match self {
            WalletError::Config(_) => "config",
            WalletError::Estimation(_) => "estimation",
            WalletError::Signing(_) => "signing",
            WalletError::Encoding(_) => "encoding",
            WalletError::Broadcast(_) => "broadcast",
            WalletError::ChainConnection { .. } => "chain",
            WalletError::Timeout { .. } => "timeout",
            WalletError::QueueClosed => "queue",
        }
    }
}

impl From<ethers::utils::rlp::DecoderError> for WalletError {
    fn from(e: ethers::utils::rlp::DecoderError) -> Self {
        WalletError::Encoding(e.to_string())
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;
