//! Transaction pipeline: estimation, encoding, queued submission and confirmation

pub mod encoding;
mod gas;
mod queue;
mod receipt;
mod sender;
mod types;

pub use encoding::Signature;
pub use gas::GasEstimator;
pub use queue::SubmissionQueue;
pub use receipt::ReceiptWaiter;
pub use sender::TransactionSender;
pub use types::{
    BroadcastTransaction, FeeEstimate, GasEstimate, ReceiptStatus, SentTransaction,
    TransactionRequest, TxReceipt, UnsignedTransaction,
};
