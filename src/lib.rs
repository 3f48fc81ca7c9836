//! Wallet Pipeline - queued EIP-1559 submission for remotely signed accounts
//!
//! A [`Wallet`] owns one account. Transaction-producing calls are serialized
//! through a submission queue so concurrent callers never race for a nonce,
//! while signing is delegated to a remote signer that may answer asynchronously.

pub mod chain;
pub mod config;
pub mod error;
pub mod metrics;
pub mod signer;
pub mod tx;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use error::{WalletError, WalletResult};
pub use wallet::Wallet;
