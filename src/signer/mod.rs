//! Remote signing - digests go out to an external signer, signatures come
//! back either immediately or through a pending handle
//!
//! The protocol is payload-agnostic: transaction hashes, personal-message
//! hashes and typed-data hashes all go through [`RemoteSigningClient::sign`].

pub mod http;

pub use http::HttpRemoteSigner;

use crate::error::{WalletError, WalletResult};

use async_trait::async_trait;
use ethers::types::{Bytes, H256};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// Status of a signing operation at the remote signer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    Pending,
    Signed,
}

/// A signing operation accepted by the remote signer but not yet completed.
///
/// Resolves exactly once. A completion without signature bytes is a failure.
pub struct PendingSignature {
    id: String,
    completion: BoxFuture<'static, WalletResult<Option<Bytes>>>,
}

impl PendingSignature {
    pub fn new<F>(id: impl Into<String>, completion: F) -> Self
    where
        F: Future<Output = WalletResult<Option<Bytes>>> + Send + 'static,
    {
        Self {
            id: id.into(),
            completion: Box::pin(completion),
        }
    }

    /// Signer-side identifier of the operation
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Suspend until the remote signer completes or fails the operation
    pub async fn wait(self) -> WalletResult<Bytes> {
        match self.completion.await? {
            Some(signature) => Ok(signature),
            None => Err(WalletError::Signing(format!(
                "signing operation {} completed without a signature",
                self.id
            ))),
        }
    }
}

impl std::fmt::Debug for PendingSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSignature")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// What a remote signer hands back for a digest
#[derive(Debug)]
pub enum SignResponse {
    Signed(Bytes),
    Pending(PendingSignature),
}

impl SignResponse {
    pub fn status(&self) -> SignatureStatus {
        match self {
            SignResponse::Signed(_) => SignatureStatus::Signed,
            SignResponse::Pending(_) => SignatureStatus::Pending,
        }
    }
}

/// External signer holding the account key
#[async_trait]
pub trait RemoteSigner: Send + Sync {
    async fn remote_sign(&self, digest: H256) -> WalletResult<SignResponse>;
}

/// Client turning a digest into a raw `r || s || v` signature
#[derive(Clone)]
pub struct RemoteSigningClient {
    signer: Arc<dyn RemoteSigner>,
}

impl RemoteSigningClient {
    pub fn new(signer: Arc<dyn RemoteSigner>) -> Self {
        Self { signer }
    }

    /// Sign a 32-byte digest.
    ///
    /// There is no timeout here: a pending operation blocks the caller until
    /// the signer resolves it. Failures are returned as-is, never retried.
    pub async fn sign(&self, digest: H256) -> WalletResult<Bytes> {
        match self.signer.remote_sign(digest).await? {
            SignResponse::Signed(signature) => {
                debug!("Digest {:?} signed immediately", digest);
                Ok(signature)
            }
            SignResponse::Pending(pending) => {
                info!(
                    "Signature for digest {:?} pending (operation {})",
                    digest,
                    pending.id()
                );
                crate::metrics::record_signature_pending();
                let signature = pending.wait().await?;
                debug!("Pending signature for digest {:?} completed", digest);
                Ok(signature)
            }
        }
    }
}
