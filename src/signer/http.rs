//! HTTP client for a remote signing service
//!
//! `POST {url}/v1/sign` submits a digest. A `pending` answer is followed up with
//! `GET {url}/v1/sign/{id}` at the configured poll interval until the service
//! reports `signed` or `failed`.

use super::{PendingSignature, RemoteSigner, SignResponse};
use crate::config::SignerConfig;
use crate::error::{WalletError, WalletResult};

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct SignRequest {
    address: Address,
    digest: H256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OperationStatus {
    Pending,
    Signed,
    Failed,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    id: String,
    status: OperationStatus,
    signature: Option<Bytes>,
    error: Option<String>,
}

/// Remote signer reached over HTTP
#[derive(Clone)]
pub struct HttpRemoteSigner {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    address: Address,
    poll_interval: Duration,
}

impl HttpRemoteSigner {
    pub fn new(config: &SignerConfig, address: Address) -> WalletResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| WalletError::Config(format!("Failed to build signer client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            // An unset `${VAR}` substitutes to an empty key
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            address,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn submit(&self, digest: H256) -> WalletResult<OperationResponse> {
        let request = self
            .client
            .post(format!("{}/v1/sign", self.base_url))
            .json(&SignRequest {
                address: self.address,
                digest,
            });

        send(self.authorize(request)).await
    }

    async fn poll(&self, id: &str) -> WalletResult<OperationResponse> {
        let request = self.client.get(format!("{}/v1/sign/{}", self.base_url, id));
        send(self.authorize(request)).await
    }

    /// Follow a pending operation until it leaves the pending state
    async fn await_completion(self, id: String) -> WalletResult<Option<Bytes>> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let operation = self.poll(&id).await?;
            match operation.status {
                OperationStatus::Pending => {
                    debug!("Signing operation {} still pending", id);
                }
                _ => return operation.into_signature(),
            }
        }
    }
}

impl OperationResponse {
    fn into_signature(self) -> WalletResult<Option<Bytes>> {
        match self.status {
            OperationStatus::Signed => Ok(self.signature),
            OperationStatus::Failed => {
                let reason = self.error.unwrap_or_else(|| "no reason given".to_string());
                warn!("Signing operation {} failed: {}", self.id, reason);
                Err(WalletError::Signing(format!(
                    "signer rejected operation {}: {}",
                    self.id, reason
                )))
            }
            OperationStatus::Pending => Err(WalletError::Signing(format!(
                "operation {} is still pending",
                self.id
            ))),
        }
    }
}

async fn send(request: reqwest::RequestBuilder) -> WalletResult<OperationResponse> {
    let response = request
        .send()
        .await
        .map_err(|e| WalletError::Signing(format!("signer request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(WalletError::Signing(format!(
            "signer returned {}: {}",
            status, body
        )));
    }

    response
        .json::<OperationResponse>()
        .await
        .map_err(|e| WalletError::Signing(format!("invalid signer response: {}", e)))
}

#[async_trait]
impl RemoteSigner for HttpRemoteSigner {
    async fn remote_sign(&self, digest: H256) -> WalletResult<SignResponse> {
        let operation = self.submit(digest).await?;

        match operation.status {
            OperationStatus::Pending => {
                let id = operation.id.clone();
                let completion = self.clone().await_completion(id.clone());
                Ok(SignResponse::Pending(PendingSignature::new(id, completion)))
            }
            _ => {
                let id = operation.id.clone();
                let signature = operation.into_signature()?.ok_or_else(|| {
                    WalletError::Signing(format!(
                        "signing operation {} completed without a signature",
                        id
                    ))
                })?;
                Ok(SignResponse::Signed(signature))
            }
        }
    }
}
