//! Prometheus metrics for the submission pipeline
//!
//! Exposes metrics for:
//! - Transactions broadcast, failed and reverted
//! - Remote signatures that went through the pending state
//! - End-to-end submission latency

use crate::error::{WalletError, WalletResult};

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "wallet_transactions_submitted_total",
        "Total transactions accepted by the network",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_FAILED: CounterVec = register_counter_vec!(
        "wallet_transactions_failed_total",
        "Total submissions that failed, by pipeline stage",
        &["chain_id", "stage"]
    ).unwrap();

    pub static ref TX_REVERTED: CounterVec = register_counter_vec!(
        "wallet_transactions_reverted_total",
        "Total transactions mined with a reverted status",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_LATENCY: HistogramVec = register_histogram_vec!(
        "wallet_submission_latency_seconds",
        "Time from submit to receipt",
        &["chain_id"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();

    pub static ref SIGNATURES_PENDING: Counter = register_counter!(
        "wallet_signatures_pending_total",
        "Total remote signatures that did not complete immediately"
    ).unwrap();
}

/// Render all registered metrics in the Prometheus text format
pub fn render() -> WalletResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| WalletError::Config(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| WalletError::Config(format!("Metrics output is not UTF-8: {}", e)))
}

// Helper functions to record metrics

pub fn record_tx_submitted(chain_id: u64) {
    TX_SUBMITTED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_tx_failed(chain_id: u64, stage: &str) {
    TX_FAILED
        .with_label_values(&[&chain_id.to_string(), stage])
        .inc();
}

pub fn record_tx_reverted(chain_id: u64) {
    TX_REVERTED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_tx_latency(chain_id: u64, latency_secs: f64) {
    TX_LATENCY
        .with_label_values(&[&chain_id.to_string()])
        .observe(latency_secs);
}

pub fn record_signature_pending() {
    SIGNATURES_PENDING.inc();
}
