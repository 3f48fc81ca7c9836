//! Fee and gas-limit estimation with configurable safety multipliers

use super::types::{GasEstimate, TransactionRequest};
use crate::chain::ChainClient;
use crate::config::GasConfig;
use crate::error::WalletResult;

use ethers::types::{Address, U256};
use tracing::debug;

/// Multipliers are applied in basis points so the arithmetic stays in U256.
/// Precision past the fourth decimal place is rounded away.
const BASIS_POINTS: u64 = 10_000;

/// Gas estimator for transactions
#[derive(Debug, Clone)]
pub struct GasEstimator {
    /// Multiplier on both fee levels, in basis points
    fee_multiplier_bps: u64,
    /// Multiplier on the simulated gas usage, in basis points
    gas_limit_multiplier_bps: u64,
}

impl GasEstimator {
    /// Create a new gas estimator. Multipliers below 1.0 are clamped to 1.0.
    pub fn new(config: &GasConfig) -> Self {
        Self {
            fee_multiplier_bps: to_basis_points(config.fee_per_gas_multiplier),
            gas_limit_multiplier_bps: to_basis_points(config.gas_limit_multiplier),
        }
    }

    /// Query fee levels and simulated gas for `request`, then apply multipliers
    pub async fn estimate(
        &self,
        chain: &dyn ChainClient,
        from: Address,
        request: &TransactionRequest,
    ) -> WalletResult<GasEstimate> {
        let (fees, gas) = tokio::try_join!(
            chain.estimate_fees_per_gas(),
            chain.estimate_gas(from, request)
        )?;

        let estimate = GasEstimate {
            max_fee_per_gas: self.apply_fee_multiplier(fees.max_fee_per_gas),
            max_priority_fee_per_gas: self.apply_fee_multiplier(fees.max_priority_fee_per_gas),
            gas_limit: self.apply_gas_limit_multiplier(gas),
        };

        debug!(
            "Gas estimate: raw gas {} -> limit {}, max fee {} -> {}, priority {} -> {}",
            gas,
            estimate.gas_limit,
            fees.max_fee_per_gas,
            estimate.max_fee_per_gas,
            fees.max_priority_fee_per_gas,
            estimate.max_priority_fee_per_gas
        );

        Ok(estimate)
    }

    /// Scale a fee level, truncating any fractional wei
    pub fn apply_fee_multiplier(&self, raw: U256) -> U256 {
        raw * self.fee_multiplier_bps / BASIS_POINTS
    }

    /// Scale a gas amount, rounding to the nearest unit
    pub fn apply_gas_limit_multiplier(&self, raw: U256) -> U256 {
        (raw * self.gas_limit_multiplier_bps + BASIS_POINTS / 2) / BASIS_POINTS
    }

    /// Calculate worst-case cost in wei
    pub fn calculate_cost(estimate: &GasEstimate) -> U256 {
        estimate.gas_limit * estimate.max_fee_per_gas
    }
}

impl Default for GasEstimator {
    fn default() -> Self {
        Self::new(&GasConfig::default())
    }
}

fn to_basis_points(multiplier: f64) -> u64 {
    // NaN also falls through to 1.0
    let multiplier = if multiplier >= 1.0 { multiplier } else { 1.0 };
    (multiplier * BASIS_POINTS as f64).round() as u64
}
