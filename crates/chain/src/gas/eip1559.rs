//! EIP-1559 gas pricing from node fee data.
//!
//! Mirrors the usual client-side fee suggestion:
//! `max_fee = base_fee * multiplier + priority_fee`.

use super::{GasParams, GasStrategy};
use crate::client::ChainClient;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// EIP-1559 gas pricing strategy backed by the node.
#[derive(Debug, Clone)]
pub struct Eip1559GasStrategy {
    client: Arc<dyn ChainClient>,
    /// Multiplier for max_fee relative to base_fee (e.g., 2.0 = 100% buffer).
    max_fee_multiplier: f64,
    /// Maximum allowed max_fee_per_gas in wei.
    max_fee_cap: u128,
    /// Priority fee used when the node suggests none, in wei.
    default_priority_fee: u128,
}

impl Eip1559GasStrategy {
    /// Create a new EIP-1559 gas strategy.
    ///
    /// # Arguments
    /// * `client` - Node to read base and priority fees from
    /// * `max_fee_multiplier` - Multiplier for max_fee (e.g., 2.0 means max_fee = 2 * base_fee + priority)
    pub fn new(client: Arc<dyn ChainClient>, max_fee_multiplier: f64) -> Self {
        Self {
            client,
            max_fee_multiplier,
            max_fee_cap: u128::MAX,
            default_priority_fee: 0,
        }
    }

    /// Create with a custom max fee cap.
    pub fn with_max_fee_cap(mut self, cap: u128) -> Self {
        self.max_fee_cap = cap;
        self
    }

    /// Use `fee` when the node reports a zero priority fee.
    pub fn with_default_priority_fee(mut self, fee: u128) -> Self {
        self.default_priority_fee = fee;
        self
    }

    /// Calculate max_fee_per_gas based on base_fee.
    fn calculate_max_fee(&self, base_fee: u128, priority_fee: u128) -> u128 {
        let max_fee = ((base_fee as f64) * self.max_fee_multiplier) as u128 + priority_fee;
        max_fee.min(self.max_fee_cap)
    }
}

#[async_trait]
impl GasStrategy for Eip1559GasStrategy {
    async fn fetch_params(&self) -> Result<GasParams> {
        let fees = self.client.fee_data().await?;
        let priority_fee = match fees.max_priority_fee_per_gas {
            0 => self.default_priority_fee,
            fee => fee,
        };
        let max_fee_per_gas = self.calculate_max_fee(fees.base_fee_per_gas, priority_fee);

        Ok(GasParams::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas: priority_fee.min(max_fee_per_gas),
            base_fee: Some(fees.base_fee_per_gas),
        })
    }

    fn strategy_name(&self) -> &'static str {
        "EIP-1559"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChainClient;

    fn strategy(multiplier: f64) -> Eip1559GasStrategy {
        Eip1559GasStrategy::new(Arc::new(MockChainClient::new(137)), multiplier)
    }

    #[test]
    fn test_eip1559_max_fee_calculation() {
        let strategy = strategy(2.0);

        // base_fee = 30 gwei, priority = 2 gwei
        // max_fee = 30 * 2.0 + 2 = 62 gwei
        let max_fee = strategy.calculate_max_fee(30_000_000_000, 2_000_000_000);
        assert_eq!(max_fee, 62_000_000_000);
    }

    #[test]
    fn test_eip1559_max_fee_cap() {
        let strategy = strategy(10.0).with_max_fee_cap(100_000_000_000); // 100 gwei cap

        // base_fee = 30 gwei, priority = 2 gwei
        // max_fee = 30 * 10.0 + 2 = 302 gwei, but capped at 100 gwei
        let max_fee = strategy.calculate_max_fee(30_000_000_000, 2_000_000_000);
        assert_eq!(max_fee, 100_000_000_000);
    }

    #[tokio::test]
    async fn test_fetch_uses_node_fee_data() {
        let client = MockChainClient::new(137).with_fee_data(30_000_000_000, 2_000_000_000);
        let strategy = Eip1559GasStrategy::new(Arc::new(client), 2.0);

        let params = strategy.fetch_params().await.unwrap();
        assert_eq!(
            params,
            GasParams::Eip1559 {
                max_fee_per_gas: 62_000_000_000,
                max_priority_fee_per_gas: 2_000_000_000,
                base_fee: Some(30_000_000_000),
            }
        );
    }

    #[tokio::test]
    async fn test_zero_node_tip_uses_default() {
        let client = MockChainClient::new(137).with_fee_data(10_000_000_000, 0);
        let strategy = Eip1559GasStrategy::new(Arc::new(client), 2.0).with_default_priority_fee(30_000_000_000);

        let params = strategy.fetch_params().await.unwrap();
        assert_eq!(params.effective_gas_price(), 50_000_000_000);
    }
}
