//! Legacy gas pricing strategy (pre-EIP-1559).
//!
//! Uses the node's `eth_gasPrice`, as plain native-asset transfers do.

use super::{GasParams, GasStrategy};
use crate::client::ChainClient;
use crate::error::Result;
use alloy::network::TransactionBuilder;
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::sync::Arc;

/// Legacy gas pricing strategy.
///
/// Uses a single `gas_price` field for transaction pricing.
#[derive(Debug, Clone)]
pub struct LegacyGasStrategy {
    client: Arc<dyn ChainClient>,
    /// Maximum gas price in wei.
    max_gas_price: u128,
}

impl LegacyGasStrategy {
    /// Create a new Legacy gas strategy.
    ///
    /// # Arguments
    /// * `client` - Node to read the gas price from
    /// * `max_gas_price` - Maximum allowed gas price in wei
    pub fn new(client: Arc<dyn ChainClient>, max_gas_price: u128) -> Self {
        Self {
            client,
            max_gas_price,
        }
    }
}

#[async_trait]
impl GasStrategy for LegacyGasStrategy {
    async fn fetch_params(&self) -> Result<GasParams> {
        let gas_price = self.client.gas_price().await?;
        Ok(GasParams::Legacy {
            gas_price: gas_price.min(self.max_gas_price),
        })
    }

    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams) {
        match params {
            GasParams::Legacy { gas_price } => {
                tx.set_gas_price(*gas_price);
            }
            GasParams::Eip1559 { max_fee_per_gas, .. } => {
                // Fallback: use max_fee as legacy gas price
                tx.set_gas_price(*max_fee_per_gas);
            }
        }
    }

    fn strategy_name(&self) -> &'static str {
        "Legacy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChainClient;
    use alloy::primitives::Address;

    #[tokio::test]
    async fn test_legacy_price_is_capped() {
        let client = MockChainClient::new(137).with_gas_price(20_000_000_000);
        let strategy = LegacyGasStrategy::new(Arc::new(client), 10_000_000_000);

        let params = strategy.fetch_params().await.unwrap();
        assert_eq!(params, GasParams::Legacy { gas_price: 10_000_000_000 });
    }

    #[test]
    fn test_legacy_apply_gas() {
        let strategy = LegacyGasStrategy::new(Arc::new(MockChainClient::new(137)), u128::MAX);
        let mut tx = TransactionRequest::default().with_to(Address::ZERO);

        strategy.apply_gas(&mut tx, &GasParams::Legacy { gas_price: 5_000_000_000 });
        assert_eq!(tx.gas_price(), Some(5_000_000_000));

        let mut tx = TransactionRequest::default().with_to(Address::ZERO);
        let eip1559 = GasParams::Eip1559 {
            max_fee_per_gas: 9_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
            base_fee: None,
        };
        strategy.apply_gas(&mut tx, &eip1559);
        assert_eq!(tx.gas_price(), Some(9_000_000_000));
        assert_eq!(tx.max_fee_per_gas, None);
    }
}
