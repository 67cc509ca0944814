//! Gas station pricing strategy.
//!
//! Quotes come from the external gas station's `fast` tier. This is the
//! strategy every token and lending transaction is priced with.

use super::{GasParams, GasStrategy};
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;
use wallet_api::{FeeQuote, GasStationClient};

/// EIP-1559 pricing from the gas station.
#[derive(Debug, Clone)]
pub struct GasStationStrategy {
    client: GasStationClient,
    /// Maximum allowed max_fee_per_gas in wei.
    max_fee_cap: Option<u128>,
}

impl GasStationStrategy {
    /// Create a strategy over a gas station client.
    pub fn new(client: GasStationClient) -> Self {
        Self {
            client,
            max_fee_cap: None,
        }
    }

    /// Create with a custom max fee cap.
    pub fn with_max_fee_cap(mut self, cap: u128) -> Self {
        self.max_fee_cap = Some(cap);
        self
    }

    /// Convert a station quote into gas params, applying the cap.
    fn params_from_quote(&self, quote: FeeQuote) -> GasParams {
        let max_fee_per_gas = match self.max_fee_cap {
            Some(cap) => quote.max_fee_per_gas.min(cap),
            None => quote.max_fee_per_gas,
        };
        GasParams::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas: quote.max_priority_fee_per_gas.min(max_fee_per_gas),
            base_fee: quote.base_fee_per_gas,
        }
    }
}

#[async_trait]
impl GasStrategy for GasStationStrategy {
    async fn fetch_params(&self) -> Result<GasParams> {
        let quote = self.client.fast_quote().await?;
        let params = self.params_from_quote(quote);
        debug!(
            max_fee_gwei = params.effective_gas_price() / super::GWEI,
            source = self.client.url(),
            "Gas station quote"
        );
        Ok(params)
    }

    fn strategy_name(&self) -> &'static str {
        "GasStation"
    }
}
