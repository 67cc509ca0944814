//! Gas pricing strategies.
//!
//! Every transaction is priced from a fresh quote; nothing is cached.
//!
//! - [`GasStationStrategy`]: EIP-1559 quote from the external gas station
//!   (token transfers, approvals and lending operations)
//! - [`Eip1559GasStrategy`]: node fee data, `max_fee = base * multiplier + tip`
//!   (transaction price estimates)
//! - [`LegacyGasStrategy`]: node `eth_gasPrice` (native transfers)
//!
//! # Example
//!
//! ```rust,ignore
//! use wallet_chain::gas::{GasStrategy, GasStationStrategy};
//!
//! let strategy = GasStationStrategy::new(GasStationClient::default());
//! let params = strategy.fetch_params().await?;
//! strategy.apply_gas(&mut tx, &params);
//! ```

mod eip1559;
mod legacy;
mod station;

pub use eip1559::Eip1559GasStrategy;
pub use legacy::LegacyGasStrategy;
pub use station::GasStationStrategy;

use crate::error::Result;
use alloy::network::TransactionBuilder;
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::fmt::Debug;

/// Wei per gwei.
pub const GWEI: u128 = 1_000_000_000;

/// Gas parameters for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasParams {
    /// Legacy gas pricing (pre-EIP-1559).
    Legacy {
        /// Gas price in wei.
        gas_price: u128,
    },
    /// EIP-1559 gas pricing.
    Eip1559 {
        /// Maximum fee per gas in wei.
        max_fee_per_gas: u128,
        /// Maximum priority fee per gas in wei.
        max_priority_fee_per_gas: u128,
        /// Base fee the quote was derived from, when known.
        base_fee: Option<u128>,
    },
}

impl GasParams {
    /// Upper bound of the price paid per gas unit.
    pub fn effective_gas_price(&self) -> u128 {
        match self {
            GasParams::Legacy { gas_price } => *gas_price,
            GasParams::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

/// Source of gas prices for outgoing transactions.
#[async_trait]
pub trait GasStrategy: Send + Sync + Debug {
    /// Fetch current gas parameters.
    ///
    /// Called once per transaction, before the nonce is reserved, so a
    /// failure here leaves nothing signed or sent.
    async fn fetch_params(&self) -> Result<GasParams>;

    /// Apply gas parameters to a transaction request.
    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams) {
        match params {
            GasParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                ..
            } => {
                tx.set_max_fee_per_gas(*max_fee_per_gas);
                tx.set_max_priority_fee_per_gas(*max_priority_fee_per_gas);
            }
            GasParams::Legacy { gas_price } => {
                tx.set_gas_price(*gas_price);
            }
        }
    }

    /// Get the strategy name for logging/debugging.
    fn strategy_name(&self) -> &'static str;
}
