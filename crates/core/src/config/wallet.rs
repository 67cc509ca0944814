//! Wallet configuration types and their defaults.

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use wallet_api::DEFAULT_GAS_STATION_URL;
use wallet_chain::{ConfirmationPolicy, MarketAddresses, GWEI};

/// Complete wallet configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
}

/// Chain connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// HTTP JSON-RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Native token symbol (e.g., "ETH", "MATIC")
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
}

fn default_chain_id() -> u64 {
    137
}

fn default_rpc_url() -> String {
    "https://polygon-bor-rpc.publicnode.com".to_string()
}

fn default_native_symbol() -> String {
    "MATIC".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            rpc_url: default_rpc_url(),
            native_symbol: default_native_symbol(),
        }
    }
}

/// Gas pricing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasConfig {
    /// Gas station endpoint for token and lending transactions
    #[serde(default = "default_oracle_url")]
    pub oracle_url: String,
    /// Upper bound on max_fee_per_gas (in gwei); unbounded when unset
    #[serde(default)]
    pub max_fee_cap_gwei: Option<f64>,
    /// max_fee = base_fee * multiplier + priority_fee for node-based quotes
    #[serde(default = "default_node_fee_multiplier")]
    pub node_fee_multiplier: f64,
    /// Priority fee when the node suggests none (in gwei)
    #[serde(default = "default_priority_fee")]
    pub default_priority_fee_gwei: f64,
    /// Upper bound on the legacy gas price for native transfers (in gwei)
    #[serde(default = "default_max_legacy_gas_price")]
    pub max_legacy_gas_price_gwei: f64,
}

fn default_oracle_url() -> String {
    DEFAULT_GAS_STATION_URL.to_string()
}

fn default_node_fee_multiplier() -> f64 {
    2.0
}

fn default_priority_fee() -> f64 {
    30.0
}

fn default_max_legacy_gas_price() -> f64 {
    1_000.0
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            oracle_url: default_oracle_url(),
            max_fee_cap_gwei: None,
            node_fee_multiplier: default_node_fee_multiplier(),
            default_priority_fee_gwei: default_priority_fee(),
            max_legacy_gas_price_gwei: default_max_legacy_gas_price(),
        }
    }
}

impl GasConfig {
    pub fn max_fee_cap_wei(&self) -> Option<u128> {
        self.max_fee_cap_gwei.map(gwei_to_wei)
    }

    pub fn default_priority_fee_wei(&self) -> u128 {
        gwei_to_wei(self.default_priority_fee_gwei)
    }

    pub fn max_legacy_gas_price_wei(&self) -> u128 {
        gwei_to_wei(self.max_legacy_gas_price_gwei)
    }
}

fn gwei_to_wei(gwei: f64) -> u128 {
    (gwei.max(0.0) * GWEI as f64) as u128
}

/// Lending market contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Aave V3 Pool
    #[serde(default = "default_pool")]
    pub pool: Address,
    /// AaveOracle
    #[serde(default = "default_oracle")]
    pub oracle: Address,
    /// AaveProtocolDataProvider
    #[serde(default = "default_data_provider")]
    pub data_provider: Address,
    /// ERC20 used by `send-token`, `deposit` and `withdraw`
    #[serde(default = "default_reference_token")]
    pub reference_token: Address,
}

fn default_pool() -> Address {
    address!("794a61358d6845594f94dc1db02a252b5b4814ad")
}

fn default_oracle() -> Address {
    address!("b023e699f5a33916ea823a16485e259257ca8bd1")
}

fn default_data_provider() -> Address {
    address!("69fa688f1dc47d4b5d8029d5a35fb7a548310654")
}

/// USDC (PoS bridged) on Polygon
fn default_reference_token() -> Address {
    address!("2791bca1f2de4661ed88a30c99a7a9449aa84174")
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            pool: default_pool(),
            oracle: default_oracle(),
            data_provider: default_data_provider(),
            reference_token: default_reference_token(),
        }
    }
}

impl MarketConfig {
    pub fn addresses(&self) -> MarketAddresses {
        MarketAddresses {
            pool: self.pool,
            oracle: self.oracle,
            data_provider: self.data_provider,
        }
    }
}

/// Receipt wait settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_poll_errors")]
    pub max_poll_errors: u32,
}

fn default_confirmations() -> u64 {
    1
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_max_poll_errors() -> u32 {
    5
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            confirmations: default_confirmations(),
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_errors: default_max_poll_errors(),
        }
    }
}

impl ConfirmationConfig {
    pub fn policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            confirmations: self.confirmations.max(1),
            timeout: Duration::from_secs(self.timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_poll_errors: self.max_poll_errors.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WalletConfig::default();
        assert_eq!(config.network.chain_id, 137);
        assert_eq!(config.network.native_symbol, "MATIC");
        assert_eq!(config.gas.oracle_url, DEFAULT_GAS_STATION_URL);
        assert_eq!(config.gas.max_fee_cap_wei(), None);
        assert_eq!(config.gas.default_priority_fee_wei(), 30 * GWEI);
        assert_eq!(
            config.market.reference_token,
            "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174".parse::<Address>().unwrap()
        );
    }

    #[test]
    fn test_default_policy() {
        let policy = ConfirmationConfig::default().policy();
        assert_eq!(policy, ConfirmationPolicy::default());
    }

    #[test]
    fn test_market_addresses() {
        let market = MarketConfig::default();
        let addresses = market.addresses();
        assert_eq!(addresses.pool, market.pool);
        assert_eq!(addresses.data_provider, market.data_provider);
    }
}
