//! Wallet configuration.
//!
//! This module provides:
//! - Network settings (chain id, RPC endpoint, native symbol)
//! - Gas settings (gas station URL, caps, node fee multiplier)
//! - Lending market contract addresses and the reference token
//! - Confirmation policy
//!
//! Defaults target the Aave V3 market on Polygon PoS. Values can be
//! overridden from a TOML file; `${VAR}` in URLs expands from the
//! environment.

mod loader;
mod wallet;

pub use loader::{expand_env, CONFIG_ENV_VAR};
pub use wallet::{ConfirmationConfig, GasConfig, MarketConfig, NetworkConfig, WalletConfig};
