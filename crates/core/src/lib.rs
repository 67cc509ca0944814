//! Wallet core logic.
//!
//! This crate provides the user-facing managers:
//! - [`WalletManager`]: credentials, native and reference token transfers, balances
//! - [`LendingManager`]: Aave V3 supply, borrow, repay, withdraw and position summaries
//! - Position summary math over raw market reads ([`summary`])
//! - TOML configuration with Polygon defaults ([`config`])

pub mod config;
mod lending;
pub mod summary;
mod wallet;

pub use config::{ConfirmationConfig, GasConfig, MarketConfig, NetworkConfig, WalletConfig, CONFIG_ENV_VAR};
pub use lending::{LendingManager, LendingOperation, PriceEstimate, UnknownOperation, MAX_AMOUNT};
pub use summary::{AssetPosition, UserReserveSummary, UserSummary};
pub use wallet::{Balances, WalletManager, NATIVE_TRANSFER_GAS_LIMIT};
