//! Contract bindings used by the wallet.
//!
//! - [`common`]: ERC20
//! - [`aave_v3`]: Pool, AaveOracle, AaveProtocolDataProvider

pub mod aave_v3;
pub mod common;

pub use aave_v3::{EModeCategoryData, IAaveOracle, IPool, IPoolDataProvider, TokenData};
pub use common::IERC20;
