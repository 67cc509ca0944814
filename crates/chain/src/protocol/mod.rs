//! Protocol read layer.
//!
//! [`PoolDataSource`] is everything the lending manager reads from the
//! market: reserve metadata and rates, oracle prices, and a user's
//! per-reserve positions. Values stay raw (base units, basis points, RAY
//! rates); formatting happens in the summary layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use wallet_chain::protocol::{AaveV3DataSource, PoolDataSource};
//!
//! let source = AaveV3DataSource::new(client, market);
//! let snapshot = source.reserves().await?;
//! let positions = source.user_reserves(user).await?;
//! ```

mod aave_v3;

pub use aave_v3::{AaveV3DataSource, MarketAddresses};

use crate::error::Result;
use crate::units::pow10;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use std::fmt::Debug;

/// Risk parameters of one reserve (data provider `getReserveConfigurationData`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReserveConfiguration {
    pub decimals: u8,
    /// Loan-to-value in basis points (8000 = 80%)
    pub ltv_bps: u16,
    /// Liquidation threshold in basis points
    pub liquidation_threshold_bps: u16,
    /// Liquidation bonus in basis points (10500 = 5% bonus)
    pub liquidation_bonus_bps: u16,
    pub reserve_factor_bps: u16,
    pub usage_as_collateral_enabled: bool,
    pub borrowing_enabled: bool,
    pub stable_borrow_rate_enabled: bool,
    pub is_active: bool,
    pub is_frozen: bool,
    /// Efficiency mode category the reserve belongs to; 0 for none
    pub emode_category: u8,
}

/// An efficiency mode category (Pool `getEModeCategoryData`).
///
/// Users in a category get its LTV and liquidation threshold on every
/// reserve of that category instead of the reserve's own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EModeCategory {
    pub id: u8,
    pub ltv_bps: u16,
    pub liquidation_threshold_bps: u16,
    pub liquidation_bonus_bps: u16,
    pub label: String,
}

impl EModeCategory {
    /// True when `config` belongs to this category.
    pub fn covers(&self, config: &ReserveConfiguration) -> bool {
        self.id != 0 && config.emode_category == self.id
    }
}

/// One market reserve with its current rates and oracle price.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReserveData {
    pub symbol: String,
    /// Underlying token address
    pub underlying: Address,
    pub config: ReserveConfiguration,
    /// Oracle price in base currency units per whole token
    pub price: U256,
    /// Supply APR (RAY)
    pub liquidity_rate: U256,
    /// Variable borrow APR (RAY)
    pub variable_borrow_rate: U256,
    /// Stable borrow APR (RAY)
    pub stable_borrow_rate: U256,
    pub total_supplied: U256,
    pub total_variable_debt: U256,
    pub total_stable_debt: U256,
}

/// Market reference currency of the oracle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseCurrency {
    /// `BASE_CURRENCY_UNIT` (10^decimals)
    pub unit: U256,
    pub decimals: u8,
    /// USD value of one unit of the reference currency.
    pub price_in_usd: f64,
}

impl BaseCurrency {
    /// USD-denominated reference currency with `decimals` decimals.
    pub fn usd(decimals: u8) -> Self {
        Self {
            unit: pow10(decimals),
            decimals,
            price_in_usd: 1.0,
        }
    }
}

impl Default for BaseCurrency {
    fn default() -> Self {
        // Aave V3 markets quote prices in USD with 8 decimals
        Self::usd(8)
    }
}

/// All reserves of the market, read at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReservesSnapshot {
    pub reserves: Vec<ReserveData>,
    pub base_currency: BaseCurrency,
}

impl ReservesSnapshot {
    /// Reserve with the given underlying asset.
    pub fn reserve(&self, underlying: Address) -> Option<&ReserveData> {
        self.reserves.iter().find(|r| r.underlying == underlying)
    }
}

/// A user's position in one reserve (data provider `getUserReserveData`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserReserve {
    pub underlying: Address,
    /// aToken balance, i.e. supplied amount including interest
    pub supplied: U256,
    pub stable_debt: U256,
    pub variable_debt: U256,
    pub usage_as_collateral_enabled: bool,
}

impl UserReserve {
    pub fn total_debt(&self) -> U256 {
        self.stable_debt.saturating_add(self.variable_debt)
    }

    /// True when the user neither supplies nor borrows this reserve.
    pub fn is_empty(&self) -> bool {
        self.supplied.is_zero() && self.total_debt().is_zero()
    }
}

/// Pool `getUserAccountData`, raw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountData {
    /// Base currency units
    pub total_collateral_base: U256,
    pub total_debt_base: U256,
    pub available_borrows_base: U256,
    /// Basis points
    pub current_liquidation_threshold: U256,
    /// Basis points
    pub ltv: U256,
    /// WAD (1e18 = 1.0)
    pub health_factor: U256,
}

/// Read access to a lending market.
#[async_trait]
pub trait PoolDataSource: Send + Sync + Debug {
    /// Every reserve with configuration, rates and price.
    async fn reserves(&self) -> Result<ReservesSnapshot>;

    /// The user's position in every reserve.
    async fn user_reserves(&self, user: Address) -> Result<Vec<UserReserve>>;

    /// Risk parameters of one reserve.
    async fn reserve_configuration(&self, asset: Address) -> Result<ReserveConfiguration>;

    /// Oracle prices, in the order of `assets`.
    async fn asset_prices(&self, assets: &[Address]) -> Result<Vec<U256>>;

    /// Pool-computed account totals.
    async fn account_data(&self, user: Address) -> Result<AccountData>;

    /// The user's efficiency mode category, `None` outside e-mode.
    async fn user_emode(&self, user: Address) -> Result<Option<EModeCategory>>;
}
