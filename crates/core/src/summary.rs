//! Position summary over raw market reads.
//!
//! Everything here is pure: the lending manager fetches one
//! [`ReservesSnapshot`] and the user's [`UserReserve`]s, and these functions
//! turn them into display values. Values are `f64` in whole tokens or
//! whole market reference currency units.

use alloy::primitives::{Address, U256};
use serde::Serialize;
use wallet_chain::units::{bps_to_f64, market_reference_value, ray_rate_to_apy, to_f64};
use wallet_chain::{EModeCategory, ReserveData, ReservesSnapshot, UserReserve};

/// The user's position in one reserve.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReserveSummary {
    pub symbol: String,
    pub underlying_asset: Address,
    pub decimals: u8,
    /// Supplied amount, in tokens
    pub underlying_balance: f64,
    pub underlying_balance_market_reference_currency: f64,
    pub underlying_balance_usd: f64,
    pub variable_borrows: f64,
    pub stable_borrows: f64,
    /// Borrowed amount, in tokens
    pub total_borrows: f64,
    pub total_borrows_market_reference_currency: f64,
    pub total_borrows_usd: f64,
    /// Counted as collateral (user flag and reserve allows it)
    pub usage_as_collateral_enabled: bool,
    pub supply_apy: f64,
    pub variable_borrow_apy: f64,
}

/// Account-level view of the user's positions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// Unix time the summary was computed for
    pub timestamp: i64,
    pub market_reference_currency_decimals: u8,
    pub market_reference_price_in_usd: f64,
    pub total_liquidity_market_reference_currency: f64,
    pub total_liquidity_usd: f64,
    pub total_collateral_market_reference_currency: f64,
    pub total_collateral_usd: f64,
    pub total_borrows_market_reference_currency: f64,
    pub total_borrows_usd: f64,
    pub available_borrows_market_reference_currency: f64,
    pub available_borrows_usd: f64,
    /// Collateral-weighted loan-to-value (0.8 = 80%)
    pub current_loan_to_value: f64,
    /// Collateral-weighted liquidation threshold
    pub current_liquidation_threshold: f64,
    /// `None` without debt
    pub health_factor: Option<f64>,
    /// Efficiency mode category, 0 outside e-mode
    pub user_emode_category_id: u8,
    pub user_reserves: Vec<UserReserveSummary>,
}

/// One supplied or borrowed asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPosition {
    pub symbol: String,
    pub address: Address,
    /// Amount in tokens
    pub value: f64,
    pub market_reference_currency_value: f64,
}

/// Combine reserves and user positions into a [`UserSummary`].
///
/// Positions in reserves missing from `snapshot` and empty positions are
/// skipped. Collateral in the user's e-mode category is weighted with the
/// category's LTV and liquidation threshold.
pub fn format_user_summary(
    snapshot: &ReservesSnapshot,
    user_reserves: &[UserReserve],
    emode: Option<&EModeCategory>,
    timestamp: i64,
) -> UserSummary {
    let base = snapshot.base_currency;
    let mut rows = Vec::new();
    let mut weighted_ltv = 0.0;
    let mut weighted_threshold = 0.0;

    for position in user_reserves.iter().filter(|p| !p.is_empty()) {
        let Some(reserve) = snapshot.reserve(position.underlying) else {
            continue;
        };
        let row = reserve_summary(reserve, position, base.decimals, base.price_in_usd);
        if row.usage_as_collateral_enabled {
            let value = row.underlying_balance_market_reference_currency;
            let (ltv_bps, threshold_bps) = match emode {
                Some(category) if category.covers(&reserve.config) => {
                    (category.ltv_bps, category.liquidation_threshold_bps)
                }
                _ => (reserve.config.ltv_bps, reserve.config.liquidation_threshold_bps),
            };
            weighted_ltv += value * bps_to_f64(ltv_bps);
            weighted_threshold += value * bps_to_f64(threshold_bps);
        }
        rows.push(row);
    }

    let total_liquidity: f64 = rows.iter().map(|r| r.underlying_balance_market_reference_currency).sum();
    let total_collateral: f64 = rows
        .iter()
        .filter(|r| r.usage_as_collateral_enabled)
        .map(|r| r.underlying_balance_market_reference_currency)
        .sum();
    let total_borrows: f64 = rows.iter().map(|r| r.total_borrows_market_reference_currency).sum();

    let (ltv, threshold) = if total_collateral > 0.0 {
        (weighted_ltv / total_collateral, weighted_threshold / total_collateral)
    } else {
        (0.0, 0.0)
    };
    let health_factor = (total_borrows > 0.0).then(|| total_collateral * threshold / total_borrows);
    let available_borrows = (total_collateral * ltv - total_borrows).max(0.0);

    UserSummary {
        timestamp,
        market_reference_currency_decimals: base.decimals,
        market_reference_price_in_usd: base.price_in_usd,
        total_liquidity_market_reference_currency: total_liquidity,
        total_liquidity_usd: total_liquidity * base.price_in_usd,
        total_collateral_market_reference_currency: total_collateral,
        total_collateral_usd: total_collateral * base.price_in_usd,
        total_borrows_market_reference_currency: total_borrows,
        total_borrows_usd: total_borrows * base.price_in_usd,
        available_borrows_market_reference_currency: available_borrows,
        available_borrows_usd: available_borrows * base.price_in_usd,
        current_loan_to_value: ltv,
        current_liquidation_threshold: threshold,
        health_factor,
        user_emode_category_id: emode.map_or(0, |category| category.id),
        user_reserves: rows,
    }
}

fn reserve_summary(reserve: &ReserveData, position: &UserReserve, base_decimals: u8, price_in_usd: f64) -> UserReserveSummary {
    let decimals = reserve.config.decimals;
    let reference = |amount: U256| to_f64(market_reference_value(amount, reserve.price, decimals), base_decimals);

    let supplied_reference = reference(position.supplied);
    let borrowed_reference = reference(position.total_debt());

    UserReserveSummary {
        symbol: reserve.symbol.clone(),
        underlying_asset: reserve.underlying,
        decimals,
        underlying_balance: to_f64(position.supplied, decimals),
        underlying_balance_market_reference_currency: supplied_reference,
        underlying_balance_usd: supplied_reference * price_in_usd,
        variable_borrows: to_f64(position.variable_debt, decimals),
        stable_borrows: to_f64(position.stable_debt, decimals),
        total_borrows: to_f64(position.total_debt(), decimals),
        total_borrows_market_reference_currency: borrowed_reference,
        total_borrows_usd: borrowed_reference * price_in_usd,
        usage_as_collateral_enabled: position.usage_as_collateral_enabled
            && reserve.config.usage_as_collateral_enabled
            && reserve.config.liquidation_threshold_bps > 0,
        supply_apy: ray_rate_to_apy(reserve.liquidity_rate),
        variable_borrow_apy: ray_rate_to_apy(reserve.variable_borrow_rate),
    }
}

/// Reserves the user borrows from.
pub fn borrowed_assets(summary: &UserSummary) -> Vec<AssetPosition> {
    summary
        .user_reserves
        .iter()
        .filter(|r| r.total_borrows > 0.0)
        .map(|r| AssetPosition {
            symbol: r.symbol.clone(),
            address: r.underlying_asset,
            value: r.total_borrows,
            market_reference_currency_value: r.total_borrows_market_reference_currency,
        })
        .collect()
}

/// Supplied reserves counted as collateral.
pub fn collateral_assets(summary: &UserSummary) -> Vec<AssetPosition> {
    summary
        .user_reserves
        .iter()
        .filter(|r| r.usage_as_collateral_enabled && r.underlying_balance > 0.0)
        .map(|r| AssetPosition {
            symbol: r.symbol.clone(),
            address: r.underlying_asset,
            value: r.underlying_balance,
            market_reference_currency_value: r.underlying_balance_market_reference_currency,
        })
        .collect()
}

/// `ltv * collateral - borrowed`, in market reference currency.
///
/// Unlike `available_borrows_*` this is not clamped at zero.
pub fn can_be_borrowed(summary: &UserSummary) -> f64 {
    let borrowed: f64 = borrowed_assets(summary)
        .iter()
        .map(|a| a.market_reference_currency_value)
        .sum();
    let collateral: f64 = collateral_assets(summary)
        .iter()
        .map(|a| a.market_reference_currency_value)
        .sum();
    summary.current_loan_to_value * collateral - borrowed
}
