//! AAVE V3 read implementation.
//!
//! Reads go to the `AaveProtocolDataProvider`, the `AaveOracle` and the
//! `Pool`. Per-reserve calls run with bounded concurrency and keep the
//! data provider's reserve order.

use super::{
    AccountData, BaseCurrency, EModeCategory, PoolDataSource, ReserveConfiguration, ReserveData, ReservesSnapshot,
    UserReserve,
};
use crate::client::{read_contract, ChainClient};
use crate::contracts::aave_v3::IPoolDataProvider::{self, getReserveConfigurationDataReturn, getReserveDataReturn};
use crate::contracts::{IAaveOracle, IPool, TokenData};
use crate::error::{Result, WalletError};
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of in-flight per-reserve reads.
const DEFAULT_CONCURRENCY: usize = 8;

/// Contract addresses of one Aave V3 market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketAddresses {
    pub pool: Address,
    pub oracle: Address,
    pub data_provider: Address,
}

/// [`PoolDataSource`] over the Aave V3 contracts.
#[derive(Debug, Clone)]
pub struct AaveV3DataSource {
    client: Arc<dyn ChainClient>,
    market: MarketAddresses,
    concurrency: usize,
}

impl AaveV3DataSource {
    pub fn new(client: Arc<dyn ChainClient>, market: MarketAddresses) -> Self {
        Self {
            client,
            market,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Limit in-flight per-reserve reads.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn market(&self) -> &MarketAddresses {
        &self.market
    }

    async fn reserve_tokens(&self) -> Result<Vec<TokenData>> {
        let tokens = read_contract(
            self.client.as_ref(),
            self.market.data_provider,
            IPoolDataProvider::getAllReservesTokensCall {},
        )
        .await?
        ._0;
        debug!(reserves = tokens.len(), "Fetched reserve list");
        Ok(tokens)
    }

    async fn base_currency(&self) -> Result<BaseCurrency> {
        let client = self.client.as_ref();
        let (currency, unit) = tokio::try_join!(
            read_contract(client, self.market.oracle, IAaveOracle::BASE_CURRENCYCall {}),
            read_contract(client, self.market.oracle, IAaveOracle::BASE_CURRENCY_UNITCall {}),
        )?;
        let (currency, unit) = (currency._0, unit._0);

        if currency != Address::ZERO {
            // Non-USD reference currency; no USD feed is read for it
            warn!(base_currency = %currency, "Market reference currency is not USD, assuming parity");
        }

        Ok(BaseCurrency {
            unit,
            decimals: unit_decimals(unit),
            price_in_usd: 1.0,
        })
    }

    async fn reserve_state(&self, asset: Address) -> Result<getReserveDataReturn> {
        read_contract(
            self.client.as_ref(),
            self.market.data_provider,
            IPoolDataProvider::getReserveDataCall { asset },
        )
        .await
    }
}

#[async_trait]
impl PoolDataSource for AaveV3DataSource {
    async fn reserves(&self) -> Result<ReservesSnapshot> {
        let tokens = self.reserve_tokens().await?;
        let assets: Vec<Address> = tokens.iter().map(|t| t.tokenAddress).collect();

        let (base_currency, prices) = tokio::try_join!(self.base_currency(), self.asset_prices(&assets))?;
        if prices.len() != assets.len() {
            return Err(WalletError::Decode {
                what: IAaveOracle::getAssetsPricesCall::SIGNATURE,
                reason: format!("{} prices for {} assets", prices.len(), assets.len()),
            });
        }

        let reserves = stream::iter(tokens.into_iter().zip(prices))
            .map(|(token, price)| async move {
                let asset = token.tokenAddress;
                let (config, state) = tokio::try_join!(self.reserve_configuration(asset), self.reserve_state(asset))?;
                Ok::<_, WalletError>(ReserveData {
                    symbol: token.symbol,
                    underlying: asset,
                    config,
                    price,
                    liquidity_rate: state.liquidityRate,
                    variable_borrow_rate: state.variableBorrowRate,
                    stable_borrow_rate: state.stableBorrowRate,
                    total_supplied: state.totalAToken,
                    total_variable_debt: state.totalVariableDebt,
                    total_stable_debt: state.totalStableDebt,
                })
            })
            .buffered(self.concurrency)
            .try_collect::<Vec<_>>()
            .await?;

        Ok(ReservesSnapshot {
            reserves,
            base_currency,
        })
    }

    async fn user_reserves(&self, user: Address) -> Result<Vec<UserReserve>> {
        let tokens = self.reserve_tokens().await?;
        let client = self.client.as_ref();
        let data_provider = self.market.data_provider;

        let positions = stream::iter(tokens)
            .map(|token| async move {
                let asset = token.tokenAddress;
                let data = read_contract(client, data_provider, IPoolDataProvider::getUserReserveDataCall { asset, user }).await?;
                Ok::<_, WalletError>(UserReserve {
                    underlying: asset,
                    supplied: data.currentATokenBalance,
                    stable_debt: data.currentStableDebt,
                    variable_debt: data.currentVariableDebt,
                    usage_as_collateral_enabled: data.usageAsCollateralEnabled,
                })
            })
            .buffered(self.concurrency)
            .try_collect::<Vec<_>>()
            .await?;

        debug!(
            user = %user,
            active = positions.iter().filter(|p| !p.is_empty()).count(),
            "Fetched user reserves"
        );
        Ok(positions)
    }

    async fn reserve_configuration(&self, asset: Address) -> Result<ReserveConfiguration> {
        let client = self.client.as_ref();
        let data_provider = self.market.data_provider;
        let (data, category) = tokio::try_join!(
            read_contract(client, data_provider, IPoolDataProvider::getReserveConfigurationDataCall { asset }),
            read_contract(client, data_provider, IPoolDataProvider::getReserveEModeCategoryCall { asset }),
        )?;
        let mut config = configuration_from(data);
        config.emode_category = category._0.saturating_to();
        Ok(config)
    }

    async fn asset_prices(&self, assets: &[Address]) -> Result<Vec<U256>> {
        if assets.is_empty() {
            return Ok(Vec::new());
        }
        let prices = read_contract(
            self.client.as_ref(),
            self.market.oracle,
            IAaveOracle::getAssetsPricesCall {
                assets: assets.to_vec(),
            },
        )
        .await?
        ._0;
        Ok(prices)
    }

    async fn account_data(&self, user: Address) -> Result<AccountData> {
        let data = read_contract(self.client.as_ref(), self.market.pool, IPool::getUserAccountDataCall { user }).await?;
        Ok(AccountData {
            total_collateral_base: data.totalCollateralBase,
            total_debt_base: data.totalDebtBase,
            available_borrows_base: data.availableBorrowsBase,
            current_liquidation_threshold: data.currentLiquidationThreshold,
            ltv: data.ltv,
            health_factor: data.healthFactor,
        })
    }

    async fn user_emode(&self, user: Address) -> Result<Option<EModeCategory>> {
        let client = self.client.as_ref();
        let id: u8 = read_contract(client, self.market.pool, IPool::getUserEModeCall { user })
            .await?
            ._0
            .saturating_to();
        if id == 0 {
            return Ok(None);
        }

        let data = read_contract(client, self.market.pool, IPool::getEModeCategoryDataCall { id })
            .await?
            ._0;
        debug!(user = %user, category = id, label = %data.label, "User is in e-mode");
        Ok(Some(EModeCategory {
            id,
            ltv_bps: data.ltv,
            liquidation_threshold_bps: data.liquidationThreshold,
            liquidation_bonus_bps: data.liquidationBonus,
            label: data.label,
        }))
    }
}

fn configuration_from(data: getReserveConfigurationDataReturn) -> ReserveConfiguration {
    ReserveConfiguration {
        decimals: data.decimals.saturating_to(),
        ltv_bps: data.ltv.saturating_to(),
        liquidation_threshold_bps: data.liquidationThreshold.saturating_to(),
        liquidation_bonus_bps: data.liquidationBonus.saturating_to(),
        reserve_factor_bps: data.reserveFactor.saturating_to(),
        usage_as_collateral_enabled: data.usageAsCollateralEnabled,
        borrowing_enabled: data.borrowingEnabled,
        stable_borrow_rate_enabled: data.stableBorrowRateEnabled,
        is_active: data.isActive,
        is_frozen: data.isFrozen,
        emode_category: 0,
    }
}

/// Number of decimals of a power-of-ten unit (10^8 -> 8).
fn unit_decimals(unit: U256) -> u8 {
    let ten = U256::from(10u64);
    let mut value = unit;
    let mut decimals = 0u8;
    while value >= ten && (value % ten).is_zero() {
        value /= ten;
        decimals += 1;
    }
    decimals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChainClient;
    use crate::units::pow10;
    use crate::contracts::EModeCategoryData;
    use alloy::sol_types::SolValue;

    const DATA_PROVIDER: Address = Address::repeat_byte(0xd0);
    const ORACLE: Address = Address::repeat_byte(0x0c);
    const POOL: Address = Address::repeat_byte(0x90);

    fn market() -> MarketAddresses {
        MarketAddresses {
            pool: POOL,
            oracle: ORACLE,
            data_provider: DATA_PROVIDER,
        }
    }

    /// Return data of a call with only static outputs.
    fn words(values: &[U256]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes::<32>()).collect()
    }

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    fn scripted_market() -> MockChainClient {
        let tokens = vec![
            TokenData {
                symbol: "USDC".into(),
                tokenAddress: Address::repeat_byte(0x01),
            },
            TokenData {
                symbol: "WETH".into(),
                tokenAddress: Address::repeat_byte(0x02),
            },
        ];
        let prices = vec![u(100_000_000), u(200_000_000_000)];

        MockChainClient::new(137)
            .with_call(
                DATA_PROVIDER,
                IPoolDataProvider::getAllReservesTokensCall::SELECTOR,
                (tokens,).abi_encode_params(),
            )
            .with_call(ORACLE, IAaveOracle::getAssetsPricesCall::SELECTOR, (prices,).abi_encode_params())
            .with_call(ORACLE, IAaveOracle::BASE_CURRENCYCall::SELECTOR, words(&[U256::ZERO]))
            .with_call(ORACLE, IAaveOracle::BASE_CURRENCY_UNITCall::SELECTOR, words(&[u(100_000_000)]))
            .with_call(
                DATA_PROVIDER,
                IPoolDataProvider::getReserveConfigurationDataCall::SELECTOR,
                // decimals, ltv, threshold, bonus, factor, collateral, borrowing, stable, active, frozen
                words(&[u(6), u(8000), u(8500), u(10500), u(1000), u(1), u(1), u(0), u(1), u(0)]),
            )
            .with_call(
                DATA_PROVIDER,
                IPoolDataProvider::getReserveEModeCategoryCall::SELECTOR,
                words(&[u(1)]),
            )
            .with_call(
                DATA_PROVIDER,
                IPoolDataProvider::getReserveDataCall::SELECTOR,
                words(&[
                    u(0),
                    u(0),
                    u(5_000_000),
                    u(0),
                    u(2_000_000),
                    pow10(25) * u(3),
                    pow10(25) * u(5),
                    u(0),
                    u(0),
                    u(1),
                    u(1),
                    u(1_700_000_000),
                ]),
            )
            .with_call(
                DATA_PROVIDER,
                IPoolDataProvider::getUserReserveDataCall::SELECTOR,
                words(&[u(200_000_000), u(0), u(7), u(0), u(7), u(0), u(0), u(0), u(1)]),
            )
            .with_call(
                POOL,
                IPool::getUserAccountDataCall::SELECTOR,
                words(&[u(200), u(50), u(110), u(8500), u(8000), u(3_400_000_000_000_000_000)]),
            )
    }

    #[test]
    fn test_unit_decimals() {
        assert_eq!(unit_decimals(u(100_000_000)), 8);
        assert_eq!(unit_decimals(u(1_000_000_000_000_000_000)), 18);
        assert_eq!(unit_decimals(u(1)), 0);
    }

    #[tokio::test]
    async fn test_reserves_snapshot() {
        let source = AaveV3DataSource::new(Arc::new(scripted_market()), market());
        let snapshot = source.reserves().await.unwrap();

        assert_eq!(snapshot.base_currency, BaseCurrency::usd(8));
        assert_eq!(snapshot.reserves.len(), 2);

        let usdc = &snapshot.reserves[0];
        assert_eq!(usdc.symbol, "USDC");
        assert_eq!(usdc.price, u(100_000_000));
        assert_eq!(usdc.config.ltv_bps, 8000);
        assert_eq!(usdc.config.decimals, 6);
        assert!(usdc.config.usage_as_collateral_enabled);
        assert!(!usdc.config.is_frozen);
        assert_eq!(usdc.config.emode_category, 1);
        assert_eq!(usdc.total_supplied, u(5_000_000));

        // Order follows the data provider
        assert_eq!(snapshot.reserves[1].symbol, "WETH");
        assert_eq!(snapshot.reserves[1].price, u(200_000_000_000));
    }

    #[tokio::test]
    async fn test_user_reserves() {
        let source = AaveV3DataSource::new(Arc::new(scripted_market()), market()).with_concurrency(1);
        let positions = source.user_reserves(Address::repeat_byte(0x77)).await.unwrap();

        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].underlying, Address::repeat_byte(0x01));
        assert_eq!(positions[0].supplied, u(200_000_000));
        assert_eq!(positions[0].total_debt(), u(7));
        assert!(positions[0].usage_as_collateral_enabled);
    }

    #[tokio::test]
    async fn test_account_data() {
        let source = AaveV3DataSource::new(Arc::new(scripted_market()), market());
        let account = source.account_data(Address::repeat_byte(0x77)).await.unwrap();
        assert_eq!(account.available_borrows_base, u(110));
        assert_eq!(account.ltv, u(8000));
    }

    #[tokio::test]
    async fn test_user_emode() {
        let category = EModeCategoryData {
            ltv: 9300,
            liquidationThreshold: 9500,
            liquidationBonus: 10100,
            priceSource: Address::ZERO,
            label: "Stablecoins".into(),
        };
        let client = scripted_market()
            .with_call(POOL, IPool::getUserEModeCall::SELECTOR, words(&[u(1)]))
            .with_call(
                POOL,
                IPool::getEModeCategoryDataCall::SELECTOR,
                (category,).abi_encode_params(),
            );
        let source = AaveV3DataSource::new(Arc::new(client), market());

        let emode = source.user_emode(Address::repeat_byte(0x77)).await.unwrap().unwrap();
        assert_eq!(emode.id, 1);
        assert_eq!(emode.ltv_bps, 9300);
        assert_eq!(emode.liquidation_threshold_bps, 9500);
        assert_eq!(emode.label, "Stablecoins");
    }

    #[tokio::test]
    async fn test_no_emode_skips_category_read() {
        let client = scripted_market().with_call(POOL, IPool::getUserEModeCall::SELECTOR, words(&[U256::ZERO]));
        let source = AaveV3DataSource::new(Arc::new(client), market());
        assert_eq!(source.user_emode(Address::repeat_byte(0x77)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_price_query_skips_rpc() {
        let source = AaveV3DataSource::new(Arc::new(MockChainClient::new(137)), market());
        assert!(source.asset_prices(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_contract_is_network_error() {
        let source = AaveV3DataSource::new(Arc::new(MockChainClient::new(137)), market());
        let err = source.reserves().await.unwrap_err();
        assert!(err.is_network());
    }
}
