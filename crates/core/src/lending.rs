//! Lending manager: Aave V3 pool operations for one signer.
//!
//! Every state-changing call goes through the signer's
//! [`TransactionSender`], so approvals and pool calls share one nonce
//! sequence. Reads go through a [`PoolDataSource`].

use crate::config::WalletConfig;
use crate::summary::{self, AssetPosition, UserSummary};
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use wallet_api::GasStationClient;
use wallet_chain::contracts::aave_v3::{encode_borrow, encode_repay, encode_supply, encode_withdraw};
use wallet_chain::units::{format_amount, NATIVE_DECIMALS};
use wallet_chain::{
    AaveV3DataSource, AccountData, ConfirmedTx, Eip1559GasStrategy, ExecutionMode, GasParams, GasStationStrategy,
    GasStrategy, PoolDataSource, ReserveConfiguration, Result, TokenManager, TransactionSender, TxOutcome, WalletError,
};

/// Amount keyword for the whole position in `withdraw` and `repay`.
pub const MAX_AMOUNT: &str = "max";

/// A pool operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LendingOperation {
    Deposit,
    Withdraw,
    Borrow,
    Repay,
}

impl LendingOperation {
    pub const ALL: [LendingOperation; 4] = [Self::Deposit, Self::Withdraw, Self::Borrow, Self::Repay];

    /// Gas units assumed by [`LendingManager::estimate_transaction_price`].
    pub fn estimated_gas(self) -> u64 {
        match self {
            Self::Deposit | Self::Repay => 300_000,
            Self::Withdraw | Self::Borrow => 600_000,
        }
    }

    /// Gas limit the pool call is submitted with.
    pub fn gas_limit(self) -> u64 {
        match self {
            Self::Deposit | Self::Repay => 1_000_000,
            Self::Withdraw | Self::Borrow => 2_000_000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Borrow => "borrow",
            Self::Repay => "repay",
        }
    }
}

impl fmt::Display for LendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown lending operation `{0}` (expected deposit, withdraw, borrow or repay)")]
pub struct UnknownOperation(String);

impl FromStr for LendingOperation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

/// Upper bound on the fee of one pool operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEstimate {
    pub operation: LendingOperation,
    pub gas_units: u64,
    pub max_fee_per_gas: u128,
    /// `gas_units * max_fee_per_gas`
    pub wei: U256,
    /// `wei` in the native asset, as a decimal string
    pub native: String,
}

/// Aave V3 operations on behalf of one signer.
#[derive(Debug, Clone)]
pub struct LendingManager {
    pool: Address,
    reference_token: Address,
    sender: Arc<TransactionSender>,
    data: Arc<dyn PoolDataSource>,
    /// Prices submitted transactions
    station_gas: Arc<dyn GasStrategy>,
    /// Prices estimates
    fee_gas: Arc<dyn GasStrategy>,
}

impl LendingManager {
    pub fn new(
        config: &WalletConfig,
        sender: Arc<TransactionSender>,
        data: Arc<dyn PoolDataSource>,
        station_gas: Arc<dyn GasStrategy>,
        fee_gas: Arc<dyn GasStrategy>,
    ) -> Self {
        Self {
            pool: config.market.pool,
            reference_token: config.market.reference_token,
            sender,
            data,
            station_gas,
            fee_gas,
        }
    }

    /// Contract reads, gas station and node fee strategies from `config`.
    pub fn from_config(config: &WalletConfig, sender: Arc<TransactionSender>) -> Self {
        let client = sender.client().clone();
        let data = AaveV3DataSource::new(client.clone(), config.market.addresses());

        let mut station = GasStationStrategy::new(GasStationClient::new(config.gas.oracle_url.clone()));
        let mut node = Eip1559GasStrategy::new(client, config.gas.node_fee_multiplier)
            .with_default_priority_fee(config.gas.default_priority_fee_wei());
        if let Some(cap) = config.gas.max_fee_cap_wei() {
            station = station.with_max_fee_cap(cap);
            node = node.with_max_fee_cap(cap);
        }

        Self::new(config, sender, Arc::new(data), Arc::new(station), Arc::new(node))
    }

    /// Address positions are read for and transactions are sent from.
    pub fn user(&self) -> Address {
        self.sender.address
    }

    fn token(&self, asset: Address) -> TokenManager {
        TokenManager::new(asset, self.sender.client().clone(), self.station_gas.clone())
    }

    /// Supply `amount` of the reference token.
    pub async fn deposit(&self, amount: &str) -> Result<ConfirmedTx> {
        let token = self.token(self.reference_token);
        let raw = token.to_base_units(amount).await?;
        let approval = token
            .approve_raw(&self.sender, self.pool, raw, ExecutionMode::Execute)
            .await?;

        let data = encode_supply(self.reference_token, raw, self.user());
        self.submit(LendingOperation::Deposit, self.reference_token, amount, data)
            .await
            .map_err(|err| with_approval(err, LendingOperation::Deposit, &approval))
    }

    /// Withdraw `amount` of the reference token, or everything with `"max"`.
    pub async fn withdraw(&self, amount: &str) -> Result<ConfirmedTx> {
        let raw = self.amount_or_max(self.reference_token, amount).await?;
        let data = encode_withdraw(self.reference_token, raw, self.user());
        self.submit(LendingOperation::Withdraw, self.reference_token, amount, data)
            .await
    }

    /// Borrow `amount` of `asset` at the variable rate.
    pub async fn borrow(&self, asset: Address, amount: &str) -> Result<ConfirmedTx> {
        let raw = self.token(asset).to_base_units(amount).await?;
        let data = encode_borrow(asset, raw, self.user());
        self.submit(LendingOperation::Borrow, asset, amount, data).await
    }

    /// Repay `amount` of variable debt in `asset`, or all of it with `"max"`.
    pub async fn repay(&self, asset: Address, amount: &str) -> Result<ConfirmedTx> {
        let raw = self.amount_or_max(asset, amount).await?;
        let approval = self
            .token(asset)
            .approve_raw(&self.sender, self.pool, raw, ExecutionMode::Execute)
            .await?;

        let data = encode_repay(asset, raw, self.user());
        self.submit(LendingOperation::Repay, asset, amount, data)
            .await
            .map_err(|err| with_approval(err, LendingOperation::Repay, &approval))
    }

    async fn amount_or_max(&self, asset: Address, amount: &str) -> Result<U256> {
        if amount.trim().eq_ignore_ascii_case(MAX_AMOUNT) {
            return Ok(U256::MAX);
        }
        self.token(asset).to_base_units(amount).await
    }

    async fn submit(&self, op: LendingOperation, asset: Address, amount: &str, data: Bytes) -> Result<ConfirmedTx> {
        let tx = TransactionRequest::default()
            .with_to(self.pool)
            .with_input(data)
            .with_gas_limit(op.gas_limit());

        let confirmed = self
            .sender
            .send_and_confirm(tx, self.station_gas.as_ref(), op.as_str())
            .await?;
        info!(
            operation = %op,
            asset = %asset,
            amount = amount,
            tx_hash = %confirmed.tx_hash,
            block = confirmed.block_number,
            gas_used = confirmed.gas_used,
            "Pool operation confirmed"
        );
        Ok(confirmed)
    }

    /// Fetch reserves and the user's positions and summarize them.
    pub async fn user_account_data(&self) -> Result<UserSummary> {
        let user = self.user();
        let (snapshot, positions, emode) = tokio::try_join!(
            self.data.reserves(),
            self.data.user_reserves(user),
            self.data.user_emode(user)
        )?;
        let summary = summary::format_user_summary(&snapshot, &positions, emode.as_ref(), chrono::Utc::now().timestamp());
        debug!(
            user = %user,
            reserves = summary.user_reserves.len(),
            emode_category = summary.user_emode_category_id,
            health_factor = ?summary.health_factor,
            "Account summary"
        );
        Ok(summary)
    }

    pub async fn borrowed_assets(&self) -> Result<Vec<AssetPosition>> {
        Ok(summary::borrowed_assets(&self.user_account_data().await?))
    }

    pub async fn collateral_assets(&self) -> Result<Vec<AssetPosition>> {
        Ok(summary::collateral_assets(&self.user_account_data().await?))
    }

    /// Borrowing headroom in market reference currency; negative when
    /// over-borrowed.
    pub async fn can_be_borrowed(&self) -> Result<f64> {
        Ok(summary::can_be_borrowed(&self.user_account_data().await?))
    }

    /// Fee bound of `op` at the node's current max fee per gas.
    pub async fn estimate_transaction_price(&self, op: LendingOperation) -> Result<PriceEstimate> {
        let max_fee_per_gas = match self.fee_gas.fetch_params().await? {
            GasParams::Eip1559 { max_fee_per_gas, .. } => max_fee_per_gas,
            GasParams::Legacy { gas_price } => gas_price,
        };
        let gas_units = op.estimated_gas();
        let wei = U256::from(gas_units) * U256::from(max_fee_per_gas);

        Ok(PriceEstimate {
            operation: op,
            gas_units,
            max_fee_per_gas,
            wei,
            native: format_amount(wei, NATIVE_DECIMALS),
        })
    }

    pub async fn reserve_configuration(&self, asset: Address) -> Result<ReserveConfiguration> {
        self.data.reserve_configuration(asset).await
    }

    /// Oracle prices in market reference currency units, in `assets` order.
    pub async fn asset_prices(&self, assets: &[Address]) -> Result<Vec<U256>> {
        self.data.asset_prices(assets).await
    }

    /// The pool's own account totals for the user.
    pub async fn pool_account_data(&self) -> Result<AccountData> {
        self.data.account_data(self.user()).await
    }
}

/// The approval stays in the mempool when the pool call fails, so the
/// caller needs its hash to track or replace it.
fn with_approval(err: WalletError, op: LendingOperation, approval: &TxOutcome) -> WalletError {
    match approval {
        TxOutcome::Pending(pending) => {
            warn!(
                operation = %op,
                approval_tx_hash = %pending.tx_hash,
                approval_nonce = pending.nonce,
                error = %err,
                "Pool call failed after approval was submitted"
            );
            err.after_approval(pending.tx_hash, pending.nonce)
        }
        _ => err,
    }
}
