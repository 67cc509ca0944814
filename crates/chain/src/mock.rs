//! In-memory chain, gas oracle and pool data for tests.
//!
//! Enabled inside this crate's tests and, for downstream crates, through
//! the `mock` feature.

use crate::client::{ChainClient, NodeFeeData, ReceiptInfo};
use crate::error::{Result, WalletError};
use crate::gas::{GasParams, GasStrategy};
use crate::protocol::{AccountData, EModeCategory, PoolDataSource, ReserveConfiguration, ReservesSnapshot, UserReserve};
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use wallet_api::GasStationError;

/// What [`MockChainClient::transaction_receipt`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptMode {
    /// Mined and successful in [`MockChainClient::DEFAULT_BLOCK`].
    Success,
    /// Mined and reverted.
    Reverted,
    /// Never mined.
    Never,
    /// Every poll fails with a network error.
    Failing,
}

#[derive(Debug)]
struct ChainState {
    block_number: u64,
    pending_count: u64,
    gas_price: u128,
    fee_data: NodeFeeData,
    gas_estimate: u64,
    balances: HashMap<Address, U256>,
    calls: HashMap<(Address, [u8; 4]), Bytes>,
    receipts: ReceiptMode,
    send_error: Option<String>,
    sent: Vec<TransactionRequest>,
}

/// Scriptable [`ChainClient`].
///
/// The pending transaction count stays fixed, so nonces beyond it come
/// from the sender's local sequencer. Contract reads answer by
/// `(target, selector)`.
#[derive(Debug)]
pub struct MockChainClient {
    chain_id: u64,
    state: Mutex<ChainState>,
}

impl MockChainClient {
    pub const DEFAULT_BLOCK: u64 = 1_000;
    pub const DEFAULT_GAS_ESTIMATE: u64 = 65_000;

    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(ChainState {
                block_number: Self::DEFAULT_BLOCK,
                pending_count: 0,
                gas_price: 30_000_000_000,
                fee_data: NodeFeeData {
                    base_fee_per_gas: 30_000_000_000,
                    max_priority_fee_per_gas: 2_000_000_000,
                },
                gas_estimate: Self::DEFAULT_GAS_ESTIMATE,
                balances: HashMap::new(),
                calls: HashMap::new(),
                receipts: ReceiptMode::Success,
                send_error: None,
                sent: Vec::new(),
            }),
        }
    }

    pub fn with_pending_count(self, count: u64) -> Self {
        self.state.lock().pending_count = count;
        self
    }

    pub fn with_gas_price(self, gas_price: u128) -> Self {
        self.state.lock().gas_price = gas_price;
        self
    }

    pub fn with_fee_data(self, base_fee_per_gas: u128, max_priority_fee_per_gas: u128) -> Self {
        self.state.lock().fee_data = NodeFeeData {
            base_fee_per_gas,
            max_priority_fee_per_gas,
        };
        self
    }

    pub fn with_gas_estimate(self, gas: u64) -> Self {
        self.state.lock().gas_estimate = gas;
        self
    }

    pub fn with_balance(self, owner: Address, balance: U256) -> Self {
        self.state.lock().balances.insert(owner, balance);
        self
    }

    /// Answer `eth_call` to `to` with `selector` by `output`.
    pub fn with_call(self, to: Address, selector: [u8; 4], output: impl Into<Bytes>) -> Self {
        self.state.lock().calls.insert((to, selector), output.into());
        self
    }

    pub fn with_receipts(self, mode: ReceiptMode) -> Self {
        self.state.lock().receipts = mode;
        self
    }

    pub fn set_block_number(&self, block: u64) {
        self.state.lock().block_number = block;
    }

    /// Make every following broadcast fail with `message`.
    pub fn fail_sends(&self, message: &str) {
        self.state.lock().send_error = Some(message.to_string());
    }

    /// Transactions broadcast so far, in order.
    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        self.state.lock().sent.clone()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.state.lock().block_number)
    }

    async fn balance(&self, owner: Address) -> Result<U256> {
        Ok(self.state.lock().balances.get(&owner).copied().unwrap_or_default())
    }

    async fn transaction_count(&self, _owner: Address) -> Result<u64> {
        Ok(self.state.lock().pending_count)
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(self.state.lock().gas_price)
    }

    async fn fee_data(&self) -> Result<NodeFeeData> {
        Ok(self.state.lock().fee_data)
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes> {
        let to = tx.to.and_then(|kind| kind.to().copied()).unwrap_or_default();
        let input = tx.input.input().cloned().unwrap_or_default();
        let selector: [u8; 4] = input
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| WalletError::network("eth_call", "calldata shorter than a selector"))?;

        self.state
            .lock()
            .calls
            .get(&(to, selector))
            .cloned()
            .ok_or_else(|| WalletError::network("eth_call", format!("no response for {to} 0x{}", alloy::hex::encode(selector))))
    }

    async fn estimate_gas(&self, _tx: TransactionRequest) -> Result<u64> {
        Ok(self.state.lock().gas_estimate)
    }

    async fn send_transaction(&self, _wallet: &EthereumWallet, tx: TransactionRequest) -> Result<B256> {
        let mut state = self.state.lock();
        if let Some(message) = &state.send_error {
            return Err(WalletError::from_rpc("eth_sendRawTransaction", message));
        }
        let mut hash = [0u8; 32];
        hash[24..].copy_from_slice(&tx.nonce.unwrap_or_default().to_be_bytes());
        hash[0] = 0xaa;
        state.sent.push(tx);
        Ok(B256::from(hash))
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<ReceiptInfo>> {
        let mode = self.state.lock().receipts;
        match mode {
            ReceiptMode::Never => Ok(None),
            ReceiptMode::Failing => Err(WalletError::network("eth_getTransactionReceipt", "connection reset")),
            ReceiptMode::Success | ReceiptMode::Reverted => Ok(Some(ReceiptInfo {
                tx_hash: hash,
                block_number: Some(Self::DEFAULT_BLOCK),
                gas_used: 21_000,
                status: mode == ReceiptMode::Success,
            })),
        }
    }
}

/// Gas strategy returning fixed params or an oracle failure.
#[derive(Debug)]
pub struct MockGasStrategy {
    params: Option<GasParams>,
    fetches: AtomicUsize,
}

impl MockGasStrategy {
    pub fn ok(params: GasParams) -> Self {
        Self {
            params: Some(params),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Every fetch fails like an unreachable gas station.
    pub fn failing() -> Self {
        Self {
            params: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GasStrategy for MockGasStrategy {
    async fn fetch_params(&self) -> Result<GasParams> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.params.ok_or_else(|| {
            WalletError::GasOracle(GasStationError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            })
        })
    }

    fn strategy_name(&self) -> &'static str {
        "Mock"
    }
}

/// Fixed protocol reads with fetch counters.
#[derive(Debug, Default)]
pub struct MockPoolDataSource {
    pub snapshot: ReservesSnapshot,
    pub user_reserves: Vec<UserReserve>,
    pub account: AccountData,
    pub configurations: HashMap<Address, ReserveConfiguration>,
    pub prices: HashMap<Address, U256>,
    pub emode: Option<EModeCategory>,
    reserve_fetches: AtomicUsize,
    user_fetches: AtomicUsize,
}

impl MockPoolDataSource {
    pub fn new(snapshot: ReservesSnapshot, user_reserves: Vec<UserReserve>) -> Self {
        Self {
            snapshot,
            user_reserves,
            ..Self::default()
        }
    }

    /// Number of `reserves()` calls so far.
    pub fn reserve_fetches(&self) -> usize {
        self.reserve_fetches.load(Ordering::SeqCst)
    }

    /// Number of `user_reserves()` calls so far.
    pub fn user_fetches(&self) -> usize {
        self.user_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PoolDataSource for MockPoolDataSource {
    async fn reserves(&self) -> Result<ReservesSnapshot> {
        self.reserve_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.clone())
    }

    async fn user_reserves(&self, _user: Address) -> Result<Vec<UserReserve>> {
        self.user_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.user_reserves.clone())
    }

    async fn reserve_configuration(&self, asset: Address) -> Result<ReserveConfiguration> {
        self.configurations
            .get(&asset)
            .copied()
            .ok_or_else(|| WalletError::network("getReserveConfigurationData", format!("unknown reserve {asset}")))
    }

    async fn asset_prices(&self, assets: &[Address]) -> Result<Vec<U256>> {
        Ok(assets
            .iter()
            .map(|a| self.prices.get(a).copied().unwrap_or_default())
            .collect())
    }

    async fn account_data(&self, _user: Address) -> Result<AccountData> {
        Ok(self.account)
    }

    async fn user_emode(&self, _user: Address) -> Result<Option<EModeCategory>> {
        Ok(self.emode.clone())
    }
}
