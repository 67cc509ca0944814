//! Wallet manager: credentials, balances and transfers.

use crate::config::WalletConfig;
use alloy::network::TransactionBuilder;
use alloy::primitives::Address;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use wallet_api::GasStationClient;
use wallet_chain::units::{format_amount, parse_address, parse_amount, NATIVE_DECIMALS};
use wallet_chain::{
    ChainClient, ConfirmationPolicy, ConfirmedTx, ExecutionMode, GasStationStrategy, GasStrategy, LegacyGasStrategy,
    NonceRegistry, Result, TokenManager, TransactionSender, TransactionSenderBuilder, TxOutcome,
};

/// Gas limit of a plain native transfer.
pub const NATIVE_TRANSFER_GAS_LIMIT: u64 = 100_000;

/// Native and reference token balances of one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Balances {
    pub native: String,
    pub token: String,
}

/// Loads wallets and moves the native asset and the reference token.
#[derive(Debug, Clone)]
pub struct WalletManager {
    client: Arc<dyn ChainClient>,
    chain_id: u64,
    token: TokenManager,
    native_gas: Arc<dyn GasStrategy>,
    nonces: Arc<NonceRegistry>,
    policy: ConfirmationPolicy,
}

impl WalletManager {
    /// Create a manager.
    ///
    /// `token_gas` prices reference-token transfers; `native_gas` prices
    /// native transfers.
    pub fn new(
        config: &WalletConfig,
        client: Arc<dyn ChainClient>,
        token_gas: Arc<dyn GasStrategy>,
        native_gas: Arc<dyn GasStrategy>,
    ) -> Self {
        let token = TokenManager::new(config.market.reference_token, client.clone(), token_gas);
        Self {
            client,
            chain_id: config.network.chain_id,
            token,
            native_gas,
            nonces: Arc::new(NonceRegistry::new()),
            policy: config.confirmation.policy(),
        }
    }

    /// Gas station pricing for tokens, capped node gas price for native sends.
    pub fn from_config(config: &WalletConfig, client: Arc<dyn ChainClient>) -> Self {
        let mut station = GasStationStrategy::new(GasStationClient::new(config.gas.oracle_url.clone()));
        if let Some(cap) = config.gas.max_fee_cap_wei() {
            station = station.with_max_fee_cap(cap);
        }
        let legacy = LegacyGasStrategy::new(client.clone(), config.gas.max_legacy_gas_price_wei());
        Self::new(config, client, Arc::new(station), Arc::new(legacy))
    }

    /// Share nonce sequencers with other managers.
    pub fn with_nonces(mut self, nonces: Arc<NonceRegistry>) -> Self {
        self.nonces = nonces;
        self
    }

    pub fn load_wallet_from_mnemonic(phrase: &str) -> Result<PrivateKeySigner> {
        wallet_chain::load_wallet_from_mnemonic(phrase)
    }

    pub fn load_wallet_from_private_key(private_key: &str) -> Result<PrivateKeySigner> {
        wallet_chain::load_wallet_from_private_key(private_key)
    }

    /// New random wallet: the mnemonic phrase and its first account.
    pub fn create_wallet() -> Result<(String, PrivateKeySigner)> {
        let (phrase, signer) = wallet_chain::create_wallet()?;
        info!(address = %signer.address(), "Wallet created");
        Ok((phrase, signer))
    }

    /// Transaction sender for `signer`, sharing this manager's nonce registry.
    pub fn sender_for(&self, signer: PrivateKeySigner) -> TransactionSender {
        TransactionSenderBuilder::new(self.client.clone(), self.chain_id)
            .nonces(self.nonces.clone())
            .policy(self.policy)
            .build(signer)
    }

    pub fn reference_token(&self) -> &TokenManager {
        &self.token
    }

    pub fn nonces(&self) -> &Arc<NonceRegistry> {
        &self.nonces
    }

    /// Transfer `amount` of the reference token and wait for confirmation.
    pub async fn send_token(&self, private_key: &str, to: &str, amount: &str) -> Result<TxOutcome> {
        let sender = self.sender_for(Self::load_wallet_from_private_key(private_key)?);
        let to = parse_address(to)?;
        self.token.transfer(&sender, to, amount, ExecutionMode::Execute).await
    }

    /// Transfer `amount` of the native asset and wait for confirmation.
    pub async fn send_native(&self, private_key: &str, to: &str, amount: &str) -> Result<ConfirmedTx> {
        let sender = self.sender_for(Self::load_wallet_from_private_key(private_key)?);
        let to = parse_address(to)?;
        let value = parse_amount(amount, NATIVE_DECIMALS)?;

        let tx = TransactionRequest::default()
            .with_to(to)
            .with_value(value)
            .with_gas_limit(NATIVE_TRANSFER_GAS_LIMIT);
        let confirmed = sender
            .send_and_confirm(tx, self.native_gas.as_ref(), "native transfer")
            .await?;

        info!(
            from = %sender.address,
            to = %to,
            amount = amount,
            tx_hash = %confirmed.tx_hash,
            "Native transfer confirmed"
        );
        Ok(confirmed)
    }

    /// Native and reference token balances, read concurrently.
    pub async fn balances(&self, address: Address) -> Result<Balances> {
        let (native, token) = tokio::try_join!(self.client.balance(address), self.token.balance_of(address))?;
        Ok(Balances {
            native: format_amount(native, NATIVE_DECIMALS),
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use alloy::sol_types::{SolCall, SolValue};
    use wallet_chain::contracts::IERC20;
    use wallet_chain::mock::{MockChainClient, MockGasStrategy, ReceiptMode};
    use wallet_chain::{GasParams, WalletError, GWEI};

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const RECIPIENT: &str = "0x000000000000000000000000000000000000dEaD";

    fn chain(config: &WalletConfig) -> MockChainClient {
        let token = config.market.reference_token;
        MockChainClient::new(137)
            .with_pending_count(5)
            .with_call(token, IERC20::decimalsCall::SELECTOR, (U256::from(6u64),).abi_encode_params())
            .with_call(
                token,
                IERC20::balanceOfCall::SELECTOR,
                (U256::from(42_000_000u64),).abi_encode_params(),
            )
    }

    fn manager(client: Arc<MockChainClient>, token_gas: MockGasStrategy) -> WalletManager {
        let native_gas = MockGasStrategy::ok(GasParams::Legacy { gas_price: 35 * GWEI });
        WalletManager::new(&WalletConfig::default(), client, Arc::new(token_gas), Arc::new(native_gas))
    }

    fn station_gas() -> MockGasStrategy {
        MockGasStrategy::ok(GasParams::Eip1559 {
            max_fee_per_gas: 60 * GWEI,
            max_priority_fee_per_gas: 40 * GWEI,
            base_fee: None,
        })
    }

    #[tokio::test]
    async fn test_balances() {
        let config = WalletConfig::default();
        let owner = Address::repeat_byte(0x33);
        let client = Arc::new(chain(&config).with_balance(owner, U256::from(1_250_000_000_000_000_000u64)));
        let wallets = manager(client, station_gas());

        let balances = wallets.balances(owner).await.unwrap();
        assert_eq!(balances.native, "1.25");
        assert_eq!(balances.token, "42");
    }

    #[tokio::test]
    async fn test_balances_fail_as_a_whole() {
        // Token contract not reachable
        let client = Arc::new(MockChainClient::new(137));
        let wallets = manager(client, station_gas());
        let err = wallets.balances(Address::ZERO).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_send_native() {
        let config = WalletConfig::default();
        let client = Arc::new(chain(&config));
        let wallets = manager(client.clone(), station_gas());

        let confirmed = wallets.send_native(DEV_KEY, RECIPIENT, "0.5").await.unwrap();
        assert_eq!(confirmed.nonce, 5);

        let sent = client.sent_transactions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].value, Some(U256::from(500_000_000_000_000_000u64)));
        assert_eq!(sent[0].gas, Some(NATIVE_TRANSFER_GAS_LIMIT));
        assert_eq!(sent[0].gas_price, Some(35 * GWEI));
        assert_eq!(sent[0].nonce, Some(5));
    }

    #[tokio::test]
    async fn test_send_token() {
        let config = WalletConfig::default();
        let client = Arc::new(chain(&config));
        let wallets = manager(client.clone(), station_gas());

        let outcome = wallets.send_token(DEV_KEY, RECIPIENT, "12.5").await.unwrap();
        assert!(matches!(outcome, TxOutcome::Confirmed(_)));

        let sent = client.sent_transactions();
        assert_eq!(sent[0].to, Some(config.market.reference_token.into()));
        assert_eq!(sent[0].max_fee_per_gas, Some(60 * GWEI));
        let input = sent[0].input.input().cloned().unwrap();
        let call = IERC20::transferCall::abi_decode(&input, true).unwrap();
        assert_eq!(call.amount, U256::from(12_500_000u64));
    }

    #[tokio::test]
    async fn test_gas_oracle_failure_sends_nothing() {
        let config = WalletConfig::default();
        let client = Arc::new(chain(&config));
        let wallets = manager(client.clone(), MockGasStrategy::failing());

        let err = wallets.send_token(DEV_KEY, RECIPIENT, "1").await.unwrap_err();
        assert!(matches!(err, WalletError::GasOracle(_)));
        assert!(client.sent_transactions().is_empty());

        let sender = wallets.sender_for(WalletManager::load_wallet_from_private_key(DEV_KEY).unwrap());
        assert_eq!(sender.nonce_manager().current().await, None);
    }

    #[tokio::test]
    async fn test_bad_input() {
        let config = WalletConfig::default();
        let client = Arc::new(chain(&config));
        let wallets = manager(client.clone(), station_gas());

        let err = wallets.send_native(DEV_KEY, "0xnothex", "1").await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidAddress(_)));

        let err = wallets.send_native("0xdeadbeef", RECIPIENT, "1").await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidCredential(_)));

        let err = wallets.send_native(DEV_KEY, RECIPIENT, "-1").await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount { .. }));
        assert!(client.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_reverted_transfer_reports_hash() {
        let config = WalletConfig::default();
        let client = Arc::new(chain(&config).with_receipts(ReceiptMode::Reverted));
        let wallets = manager(client, station_gas());

        let err = wallets.send_token(DEV_KEY, RECIPIENT, "1").await.unwrap_err();
        assert!(err.tx_hash().is_some());
    }

    #[test]
    fn test_create_wallet() {
        let (phrase, signer) = WalletManager::create_wallet().unwrap();
        let restored = WalletManager::load_wallet_from_mnemonic(&phrase).unwrap();
        assert_eq!(restored.address(), signer.address());
    }
}
