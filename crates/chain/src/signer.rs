//! Credentials, nonce sequencing and transaction submission.
//! Uses Alloy signers; all RPC goes through [`ChainClient`].
//!
//! Submission order for one transaction:
//! 1. fetch gas parameters (a failing oracle aborts here, nothing is reserved)
//! 2. estimate the gas limit if the caller did not fix one
//! 3. reserve the signer's next nonce (held until the node answers)
//! 4. sign and broadcast, then commit or invalidate the nonce

use crate::client::ChainClient;
use crate::error::{Result, WalletError};
use crate::gas::{GasStrategy, GWEI};
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::coins_bip39::{English, Mnemonic};
use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Number of words in a freshly generated mnemonic.
pub const MNEMONIC_WORDS: usize = 12;

/// Parse a hex private key (with or without `0x`).
pub fn load_wallet_from_private_key(private_key: &str) -> Result<PrivateKeySigner> {
    let key_str = private_key.trim().trim_start_matches("0x");
    key_str
        .parse::<PrivateKeySigner>()
        .map_err(|e| WalletError::InvalidCredential(format!("private key: {e}")))
}

/// Derive the first account (m/44'/60'/0'/0/0) of a BIP-39 phrase.
pub fn load_wallet_from_mnemonic(phrase: &str) -> Result<PrivateKeySigner> {
    let phrase = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
    MnemonicBuilder::<English>::default()
        .phrase(phrase)
        .index(0u32)
        .map_err(|e| WalletError::InvalidCredential(format!("derivation path: {e}")))?
        .build()
        .map_err(|e| WalletError::InvalidCredential(format!("mnemonic: {e}")))
}

/// Generate a random wallet. Returns the phrase and its first account.
pub fn create_wallet() -> Result<(String, PrivateKeySigner)> {
    let mut rng = rand::thread_rng();
    let mnemonic = Mnemonic::<English>::new_with_count(&mut rng, MNEMONIC_WORDS)
        .map_err(|e| WalletError::InvalidCredential(format!("mnemonic generation: {e}")))?;
    let phrase = mnemonic.to_phrase();
    let signer = load_wallet_from_mnemonic(&phrase)?;
    Ok((phrase, signer))
}

/// Per-signer nonce sequencer.
///
/// Holds the next nonce to use, or `None` when it must be (re)read from the
/// chain. Reserving returns a [`NonceLease`] that keeps the sequencer locked,
/// so a second submission from the same signer waits until the first one
/// has been accepted or rejected by the node.
#[derive(Debug)]
pub struct NonceManager {
    address: Address,
    next: Mutex<Option<u64>>,
}

impl NonceManager {
    /// Create an unseeded sequencer for `address`.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            next: Mutex::new(None),
        }
    }

    /// Create a sequencer starting at a known nonce.
    pub fn with_nonce(address: Address, nonce: u64) -> Self {
        Self {
            address,
            next: Mutex::new(Some(nonce)),
        }
    }

    /// Address this sequencer belongs to.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Reserve the next nonce, seeding from the pending count if needed.
    pub async fn reserve(&self, client: &dyn ChainClient) -> Result<NonceLease<'_>> {
        let mut guard = self.next.lock().await;
        let nonce = match *guard {
            Some(nonce) => nonce,
            None => {
                let chain_nonce = client.transaction_count(self.address).await?;
                debug!(address = %self.address, nonce = chain_nonce, "Nonce seeded from chain");
                *guard = Some(chain_nonce);
                chain_nonce
            }
        };
        Ok(NonceLease {
            guard,
            nonce,
            committed: false,
        })
    }

    /// Next nonce without reserving it (`None` when unseeded).
    pub async fn current(&self) -> Option<u64> {
        *self.next.lock().await
    }

    /// Move forward to `chain_nonce` if the chain is ahead.
    pub async fn sync(&self, chain_nonce: u64) {
        let mut guard = self.next.lock().await;
        match *guard {
            Some(current) if current >= chain_nonce => {}
            _ => *guard = Some(chain_nonce),
        }
    }

    /// Forget the local value; the next reservation re-reads the chain.
    pub async fn reset(&self) {
        *self.next.lock().await = None;
    }
}

/// A reserved nonce.
///
/// [`commit`](Self::commit) advances the sequencer past it. Dropping the
/// lease without committing invalidates the sequencer instead, since the
/// node's view of the account is then unknown.
#[derive(Debug)]
pub struct NonceLease<'a> {
    guard: MutexGuard<'a, Option<u64>>,
    nonce: u64,
    committed: bool,
}

impl NonceLease<'_> {
    /// The reserved nonce.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Mark the nonce as used by an accepted transaction.
    pub fn commit(mut self) {
        self.committed = true;
    }

    /// Mark the submission as rejected.
    pub fn invalidate(self) {}
}

impl Drop for NonceLease<'_> {
    fn drop(&mut self) {
        *self.guard = if self.committed {
            Some(self.nonce + 1)
        } else {
            None
        };
    }
}

/// Shares one [`NonceManager`] per signer address.
#[derive(Debug, Default)]
pub struct NonceRegistry {
    managers: DashMap<Address, Arc<NonceManager>>,
}

impl NonceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequencer for `address`, created on first use.
    pub fn for_address(&self, address: Address) -> Arc<NonceManager> {
        self.managers
            .entry(address)
            .or_insert_with(|| Arc::new(NonceManager::new(address)))
            .clone()
    }

    /// Number of signers seen so far.
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

/// How long and how often to wait for a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// Blocks required, counting the inclusion block.
    pub confirmations: u64,
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Consecutive receipt-poll failures tolerated before giving up.
    pub max_poll_errors: u32,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            confirmations: 1,
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
            max_poll_errors: 5,
        }
    }
}

/// A transaction accepted by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTx {
    pub tx_hash: B256,
    pub nonce: u64,
}

/// A transaction mined with enough confirmations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedTx {
    pub tx_hash: B256,
    pub nonce: u64,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Builder for [`TransactionSender`].
pub struct TransactionSenderBuilder {
    client: Arc<dyn ChainClient>,
    chain_id: u64,
    nonces: Option<Arc<NonceRegistry>>,
    policy: ConfirmationPolicy,
}

impl TransactionSenderBuilder {
    /// Create a new builder.
    pub fn new(client: Arc<dyn ChainClient>, chain_id: u64) -> Self {
        Self {
            client,
            chain_id,
            nonces: None,
            policy: ConfirmationPolicy::default(),
        }
    }

    /// Share nonce sequencers with other senders.
    pub fn nonces(mut self, registry: Arc<NonceRegistry>) -> Self {
        self.nonces = Some(registry);
        self
    }

    /// Set the confirmation policy.
    pub fn policy(mut self, policy: ConfirmationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the sender for a signer.
    pub fn build(self, signer: PrivateKeySigner) -> TransactionSender {
        let address = signer.address();
        let nonce_manager = match &self.nonces {
            Some(registry) => registry.for_address(address),
            None => Arc::new(NonceManager::new(address)),
        };

        info!(
            address = %address,
            chain_id = self.chain_id,
            confirmations = self.policy.confirmations,
            "Transaction sender initialized"
        );

        TransactionSender {
            client: self.client,
            wallet: EthereumWallet::from(signer),
            address,
            chain_id: self.chain_id,
            nonce_manager,
            policy: self.policy,
        }
    }

    /// Build the sender from a hex private key.
    pub fn build_from_key(self, private_key: &str) -> Result<TransactionSender> {
        let signer = load_wallet_from_private_key(private_key)?;
        Ok(self.build(signer))
    }
}

/// Signs, submits and confirms transactions for one signer.
pub struct TransactionSender {
    client: Arc<dyn ChainClient>,
    wallet: EthereumWallet,
    /// Signer address
    pub address: Address,
    chain_id: u64,
    nonce_manager: Arc<NonceManager>,
    policy: ConfirmationPolicy,
}

impl TransactionSender {
    /// Node this sender submits to.
    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn policy(&self) -> &ConfirmationPolicy {
        &self.policy
    }

    pub fn nonce_manager(&self) -> &Arc<NonceManager> {
        &self.nonce_manager
    }

    /// Price, sequence, sign and broadcast `tx`.
    ///
    /// Returns once the node has accepted the transaction; does not wait for
    /// it to be mined.
    pub async fn send(&self, mut tx: TransactionRequest, gas: &dyn GasStrategy) -> Result<PendingTx> {
        let total_start = Instant::now();

        let gas_params = gas.fetch_params().await?;
        tx.set_from(self.address);
        tx.set_chain_id(self.chain_id);
        gas.apply_gas(&mut tx, &gas_params);

        if tx.gas.is_none() {
            let estimate = self.client.estimate_gas(tx.clone()).await?;
            tx.set_gas_limit(estimate);
        }

        let lease = self.nonce_manager.reserve(self.client.as_ref()).await?;
        let nonce = lease.nonce();
        tx.set_nonce(nonce);

        info!(
            to = ?tx.to,
            nonce = nonce,
            gas_limit = ?tx.gas,
            gas_strategy = gas.strategy_name(),
            gas_price_gwei = gas_params.effective_gas_price() / GWEI,
            "Sending transaction"
        );

        match self.client.send_transaction(&self.wallet, tx).await {
            Ok(tx_hash) => {
                lease.commit();
                info!(
                    tx_hash = %tx_hash,
                    nonce = nonce,
                    submit_ms = total_start.elapsed().as_millis(),
                    "Transaction submitted"
                );
                Ok(PendingTx { tx_hash, nonce })
            }
            Err(e) => {
                lease.invalidate();
                warn!(nonce = nonce, error = %e, "Transaction rejected, nonce will be re-read from chain");
                Err(e)
            }
        }
    }

    /// [`send`](Self::send) and wait for confirmation.
    ///
    /// `operation` names the call in errors (`"supply rejected: ..."`).
    pub async fn send_and_confirm(
        &self,
        tx: TransactionRequest,
        gas: &dyn GasStrategy,
        operation: &str,
    ) -> Result<ConfirmedTx> {
        let pending = self.send(tx, gas).await?;
        self.wait_for_confirmation(pending, operation).await
    }

    /// Poll for the receipt of `pending` under the confirmation policy.
    ///
    /// A reverted receipt is reported as
    /// [`WalletError::InsufficientAllowanceOrBalance`] carrying the hash.
    pub async fn wait_for_confirmation(&self, pending: PendingTx, operation: &str) -> Result<ConfirmedTx> {
        let start = Instant::now();
        let mut poll_errors = 0u32;
        let mut last_error: Option<String> = None;

        loop {
            match self.poll_confirmation(&pending, operation).await {
                Ok(Some(confirmed)) => {
                    info!(
                        tx_hash = %confirmed.tx_hash,
                        block = confirmed.block_number,
                        gas_used = confirmed.gas_used,
                        confirm_ms = start.elapsed().as_millis(),
                        "Transaction confirmed"
                    );
                    return Ok(confirmed);
                }
                Ok(None) => poll_errors = 0,
                Err(e @ WalletError::InsufficientAllowanceOrBalance { .. }) => return Err(e),
                Err(e) => {
                    poll_errors += 1;
                    warn!(tx_hash = %pending.tx_hash, attempt = poll_errors, error = %e, "Receipt poll failed");
                    last_error = Some(e.to_string());
                    if poll_errors >= self.policy.max_poll_errors {
                        return Err(self.timeout(&pending, start, last_error));
                    }
                }
            }

            if start.elapsed() >= self.policy.timeout {
                return Err(self.timeout(&pending, start, last_error));
            }
            tokio::time::sleep(self.policy.poll_interval).await;
        }
    }

    async fn poll_confirmation(&self, pending: &PendingTx, operation: &str) -> Result<Option<ConfirmedTx>> {
        let Some(receipt) = self.client.transaction_receipt(pending.tx_hash).await? else {
            return Ok(None);
        };
        let Some(block_number) = receipt.block_number else {
            return Ok(None);
        };

        if !receipt.status {
            warn!(tx_hash = %pending.tx_hash, block = block_number, operation, "Transaction reverted");
            return Err(WalletError::InsufficientAllowanceOrBalance {
                operation: operation.to_string(),
                reason: format!("reverted in block {block_number}"),
                tx_hash: Some(pending.tx_hash),
            });
        }

        if self.policy.confirmations > 1 {
            let head = self.client.block_number().await?;
            if head.saturating_sub(block_number) + 1 < self.policy.confirmations {
                return Ok(None);
            }
        }

        Ok(Some(ConfirmedTx {
            tx_hash: pending.tx_hash,
            nonce: pending.nonce,
            block_number,
            gas_used: receipt.gas_used,
        }))
    }

    fn timeout(&self, pending: &PendingTx, start: Instant, last_error: Option<String>) -> WalletError {
        warn!(tx_hash = %pending.tx_hash, nonce = pending.nonce, "Transaction not confirmed in time");
        WalletError::ConfirmationTimeout {
            tx_hash: pending.tx_hash,
            nonce: pending.nonce,
            waited: start.elapsed(),
            last_error,
        }
    }

    /// Re-read the pending count and move the sequencer forward if behind.
    pub async fn sync_nonce(&self) {
        match self.client.transaction_count(self.address).await {
            Ok(chain_nonce) => {
                self.nonce_manager.sync(chain_nonce).await;
                debug!(nonce = chain_nonce, "Nonce synced from chain");
            }
            Err(e) => {
                warn!(error = %e, "Failed to sync nonce from chain");
            }
        }
    }

    /// Native balance of the signer.
    pub async fn balance(&self) -> Result<U256> {
        self.client.balance(self.address).await
    }
}

impl std::fmt::Debug for TransactionSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSender")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
