//! ERC20 token operations.
//!
//! Amounts cross this API as decimal strings and are converted with the
//! token's on-chain decimals right before a call is encoded. Decimals and
//! symbol are read on every call.

use crate::client::{read_contract, ChainClient};
use crate::contracts::common::{encode_approve, encode_transfer};
use crate::contracts::IERC20;
use crate::error::Result;
use crate::gas::GasStrategy;
use crate::signer::{ConfirmedTx, PendingTx, TransactionSender};
use crate::units::{format_amount, parse_amount};
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::TransactionRequest;
use std::sync::Arc;
use tracing::{debug, info};

/// Whether a state-changing call is submitted or only encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Encode the call; nothing is signed or sent.
    PopulateOnly,
    /// Sign and submit.
    #[default]
    Execute,
}

/// An unsigned contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulatedCall {
    pub to: Address,
    pub data: Bytes,
}

impl PopulatedCall {
    /// Transaction request carrying this call.
    pub fn into_request(self) -> TransactionRequest {
        TransactionRequest::default().with_to(self.to).with_input(self.data)
    }
}

/// Result of a state-changing token call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    /// `PopulateOnly`: the encoded call.
    Populated(PopulatedCall),
    /// Accepted by the node, not awaited.
    Pending(PendingTx),
    /// Mined with the required confirmations.
    Confirmed(ConfirmedTx),
}

impl TxOutcome {
    /// Hash of the submitted transaction, if any.
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            TxOutcome::Populated(_) => None,
            TxOutcome::Pending(p) => Some(p.tx_hash),
            TxOutcome::Confirmed(c) => Some(c.tx_hash),
        }
    }
}

/// One ERC20 contract.
#[derive(Debug, Clone)]
pub struct TokenManager {
    address: Address,
    client: Arc<dyn ChainClient>,
    gas: Arc<dyn GasStrategy>,
}

impl TokenManager {
    /// Create a manager for the token at `address`, pricing transactions
    /// with `gas`.
    pub fn new(address: Address, client: Arc<dyn ChainClient>, gas: Arc<dyn GasStrategy>) -> Self {
        Self { address, client, gas }
    }

    /// Token contract address.
    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn decimals(&self) -> Result<u8> {
        Ok(read_contract(self.client.as_ref(), self.address, IERC20::decimalsCall {}).await?._0)
    }

    pub async fn symbol(&self) -> Result<String> {
        Ok(read_contract(self.client.as_ref(), self.address, IERC20::symbolCall {}).await?._0)
    }

    /// Raw balance in base units.
    pub async fn balance_of_raw(&self, owner: Address) -> Result<U256> {
        Ok(read_contract(self.client.as_ref(), self.address, IERC20::balanceOfCall { account: owner })
            .await?
            ._0)
    }

    /// Balance as a decimal string.
    pub async fn balance_of(&self, owner: Address) -> Result<String> {
        let (raw, decimals) = tokio::try_join!(self.balance_of_raw(owner), self.decimals())?;
        Ok(format_amount(raw, decimals))
    }

    /// Allowance of `spender` over `owner`'s tokens, as a decimal string.
    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<String> {
        let (raw, decimals) = tokio::try_join!(
            read_contract(self.client.as_ref(), self.address, IERC20::allowanceCall { owner, spender }),
            self.decimals(),
        )?;
        Ok(format_amount(raw._0, decimals))
    }

    /// Convert a decimal amount to base units with the token's decimals.
    pub async fn to_base_units(&self, amount: &str) -> Result<U256> {
        let decimals = self.decimals().await?;
        parse_amount(amount, decimals)
    }

    pub fn populate_approve(&self, spender: Address, amount: U256) -> PopulatedCall {
        PopulatedCall {
            to: self.address,
            data: encode_approve(spender, amount),
        }
    }

    pub fn populate_transfer(&self, to: Address, amount: U256) -> PopulatedCall {
        PopulatedCall {
            to: self.address,
            data: encode_transfer(to, amount),
        }
    }

    /// Approve `spender` for `amount` (decimal string).
    ///
    /// Executing returns as soon as the node accepts the approval.
    pub async fn approve(
        &self,
        sender: &TransactionSender,
        spender: Address,
        amount: &str,
        mode: ExecutionMode,
    ) -> Result<TxOutcome> {
        let raw = self.to_base_units(amount).await?;
        self.approve_raw(sender, spender, raw, mode).await
    }

    /// [`approve`](Self::approve) with an amount already in base units.
    pub async fn approve_raw(
        &self,
        sender: &TransactionSender,
        spender: Address,
        amount: U256,
        mode: ExecutionMode,
    ) -> Result<TxOutcome> {
        let call = self.populate_approve(spender, amount);
        if mode == ExecutionMode::PopulateOnly {
            debug!(token = %self.address, spender = %spender, "Approval populated");
            return Ok(TxOutcome::Populated(call));
        }

        let pending = sender.send(call.into_request(), self.gas.as_ref()).await?;
        info!(
            token = %self.address,
            spender = %spender,
            amount = %amount,
            tx_hash = %pending.tx_hash,
            "Approval submitted"
        );
        Ok(TxOutcome::Pending(pending))
    }

    /// Transfer `amount` (decimal string) to `to`.
    ///
    /// Executing waits for confirmation.
    pub async fn transfer(
        &self,
        sender: &TransactionSender,
        to: Address,
        amount: &str,
        mode: ExecutionMode,
    ) -> Result<TxOutcome> {
        let raw = self.to_base_units(amount).await?;
        let call = self.populate_transfer(to, raw);
        if mode == ExecutionMode::PopulateOnly {
            debug!(token = %self.address, to = %to, "Transfer populated");
            return Ok(TxOutcome::Populated(call));
        }

        let confirmed = sender
            .send_and_confirm(call.into_request(), self.gas.as_ref(), "transfer")
            .await?;
        info!(
            token = %self.address,
            to = %to,
            amount = amount,
            tx_hash = %confirmed.tx_hash,
            block = confirmed.block_number,
            "Token transfer confirmed"
        );
        Ok(TxOutcome::Confirmed(confirmed))
    }

    /// Gas units the node expects `call` from `from` to use.
    pub async fn estimate_gas(&self, from: Address, call: &PopulatedCall) -> Result<u64> {
        let tx = call.clone().into_request().with_from(from);
        self.client.estimate_gas(tx).await
    }
}
