//! Wallet chain interaction layer.
//!
//! This crate provides:
//! - JSON-RPC access behind the [`ChainClient`] trait
//! - Contract bindings for ERC20 and the Aave V3 Pool, Oracle and data provider
//! - Gas strategy abstraction (gas station, EIP-1559, Legacy)
//! - Credential loading, per-signer nonce sequencing and transaction sending
//! - ERC20 token operations ([`TokenManager`])
//! - Lending market reads ([`PoolDataSource`])
//! - Decimal amount conversion
//!
//! Test doubles live in [`mock`] (enabled with the `mock` feature).

mod client;
pub mod contracts;
mod error;
pub mod gas;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod protocol;
mod signer;
mod token;
pub mod units;

pub use client::{read_contract, ChainClient, NodeFeeData, ReceiptInfo, RpcClient};
pub use error::{Result, WalletError};
pub use gas::{Eip1559GasStrategy, GasParams, GasStationStrategy, GasStrategy, LegacyGasStrategy, GWEI};
pub use protocol::{
    AaveV3DataSource, AccountData, BaseCurrency, EModeCategory, MarketAddresses, PoolDataSource, ReserveConfiguration, ReserveData,
    ReservesSnapshot, UserReserve,
};
pub use signer::{
    create_wallet, load_wallet_from_mnemonic, load_wallet_from_private_key, ConfirmationPolicy, ConfirmedTx,
    NonceLease, NonceManager, NonceRegistry, PendingTx, TransactionSender, TransactionSenderBuilder, MNEMONIC_WORDS,
};
pub use token::{ExecutionMode, PopulatedCall, TokenManager, TxOutcome};
