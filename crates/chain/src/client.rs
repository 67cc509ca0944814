//! JSON-RPC access to the chain.
//! Uses Alloy providers for type-safe RPC interactions.
//!
//! Everything above this module talks to the node through [`ChainClient`],
//! so managers can be exercised against an in-memory chain in tests.

use crate::error::{Result, WalletError};
use alloy::eips::BlockNumberOrTag;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use std::fmt::Debug;
use tracing::{debug, info};

/// Fee data reported by the node for EIP-1559 pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeFeeData {
    /// Base fee of the latest block in wei.
    pub base_fee_per_gas: u128,
    /// Suggested priority fee in wei.
    pub max_priority_fee_per_gas: u128,
}

/// Minimal view of a mined transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptInfo {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// `true` when execution succeeded.
    pub status: bool,
}

/// JSON-RPC operations the wallet needs from a node.
#[async_trait]
pub trait ChainClient: Send + Sync + Debug {
    /// Chain id reported by the node.
    async fn chain_id(&self) -> Result<u64>;

    /// Latest block number.
    async fn block_number(&self) -> Result<u64>;

    /// Native balance of `owner` in wei.
    async fn balance(&self, owner: Address) -> Result<U256>;

    /// Pending transaction count of `owner`, i.e. the next usable nonce.
    async fn transaction_count(&self, owner: Address) -> Result<u64>;

    /// Legacy gas price in wei.
    async fn gas_price(&self) -> Result<u128>;

    /// Base fee and suggested priority fee.
    async fn fee_data(&self) -> Result<NodeFeeData>;

    /// Read-only `eth_call`.
    async fn call(&self, tx: TransactionRequest) -> Result<Bytes>;

    /// Gas units the node expects `tx` to use.
    async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64>;

    /// Sign `tx` with `wallet` and broadcast it. Returns the transaction hash.
    async fn send_transaction(&self, wallet: &EthereumWallet, tx: TransactionRequest) -> Result<B256>;

    /// Receipt of `hash`, or `None` while it is not mined.
    async fn transaction_receipt(&self, hash: B256) -> Result<Option<ReceiptInfo>>;
}

/// Encode `call`, run it against `to` and decode the return data.
pub async fn read_contract<C: SolCall + Send>(
    client: &dyn ChainClient,
    to: Address,
    call: C,
) -> Result<C::Return> {
    let input = call.abi_encode();
    drop(call);
    let tx = TransactionRequest::default().with_to(to).with_input(input);
    let output = client.call(tx).await?;
    C::abi_decode_returns(&output, true).map_err(|e| WalletError::Decode {
        what: C::SIGNATURE,
        reason: e.to_string(),
    })
}

/// [`ChainClient`] over an HTTP JSON-RPC endpoint.
/// Uses Alloy typed providers instead of manual JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcClient {
    /// HTTP RPC URL
    url: Url,
}

impl RpcClient {
    /// Create a client for `rpc_url`.
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url: Url = rpc_url
            .parse()
            .map_err(|e| WalletError::network("parse rpc url", format!("{rpc_url}: {e}")))?;
        Ok(Self { url })
    }

    /// Create a client and verify the node answers with the expected chain id.
    pub async fn connect(rpc_url: &str, expected_chain_id: u64) -> Result<Self> {
        let client = Self::new(rpc_url)?;
        let chain_id = client.chain_id().await?;
        if chain_id != expected_chain_id {
            return Err(WalletError::network(
                "eth_chainId",
                format!("{rpc_url} serves chain {chain_id}, expected {expected_chain_id}"),
            ));
        }
        info!(rpc = rpc_url, chain_id, "Provider connection verified");
        Ok(client)
    }

    /// Get the RPC URL.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    fn provider(&self) -> impl Provider {
        ProviderBuilder::new().on_http(self.url.clone())
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn chain_id(&self) -> Result<u64> {
        self.provider()
            .get_chain_id()
            .await
            .map_err(|e| WalletError::from_rpc("eth_chainId", e))
    }

    async fn block_number(&self) -> Result<u64> {
        self.provider()
            .get_block_number()
            .await
            .map_err(|e| WalletError::from_rpc("eth_blockNumber", e))
    }

    async fn balance(&self, owner: Address) -> Result<U256> {
        self.provider()
            .get_balance(owner)
            .await
            .map_err(|e| WalletError::from_rpc("eth_getBalance", e))
    }

    async fn transaction_count(&self, owner: Address) -> Result<u64> {
        self.provider()
            .get_transaction_count(owner)
            .pending()
            .await
            .map_err(|e| WalletError::from_rpc("eth_getTransactionCount", e))
    }

    async fn gas_price(&self) -> Result<u128> {
        self.provider()
            .get_gas_price()
            .await
            .map_err(|e| WalletError::from_rpc("eth_gasPrice", e))
    }

    async fn fee_data(&self) -> Result<NodeFeeData> {
        let provider = self.provider();

        // Get the latest block to extract base fee
        let block = provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| WalletError::from_rpc("eth_getBlockByNumber", e))?
            .ok_or_else(|| WalletError::network("eth_getBlockByNumber", "latest block not found"))?;

        let base_fee_per_gas = block
            .header
            .base_fee_per_gas
            .map(|b| b as u128)
            .ok_or_else(|| WalletError::network("eth_getBlockByNumber", "chain does not report a base fee"))?;

        let max_priority_fee_per_gas = provider
            .get_max_priority_fee_per_gas()
            .await
            .map_err(|e| WalletError::from_rpc("eth_maxPriorityFeePerGas", e))?;

        Ok(NodeFeeData {
            base_fee_per_gas,
            max_priority_fee_per_gas,
        })
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes> {
        self.provider()
            .call(tx)
            .await
            .map_err(|e| WalletError::from_rpc("eth_call", e))
    }

    async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64> {
        self.provider()
            .estimate_gas(tx)
            .await
            .map_err(|e| WalletError::from_rpc("eth_estimateGas", e))
    }

    async fn send_transaction(&self, wallet: &EthereumWallet, tx: TransactionRequest) -> Result<B256> {
        let provider = ProviderBuilder::new()
            .wallet(wallet.clone())
            .on_http(self.url.clone());

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| WalletError::from_rpc("eth_sendRawTransaction", e))?;
        let tx_hash = *pending.tx_hash();
        debug!(tx_hash = %tx_hash, "Transaction accepted by node");
        Ok(tx_hash)
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<ReceiptInfo>> {
        let receipt = self
            .provider()
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| WalletError::from_rpc("eth_getTransactionReceipt", e))?;

        Ok(receipt.map(|r| ReceiptInfo {
            tx_hash: hash,
            block_number: r.block_number,
            gas_used: r.gas_used as u64,
            status: r.status(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_url() {
        let err = RpcClient::new("not a url").unwrap_err();
        assert!(err.is_network());
    }

    #[test]
    fn test_keeps_url() {
        let client = RpcClient::new("https://polygon-bor-rpc.publicnode.com").unwrap();
        assert_eq!(client.url(), "https://polygon-bor-rpc.publicnode.com/");
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_connect_polygon() {
        let client = RpcClient::connect("https://polygon-bor-rpc.publicnode.com", 137).await;
        assert!(client.is_ok());
        let block = client.unwrap().block_number().await.unwrap();
        assert!(block > 0);
    }
}
