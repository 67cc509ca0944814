//! Error taxonomy shared by every chain operation.

use alloy::primitives::B256;
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;
use wallet_api::GasStationError;

/// Result alias for chain operations.
pub type Result<T, E = WalletError> = std::result::Result<T, E>;

/// Errors surfaced by wallet, token and lending operations.
#[derive(Debug, Error)]
pub enum WalletError {
    /// JSON-RPC failure or timeout.
    #[error("network error during {operation}: {message}")]
    Network { operation: String, message: String },

    /// Gas station fetch failed; nothing was signed or sent.
    #[error("gas oracle unavailable: {0}")]
    GasOracle(#[from] GasStationError),

    /// Malformed mnemonic or private key.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Amount string that cannot be represented in base units.
    #[error("invalid amount `{amount}`: {reason}")]
    InvalidAmount { amount: String, reason: String },

    /// Address string that does not parse.
    #[error("invalid address `{0}`")]
    InvalidAddress(String),

    /// The node or the mined receipt rejected the transaction.
    #[error("{operation} rejected: {reason}")]
    InsufficientAllowanceOrBalance {
        operation: String,
        reason: String,
        tx_hash: Option<B256>,
    },

    /// Submitted transaction was not confirmed within the policy bound.
    #[error("transaction {tx_hash} (nonce {nonce}) not confirmed after {waited:?}{}", error_suffix(.last_error))]
    ConfirmationTimeout {
        tx_hash: B256,
        nonce: u64,
        waited: Duration,
        last_error: Option<String>,
    },

    /// A call submitted after an approval failed; the approval itself was
    /// already accepted by the node and may still be mined.
    #[error("{source} (approval {approval_tx_hash} with nonce {approval_nonce} was already submitted)")]
    AfterApproval {
        approval_tx_hash: B256,
        approval_nonce: u64,
        #[source]
        source: Box<WalletError>,
    },

    /// Unexpected ABI return data.
    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },
}

fn error_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(": {e}"))
        .unwrap_or_default()
}

impl WalletError {
    /// Classify a transport error from the node.
    ///
    /// Node messages about reverts or missing funds map to
    /// [`WalletError::InsufficientAllowanceOrBalance`]; anything else is a
    /// network failure.
    pub fn from_rpc(operation: &str, err: impl Display) -> Self {
        let message = err.to_string();
        let lower = message.to_lowercase();
        let rejected = ["revert", "insufficient funds", "exceeds balance", "exceeds allowance", "insufficient allowance"]
            .iter()
            .any(|needle| lower.contains(needle));

        if rejected {
            WalletError::InsufficientAllowanceOrBalance {
                operation: operation.to_string(),
                reason: message,
                tx_hash: None,
            }
        } else {
            WalletError::Network {
                operation: operation.to_string(),
                message,
            }
        }
    }

    /// Shorthand for a network error.
    pub fn network(operation: &str, message: impl Display) -> Self {
        WalletError::Network {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    /// Shorthand for an invalid amount.
    pub fn invalid_amount(amount: &str, reason: impl Display) -> Self {
        WalletError::InvalidAmount {
            amount: amount.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for failures of the node or the gas oracle.
    pub fn is_network(&self) -> bool {
        match self {
            WalletError::Network { .. } | WalletError::GasOracle(_) => true,
            WalletError::AfterApproval { source, .. } => source.is_network(),
            _ => false,
        }
    }

    /// Hash of the transaction this error refers to, if one was submitted.
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            WalletError::InsufficientAllowanceOrBalance { tx_hash, .. } => *tx_hash,
            WalletError::ConfirmationTimeout { tx_hash, .. } => Some(*tx_hash),
            WalletError::AfterApproval { source, .. } => source.tx_hash(),
            _ => None,
        }
    }

    /// Hash of an approval submitted ahead of the failed call.
    pub fn approval_tx_hash(&self) -> Option<B256> {
        match self {
            WalletError::AfterApproval { approval_tx_hash, .. } => Some(*approval_tx_hash),
            _ => None,
        }
    }

    /// Attach an already submitted approval to this error.
    pub fn after_approval(self, approval_tx_hash: B256, approval_nonce: u64) -> Self {
        WalletError::AfterApproval {
            approval_tx_hash,
            approval_nonce,
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_messages_are_classified() {
        let err = WalletError::from_rpc("supply", "execution reverted: 26");
        assert!(matches!(err, WalletError::InsufficientAllowanceOrBalance { .. }));

        let err = WalletError::from_rpc("transfer", "insufficient funds for gas * price + value");
        assert!(matches!(err, WalletError::InsufficientAllowanceOrBalance { .. }));

        let err = WalletError::from_rpc("transfer", "ERC20: transfer amount exceeds balance");
        assert!(matches!(err, WalletError::InsufficientAllowanceOrBalance { .. }));
    }

    #[test]
    fn test_transport_messages_are_network_errors() {
        let err = WalletError::from_rpc("eth_call", "error sending request: connection refused");
        assert!(err.is_network());
        assert!(err.tx_hash().is_none());
    }

    #[test]
    fn test_after_approval_keeps_both_hashes() {
        let inner = WalletError::InsufficientAllowanceOrBalance {
            operation: "supply".into(),
            reason: "reverted in block 9".into(),
            tx_hash: Some(B256::repeat_byte(0x02)),
        };
        let err = inner.after_approval(B256::repeat_byte(0x01), 7);

        assert_eq!(err.tx_hash(), Some(B256::repeat_byte(0x02)));
        assert_eq!(err.approval_tx_hash(), Some(B256::repeat_byte(0x01)));
        assert!(!err.is_network());
        let text = err.to_string();
        assert!(text.starts_with("supply rejected"));
        assert!(text.contains("nonce 7"));

        let err = WalletError::network("eth_sendRawTransaction", "connection reset").after_approval(B256::ZERO, 3);
        assert!(err.is_network());
        assert!(err.tx_hash().is_none());
    }

    #[test]
    fn test_timeout_reports_hash() {
        let err = WalletError::ConfirmationTimeout {
            tx_hash: B256::repeat_byte(0xab),
            nonce: 4,
            waited: Duration::from_secs(120),
            last_error: Some("connection reset".into()),
        };
        assert_eq!(err.tx_hash(), Some(B256::repeat_byte(0xab)));
        let text = err.to_string();
        assert!(text.contains("nonce 4"));
        assert!(text.contains("connection reset"));
    }
}
