//! Common contract interfaces shared across protocols.
//!
//! This module provides type definitions for the ERC20 token interface
//! plus calldata helpers for the state-changing calls.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

// ERC20 interface for token interactions
sol! {
    /// Standard ERC20 interface (subset used by the wallet)
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
}

/// Encode `approve(spender, amount)`.
pub fn encode_approve(spender: Address, amount: U256) -> Bytes {
    IERC20::approveCall { spender, amount }.abi_encode().into()
}

/// Encode `transfer(to, amount)`.
pub fn encode_transfer(to: Address, amount: U256) -> Bytes {
    IERC20::transferCall { to, amount }.abi_encode().into()
}
