//! AAVE V3 contract interfaces.
//!
//! This module provides ABI bindings for the Pool, the price oracle and the
//! protocol data provider, plus calldata helpers for pool operations.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

/// Variable interest-rate mode for borrow/repay.
pub const VARIABLE_RATE_MODE: u64 = 2;

/// Referral code sent with supply/borrow.
pub const REFERRAL_CODE: u16 = 0;

// AAVE V3 Pool interface
sol! {
    struct EModeCategoryData {
        uint16 ltv;
        uint16 liquidationThreshold;
        uint16 liquidationBonus;
        address priceSource;
        string label;
    }

    /// Aave V3 Pool interface (subset for wallet operations)
    interface IPool {
        function supply(address asset, uint256 amount, address onBehalfOf, uint16 referralCode) external;
        function borrow(address asset, uint256 amount, uint256 interestRateMode, uint16 referralCode, address onBehalfOf) external;
        function withdraw(address asset, uint256 amount, address to) external returns (uint256);
        function repay(address asset, uint256 amount, uint256 interestRateMode, address onBehalfOf) external returns (uint256);
        function getUserAccountData(address user)
            external
            view
            returns (
                uint256 totalCollateralBase,
                uint256 totalDebtBase,
                uint256 availableBorrowsBase,
                uint256 currentLiquidationThreshold,
                uint256 ltv,
                uint256 healthFactor
            );
        function getUserEMode(address user) external view returns (uint256);
        function getEModeCategoryData(uint8 id) external view returns (EModeCategoryData memory);
    }
}

// AAVE V3 price oracle
sol! {
    interface IAaveOracle {
        function getAssetsPrices(address[] calldata assets) external view returns (uint256[] memory);
        function getAssetPrice(address asset) external view returns (uint256);
        function BASE_CURRENCY() external view returns (address);
        function BASE_CURRENCY_UNIT() external view returns (uint256);
    }
}

// AAVE V3 protocol data provider
sol! {
    struct TokenData {
        string symbol;
        address tokenAddress;
    }

    interface IPoolDataProvider {
        function getAllReservesTokens() external view returns (TokenData[] memory);

        function getReserveConfigurationData(address asset)
            external
            view
            returns (
                uint256 decimals,
                uint256 ltv,
                uint256 liquidationThreshold,
                uint256 liquidationBonus,
                uint256 reserveFactor,
                bool usageAsCollateralEnabled,
                bool borrowingEnabled,
                bool stableBorrowRateEnabled,
                bool isActive,
                bool isFrozen
            );

        function getReserveEModeCategory(address asset) external view returns (uint256);

        function getReserveData(address asset)
            external
            view
            returns (
                uint256 unbacked,
                uint256 accruedToTreasuryScaled,
                uint256 totalAToken,
                uint256 totalStableDebt,
                uint256 totalVariableDebt,
                uint256 liquidityRate,
                uint256 variableBorrowRate,
                uint256 stableBorrowRate,
                uint256 averageStableBorrowRate,
                uint256 liquidityIndex,
                uint256 variableBorrowIndex,
                uint40 lastUpdateTimestamp
            );

        function getUserReserveData(address asset, address user)
            external
            view
            returns (
                uint256 currentATokenBalance,
                uint256 currentStableDebt,
                uint256 currentVariableDebt,
                uint256 principalStableDebt,
                uint256 scaledVariableDebt,
                uint256 stableBorrowRate,
                uint256 liquidityRate,
                uint40 stableRateLastUpdated,
                bool usageAsCollateralEnabled
            );
    }
}

/// Encode `supply(asset, amount, onBehalfOf, 0)`.
pub fn encode_supply(asset: Address, amount: U256, on_behalf_of: Address) -> Bytes {
    IPool::supplyCall {
        asset,
        amount,
        onBehalfOf: on_behalf_of,
        referralCode: REFERRAL_CODE,
    }
    .abi_encode()
    .into()
}

/// Encode a variable-rate `borrow`.
pub fn encode_borrow(asset: Address, amount: U256, on_behalf_of: Address) -> Bytes {
    IPool::borrowCall {
        asset,
        amount,
        interestRateMode: U256::from(VARIABLE_RATE_MODE),
        referralCode: REFERRAL_CODE,
        onBehalfOf: on_behalf_of,
    }
    .abi_encode()
    .into()
}

/// Encode `withdraw(asset, amount, to)`. `U256::MAX` withdraws everything.
pub fn encode_withdraw(asset: Address, amount: U256, to: Address) -> Bytes {
    IPool::withdrawCall { asset, amount, to }.abi_encode().into()
}

/// Encode a variable-rate `repay`. `U256::MAX` repays the whole debt.
pub fn encode_repay(asset: Address, amount: U256, on_behalf_of: Address) -> Bytes {
    IPool::repayCall {
        asset,
        amount,
        interestRateMode: U256::from(VARIABLE_RATE_MODE),
        onBehalfOf: on_behalf_of,
    }
    .abi_encode()
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_signatures() {
        assert_eq!(IPool::supplyCall::SIGNATURE, "supply(address,uint256,address,uint16)");
        assert_eq!(IPool::borrowCall::SIGNATURE, "borrow(address,uint256,uint256,uint16,address)");
        assert_eq!(IPool::withdrawCall::SIGNATURE, "withdraw(address,uint256,address)");
        assert_eq!(IPool::repayCall::SIGNATURE, "repay(address,uint256,uint256,address)");
        assert_eq!(IPool::supplyCall::SELECTOR, [0x61, 0x7b, 0xa0, 0x37]);
    }

    #[test]
    fn test_encode_borrow_uses_variable_rate() {
        let asset = Address::repeat_byte(0xaa);
        let user = Address::repeat_byte(0xbb);
        let data = encode_borrow(asset, U256::from(100u64), user);

        let decoded = IPool::borrowCall::abi_decode(&data, true).unwrap();
        assert_eq!(decoded.asset, asset);
        assert_eq!(decoded.interestRateMode, U256::from(2u64));
        assert_eq!(decoded.referralCode, 0);
        assert_eq!(decoded.onBehalfOf, user);
    }

    #[test]
    fn test_encode_repay_max() {
        let data = encode_repay(Address::repeat_byte(1), U256::MAX, Address::repeat_byte(2));
        let decoded = IPool::repayCall::abi_decode(&data, true).unwrap();
        assert_eq!(decoded.amount, U256::MAX);
    }
}
