//! HTTP clients for external wallet services.
//!
//! This crate provides:
//! - Gas station: EIP-1559 fee quotes used to price every transaction

mod gas_station;

pub use gas_station::{
    FeeQuote, FeeTier, GasStationClient, GasStationError, GasStationResponse,
    DEFAULT_GAS_STATION_URL,
};
