//! Gas station fee oracle client.
//!
//! The gas station publishes EIP-1559 fee suggestions in gwei for three
//! speed tiers. Transactions are priced from the `fast` tier.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Default endpoint of the Polygon PoS gas station (v2 API).
pub const DEFAULT_GAS_STATION_URL: &str = "https://gasstation.polygon.technology/v2";

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Errors returned by the gas station client.
#[derive(Debug, Error)]
pub enum GasStationError {
    /// Transport-level failure (connect, TLS, timeout, body read).
    #[error("gas station request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("gas station returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The endpoint answered with a fee that cannot be used.
    #[error("gas station returned an invalid {field}: {value}")]
    InvalidFee { field: &'static str, value: f64 },
}

/// One speed tier of the gas station response (values in gwei).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeTier {
    pub max_priority_fee: f64,
    pub max_fee: f64,
}

/// Gas station v2 response body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasStationResponse {
    pub safe_low: FeeTier,
    pub standard: FeeTier,
    pub fast: FeeTier,
    #[serde(default)]
    pub estimated_base_fee: Option<f64>,
    #[serde(default)]
    pub block_number: Option<u64>,
}

/// Fee quote in wei, ready to apply to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    /// Base fee reported by the station, when present.
    pub base_fee_per_gas: Option<u128>,
}

impl FeeQuote {
    /// Build a quote from a gas station tier.
    ///
    /// Each gwei value is rounded up to a whole gwei before conversion to wei.
    pub fn from_tier(tier: &FeeTier, base_fee_gwei: Option<f64>) -> Result<Self, GasStationError> {
        Ok(Self {
            max_fee_per_gas: gwei_ceil_to_wei("maxFee", tier.max_fee)?,
            max_priority_fee_per_gas: gwei_ceil_to_wei("maxPriorityFee", tier.max_priority_fee)?,
            base_fee_per_gas: base_fee_gwei.and_then(|g| gwei_ceil_to_wei("estimatedBaseFee", g).ok()),
        })
    }
}

fn gwei_ceil_to_wei(field: &'static str, gwei: f64) -> Result<u128, GasStationError> {
    if !gwei.is_finite() || gwei < 0.0 {
        return Err(GasStationError::InvalidFee { field, value: gwei });
    }
    (gwei.ceil() as u128)
        .checked_mul(WEI_PER_GWEI)
        .ok_or(GasStationError::InvalidFee { field, value: gwei })
}

/// HTTP client for the gas station.
#[derive(Debug, Clone)]
pub struct GasStationClient {
    client: reqwest::Client,
    url: String,
}

impl GasStationClient {
    /// Create a client for the given endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, Duration::from_secs(10))
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            url: url.into(),
        }
    }

    /// The endpoint this client queries.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the raw gas station response.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch(&self) -> Result<GasStationResponse, GasStationError> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GasStationError::Status { status, body });
        }

        let body: GasStationResponse = response.json().await?;
        debug!(
            fast_max_fee = body.fast.max_fee,
            fast_priority_fee = body.fast.max_priority_fee,
            block = ?body.block_number,
            "Gas station response"
        );
        Ok(body)
    }

    /// Fetch a fresh quote from the `fast` tier.
    pub async fn fast_quote(&self) -> Result<FeeQuote, GasStationError> {
        let body = self.fetch().await?;
        FeeQuote::from_tier(&body.fast, body.estimated_base_fee)
    }
}

impl Default for GasStationClient {
    fn default() -> Self {
        Self::new(DEFAULT_GAS_STATION_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "safeLow": {"maxPriorityFee": 30.0, "maxFee": 30.5},
        "standard": {"maxPriorityFee": 31.2, "maxFee": 32.9},
        "fast": {"maxPriorityFee": 35.01, "maxFee": 41.2},
        "estimatedBaseFee": 1.2e-8,
        "blockTime": 2,
        "blockNumber": 51234567
    }"#;

    #[test]
    fn test_deserialize_response() {
        let body: GasStationResponse = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(body.fast.max_fee, 41.2);
        assert_eq!(body.safe_low.max_priority_fee, 30.0);
        assert_eq!(body.block_number, Some(51_234_567));
    }

    #[test]
    fn test_quote_rounds_up_to_whole_gwei() {
        let body: GasStationResponse = serde_json::from_str(SAMPLE).unwrap();
        let quote = FeeQuote::from_tier(&body.fast, None).unwrap();

        assert_eq!(quote.max_fee_per_gas, 42 * WEI_PER_GWEI);
        assert_eq!(quote.max_priority_fee_per_gas, 36 * WEI_PER_GWEI);
        assert_eq!(quote.base_fee_per_gas, None);
    }

    #[test]
    fn test_whole_gwei_is_unchanged() {
        let tier = FeeTier {
            max_priority_fee: 30.0,
            max_fee: 50.0,
        };
        let quote = FeeQuote::from_tier(&tier, Some(0.4)).unwrap();
        assert_eq!(quote.max_fee_per_gas, 50 * WEI_PER_GWEI);
        assert_eq!(quote.max_priority_fee_per_gas, 30 * WEI_PER_GWEI);
        assert_eq!(quote.base_fee_per_gas, Some(WEI_PER_GWEI));
    }

    #[test]
    fn test_invalid_fee_rejected() {
        let tier = FeeTier {
            max_priority_fee: -1.0,
            max_fee: 50.0,
        };
        let err = FeeQuote::from_tier(&tier, None).unwrap_err();
        assert!(matches!(err, GasStationError::InvalidFee { field: "maxPriorityFee", .. }));
    }

    #[test]
    fn test_fee_beyond_wei_range_rejected() {
        let tier = FeeTier {
            max_priority_fee: 1.0,
            max_fee: 1e30,
        };
        let err = FeeQuote::from_tier(&tier, None).unwrap_err();
        assert!(matches!(err, GasStationError::InvalidFee { field: "maxFee", .. }));

        // Out-of-range base fee is dropped, not an error
        let tier = FeeTier {
            max_priority_fee: 1.0,
            max_fee: 2.0,
        };
        let quote = FeeQuote::from_tier(&tier, Some(f64::MAX)).unwrap();
        assert_eq!(quote.base_fee_per_gas, None);
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_fetch_live_quote() {
        let client = GasStationClient::default();
        let quote = client.fast_quote().await.unwrap();
        assert!(quote.max_fee_per_gas >= quote.max_priority_fee_per_gas);
    }
}
