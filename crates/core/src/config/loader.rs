//! Loading the wallet configuration from TOML and the environment.

use super::WalletConfig;
use anyhow::{Context, Result};
use regex_lite::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::info;

/// Environment variable naming the config file when no path is given.
pub const CONFIG_ENV_VAR: &str = "WALLET_CONFIG";

impl WalletConfig {
    /// Parse a TOML document. Missing sections and fields take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: WalletConfig = toml::from_str(content).context("Invalid wallet config")?;
        config.expand_env_vars();
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read config {path:?}"))?;
        Self::from_toml_str(&content).with_context(|| format!("Failed to load config {path:?}"))
    }

    /// Load from `path`, else from `$WALLET_CONFIG`, else use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    /// Expand `${VAR}` in URL values.
    pub fn expand_env_vars(&mut self) {
        self.network.rpc_url = expand_env(&self.network.rpc_url);
        self.gas.oracle_url = expand_env(&self.gas.oracle_url);
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!(
            chain_id = self.network.chain_id,
            native = %self.network.native_symbol,
            "Network configuration loaded"
        );
        info!(
            pool = %self.market.pool,
            oracle = %self.market.oracle,
            data_provider = %self.market.data_provider,
            reference_token = %self.market.reference_token,
            "Market contracts"
        );
        info!(
            gas_station = %self.gas.oracle_url,
            max_fee_cap_gwei = ?self.gas.max_fee_cap_gwei,
            node_fee_multiplier = self.gas.node_fee_multiplier,
            "Gas settings"
        );
        info!(
            confirmations = self.confirmation.confirmations,
            timeout_secs = self.confirmation.timeout_secs,
            "Confirmation policy"
        );
    }
}

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static pattern"))
}

/// Expand ${VAR_NAME} patterns with environment variable values.
/// Unset variables are left as written.
pub fn expand_env(s: &str) -> String {
    let mut result = s.to_string();

    for cap in env_pattern().captures_iter(s) {
        if let (Some(full_match), Some(var_match)) = (cap.get(0), cap.get(1)) {
            if let Ok(value) = std::env::var(var_match.as_str()) {
                result = result.replace(full_match.as_str(), &value);
            }
        }
    }

    result
}
