//! Polygon wallet and Aave V3 client.
//!
//! Subcommands cover wallet creation, balances, native and reference token
//! transfers, lending pool operations, position summaries and fee
//! estimates. Results are printed as JSON on stdout; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wallet_chain::units::{parse_address, round};
use wallet_chain::{ChainClient, ConfirmedTx, RpcClient, TxOutcome};
use wallet_core::summary::{borrowed_assets, can_be_borrowed, collateral_assets};
use wallet_core::{LendingManager, LendingOperation, WalletConfig, WalletManager};

/// Digits kept in displayed ratios and currency values.
const DISPLAY_DIGITS: u32 = 2;

#[derive(Debug, Parser)]
#[command(name = "wallet", version, about = "Polygon wallet and Aave V3 client")]
struct Cli {
    /// TOML config file (defaults to $WALLET_CONFIG, then built-in Polygon settings)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct Credentials {
    /// Hex private key
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// BIP-39 mnemonic; the first account is used
    #[arg(long, env = "MNEMONIC", hide_env_values = true, conflicts_with = "private_key")]
    mnemonic: Option<String>,
}

impl Credentials {
    fn signer(&self) -> Result<Option<PrivateKeySigner>> {
        let signer = match (&self.private_key, &self.mnemonic) {
            (Some(key), _) => Some(WalletManager::load_wallet_from_private_key(key)?),
            (None, Some(phrase)) => Some(WalletManager::load_wallet_from_mnemonic(phrase)?),
            (None, None) => None,
        };
        Ok(signer)
    }

    fn require_signer(&self) -> Result<PrivateKeySigner> {
        match self.signer()? {
            Some(signer) => Ok(signer),
            None => bail!("No credentials: pass --private-key or --mnemonic (or set PRIVATE_KEY / MNEMONIC)"),
        }
    }

    /// Hex private key, derived from the mnemonic when needed.
    fn private_key(&self) -> Result<String> {
        if let Some(key) = &self.private_key {
            return Ok(key.clone());
        }
        Ok(hex::encode(self.require_signer()?.to_bytes()))
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a new mnemonic wallet
    Create,
    /// Print the address of the given credentials
    Address {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Native and reference token balances
    Balances {
        /// Address to read; defaults to the credentials' address
        address: Option<String>,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Send the native asset
    SendNative {
        to: String,
        amount: String,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Send the reference token
    SendToken {
        to: String,
        amount: String,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Supply the reference token to the pool
    Deposit {
        amount: String,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Withdraw the reference token from the pool ("max" for everything)
    Withdraw {
        amount: String,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Borrow an asset at the variable rate
    Borrow {
        asset: String,
        amount: String,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Repay variable debt in an asset ("max" for all of it)
    Repay {
        asset: String,
        amount: String,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Position summary with borrowed and collateral assets
    Summary {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Fee bound of a pool operation
    Estimate {
        operation: LendingOperation,
        #[command(flatten)]
        credentials: Credentials,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TxReport {
    tx_hash: String,
    nonce: u64,
    block_number: u64,
    gas_used: u64,
}

impl From<ConfirmedTx> for TxReport {
    fn from(tx: ConfirmedTx) -> Self {
        Self {
            tx_hash: tx.tx_hash.to_string(),
            nonce: tx.nonce,
            block_number: tx.block_number,
            gas_used: tx.gas_used,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before clap reads PRIVATE_KEY / MNEMONIC
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wallet_core=debug,wallet_chain=debug")),
        )
        .init();

    let config = WalletConfig::load(cli.config.as_deref())?;
    config.log_config();

    run(cli.command, &config).await
}

async fn run(command: Command, config: &WalletConfig) -> Result<()> {
    match command {
        Command::Create => {
            let (mnemonic, signer) = WalletManager::create_wallet()?;
            print_json(&serde_json::json!({
                "mnemonic": mnemonic,
                "address": signer.address(),
                "privateKey": format!("0x{}", hex::encode(signer.to_bytes())),
            }))
        }
        Command::Address { credentials } => {
            let signer = credentials.require_signer()?;
            print_json(&serde_json::json!({ "address": signer.address() }))
        }
        Command::Balances { address, credentials } => {
            let owner = match address {
                Some(address) => parse_address(&address)?,
                None => credentials.require_signer()?.address(),
            };
            let wallets = WalletManager::from_config(config, connect(config).await?);
            let balances = wallets.balances(owner).await?;
            print_json(&serde_json::json!({
                "address": owner,
                "nativeSymbol": config.network.native_symbol,
                "native": balances.native,
                "token": balances.token,
            }))
        }
        Command::SendNative { to, amount, credentials } => {
            let wallets = WalletManager::from_config(config, connect(config).await?);
            let confirmed = wallets.send_native(&credentials.private_key()?, &to, &amount).await?;
            print_json(&TxReport::from(confirmed))
        }
        Command::SendToken { to, amount, credentials } => {
            let wallets = WalletManager::from_config(config, connect(config).await?);
            match wallets.send_token(&credentials.private_key()?, &to, &amount).await? {
                TxOutcome::Confirmed(confirmed) => print_json(&TxReport::from(confirmed)),
                other => bail!("Transfer not confirmed: {other:?}"),
            }
        }
        Command::Deposit { amount, credentials } => {
            let lending = lending(config, credentials.require_signer()?).await?;
            print_json(&TxReport::from(lending.deposit(&amount).await?))
        }
        Command::Withdraw { amount, credentials } => {
            let lending = lending(config, credentials.require_signer()?).await?;
            print_json(&TxReport::from(lending.withdraw(&amount).await?))
        }
        Command::Borrow {
            asset,
            amount,
            credentials,
        } => {
            let asset = parse_address(&asset)?;
            let lending = lending(config, credentials.require_signer()?).await?;
            print_json(&TxReport::from(lending.borrow(asset, &amount).await?))
        }
        Command::Repay {
            asset,
            amount,
            credentials,
        } => {
            let asset = parse_address(&asset)?;
            let lending = lending(config, credentials.require_signer()?).await?;
            print_json(&TxReport::from(lending.repay(asset, &amount).await?))
        }
        Command::Summary { credentials } => {
            let lending = lending(config, credentials.require_signer()?).await?;
            let summary = lending.user_account_data().await?;
            print_json(&serde_json::json!({
                "healthFactor": summary.health_factor.map(|hf| round(hf, DISPLAY_DIGITS)),
                "canBeBorrowed": round(can_be_borrowed(&summary), DISPLAY_DIGITS),
                "borrowedAssets": borrowed_assets(&summary),
                "collateralAssets": collateral_assets(&summary),
                "summary": summary,
            }))
        }
        Command::Estimate { operation, credentials } => {
            // Estimates only read fee data; any address will do
            let signer = credentials.signer()?.unwrap_or_else(PrivateKeySigner::random);
            let lending = lending(config, signer).await?;
            print_json(&lending.estimate_transaction_price(operation).await?)
        }
    }
}

async fn connect(config: &WalletConfig) -> Result<Arc<dyn ChainClient>> {
    let client = RpcClient::connect(&config.network.rpc_url, config.network.chain_id)
        .await
        .with_context(|| format!("Failed to connect to {}", config.network.rpc_url))?;
    Ok(Arc::new(client))
}

async fn lending(config: &WalletConfig, signer: PrivateKeySigner) -> Result<LendingManager> {
    let wallets = WalletManager::from_config(config, connect(config).await?);
    let sender = Arc::new(wallets.sender_for(signer));
    info!(address = %sender.address, "Signer ready");
    Ok(LendingManager::from_config(config, sender))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_lending_commands() {
        let cli = Cli::try_parse_from(["wallet", "estimate", "borrow"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Estimate {
                operation: LendingOperation::Borrow,
                ..
            }
        ));

        let cli = Cli::try_parse_from(["wallet", "--config", "polygon.toml", "withdraw", "max"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("polygon.toml")));
        assert!(matches!(cli.command, Command::Withdraw { ref amount, .. } if amount == "max"));

        assert!(Cli::try_parse_from(["wallet", "estimate", "swap"]).is_err());
    }

    #[test]
    fn test_tx_report_fields() {
        let report = TxReport::from(ConfirmedTx {
            tx_hash: Default::default(),
            nonce: 3,
            block_number: 10,
            gas_used: 21_000,
        });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["nonce"], 3);
        assert_eq!(json["blockNumber"], 10);
    }

    #[test]
    fn test_missing_credentials() {
        let credentials = Credentials {
            private_key: None,
            mnemonic: None,
        };
        assert!(credentials.signer().unwrap().is_none());
        assert!(credentials.require_signer().is_err());
    }

    #[test]
    fn test_private_key_from_mnemonic() {
        let credentials = Credentials {
            private_key: None,
            mnemonic: Some("test test test test test test test test test test test junk".into()),
        };
        assert_eq!(
            credentials.private_key().unwrap(),
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
        );
    }
}
