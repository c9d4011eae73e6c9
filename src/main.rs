//! swap-engine - execute one guarded token swap
//!
//! Loads the configuration, wires the HTTP price oracle, the JSON-RPC chain
//! client and the local keypair signer into a `SwapExecutionEngine`, and
//! runs a single swap described on the command line.
//!
//! ## Features
//!
//! - **Risk guard**: price impact ceiling and slippage-adjusted minimum output
//! - **Per-account nonce safety**: concurrent swaps never share a nonce
//! - **Dry run**: `--dry-run` quotes and risk-checks without signing
//! - **Metrics**: Prometheus text format on `monitoring.metrics_port`

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swap_engine::config::Config;
use swap_engine::endpoints;
use swap_engine::oracle::HttpPriceOracle;
use swap_engine::rpc::JsonRpcChainClient;
use swap_engine::signer::LocalKeypairSigner;
use swap_engine::{
    CancelToken, EngineSettings, Pubkey, SwapExecutionEngine, SwapRequest,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "SWAP_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Token to sell
    #[arg(long)]
    token_in: String,

    /// Token to buy
    #[arg(long)]
    token_out: String,

    /// Amount of `token_in` to sell, in base units
    #[arg(long)]
    amount_in: u64,

    /// Minimum acceptable amount of `token_out`, in base units
    #[arg(long)]
    min_amount_out: u64,

    /// Slippage tolerance as a fraction (defaults to trading.default_slippage)
    #[arg(long)]
    slippage: Option<f64>,

    /// Price impact ceiling as a fraction (defaults to trading.max_price_impact)
    #[arg(long)]
    max_price_impact: Option<f64>,

    /// Quote and risk-check only; nothing is signed or sent
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    init_logging(args.verbose, config.monitoring.json_logs)?;

    info!("Starting swap engine");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if config.monitoring.enable_metrics {
        let metrics_port = config.monitoring.metrics_port;
        info!("Starting metrics server on port {}", metrics_port);
        tokio::spawn(async move {
            if let Err(e) = endpoints::endpoint_server(metrics_port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let request = build_request(&args, &config)?;

    let oracle = Arc::new(
        HttpPriceOracle::new(config.oracle.price_api_url.clone(), config.oracle_timeout())
            .context("Failed to build price oracle client")?,
    );
    let chain = Arc::new(
        JsonRpcChainClient::new(config.rpc.url.clone(), config.rpc_timeout())
            .context("Failed to build RPC client")?,
    );
    let keypair_path = expand_home(&config.wallet.keypair_path);
    info!("Loading signer from: {}", keypair_path);
    let signer = Arc::new(LocalKeypairSigner::from_file(&keypair_path).context("Failed to load signer")?);

    let settings = EngineSettings::from_config(&config)?;
    let engine = SwapExecutionEngine::new(oracle, chain, signer, settings);
    info!("Sender: {}", engine.sender());

    if args.dry_run {
        let (quote, decision) = engine.preview(&request).await?;
        info!(
            rate = quote.rate,
            expected_out = decision.expected_out,
            min_amount_out = decision.min_out_amount(),
            price_impact = decision.price_impact,
            "Dry run: swap would be submitted"
        );
        return Ok(());
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Received shutdown signal, cancelling swap");
                cancel.cancel();
            }
        });
    }

    match engine.execute_with_cancel(request, cancel).await {
        Ok(receipt) => {
            info!(
                tx_id = %receipt.transaction_id,
                block = receipt.block,
                "Swap confirmed"
            );
            Ok(())
        }
        Err(failure) => {
            if let Some(tx_id) = failure.transaction_id {
                warn!(tx_id = %tx_id, "Transaction was signed; check chain state before retrying");
            }
            Err(failure.into())
        }
    }
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "swap_engine=debug,info"
    } else {
        "swap_engine=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}

/// Load configuration from file with env overrides, falling back to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path).with_context(|| format!("Failed to load config from {}", path))
    } else {
        eprintln!("Config file '{}' not found, using defaults", path);
        dotenvy::dotenv().ok();
        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate().context("Default configuration is incomplete")?;
        Ok(config)
    }
}

fn build_request(args: &Args, config: &Config) -> Result<SwapRequest> {
    let token_in = Pubkey::from_str(&args.token_in)
        .with_context(|| format!("invalid --token-in '{}'", args.token_in))?;
    let token_out = Pubkey::from_str(&args.token_out)
        .with_context(|| format!("invalid --token-out '{}'", args.token_out))?;

    let mut builder = SwapRequest::builder(token_in, token_out, args.amount_in)
        .with_trading_defaults(&config.trading)
        .min_amount_out(args.min_amount_out);
    if let Some(slippage) = args.slippage {
        builder = builder.slippage_tolerance(slippage);
    }
    if let Some(max_price_impact) = args.max_price_impact {
        builder = builder.max_price_impact(max_price_impact);
    }
    Ok(builder.build()?)
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path.to_string(),
    }
}
