//! # Shine E2E Runner
//!
//! End-to-end driver for the payments program. Talks to the cluster with raw,
//! hand-encoded instructions instead of an IDL client, and retries any
//! submission whose blockhash expired before it landed.
//!
//! ## Scenarios
//! - Single item (default): init, mint one NFT, `add_bonus` and verify that
//!   the recipient token account is frozen and the metadata account exists
//! - Multi item: pass `multi` (3 items), a count, or set `E2E_COUNT` to mint
//!   several items in sequence with increasing bonus amounts, then print a
//!   summary
//!
//! ## Environment Setup
//! Copy `.env.example` to `.env` and configure:
//! ```bash
//! ANCHOR_PROVIDER_URL=https://api.devnet.solana.com
//! ANCHOR_WALLET=~/.config/solana/id.json
//! PROGRAM_ID=<payments program>
//! COLLECTION_MINT=<verified collection mint>
//! ```
//!
//! ## Running
//! ```bash
//! cargo run            # single item
//! cargo run -- multi   # three items
//! cargo run -- 5       # five items
//! ```

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use shine_e2e::config::Config;
use shine_e2e::scenario::Scenario;
use shine_e2e::services::ledger::RpcLedgerClient;
use shine_e2e::TransactionSubmitter;
use solana_sdk::{commitment_config::CommitmentConfig, signature::read_keypair_file, signer::Signer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .compact(),
        )
        .init();

    tracing::info!("🏁 Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?.with_args(env::args().skip(1))?;

    let wallet_path = expand_home(&config.wallet_path);
    let wallet = read_keypair_file(&wallet_path)
        .map_err(|e| anyhow!("failed to read wallet {}: {}", wallet_path, e))?;

    let client = RpcLedgerClient::new(
        config.rpc_url.clone(),
        CommitmentConfig::confirmed(),
        config.confirm_poll,
    );
    tracing::info!("🔗 RPC: {}", client.url());
    tracing::info!("👛 Wallet: {}", wallet.pubkey());
    tracing::info!("📜 Program: {}", config.program_id);
    tracing::info!("🖼️  Collection: {}", config.collection_mint);

    let scenario = Scenario::new(
        TransactionSubmitter::new(Arc::new(client)),
        wallet,
        config.program_id,
        config.collection_mint,
        config.explorer_cluster.clone(),
    );

    match config.count {
        None => {
            let item = scenario.run_single().await.context("single-item run failed")?;
            scenario.report(std::slice::from_ref(&item))?;
        }
        Some(count) => {
            tracing::info!("🚀 Minting {} item(s)", count);
            let minted = scenario.run_multi(count).await.context("multi-item run failed")?;
            println!("{}", scenario.report(&minted)?);
        }
    }

    Ok(())
}

/// Resolve a leading `~/` against `$HOME`, as wallet paths are usually
/// written that way.
fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path.to_string(),
    }
}
