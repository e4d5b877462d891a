//! Configuration module for environment variables and run settings

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use solana_sdk::pubkey::Pubkey;

/// Items minted by the multi-item run when no count is given
pub const DEFAULT_MULTI_COUNT: usize = 3;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

#[derive(Debug, Clone)]
pub struct Config {
    /// JSON-RPC endpoint of the cluster
    pub rpc_url: String,

    /// Path of the signing wallet's keypair file
    pub wallet_path: String,

    /// Payments program under test
    pub program_id: Pubkey,

    /// Collection every minted item is verified into
    pub collection_mint: Pubkey,

    /// Items for the multi-item run; `None` runs the single-item scenario
    pub count: Option<usize>,

    /// Interval between confirmation polls
    pub confirm_poll: Duration,

    /// Cluster name used in explorer links
    pub explorer_cluster: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| -> Result<String> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow!("{} environment variable is required", name))
        };

        let count = match lookup("E2E_COUNT") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<usize>()
                    .with_context(|| format!("E2E_COUNT is not a number: {:?}", raw))?,
            ),
            None => None,
        };

        Ok(Self {
            rpc_url: required("ANCHOR_PROVIDER_URL")?,
            wallet_path: required("ANCHOR_WALLET")?,
            program_id: pick_address(&required("PROGRAM_ID")?)
                .context("PROGRAM_ID is invalid")?,
            collection_mint: pick_address(&required("COLLECTION_MINT")?)
                .context("COLLECTION_MINT is invalid")?,
            count,
            confirm_poll: Duration::from_millis(
                lookup("CONFIRM_POLL_MS")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(500),
            ),
            explorer_cluster: lookup("EXPLORER_CLUSTER").unwrap_or_else(|| "devnet".to_string()),
        })
    }

    /// Apply the optional command-line argument: an item count, or `multi`
    /// for the multi-item run with [`DEFAULT_MULTI_COUNT`] items.
    pub fn with_args(mut self, mut args: impl Iterator<Item = String>) -> Result<Self> {
        if let Some(raw) = args.next() {
            let count = if raw.eq_ignore_ascii_case("multi") {
                DEFAULT_MULTI_COUNT
            } else {
                raw.parse::<usize>()
                    .with_context(|| format!("item count must be a number or `multi`, got {:?}", raw))?
            };
            self.count = Some(count);
        }
        Ok(self)
    }
}

/// Take the first base58 run of 32+ characters out of `raw` and decode it as
/// an address. Tolerates quotes, labels and trailing comments around it.
pub fn pick_address(raw: &str) -> Result<Pubkey> {
    let candidate = raw
        .split(|c: char| !BASE58_ALPHABET.contains(c))
        .find(|run| run.len() >= 32)
        .ok_or_else(|| anyhow!("no base58 address found in {:?}", raw))?;

    let bytes = bs58::decode(candidate)
        .into_vec()
        .with_context(|| format!("{:?} is not valid base58", candidate))?;
    Pubkey::try_from(bytes.as_slice())
        .map_err(|_| anyhow!("{:?} decodes to {} bytes, expected 32", candidate, bytes.len()))
}
