//! Ledger client capability
//!
//! The submitter and the token helpers only talk to the ledger through
//! [`LedgerClient`]. [`RpcLedgerClient`] implements it over the nonblocking
//! JSON-RPC client; tests script their own implementation.

use std::time::Duration;

use async_trait::async_trait;
use solana_client::{
    client_error::ClientError, nonblocking::rpc_client::RpcClient,
    rpc_config::RpcSendTransactionConfig,
};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Rpc(#[from] Box<ClientError>),

    /// The transaction landed and failed
    #[error("transaction {signature} failed: {reason}")]
    TransactionFailed { signature: Signature, reason: String },

    #[error("signature {signature} has expired: block height exceeded {last_valid_block_height}")]
    BlockHeightExceeded {
        signature: Signature,
        last_valid_block_height: u64,
    },

    #[error("{0}")]
    Rejected(String),
}

impl From<ClientError> for LedgerError {
    fn from(err: ClientError) -> Self {
        LedgerError::Rpc(Box::new(err))
    }
}

/// A recent blockhash and the last block height at which it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub preflight_commitment: CommitmentConfig,
    pub max_retries: usize,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            preflight_commitment: CommitmentConfig::confirmed(),
            max_retries: 3,
        }
    }
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn latest_blockhash(&self, commitment: CommitmentConfig) -> Result<Freshness, LedgerError>;

    /// Broadcast a signed transaction and return its provisional signature.
    async fn broadcast(
        &self,
        transaction: &Transaction,
        options: &SendOptions,
    ) -> Result<Signature, LedgerError>;

    /// Wait until `signature` is confirmed at `commitment`, or fail once the
    /// ledger reports an error or `freshness` has expired.
    async fn await_confirmation(
        &self,
        signature: &Signature,
        freshness: &Freshness,
        commitment: CommitmentConfig,
    ) -> Result<(), LedgerError>;

    /// Raw account data, `None` when the account does not exist.
    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError>;

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, LedgerError>;
}

/// JSON-RPC backed ledger client
pub struct RpcLedgerClient {
    rpc_client: RpcClient,
    poll_interval: Duration,
}

impl RpcLedgerClient {
    pub fn new(url: String, commitment: CommitmentConfig, poll_interval: Duration) -> Self {
        Self::from_rpc_client(RpcClient::new_with_commitment(url, commitment), poll_interval)
    }

    pub fn from_rpc_client(rpc_client: RpcClient, poll_interval: Duration) -> Self {
        Self {
            rpc_client,
            poll_interval,
        }
    }

    pub fn url(&self) -> String {
        self.rpc_client.url()
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn latest_blockhash(&self, commitment: CommitmentConfig) -> Result<Freshness, LedgerError> {
        let (blockhash, last_valid_block_height) = self
            .rpc_client
            .get_latest_blockhash_with_commitment(commitment)
            .await?;
        Ok(Freshness {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn broadcast(
        &self,
        transaction: &Transaction,
        options: &SendOptions,
    ) -> Result<Signature, LedgerError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: options.skip_preflight,
            preflight_commitment: Some(options.preflight_commitment.commitment),
            max_retries: Some(options.max_retries),
            ..RpcSendTransactionConfig::default()
        };
        Ok(self
            .rpc_client
            .send_transaction_with_config(transaction, config)
            .await?)
    }

    async fn await_confirmation(
        &self,
        signature: &Signature,
        freshness: &Freshness,
        commitment: CommitmentConfig,
    ) -> Result<(), LedgerError> {
        loop {
            let status = self
                .rpc_client
                .get_signature_status_with_commitment(signature, commitment)
                .await?;

            match status {
                Some(Ok(())) => return Ok(()),
                Some(Err(err)) => {
                    return Err(LedgerError::TransactionFailed {
                        signature: *signature,
                        reason: err.to_string(),
                    });
                }
                None => {}
            }

            let block_height = self
                .rpc_client
                .get_block_height_with_commitment(commitment)
                .await?;
            if block_height > freshness.last_valid_block_height {
                warn!(
                    "Blockhash {} expired at height {} (now {})",
                    freshness.blockhash, freshness.last_valid_block_height, block_height
                );
                return Err(LedgerError::BlockHeightExceeded {
                    signature: *signature,
                    last_valid_block_height: freshness.last_valid_block_height,
                });
            }

            debug!("Signature {} not yet confirmed at height {}", signature, block_height);
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        let response = self
            .rpc_client
            .get_account_with_commitment(address, self.rpc_client.commitment())
            .await?;
        Ok(response.value.map(|account| account.data))
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, LedgerError> {
        Ok(self
            .rpc_client
            .get_minimum_balance_for_rent_exemption(data_len)
            .await?)
    }
}
