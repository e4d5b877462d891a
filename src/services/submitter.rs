//! Transaction submission with blockhash-expiry retry.
//!
//! One submission walks `AcquireFreshness -> BuildAndSign -> Transmit ->
//! AwaitConfirmation`. Only a freshness failure (blockhash not found or
//! expired) loops back through `Retry`, and only while attempts remain.
//! Every other failure is terminal on the spot.

use std::sync::Arc;

use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    instruction::Instruction,
    message::Message,
    packet::PACKET_DATA_SIZE,
    signature::Signature,
    signer::Signer,
    transaction::Transaction,
};
use tracing::{debug, info, warn};

use crate::error::{Result, ShineError};
use crate::services::ledger::{Freshness, LedgerClient, LedgerError, SendOptions};

pub const MAX_ATTEMPTS: u32 = 3;

/// Broadcast error text meaning these exact signed bytes already landed.
const ALREADY_PROCESSED_MARKER: &str = "already been processed";

#[derive(Debug, Clone, Copy)]
pub struct SubmitPolicy {
    pub max_attempts: u32,
    pub commitment: CommitmentConfig,
    pub send_options: SendOptions,
}

impl Default for SubmitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            commitment: CommitmentConfig::confirmed(),
            send_options: SendOptions::default(),
        }
    }
}

/// A confirmed submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmed {
    pub signature: Signature,
    pub attempts: u32,
}

/// State owned by one pass through the machine; dropped on retry.
#[derive(Debug)]
struct SubmissionAttempt {
    freshness: Freshness,
    transaction: Transaction,
    wire_size: usize,
    attempt: u32,
}

impl SubmissionAttempt {
    fn signature(&self) -> Signature {
        self.transaction.signatures[0]
    }
}

enum Phase {
    AcquireFreshness,
    BuildAndSign(Freshness),
    Transmit(SubmissionAttempt),
    AwaitConfirmation(SubmissionAttempt, Signature),
    Retry(ShineError),
}

pub struct TransactionSubmitter {
    client: Arc<dyn LedgerClient>,
    policy: SubmitPolicy,
}

impl TransactionSubmitter {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self::with_policy(client, SubmitPolicy::default())
    }

    pub fn with_policy(client: Arc<dyn LedgerClient>, policy: SubmitPolicy) -> Self {
        Self { client, policy }
    }

    pub fn client(&self) -> &Arc<dyn LedgerClient> {
        &self.client
    }

    /// Sign `instructions` with `payer` (also the fee payer) and
    /// `extra_signers`, submit, and wait for confirmation.
    ///
    /// Network failures come back as [`ShineError::FatalFailure`] carrying
    /// the attempt count and the last cause.
    pub async fn submit(
        &self,
        instructions: &[Instruction],
        payer: &dyn Signer,
        extra_signers: &[&dyn Signer],
    ) -> Result<Confirmed> {
        if instructions.is_empty() {
            return Err(ShineError::NoInstructions);
        }

        let message = Message::new(instructions, Some(&payer.pubkey()));
        let mut signers: Vec<&dyn Signer> = Vec::with_capacity(extra_signers.len() + 1);
        signers.push(payer);
        signers.extend_from_slice(extra_signers);

        let mut attempt = 1u32;
        let mut stale: Vec<Hash> = Vec::new();
        let mut phase = Phase::AcquireFreshness;

        loop {
            phase = match phase {
                Phase::AcquireFreshness => {
                    debug!("Attempt {}: fetching blockhash", attempt);
                    match self.client.latest_blockhash(self.policy.commitment).await {
                        Ok(freshness) if stale.contains(&freshness.blockhash) => {
                            Phase::Retry(ShineError::FreshnessExpired(format!(
                                "ledger returned expired blockhash {} again",
                                freshness.blockhash
                            )))
                        }
                        Ok(freshness) => Phase::BuildAndSign(freshness),
                        Err(e) => Phase::Retry(e.into()),
                    }
                }

                Phase::BuildAndSign(freshness) => {
                    let built = self.build_and_sign(&message, &signers, freshness, attempt);
                    match built {
                        Ok(submission) => Phase::Transmit(submission),
                        Err(e) => return Err(self.fatal(attempt, e)),
                    }
                }

                Phase::Transmit(submission) => {
                    debug!(
                        "Attempt {}: broadcasting {} bytes",
                        submission.attempt,
                        submission.wire_size
                    );
                    match self
                        .client
                        .broadcast(&submission.transaction, &self.policy.send_options)
                        .await
                    {
                        Ok(signature) => Phase::AwaitConfirmation(submission, signature),
                        Err(e) if is_already_processed(&e) => {
                            info!(
                                "Transaction {} already processed, awaiting confirmation",
                                submission.signature()
                            );
                            let signature = submission.signature();
                            Phase::AwaitConfirmation(submission, signature)
                        }
                        Err(e) => {
                            stale.push(submission.freshness.blockhash);
                            Phase::Retry(e.into())
                        }
                    }
                }

                Phase::AwaitConfirmation(submission, signature) => {
                    match self
                        .client
                        .await_confirmation(&signature, &submission.freshness, self.policy.commitment)
                        .await
                    {
                        Ok(()) => {
                            info!("Transaction {} confirmed on attempt {}", signature, attempt);
                            return Ok(Confirmed {
                                signature,
                                attempts: attempt,
                            });
                        }
                        Err(e) => {
                            stale.push(submission.freshness.blockhash);
                            Phase::Retry(e.into())
                        }
                    }
                }

                Phase::Retry(cause) => match cause {
                    ShineError::FreshnessExpired(reason) if attempt < self.policy.max_attempts => {
                        warn!(
                            "Attempt {}/{} hit an expired blockhash ({}), retrying",
                            attempt, self.policy.max_attempts, reason
                        );
                        attempt += 1;
                        Phase::AcquireFreshness
                    }
                    cause => return Err(self.fatal(attempt, cause)),
                },
            };
        }
    }

    fn build_and_sign(
        &self,
        message: &Message,
        signers: &[&dyn Signer],
        freshness: Freshness,
        attempt: u32,
    ) -> Result<SubmissionAttempt> {
        let mut transaction = Transaction::new_unsigned(message.clone());
        transaction.try_sign(signers, freshness.blockhash)?;

        let wire_size = bincode::serialized_size(&transaction)? as usize;
        if wire_size > PACKET_DATA_SIZE {
            return Err(ShineError::TransactionTooLarge {
                size: wire_size,
                max: PACKET_DATA_SIZE,
            });
        }

        Ok(SubmissionAttempt {
            freshness,
            transaction,
            wire_size,
            attempt,
        })
    }

    fn fatal(&self, attempts: u32, cause: ShineError) -> ShineError {
        warn!("Submission failed after {} attempt(s): {}", attempts, cause);
        ShineError::FatalFailure {
            attempts,
            cause: Box::new(cause),
        }
    }
}

fn is_already_processed(err: &LedgerError) -> bool {
    err.to_string().contains(ALREADY_PROCESSED_MARKER)
}
