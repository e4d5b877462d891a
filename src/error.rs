//! # Error Taxonomy
//!
//! Errors raised while deriving addresses, encoding calls and submitting
//! transactions. Local errors (derivation, encoding) never touch the network;
//! everything observed on the network ends up wrapped in
//! [`ShineError::FatalFailure`] once the submitter gives up.

use solana_sdk::{pubkey::Pubkey, signer::SignerError};
use thiserror::Error;

use crate::services::ledger::LedgerError;

pub type Result<T, E = ShineError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ShineError {
    /// No bump in 255..=0 produced an off-curve address
    #[error("no off-curve address for {seed_count} seed(s) under program {program_id}")]
    DerivationExhausted { program_id: Pubkey, seed_count: usize },

    #[error("invalid seeds: {0}")]
    InvalidSeeds(String),

    /// Local encoding error, caller bug
    #[error("schema mismatch in `{call}`: {reason}")]
    SchemaMismatch { call: String, reason: String },

    #[error("transaction has no instructions")]
    NoInstructions,

    #[error("signed transaction is {size} bytes, limit is {max}")]
    TransactionTooLarge { size: usize, max: usize },

    #[error("failed to serialize transaction: {0}")]
    Serialization(#[from] bincode::Error),

    /// Blockhash was not found or expired before confirmation
    #[error("freshness token expired: {0}")]
    FreshnessExpired(String),

    /// Rejected by the ledger or the remote program for any other reason
    #[error("rejected by ledger: {0}")]
    RemoteRejected(String),

    #[error("account {address} could not be decoded: {reason}")]
    AccountDecode { address: Pubkey, reason: String },

    #[error("signing failed: {0}")]
    Signing(#[from] SignerError),

    /// Terminal failure of a submission, carrying the last cause
    #[error("submission failed after {attempts} attempt(s): {cause}")]
    FatalFailure {
        attempts: u32,
        #[source]
        cause: Box<ShineError>,
    },
}

impl ShineError {
    pub(crate) fn schema(call: &str, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            call: call.to_string(),
            reason: reason.into(),
        }
    }

    /// The underlying cause of a terminal failure, or `self` otherwise.
    pub fn root_cause(&self) -> &ShineError {
        match self {
            Self::FatalFailure { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::FatalFailure { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

/// Markers the ledger uses when a blockhash has aged out.
const FRESHNESS_MARKERS: [&str; 2] = ["blockhash not found", "expired"];

pub fn is_freshness_failure(reason: &str) -> bool {
    let reason = reason.to_lowercase();
    FRESHNESS_MARKERS.iter().any(|marker| reason.contains(marker))
}

impl From<LedgerError> for ShineError {
    fn from(err: LedgerError) -> Self {
        let reason = err.to_string();
        if is_freshness_failure(&reason) {
            Self::FreshnessExpired(reason)
        } else {
            Self::RemoteRejected(reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_markers_are_case_insensitive() {
        assert!(is_freshness_failure("Transaction simulation failed: Blockhash not found"));
        assert!(is_freshness_failure("Signature abc has EXPIRED: block height exceeded"));
        assert!(!is_freshness_failure("custom program error: 0x1"));
        assert!(!is_freshness_failure("insufficient funds for fee"));
    }

    #[test]
    fn test_ledger_errors_are_classified() {
        let stale: ShineError = LedgerError::Rejected("Blockhash not found".into()).into();
        assert!(matches!(stale, ShineError::FreshnessExpired(_)));

        let denied: ShineError = LedgerError::Rejected("missing required signature".into()).into();
        assert!(matches!(denied, ShineError::RemoteRejected(ref r) if r.contains("missing required signature")));
    }

    #[test]
    fn test_block_height_exhaustion_is_a_freshness_failure() {
        let err: ShineError = LedgerError::BlockHeightExceeded {
            signature: solana_sdk::signature::Signature::default(),
            last_valid_block_height: 150,
        }
        .into();
        assert!(matches!(err, ShineError::FreshnessExpired(ref r) if r.contains("150")));
    }

    #[test]
    fn test_root_cause_unwraps_fatal_failure() {
        let err = ShineError::FatalFailure {
            attempts: 3,
            cause: Box::new(ShineError::FreshnessExpired("expired".into())),
        };
        assert_eq!(err.attempts(), Some(3));
        assert!(matches!(err.root_cause(), ShineError::FreshnessExpired(_)));
    }
}
