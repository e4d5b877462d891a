//! # Services Module
//!
//! Network-facing services: the ledger client seam, the retrying
//! transaction submitter and token-program helpers.

/// Ledger client trait and its JSON-RPC implementation
pub mod ledger;

/// Blockhash-expiry aware transaction submission
pub mod submitter;

pub mod token;

#[cfg(test)]
pub mod testing;
