//! # Shine E2E
//!
//! Transaction engine for driving the payments program end to end: derive
//! program addresses, encode raw instructions and submit them with
//! blockhash-expiry retry.

pub mod config;
pub mod error;
pub mod onchain_instance;
pub mod scenario;
pub mod services;

pub use error::{Result, ShineError};
pub use onchain_instance::calls::encode_call;
pub use onchain_instance::pda::derive_address;
pub use services::submitter::TransactionSubmitter;
