//! # Onchain Program Instance Module
//!
//! Everything needed to talk to the payments program without an IDL-driven
//! client: program-derived addresses and raw instruction encoding.
//!
//! ## Features
//! - Deterministic PDA derivation (bump search from 255 down)
//! - Anchor-compatible discriminators and fixed little-endian argument layout
//! - Descriptors for every program call used by the end-to-end run

/// Program-derived address search
pub mod pda;

/// Call descriptors and raw instruction encoding
pub mod instruction;

/// The payments program's calls and their account layouts
pub mod calls;
