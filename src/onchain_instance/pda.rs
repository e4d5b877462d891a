//! Program-derived address derivation and the seed conventions shared with
//! the on-chain programs. A seed string here is part of the wire contract:
//! if it differs from the one the program uses, the call fails authorization
//! on chain and nothing locally notices.

use solana_sdk::pubkey::{Pubkey, PubkeyError, MAX_SEED_LEN, MAX_SEEDS};

use crate::error::{Result, ShineError};

/// Seed of the payments program's global state account.
pub const STATE_SEED: &[u8] = b"shine_investments_state";

pub const METADATA_SEED: &[u8] = b"metadata";
pub const EDITION_SEED: &[u8] = b"edition";

/// Metaplex token metadata program
pub const TOKEN_METADATA_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

/// Derive a program address and its bump from `seeds` under `program_id`.
///
/// Bumps are tried from 255 down to 0 and the first candidate that is off the
/// ed25519 curve wins, so the result can never be a signable wallet key.
/// The same inputs always give the same `(address, bump)`.
pub fn derive_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<(Pubkey, u8)> {
    // one slot is reserved for the bump
    if seeds.len() >= MAX_SEEDS {
        return Err(ShineError::InvalidSeeds(format!(
            "{} seeds given, at most {} allowed",
            seeds.len(),
            MAX_SEEDS - 1
        )));
    }
    if let Some(seed) = seeds.iter().find(|seed| seed.len() > MAX_SEED_LEN) {
        return Err(ShineError::InvalidSeeds(format!(
            "seed of {} bytes exceeds {} bytes",
            seed.len(),
            MAX_SEED_LEN
        )));
    }

    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 1);
        with_bump.extend_from_slice(seeds);
        with_bump.push(&bump_seed);

        match Pubkey::create_program_address(&with_bump, program_id) {
            Ok(address) => return Ok((address, bump)),
            // candidate landed on the curve
            Err(PubkeyError::InvalidSeeds) => continue,
            Err(e) => return Err(ShineError::InvalidSeeds(e.to_string())),
        }
    }

    Err(ShineError::DerivationExhausted {
        program_id: *program_id,
        seed_count: seeds.len(),
    })
}

/// Check that `address` is what `seeds` + `bump` produce under `program_id`.
pub fn verify_address(seeds: &[&[u8]], bump: u8, program_id: &Pubkey, address: &Pubkey) -> bool {
    let bump_seed = [bump];
    let mut with_bump: Vec<&[u8]> = seeds.to_vec();
    with_bump.push(&bump_seed);
    Pubkey::create_program_address(&with_bump, program_id)
        .map(|derived| derived == *address)
        .unwrap_or(false)
}

pub fn state_address(program_id: &Pubkey) -> Result<(Pubkey, u8)> {
    derive_address(&[STATE_SEED], program_id)
}

pub fn metadata_address(mint: &Pubkey) -> Result<Pubkey> {
    derive_address(
        &[METADATA_SEED, TOKEN_METADATA_PROGRAM_ID.as_ref(), mint.as_ref()],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .map(|(address, _)| address)
}

pub fn master_edition_address(mint: &Pubkey) -> Result<Pubkey> {
    derive_address(
        &[
            METADATA_SEED,
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
            EDITION_SEED,
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .map(|(address, _)| address)
}
