//! Call table of the payments program.
//!
//! Account order mirrors each handler's `#[derive(Accounts)]` context and
//! must not be changed independently of the program.

use once_cell::sync::Lazy;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

use super::instruction::{AccountSlot, ArgSpec, ArgType, CallArgs, CallDescriptor};
use super::pda;
use crate::error::{Result, ShineError};

pub static INIT: Lazy<CallDescriptor> = Lazy::new(|| {
    CallDescriptor::new(
        "init",
        &[],
        &[
            AccountSlot::signer("payer", true),
            AccountSlot::writable("state_pda"),
            AccountSlot::readonly("system_program"),
        ],
    )
});

pub static INVEST: Lazy<CallDescriptor> = Lazy::new(|| {
    CallDescriptor::new(
        "invest",
        &[ArgSpec::new("amount", ArgType::U64)],
        &USE_STATE,
    )
});

pub static ADD_BONUS: Lazy<CallDescriptor> = Lazy::new(|| {
    CallDescriptor::new(
        "add_bonus",
        &[
            ArgSpec::new("investor", ArgType::Address),
            ArgSpec::new("amount", ArgType::U64),
        ],
        &[
            AccountSlot::signer("signer", true),
            AccountSlot::writable("state_pda"),
            AccountSlot::writable("mint_pda"),
            AccountSlot::writable("recipient_ata"),
            AccountSlot::readonly("recipient_owner"),
            AccountSlot::readonly("collection_mint"),
            AccountSlot::writable("collection_metadata_pda"),
            AccountSlot::writable("collection_master_edition_pda"),
            AccountSlot::signer("collection_update_authority", false),
            AccountSlot::writable("metadata_pda"),
            AccountSlot::writable("master_edition_pda"),
            AccountSlot::readonly("token_metadata_program"),
            AccountSlot::readonly("token_program"),
            AccountSlot::readonly("associated_token_program"),
            AccountSlot::readonly("system_program"),
        ],
    )
});

pub static CLAIM: Lazy<CallDescriptor> =
    Lazy::new(|| CallDescriptor::new("claim", &[], &USE_STATE));

pub static DELETE_INIT: Lazy<CallDescriptor> = Lazy::new(|| {
    CallDescriptor::new(
        "delete_init",
        &[],
        &[
            AccountSlot::signer("signer", true),
            AccountSlot::writable("state_pda"),
            AccountSlot::readonly("system_program"),
        ],
    )
});

const USE_STATE: [AccountSlot; 3] = [
    AccountSlot::signer("signer", false),
    AccountSlot::writable("state_pda"),
    AccountSlot::readonly("system_program"),
];

/// Look up a call by its program-side name.
pub fn descriptor(name: &str) -> Option<&'static CallDescriptor> {
    let table: [&'static Lazy<CallDescriptor>; 5] = [&INIT, &INVEST, &ADD_BONUS, &CLAIM, &DELETE_INIT];
    table
        .into_iter()
        .map(|call| &**call)
        .find(|call| call.name() == name)
}

/// Encode a call by name against the program's call table.
pub fn encode_call(
    program_id: Pubkey,
    name: &str,
    accounts: Vec<AccountMeta>,
    args: &CallArgs,
) -> Result<Instruction> {
    let call = descriptor(name)
        .ok_or_else(|| ShineError::schema(name, "no such call in the program"))?;
    call.encode(program_id, accounts, args)
}

fn bind(call: &CallDescriptor, addresses: &[Pubkey]) -> Vec<AccountMeta> {
    call.accounts()
        .iter()
        .zip(addresses)
        .map(|(slot, address)| slot.meta(*address))
        .collect()
}

pub fn init_instruction(program_id: &Pubkey, payer: &Pubkey) -> Result<Instruction> {
    let (state, _) = pda::state_address(program_id)?;
    let accounts = bind(&INIT, &[*payer, state, system_program::ID]);
    INIT.encode(*program_id, accounts, &CallArgs::new())
}

pub fn invest_instruction(program_id: &Pubkey, signer: &Pubkey, amount: u64) -> Result<Instruction> {
    let (state, _) = pda::state_address(program_id)?;
    let accounts = bind(&INVEST, &[*signer, state, system_program::ID]);
    INVEST.encode(*program_id, accounts, &CallArgs::new().with("amount", amount))
}

pub fn claim_instruction(program_id: &Pubkey, signer: &Pubkey) -> Result<Instruction> {
    let (state, _) = pda::state_address(program_id)?;
    let accounts = bind(&CLAIM, &[*signer, state, system_program::ID]);
    CLAIM.encode(*program_id, accounts, &CallArgs::new())
}

pub fn delete_init_instruction(program_id: &Pubkey, signer: &Pubkey) -> Result<Instruction> {
    let (state, _) = pda::state_address(program_id)?;
    let accounts = bind(&DELETE_INIT, &[*signer, state, system_program::ID]);
    DELETE_INIT.encode(*program_id, accounts, &CallArgs::new())
}

/// Caller-supplied accounts of `add_bonus`; PDAs and program ids are
/// derived from these.
#[derive(Debug, Clone)]
pub struct AddBonusAccounts {
    pub signer: Pubkey,
    pub mint: Pubkey,
    pub recipient_ata: Pubkey,
    pub recipient_owner: Pubkey,
    pub collection_mint: Pubkey,
    pub collection_update_authority: Pubkey,
}

pub fn add_bonus_instruction(
    program_id: &Pubkey,
    accounts: &AddBonusAccounts,
    investor: Pubkey,
    amount: u64,
) -> Result<Instruction> {
    let (state, _) = pda::state_address(program_id)?;
    let addresses = [
        accounts.signer,
        state,
        accounts.mint,
        accounts.recipient_ata,
        accounts.recipient_owner,
        accounts.collection_mint,
        pda::metadata_address(&accounts.collection_mint)?,
        pda::master_edition_address(&accounts.collection_mint)?,
        accounts.collection_update_authority,
        pda::metadata_address(&accounts.mint)?,
        pda::master_edition_address(&accounts.mint)?,
        pda::TOKEN_METADATA_PROGRAM_ID,
        spl_token::ID,
        spl_associated_token_account::ID,
        system_program::ID,
    ];
    let args = CallArgs::new()
        .with("investor", investor)
        .with("amount", amount);
    ADD_BONUS.encode(*program_id, bind(&ADD_BONUS, &addresses), &args)
}
