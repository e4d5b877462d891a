//! Token helpers used around the core flow: mint creation, associated
//! token accounts and token-account state.

use serde::Serialize;
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer, system_instruction};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account,
};
use spl_token::{
    solana_program::program_pack::Pack,
    state::{Account as TokenAccount, Mint},
};
use tracing::info;

use crate::error::{Result, ShineError};
use crate::services::ledger::LedgerClient;
use crate::services::submitter::{Confirmed, TransactionSubmitter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenAccountState {
    pub mint: String,
    pub owner: String,
    pub amount: u64,
    pub frozen: bool,
}

/// Create a new mint with `authority` as both mint and freeze authority.
pub async fn create_mint(
    submitter: &TransactionSubmitter,
    authority: &Keypair,
    decimals: u8,
) -> Result<(Pubkey, Confirmed)> {
    let mint = Keypair::new();
    let rent = submitter
        .client()
        .minimum_balance_for_rent_exemption(Mint::LEN)
        .await?;

    let instructions = vec![
        system_instruction::create_account(
            &authority.pubkey(),
            &mint.pubkey(),
            rent,
            Mint::LEN as u64,
            &spl_token::ID,
        ),
        spl_token::instruction::initialize_mint2(
            &spl_token::ID,
            &mint.pubkey(),
            &authority.pubkey(),
            Some(&authority.pubkey()),
            decimals,
        )
        .map_err(|e| ShineError::schema("initialize_mint2", e.to_string()))?,
    ];

    let confirmed = submitter.submit(&instructions, authority, &[&mint]).await?;
    info!("Created mint {} ({})", mint.pubkey(), confirmed.signature);
    Ok((mint.pubkey(), confirmed))
}

/// Return the owner's associated token account for `mint`, creating it when
/// it does not exist yet.
pub async fn ensure_associated_account(
    submitter: &TransactionSubmitter,
    payer: &Keypair,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Result<(Pubkey, Option<Confirmed>)> {
    let ata = get_associated_token_address(owner, mint);
    if submitter.client().account_data(&ata).await?.is_some() {
        info!("Associated token account {} exists", ata);
        return Ok((ata, None));
    }

    let ix = create_associated_token_account(&payer.pubkey(), owner, mint, &spl_token::ID);
    let confirmed = submitter.submit(&[ix], payer, &[]).await?;
    info!("Created associated token account {} ({})", ata, confirmed.signature);
    Ok((ata, Some(confirmed)))
}

/// Decoded token-account state, `None` when the account does not exist.
pub async fn token_account_state(
    client: &dyn LedgerClient,
    address: &Pubkey,
) -> Result<Option<TokenAccountState>> {
    let Some(data) = client.account_data(address).await? else {
        return Ok(None);
    };
    let account = TokenAccount::unpack(&data).map_err(|e| ShineError::AccountDecode {
        address: *address,
        reason: e.to_string(),
    })?;
    Ok(Some(TokenAccountState {
        mint: account.mint.to_string(),
        owner: account.owner.to_string(),
        amount: account.amount,
        frozen: account.is_frozen(),
    }))
}
