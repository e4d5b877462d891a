//! # End-to-end Scenario
//!
//! Drives the payments program on a live cluster: initialise the state PDA,
//! mint a fresh NFT per item, call `add_bonus` for it and check the result.
//! Items are processed strictly one after another; the only thing carried
//! between them is the item index used to vary the bonus amount.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use tracing::{info, warn};

use crate::error::ShineError;
use crate::onchain_instance::{calls, pda};
use crate::services::submitter::{Confirmed, TransactionSubmitter};
use crate::services::token::{self, TokenAccountState};

/// Bonus of the single-item run
pub const SINGLE_BONUS_AMOUNT: u64 = 123_000_000;

const BASE_BONUS_AMOUNT: u64 = 100_000_000;
const BONUS_STEP: u64 = 10_000_000;

/// Bonus amount for the `index`-th item of a multi-item run.
pub fn bonus_amount(index: usize) -> u64 {
    BASE_BONUS_AMOUNT + index as u64 * BONUS_STEP
}

#[derive(Debug, Clone, Serialize)]
pub struct MintedItem {
    pub index: usize,
    pub mint: String,
    pub ata: String,
    pub add_bonus_signature: String,
    pub metadata_pda: String,
    pub amount: u64,
    pub frozen: Option<bool>,
}

pub struct Scenario {
    submitter: TransactionSubmitter,
    wallet: Keypair,
    program_id: Pubkey,
    collection_mint: Pubkey,
    explorer_cluster: String,
}

impl Scenario {
    pub fn new(
        submitter: TransactionSubmitter,
        wallet: Keypair,
        program_id: Pubkey,
        collection_mint: Pubkey,
        explorer_cluster: String,
    ) -> Self {
        Self {
            submitter,
            wallet,
            program_id,
            collection_mint,
            explorer_cluster,
        }
    }

    /// Call `init`. A failure usually means the state PDA already exists, so
    /// it is logged and the run continues.
    pub async fn ensure_initialized(&self) -> Result<Option<Confirmed>> {
        let (state, bump) = pda::state_address(&self.program_id)?;
        info!("State PDA {} (bump {})", state, bump);

        let ix = calls::init_instruction(&self.program_id, &self.wallet.pubkey())?;
        match self.submitter.submit(&[ix], &self.wallet, &[]).await {
            Ok(confirmed) => {
                info!("init() tx: {}", self.tx_url(&confirmed));
                Ok(Some(confirmed))
            }
            Err(e) => {
                warn!("init(): possibly already initialised -> {}", e);
                Ok(None)
            }
        }
    }

    /// Mint a fresh NFT to the wallet and call `add_bonus` for it.
    pub async fn issue_bonus(&self, index: usize, amount: u64) -> Result<MintedItem> {
        let owner = self.wallet.pubkey();

        let (mint, _) = token::create_mint(&self.submitter, &self.wallet, 0)
            .await
            .context("failed to create NFT mint")?;
        info!("[{}] NFT mint: {}", index + 1, mint);

        let (ata, _) = token::ensure_associated_account(&self.submitter, &self.wallet, &owner, &mint)
            .await
            .context("failed to prepare recipient token account")?;

        let accounts = calls::AddBonusAccounts {
            signer: owner,
            mint,
            recipient_ata: ata,
            recipient_owner: owner,
            collection_mint: self.collection_mint,
            collection_update_authority: owner,
        };
        let ix = calls::add_bonus_instruction(&self.program_id, &accounts, owner, amount)?;
        let confirmed = self
            .submitter
            .submit(&[ix], &self.wallet, &[])
            .await
            .context("add_bonus() failed")?;
        info!("[{}] add_bonus() tx: {}", index + 1, self.tx_url(&confirmed));

        let state = self.token_state(&ata).await?;
        Ok(MintedItem {
            index,
            mint: mint.to_string(),
            ata: ata.to_string(),
            add_bonus_signature: confirmed.signature.to_string(),
            metadata_pda: pda::metadata_address(&mint)?.to_string(),
            amount,
            frozen: state.map(|s| s.frozen),
        })
    }

    /// Single item, strictly verified: the token account must be frozen and
    /// the metadata account must exist with data.
    pub async fn run_single(&self) -> Result<MintedItem> {
        self.ensure_initialized().await?;
        let item = self.issue_bonus(0, SINGLE_BONUS_AMOUNT).await?;

        info!("Token account frozen: {:?}", item.frozen);
        if item.frozen != Some(true) {
            bail!("expected token account {} to be frozen after add_bonus()", item.ata);
        }

        if !self.metadata_present(&item).await? {
            bail!("metadata PDA {} is missing or empty", item.metadata_pda);
        }

        info!("Done: raw instructions landed, NFT minted and verified, token account frozen");
        Ok(item)
    }

    /// `count` items in sequence; verification is reported, not enforced.
    pub async fn run_multi(&self, count: usize) -> Result<Vec<MintedItem>> {
        self.ensure_initialized().await?;

        let mut minted = Vec::with_capacity(count);
        for index in 0..count {
            let item = self
                .issue_bonus(index, bonus_amount(index))
                .await
                .with_context(|| format!("item {}/{} failed", index + 1, count))?;
            let metadata = self.metadata_present(&item).await?;
            if item.frozen == Some(true) && metadata {
                info!("[{}/{}] verified: token account frozen, metadata present", index + 1, count);
            } else {
                warn!(
                    "[{}/{}] verification: frozen={:?} metadata_present={}",
                    index + 1,
                    count,
                    item.frozen,
                    metadata
                );
            }
            minted.push(item);
        }
        Ok(minted)
    }

    /// Log every minted item with explorer links, plus a JSON summary.
    pub fn report(&self, minted: &[MintedItem]) -> Result<String> {
        info!("==================== SUMMARY ====================");
        info!("Wallet: {}", self.wallet.pubkey());
        info!("Collection: {}", self.collection_mint);
        for item in minted {
            info!("[{}] Mint: {}", item.index + 1, self.address_url(&item.mint));
            info!("    TX : {}", self.signature_url(&item.add_bonus_signature));
        }
        info!("=================================================");
        Ok(serde_json::to_string_pretty(minted)?)
    }

    async fn metadata_present(&self, item: &MintedItem) -> Result<bool> {
        let metadata: Pubkey = item.metadata_pda.parse()?;
        let data = self
            .submitter
            .client()
            .account_data(&metadata)
            .await
            .map_err(ShineError::from)?;
        Ok(data.is_some_and(|d| !d.is_empty()))
    }

    async fn token_state(&self, ata: &Pubkey) -> Result<Option<TokenAccountState>> {
        Ok(token::token_account_state(self.submitter.client().as_ref(), ata).await?)
    }

    fn tx_url(&self, confirmed: &Confirmed) -> String {
        self.signature_url(&confirmed.signature.to_string())
    }

    fn signature_url(&self, signature: &str) -> String {
        format!(
            "https://explorer.solana.com/tx/{}?cluster={}",
            signature, self.explorer_cluster
        )
    }

    fn address_url(&self, address: &str) -> String {
        format!(
            "https://explorer.solana.com/address/{}?cluster={}",
            address, self.explorer_cluster
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onchain_instance::instruction::{discriminator, CallArgs};
    use crate::services::ledger::LedgerError;
    use crate::services::testing::{packed_token_account, ScriptedLedger};
    use solana_sdk::{instruction::AccountMeta, system_program, transaction::Transaction};
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Mimics the programs: ATA creation makes the account, `add_bonus`
    /// freezes it and writes the NFT metadata.
    fn program_effects(program_id: Pubkey) -> impl Fn(&Transaction, &mut HashMap<Pubkey, Vec<u8>>) {
        move |tx, accounts| {
            let keys = &tx.message.account_keys;
            for ix in &tx.message.instructions {
                let program = keys[ix.program_id_index as usize];
                let account = |i: usize| keys[ix.accounts[i] as usize];
                if program == spl_associated_token_account::ID {
                    accounts.insert(account(1), packed_token_account(account(3), account(2), false));
                } else if program == program_id && ix.data[..8] == discriminator("add_bonus") {
                    accounts.insert(account(3), packed_token_account(account(2), account(4), true));
                    accounts.insert(account(9), vec![4u8; 64]);
                }
            }
        }
    }

    fn scenario(ledger: Arc<ScriptedLedger>, program_id: Pubkey) -> Scenario {
        Scenario::new(
            TransactionSubmitter::new(ledger),
            Keypair::new(),
            program_id,
            Pubkey::new_unique(),
            "devnet".to_string(),
        )
    }

    #[test]
    fn test_bonus_amounts_increase_per_item() {
        assert_eq!(bonus_amount(0), 100_000_000);
        assert_eq!(bonus_amount(1), 110_000_000);
        assert_eq!(bonus_amount(2), 120_000_000);
    }

    #[tokio::test]
    async fn test_init_against_confirming_ledger() {
        let ledger = Arc::new(ScriptedLedger::default());
        let program_id = Pubkey::new_unique();
        let payer = Keypair::new();
        let (state, _) = pda::derive_address(&[b"state"], &program_id).unwrap();

        let ix = calls::encode_call(
            program_id,
            "init",
            vec![
                AccountMeta::new(payer.pubkey(), true),
                AccountMeta::new(state, false),
                AccountMeta::new_readonly(system_program::ID, false),
            ],
            &CallArgs::new(),
        )
        .unwrap();
        assert_eq!(ix.data, discriminator("init").to_vec());

        let confirmed = TransactionSubmitter::new(ledger.clone())
            .submit(&[ix], &payer, &[])
            .await
            .unwrap();
        assert_eq!(confirmed.attempts, 1);
        assert_eq!(ledger.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_single_run_verifies_frozen_account() {
        let program_id = Pubkey::new_unique();
        let ledger = Arc::new(ScriptedLedger::with_effect(program_effects(program_id)));
        let scenario = scenario(ledger.clone(), program_id);

        let item = scenario.run_single().await.unwrap();

        assert_eq!(item.frozen, Some(true));
        assert_eq!(item.amount, SINGLE_BONUS_AMOUNT);
        // init, mint, ATA, add_bonus
        assert_eq!(ledger.sent().len(), 4);
    }

    #[tokio::test]
    async fn test_single_run_fails_when_not_frozen() {
        let program_id = Pubkey::new_unique();
        // add_bonus confirms but nothing gets frozen
        let ledger = Arc::new(ScriptedLedger::with_effect(program_effects(Pubkey::new_unique())));
        let scenario = scenario(ledger, program_id);

        let err = scenario.run_single().await.unwrap_err();
        assert!(err.to_string().contains("frozen"));
    }

    #[tokio::test]
    async fn test_init_failure_does_not_stop_the_run() {
        let program_id = Pubkey::new_unique();
        let ledger = Arc::new(ScriptedLedger::with_effect(program_effects(program_id)));
        ledger.push_confirmation(Err(LedgerError::Rejected(
            "custom program error: 0x0 (account already in use)".to_string(),
        )));
        let scenario = scenario(ledger.clone(), program_id);

        assert!(scenario.ensure_initialized().await.unwrap().is_none());
        let minted = scenario.run_multi(1).await.unwrap();
        assert_eq!(minted.len(), 1);
    }

    #[tokio::test]
    async fn test_multi_run_is_sequential_with_distinct_amounts() {
        let program_id = Pubkey::new_unique();
        let ledger = Arc::new(ScriptedLedger::with_effect(program_effects(program_id)));
        let scenario = scenario(ledger.clone(), program_id);

        let minted = scenario.run_multi(3).await.unwrap();

        assert_eq!(minted.len(), 3);
        let amounts: Vec<u64> = minted.iter().map(|m| m.amount).collect();
        assert_eq!(amounts, vec![100_000_000, 110_000_000, 120_000_000]);
        assert!(minted.iter().all(|m| m.frozen == Some(true)));
        assert_ne!(minted[0].mint, minted[1].mint);

        // 1 init + 3 * (mint, ATA, add_bonus)
        assert_eq!(ledger.sent().len(), 10);

        let summary = scenario.report(&minted).unwrap();
        assert!(summary.contains(&minted[2].add_bonus_signature));
    }

    #[tokio::test]
    async fn test_multi_run_reports_unverified_items() {
        let program_id = Pubkey::new_unique();
        let ledger = Arc::new(ScriptedLedger::with_effect(program_effects(Pubkey::new_unique())));
        let scenario = scenario(ledger, program_id);

        let minted = scenario.run_multi(2).await.unwrap();
        assert_eq!(minted.len(), 2);
        assert!(minted.iter().all(|m| m.frozen == Some(false)));
    }

    #[tokio::test]
    async fn test_multi_run_stops_at_fatal_failure() {
        let program_id = Pubkey::new_unique();
        let ledger = Arc::new(ScriptedLedger::with_effect(program_effects(program_id)));
        // init ok, mint ok, ATA ok, add_bonus rejected
        ledger.push_confirmation(Ok(()));
        ledger.push_confirmation(Ok(()));
        ledger.push_confirmation(Ok(()));
        ledger.push_confirmation(Err(LedgerError::Rejected(
            "custom program error: 0x1770".to_string(),
        )));
        let scenario = scenario(ledger.clone(), program_id);

        let err = scenario.run_multi(2).await.unwrap_err();
        assert!(format!("{:#}", err).contains("item 1/2"));
        assert_eq!(ledger.sent().len(), 4);
    }
}
