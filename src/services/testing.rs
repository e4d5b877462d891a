//! In-memory ledger used by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};

use spl_token::{
    solana_program::program_pack::Pack,
    state::{Account as TokenAccount, AccountState},
};

use super::ledger::{Freshness, LedgerClient, LedgerError, SendOptions};

type Effect = Box<dyn Fn(&Transaction, &mut HashMap<Pubkey, Vec<u8>>) + Send + Sync>;

/// Scripted ledger: queued blockhashes, broadcast failures and confirmation
/// results are consumed in order; once a queue is empty it hands out a fresh
/// blockhash, accepts the broadcast or confirms.
#[derive(Default)]
pub struct ScriptedLedger {
    blockhashes: Mutex<VecDeque<Hash>>,
    broadcast_failures: Mutex<VecDeque<LedgerError>>,
    confirmations: Mutex<VecDeque<Result<(), LedgerError>>>,
    fetches: Mutex<u32>,
    sent: Mutex<Vec<Transaction>>,
    accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    effect: Option<Effect>,
}

impl ScriptedLedger {
    /// Applies `effect` to the account store for every confirmed transaction.
    pub fn with_effect(
        effect: impl Fn(&Transaction, &mut HashMap<Pubkey, Vec<u8>>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            effect: Some(Box::new(effect)),
            ..Self::default()
        }
    }

    pub fn push_blockhash(&self, blockhash: Hash) {
        self.blockhashes.lock().unwrap().push_back(blockhash);
    }

    pub fn push_broadcast_failure(&self, err: LedgerError) {
        self.broadcast_failures.lock().unwrap().push_back(err);
    }

    pub fn push_confirmation(&self, result: Result<(), LedgerError>) {
        self.confirmations.lock().unwrap().push_back(result);
    }

    pub fn set_account(&self, address: Pubkey, data: Vec<u8>) {
        self.accounts.lock().unwrap().insert(address, data);
    }

    pub fn blockhash_fetches(&self) -> u32 {
        *self.fetches.lock().unwrap()
    }

    pub fn sent(&self) -> Vec<Transaction> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn latest_blockhash(&self, _commitment: CommitmentConfig) -> Result<Freshness, LedgerError> {
        *self.fetches.lock().unwrap() += 1;
        let blockhash = self
            .blockhashes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Hash::new_unique);
        Ok(Freshness {
            blockhash,
            last_valid_block_height: 150,
        })
    }

    async fn broadcast(
        &self,
        transaction: &Transaction,
        _options: &SendOptions,
    ) -> Result<Signature, LedgerError> {
        self.sent.lock().unwrap().push(transaction.clone());
        match self.broadcast_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(transaction.signatures[0]),
        }
    }

    async fn await_confirmation(
        &self,
        signature: &Signature,
        _freshness: &Freshness,
        _commitment: CommitmentConfig,
    ) -> Result<(), LedgerError> {
        let result = self
            .confirmations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()));

        if result.is_ok() {
            if let Some(effect) = &self.effect {
                let sent = self.sent.lock().unwrap();
                if let Some(tx) = sent.iter().rev().find(|tx| tx.signatures[0] == *signature) {
                    let mut accounts = self.accounts.lock().unwrap();
                    effect(tx, &mut *accounts);
                }
            }
        }
        result
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, LedgerError> {
        Ok(data_len as u64 * 6_960)
    }
}

/// Packed SPL token account as the token program would store it.
pub fn packed_token_account(mint: Pubkey, owner: Pubkey, frozen: bool) -> Vec<u8> {
    let account = TokenAccount {
        mint,
        owner,
        amount: 1,
        state: if frozen {
            AccountState::Frozen
        } else {
            AccountState::Initialized
        },
        ..TokenAccount::default()
    };
    let mut data = vec![0u8; TokenAccount::LEN];
    TokenAccount::pack(account, &mut data).unwrap();
    data
}
