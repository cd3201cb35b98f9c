// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger transaction scope.
//!
//! A scope is the only place balances change. It takes account row locks,
//! stages balance mutations and log entries in memory, and writes all of them
//! in a single redb write transaction on [`LedgerScope::commit`]. Dropping a
//! scope without committing discards everything staged and releases the
//! locks, which is how every error path rolls back.
//!
//! Appending an entry applies its signed amount to the locked account's
//! staged balance in the same call, so a log row can never exist without its
//! balance mutation and a debit that would overdraw is refused before it is
//! staged.

use chrono::Utc;
use redb::ReadableTable;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use uuid::Uuid;

use super::intents::apply_resolution;
use super::ledger_db::{
    entry_index_key, read_json, LedgerDatabase, LedgerDbError, LedgerDbResult, ACCOUNTS,
    ACCOUNT_ENTRIES, ENTRIES, EXTERNAL_REFS, SETTLEMENT_INTENTS,
};
use super::locks::AccountGuard;
use crate::ledger::{
    Account, AccountId, AssetType, IntentResolution, LedgerEntry, LedgerError, LedgerResult,
    NewEntry, OwnerId,
};

struct LockedAccount {
    _guard: AccountGuard,
    /// Row as read right after the lock was taken.
    original: Account,
    staged: Account,
}

/// What a successful commit wrote.
#[derive(Debug, Clone)]
pub struct Committed {
    pub accounts: Vec<Account>,
    pub entries: Vec<LedgerEntry>,
}

impl Committed {
    pub fn account(&self, account_id: AccountId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == account_id)
    }
}

enum WriteOutcome {
    Written,
    DuplicateReference(String),
}

pub struct LedgerScope<'db> {
    db: &'db LedgerDatabase,
    locked: Vec<LockedAccount>,
    entries: Vec<LedgerEntry>,
    intent: Option<(Uuid, IntentResolution)>,
    finished: bool,
}

impl<'db> LedgerScope<'db> {
    pub(super) fn new(db: &'db LedgerDatabase) -> Self {
        Self {
            db,
            locked: Vec::new(),
            entries: Vec::new(),
            intent: None,
            finished: false,
        }
    }

    /// Lock the `(owner_id, asset)` account for the rest of this scope and
    /// return its row as read after the lock was granted.
    pub async fn lock_account_for_update(
        &mut self,
        owner_id: OwnerId,
        asset: &AssetType,
    ) -> LedgerResult<Account> {
        let account_id = self.db.find_account_id(owner_id, asset)?.ok_or_else(|| {
            LedgerError::NotFound(format!("{asset} account for owner {owner_id}"))
        })?;
        self.lock_account_by_id(account_id).await
    }

    pub async fn lock_account_by_id(&mut self, account_id: AccountId) -> LedgerResult<Account> {
        if let Some(locked) = self.locked.iter().find(|l| l.staged.id == account_id) {
            return Ok(locked.staged.clone());
        }

        let guard = self.db.locks().acquire(account_id).await?;
        let account = self.db.get_account_by_id(account_id)?;

        debug!(
            account_id = %account_id,
            balance = %account.balance,
            sequence = account.last_sequence,
            "Account locked for update"
        );

        self.locked.push(LockedAccount {
            _guard: guard,
            original: account.clone(),
            staged: account.clone(),
        });
        Ok(account)
    }

    /// Staged view of a locked account.
    pub fn staged(&self, account_id: AccountId) -> Option<&Account> {
        self.locked
            .iter()
            .find(|l| l.staged.id == account_id)
            .map(|l| &l.staged)
    }

    /// Stage a log entry and the balance change it implies.
    ///
    /// Fails with [`LedgerError::InsufficientFunds`] if a debit would take the
    /// staged balance below zero; nothing is staged in that case.
    pub fn append(&mut self, account_id: AccountId, entry: NewEntry) -> LedgerResult<LedgerEntry> {
        let locked = self
            .locked
            .iter_mut()
            .find(|l| l.staged.id == account_id)
            .ok_or_else(|| {
                LedgerError::InvalidRequest(format!(
                    "account {account_id} is not locked in this scope"
                ))
            })?;

        let balance_after = locked.staged.balance + entry.signed_amount();
        if balance_after < Decimal::ZERO {
            return Err(LedgerError::InsufficientFunds {
                available: locked.staged.balance,
                requested: entry.amount.value(),
            });
        }

        let now = Utc::now();
        let staged = &mut locked.staged;
        staged.balance = balance_after;
        staged.last_sequence += 1;
        staged.updated_at = now;

        let row = LedgerEntry {
            id: Uuid::new_v4(),
            account_id,
            sequence: staged.last_sequence,
            kind: entry.kind,
            amount: entry.amount.value(),
            external_reference: entry.external_reference,
            metadata: entry.metadata,
            balance_after,
            created_at: now,
        };
        self.entries.push(row.clone());
        Ok(row)
    }

    /// Fill in the external reference of an entry staged without one.
    pub fn set_external_reference(
        &mut self,
        entry_id: Uuid,
        reference: impl Into<String>,
    ) -> LedgerResult<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| LedgerError::NotFound(format!("staged entry {entry_id}")))?;
        if entry.external_reference.is_some() {
            return Err(LedgerError::InvalidRequest(format!(
                "entry {entry_id} already carries an external reference"
            )));
        }
        entry.external_reference = Some(reference.into());
        Ok(())
    }

    /// Record `resolution` on a settlement intent as part of the commit.
    pub fn resolve_intent(&mut self, intent_id: Uuid, resolution: IntentResolution) {
        self.intent = Some((intent_id, resolution));
    }

    /// Write everything staged in one redb transaction and release the locks.
    pub fn commit(mut self) -> LedgerResult<Committed> {
        match self.write()? {
            WriteOutcome::DuplicateReference(reference) => {
                warn!(external_reference = %reference, "Commit refused: duplicate external reference");
                Err(LedgerError::DuplicateExternalReference(reference))
            }
            WriteOutcome::Written => {
                self.finished = true;
                let committed = Committed {
                    accounts: self.locked.iter().map(|l| l.staged.clone()).collect(),
                    entries: std::mem::take(&mut self.entries),
                };
                debug!(
                    accounts = committed.accounts.len(),
                    entries = committed.entries.len(),
                    "Ledger scope committed"
                );
                Ok(committed)
            }
        }
    }

    fn write(&self) -> LedgerDbResult<WriteOutcome> {
        let write_txn = self.db.raw().begin_write()?;
        {
            let mut accounts = write_txn.open_table(ACCOUNTS)?;
            for locked in &self.locked {
                let key = locked.original.id.to_string();
                let stored: Account = read_json(&accounts, &key)?
                    .ok_or_else(|| LedgerDbError::MissingRow(format!("account {key}")))?;
                if stored.last_sequence != locked.original.last_sequence
                    || stored.balance != locked.original.balance
                {
                    return Err(LedgerDbError::Conflict(stored.id));
                }
                if locked.staged.last_sequence != locked.original.last_sequence {
                    let json = serde_json::to_vec(&locked.staged)?;
                    accounts.insert(key.as_str(), json.as_slice())?;
                }
            }

            let mut entries = write_txn.open_table(ENTRIES)?;
            let mut index = write_txn.open_table(ACCOUNT_ENTRIES)?;
            let mut refs = write_txn.open_table(EXTERNAL_REFS)?;
            for entry in &self.entries {
                let id = entry.id.to_string();
                if let Some(reference) = &entry.external_reference {
                    if refs.get(reference.as_str())?.is_some() {
                        return Ok(WriteOutcome::DuplicateReference(reference.clone()));
                    }
                    refs.insert(reference.as_str(), id.as_str())?;
                }
                let json = serde_json::to_vec(entry)?;
                entries.insert(id.as_str(), json.as_slice())?;
                let key = entry_index_key(entry.account_id, entry.sequence);
                index.insert(key.as_slice(), id.as_str())?;
            }

            if let Some((intent_id, resolution)) = &self.intent {
                let mut intents = write_txn.open_table(SETTLEMENT_INTENTS)?;
                apply_resolution(&mut intents, *intent_id, resolution)?;
            }
        }
        write_txn.commit()?;
        Ok(WriteOutcome::Written)
    }
}

impl Drop for LedgerScope<'_> {
    fn drop(&mut self) {
        if !self.finished && !self.entries.is_empty() {
            debug!(
                accounts = self.locked.len(),
                entries = self.entries.len(),
                "Ledger scope rolled back"
            );
        }
    }
}
