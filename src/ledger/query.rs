// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only projections. Nothing here takes a row lock; every view is read
//! from a single database snapshot.

use rust_decimal::Decimal;
use tracing::warn;

use super::account::{Account, AccountId, AssetType, OwnerId};
use super::engine::LedgerEngine;
use super::entry::LedgerEntry;
use super::error::LedgerResult;
use super::intent::SettlementIntent;
use crate::storage::PageRequest;

/// Balance plus one page of history, newest first.
#[derive(Debug, Clone)]
pub struct BalanceView {
    pub account: Account,
    pub balance: Decimal,
    pub entries: Vec<LedgerEntry>,
    pub next_cursor: Option<String>,
}

/// Stored balance checked against the sum of the log.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityReport {
    pub account_id: AccountId,
    pub balance: Decimal,
    pub entry_sum: Decimal,
    pub entry_count: u64,
    pub last_sequence: u64,
    pub consistent: bool,
}

impl LedgerEngine {
    pub fn get_balance_and_history(
        &self,
        owner_id: OwnerId,
        asset: &AssetType,
        page: &PageRequest,
    ) -> LedgerResult<BalanceView> {
        let account_id = self.get_account(owner_id, asset)?.id;
        let (account, page) = self.db().account_history(account_id, page)?;
        Ok(BalanceView {
            balance: account.balance,
            account,
            entries: page.entries,
            next_cursor: page.next_cursor,
        })
    }

    pub fn verify_account_integrity(&self, account_id: AccountId) -> LedgerResult<IntegrityReport> {
        let (account, entry_sum, entry_count) = self.db().account_with_entry_sum(account_id)?;
        let consistent = entry_sum == account.balance && entry_count == account.last_sequence;

        if !consistent {
            warn!(
                account_id = %account_id,
                balance = %account.balance,
                entry_sum = %entry_sum,
                entry_count,
                last_sequence = account.last_sequence,
                "Account balance does not match its log"
            );
        }

        Ok(IntegrityReport {
            account_id,
            balance: account.balance,
            entry_sum,
            entry_count,
            last_sequence: account.last_sequence,
            consistent,
        })
    }

    /// Settlement attempts whose outcome an operator has to establish.
    pub fn list_unresolved_intents(&self) -> LedgerResult<Vec<SettlementIntent>> {
        Ok(self.db().list_unresolved_intents()?)
    }
}
