// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction log entries.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::account::AccountId;
use super::amount::Amount;

/// Kind of balance-changing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    /// Credit from an inbound transfer.
    Deposit,
    /// Debit paid to a counterparty inside the system.
    Payment,
    /// Debit settled on-chain.
    WithdrawCrypto,
    /// Debit settled through a UPI payout.
    PayoutUpi,
}

impl EntryKind {
    pub fn is_debit(&self) -> bool {
        !matches!(self, Self::Deposit)
    }

    /// Apply the kind's sign to a positive amount.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        if self.is_debit() {
            -amount
        } else {
            amount
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::Payment => "PAYMENT",
            Self::WithdrawCrypto => "WITHDRAW_CRYPTO",
            Self::PayoutUpi => "PAYOUT_UPI",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form string metadata attached to an entry.
pub type EntryMetadata = BTreeMap<String, String>;

/// One immutable row of the transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: AccountId,
    /// Position in the account's log, starting at 1.
    pub sequence: u64,
    pub kind: EntryKind,
    /// Always positive; the sign comes from `kind`.
    pub amount: Decimal,
    pub external_reference: Option<String>,
    pub metadata: EntryMetadata,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }
}

/// An entry before the scope has assigned its sequence and resulting balance.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub kind: EntryKind,
    pub amount: Amount,
    pub external_reference: Option<String>,
    pub metadata: EntryMetadata,
}

impl NewEntry {
    pub fn new(kind: EntryKind, amount: Amount) -> Self {
        Self {
            kind,
            amount,
            external_reference: None,
            metadata: EntryMetadata::new(),
        }
    }

    pub fn with_external_reference(mut self, reference: impl Into<String>) -> Self {
        self.external_reference = Some(reference.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount.value())
    }
}
