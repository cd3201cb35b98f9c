// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Custodial Ledger
//!
//! Holds one balance per `(owner, asset)` and changes it only through three
//! operations: [`LedgerEngine::deposit`], [`LedgerEngine::pay`] and
//! [`LedgerEngine::withdraw_external`]. Each runs inside a
//! [`LedgerScope`](crate::storage::LedgerScope) that locks the account row,
//! re-reads the balance, appends to the transaction log and commits as one
//! unit.
//!
//! ## Guarantees
//!
//! - A committed balance is never negative.
//! - A balance always equals the signed sum of its log entries.
//! - Debits on one account are totally ordered; each one sees the balance
//!   left by the previous one.
//! - An external reference is recorded at most once across the whole log.
//! - A withdrawal only commits after the settlement provider confirmed it.

pub mod account;
pub mod amount;
pub mod engine;
pub mod entry;
pub mod error;
pub mod intent;
pub mod query;

pub use account::{Account, AccountId, AssetType, OwnerId};
pub use amount::{max_amount, Amount, AMOUNT_SCALE};
pub use engine::{LedgerEngine, Receipt, DEFAULT_DEPOSIT_METHOD, DEFAULT_RECIPIENT};
pub use entry::{EntryKind, EntryMetadata, LedgerEntry, NewEntry};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use intent::{IntentResolution, IntentStatus, SettlementIntent};
pub use query::{BalanceView, IntegrityReport};
