// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger Storage Module
//!
//! Persistent state lives in a single **redb** database file. redb is the
//! only source of truth: balances are never cached in process, every read
//! opens a read transaction and every balance change is one write
//! transaction.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   ledger.redb
//!     accounts            account_id -> Account
//!     owner_accounts      owner_id|ASSET -> account_id
//!     memo_accounts       memo_id -> account_id
//!     entries             entry_id -> LedgerEntry
//!     account_entries     account_id|!sequence -> entry_id
//!     external_refs       external_reference -> entry_id
//!     settlement_intents  intent_id -> SettlementIntent
//! ```
//!
//! ## Concurrency
//!
//! redb serializes write transactions globally, which is not enough on its
//! own: a debit has to read a balance, wait on a settlement provider and then
//! write. [`AccountLocks`] holds one async mutex per account across that
//! whole span, and [`LedgerScope`] refuses to commit if the row it read has
//! moved underneath it.

pub mod intents;
pub mod ledger_db;
pub mod locks;
pub mod scope;

pub use ledger_db::{EntryPage, LedgerDatabase, LedgerDbError, LedgerDbResult, PageRequest};
pub use locks::{AccountGuard, AccountLocks};
pub use scope::{Committed, LedgerScope};
