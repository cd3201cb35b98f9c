// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet Ledger - Custodial Balance Ledger Service
//!
//! Holds custodial user balances per `(owner, asset)` account. Every balance
//! change is appended to an immutable transaction log in the same ACID
//! transaction that updates the balance, and debits on one account are
//! serialized so a balance can never go negative.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `ledger` - Domain types and the ledger engine
//! - `storage` - Embedded ledger database (redb) and per-account locks
//! - `settlement` - Outbound transfer rails (on-chain, UPI)
//! - `reconcile` - Background sweeper for stale settlement intents

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod reconcile;
pub mod settlement;
pub mod state;
pub mod storage;
