// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-account row locks.
//!
//! Each account has one fair async mutex. Holding its guard is what gives a
//! ledger scope the right to read a balance and write it back: a second scope
//! on the same account waits (FIFO) until the first commits or rolls back,
//! then re-reads. Scopes on different accounts never contend.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::ledger::{AccountId, LedgerError, LedgerResult};

/// Exclusive hold on one account row. Released on drop.
#[derive(Debug)]
pub struct AccountGuard {
    account_id: AccountId,
    _guard: OwnedMutexGuard<()>,
}

impl AccountGuard {
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }
}

pub struct AccountLocks {
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
    max_wait: Duration,
}

impl AccountLocks {
    pub fn new(max_wait: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            max_wait,
        }
    }

    /// Wait for the row lock of `account_id`, failing with
    /// [`LedgerError::Timeout`] after the configured wait.
    pub async fn acquire(&self, account_id: AccountId) -> LedgerResult<AccountGuard> {
        let mutex = self
            .locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(self.max_wait, mutex.lock_owned()).await {
            Ok(guard) => Ok(AccountGuard {
                account_id,
                _guard: guard,
            }),
            Err(_) => {
                warn!(
                    account_id = %account_id,
                    wait_ms = self.max_wait.as_millis() as u64,
                    "Gave up waiting for account lock"
                );
                Err(LedgerError::Timeout(format!(
                    "account {account_id} stayed locked for more than {} ms",
                    self.max_wait.as_millis()
                )))
            }
        }
    }
}
