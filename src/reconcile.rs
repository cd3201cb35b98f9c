// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Settlement Reconciliation Sweeper
//!
//! Background task that flags settlement intents stuck in `PENDING`.
//!
//! An intent is pending only while its withdrawal is waiting on the
//! settlement provider. If it is still pending long after the settlement
//! timeout, the process handling it died or the request was cancelled
//! mid-call: the ledger debit was rolled back, but the provider may or may
//! not have moved the funds. The sweeper moves such intents to
//! `NEEDS_REVIEW` so they show up in the admin reconciliation view.
//!
//! It never re-credits or re-debits anything.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::storage::LedgerDatabase;

pub struct ReconciliationSweeper {
    db: Arc<LedgerDatabase>,
    interval: Duration,
    stale_after: Duration,
}

impl ReconciliationSweeper {
    pub fn new(db: Arc<LedgerDatabase>, interval: Duration, stale_after: Duration) -> Self {
        Self {
            db,
            interval,
            stale_after,
        }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            stale_after_secs = self.stale_after.as_secs(),
            "Reconciliation sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Reconciliation sweeper shutting down");
                return;
            }

            self.sweep();

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Reconciliation sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// One pass: flag every intent pending for longer than `stale_after`.
    /// Returns the number of intents flagged.
    pub fn sweep(&self) -> usize {
        let stale_after = match chrono::Duration::from_std(self.stale_after) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "Reconciliation sweeper: staleness threshold out of range");
                return 0;
            }
        };

        match self.db.flag_stale_intents(Utc::now() - stale_after) {
            Ok(flagged) => {
                for intent in &flagged {
                    warn!(
                        intent_id = %intent.id,
                        account_id = %intent.account_id,
                        amount = %intent.amount,
                        destination = %intent.destination,
                        "Settlement intent went stale, needs review"
                    );
                }
                flagged.len()
            }
            Err(e) => {
                warn!(error = %e, "Reconciliation sweeper: sweep failed");
                0
            }
        }
    }
}
