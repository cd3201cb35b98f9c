// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Settlement intent outbox.
//!
//! Intents are written in their own short write transaction before the
//! settlement adapter is called, so a record of the attempt survives even if
//! the ledger scope around it never commits.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, Table};
use uuid::Uuid;

use super::ledger_db::{read_json, LedgerDatabase, LedgerDbError, LedgerDbResult, SETTLEMENT_INTENTS};
use crate::ledger::{IntentResolution, IntentStatus, SettlementIntent};

/// Read-modify-write of one intent inside an open write transaction.
pub(super) fn apply_resolution(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    intent_id: Uuid,
    resolution: &IntentResolution,
) -> LedgerDbResult<SettlementIntent> {
    let key = intent_id.to_string();
    let mut intent: SettlementIntent = read_json(&*table, &key)?
        .ok_or_else(|| LedgerDbError::MissingRow(format!("settlement intent {key}")))?;
    resolution.apply(&mut intent);

    let json = serde_json::to_vec(&intent)?;
    table.insert(key.as_str(), json.as_slice())?;
    Ok(intent)
}

impl LedgerDatabase {
    pub fn record_intent(&self, intent: &SettlementIntent) -> LedgerDbResult<()> {
        let json = serde_json::to_vec(intent)?;
        let write_txn = self.raw().begin_write()?;
        {
            let mut table = write_txn.open_table(SETTLEMENT_INTENTS)?;
            table.insert(intent.id.to_string().as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_intent(&self, intent_id: Uuid) -> LedgerDbResult<Option<SettlementIntent>> {
        let read_txn = self.raw().begin_read()?;
        let table = read_txn.open_table(SETTLEMENT_INTENTS)?;
        read_json(&table, &intent_id.to_string())
    }

    /// Record the outcome of an attempt outside any ledger scope.
    pub fn resolve_intent(
        &self,
        intent_id: Uuid,
        resolution: &IntentResolution,
    ) -> LedgerDbResult<SettlementIntent> {
        let write_txn = self.raw().begin_write()?;
        let intent = {
            let mut table = write_txn.open_table(SETTLEMENT_INTENTS)?;
            apply_resolution(&mut table, intent_id, resolution)?
        };
        write_txn.commit()?;
        Ok(intent)
    }

    /// Intents matching `filter`, oldest first.
    pub fn list_intents(
        &self,
        filter: impl Fn(&SettlementIntent) -> bool,
    ) -> LedgerDbResult<Vec<SettlementIntent>> {
        let read_txn = self.raw().begin_read()?;
        let table = read_txn.open_table(SETTLEMENT_INTENTS)?;

        let mut intents = Vec::new();
        for row in table.iter()? {
            let (_, value) = row?;
            let intent: SettlementIntent = serde_json::from_slice(value.value())?;
            if filter(&intent) {
                intents.push(intent);
            }
        }
        intents.sort_by_key(|i| i.created_at);
        Ok(intents)
    }

    /// Intents whose external outcome an operator has to establish.
    pub fn list_unresolved_intents(&self) -> LedgerDbResult<Vec<SettlementIntent>> {
        self.list_intents(|i| i.status.is_unresolved())
    }

    /// Move every intent still pending since before `cutoff` to
    /// [`IntentStatus::NeedsReview`]. Returns the intents flagged.
    pub fn flag_stale_intents(&self, cutoff: DateTime<Utc>) -> LedgerDbResult<Vec<SettlementIntent>> {
        let write_txn = self.raw().begin_write()?;
        let flagged = {
            let mut table = write_txn.open_table(SETTLEMENT_INTENTS)?;

            let mut stale = Vec::new();
            for row in table.iter()? {
                let (_, value) = row?;
                let intent: SettlementIntent = serde_json::from_slice(value.value())?;
                if intent.status == IntentStatus::Pending && intent.created_at < cutoff {
                    stale.push(intent.id);
                }
            }

            let resolution = IntentResolution::with_error(
                IntentStatus::NeedsReview,
                format!("no outcome recorded before {}", cutoff.to_rfc3339()),
            );
            let mut flagged = Vec::with_capacity(stale.len());
            for intent_id in stale {
                flagged.push(apply_resolution(&mut table, intent_id, &resolution)?);
            }
            flagged
        };
        write_txn.commit()?;
        Ok(flagged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AccountId, AssetType, EntryKind, OwnerId};
    use crate::storage::ledger_db::tests::temp_db;
    use rust_decimal_macros::dec;

    fn pending() -> SettlementIntent {
        SettlementIntent::pending(
            AccountId::new(),
            OwnerId(Uuid::new_v4()),
            AssetType::new("SOL").unwrap(),
            dec!(2),
            EntryKind::WithdrawCrypto,
            "solana:addr",
        )
    }

    #[test]
    fn record_and_resolve() {
        let (db, _dir) = temp_db();
        let intent = pending();
        db.record_intent(&intent).unwrap();

        let entry_id = Uuid::new_v4();
        let resolved = db
            .resolve_intent(intent.id, &IntentResolution::settled("sig-1", entry_id))
            .unwrap();
        assert_eq!(resolved.status, IntentStatus::Settled);
        assert_eq!(resolved.entry_id, Some(entry_id));

        let stored = db.get_intent(intent.id).unwrap().unwrap();
        assert_eq!(stored.external_reference.as_deref(), Some("sig-1"));
    }

    #[test]
    fn resolving_unknown_intent_fails() {
        let (db, _dir) = temp_db();
        let err = db
            .resolve_intent(
                Uuid::new_v4(),
                &IntentResolution::with_error(IntentStatus::Failed, "x"),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerDbError::MissingRow(_)));
    }

    #[test]
    fn only_unknown_and_needs_review_are_unresolved() {
        let (db, _dir) = temp_db();
        let statuses = [
            IntentStatus::Pending,
            IntentStatus::Settled,
            IntentStatus::Failed,
            IntentStatus::Unknown,
            IntentStatus::NeedsReview,
        ];
        for status in statuses {
            let intent = pending();
            db.record_intent(&intent).unwrap();
            db.resolve_intent(intent.id, &IntentResolution::with_error(status, "test"))
                .unwrap();
        }

        let unresolved = db.list_unresolved_intents().unwrap();
        assert_eq!(unresolved.len(), 2);
        assert!(unresolved.iter().all(|i| i.status.is_unresolved()));
    }

    #[test]
    fn stale_pending_intents_are_flagged() {
        let (db, _dir) = temp_db();

        let mut old = pending();
        old.created_at = Utc::now() - chrono::Duration::minutes(10);
        db.record_intent(&old).unwrap();

        let fresh = pending();
        db.record_intent(&fresh).unwrap();

        let flagged = db
            .flag_stale_intents(Utc::now() - chrono::Duration::minutes(5))
            .unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].id, old.id);
        assert_eq!(flagged[0].status, IntentStatus::NeedsReview);

        let fresh = db.get_intent(fresh.id).unwrap().unwrap();
        assert_eq!(fresh.status, IntentStatus::Pending);
    }
}
