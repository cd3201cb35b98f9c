// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger engine: the three balance-changing operations.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::account::{Account, AssetType, OwnerId};
use super::amount::{max_amount, Amount};
use super::entry::{EntryKind, LedgerEntry, NewEntry};
use super::error::{LedgerError, LedgerResult};
use super::intent::{IntentResolution, IntentStatus, SettlementIntent};
use crate::settlement::{Destination, SettlementAdapter, SettlementError, SettlementRequest};
use crate::storage::{Committed, LedgerDatabase, LedgerDbError};

/// Deposit `method` recorded when the caller names none.
pub const DEFAULT_DEPOSIT_METHOD: &str = "simulated";

/// Payment `recipient` recorded when the caller names none.
pub const DEFAULT_RECIPIENT: &str = "External";

/// Result of a committed operation.
#[derive(Debug, Clone)]
pub struct Receipt {
    /// Account row as committed.
    pub account: Account,
    pub entry: LedgerEntry,
}

impl Receipt {
    pub fn new_balance(&self) -> Decimal {
        self.account.balance
    }

    pub fn external_reference(&self) -> Option<&str> {
        self.entry.external_reference.as_deref()
    }

    fn from_commit(committed: Committed, entry: &LedgerEntry) -> LedgerResult<Self> {
        let account = committed
            .account(entry.account_id)
            .cloned()
            .ok_or_else(|| LedgerDbError::MissingRow(format!("account {}", entry.account_id)))?;
        let entry = committed
            .entries
            .into_iter()
            .find(|e| e.id == entry.id)
            .ok_or_else(|| LedgerDbError::MissingRow(format!("entry {}", entry.id)))?;
        Ok(Self { account, entry })
    }
}

pub struct LedgerEngine {
    db: Arc<LedgerDatabase>,
    settlement_timeout: Duration,
}

impl LedgerEngine {
    pub fn new(db: Arc<LedgerDatabase>, settlement_timeout: Duration) -> Self {
        Self {
            db,
            settlement_timeout,
        }
    }

    pub fn db(&self) -> &LedgerDatabase {
        &self.db
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    pub fn create_account(&self, owner_id: OwnerId, asset: &AssetType) -> LedgerResult<Account> {
        self.db.create_account(owner_id, asset)
    }

    pub fn get_account(&self, owner_id: OwnerId, asset: &AssetType) -> LedgerResult<Account> {
        self.db.get_account(owner_id, asset)
    }

    pub fn get_account_by_memo(&self, memo_id: &str) -> LedgerResult<Account> {
        self.db.get_account_by_memo(memo_id)
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Credit `amount`. A non-empty `external_reference` (the inbound
    /// transfer's signature) can only ever be credited once.
    #[instrument(skip(self, asset, amount), fields(asset = %asset, amount = %amount))]
    pub async fn deposit(
        &self,
        owner_id: OwnerId,
        asset: &AssetType,
        amount: Amount,
        external_reference: Option<String>,
        method: Option<String>,
    ) -> LedgerResult<Receipt> {
        let mut scope = self.db.begin();
        let account = scope.lock_account_for_update(owner_id, asset).await?;

        if account.balance + amount.value() > max_amount() {
            return Err(LedgerError::InvalidAmount(format!(
                "deposit of {amount} would take the balance above {}",
                max_amount()
            )));
        }

        let method = method
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DEPOSIT_METHOD.to_string());
        let mut entry = NewEntry::new(EntryKind::Deposit, amount).with_metadata("method", method);
        if let Some(reference) = external_reference.filter(|r| !r.trim().is_empty()) {
            entry = entry.with_external_reference(reference);
        }

        let entry = scope.append(account.id, entry)?;
        let receipt = Receipt::from_commit(scope.commit()?, &entry)?;

        info!(
            account_id = %account.id,
            entry_id = %receipt.entry.id,
            new_balance = %receipt.new_balance(),
            "Deposit committed"
        );
        Ok(receipt)
    }

    /// Debit `amount` to a counterparty inside the system.
    #[instrument(skip(self, asset, amount), fields(asset = %asset, amount = %amount))]
    pub async fn pay(
        &self,
        owner_id: OwnerId,
        asset: &AssetType,
        amount: Amount,
        recipient: Option<String>,
    ) -> LedgerResult<Receipt> {
        let mut scope = self.db.begin();
        let account = scope.lock_account_for_update(owner_id, asset).await?;

        let recipient = recipient
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RECIPIENT.to_string());
        let entry = NewEntry::new(EntryKind::Payment, amount).with_metadata("recipient", recipient);

        let entry = match scope.append(account.id, entry) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(account_id = %account.id, error = %e, "Payment refused");
                return Err(e);
            }
        };
        let receipt = Receipt::from_commit(scope.commit()?, &entry)?;

        info!(
            account_id = %account.id,
            entry_id = %receipt.entry.id,
            new_balance = %receipt.new_balance(),
            "Payment committed"
        );
        Ok(receipt)
    }

    /// Debit `amount` and move it out through `adapter`.
    ///
    /// The account stays locked while the adapter runs. The debit commits
    /// only if the adapter confirms the transfer within the settlement
    /// timeout; otherwise it is rolled back and the attempt stays on record
    /// as a settlement intent.
    #[instrument(
        skip(self, asset, amount, destination, adapter),
        fields(asset = %asset, amount = %amount, destination = %destination, adapter = adapter.name())
    )]
    pub async fn withdraw_external(
        &self,
        owner_id: OwnerId,
        asset: &AssetType,
        amount: Amount,
        destination: Destination,
        adapter: &dyn SettlementAdapter,
    ) -> LedgerResult<Receipt> {
        let mut scope = self.db.begin();
        let account = scope.lock_account_for_update(owner_id, asset).await?;

        let kind = destination.entry_kind();
        let mut entry = NewEntry::new(kind, amount).with_metadata("adapter", adapter.name());
        entry = match &destination {
            Destination::OnChain { chain, address } => entry
                .with_metadata("chain", chain.as_str())
                .with_metadata("recipient", address.as_str()),
            Destination::Upi { vpa, name } => entry
                .with_metadata("upi_id", vpa.as_str())
                .with_metadata("name", name.as_str()),
        };

        // External reference stays pending until the adapter answers
        let entry = match scope.append(account.id, entry) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(account_id = %account.id, error = %e, "Withdrawal refused");
                return Err(e);
            }
        };

        let intent = SettlementIntent::pending(
            account.id,
            owner_id,
            asset.clone(),
            amount.value(),
            kind,
            destination.to_string(),
        );
        self.db.record_intent(&intent)?;

        let request = SettlementRequest {
            idempotency_key: intent.id,
            destination,
            asset: asset.clone(),
            amount: amount.value(),
        };

        let outcome = tokio::time::timeout(self.settlement_timeout, adapter.transfer(&request)).await;
        let settled = match outcome {
            Ok(Ok(receipt)) if !receipt.external_reference.trim().is_empty() => receipt,
            Ok(Ok(_)) => {
                let err = SettlementError::InvalidResponse("empty external reference".into());
                self.settle_intent(intent.id, IntentResolution::with_error(IntentStatus::Unknown, err.to_string()));
                return Err(err.into());
            }
            Ok(Err(err)) => {
                warn!(intent_id = %intent.id, error = %err, "Settlement rejected, rolling back");
                self.settle_intent(intent.id, IntentResolution::with_error(IntentStatus::Failed, err.to_string()));
                return Err(err.into());
            }
            Err(_) => {
                let err = SettlementError::TimedOut(self.settlement_timeout.as_millis() as u64);
                warn!(intent_id = %intent.id, error = %err, "Settlement timed out, rolling back");
                self.settle_intent(intent.id, IntentResolution::with_error(IntentStatus::Unknown, err.to_string()));
                return Err(err.into());
            }
        };

        let reference = settled.external_reference;
        scope.set_external_reference(entry.id, reference.clone())?;
        scope.resolve_intent(intent.id, IntentResolution::settled(reference.clone(), entry.id));

        let committed = match scope.commit() {
            Ok(committed) => committed,
            Err(e) => {
                error!(
                    intent_id = %intent.id,
                    external_reference = %reference,
                    error = %e,
                    "Settlement confirmed but ledger commit failed"
                );
                self.settle_intent(intent.id, IntentResolution::needs_review(reference, e.to_string()));
                return Err(e);
            }
        };
        let receipt = Receipt::from_commit(committed, &entry)?;

        info!(
            account_id = %account.id,
            entry_id = %receipt.entry.id,
            intent_id = %intent.id,
            external_reference = %reference,
            new_balance = %receipt.new_balance(),
            "Withdrawal settled"
        );
        Ok(receipt)
    }

    /// Record an intent outcome outside the ledger scope. A failure here must
    /// not mask the error already being returned.
    fn settle_intent(&self, intent_id: Uuid, resolution: IntentResolution) {
        let status = resolution.status;
        if let Err(e) = self.db.resolve_intent(intent_id, &resolution) {
            error!(
                intent_id = %intent_id,
                status = ?status,
                error = %e,
                "Failed to record settlement outcome"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ErrorKind;
    use crate::settlement::{SimulatedMode, SimulatedSettlement};
    use rust_decimal_macros::dec;

    fn engine_with(lock_wait: Duration, settlement_timeout: Duration) -> (Arc<LedgerEngine>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDatabase::open(&dir.path().join("ledger.redb"), lock_wait).unwrap();
        (Arc::new(LedgerEngine::new(Arc::new(db), settlement_timeout)), dir)
    }

    fn engine() -> (Arc<LedgerEngine>, tempfile::TempDir) {
        engine_with(Duration::from_secs(5), Duration::from_secs(5))
    }

    fn sol() -> AssetType {
        AssetType::new("SOL").unwrap()
    }

    fn amt(raw: &str) -> Amount {
        raw.parse().unwrap()
    }

    fn solana(address: &str) -> Destination {
        Destination::OnChain {
            chain: "solana".into(),
            address: address.into(),
        }
    }

    fn upi() -> Destination {
        Destination::Upi {
            vpa: "bob@bank".into(),
            name: "Bob".into(),
        }
    }

    async fn funded(engine: &LedgerEngine, balance: &str) -> OwnerId {
        let owner = OwnerId(Uuid::new_v4());
        engine.create_account(owner, &sol()).unwrap();
        engine
            .deposit(owner, &sol(), amt(balance), None, None)
            .await
            .unwrap();
        owner
    }

    fn assert_consistent(engine: &LedgerEngine, owner: OwnerId) {
        let account = engine.get_account(owner, &sol()).unwrap();
        let (sum, count) = engine.db().entry_sum(account.id).unwrap();
        assert_eq!(sum, account.balance);
        assert_eq!(count, account.last_sequence);
        assert!(account.balance >= Decimal::ZERO);
    }

    #[tokio::test]
    async fn deposit_pay_overdraw_scenario() {
        let (engine, _dir) = engine();
        let owner = OwnerId(Uuid::new_v4());
        engine.create_account(owner, &sol()).unwrap();

        let deposit = engine
            .deposit(owner, &sol(), amt("100"), None, None)
            .await
            .unwrap();
        assert_eq!(deposit.new_balance(), dec!(100));
        assert_eq!(
            deposit.entry.metadata.get("method").map(String::as_str),
            Some(DEFAULT_DEPOSIT_METHOD)
        );

        let paid = engine
            .pay(owner, &sol(), amt("40"), Some("alice".into()))
            .await
            .unwrap();
        assert_eq!(paid.new_balance(), dec!(60));
        assert_eq!(paid.entry.metadata.get("recipient").map(String::as_str), Some("alice"));

        let err = engine
            .pay(owner, &sol(), amt("100"), Some("bob".into()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

        let account = engine.get_account(owner, &sol()).unwrap();
        assert_eq!(account.balance, dec!(60));
        assert_eq!(account.last_sequence, 2);
        assert_consistent(&engine, owner);
    }

    #[tokio::test]
    async fn paying_exact_balance_empties_account() {
        let (engine, _dir) = engine();
        let owner = funded(&engine, "12.34567891").await;

        let receipt = engine.pay(owner, &sol(), amt("12.34567891"), None).await.unwrap();
        assert_eq!(receipt.new_balance(), Decimal::ZERO);
        assert_eq!(
            receipt.entry.metadata.get("recipient").map(String::as_str),
            Some(DEFAULT_RECIPIENT)
        );
    }

    #[tokio::test]
    async fn paying_one_unit_over_balance_fails() {
        let (engine, _dir) = engine();
        let owner = funded(&engine, "5").await;

        let err = engine
            .pay(owner, &sol(), amt("5.00000001"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(engine.get_account(owner, &sol()).unwrap().balance, dec!(5));
    }

    #[tokio::test]
    async fn operations_on_missing_account_are_not_found() {
        let (engine, _dir) = engine();
        let owner = OwnerId(Uuid::new_v4());
        let err = engine.deposit(owner, &sol(), amt("1"), None, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = engine.pay(owner, &sol(), amt("1"), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn deposit_above_maximum_balance_is_invalid() {
        let (engine, _dir) = engine();
        let owner = funded(&engine, "9999999999").await;
        let err = engine
            .deposit(owner, &sol(), amt("1"), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
    }

    #[tokio::test]
    async fn same_inbound_reference_is_credited_once() {
        let (engine, _dir) = engine();
        let owner = funded(&engine, "1").await;

        engine
            .deposit(owner, &sol(), amt("2"), Some("sig-in-1".into()), Some("vault".into()))
            .await
            .unwrap();
        let err = engine
            .deposit(owner, &sol(), amt("2"), Some("sig-in-1".into()), Some("vault".into()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateExternalReference);
        assert_eq!(engine.get_account(owner, &sol()).unwrap().balance, dec!(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_references_commit_once() {
        let (engine, _dir) = engine();
        let owner = funded(&engine, "1").await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine
                    .deposit(owner, &sol(), amt("1"), Some("sig-race".into()), None)
                    .await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::DuplicateExternalReference),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(engine.get_account(owner, &sol()).unwrap().balance, dec!(2));
        assert_consistent(&engine, owner);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn two_concurrent_payments_on_sixty() {
        let (engine, _dir) = engine();
        let owner = funded(&engine, "60").await;

        let a = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.pay(owner, &sol(), amt("50"), None).await })
        };
        let b = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.pay(owner, &sol(), amt("50"), None).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 1);
        let failed = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(failed.kind(), ErrorKind::InsufficientFunds);

        assert_eq!(engine.get_account(owner, &sol()).unwrap().balance, dec!(10));
        assert_consistent(&engine, owner);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn many_concurrent_debits_never_overdraw() {
        let (engine, _dir) = engine();
        let owner = funded(&engine, "100").await;

        let adapter = Arc::new(SimulatedSettlement::new("solana", "SIG").with_latency(Duration::from_millis(2)));
        let mut handles = Vec::new();
        for i in 0..40 {
            let engine = Arc::clone(&engine);
            let adapter = Arc::clone(&adapter);
            handles.push(tokio::spawn(async move {
                let amount = amt("7");
                let result = if i % 2 == 0 {
                    engine.pay(owner, &sol(), amount, None).await
                } else {
                    engine
                        .withdraw_external(owner, &sol(), amount, solana("addr"), adapter.as_ref())
                        .await
                };
                result.map(|r| r.entry.amount)
            }));
        }

        let mut spent = Decimal::ZERO;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(amount) => spent += amount,
                Err(e) => assert_eq!(e.kind(), ErrorKind::InsufficientFunds),
            }
        }

        // 14 debits of 7 fit in 100
        assert_eq!(spent, dec!(98));
        let account = engine.get_account(owner, &sol()).unwrap();
        assert_eq!(account.balance, dec!(100) - spent);
        assert_consistent(&engine, owner);
    }

    #[tokio::test]
    async fn withdrawal_records_reference_and_settles_intent() {
        let (engine, _dir) = engine();
        let owner = funded(&engine, "10").await;
        let adapter = SimulatedSettlement::new("solana", "SIG");

        let receipt = engine
            .withdraw_external(owner, &sol(), amt("4"), solana("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"), &adapter)
            .await
            .unwrap();
        assert_eq!(receipt.new_balance(), dec!(6));
        assert_eq!(receipt.entry.kind, EntryKind::WithdrawCrypto);
        assert_eq!(receipt.entry.metadata.get("chain").map(String::as_str), Some("solana"));

        let reference = receipt.external_reference().unwrap().to_string();
        assert!(reference.starts_with("SIG-"));
        let stored = engine.db().find_entry_by_reference(&reference).unwrap().unwrap();
        assert_eq!(stored.id, receipt.entry.id);

        let settled = engine
            .db()
            .list_intents(|i| i.status == IntentStatus::Settled)
            .unwrap();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].entry_id, Some(receipt.entry.id));
        assert_eq!(settled[0].external_reference.as_deref(), Some(reference.as_str()));
    }

    #[tokio::test]
    async fn upi_payout_is_logged_as_payout() {
        let (engine, _dir) = engine();
        let owner = funded(&engine, "10").await;
        let adapter = SimulatedSettlement::new("upi", "PAYOUT");

        let receipt = engine
            .withdraw_external(owner, &sol(), amt("2.5"), upi(), &adapter)
            .await
            .unwrap();
        assert_eq!(receipt.entry.kind, EntryKind::PayoutUpi);
        assert_eq!(receipt.entry.metadata.get("upi_id").map(String::as_str), Some("bob@bank"));
    }

    #[tokio::test]
    async fn failing_adapter_rolls_back() {
        let (engine, _dir) = engine();
        let owner = funded(&engine, "60").await;
        let adapter =
            SimulatedSettlement::new("solana", "SIG").with_mode(SimulatedMode::Fail("vault offline".into()));

        let err = engine
            .withdraw_external(owner, &sol(), amt("60"), solana("addr"), &adapter)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SettlementFailed);

        let account = engine.get_account(owner, &sol()).unwrap();
        assert_eq!(account.balance, dec!(60));
        assert_eq!(account.last_sequence, 1);

        let failed = engine.db().list_intents(|i| i.status == IntentStatus::Failed).unwrap();
        assert_eq!(failed.len(), 1);
        assert!(engine.db().list_unresolved_intents().unwrap().is_empty());
    }

    #[tokio::test]
    async fn settlement_timeout_rolls_back_and_flags_intent() {
        let (engine, _dir) = engine_with(Duration::from_secs(5), Duration::from_millis(50));
        let owner = funded(&engine, "60").await;
        let adapter = SimulatedSettlement::new("solana", "SIG").with_mode(SimulatedMode::Hang);

        let err = engine
            .withdraw_external(owner, &sol(), amt("10"), solana("addr"), &adapter)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SettlementFailed);
        assert!(matches!(
            err,
            LedgerError::SettlementFailed(SettlementError::TimedOut(50))
        ));

        assert_eq!(engine.get_account(owner, &sol()).unwrap().balance, dec!(60));
        let unresolved = engine.db().list_unresolved_intents().unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].status, IntentStatus::Unknown);
    }

    #[tokio::test]
    async fn cancelled_withdrawal_keeps_balance_and_pending_intent() {
        let (engine, _dir) = engine_with(Duration::from_secs(1), Duration::from_secs(30));
        let owner = funded(&engine, "60").await;
        let adapter = SimulatedSettlement::new("solana", "SIG").with_mode(SimulatedMode::Hang);

        // Caller gives up while the adapter call is in flight
        let cancelled = tokio::time::timeout(
            Duration::from_millis(30),
            engine.withdraw_external(owner, &sol(), amt("10"), solana("addr"), &adapter),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(adapter.calls(), 1);

        let account = engine.get_account(owner, &sol()).unwrap();
        assert_eq!(account.balance, dec!(60));
        assert_eq!(account.last_sequence, 1);

        let intents = engine.db().list_intents(|_| true).unwrap();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].status, IntentStatus::Pending);

        // Row lock was released with the dropped scope
        let receipt = engine.pay(owner, &sol(), amt("5"), None).await.unwrap();
        assert_eq!(receipt.new_balance(), dec!(55));
        assert_consistent(&engine, owner);
    }

    #[tokio::test]
    async fn withdrawal_without_funds_never_calls_adapter() {
        let (engine, _dir) = engine();
        let owner = funded(&engine, "1").await;
        let adapter = SimulatedSettlement::new("solana", "SIG");

        let err = engine
            .withdraw_external(owner, &sol(), amt("2"), solana("addr"), &adapter)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(adapter.calls(), 0);
        assert!(engine.db().list_intents(|_| true).unwrap().is_empty());
    }

    #[tokio::test]
    async fn reused_settlement_reference_needs_review() {
        let (engine, _dir) = engine();
        let owner = funded(&engine, "10").await;
        let adapter = SimulatedSettlement::new("solana", "SIG").with_fixed_reference("SIG-SAME");

        engine
            .withdraw_external(owner, &sol(), amt("1"), solana("addr"), &adapter)
            .await
            .unwrap();
        let err = engine
            .withdraw_external(owner, &sol(), amt("1"), solana("addr"), &adapter)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateExternalReference);
        assert_eq!(engine.get_account(owner, &sol()).unwrap().balance, dec!(9));

        let unresolved = engine.db().list_unresolved_intents().unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].status, IntentStatus::NeedsReview);
        assert_eq!(unresolved[0].external_reference.as_deref(), Some("SIG-SAME"));
    }

    #[tokio::test]
    async fn lock_wait_is_bounded() {
        let (engine, _dir) = engine_with(Duration::from_millis(50), Duration::from_secs(5));
        let owner = funded(&engine, "10").await;

        // Hold the row lock from a scope that never commits
        let mut holder = engine.db().begin();
        holder.lock_account_for_update(owner, &sol()).await.unwrap();

        let err = engine.pay(owner, &sol(), amt("1"), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        drop(holder);
        assert!(engine.pay(owner, &sol(), amt("1"), None).await.is_ok());
    }
}
