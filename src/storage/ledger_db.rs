// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded ledger database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `accounts`: account_id → serialized Account
//! - `owner_accounts`: `owner_id|ASSET` → account_id
//! - `memo_accounts`: memo_id → account_id
//! - `entries`: entry_id → serialized LedgerEntry
//! - `account_entries`: composite key (account_id bytes | !sequence) → entry_id
//! - `external_refs`: external reference → entry_id
//! - `settlement_intents`: intent_id → serialized SettlementIntent
//!
//! Reads go straight to redb. Balance-changing writes only happen through a
//! [`LedgerScope`], which holds the account row lock and commits everything
//! in one write transaction.

use std::ops::Bound;
use std::path::Path;
use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use redb::{Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::info;
use uuid::Uuid;

use super::locks::AccountLocks;
use super::scope::LedgerScope;
use crate::ledger::{
    Account, AccountId, AssetType, LedgerEntry, LedgerError, LedgerResult, OwnerId,
};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: account_id → serialized Account (JSON bytes).
pub(super) const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");

/// Unique index: `owner_id|ASSET` → account_id.
pub(super) const OWNER_ACCOUNTS: TableDefinition<&str, &str> =
    TableDefinition::new("owner_accounts");

/// Unique index: six-digit deposit memo → account_id.
pub(super) const MEMO_ACCOUNTS: TableDefinition<&str, &str> =
    TableDefinition::new("memo_accounts");

/// Append-only log: entry_id → serialized LedgerEntry.
pub(super) const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");

/// Index: `account_id (16 bytes) | !sequence_be` → entry_id, newest first.
pub(super) const ACCOUNT_ENTRIES: TableDefinition<&[u8], &str> =
    TableDefinition::new("account_entries");

/// Unique index: external reference → entry_id.
pub(super) const EXTERNAL_REFS: TableDefinition<&str, &str> =
    TableDefinition::new("external_refs");

/// Outbox: intent_id → serialized SettlementIntent.
pub(super) const SETTLEMENT_INTENTS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("settlement_intents");

const MEMO_ATTEMPTS: usize = 32;

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LedgerDbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid pagination cursor")]
    InvalidCursor,

    #[error("missing row: {0}")]
    MissingRow(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("account {0} changed outside its row lock")]
    Conflict(AccountId),

    #[error("could not allocate a unique deposit memo")]
    MemoExhausted,
}

pub type LedgerDbResult<T> = Result<T, LedgerDbError>;

// =============================================================================
// Keys & Pagination
// =============================================================================

pub(super) fn owner_key(owner_id: OwnerId, asset: &AssetType) -> String {
    format!("{owner_id}|{asset}")
}

/// `account_id | inverted sequence`, so a forward scan is newest first.
pub(super) fn entry_index_key(account_id: AccountId, sequence: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(account_id.0.as_bytes());
    key.extend_from_slice(&(!sequence).to_be_bytes());
    key
}

pub(super) fn parse_id(raw: &str) -> LedgerDbResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| LedgerDbError::Corrupt(format!("bad id '{raw}'")))
}

/// Deserialize the JSON row stored under `key`.
pub(super) fn read_json<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> LedgerDbResult<Option<T>> {
    let row = match table.get(key)? {
        Some(value) => Some(serde_json::from_slice(value.value())?),
        None => None,
    };
    Ok(row)
}

/// Resolve an index table entry to the id it points at.
pub(super) fn read_id(
    table: &impl ReadableTable<&'static str, &'static str>,
    key: &str,
) -> LedgerDbResult<Option<Uuid>> {
    let id = match table.get(key)? {
        Some(value) => Some(parse_id(value.value())?),
        None => None,
    };
    Ok(id)
}

fn generate_memo() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    let n = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) % 900_000 + 100_000;
    n.to_string()
}

fn encode_cursor(key: &[u8]) -> String {
    Base64UrlUnpadded::encode_string(key)
}

fn decode_cursor(cursor: &str, account_id: AccountId) -> LedgerDbResult<Vec<u8>> {
    let key = Base64UrlUnpadded::decode_vec(cursor).map_err(|_| LedgerDbError::InvalidCursor)?;
    if key.len() != 24 || &key[..16] != account_id.0.as_bytes() {
        return Err(LedgerDbError::InvalidCursor);
    }
    Ok(key)
}

/// Page size and continuation for history listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub cursor: Option<String>,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: usize = 50;
    pub const MAX_LIMIT: usize = 200;

    pub fn new(limit: Option<usize>, cursor: Option<String>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            cursor: cursor.filter(|c| !c.is_empty()),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone)]
pub struct EntryPage {
    pub entries: Vec<LedgerEntry>,
    pub next_cursor: Option<String>,
}

// =============================================================================
// LedgerDatabase
// =============================================================================

/// Embedded ACID ledger store plus the account row locks guarding it.
pub struct LedgerDatabase {
    db: Database,
    locks: AccountLocks,
}

impl LedgerDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path, lock_wait: Duration) -> LedgerDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ACCOUNTS)?;
            let _ = write_txn.open_table(OWNER_ACCOUNTS)?;
            let _ = write_txn.open_table(MEMO_ACCOUNTS)?;
            let _ = write_txn.open_table(ENTRIES)?;
            let _ = write_txn.open_table(ACCOUNT_ENTRIES)?;
            let _ = write_txn.open_table(EXTERNAL_REFS)?;
            let _ = write_txn.open_table(SETTLEMENT_INTENTS)?;
        }
        write_txn.commit()?;

        info!(path = %path.display(), "Ledger database opened");

        Ok(Self {
            db,
            locks: AccountLocks::new(lock_wait),
        })
    }

    /// Start a transaction scope. Nothing is written until
    /// [`LedgerScope::commit`]; dropping the scope rolls back.
    pub fn begin(&self) -> LedgerScope<'_> {
        LedgerScope::new(self)
    }

    pub(super) fn raw(&self) -> &Database {
        &self.db
    }

    pub(super) fn locks(&self) -> &AccountLocks {
        &self.locks
    }

    /// Verify the database answers a read transaction.
    pub fn health_check(&self) -> LedgerDbResult<()> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;
        let _ = table.first()?;
        Ok(())
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Create the account for `(owner_id, asset)` with a zero balance and a
    /// fresh deposit memo.
    pub fn create_account(&self, owner_id: OwnerId, asset: &AssetType) -> LedgerResult<Account> {
        let key = owner_key(owner_id, asset);

        let write_txn = self.db.begin_write().map_err(LedgerDbError::from)?;
        let account = {
            let mut owners = write_txn
                .open_table(OWNER_ACCOUNTS)
                .map_err(LedgerDbError::from)?;
            if owners
                .get(key.as_str())
                .map_err(LedgerDbError::from)?
                .is_some()
            {
                return Err(LedgerError::AlreadyExists(format!(
                    "{asset} account for owner {owner_id}"
                )));
            }

            let mut memos = write_txn
                .open_table(MEMO_ACCOUNTS)
                .map_err(LedgerDbError::from)?;
            let mut memo = None;
            for _ in 0..MEMO_ATTEMPTS {
                let candidate = generate_memo();
                if memos
                    .get(candidate.as_str())
                    .map_err(LedgerDbError::from)?
                    .is_none()
                {
                    memo = Some(candidate);
                    break;
                }
            }
            let memo = memo.ok_or(LedgerDbError::MemoExhausted)?;

            let account = Account::open(owner_id, asset.clone(), memo);
            let id = account.id.to_string();
            let json = serde_json::to_vec(&account).map_err(LedgerDbError::from)?;

            let mut accounts = write_txn.open_table(ACCOUNTS).map_err(LedgerDbError::from)?;
            accounts
                .insert(id.as_str(), json.as_slice())
                .map_err(LedgerDbError::from)?;
            owners
                .insert(key.as_str(), id.as_str())
                .map_err(LedgerDbError::from)?;
            memos
                .insert(account.memo_id.as_str(), id.as_str())
                .map_err(LedgerDbError::from)?;
            account
        };
        write_txn.commit().map_err(LedgerDbError::from)?;

        info!(
            account_id = %account.id,
            owner_id = %owner_id,
            asset = %asset,
            memo_id = %account.memo_id,
            "Account created"
        );
        Ok(account)
    }

    /// Account id for `(owner_id, asset)`, if one exists.
    pub fn find_account_id(
        &self,
        owner_id: OwnerId,
        asset: &AssetType,
    ) -> LedgerDbResult<Option<AccountId>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OWNER_ACCOUNTS)?;
        Ok(read_id(&table, &owner_key(owner_id, asset))?.map(AccountId))
    }

    pub fn get_account(&self, owner_id: OwnerId, asset: &AssetType) -> LedgerResult<Account> {
        let account_id = self.find_account_id(owner_id, asset)?.ok_or_else(|| {
            LedgerError::NotFound(format!("{asset} account for owner {owner_id}"))
        })?;
        self.get_account_by_id(account_id)
    }

    pub fn get_account_by_id(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.load_account(account_id)?
            .ok_or_else(|| LedgerError::NotFound(format!("account {account_id}")))
    }

    pub fn get_account_by_memo(&self, memo_id: &str) -> LedgerResult<Account> {
        let read_txn = self.db.begin_read().map_err(LedgerDbError::from)?;
        let table = read_txn
            .open_table(MEMO_ACCOUNTS)
            .map_err(LedgerDbError::from)?;
        let account_id = read_id(&table, memo_id)?
            .ok_or_else(|| LedgerError::NotFound(format!("deposit memo {memo_id}")))?;
        self.get_account_by_id(AccountId(account_id))
    }

    pub(super) fn load_account(&self, account_id: AccountId) -> LedgerDbResult<Option<Account>> {
        let read_txn = self.db.begin_read()?;
        read_account(&read_txn, account_id)
    }

    // =========================================================================
    // Transaction log
    // =========================================================================

    pub fn get_entry(&self, entry_id: Uuid) -> LedgerDbResult<Option<LedgerEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ENTRIES)?;
        read_json(&table, &entry_id.to_string())
    }

    /// Entry that recorded `reference`, if any.
    pub fn find_entry_by_reference(&self, reference: &str) -> LedgerDbResult<Option<LedgerEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EXTERNAL_REFS)?;
        match read_id(&table, reference)? {
            Some(entry_id) => self.get_entry(entry_id),
            None => Ok(None),
        }
    }

    /// Paginated listing of an account's entries, newest first.
    pub fn list_by_account(
        &self,
        account_id: AccountId,
        page: &PageRequest,
    ) -> LedgerDbResult<EntryPage> {
        let read_txn = self.db.begin_read()?;
        list_entries(&read_txn, account_id, page)
    }

    /// An account and one page of its history, read from the same snapshot.
    pub fn account_history(
        &self,
        account_id: AccountId,
        page: &PageRequest,
    ) -> LedgerResult<(Account, EntryPage)> {
        let read_txn = self.db.begin_read().map_err(LedgerDbError::from)?;
        let account = read_account(&read_txn, account_id)?
            .ok_or_else(|| LedgerError::NotFound(format!("account {account_id}")))?;
        let page = list_entries(&read_txn, account_id, page)?;
        Ok((account, page))
    }

    /// Sum of signed amounts over the whole log of an account, with the
    /// number of entries summed.
    pub fn entry_sum(&self, account_id: AccountId) -> LedgerDbResult<(Decimal, u64)> {
        let read_txn = self.db.begin_read()?;
        sum_entries(&read_txn, account_id)
    }

    /// An account together with the entry sum, from the same snapshot.
    pub fn account_with_entry_sum(
        &self,
        account_id: AccountId,
    ) -> LedgerResult<(Account, Decimal, u64)> {
        let read_txn = self.db.begin_read().map_err(LedgerDbError::from)?;
        let account = read_account(&read_txn, account_id)?
            .ok_or_else(|| LedgerError::NotFound(format!("account {account_id}")))?;
        let (sum, count) = sum_entries(&read_txn, account_id)?;
        Ok((account, sum, count))
    }
}

// =============================================================================
// Snapshot Reads
// =============================================================================

fn read_account(read_txn: &ReadTransaction, account_id: AccountId) -> LedgerDbResult<Option<Account>> {
    let table = read_txn.open_table(ACCOUNTS)?;
    read_json(&table, &account_id.to_string())
}

fn list_entries(
    read_txn: &ReadTransaction,
    account_id: AccountId,
    page: &PageRequest,
) -> LedgerDbResult<EntryPage> {
    let idx_table = read_txn.open_table(ACCOUNT_ENTRIES)?;
    let entries_table = read_txn.open_table(ENTRIES)?;

    let first = entry_index_key(account_id, u64::MAX);
    let last = entry_index_key(account_id, 0);
    let start = match page.cursor.as_deref() {
        Some(cursor) => Bound::Excluded(decode_cursor(cursor, account_id)?),
        None => Bound::Included(first),
    };
    let start = start.as_ref().map(Vec::as_slice);

    let mut entries = Vec::with_capacity(page.limit);
    let mut last_key: Option<Vec<u8>> = None;
    let mut has_more = false;

    for row in idx_table.range::<&[u8]>((start, Bound::Included(last.as_slice())))? {
        let (key, entry_id) = row?;
        if entries.len() == page.limit {
            has_more = true;
            break;
        }
        let entry_id = entry_id.value().to_string();
        let entry: LedgerEntry = read_json(&entries_table, &entry_id)?
            .ok_or_else(|| LedgerDbError::MissingRow(format!("entry {entry_id}")))?;
        entries.push(entry);
        last_key = Some(key.value().to_vec());
    }

    // Only hand out a cursor when another row is known to follow
    let next_cursor = if has_more {
        last_key.map(|k| encode_cursor(&k))
    } else {
        None
    };

    Ok(EntryPage {
        entries,
        next_cursor,
    })
}

fn sum_entries(read_txn: &ReadTransaction, account_id: AccountId) -> LedgerDbResult<(Decimal, u64)> {
    let idx_table = read_txn.open_table(ACCOUNT_ENTRIES)?;
    let entries_table = read_txn.open_table(ENTRIES)?;

    let first = entry_index_key(account_id, u64::MAX);
    let last = entry_index_key(account_id, 0);

    let mut sum = Decimal::ZERO;
    let mut count = 0u64;
    for row in idx_table.range(first.as_slice()..=last.as_slice())? {
        let (_, entry_id) = row?;
        let entry_id = entry_id.value().to_string();
        let entry: LedgerEntry = read_json(&entries_table, &entry_id)?
            .ok_or_else(|| LedgerDbError::MissingRow(format!("entry {entry_id}")))?;
        sum += entry.signed_amount();
        count += 1;
    }
    Ok((sum, count))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ledger::{EntryKind, ErrorKind, NewEntry};

    pub(crate) fn temp_db() -> (LedgerDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDatabase::open(&dir.path().join("test.redb"), Duration::from_secs(5))
            .unwrap();
        (db, dir)
    }

    fn sol() -> AssetType {
        AssetType::new("SOL").unwrap()
    }

    async fn deposit(db: &LedgerDatabase, owner: OwnerId, amount: &str) {
        let mut scope = db.begin();
        let account = scope.lock_account_for_update(owner, &sol()).await.unwrap();
        scope
            .append(account.id, NewEntry::new(EntryKind::Deposit, amount.parse().unwrap()))
            .unwrap();
        scope.commit().unwrap();
    }

    #[test]
    fn create_and_get_account() {
        let (db, _dir) = temp_db();
        let owner = OwnerId(Uuid::new_v4());
        let created = db.create_account(owner, &sol()).unwrap();

        let fetched = db.get_account(owner, &sol()).unwrap();
        assert_eq!(created, fetched);
        assert_eq!(fetched.balance, Decimal::ZERO);
        assert_eq!(fetched.memo_id.len(), 6);

        let by_memo = db.get_account_by_memo(&fetched.memo_id).unwrap();
        assert_eq!(by_memo.id, created.id);
    }

    #[test]
    fn second_account_for_same_pair_is_rejected() {
        let (db, _dir) = temp_db();
        let owner = OwnerId(Uuid::new_v4());
        db.create_account(owner, &sol()).unwrap();

        let err = db.create_account(owner, &sol()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        // Another asset is a different account
        assert!(db.create_account(owner, &AssetType::new("USDC").unwrap()).is_ok());
    }

    #[test]
    fn unknown_account_is_not_found() {
        let (db, _dir) = temp_db();
        let err = db.get_account(OwnerId(Uuid::new_v4()), &sol()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            db.get_account_by_memo("000000").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn index_key_orders_newest_first() {
        let account = AccountId::new();
        assert!(entry_index_key(account, 2) < entry_index_key(account, 1));
    }

    #[tokio::test]
    async fn list_by_account_with_pagination() {
        let (db, _dir) = temp_db();
        let owner = OwnerId(Uuid::new_v4());
        let account = db.create_account(owner, &sol()).unwrap();
        for i in 1..=5 {
            deposit(&db, owner, &i.to_string()).await;
        }

        let page1 = db.list_by_account(account.id, &PageRequest::new(Some(2), None)).unwrap();
        assert_eq!(page1.entries.len(), 2);
        assert_eq!(page1.entries[0].sequence, 5);
        assert_eq!(page1.entries[1].sequence, 4);
        assert!(page1.next_cursor.is_some());

        let page2 = db
            .list_by_account(account.id, &PageRequest::new(Some(2), page1.next_cursor))
            .unwrap();
        assert_eq!(page2.entries[0].sequence, 3);
        assert!(page2.next_cursor.is_some());

        let page3 = db
            .list_by_account(account.id, &PageRequest::new(Some(2), page2.next_cursor))
            .unwrap();
        assert_eq!(page3.entries.len(), 1);
        assert_eq!(page3.entries[0].sequence, 1);
        assert!(page3.next_cursor.is_none());
    }

    #[tokio::test]
    async fn exact_page_has_no_cursor() {
        let (db, _dir) = temp_db();
        let owner = OwnerId(Uuid::new_v4());
        let account = db.create_account(owner, &sol()).unwrap();
        deposit(&db, owner, "1").await;
        deposit(&db, owner, "2").await;

        let page = db.list_by_account(account.id, &PageRequest::new(Some(2), None)).unwrap();
        assert_eq!(page.entries.len(), 2);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn foreign_or_garbled_cursor_is_rejected() {
        let (db, _dir) = temp_db();
        let owner = OwnerId(Uuid::new_v4());
        let account = db.create_account(owner, &sol()).unwrap();

        let garbled = PageRequest::new(None, Some("!!not-base64!!".into()));
        assert!(matches!(
            db.list_by_account(account.id, &garbled),
            Err(LedgerDbError::InvalidCursor)
        ));

        let foreign = encode_cursor(&entry_index_key(AccountId::new(), 1));
        let foreign = PageRequest::new(None, Some(foreign));
        assert!(matches!(
            db.list_by_account(account.id, &foreign),
            Err(LedgerDbError::InvalidCursor)
        ));
    }

    #[tokio::test]
    async fn entry_sum_tracks_balance() {
        let (db, _dir) = temp_db();
        let owner = OwnerId(Uuid::new_v4());
        let account = db.create_account(owner, &sol()).unwrap();
        deposit(&db, owner, "10.5").await;
        deposit(&db, owner, "0.25").await;

        let (sum, count) = db.entry_sum(account.id).unwrap();
        assert_eq!(count, 2);
        assert_eq!(sum, db.get_account_by_id(account.id).unwrap().balance);
    }

    #[test]
    fn page_request_clamps_limit() {
        assert_eq!(PageRequest::new(Some(0), None).limit, 1);
        assert_eq!(PageRequest::new(Some(10_000), None).limit, PageRequest::MAX_LIMIT);
        assert_eq!(PageRequest::default().limit, PageRequest::DEFAULT_LIMIT);
        assert_eq!(PageRequest::new(None, Some(String::new())).cursor, None);
    }

    #[test]
    fn health_check_passes_on_open_db() {
        let (db, _dir) = temp_db();
        db.health_check().unwrap();
    }
}
