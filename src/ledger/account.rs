// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account identity and balance records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::LedgerError;

/// Identity of the user owning an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub Uuid);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for OwnerId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for OwnerId {
    type Err = LedgerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| LedgerError::InvalidRequest(format!("'{raw}' is not a valid owner id")))
    }
}

/// Ledger account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = LedgerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| LedgerError::InvalidRequest(format!("'{raw}' is not a valid account id")))
    }
}

/// Asset symbol, e.g. `SOL`. Always upper-case ASCII alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetType(String);

impl AssetType {
    pub const MAX_LEN: usize = 10;

    pub fn new(raw: &str) -> Result<Self, LedgerError> {
        let symbol = raw.trim().to_ascii_uppercase();
        if symbol.is_empty() || symbol.len() > Self::MAX_LEN {
            return Err(LedgerError::InvalidRequest(format!(
                "asset symbol must be 1 to {} characters",
                Self::MAX_LEN
            )));
        }
        if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(LedgerError::InvalidRequest(format!(
                "asset symbol '{raw}' must be alphanumeric"
            )));
        }
        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AssetType {
    type Err = LedgerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::new(raw)
    }
}

impl TryFrom<String> for AssetType {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<AssetType> for String {
    fn from(value: AssetType) -> Self {
        value.0
    }
}

/// One balance record per `(owner, asset)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner_id: OwnerId,
    pub asset_type: AssetType,
    /// Never negative once a scope has committed.
    pub balance: Decimal,
    /// Six-digit memo used to match inbound vault deposits to this account.
    pub memo_id: String,
    /// Sequence number of the newest entry, 0 when the log is empty.
    pub last_sequence: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn open(owner_id: OwnerId, asset_type: AssetType, memo_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            owner_id,
            asset_type,
            balance: Decimal::ZERO,
            memo_id,
            last_sequence: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
