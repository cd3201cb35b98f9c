// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger error taxonomy.
//!
//! Every failure a ledger operation can report maps to one stable
//! [`ErrorKind`]. The kind is what callers branch on; the message is for
//! humans. Whatever the kind, a failed operation leaves every balance
//! exactly as it was.

use serde::Serialize;
use utoipa::ToSchema;

use crate::settlement::SettlementError;
use crate::storage::LedgerDbError;

/// Stable, machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    InvalidAmount,
    InsufficientFunds,
    AlreadyExists,
    SettlementFailed,
    DuplicateExternalReference,
    Timeout,
    InvalidRequest,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::SettlementFailed => "SETTLEMENT_FAILED",
            Self::DuplicateExternalReference => "DUPLICATE_EXTERNAL_REFERENCE",
            Self::Timeout => "TIMEOUT",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Storage => "STORAGE",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient funds: balance {available}, requested {requested}")]
    InsufficientFunds {
        available: rust_decimal::Decimal,
        requested: rust_decimal::Decimal,
    },

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("settlement failed: {0}")]
    SettlementFailed(#[from] SettlementError),

    #[error("external reference {0} is already recorded")]
    DuplicateExternalReference(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(#[from] LedgerDbError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::SettlementFailed(_) => ErrorKind::SettlementFailed,
            Self::DuplicateExternalReference(_) => ErrorKind::DuplicateExternalReference,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Storage(LedgerDbError::InvalidCursor) => ErrorKind::InvalidRequest,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn kinds_are_stable() {
        let err = LedgerError::InsufficientFunds {
            available: dec!(60),
            requested: dec!(100),
        };
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(err.kind().as_str(), "INSUFFICIENT_FUNDS");
        assert_eq!(
            LedgerError::DuplicateExternalReference("sig".into()).kind(),
            ErrorKind::DuplicateExternalReference
        );
    }

    #[test]
    fn bad_cursor_is_a_request_error() {
        let err = LedgerError::from(LedgerDbError::InvalidCursor);
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn kind_serializes_as_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::SettlementFailed).unwrap();
        assert_eq!(json, r#""SETTLEMENT_FAILED""#);
    }
}
