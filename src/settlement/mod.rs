// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # External Settlement
//!
//! The ledger never moves value outside itself. When a withdrawal leaves the
//! system (an on-chain transfer from the vault, a UPI payout) the engine hands
//! the transfer to a [`SettlementAdapter`] and waits for its answer before the
//! debit commits.
//!
//! Adapters only have to honour one contract: return the external reference
//! of a transfer that happened, or an error for one that did not. The engine
//! bounds every call with a deadline, so an adapter that hangs is treated as
//! failed and the debit is rolled back.

use std::fmt;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::{AssetType, EntryKind};

pub mod simulated;

pub use simulated::{SimulatedMode, SimulatedSettlement};

/// Where an outbound transfer goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Destination {
    /// A wallet address on a public chain.
    OnChain { chain: String, address: String },
    /// A UPI virtual payment address and the beneficiary's name.
    Upi { vpa: String, name: String },
}

impl Destination {
    /// Log entry kind for a debit settled to this destination.
    pub fn entry_kind(&self) -> EntryKind {
        match self {
            Self::OnChain { .. } => EntryKind::WithdrawCrypto,
            Self::Upi { .. } => EntryKind::PayoutUpi,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnChain { chain, address } => write!(f, "{chain}:{address}"),
            Self::Upi { vpa, .. } => write!(f, "upi:{vpa}"),
        }
    }
}

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Whether `address` has the shape of a Solana address (base58, 32 to 44
/// characters). Does not verify it is on the ed25519 curve.
pub fn is_solana_address(address: &str) -> bool {
    (32..=44).contains(&address.len()) && address.chars().all(|c| BASE58_ALPHABET.contains(c))
}

/// A transfer the adapter is asked to perform.
#[derive(Debug, Clone)]
pub struct SettlementRequest {
    /// Settlement intent id; stable across retries of the same attempt.
    pub idempotency_key: Uuid,
    pub destination: Destination,
    pub asset: AssetType,
    pub amount: Decimal,
}

/// Proof that a transfer happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReceipt {
    /// Transaction signature or payout reference.
    pub external_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error("transfer rejected: {0}")]
    Rejected(String),

    #[error("settlement provider unavailable: {0}")]
    Unavailable(String),

    #[error("no answer from settlement provider within {0} ms")]
    TimedOut(u64),

    #[error("settlement provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Outbound transfer rail consumed by the ledger engine.
#[async_trait]
pub trait SettlementAdapter: Send + Sync {
    /// Short name used in logs and entry metadata.
    fn name(&self) -> &str;

    async fn transfer(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementReceipt, SettlementError>;
}
