// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Settlement intents: the durable record of every outbound transfer attempt.
//!
//! An intent is written before the settlement adapter is called and resolved
//! when the outcome is known. A debit is only ever committed together with
//! its intent moving to [`IntentStatus::Settled`]. Intents left in any other
//! non-terminal state are what an operator reconciles against the external
//! system.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::account::{AccountId, AssetType, OwnerId};
use super::entry::EntryKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    /// Adapter call in flight, or the process died while it was.
    Pending,
    /// Adapter confirmed and the ledger committed.
    Settled,
    /// Adapter rejected the transfer; nothing moved.
    Failed,
    /// Adapter did not answer before the deadline; outcome unknown.
    Unknown,
    /// Adapter confirmed but the ledger could not commit, or the attempt
    /// went stale while pending.
    NeedsReview,
}

impl IntentStatus {
    /// Statuses an operator has to look at.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unknown | Self::NeedsReview)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementIntent {
    pub id: Uuid,
    pub account_id: AccountId,
    pub owner_id: OwnerId,
    pub asset_type: AssetType,
    pub amount: Decimal,
    pub kind: EntryKind,
    /// Human-readable destination (address or UPI id).
    pub destination: String,
    pub status: IntentStatus,
    pub external_reference: Option<String>,
    /// Ledger entry written when the intent settled.
    pub entry_id: Option<Uuid>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SettlementIntent {
    pub fn pending(
        account_id: AccountId,
        owner_id: OwnerId,
        asset_type: AssetType,
        amount: Decimal,
        kind: EntryKind,
        destination: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            owner_id,
            asset_type,
            amount,
            kind,
            destination: destination.into(),
            status: IntentStatus::Pending,
            external_reference: None,
            entry_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome to record on an intent.
#[derive(Debug, Clone)]
pub struct IntentResolution {
    pub status: IntentStatus,
    pub external_reference: Option<String>,
    pub entry_id: Option<Uuid>,
    pub error: Option<String>,
}

impl IntentResolution {
    pub fn settled(external_reference: impl Into<String>, entry_id: Uuid) -> Self {
        Self {
            status: IntentStatus::Settled,
            external_reference: Some(external_reference.into()),
            entry_id: Some(entry_id),
            error: None,
        }
    }

    pub fn with_error(status: IntentStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            external_reference: None,
            entry_id: None,
            error: Some(error.into()),
        }
    }

    /// The provider confirmed `external_reference` but the ledger did not
    /// record it.
    pub fn needs_review(external_reference: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: IntentStatus::NeedsReview,
            external_reference: Some(external_reference.into()),
            entry_id: None,
            error: Some(error.into()),
        }
    }

    pub(crate) fn apply(&self, intent: &mut SettlementIntent) {
        intent.status = self.status;
        if self.external_reference.is_some() {
            intent.external_reference = self.external_reference.clone();
        }
        if self.entry_id.is_some() {
            intent.entry_id = self.entry_id;
        }
        if self.error.is_some() {
            intent.error = self.error.clone();
        }
        intent.updated_at = Utc::now();
    }
}
