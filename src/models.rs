// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the request and response data structures used by
//! the REST API. All types derive `Serialize` and/or `Deserialize` plus
//! `ToSchema` for automatic JSON handling and OpenAPI documentation.
//!
//! ## Amounts
//!
//! Amounts and balances travel as decimal strings (`"12.5"`) so no precision
//! is lost in JSON. Requests also accept a JSON number, which is read back
//! through its decimal text form.
//!
//! ## Model Categories
//!
//! - **Accounts**: account creation and lookup
//! - **Operations**: deposit, pay, withdraw, UPI payout
//! - **History**: balance plus paginated log entries
//! - **Admin**: settlement intents and integrity reports

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::ledger::{
    Account, Amount, EntryKind, IntegrityReport, IntentStatus, LedgerEntry, LedgerError,
    LedgerResult, Receipt, SettlementIntent,
};

/// Read an amount given either as a decimal string or a JSON number.
pub fn parse_amount(raw: &Value) -> LedgerResult<Amount> {
    match raw {
        Value::String(s) => s.parse(),
        Value::Number(n) => {
            // serde_json prints small and large floats in exponent form
            let text = n.to_string();
            match text.parse() {
                Ok(amount) => Ok(amount),
                Err(err) => match Decimal::from_scientific(&text) {
                    Ok(value) => Amount::new(value),
                    Err(_) => Err(err),
                },
            }
        }
        Value::Null => Err(LedgerError::InvalidAmount("amount is required".into())),
        other => Err(LedgerError::InvalidAmount(format!(
            "amount must be a decimal string, got {other}"
        ))),
    }
}

// =============================================================================
// Account Models
// =============================================================================

/// Request to open an account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    /// Owner identity (UUID).
    pub owner_id: String,
    /// Asset symbol; the server default when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
}

/// A ledger account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: String,
    pub owner_id: String,
    pub asset_type: String,
    /// Current balance as a decimal string.
    pub balance: String,
    /// Six-digit memo that routes vault deposits to this account.
    pub memo_id: String,
    /// Number of log entries written so far.
    pub last_sequence: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            owner_id: account.owner_id.to_string(),
            asset_type: account.asset_type.to_string(),
            balance: account.balance.to_string(),
            memo_id: account.memo_id.clone(),
            last_sequence: account.last_sequence,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Where deposits are sent.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultAddressResponse {
    /// Vault wallet address. Transfers must carry the account's `memoId`.
    pub address: String,
    pub chain: String,
}

// =============================================================================
// Operation Models
// =============================================================================

/// Credit an account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub owner_id: String,
    /// Positive decimal with at most 8 fractional digits.
    #[serde(default)]
    #[schema(value_type = String, example = "12.5")]
    pub amount: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    /// Reference of the inbound transfer; credited at most once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    /// How the funds arrived; `simulated` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// Pay a counterparty inside the system.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    pub owner_id: String,
    #[serde(default)]
    #[schema(value_type = String, example = "4.2")]
    pub amount: Value,
    /// Who was paid; `External` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
}

/// Withdraw to an on-chain address.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub owner_id: String,
    #[serde(default)]
    #[schema(value_type = String, example = "0.5")]
    pub amount: Value,
    /// Recipient wallet address.
    pub destination: String,
    /// Asset to withdraw; must be one of the configured withdrawal assets.
    pub asset_symbol: String,
}

/// Pay out to a UPI id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpiPayoutRequest {
    pub owner_id: String,
    #[serde(default)]
    #[schema(value_type = String, example = "100")]
    pub amount: Value,
    /// Beneficiary UPI virtual payment address, e.g. `alice@bank`.
    pub upi_id: String,
    /// Beneficiary name.
    pub name: String,
}

/// Result of a deposit or payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChangeResponse {
    pub new_balance: String,
    pub entry_id: String,
}

impl From<&Receipt> for BalanceChangeResponse {
    fn from(receipt: &Receipt) -> Self {
        Self {
            new_balance: receipt.new_balance().to_string(),
            entry_id: receipt.entry.id.to_string(),
        }
    }
}

/// Result of a settled withdrawal or payout.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    pub new_balance: String,
    /// Transaction signature or payout reference.
    pub external_reference: String,
    pub entry_id: String,
}

impl From<&Receipt> for SettlementResponse {
    fn from(receipt: &Receipt) -> Self {
        Self {
            new_balance: receipt.new_balance().to_string(),
            external_reference: receipt.external_reference().unwrap_or_default().to_string(),
            entry_id: receipt.entry.id.to_string(),
        }
    }
}

// =============================================================================
// History Models
// =============================================================================

/// One transaction log row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub id: String,
    pub sequence: u64,
    pub kind: EntryKind,
    /// Always positive; the sign follows from `kind`.
    pub amount: String,
    pub signed_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub balance_after: String,
    pub created_at: DateTime<Utc>,
}

impl From<&LedgerEntry> for EntryResponse {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            sequence: entry.sequence,
            kind: entry.kind,
            amount: entry.amount.to_string(),
            signed_amount: entry.signed_amount().to_string(),
            external_reference: entry.external_reference.clone(),
            metadata: entry.metadata.clone(),
            balance_after: entry.balance_after.to_string(),
            created_at: entry.created_at,
        }
    }
}

/// Query parameters for the balance and history view.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Asset symbol; the server default when omitted.
    pub asset: Option<String>,
    /// Page size (1 to 200, default 50).
    pub limit: Option<usize>,
    /// Continuation cursor from a previous page.
    pub cursor: Option<String>,
}

/// Balance plus one page of history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceHistoryResponse {
    pub account: AccountResponse,
    pub balance: String,
    pub entries: Vec<EntryResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

// =============================================================================
// Admin Models
// =============================================================================

/// A recorded settlement attempt.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettlementIntentResponse {
    pub id: String,
    pub account_id: String,
    pub owner_id: String,
    pub asset_type: String,
    pub amount: String,
    pub kind: EntryKind,
    pub destination: String,
    pub status: IntentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&SettlementIntent> for SettlementIntentResponse {
    fn from(intent: &SettlementIntent) -> Self {
        Self {
            id: intent.id.to_string(),
            account_id: intent.account_id.to_string(),
            owner_id: intent.owner_id.to_string(),
            asset_type: intent.asset_type.to_string(),
            amount: intent.amount.to_string(),
            kind: intent.kind,
            destination: intent.destination.clone(),
            status: intent.status,
            external_reference: intent.external_reference.clone(),
            entry_id: intent.entry_id.map(|id| id.to_string()),
            error: intent.error.clone(),
            created_at: intent.created_at,
            updated_at: intent.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnresolvedIntentsResponse {
    pub intents: Vec<SettlementIntentResponse>,
    pub total: usize,
}

/// Stored balance checked against the transaction log.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityResponse {
    pub account_id: String,
    pub balance: String,
    pub entry_sum: String,
    pub entry_count: u64,
    pub last_sequence: u64,
    pub consistent: bool,
}

impl From<&IntegrityReport> for IntegrityResponse {
    fn from(report: &IntegrityReport) -> Self {
        Self {
            account_id: report.account_id.to_string(),
            balance: report.balance.to_string(),
            entry_sum: report.entry_sum.to_string(),
            entry_count: report.entry_count,
            last_sequence: report.last_sequence,
            consistent: report.consistent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ErrorKind;
    use serde_json::json;

    #[test]
    fn amount_accepts_string_and_number() {
        assert_eq!(parse_amount(&json!("12.5")).unwrap().to_string(), "12.5");
        assert_eq!(parse_amount(&json!(3)).unwrap().to_string(), "3");
        assert_eq!(parse_amount(&json!(0.25)).unwrap().to_string(), "0.25");
    }

    #[test]
    fn amount_accepts_numbers_printed_in_exponent_form() {
        assert_eq!(parse_amount(&json!(0.00000001)).unwrap().to_string(), "0.00000001");
        assert_eq!(parse_amount(&json!(1.5e-7)).unwrap().to_string(), "0.00000015");

        // Still bound by the fractional digit limit
        let err = parse_amount(&json!(1e-9)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        assert!(err.to_string().contains("decimal places"));

        assert_eq!(parse_amount(&json!(-1e-8)).unwrap_err().kind(), ErrorKind::InvalidAmount);
    }

    #[test]
    fn amount_rejects_other_shapes() {
        for raw in [json!(null), json!(true), json!("-1"), json!("0"), json!([1])] {
            assert_eq!(parse_amount(&raw).unwrap_err().kind(), ErrorKind::InvalidAmount);
        }
    }

    #[test]
    fn requests_use_camel_case() {
        let req: WithdrawRequest = serde_json::from_value(json!({
            "ownerId": "8d7e6b4c-1f52-4a8e-9d37-0a6f5b2c3e41",
            "amount": "1",
            "destination": "addr",
            "assetSymbol": "SOL"
        }))
        .unwrap();
        assert_eq!(req.asset_symbol, "SOL");

        let pay: PayRequest = serde_json::from_value(json!({
            "ownerId": "x",
            "amount": 1,
            "recipientLabel": "alice"
        }))
        .unwrap();
        assert_eq!(pay.recipient_label.as_deref(), Some("alice"));
        assert!(pay.asset.is_none());
    }
}
