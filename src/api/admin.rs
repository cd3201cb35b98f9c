// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operator endpoints for reconciliation.
//!
//! - Settlement intents that ended in an unknown or unreviewed state
//! - Stored balance checked against the transaction log

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::{ApiError, ErrorBody},
    ledger::AccountId,
    models::{IntegrityResponse, SettlementIntentResponse, UnresolvedIntentsResponse},
    state::AppState,
};

/// List settlement intents that need operator attention.
///
/// Includes transfers whose outcome is unknown (the rail timed out), intents
/// stuck in pending and transfers that settled but could not be recorded.
#[utoipa::path(
    get,
    path = "/v1/admin/settlements/unresolved",
    tag = "Admin",
    responses(
        (status = 200, description = "Unresolved settlement intents", body = UnresolvedIntentsResponse),
        (status = 500, description = "Storage failure", body = ErrorBody)
    )
)]
pub async fn list_unresolved_settlements(
    State(state): State<AppState>,
) -> Result<Json<UnresolvedIntentsResponse>, ApiError> {
    let intents: Vec<SettlementIntentResponse> = state
        .engine
        .list_unresolved_intents()?
        .iter()
        .map(SettlementIntentResponse::from)
        .collect();

    Ok(Json(UnresolvedIntentsResponse {
        total: intents.len(),
        intents,
    }))
}

/// Compare an account's stored balance with the sum of its log.
#[utoipa::path(
    get,
    path = "/v1/admin/accounts/{accountId}/integrity",
    tag = "Admin",
    params(("accountId" = String, Path, description = "Account id (UUID)")),
    responses(
        (status = 200, description = "Integrity report", body = IntegrityResponse),
        (status = 400, description = "Malformed account id", body = ErrorBody),
        (status = 404, description = "Unknown account", body = ErrorBody)
    )
)]
pub async fn verify_account_integrity(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<IntegrityResponse>, ApiError> {
    let account_id: AccountId = account_id.parse()?;
    let report = state.engine.verify_account_integrity(account_id)?;
    Ok(Json(IntegrityResponse::from(&report)))
}
