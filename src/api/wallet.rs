// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account endpoints: open, look up, deposit, pay, and read history.
//!
//! Accounts are keyed by `(ownerId, asset)`. Requests that omit the asset
//! act on the server's default asset.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::{ApiError, ErrorBody},
    ledger::OwnerId,
    models::{
        parse_amount, AccountResponse, BalanceChangeResponse, BalanceHistoryResponse,
        CreateAccountRequest, DepositRequest, EntryResponse, HistoryQuery, PayRequest,
        VaultAddressResponse,
    },
    state::AppState,
    storage::PageRequest,
};

use super::{json_body, withdraw::WITHDRAW_CHAIN};

/// Open an account for an owner.
#[utoipa::path(
    post,
    path = "/v1/wallets",
    tag = "Wallets",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 400, description = "Malformed owner id or asset", body = ErrorBody),
        (status = 409, description = "Owner already has an account for this asset", body = ErrorBody)
    )
)]
pub async fn create_account(
    State(state): State<AppState>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let request = json_body(payload)?;
    let owner_id: OwnerId = request.owner_id.parse()?;
    let asset = state.asset_or_default(request.asset.as_deref())?;

    let account = state.engine.create_account(owner_id, &asset)?;
    Ok((StatusCode::CREATED, Json(AccountResponse::from(&account))))
}

/// Balance plus one page of history, newest first.
#[utoipa::path(
    get,
    path = "/v1/wallets/{ownerId}",
    tag = "Wallets",
    params(
        ("ownerId" = String, Path, description = "Owner identity (UUID)"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Balance and history", body = BalanceHistoryResponse),
        (status = 400, description = "Malformed owner id or cursor", body = ErrorBody),
        (status = 404, description = "No account for this owner and asset", body = ErrorBody)
    )
)]
pub async fn get_balance_and_history(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<BalanceHistoryResponse>, ApiError> {
    let owner_id: OwnerId = owner_id.parse()?;
    let asset = state.asset_or_default(query.asset.as_deref())?;
    let page = PageRequest::new(query.limit, query.cursor);

    let view = state.engine.get_balance_and_history(owner_id, &asset, &page)?;
    Ok(Json(BalanceHistoryResponse {
        account: AccountResponse::from(&view.account),
        balance: view.balance.to_string(),
        entries: view.entries.iter().map(EntryResponse::from).collect(),
        next_cursor: view.next_cursor,
    }))
}

/// Resolve the account a deposit memo routes to.
#[utoipa::path(
    get,
    path = "/v1/wallets/memo/{memoId}",
    tag = "Wallets",
    params(("memoId" = String, Path, description = "Six-digit deposit memo")),
    responses(
        (status = 200, description = "Account for this memo", body = AccountResponse),
        (status = 404, description = "Unknown memo", body = ErrorBody)
    )
)]
pub async fn get_account_by_memo(
    State(state): State<AppState>,
    Path(memo_id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state.engine.get_account_by_memo(memo_id.trim())?;
    Ok(Json(AccountResponse::from(&account)))
}

/// Vault address that memo-tagged deposits are sent to.
#[utoipa::path(
    get,
    path = "/v1/vault-address",
    tag = "Wallets",
    responses(
        (status = 200, description = "Deposit address", body = VaultAddressResponse),
        (status = 404, description = "No vault address is published", body = ErrorBody)
    )
)]
pub async fn get_vault_address(
    State(state): State<AppState>,
) -> Result<Json<VaultAddressResponse>, ApiError> {
    let address = state
        .vault_address
        .as_deref()
        .ok_or_else(|| ApiError::not_found("No vault address is configured"))?;
    Ok(Json(VaultAddressResponse {
        address: address.to_string(),
        chain: WITHDRAW_CHAIN.to_string(),
    }))
}

/// Credit an account.
#[utoipa::path(
    post,
    path = "/v1/wallets/deposit",
    tag = "Wallets",
    request_body = DepositRequest,
    responses(
        (status = 200, description = "Deposit recorded", body = BalanceChangeResponse),
        (status = 400, description = "Invalid amount or request", body = ErrorBody),
        (status = 404, description = "No account for this owner and asset", body = ErrorBody),
        (status = 409, description = "External reference already credited", body = ErrorBody),
        (status = 503, description = "Account busy", body = ErrorBody)
    )
)]
pub async fn deposit(
    State(state): State<AppState>,
    payload: Result<Json<DepositRequest>, JsonRejection>,
) -> Result<Json<BalanceChangeResponse>, ApiError> {
    let request = json_body(payload)?;
    let owner_id: OwnerId = request.owner_id.parse()?;
    let amount = parse_amount(&request.amount)?;
    let asset = state.asset_or_default(request.asset.as_deref())?;

    let receipt = state
        .engine
        .deposit(
            owner_id,
            &asset,
            amount,
            request.external_reference,
            request.method,
        )
        .await?;
    Ok(Json(BalanceChangeResponse::from(&receipt)))
}

/// Pay a counterparty inside the system.
#[utoipa::path(
    post,
    path = "/v1/wallets/pay",
    tag = "Wallets",
    request_body = PayRequest,
    responses(
        (status = 200, description = "Payment recorded", body = BalanceChangeResponse),
        (status = 400, description = "Invalid amount or request", body = ErrorBody),
        (status = 404, description = "No account for this owner and asset", body = ErrorBody),
        (status = 422, description = "Insufficient funds", body = ErrorBody),
        (status = 503, description = "Account busy", body = ErrorBody)
    )
)]
pub async fn pay(
    State(state): State<AppState>,
    payload: Result<Json<PayRequest>, JsonRejection>,
) -> Result<Json<BalanceChangeResponse>, ApiError> {
    let request = json_body(payload)?;
    let owner_id: OwnerId = request.owner_id.parse()?;
    let amount = parse_amount(&request.amount)?;
    let asset = state.asset_or_default(request.asset.as_deref())?;

    let receipt = state
        .engine
        .pay(owner_id, &asset, amount, request.recipient_label)
        .await?;
    Ok(Json(BalanceChangeResponse::from(&receipt)))
}
