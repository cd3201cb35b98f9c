// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::rejection::JsonRejection,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::{ApiError, ErrorBody},
    ledger::{EntryKind, ErrorKind, IntentStatus},
    models::{
        AccountResponse, BalanceChangeResponse, BalanceHistoryResponse, CreateAccountRequest,
        DepositRequest, EntryResponse, IntegrityResponse, PayRequest, SettlementIntentResponse,
        SettlementResponse, UnresolvedIntentsResponse, UpiPayoutRequest, VaultAddressResponse,
        WithdrawRequest,
    },
    state::AppState,
};

pub mod admin;
pub mod health;
pub mod wallet;
pub mod withdraw;

/// Unwrap a JSON body, reporting malformed input in the standard error shape.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/wallets", post(wallet::create_account))
        .route("/wallets/deposit", post(wallet::deposit))
        .route("/wallets/pay", post(wallet::pay))
        .route("/wallets/withdraw", post(withdraw::withdraw))
        .route("/wallets/memo/{memo_id}", get(wallet::get_account_by_memo))
        .route("/wallets/{owner_id}", get(wallet::get_balance_and_history))
        .route("/vault-address", get(wallet::get_vault_address))
        .route("/payouts/upi", post(withdraw::upi_payout))
        .route(
            "/admin/settlements/unresolved",
            get(admin::list_unresolved_settlements),
        )
        .route(
            "/admin/accounts/{account_id}/integrity",
            get(admin::verify_account_integrity),
        );

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        wallet::create_account,
        wallet::get_balance_and_history,
        wallet::get_account_by_memo,
        wallet::get_vault_address,
        wallet::deposit,
        wallet::pay,
        withdraw::withdraw,
        withdraw::upi_payout,
        admin::list_unresolved_settlements,
        admin::verify_account_integrity
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            ErrorBody,
            ErrorKind,
            EntryKind,
            IntentStatus,
            CreateAccountRequest,
            AccountResponse,
            DepositRequest,
            PayRequest,
            WithdrawRequest,
            UpiPayoutRequest,
            BalanceChangeResponse,
            SettlementResponse,
            EntryResponse,
            BalanceHistoryResponse,
            SettlementIntentResponse,
            UnresolvedIntentsResponse,
            IntegrityResponse,
            VaultAddressResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Wallets", description = "Accounts, deposits, payments and history"),
        (name = "Settlement", description = "On-chain withdrawals and UPI payouts"),
        (name = "Admin", description = "Reconciliation and integrity checks")
    )
)]
struct ApiDoc;
