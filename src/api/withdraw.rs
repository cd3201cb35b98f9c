// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound transfers: on-chain withdrawals and UPI payouts.
//!
//! Both debit the ledger only once the settlement rail has confirmed the
//! transfer. A rail that fails or does not answer in time leaves the balance
//! untouched and answers 502.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::{
    error::{ApiError, ErrorBody},
    ledger::{AssetType, OwnerId},
    models::{parse_amount, SettlementResponse, UpiPayoutRequest, WithdrawRequest},
    settlement::{is_solana_address, Destination},
    state::AppState,
};

use super::json_body;

/// Chain the vault settles withdrawals on.
pub const WITHDRAW_CHAIN: &str = "solana";

fn validate_address(address: &str) -> Result<(), ApiError> {
    if !is_solana_address(address) {
        return Err(ApiError::bad_request(
            "Address must be 32 to 44 base58 characters",
        ));
    }
    Ok(())
}

/// Validate a UPI virtual payment address (`handle@provider`).
fn validate_upi_id(upi_id: &str) -> Result<(), ApiError> {
    let Some((handle, provider)) = upi_id.split_once('@') else {
        return Err(ApiError::bad_request("UPI id must look like name@bank"));
    };
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_');
    if handle.is_empty()
        || provider.is_empty()
        || provider.contains('@')
        || !handle.chars().all(allowed)
        || !provider.chars().all(allowed)
    {
        return Err(ApiError::bad_request("UPI id must look like name@bank"));
    }
    Ok(())
}

/// Withdraw to an on-chain address.
#[utoipa::path(
    post,
    path = "/v1/wallets/withdraw",
    tag = "Settlement",
    request_body = WithdrawRequest,
    responses(
        (status = 200, description = "Transfer settled and debited", body = SettlementResponse),
        (status = 400, description = "Invalid amount, address or asset", body = ErrorBody),
        (status = 404, description = "No account for this owner and asset", body = ErrorBody),
        (status = 422, description = "Insufficient funds", body = ErrorBody),
        (status = 502, description = "Settlement failed; nothing was debited", body = ErrorBody),
        (status = 503, description = "Account busy", body = ErrorBody)
    )
)]
pub async fn withdraw(
    State(state): State<AppState>,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<Json<SettlementResponse>, ApiError> {
    let request = json_body(payload)?;
    let owner_id: OwnerId = request.owner_id.parse()?;
    let amount = parse_amount(&request.amount)?;

    let asset = AssetType::new(&request.asset_symbol)?;
    if !state.withdraw_assets.contains(&asset) {
        return Err(ApiError::bad_request(format!(
            "Withdrawals of {asset} are not supported"
        )));
    }

    let address = request.destination.trim();
    validate_address(address)?;

    let destination = Destination::OnChain {
        chain: WITHDRAW_CHAIN.to_string(),
        address: address.to_string(),
    };
    let receipt = state
        .engine
        .withdraw_external(
            owner_id,
            &asset,
            amount,
            destination,
            state.chain_settlement.as_ref(),
        )
        .await?;
    Ok(Json(SettlementResponse::from(&receipt)))
}

/// Pay out to a UPI id from the default asset account.
#[utoipa::path(
    post,
    path = "/v1/payouts/upi",
    tag = "Settlement",
    request_body = UpiPayoutRequest,
    responses(
        (status = 200, description = "Payout settled and debited", body = SettlementResponse),
        (status = 400, description = "Invalid amount, UPI id or name", body = ErrorBody),
        (status = 404, description = "No account for this owner", body = ErrorBody),
        (status = 422, description = "Insufficient funds", body = ErrorBody),
        (status = 502, description = "Payout failed; nothing was debited", body = ErrorBody),
        (status = 503, description = "Account busy", body = ErrorBody)
    )
)]
pub async fn upi_payout(
    State(state): State<AppState>,
    payload: Result<Json<UpiPayoutRequest>, JsonRejection>,
) -> Result<Json<SettlementResponse>, ApiError> {
    let request = json_body(payload)?;
    let owner_id: OwnerId = request.owner_id.parse()?;
    let amount = parse_amount(&request.amount)?;

    let upi_id = request.upi_id.trim();
    validate_upi_id(upi_id)?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Beneficiary name is required"));
    }

    let destination = Destination::Upi {
        vpa: upi_id.to_string(),
        name: name.to_string(),
    };
    let receipt = state
        .engine
        .withdraw_external(
            owner_id,
            &state.default_asset,
            amount,
            destination,
            state.upi_settlement.as_ref(),
        )
        .await?;
    Ok(Json(SettlementResponse::from(&receipt)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_validation() {
        assert!(validate_address("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin").is_ok());
        let err = validate_address("0xdeadbeef").unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upi_id_validation() {
        assert!(validate_upi_id("alice@okbank").is_ok());
        assert!(validate_upi_id("alice.smith-01@ok_bank").is_ok());
        assert!(validate_upi_id("alice").is_err());
        assert!(validate_upi_id("@bank").is_err());
        assert!(validate_upi_id("alice@").is_err());
        assert!(validate_upi_id("a@b@c").is_err());
        assert!(validate_upi_id("al ice@bank").is_err());
    }
}
