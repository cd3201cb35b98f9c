// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::ledger::{AssetType, LedgerEngine};
use crate::settlement::SettlementAdapter;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LedgerEngine>,
    /// Rail for on-chain withdrawals from the vault.
    pub chain_settlement: Arc<dyn SettlementAdapter>,
    /// Rail for UPI payouts.
    pub upi_settlement: Arc<dyn SettlementAdapter>,
    /// Asset used when a request names none.
    pub default_asset: AssetType,
    /// Assets accepted by the withdraw endpoint.
    pub withdraw_assets: Arc<Vec<AssetType>>,
    /// Vault wallet that receives memo-tagged deposits, if published.
    pub vault_address: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        engine: Arc<LedgerEngine>,
        chain_settlement: Arc<dyn SettlementAdapter>,
        upi_settlement: Arc<dyn SettlementAdapter>,
        default_asset: AssetType,
        withdraw_assets: Vec<AssetType>,
    ) -> Self {
        Self {
            engine,
            chain_settlement,
            upi_settlement,
            default_asset,
            withdraw_assets: Arc::new(withdraw_assets),
            vault_address: None,
        }
    }

    pub fn with_vault_address(mut self, address: impl Into<Arc<str>>) -> Self {
        self.vault_address = Some(address.into());
        self
    }

    /// Asset named by a request, or the default.
    pub fn asset_or_default(&self, raw: Option<&str>) -> Result<AssetType, crate::ledger::LedgerError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(symbol) => AssetType::new(symbol),
            None => Ok(self.default_asset.clone()),
        }
    }
}
