// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wallet_ledger::{
    api::router,
    config::{AppConfig, LogFormat, DEFAULT_LOG_FILTER},
    ledger::LedgerEngine,
    reconcile::ReconciliationSweeper,
    settlement::SimulatedSettlement,
    state::AppState,
    storage::LedgerDatabase,
};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(config.log_format);

    let db_path = config.ledger_db_path();
    let db = match LedgerDatabase::open(&db_path, config.lock_timeout) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!(error = %e, path = %db_path.display(), "Failed to open ledger database");
            std::process::exit(1);
        }
    };

    let engine = Arc::new(LedgerEngine::new(Arc::clone(&db), config.settlement_timeout));
    let chain_settlement =
        Arc::new(SimulatedSettlement::new("solana", "SIG").with_latency(config.simulated_latency));
    let upi_settlement =
        Arc::new(SimulatedSettlement::new("upi", "PAYOUT").with_latency(config.simulated_latency));

    let shutdown = CancellationToken::new();
    let sweeper = ReconciliationSweeper::new(
        Arc::clone(&db),
        config.reconcile_interval,
        config.reconcile_stale_after,
    );
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.clone()));

    let mut state = AppState::new(
        engine,
        chain_settlement,
        upi_settlement,
        config.default_asset.clone(),
        config.withdraw_assets.clone(),
    );
    match config.vault_address.as_deref() {
        Some(address) => state = state.with_vault_address(address),
        None => warn!("VAULT_ADDRESS is not set; deposit address will not be published"),
    }
    let app = router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listen address");

    info!(
        address = %addr,
        ledger_db = %db_path.display(),
        default_asset = %config.default_asset,
        "Wallet ledger listening (docs at /docs)"
    );

    let server_shutdown = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
                _ = server_shutdown.cancelled() => {},
            }
        })
        .await;

    shutdown.cancel();
    let _ = sweeper_handle.await;

    if let Err(e) = served {
        error!(error = %e, "HTTP server failed");
        std::process::exit(1);
    }
    info!("Wallet ledger stopped");
}
