// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Simulated settlement rail.
//!
//! Stands in for a live payout gateway or vault signer: it waits for a
//! configurable latency and then answers according to its [`SimulatedMode`].
//! Every successful transfer gets a fresh reference unless a fixed one is
//! configured, which is how duplicate-reference handling is exercised.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::{SettlementAdapter, SettlementError, SettlementReceipt, SettlementRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatedMode {
    /// Every transfer succeeds.
    Succeed,
    /// Every transfer is rejected with the given reason.
    Fail(String),
    /// Transfers never complete.
    Hang,
}

pub struct SimulatedSettlement {
    name: String,
    reference_prefix: String,
    latency: Duration,
    mode: Mutex<SimulatedMode>,
    fixed_reference: Option<String>,
    calls: AtomicU64,
}

impl SimulatedSettlement {
    pub fn new(name: impl Into<String>, reference_prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference_prefix: reference_prefix.into(),
            latency: Duration::ZERO,
            mode: Mutex::new(SimulatedMode::Succeed),
            fixed_reference: None,
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_mode(self, mode: SimulatedMode) -> Self {
        self.set_mode(mode);
        self
    }

    /// Always answer with the same reference.
    pub fn with_fixed_reference(mut self, reference: impl Into<String>) -> Self {
        self.fixed_reference = Some(reference.into());
        self
    }

    pub fn set_mode(&self, mode: SimulatedMode) {
        if let Ok(mut current) = self.mode.lock() {
            *current = mode;
        }
    }

    /// Number of transfers requested so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn current_mode(&self) -> SimulatedMode {
        self.mode
            .lock()
            .map(|mode| mode.clone())
            .unwrap_or(SimulatedMode::Succeed)
    }
}

#[async_trait]
impl SettlementAdapter for SimulatedSettlement {
    fn name(&self) -> &str {
        &self.name
    }

    async fn transfer(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.current_mode() {
            SimulatedMode::Succeed => {
                let external_reference = self.fixed_reference.clone().unwrap_or_else(|| {
                    let key = request.idempotency_key.simple().to_string();
                    format!("{}-{}", self.reference_prefix, &key[..12])
                });

                info!(
                    adapter = %self.name,
                    destination = %request.destination,
                    amount = %request.amount,
                    asset = %request.asset,
                    external_reference = %external_reference,
                    call,
                    "Simulated transfer completed"
                );

                Ok(SettlementReceipt { external_reference })
            }
            SimulatedMode::Fail(reason) => Err(SettlementError::Rejected(reason)),
            SimulatedMode::Hang => {
                std::future::pending::<()>().await;
                Err(SettlementError::Unavailable("simulated hang ended".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AssetType;
    use crate::settlement::Destination;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn request() -> SettlementRequest {
        SettlementRequest {
            idempotency_key: Uuid::new_v4(),
            destination: Destination::Upi {
                vpa: "bob@bank".into(),
                name: "Bob".into(),
            },
            asset: AssetType::new("SOL").unwrap(),
            amount: dec!(1),
        }
    }

    #[tokio::test]
    async fn succeeds_with_prefixed_reference() {
        let adapter = SimulatedSettlement::new("upi", "PAYOUT");
        let receipt = adapter.transfer(&request()).await.unwrap();
        assert!(receipt.external_reference.starts_with("PAYOUT-"));
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test]
    async fn distinct_requests_get_distinct_references() {
        let adapter = SimulatedSettlement::new("upi", "PAYOUT");
        let a = adapter.transfer(&request()).await.unwrap();
        let b = adapter.transfer(&request()).await.unwrap();
        assert_ne!(a.external_reference, b.external_reference);
    }

    #[tokio::test]
    async fn fail_mode_rejects() {
        let adapter =
            SimulatedSettlement::new("sol", "SIG").with_mode(SimulatedMode::Fail("vault empty".into()));
        let err = adapter.transfer(&request()).await.unwrap_err();
        assert_eq!(err, SettlementError::Rejected("vault empty".into()));
    }

    #[tokio::test]
    async fn hang_mode_never_answers() {
        let adapter = SimulatedSettlement::new("sol", "SIG").with_mode(SimulatedMode::Hang);
        let outcome =
            tokio::time::timeout(Duration::from_millis(20), adapter.transfer(&request())).await;
        assert!(outcome.is_err());
    }
}
