// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Validated ledger amounts.
//!
//! Balances are stored with the precision of a `DECIMAL(18, 8)` column:
//! at most 8 fractional digits and 10 integer digits. An [`Amount`] can only
//! be built through [`Amount::new`] or parsing, so every amount that reaches
//! the engine is already strictly positive and representable.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use super::error::{LedgerError, LedgerResult};

/// Maximum number of fractional digits.
pub const AMOUNT_SCALE: u32 = 8;

/// Largest representable amount (10 integer digits, 8 fractional).
pub fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999_999_999, AMOUNT_SCALE)
}

/// A strictly positive amount with at most [`AMOUNT_SCALE`] fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> LedgerResult<Self> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "amount must be greater than zero, got {value}"
            )));
        }

        let normalized = value.normalize();
        if normalized.scale() > AMOUNT_SCALE {
            return Err(LedgerError::InvalidAmount(format!(
                "amount {value} has more than {AMOUNT_SCALE} decimal places"
            )));
        }

        if normalized > max_amount() {
            return Err(LedgerError::InvalidAmount(format!(
                "amount {value} exceeds the maximum of {}",
                max_amount()
            )));
        }

        Ok(Self(normalized))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Amount {
    type Err = LedgerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LedgerError::InvalidAmount("amount is required".into()));
        }

        // Decimal parsing already rejects "NaN" and "inf".
        let value = Decimal::from_str_exact(trimmed)
            .map_err(|_| LedgerError::InvalidAmount(format!("'{trimmed}' is not a decimal number")))?;

        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}
