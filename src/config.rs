// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup into an [`AppConfig`]; an invalid value stops the process
//! before anything is opened.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding the ledger database | `./data` |
//! | `LEDGER_DB_FILE` | Database file name inside `DATA_DIR` | `ledger.redb` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DEFAULT_ASSET` | Asset used when a request names none | `SOL` |
//! | `WITHDRAW_ASSETS` | Comma-separated assets accepted for withdrawal | `SOL` |
//! | `VAULT_ADDRESS` | Vault wallet published for memo-tagged deposits | unset |
//! | `SETTLEMENT_TIMEOUT_MS` | Deadline for one settlement provider call | `30000` |
//! | `LOCK_TIMEOUT_MS` | Longest wait for an account row lock | `10000` |
//! | `RECONCILE_INTERVAL_SECS` | Pause between reconciliation sweeps | `60` |
//! | `RECONCILE_STALE_AFTER_SECS` | Age at which a pending intent needs review (above the settlement timeout) | `300` |
//! | `SIMULATED_SETTLEMENT_LATENCY_MS` | Delay added by the simulated providers | `0` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::ledger::AssetType;
use crate::settlement::is_solana_address;

/// Environment variable name for the data directory path.
///
/// # Default
/// `./data`
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "./data";

pub const LEDGER_DB_FILE_ENV: &str = "LEDGER_DB_FILE";
pub const DEFAULT_LEDGER_DB_FILE: &str = "ledger.redb";

pub const HOST_ENV: &str = "HOST";
pub const DEFAULT_HOST: &str = "0.0.0.0";

pub const PORT_ENV: &str = "PORT";
pub const DEFAULT_PORT: u16 = 8080;

/// Asset used by deposit, pay and payout requests that do not name one.
pub const DEFAULT_ASSET_ENV: &str = "DEFAULT_ASSET";
pub const DEFAULT_ASSET: &str = "SOL";

/// Assets that can leave the system through an on-chain withdrawal.
///
/// The vault signer only holds SOL, so anything else is refused before the
/// account is touched.
pub const WITHDRAW_ASSETS_ENV: &str = "WITHDRAW_ASSETS";
pub const DEFAULT_WITHDRAW_ASSETS: &str = "SOL";

/// Public address of the custodial vault. Deposits are sent here with the
/// account's memo. Unset means the address is not published.
pub const VAULT_ADDRESS_ENV: &str = "VAULT_ADDRESS";

/// Deadline for a single settlement provider call.
///
/// A call that runs past it is abandoned: the debit rolls back and the
/// attempt is recorded as `UNKNOWN` for reconciliation.
pub const SETTLEMENT_TIMEOUT_MS_ENV: &str = "SETTLEMENT_TIMEOUT_MS";
pub const DEFAULT_SETTLEMENT_TIMEOUT_MS: u64 = 30_000;

/// Longest a request waits for an account row lock.
///
/// A withdrawal holds the lock for its whole provider call, so requests
/// queued behind it fail with `TIMEOUT` when the provider is slower than this.
pub const LOCK_TIMEOUT_MS_ENV: &str = "LOCK_TIMEOUT_MS";
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 10_000;

pub const RECONCILE_INTERVAL_SECS_ENV: &str = "RECONCILE_INTERVAL_SECS";
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 60;

/// Age after which a still-pending settlement intent is flagged for review.
/// Must exceed the settlement timeout.
pub const RECONCILE_STALE_AFTER_SECS_ENV: &str = "RECONCILE_STALE_AFTER_SECS";
pub const DEFAULT_RECONCILE_STALE_AFTER_SECS: u64 = 300;

pub const SIMULATED_SETTLEMENT_LATENCY_MS_ENV: &str = "SIMULATED_SETTLEMENT_LATENCY_MS";
pub const DEFAULT_SIMULATED_SETTLEMENT_LATENCY_MS: u64 = 0;

/// Logging format: `json` for production, anything else is pretty-printed.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: '{value}' is not a valid {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub ledger_db_file: String,
    pub host: String,
    pub port: u16,
    pub default_asset: AssetType,
    pub withdraw_assets: Vec<AssetType>,
    /// Vault wallet that receives memo-tagged deposits, when known.
    pub vault_address: Option<String>,
    pub settlement_timeout: Duration,
    pub lock_timeout: Duration,
    pub reconcile_interval: Duration,
    pub reconcile_stale_after: Duration,
    pub simulated_latency: Duration,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str, default: &str| -> String {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let default_asset = parse_asset(DEFAULT_ASSET_ENV, &get(DEFAULT_ASSET_ENV, DEFAULT_ASSET))?;

        let withdraw_assets = get(WITHDRAW_ASSETS_ENV, DEFAULT_WITHDRAW_ASSETS)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse_asset(WITHDRAW_ASSETS_ENV, s))
            .collect::<Result<Vec<_>, _>>()?;
        if withdraw_assets.is_empty() {
            return Err(ConfigError::Empty(WITHDRAW_ASSETS_ENV));
        }

        let log_format = match lookup(LOG_FORMAT_ENV).as_deref().map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let settlement_timeout = Duration::from_millis(parse_num(
            SETTLEMENT_TIMEOUT_MS_ENV,
            &get(SETTLEMENT_TIMEOUT_MS_ENV, &DEFAULT_SETTLEMENT_TIMEOUT_MS.to_string()),
            "duration in milliseconds",
        )?);
        if settlement_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: SETTLEMENT_TIMEOUT_MS_ENV,
                value: "0".to_string(),
                expected: "non-zero duration",
            });
        }

        let reconcile_interval = Duration::from_secs(parse_num(
            RECONCILE_INTERVAL_SECS_ENV,
            &get(RECONCILE_INTERVAL_SECS_ENV, &DEFAULT_RECONCILE_INTERVAL_SECS.to_string()),
            "duration in seconds",
        )?);
        if reconcile_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: RECONCILE_INTERVAL_SECS_ENV,
                value: "0".to_string(),
                expected: "non-zero duration",
            });
        }

        // Intents younger than the settlement deadline may still be in flight
        let reconcile_stale_after = Duration::from_secs(parse_num(
            RECONCILE_STALE_AFTER_SECS_ENV,
            &get(
                RECONCILE_STALE_AFTER_SECS_ENV,
                &DEFAULT_RECONCILE_STALE_AFTER_SECS.to_string(),
            ),
            "duration in seconds",
        )?);
        if reconcile_stale_after <= settlement_timeout {
            return Err(ConfigError::Invalid {
                var: RECONCILE_STALE_AFTER_SECS_ENV,
                value: reconcile_stale_after.as_secs().to_string(),
                expected: "duration longer than the settlement timeout",
            });
        }

        let vault_address = match lookup(VAULT_ADDRESS_ENV).map(|v| v.trim().to_string()) {
            Some(address) if address.is_empty() => None,
            Some(address) if !is_solana_address(&address) => {
                return Err(ConfigError::Invalid {
                    var: VAULT_ADDRESS_ENV,
                    value: address,
                    expected: "base58 Solana address",
                });
            }
            other => other,
        };

        Ok(Self {
            data_dir: PathBuf::from(get(DATA_DIR_ENV, DEFAULT_DATA_DIR)),
            ledger_db_file: get(LEDGER_DB_FILE_ENV, DEFAULT_LEDGER_DB_FILE),
            host: get(HOST_ENV, DEFAULT_HOST),
            port: parse_num(PORT_ENV, &get(PORT_ENV, &DEFAULT_PORT.to_string()), "port")?,
            default_asset,
            withdraw_assets,
            vault_address,
            settlement_timeout,
            lock_timeout: Duration::from_millis(parse_num(
                LOCK_TIMEOUT_MS_ENV,
                &get(LOCK_TIMEOUT_MS_ENV, &DEFAULT_LOCK_TIMEOUT_MS.to_string()),
                "duration in milliseconds",
            )?),
            reconcile_interval,
            reconcile_stale_after,
            simulated_latency: Duration::from_millis(parse_num(
                SIMULATED_SETTLEMENT_LATENCY_MS_ENV,
                &get(
                    SIMULATED_SETTLEMENT_LATENCY_MS_ENV,
                    &DEFAULT_SIMULATED_SETTLEMENT_LATENCY_MS.to_string(),
                ),
                "duration in milliseconds",
            )?),
            log_format,
        })
    }

    pub fn ledger_db_path(&self) -> PathBuf {
        self.data_dir.join(&self.ledger_db_file)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_num<T: FromStr>(var: &'static str, value: &str, expected: &'static str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
        expected,
    })
}

fn parse_asset(var: &'static str, value: &str) -> Result<AssetType, ConfigError> {
    AssetType::new(value).map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
        expected: "asset symbol",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.ledger_db_path(), PathBuf::from("./data").join("ledger.redb"));
        assert_eq!(cfg.bind_address(), "0.0.0.0:8080");
        assert_eq!(cfg.default_asset.as_str(), "SOL");
        assert_eq!(cfg.withdraw_assets, vec![AssetType::new("SOL").unwrap()]);
        assert_eq!(cfg.settlement_timeout, Duration::from_secs(30));
        assert_eq!(cfg.lock_timeout, Duration::from_secs(10));
        assert_eq!(cfg.reconcile_stale_after, Duration::from_secs(300));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("PORT", "9000"),
            ("WITHDRAW_ASSETS", "sol, usdc"),
            ("SETTLEMENT_TIMEOUT_MS", "1500"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.withdraw_assets.len(), 2);
        assert_eq!(cfg.withdraw_assets[1].as_str(), "USDC");
        assert_eq!(cfg.settlement_timeout, Duration::from_millis(1500));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn degenerate_durations_are_rejected() {
        assert!(matches!(
            config(&[("RECONCILE_INTERVAL_SECS", "0")]),
            Err(ConfigError::Invalid { var: "RECONCILE_INTERVAL_SECS", .. })
        ));
        assert!(matches!(
            config(&[("SETTLEMENT_TIMEOUT_MS", "0")]),
            Err(ConfigError::Invalid { var: "SETTLEMENT_TIMEOUT_MS", .. })
        ));
        // Stale threshold must outlast an in-flight settlement call
        assert!(matches!(
            config(&[("SETTLEMENT_TIMEOUT_MS", "30000"), ("RECONCILE_STALE_AFTER_SECS", "30")]),
            Err(ConfigError::Invalid { var: "RECONCILE_STALE_AFTER_SECS", .. })
        ));
        assert!(matches!(
            config(&[("SETTLEMENT_TIMEOUT_MS", "0"), ("RECONCILE_STALE_AFTER_SECS", "1")]),
            Err(ConfigError::Invalid { .. })
        ));
        let cfg = config(&[("SETTLEMENT_TIMEOUT_MS", "30000"), ("RECONCILE_STALE_AFTER_SECS", "31")])
            .unwrap();
        assert_eq!(cfg.reconcile_stale_after, Duration::from_secs(31));
    }

    #[test]
    fn vault_address_is_optional_but_checked() {
        assert!(config(&[]).unwrap().vault_address.is_none());
        let cfg = config(&[("VAULT_ADDRESS", "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin")]).unwrap();
        assert_eq!(
            cfg.vault_address.as_deref(),
            Some("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin")
        );
        assert!(matches!(
            config(&[("VAULT_ADDRESS", "0xabc")]),
            Err(ConfigError::Invalid { var: "VAULT_ADDRESS", .. })
        ));
    }

    #[test]
    fn invalid_values_fail() {
        assert!(matches!(
            config(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
        assert!(matches!(
            config(&[("LOCK_TIMEOUT_MS", "-1")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config(&[("DEFAULT_ASSET", "$$$")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config(&[("WITHDRAW_ASSETS", " , ")]),
            Err(ConfigError::Empty(_))
        ));
    }
}
