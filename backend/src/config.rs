//! Server configuration loaded from environment variables.
//!
//! All settings have workable defaults so `sluice` starts with nothing but a
//! writable working directory:
//!
//! ```bash
//! SLUICE_BIND=0.0.0.0:8080
//! SLUICE_DATA_DIR=./data          # store definitions + promote rule files
//! SLUICE_STORAGE_DIR=./storage    # content files
//! SLUICE_PROMOTE_WORKERS=8        # parallel copy width (1-32)
//! SLUICE_PROMOTE_TIMEOUT=600      # seconds before a copy batch is abandoned
//! SLUICE_RULESET_MATCH=most-specific   # or: ordered
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{AppError, Result};

/// How the registry picks a rule-set when several patterns match a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    /// Longest literal pattern text wins; ties broken by definition order.
    #[default]
    MostSpecific,
    /// First match in definition order wins.
    Ordered,
}

impl FromStr for MatchStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "most-specific" => Ok(Self::MostSpecific),
            "ordered" => Ok(Self::Ordered),
            other => Err(AppError::Config(format!(
                "SLUICE_RULESET_MATCH must be 'most-specific' or 'ordered', got '{other}'"
            ))),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address, e.g. `0.0.0.0:8080`.
    pub bind_addr: String,
    /// Store definitions and promote rule/rule-set files.
    pub data_dir: PathBuf,
    /// Root of the content storage tree.
    pub storage_dir: PathBuf,
    /// Width of the promotion copy pool.
    pub promote_workers: usize,
    /// Wall-clock budget for one promotion's copy phase.
    pub promote_timeout_secs: u64,
    /// Rule-set selection strategy.
    pub ruleset_match: MatchStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            data_dir: PathBuf::from("./data"),
            storage_dir: PathBuf::from("./storage"),
            promote_workers: 8,
            promote_timeout_secs: 600,
            ruleset_match: MatchStrategy::MostSpecific,
        }
    }
}

impl Config {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let bind_addr = std::env::var("SLUICE_BIND").unwrap_or(defaults.bind_addr);

        let data_dir = std::env::var("SLUICE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let storage_dir = std::env::var("SLUICE_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_dir);

        let promote_workers = match std::env::var("SLUICE_PROMOTE_WORKERS") {
            Ok(v) => {
                let n: usize = v.parse().map_err(|_| {
                    AppError::Config(format!("SLUICE_PROMOTE_WORKERS is not a number: '{v}'"))
                })?;
                n.clamp(1, 32)
            }
            Err(_) => defaults.promote_workers,
        };

        let promote_timeout_secs = match std::env::var("SLUICE_PROMOTE_TIMEOUT") {
            Ok(v) => v.parse().map_err(|_| {
                AppError::Config(format!("SLUICE_PROMOTE_TIMEOUT is not a number: '{v}'"))
            })?,
            Err(_) => defaults.promote_timeout_secs,
        };

        let ruleset_match = match std::env::var("SLUICE_RULESET_MATCH") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.ruleset_match,
        };

        Ok(Self {
            bind_addr,
            data_dir,
            storage_dir,
            promote_workers,
            promote_timeout_secs,
            ruleset_match,
        })
    }

    /// Directory holding promote rule definitions.
    pub fn rules_dir(&self) -> PathBuf {
        self.data_dir.join("promote").join("rules")
    }

    /// Directory holding promote rule-set definitions.
    pub fn rule_sets_dir(&self) -> PathBuf {
        self.data_dir.join("promote").join("rule-sets")
    }

    /// Directory holding store definition documents.
    pub fn stores_dir(&self) -> PathBuf {
        self.data_dir.join("stores")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment mutation is process-global; serialize these tests.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in [
            "SLUICE_BIND",
            "SLUICE_DATA_DIR",
            "SLUICE_STORAGE_DIR",
            "SLUICE_PROMOTE_WORKERS",
            "SLUICE_PROMOTE_TIMEOUT",
            "SLUICE_RULESET_MATCH",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.promote_workers, 8);
        assert_eq!(config.promote_timeout_secs, 600);
        assert_eq!(config.ruleset_match, MatchStrategy::MostSpecific);
        assert_eq!(config.rules_dir(), PathBuf::from("./data/promote/rules"));
        assert_eq!(config.stores_dir(), PathBuf::from("./data/stores"));
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("SLUICE_BIND", "127.0.0.1:9090");
        std::env::set_var("SLUICE_PROMOTE_WORKERS", "4");
        std::env::set_var("SLUICE_RULESET_MATCH", "ordered");

        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9090");
        assert_eq!(config.promote_workers, 4);
        assert_eq!(config.ruleset_match, MatchStrategy::Ordered);

        clear_env();
    }

    #[test]
    fn test_worker_count_is_clamped() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("SLUICE_PROMOTE_WORKERS", "5000");
        assert_eq!(Config::from_env().unwrap().promote_workers, 32);

        std::env::set_var("SLUICE_PROMOTE_WORKERS", "0");
        assert_eq!(Config::from_env().unwrap().promote_workers, 1);

        clear_env();
    }

    #[test]
    fn test_bad_numbers_are_config_errors() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("SLUICE_PROMOTE_TIMEOUT", "soon");
        assert!(Config::from_env().is_err());
        clear_env();
    }

    #[test]
    fn test_bad_match_strategy_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("SLUICE_RULESET_MATCH", "best-effort");
        assert!(Config::from_env().is_err());
        clear_env();
    }
}
