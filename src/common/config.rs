//! Runtime configuration loaded from defaults, an optional TOML file and the environment.
//!
//! Layering order: built-in defaults, then the file named by `RETROFIT_CONFIG`,
//! then individual environment overrides.

use std::env;
use std::fs;

use serde::Deserialize;

use crate::common::error::{RetroError, RetroResult};
use crate::evaluation::domain::CostModel;

/// Snapshot of configuration values consumed by the core.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppCfg {
    pub data_root: String,
    pub log_level: String,
    /// Threshold sweeps over at least this many records run across the rayon pool.
    pub parallel_min_records: usize,
    pub default_cost: CostModel,
}

impl Default for AppCfg {
    fn default() -> Self {
        Self {
            data_root: "./data".to_string(),
            log_level: "info".to_string(),
            parallel_min_records: 50_000,
            default_cost: CostModel::default(),
        }
    }
}

impl AppCfg {
    /// Create a configuration snapshot from the optional config file and the process environment.
    pub fn load() -> RetroResult<Self> {
        let mut cfg = match env::var("RETROFIT_CONFIG") {
            Ok(path) => {
                let raw = fs::read_to_string(&path).map_err(|err| RetroError::io(&path, err))?;
                Self::from_toml_str(&raw)?
            }
            Err(_) => Self::default(),
        };
        cfg.apply_env(|key| env::var(key).ok())?;
        Ok(cfg)
    }

    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> RetroResult<Self> {
        toml::from_str(raw).map_err(|err| RetroError::Config(err.to_string()))
    }

    fn apply_env<F>(&mut self, lookup: F) -> RetroResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("RETROFIT_DATA_ROOT") {
            self.data_root = root;
        }
        if let Some(level) = lookup("RETROFIT_LOG") {
            self.log_level = level;
        }
        if let Some(min) = lookup("RETROFIT_PARALLEL_MIN") {
            self.parallel_min_records = min
                .parse()
                .map_err(|_| RetroError::Config(format!("RETROFIT_PARALLEL_MIN={min}")))?;
        }
        Ok(())
    }
}

/// Convenience wrapper mirroring `AppCfg::load`.
pub fn load_cfg() -> RetroResult<AppCfg> {
    AppCfg::load()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = AppCfg::from_toml_str("data_root = \"/srv/retrofit\"\n").unwrap();
        assert_eq!(cfg.data_root, "/srv/retrofit");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.default_cost, CostModel::default());
    }

    #[test]
    fn cost_table_from_toml() {
        let raw = "[default_cost]\ntp_cost = 0.5\nfn_cost = 4.0\n";
        let cfg = AppCfg::from_toml_str(raw).unwrap();
        assert_eq!(cfg.default_cost.tp_cost, 0.5);
        assert_eq!(cfg.default_cost.fp_cost, 1.0);
        assert_eq!(cfg.default_cost.fn_cost, 4.0);
        assert_eq!(cfg.default_cost.tn_cost, 0.0);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg = AppCfg::from_toml_str("log_level = \"warn\"").unwrap();
        cfg.apply_env(|key| match key {
            "RETROFIT_LOG" => Some("debug".to_string()),
            "RETROFIT_PARALLEL_MIN" => Some("10".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.parallel_min_records, 10);
    }

    #[test]
    fn bad_env_number_is_rejected() {
        let mut cfg = AppCfg::default();
        let err = cfg
            .apply_env(|key| (key == "RETROFIT_PARALLEL_MIN").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, RetroError::Config(_)));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            AppCfg::from_toml_str("data_root = ["),
            Err(RetroError::Config(_))
        ));
    }
}
