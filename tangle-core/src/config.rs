//! Configuration for the tangle

use crate::fee::FeeSchedule;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tangle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Transaction log file
    pub log_path: PathBuf,

    /// Insertion and consensus parameters
    pub tangle: TangleConfig,

    /// Tip selection parameters
    pub tip_selection: TipSelectionConfig,

    /// Fee schedule
    pub fees: FeeSchedule,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "tangle-core".to_string(),
            log_path: PathBuf::from("./data/tangle.log"),
            tangle: TangleConfig::default(),
            tip_selection: TipSelectionConfig::default(),
            fees: FeeSchedule::default(),
        }
    }
}

/// Insertion and consensus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TangleConfig {
    /// Parents requested for every new transaction
    pub parent_count: usize,

    /// Cumulative weight at which a transaction is validated directly
    pub consensus_threshold: f64,

    /// Run a consensus pass after every successful insert
    pub consensus_on_insert: bool,
}

impl Default for TangleConfig {
    fn default() -> Self {
        Self {
            parent_count: 2,
            consensus_threshold: 3.0,
            consensus_on_insert: false,
        }
    }
}

/// Tip selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TipSelectionConfig {
    /// Age (seconds) over which a tip's attractiveness decays by a factor of e
    pub decay_window_secs: f64,

    /// Fixed RNG seed; `None` seeds from OS entropy
    pub seed: Option<u64>,
}

impl Default for TipSelectionConfig {
    fn default() -> Self {
        Self {
            decay_window_secs: 3600.0,
            seed: None,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(path) = std::env::var("TANGLE_LOG_PATH") {
            config.log_path = PathBuf::from(path);
        }

        if let Ok(count) = std::env::var("TANGLE_PARENT_COUNT") {
            config.tangle.parent_count = count.parse().map_err(|e| {
                crate::Error::Config(format!("TANGLE_PARENT_COUNT {:?}: {}", count, e))
            })?;
        }

        if let Ok(threshold) = std::env::var("TANGLE_CONSENSUS_THRESHOLD") {
            config.tangle.consensus_threshold = threshold.parse().map_err(|e| {
                crate::Error::Config(format!("TANGLE_CONSENSUS_THRESHOLD {:?}: {}", threshold, e))
            })?;
        }

        if let Ok(seed) = std::env::var("TANGLE_SEED") {
            let seed = seed
                .parse()
                .map_err(|e| crate::Error::Config(format!("TANGLE_SEED {:?}: {}", seed, e)))?;
            config.tip_selection.seed = Some(seed);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values the engine cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        let threshold = self.tangle.consensus_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(crate::Error::Config(format!(
                "consensus_threshold must be a positive number, got {}",
                threshold
            )));
        }

        let window = self.tip_selection.decay_window_secs;
        if !window.is_finite() || window <= 0.0 {
            return Err(crate::Error::Config(format!(
                "decay_window_secs must be a positive number, got {}",
                window
            )));
        }

        self.fees.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "tangle-core");
        assert_eq!(config.tangle.parent_count, 2);
        assert!(!config.tangle.consensus_on_insert);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
log_path = "/tmp/ledger.log"

[tangle]
parent_count = 3
consensus_threshold = 5.0

[fees]
breakpoint = "2000"
rate = "0.02"
flat_fee = "75"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.log_path, PathBuf::from("/tmp/ledger.log"));
        assert_eq!(config.tangle.parent_count, 3);
        assert_eq!(config.tangle.consensus_threshold, 5.0);
        assert_eq!(config.fees.flat_fee, Decimal::new(75, 0));
        // Unset sections keep their defaults
        assert_eq!(config.tip_selection.decay_window_secs, 3600.0);
    }

    #[test]
    fn test_non_positive_threshold_rejected() {
        let mut config = Config::default();
        config.tangle.consensus_threshold = 0.0;
        assert!(config.validate().is_err());

        config.tangle.consensus_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tangle]\nparent_count = \"many\"").unwrap();

        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }
}
