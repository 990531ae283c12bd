use crate::algorithms::ranging::{ProcessingDelayPolicy, TimestampUnit};
use crate::algorithms::sequence::MatchingPolicy;
use crate::algorithms::solver::SolverConfig;
use crate::utils::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Run configuration, loaded from a JSON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub algorithms: AlgorithmsConfig,
    pub logging: LogConfig,
}

/// Algorithm section; only time-of-flight localization is provided
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmsConfig {
    pub tof: TofConfig,
}

/// Single-sided TWR time-of-flight localization settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TofConfig {
    /// Position solver selection
    pub solver: SolverConfig,
    /// How ranging rounds are cut from sequence numbers
    pub matching: MatchingPolicy,
    /// Which anchor processing delay applies to a RESPONSE
    pub processing_delay: ProcessingDelayPolicy,
    /// Unit of clock timestamps and processing delays
    pub timestamp_unit: TimestampUnit,
    /// Localize mobile nodes on the rayon thread pool
    pub parallel: bool,
}

/// Configuration errors; all of them are fatal at startup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid parameter '{parameter}' = '{value}': {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("unknown solver '{name}' (available: {})", available.join(", "))]
    UnknownSolver { name: String, available: Vec<String> },

    #[error("uniform processing delay requested but anchors use {delays:?}")]
    NonUniformProcessingDelay { delays: Vec<f64> },

    #[error("uniform processing delay requested but the anchor table is empty")]
    NoAnchors,

    #[error("I/O error: {message}")]
    IoError { message: String },

    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

impl Configuration {
    /// Load and validate configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        let config: Configuration = serde_json::from_str(&content).map_err(|e| ConfigError::SerializationError {
            message: format!("Failed to parse config file '{}': {}", path_str, e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializationError {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.algorithms.tof.solver.validate()
    }

    pub fn tof(&self) -> &TofConfig {
        &self.algorithms.tof
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::logging::{LogFormat, LogLevel};
    use tempfile::tempdir;

    #[test]
    fn test_default_configuration() {
        let config = Configuration::default();
        assert_eq!(config.tof().solver.kind, "linear_least_squares");
        assert_eq!(config.tof().matching, MatchingPolicy::SlidingWindow);
        assert_eq!(config.tof().processing_delay, ProcessingDelayPolicy::PerAnchor);
        assert_eq!(config.tof().timestamp_unit, TimestampUnit::Picoseconds);
        assert!(!config.tof().parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "algorithms": { "tof": { "solver": { "kind": "gauss_newton" }, "processing_delay": "uniform" } } }"#;
        let config: Configuration = serde_json::from_str(json).unwrap();

        assert_eq!(config.tof().solver.kind, "gauss_newton");
        assert_eq!(config.tof().solver.max_iterations, 50);
        assert_eq!(config.tof().processing_delay, ProcessingDelayPolicy::Uniform);
        assert_eq!(config.tof().matching, MatchingPolicy::SlidingWindow);
        assert_eq!(config.logging, LogConfig::default());
    }

    #[test]
    fn test_invalid_solver_parameters() {
        let mut config = Configuration::default();
        config.algorithms.tof.solver.tolerance = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { ref parameter, .. }) if parameter == "solver.tolerance"
        ));

        config.algorithms.tof.solver.tolerance = 1e-6;
        config.algorithms.tof.solver.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Configuration::default();
        config.algorithms.tof.matching = MatchingPolicy::DisjointRuns;
        config.algorithms.tof.parallel = true;
        config.logging.level = LogLevel::Debug;
        config.logging.format = LogFormat::Json;

        config.save_to_file(&path).unwrap();
        let loaded = Configuration::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempdir().unwrap();

        let missing = Configuration::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, ConfigError::IoError { .. }));

        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let broken = Configuration::from_file(&path).unwrap_err();
        assert!(matches!(broken, ConfigError::SerializationError { .. }));
    }

    #[test]
    fn test_unknown_solver_message_lists_alternatives() {
        let err = ConfigError::UnknownSolver {
            name: "taylor".to_string(),
            available: vec!["gauss_newton".to_string(), "linear_least_squares".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "unknown solver 'taylor' (available: gauss_newton, linear_least_squares)"
        );
    }
}
