use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::api::types::NavError;
use crate::core::{
    DEFAULT_ANGLE_TOLERANCE_DEG, DEFAULT_BUBBLE_RADIUS_M, DEFAULT_MAX_MERGE_DISTANCE_M,
    DEFAULT_OFF_ROUTE_BUBBLE_RADIUS_M,
};

/// Point-compression parameters applied when a path is indexed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Control points are only merged when the two adjoining segments sum to less than this (meters)
    pub max_merge_distance_m: f64,
    /// Control points are only merged when the heading changes by less than this (degrees)
    pub angle_tolerance_deg: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_merge_distance_m: DEFAULT_MAX_MERGE_DISTANCE_M,
            angle_tolerance_deg: DEFAULT_ANGLE_TOLERANCE_DEG,
        }
    }
}

/// Tracker tuning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Arrival proximity (meters)
    pub bubble_radius_m: f64,
    /// Distance from the path beyond which the agent is off route (meters)
    pub off_route_bubble_radius_m: f64,
    /// Delay before `OffRoute` is reported, 0 reports it on the same tick (milliseconds)
    pub off_route_event_delay_ms: u64,
    pub compression: CompressionConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            bubble_radius_m: DEFAULT_BUBBLE_RADIUS_M,
            off_route_bubble_radius_m: DEFAULT_OFF_ROUTE_BUBBLE_RADIUS_M,
            off_route_event_delay_ms: 0,
            compression: CompressionConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Invalid parameter value
    #[error("invalid parameter {parameter}={value}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    /// Configuration file I/O error
    #[error("{message}")]
    IoError { message: String },
    /// JSON serialization/deserialization error
    #[error("{message}")]
    SerializationError { message: String },
}

impl From<ConfigError> for NavError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidParameter {
                parameter,
                value,
                reason,
            } => NavError::InvalidParameter {
                parameter,
                value,
                reason,
            },
            ConfigError::IoError { message } | ConfigError::SerializationError { message } => {
                NavError::InvalidParameter {
                    parameter: "config".to_string(),
                    value: String::new(),
                    reason: message,
                }
            }
        }
    }
}

fn positive_radius(parameter: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: "Radius must be a finite, positive number of meters".to_string(),
        });
    }
    Ok(())
}

impl CompressionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.max_merge_distance_m.is_finite() || self.max_merge_distance_m < 0.0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "compression.max_merge_distance_m".to_string(),
                value: self.max_merge_distance_m.to_string(),
                reason: "Merge distance must be finite and non-negative".to_string(),
            });
        }
        if !(0.0..=180.0).contains(&self.angle_tolerance_deg) {
            return Err(ConfigError::InvalidParameter {
                parameter: "compression.angle_tolerance_deg".to_string(),
                value: self.angle_tolerance_deg.to_string(),
                reason: "Angle tolerance must be between 0 and 180 degrees".to_string(),
            });
        }
        Ok(())
    }

    /// Compression that keeps every point
    pub fn disabled() -> Self {
        Self {
            max_merge_distance_m: 0.0,
            angle_tolerance_deg: 0.0,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_radius("bubble_radius_m", self.bubble_radius_m)?;
        positive_radius("off_route_bubble_radius_m", self.off_route_bubble_radius_m)?;
        self.compression.validate()
    }

    /// Load and validate a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        let config: TrackerConfig = serde_json::from_str(&content).map_err(|e| ConfigError::SerializationError {
            message: format!("Failed to parse config file '{}': {}", path_str, e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializationError {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })
    }

    /// Update the arrival radius, returning the previous value
    pub fn set_bubble_radius(&mut self, radius_m: f64) -> Result<f64, ConfigError> {
        positive_radius("bubble_radius_m", radius_m)?;
        Ok(std::mem::replace(&mut self.bubble_radius_m, radius_m))
    }

    /// Update the off-route threshold, returning the previous value
    pub fn set_off_route_bubble_radius(&mut self, radius_m: f64) -> Result<f64, ConfigError> {
        positive_radius("off_route_bubble_radius_m", radius_m)?;
        Ok(std::mem::replace(&mut self.off_route_bubble_radius_m, radius_m))
    }

    /// Update the off-route event delay, returning the previous value
    pub fn set_off_route_event_delay(&mut self, delay: Duration) -> u64 {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        std::mem::replace(&mut self.off_route_event_delay_ms, millis)
    }

    pub fn off_route_event_delay(&self) -> Duration {
        Duration::from_millis(self.off_route_event_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert_eq!(config.bubble_radius_m, 20.0);
        assert_eq!(config.off_route_bubble_radius_m, 50.0);
        assert_eq!(config.off_route_event_delay(), Duration::ZERO);
        assert_eq!(config.compression.max_merge_distance_m, 1000.0);
        assert_eq!(config.compression.angle_tolerance_deg, 4.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_runtime_radius_adjustment() {
        let mut config = TrackerConfig::default();

        let old = config.set_bubble_radius(35.0).unwrap();
        assert_eq!(old, 20.0);
        assert_eq!(config.bubble_radius_m, 35.0);

        assert!(config.set_bubble_radius(-1.0).is_err());
        assert!(config.set_bubble_radius(f64::NAN).is_err());
        assert_eq!(config.bubble_radius_m, 35.0);

        let old = config.set_off_route_bubble_radius(30.0).unwrap();
        assert_eq!(old, 50.0);
        assert!(config.set_off_route_bubble_radius(0.0).is_err());
        assert_eq!(config.off_route_bubble_radius_m, 30.0);
    }

    #[test]
    fn test_invalid_compression_rejected() {
        let mut config = TrackerConfig::default();
        config.compression.angle_tolerance_deg = 200.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { ref parameter, .. }) if parameter == "compression.angle_tolerance_deg"
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrackerConfig = serde_json::from_str(r#"{"bubble_radius_m": 50.0}"#).unwrap();
        assert_eq!(config.bubble_radius_m, 50.0);
        assert_eq!(config.off_route_bubble_radius_m, 50.0);
        assert_eq!(config.compression, CompressionConfig::default());
    }

    #[test]
    fn test_config_file_round_trip() {
        let mut config = TrackerConfig::default();
        config.set_bubble_radius(42.0).unwrap();
        config.set_off_route_event_delay(Duration::from_millis(3000));

        let temp_path = std::env::temp_dir().join(format!("route_nav_config_{}.json", std::process::id()));
        config.save_to_file(&temp_path).unwrap();
        let loaded = TrackerConfig::from_file(&temp_path).unwrap();
        assert_eq!(loaded, config);

        let _ = fs::remove_file(temp_path);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = TrackerConfig::from_file("/nonexistent/route_nav.json");
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }

    #[test]
    fn test_config_error_converts_to_nav_error() {
        let err: NavError = TrackerConfig::default().set_bubble_radius(-5.0).unwrap_err().into();
        assert!(matches!(err, NavError::InvalidParameter { ref parameter, .. } if parameter == "bubble_radius_m"));
    }
}
