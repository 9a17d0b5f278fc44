//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::packet::registry::FrameVariant;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub frame: FrameConfig,
    pub radio: RadioConfig,
    pub cellular: CellularConfig,
    pub onboard: OnboardConfig,
    pub gps: GpsConfig,
    pub sensors: SensorConfig,
}

/// Telemetry frame configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FrameConfig {
    /// Registry variant: wire layouts differ between deployment targets
    /// and are bit-incompatible, so this must match the ground side
    pub variant: FrameVariant,
}

/// Radio link configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RadioConfig {
    pub device: String,
    pub baud_rate: u32,
    pub send_interval_ms: u64,
    pub backoff_ms: u64,
}

/// Cellular uplink configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CellularConfig {
    pub apn: String,
    pub endpoint: String,
    pub send_interval_ms: u64,
    pub backoff_ms: u64,
    /// Delay before first modem command, giving it time to register
    pub startup_delay_ms: u64,
    pub request_timeout_ms: u64,
}

/// Onboard durable log configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OnboardConfig {
    pub path: String,
    pub send_interval_ms: u64,
    pub backoff_ms: u64,
    /// Battery voltage above which a boot counts as a deliberate stable
    /// power-up; below it the existing log is preserved
    pub battery_threshold_v: f64,
}

/// GNSS feed configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GpsConfig {
    pub device: String,
    pub baud_rate: u32,
    pub poll_interval_ms: u64,
    pub backoff_ms: u64,
}

/// Sensor sampler configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SensorConfig {
    pub sample_interval_ms: u64,
    pub backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            radio: RadioConfig::default(),
            cellular: CellularConfig::default(),
            onboard: OnboardConfig::default(),
            gps: GpsConfig::default(),
            sensors: SensorConfig::default(),
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self { variant: FrameVariant::Extended }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            send_interval_ms: 750,
            backoff_ms: 1000,
        }
    }
}

impl Default for CellularConfig {
    fn default() -> Self {
        Self {
            apn: "internet".to_string(),
            endpoint: "http://130.61.136.101:8019/telemetry".to_string(),
            send_interval_ms: 50,
            backoff_ms: 1000,
            startup_delay_ms: 10_000,
            request_timeout_ms: 5000,
        }
    }
}

impl Default for OnboardConfig {
    fn default() -> Self {
        Self {
            path: "onboard.log".to_string(),
            send_interval_ms: 950,
            backoff_ms: 950,
            battery_threshold_v: 3.0,
        }
    }
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyAMA0".to_string(),
            baud_rate: 9600,
            poll_interval_ms: 20,
            backoff_ms: 1000,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 10,
            backoff_ms: 1000,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or TOML parsing fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent.
    ///
    /// A present-but-invalid file is still an error: silently ignoring a
    /// typo in flight configuration would be worse than refusing to boot.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_flight_constants() {
        let config = Config::default();
        assert_eq!(config.frame.variant, FrameVariant::Extended);
        assert_eq!(config.radio.send_interval_ms, 750);
        assert_eq!(config.radio.backoff_ms, 1000);
        assert_eq!(config.cellular.send_interval_ms, 50);
        assert_eq!(config.cellular.backoff_ms, 1000);
        assert_eq!(config.onboard.send_interval_ms, 950);
        assert_eq!(config.onboard.battery_threshold_v, 3.0);
        assert_eq!(config.gps.poll_interval_ms, 20);
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [frame]
            variant = "minimal"

            [radio]
            device = "/dev/ttyS1"
            "#,
        )
        .unwrap();

        assert_eq!(config.frame.variant, FrameVariant::Minimal);
        assert_eq!(config.radio.device, "/dev/ttyS1");
        // Unspecified values keep their defaults
        assert_eq!(config.radio.baud_rate, 9600);
        assert_eq!(config.cellular.send_interval_ms, 50);
    }

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.frame.variant, FrameVariant::Extended);
    }

    #[test]
    fn test_invalid_variant_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str(
            r#"
            [frame]
            variant = "merged"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/stratolink.toml").unwrap();
        assert_eq!(config.onboard.path, "onboard.log");
    }

    #[test]
    fn test_load_or_default_invalid_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stratolink.toml");
        std::fs::write(&path, "frame = 12").unwrap();
        assert!(Config::load_or_default(&path).is_err());
    }
}
