//! # Configuration Management
//!
//! Settings for a link: packet pacing and message limits, pairing, and
//! logging.
//!
//! ## Configuration Sources
//! - TOML files via [`LinkConfig::from_file`]
//! - Environment variables via [`LinkConfig::from_env`]
//! - Direct instantiation with defaults
//!
//! ## Example
//! ```toml
//! [framer]
//! send_interval = 10
//! max_message_size = 255
//! max_parked = 64
//!
//! [pairing]
//! pin_digits = 6
//!
//! [logging]
//! app_name = "cubelink"
//! log_level = "info"
//! json_format = false
//! ```

use crate::core::packet::PAYLOAD_LEN;
use crate::error::{ProtocolError, Result};
use crate::protocol::framer::MAX_PAYLOAD_LEN;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default pacing between packet writes
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(10);

/// Default cap on encrypted messages held while no key is set
pub const DEFAULT_MAX_PARKED: usize = 64;

/// Default number of PIN digits
pub const DEFAULT_PIN_DIGITS: u32 = 6;

/// Top-level link configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct LinkConfig {
    #[serde(default)]
    pub framer: FramerConfig,

    #[serde(default)]
    pub pairing: PairingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LinkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overridden by `CUBELINK_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(interval) = std::env::var("CUBELINK_SEND_INTERVAL_MS") {
            let millis = interval.parse::<u64>().map_err(|_| {
                ProtocolError::ConfigError(format!(
                    "CUBELINK_SEND_INTERVAL_MS is not a number: {interval}"
                ))
            })?;
            config.framer.send_interval = Duration::from_millis(millis);
        }

        if let Ok(level) = std::env::var("CUBELINK_LOG_LEVEL") {
            config.logging.log_level = level.parse::<Level>().map_err(|_| {
                ProtocolError::ConfigError(format!("CUBELINK_LOG_LEVEL is invalid: {level}"))
            })?;
        }

        if let Ok(digits) = std::env::var("CUBELINK_PIN_DIGITS") {
            if let Ok(val) = digits.parse::<u32>() {
                config.pairing.pin_digits = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration
    ///
    /// Returns a list of problems. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.framer.validate());
        errors.extend(self.pairing.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Packet framing and queueing
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FramerConfig {
    /// Pause between two packet writes
    #[serde(with = "duration_serde")]
    pub send_interval: Duration,

    /// Largest payload accepted by `send`
    pub max_message_size: usize,

    /// Encrypted messages kept while waiting for a session key
    pub max_parked: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            send_interval: DEFAULT_SEND_INTERVAL,
            max_message_size: MAX_PAYLOAD_LEN,
            max_parked: DEFAULT_MAX_PARKED,
        }
    }
}

impl FramerConfig {
    /// Payload bytes per packet; fixed by the radio characteristic
    pub const fn packet_payload_size(&self) -> usize {
        PAYLOAD_LEN
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.send_interval.is_zero() {
            errors.push("Send interval must be greater than 0".to_string());
        } else if self.send_interval > Duration::from_secs(1) {
            errors.push(format!(
                "Send interval too long: {}ms (maximum: 1000ms)",
                self.send_interval.as_millis()
            ));
        }

        if self.max_message_size == 0 {
            errors.push("Max message size cannot be 0".to_string());
        } else if self.max_message_size > MAX_PAYLOAD_LEN {
            errors.push(format!(
                "Max message size too large: {} bytes (the length byte allows {MAX_PAYLOAD_LEN})",
                self.max_message_size
            ));
        }

        if self.max_parked == 0 {
            errors.push("Max parked messages must be greater than 0".to_string());
        }

        errors
    }
}

/// PIN pairing
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PairingConfig {
    /// Decimal digits of generated PINs
    pub pin_digits: u32,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            pin_digits: DEFAULT_PIN_DIGITS,
        }
    }
}

impl PairingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.pin_digits == 0 || self.pin_digits > 9 {
            errors.push(format!(
                "Invalid PIN digit count: {} (valid range: 1-9)",
                self.pin_digits
            ));
        } else if self.pin_digits < 4 {
            errors.push(format!(
                "WARNING: {}-digit PINs are easy to guess",
                self.pin_digits
            ));
        }
        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Emit JSON lines instead of human-readable output
    pub json_format: bool,

    /// Colorize human-readable output
    #[serde(default)]
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("cubelink"),
            log_level: Level::INFO,
            json_format: false,
            ansi: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }
        if self.json_format && self.ansi {
            errors.push("ANSI colors have no effect with JSON output".to_string());
        }
        errors
    }
}

/// Durations as integer milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// `tracing::Level` as a lowercase string
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
