//! # Configuration Management Module
//!
//! Static settings for one tracker: which serial port the modem sits on, which
//! APN the bearer attaches to, where telemetry goes and how the device
//! identifies itself. None of it changes while the engine runs.
//!
//! ## Configuration Structure
//!
//! - [`ModemConfig`] - serial port and baud rate
//! - [`NetworkConfig`] - carrier APN
//! - [`ServerConfig`] - TCP collector host and port
//! - [`DeviceConfig`] - device and vehicle identifiers stamped on each record
//! - [`Timing`] - optional overrides for every wait and retry budget
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use simtrack::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("APN: {}", config.network.apn);
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [modem]
//! port = "/dev/ttyUSB0"
//! baud_rate = 9600
//!
//! [network]
//! apn = "internet.netone"
//!
//! [server]
//! host = "31.97.156.77"
//! port = 9331
//!
//! [device]
//! device_id = "AGR 9021"
//! vehicle_id = "TRUCK-01"
//!
//! [timing]
//! command_timeout_ms = 8000   # any field may be omitted
//!
//! [logging]
//! level = "info"
//! file = "simtrack.log"
//! ```
//!
//! APN, host and identifiers are interpolated into quoted AT parameters and the
//! JSON record, so [`Config::validate`] rejects quotes and control characters.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::modem::{Timing, SUPPORTED_BAUD_RATES};
use crate::telemetry::Identity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub modem: ModemConfig,
    pub network: NetworkConfig,
    pub server: ServerConfig,
    pub device: DeviceConfig,
    #[serde(default)]
    pub timing: Timing,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModemConfig {
    pub port: String,
    pub baud_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub apn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub device_id: String,
    pub vehicle_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl DeviceConfig {
    pub fn identity(&self) -> Identity {
        Identity::new(self.device_id.clone(), self.vehicle_id.clone())
    }
}

fn check_field(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{} must not be empty", name);
    }
    if value.contains('"') || value.chars().any(char::is_control) {
        bail!("{} must not contain quotes or control characters", name);
    }
    Ok(())
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config
            .validate()
            .map_err(|e| anyhow!("Invalid config file {}: {}", path, e))?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        check_field("modem.port", &self.modem.port)?;
        if !SUPPORTED_BAUD_RATES.contains(&self.modem.baud_rate) {
            bail!(
                "modem.baud_rate {} is not one of {:?}",
                self.modem.baud_rate,
                SUPPORTED_BAUD_RATES
            );
        }
        check_field("network.apn", &self.network.apn)?;
        check_field("server.host", &self.server.host)?;
        if self.server.port == 0 {
            bail!("server.port must be non-zero");
        }
        check_field("device.device_id", &self.device.device_id)?;
        check_field("device.vehicle_id", &self.device.vehicle_id)?;
        if self.timing.command_timeout_ms == 0 {
            bail!("timing.command_timeout_ms must be non-zero");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            modem: ModemConfig {
                port: "/dev/ttyUSB0".to_string(),
                baud_rate: 9600,
            },
            network: NetworkConfig {
                apn: "internet.netone".to_string(),
            },
            server: ServerConfig {
                host: "31.97.156.77".to_string(),
                port: 9331,
            },
            device: DeviceConfig {
                device_id: "AGR 9021".to_string(),
                vehicle_id: "TRUCK-01".to_string(),
            },
            timing: Timing::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("simtrack.log".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.modem.baud_rate, 9600);
        assert_eq!(config.timing.command_retry_count, 2);
    }

    #[test]
    fn default_config_roundtrips_through_toml() {
        let serialized = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.network.apn, "internet.netone");
        assert_eq!(parsed.server.port, 9331);
        assert_eq!(parsed.timing, Timing::default());
    }

    #[test]
    fn timing_section_is_optional() {
        let text = r#"
            [modem]
            port = "/dev/ttyS1"
            baud_rate = 115200
            [network]
            apn = "web.gprs"
            [server]
            host = "telemetry.example.net"
            port = 7000
            [device]
            device_id = "D-7"
            vehicle_id = "V-9"
            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.timing, Timing::default());
        assert_eq!(config.logging.file, None);
        assert_eq!(config.device.identity(), Identity::new("D-7", "V-9"));
    }

    #[test]
    fn quoted_apn_rejected() {
        let mut config = Config::default();
        config.network.apn = "bad\"apn".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("network.apn"), "unexpected error: {err}");
    }

    #[test]
    fn unsupported_baud_and_zero_port_rejected() {
        let mut config = Config::default();
        config.modem.baud_rate = 12345;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.device.vehicle_id = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
