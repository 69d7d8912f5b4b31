use clap::ArgMatches;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::time::Duration;
use uuid::Uuid;

use crate::utils::error::ModbusError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Console identification
    #[serde(default)]
    pub instance_uuid: String,
    #[serde(default)]
    pub instance_name: String,
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub modbus: ModbusConfig,
    #[serde(default)]
    pub grid: GridConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusConfig {
    /// Target the CLI uses when no host is given.
    pub default_host: String,
    pub default_port: u16,
    pub timeout_ms: u64,
    pub connect_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub size: u32,
    /// LEDs per panel, numbered from 1.
    pub led_count: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            environment: "development".to_string(),
        }
    }
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            default_host: "192.168.7.200".to_string(),
            default_port: 502,
            timeout_ms: 5000,
            connect_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: 10,
            led_count: 4,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance_uuid: Uuid::new_v4().to_string(),
            instance_name: "Lighting Grid Test Console".to_string(),
            version: crate::VERSION.to_string(),
            server: ServerConfig::default(),
            modbus: ModbusConfig::default(),
            grid: GridConfig::default(),
        }
    }
}

impl ModbusConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Config {
    /// Load the file named by `--config` (if any) and apply command line overrides.
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, ModbusError> {
        let mut config = match matches.get_one::<String>("config") {
            Some(path) if Path::new(path).exists() => {
                info!("📄 Loading configuration from {}", path);
                Self::from_file(path)?
            }
            Some(path) => {
                warn!("⚠️  Configuration file {} not found, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        if let Some(host) = matches.get_one::<String>("host") {
            config.modbus.default_host = host.clone();
        }
        if let Some(port) = matches.get_one::<u16>("modbus-port") {
            config.modbus.default_port = *port;
        }
        if let Some(timeout_ms) = matches.get_one::<u64>("timeout") {
            config.modbus.timeout_ms = *timeout_ms;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModbusError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.instance_uuid.is_empty() {
            config.instance_uuid = Uuid::new_v4().to_string();
        }
        if config.instance_name.is_empty() {
            config.instance_name = "Lighting Grid Test Console".to_string();
        }
        if config.version.is_empty() {
            config.version = crate::VERSION.to_string();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ModbusError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ModbusError> {
        if self.modbus.connect_attempts == 0 {
            return Err(ModbusError::ConfigError(
                "modbus.connect_attempts must be at least 1".to_string(),
            ));
        }
        if self.modbus.timeout_ms == 0 {
            return Err(ModbusError::ConfigError(
                "modbus.timeout_ms must be greater than 0".to_string(),
            ));
        }
        if !(1..=16).contains(&self.grid.size) {
            return Err(ModbusError::ConfigError(format!(
                "grid.size must be between 1 and 16, got {}",
                self.grid.size
            )));
        }
        if self.grid.led_count == 0 {
            return Err(ModbusError::ConfigError("grid.led_count must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}
