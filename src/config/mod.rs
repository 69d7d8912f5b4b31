pub mod settings;

pub use settings::{Config, GridConfig, ModbusConfig, ServerConfig};
