//! Modbus TCP test console for a grid of light panels.
//!
//! Requests from the operator console are validated, turned into typed
//! commands and executed over a single shared Modbus TCP connection. Panels
//! are addressed by their position in the grid.

pub mod cli;
pub mod config;
pub mod devices;
pub mod modbus;
pub mod output;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use devices::{calculate_grid_unit_id, get_grid_position, GridPosition, LightFixture};
pub use modbus::{ModbusClient, ModbusRequest, ModbusResponse};
pub use output::{ConsoleFormatter, CsvFormatter, HexFormatter, JsonFormatter, ResponseFormatter};
pub use services::{ConnectionManager, ModbusService};
pub use utils::error::ModbusError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
