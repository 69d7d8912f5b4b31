pub mod connection_manager;
pub mod modbus_service;
#[cfg(feature = "api")]
pub mod api_service;

pub use connection_manager::ConnectionManager;
pub use modbus_service::ModbusService;
#[cfg(feature = "api")]
pub use api_service::{ApiService, ApiServiceState};
