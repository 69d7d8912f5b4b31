pub mod error;
pub mod retry;

pub use error::ModbusError;
pub use retry::with_retry;
