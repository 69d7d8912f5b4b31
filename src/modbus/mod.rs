pub mod client;
pub mod protocol;
pub mod validation;
#[cfg(test)]
pub(crate) mod mock;

pub use client::{ModbusClient, ModbusClientTrait, ModbusConnector, TcpConnector};
pub use protocol::{Command, ModbusAction, ModbusRequest, ModbusResponse, ReadKind, ResponseData};
pub use validation::validate;
