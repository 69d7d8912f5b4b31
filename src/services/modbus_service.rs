use log::{error, info, warn};
use std::sync::Arc;

use crate::config::ModbusConfig;
use crate::modbus::client::{ModbusConnector, TcpConnector};
use crate::modbus::protocol::{
    Command, ModbusRequest, ModbusResponse, ReadKind, ResponseData, INVALID_ACTION,
};
use crate::modbus::validation::validate;
use crate::services::connection_manager::ConnectionManager;

/// Validates requests and dispatches each one to exactly one Modbus operation
/// on the shared connection. Constructed once at startup and shared by handle.
pub struct ModbusService {
    connections: ConnectionManager,
}

impl ModbusService {
    pub fn new(connector: Arc<dyn ModbusConnector>, config: &ModbusConfig) -> Self {
        Self {
            connections: ConnectionManager::new(connector, config),
        }
    }

    /// Service talking Modbus TCP through `tokio-modbus`.
    pub fn tcp(config: &ModbusConfig) -> Self {
        Self::new(Arc::new(TcpConnector), config)
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub async fn is_connected(&self) -> bool {
        self.connections.is_connected().await
    }

    /// Close the connection, if any. Called once on shutdown.
    pub async fn shutdown(&self) {
        if let Some((host, port)) = self.connections.peer().await {
            info!("🛑 Closing Modbus connection to {}:{} on shutdown", host, port);
            self.connections.disconnect().await;
        }
    }

    pub async fn execute_request(&self, request: &ModbusRequest) -> ModbusResponse {
        match validate(request) {
            Ok(command) => self.execute(command).await,
            Err(e) => {
                warn!("❌ Rejected {} request: {}", request.action, e);
                ModbusResponse::failure(e.to_string())
            }
        }
    }

    pub async fn execute(&self, command: Command) -> ModbusResponse {
        match command {
            Command::Connect { host, port } => self.connections.connect(&host, port).await,
            Command::Disconnect => self.connections.disconnect().await,
            Command::Status => self.connections.status().await,
            Command::Read { kind, unit_id, address, quantity } => {
                self.read(kind, unit_id, address, quantity).await
            }
            Command::WriteCoil { unit_id, address, value } => {
                self.write_coil(unit_id, address, value).await
            }
            Command::WriteRegister { unit_id, address, value } => {
                self.write_register(unit_id, address, value).await
            }
            // Bulk coil writes are validated but have no dispatch route.
            Command::WriteCoils { .. } | Command::Unsupported(_) => {
                ModbusResponse::failure(INVALID_ACTION)
            }
        }
    }

    pub async fn read(
        &self,
        kind: ReadKind,
        unit_id: u8,
        address: u16,
        quantity: u16,
    ) -> ModbusResponse {
        let mut session = self.connections.session().await;
        let client = match session.client() {
            Ok(client) => client,
            Err(e) => return ModbusResponse::failure(e.to_string()),
        };

        let result = if kind.is_bit_access() {
            client
                .read_bits(kind, unit_id, address, quantity)
                .await
                .map(ResponseData::Bits)
        } else {
            client
                .read_registers(kind, unit_id, address, quantity)
                .await
                .map(ResponseData::Registers)
        };

        match result {
            Ok(data) => ModbusResponse::ok(format!(
                "Read {} {} from address {}",
                quantity,
                kind.label(),
                address
            ))
            .with_data(data),
            Err(e) => {
                error!("❌ {} failed on unit {} at {}: {}", kind.operation(), unit_id, address, e);
                ModbusResponse::failure(format!("Failed to {}: {}", kind.operation(), e))
            }
        }
    }

    pub async fn write_coil(&self, unit_id: u8, address: u16, value: bool) -> ModbusResponse {
        let mut session = self.connections.session().await;
        let client = match session.client() {
            Ok(client) => client,
            Err(e) => return ModbusResponse::failure(e.to_string()),
        };

        match client.write_single_coil(unit_id, address, value).await {
            Ok(()) => {
                ModbusResponse::ok(format!("Written {} to coil at address {}", value, address))
            }
            Err(e) => {
                error!("❌ writeCoil failed on unit {} at {}: {}", unit_id, address, e);
                ModbusResponse::failure(format!("Failed to write coil: {}", e))
            }
        }
    }

    pub async fn write_register(&self, unit_id: u8, address: u16, value: u16) -> ModbusResponse {
        let mut session = self.connections.session().await;
        let client = match session.client() {
            Ok(client) => client,
            Err(e) => return ModbusResponse::failure(e.to_string()),
        };

        match client.write_single_register(unit_id, address, value).await {
            Ok(()) => ModbusResponse::ok(format!(
                "Written {} to register at address {}",
                value, address
            )),
            Err(e) => {
                error!("❌ writeRegister failed on unit {} at {}: {}", unit_id, address, e);
                ModbusResponse::failure(format!("Failed to write register: {}", e))
            }
        }
    }
}
