use async_trait::async_trait;
use log::{debug, error, info};
use std::fmt::Display;
use std::net::SocketAddr;
use tokio::time::{timeout, Duration};
use tokio_modbus::client::{tcp, Context};
use tokio_modbus::prelude::*;

use super::protocol::ReadKind;
use crate::utils::error::ModbusError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// One live Modbus client. Every call names the unit it targets, so unit
/// selection and the request itself happen under the same `&mut self` borrow.
#[async_trait]
pub trait ModbusClientTrait: Send {
    async fn read_bits(
        &mut self,
        kind: ReadKind,
        unit_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<bool>, ModbusError>;

    async fn read_registers(
        &mut self,
        kind: ReadKind,
        unit_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, ModbusError>;

    async fn write_single_coil(
        &mut self,
        unit_id: u8,
        address: u16,
        value: bool,
    ) -> Result<(), ModbusError>;

    async fn write_single_register(
        &mut self,
        unit_id: u8,
        address: u16,
        value: u16,
    ) -> Result<(), ModbusError>;

    /// Per-call timeout applied to every subsequent request.
    fn set_timeout(&mut self, timeout: Duration);

    fn is_open(&self) -> bool;

    async fn close(&mut self) -> Result<(), ModbusError>;
}

/// Opens new clients. Kept separate from the client so the connection
/// manager can retry the handshake without knowing about sockets.
#[async_trait]
pub trait ModbusConnector: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Box<dyn ModbusClientTrait>, ModbusError>;
}

pub struct TcpConnector;

#[async_trait]
impl ModbusConnector for TcpConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Box<dyn ModbusClientTrait>, ModbusError> {
        let client = ModbusClient::connect(host, port).await?;
        Ok(Box::new(client))
    }
}

/// Modbus TCP client backed by `tokio-modbus`.
pub struct ModbusClient {
    ctx: Option<Context>,
    peer: SocketAddr,
    timeout: Duration,
}

impl ModbusClient {
    pub async fn connect(host: &str, port: u16) -> Result<Self, ModbusError> {
        info!("🔌 Connecting to Modbus TCP server: {}:{}", host, port);

        let peer = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| ModbusError::ConnectionError(format!("Cannot resolve {}: {}", host, e)))?
            .next()
            .ok_or_else(|| ModbusError::ConnectionError(format!("No address found for {}", host)))?;

        let ctx = tcp::connect_slave(peer, Slave(1)).await.map_err(|e| {
            error!("❌ Failed to connect to {}: {}", peer, e);
            ModbusError::ConnectionError(e.to_string())
        })?;

        info!("✅ Modbus TCP connection established with {}", peer);
        Ok(Self {
            ctx: Some(ctx),
            peer,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    fn context(&mut self, unit_id: u8) -> Result<&mut Context, ModbusError> {
        let ctx = self.ctx.as_mut().ok_or(ModbusError::NotConnected)?;
        ctx.set_slave(Slave(unit_id));
        Ok(ctx)
    }

    /// Drop the context when the transport itself failed, so the connection
    /// reports closed instead of failing every later request the same way.
    fn settle<T, E: Display, X: Display>(
        &mut self,
        result: Result<Result<Result<T, X>, E>, tokio::time::error::Elapsed>,
    ) -> Result<T, ModbusError> {
        match result {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(exception))) => Err(ModbusError::Exception(exception.to_string())),
            Ok(Err(e)) => {
                error!("❌ Modbus transport error with {}: {}", self.peer, e);
                self.ctx = None;
                Err(ModbusError::CommunicationError(e.to_string()))
            }
            Err(elapsed) => Err(elapsed.into()),
        }
    }
}

#[async_trait]
impl ModbusClientTrait for ModbusClient {
    async fn read_bits(
        &mut self,
        kind: ReadKind,
        unit_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<bool>, ModbusError> {
        debug!("📊 {} unit={} address={} quantity={}", kind.operation(), unit_id, address, quantity);

        let limit = self.timeout;
        let ctx = self.context(unit_id)?;
        let result = match kind {
            ReadKind::Coils => timeout(limit, ctx.read_coils(address, quantity)).await,
            ReadKind::DiscreteInputs => {
                timeout(limit, ctx.read_discrete_inputs(address, quantity)).await
            }
            _ => {
                return Err(ModbusError::CommunicationError(format!(
                    "{} does not return bits",
                    kind.operation()
                )))
            }
        };
        self.settle(result)
    }

    async fn read_registers(
        &mut self,
        kind: ReadKind,
        unit_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, ModbusError> {
        debug!("📊 {} unit={} address={} quantity={}", kind.operation(), unit_id, address, quantity);

        let limit = self.timeout;
        let ctx = self.context(unit_id)?;
        let result = match kind {
            ReadKind::HoldingRegisters => {
                timeout(limit, ctx.read_holding_registers(address, quantity)).await
            }
            ReadKind::InputRegisters => {
                timeout(limit, ctx.read_input_registers(address, quantity)).await
            }
            _ => {
                return Err(ModbusError::CommunicationError(format!(
                    "{} does not return registers",
                    kind.operation()
                )))
            }
        };
        self.settle(result)
    }

    async fn write_single_coil(
        &mut self,
        unit_id: u8,
        address: u16,
        value: bool,
    ) -> Result<(), ModbusError> {
        debug!("📝 writeCoil unit={} address={} value={}", unit_id, address, value);

        let limit = self.timeout;
        let ctx = self.context(unit_id)?;
        let result = timeout(limit, ctx.write_single_coil(address, value)).await;
        self.settle(result)
    }

    async fn write_single_register(
        &mut self,
        unit_id: u8,
        address: u16,
        value: u16,
    ) -> Result<(), ModbusError> {
        debug!("📝 writeRegister unit={} address={} value={}", unit_id, address, value);

        let limit = self.timeout;
        let ctx = self.context(unit_id)?;
        let result = timeout(limit, ctx.write_single_register(address, value)).await;
        self.settle(result)
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn is_open(&self) -> bool {
        self.ctx.is_some()
    }

    async fn close(&mut self) -> Result<(), ModbusError> {
        if let Some(mut ctx) = self.ctx.take() {
            info!("🔌 Closing Modbus TCP connection with {}", self.peer);
            ctx.disconnect()
                .await
                .map_err(|e| ModbusError::CommunicationError(format!("Close failed: {}", e)))?;
        }
        Ok(())
    }
}
