//! In-memory stand-ins for the TCP client, used by unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};

use super::client::{ModbusClientTrait, ModbusConnector};
use super::protocol::ReadKind;
use crate::utils::error::ModbusError;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Read { kind: ReadKind, unit_id: u8, address: u16, quantity: u16 },
    WriteCoil { unit_id: u8, address: u16, value: bool },
    WriteRegister { unit_id: u8, address: u16, value: u16 },
    Close,
}

/// Shared view of everything the mock clients saw.
#[derive(Debug, Default)]
pub struct MockState {
    pub calls: Vec<Call>,
    pub connect_attempts: Vec<(String, u16, Instant)>,
    pub timeouts: Vec<Duration>,
    pub coils: HashMap<(u8, u16), bool>,
    pub registers: HashMap<(u8, u16), u16>,
    /// Makes the next request fail with this message.
    pub fail_next: Option<String>,
    pub fail_close: bool,
    /// Requests currently inside a client call, and the most ever seen at once.
    pub in_flight: usize,
    pub max_in_flight: usize,
}

pub type SharedState = Arc<Mutex<MockState>>;

pub struct MockModbusClient {
    state: SharedState,
    open: bool,
}

impl MockModbusClient {
    /// Record `call` after yielding once, so overlapping requests would show
    /// up in `max_in_flight`.
    async fn transact(&mut self, call: Call) -> Result<(), ModbusError> {
        {
            let mut state = self.state.lock().unwrap();
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }
        tokio::task::yield_now().await;
        let result = self.record(call);
        self.state.lock().unwrap().in_flight -= 1;
        result
    }

    fn record(&self, call: Call) -> Result<(), ModbusError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        match state.fail_next.take() {
            Some(message) => Err(ModbusError::CommunicationError(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ModbusClientTrait for MockModbusClient {
    async fn read_bits(
        &mut self,
        kind: ReadKind,
        unit_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<bool>, ModbusError> {
        self.transact(Call::Read { kind, unit_id, address, quantity }).await?;
        let state = self.state.lock().unwrap();
        Ok((0..quantity)
            .map(|i| *state.coils.get(&(unit_id, address.wrapping_add(i))).unwrap_or(&false))
            .collect())
    }

    async fn read_registers(
        &mut self,
        kind: ReadKind,
        unit_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, ModbusError> {
        self.transact(Call::Read { kind, unit_id, address, quantity }).await?;
        let state = self.state.lock().unwrap();
        Ok((0..quantity)
            .map(|i| *state.registers.get(&(unit_id, address.wrapping_add(i))).unwrap_or(&0))
            .collect())
    }

    async fn write_single_coil(
        &mut self,
        unit_id: u8,
        address: u16,
        value: bool,
    ) -> Result<(), ModbusError> {
        self.transact(Call::WriteCoil { unit_id, address, value }).await?;
        self.state.lock().unwrap().coils.insert((unit_id, address), value);
        Ok(())
    }

    async fn write_single_register(
        &mut self,
        unit_id: u8,
        address: u16,
        value: u16,
    ) -> Result<(), ModbusError> {
        self.transact(Call::WriteRegister { unit_id, address, value }).await?;
        self.state.lock().unwrap().registers.insert((unit_id, address), value);
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.state.lock().unwrap().timeouts.push(timeout);
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> Result<(), ModbusError> {
        self.open = false;
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Close);
        if state.fail_close {
            return Err(ModbusError::CommunicationError("socket already gone".to_string()));
        }
        Ok(())
    }
}

/// Connector whose first `failures` attempts are refused.
pub struct MockConnector {
    pub state: SharedState,
    failures: Mutex<u32>,
    /// Handshakes never complete, like a host that drops SYNs.
    stall: bool,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::failing(0)
    }

    pub fn failing(failures: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            failures: Mutex::new(failures),
            stall: false,
        }
    }

    pub fn stalled() -> Self {
        Self {
            stall: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl ModbusConnector for MockConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Box<dyn ModbusClientTrait>, ModbusError> {
        let attempt = {
            let mut state = self.state.lock().unwrap();
            state.connect_attempts.push((host.to_string(), port, Instant::now()));
            state.connect_attempts.len()
        };

        if self.stall {
            std::future::pending::<()>().await;
        }

        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(ModbusError::ConnectionError(format!(
                "connection refused (attempt {})",
                attempt
            )));
        }

        Ok(Box::new(MockModbusClient {
            state: self.state.clone(),
            open: true,
        }))
    }
}
