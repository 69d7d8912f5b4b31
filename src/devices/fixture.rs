use log::{info, warn};

use super::grid::GridPosition;
use crate::modbus::protocol::{ModbusRequest, ModbusResponse};
use crate::services::ModbusService;
use crate::utils::error::ModbusError;

pub const BROADCAST_UNIT_ID: u8 = 0;
/// Unit id a factory-fresh panel answers on.
pub const CONFIG_UNIT_ID: u8 = 247;
pub const UNIT_ID_REGISTER: u16 = 4;
pub const RESET_ADDRESSES: [u16; 2] = [500, 501];
pub const SAVE_CONFIG_ADDRESS: u16 = 503;
pub const LIGHT_COIL_BASE: u16 = 1000;

/// A light panel, or every panel on the bus when broadcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightFixture {
    unit_id: u8,
}

impl LightFixture {
    pub fn new(unit_id: u8) -> Self {
        Self { unit_id }
    }

    pub fn broadcast() -> Self {
        Self::new(BROADCAST_UNIT_ID)
    }

    /// The fixture installed at `position`.
    pub fn at(position: GridPosition, grid_size: u32) -> Result<Self, ModbusError> {
        let unit_id = position
            .unit_id(grid_size)
            .map_err(|e| ModbusError::Validation(e.to_string()))?;
        let unit_id = u8::try_from(unit_id).map_err(|_| {
            ModbusError::Validation(format!(
                "Grid position {}x{} maps to unit {}, beyond the Modbus unit range",
                position.row, position.col, unit_id
            ))
        })?;
        Ok(Self::new(unit_id))
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn is_broadcast(&self) -> bool {
        self.unit_id == BROADCAST_UNIT_ID
    }

    pub fn light(&self, led: u16, on: bool) -> Result<ModbusRequest, ModbusError> {
        let address = LIGHT_COIL_BASE
            .checked_add(led)
            .ok_or_else(|| ModbusError::Validation(format!("LED {} is out of range", led)))?;
        Ok(ModbusRequest::write_coil(self.unit_id, address, on))
    }

    pub fn save_config(&self) -> ModbusRequest {
        ModbusRequest::write_coil(self.unit_id, SAVE_CONFIG_ADDRESS, true)
    }

    /// Brightness lives in register `1<led>0` (LED 3 is register 130) and only
    /// sticks once the configuration is saved.
    pub fn set_brightness(&self, led: u16, level: u16) -> Result<Vec<ModbusRequest>, ModbusError> {
        let address: u16 = format!("1{}0", led)
            .parse()
            .map_err(|_| ModbusError::Validation(format!("LED {} is out of range", led)))?;
        Ok(vec![
            ModbusRequest::write_register(self.unit_id, address, level),
            self.save_config(),
        ])
    }

    pub fn change_unit_id(&self, new_unit_id: u8) -> Vec<ModbusRequest> {
        vec![
            ModbusRequest::write_register(self.unit_id, UNIT_ID_REGISTER, new_unit_id as u16),
            self.save_config(),
        ]
    }

    pub fn reset(&self) -> Vec<ModbusRequest> {
        RESET_ADDRESSES
            .iter()
            .map(|address| ModbusRequest::write_coil(self.unit_id, *address, true))
            .collect()
    }
}

/// Run a sequence of requests in order, stopping after the first failure so a
/// configuration save never follows a write that did not land.
pub async fn apply(service: &ModbusService, requests: &[ModbusRequest]) -> Vec<ModbusResponse> {
    let mut responses = Vec::with_capacity(requests.len());

    for request in requests {
        let response = service.execute_request(request).await;
        let failed = !response.success;
        if failed {
            warn!("⚠️  {} failed: {}", request.action, response.summary());
        } else {
            info!("✅ {}", response.summary());
        }
        responses.push(response);
        if failed {
            break;
        }
    }

    responses
}
