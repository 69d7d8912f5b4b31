use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

pub const DEFAULT_PORT: u16 = 502;
pub const MAX_UNIT_ID: i64 = 255;
pub const MAX_ADDRESS: i64 = 65535;
pub const MAX_QUANTITY: i64 = 125;
pub const MAX_REGISTER_VALUE: i64 = 65535;
/// Upper bound for a single write-multiple-coils request.
pub const MAX_WRITE_COILS: usize = 1968;

pub const NOT_CONNECTED: &str = "Not connected to Modbus server";
pub const INVALID_ACTION: &str = "Invalid action";
pub const INVALID_NUMBER: &str = "Value must be a valid number";

/// A request as it arrives from the operator console.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModbusRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, deserialize_with = "integral", skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<i64>,
    #[serde(default, deserialize_with = "integral", skip_serializing_if = "Option::is_none")]
    pub address: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, deserialize_with = "integral", skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
}

/// Integers, or floats with no fractional part (`4.0`). Range checks happen
/// later in validation.
fn integral<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    number
        .map(|n| {
            n.as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                        .map(|f| f as i64)
                })
                .ok_or_else(|| de::Error::custom(format!("expected an integer, found {}", n)))
        })
        .transpose()
}

impl ModbusRequest {
    pub fn new(action: ModbusAction) -> Self {
        Self {
            action: action.as_str().to_string(),
            ..Default::default()
        }
    }

    pub fn connect(host: &str, port: u16) -> Self {
        Self {
            host: Some(host.to_string()),
            port: Some(port),
            ..Self::new(ModbusAction::Connect)
        }
    }

    pub fn read(kind: ReadKind, unit_id: u8, address: u16, quantity: u16) -> Self {
        Self {
            unit_id: Some(unit_id as i64),
            address: Some(address as i64),
            quantity: Some(quantity as i64),
            ..Self::new(ModbusAction::Read(kind))
        }
    }

    pub fn write_coil(unit_id: u8, address: u16, value: bool) -> Self {
        Self {
            unit_id: Some(unit_id as i64),
            address: Some(address as i64),
            value: Some(Value::Bool(value)),
            ..Self::new(ModbusAction::WriteCoil)
        }
    }

    pub fn write_register(unit_id: u8, address: u16, value: u16) -> Self {
        Self {
            unit_id: Some(unit_id as i64),
            address: Some(address as i64),
            value: Some(Value::from(value)),
            ..Self::new(ModbusAction::WriteRegister)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    Coils,
    DiscreteInputs,
    HoldingRegisters,
    InputRegisters,
}

impl ReadKind {
    /// Operation name, as used in error messages.
    pub fn operation(&self) -> &'static str {
        match self {
            ReadKind::Coils => "readCoils",
            ReadKind::DiscreteInputs => "readDiscreteInputs",
            ReadKind::HoldingRegisters => "readHoldingRegisters",
            ReadKind::InputRegisters => "readInputRegisters",
        }
    }

    /// Operation name without the `read` prefix, lowercased.
    pub fn label(&self) -> &'static str {
        match self {
            ReadKind::Coils => "coils",
            ReadKind::DiscreteInputs => "discreteinputs",
            ReadKind::HoldingRegisters => "holdingregisters",
            ReadKind::InputRegisters => "inputregisters",
        }
    }

    pub fn is_bit_access(&self) -> bool {
        matches!(self, ReadKind::Coils | ReadKind::DiscreteInputs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModbusAction {
    Connect,
    Disconnect,
    Status,
    Read(ReadKind),
    WriteCoil,
    WriteRegister,
    WriteCoils,
}

impl ModbusAction {
    pub fn parse(action: &str) -> Option<Self> {
        let action = match action {
            "connect" => ModbusAction::Connect,
            "disconnect" => ModbusAction::Disconnect,
            "status" => ModbusAction::Status,
            "readCoils" => ModbusAction::Read(ReadKind::Coils),
            "readDiscreteInputs" => ModbusAction::Read(ReadKind::DiscreteInputs),
            "readHoldingRegisters" => ModbusAction::Read(ReadKind::HoldingRegisters),
            "readInputRegisters" => ModbusAction::Read(ReadKind::InputRegisters),
            "writeCoil" => ModbusAction::WriteCoil,
            "writeRegister" => ModbusAction::WriteRegister,
            "writeCoils" => ModbusAction::WriteCoils,
            _ => return None,
        };
        Some(action)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModbusAction::Connect => "connect",
            ModbusAction::Disconnect => "disconnect",
            ModbusAction::Status => "status",
            ModbusAction::Read(kind) => kind.operation(),
            ModbusAction::WriteCoil => "writeCoil",
            ModbusAction::WriteRegister => "writeRegister",
            ModbusAction::WriteCoils => "writeCoils",
        }
    }
}

impl fmt::Display for ModbusAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request after validation: every field the action needs is present,
/// in range, and already converted to its wire type.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect { host: String, port: u16 },
    Disconnect,
    Status,
    Read { kind: ReadKind, unit_id: u8, address: u16, quantity: u16 },
    WriteCoil { unit_id: u8, address: u16, value: bool },
    WriteRegister { unit_id: u8, address: u16, value: u16 },
    WriteCoils { unit_id: u8, address: u16, values: Vec<bool> },
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    Bits(Vec<bool>),
    Registers(Vec<u16>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModbusResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
}

impl ModbusResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: ResponseData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_connected(mut self, connected: bool) -> Self {
        self.connected = Some(connected);
        self
    }

    pub fn status(connected: bool) -> Self {
        Self::ok(if connected { "Connected" } else { "Disconnected" }).with_connected(connected)
    }

    /// Text an operator should see: the message on success, the error otherwise.
    pub fn summary(&self) -> &str {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or("Unknown result")
    }
}
