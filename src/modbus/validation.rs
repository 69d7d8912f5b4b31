//! Request validation.
//!
//! Checks run in a fixed order and stop at the first failure, so the caller
//! always gets exactly one message describing what is wrong.

use serde_json::{Number, Value};

use super::protocol::{
    Command, ModbusAction, ModbusRequest, DEFAULT_PORT, INVALID_NUMBER, MAX_ADDRESS,
    MAX_QUANTITY, MAX_REGISTER_VALUE, MAX_UNIT_ID, MAX_WRITE_COILS,
};
use crate::utils::error::ModbusError;

fn invalid(message: impl Into<String>) -> ModbusError {
    ModbusError::Validation(message.into())
}

pub fn validate_unit_id(unit_id: i64) -> Result<u8, ModbusError> {
    if !(0..=MAX_UNIT_ID).contains(&unit_id) {
        return Err(invalid(format!("Unit ID must be between 0 and {}", MAX_UNIT_ID)));
    }
    Ok(unit_id as u8)
}

pub fn validate_address(address: i64) -> Result<u16, ModbusError> {
    if !(0..=MAX_ADDRESS).contains(&address) {
        return Err(invalid(format!("Address must be between 0 and {}", MAX_ADDRESS)));
    }
    Ok(address as u16)
}

pub fn validate_quantity(quantity: i64, max_quantity: i64) -> Result<u16, ModbusError> {
    if quantity < 1 || quantity > max_quantity {
        return Err(invalid(format!("Quantity must be between 1 and {}", max_quantity)));
    }
    Ok(quantity as u16)
}

pub fn validate_register_value(value: i64) -> Result<u16, ModbusError> {
    if !(0..=MAX_REGISTER_VALUE).contains(&value) {
        return Err(invalid(format!(
            "Register value must be between 0 and {}",
            MAX_REGISTER_VALUE
        )));
    }
    Ok(value as u16)
}

/// Lenient base-10 integer parse: leading whitespace, an optional sign and
/// as many digits as follow. Trailing garbage is ignored (`"12abc"` is 12).
pub fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Truthy strings are `true`, `1` and `on`, compared case-insensitively.
pub fn parse_boolean(text: &str) -> bool {
    matches!(text.trim().to_lowercase().as_str(), "true" | "1" | "on")
}

/// Numbers print the way a browser would: integral floats lose their `.0`.
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

/// Coerce a request value to a coil state. Native booleans pass through,
/// anything else is judged by its string form.
pub fn coerce_coil_value(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => parse_boolean(s),
        Value::Number(n) => parse_boolean(&number_text(n)),
        other => parse_boolean(&other.to_string()),
    }
}

/// Coerce a request value to an integer. Numbers are truncated toward zero,
/// strings go through [`parse_integer`]; everything else is rejected.
pub fn coerce_register_value(value: &Value) -> Result<i64, ModbusError> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => parse_integer(s),
        _ => None,
    };
    parsed.ok_or_else(|| ModbusError::Conversion(INVALID_NUMBER.to_string()))
}

fn require_target(request: &ModbusRequest, missing: &str) -> Result<(u8, u16), ModbusError> {
    let (unit_id, address) = match (request.unit_id, request.address) {
        (Some(unit_id), Some(address)) => (unit_id, address),
        _ => return Err(invalid(missing)),
    };
    Ok((validate_unit_id(unit_id)?, validate_address(address)?))
}

/// Validate a raw request and convert it into a [`Command`].
///
/// Actions that are not recognised pass through as [`Command::Unsupported`];
/// deciding what to do with them is the dispatcher's job.
pub fn validate(request: &ModbusRequest) -> Result<Command, ModbusError> {
    let action = match ModbusAction::parse(&request.action) {
        Some(action) => action,
        None => return Ok(Command::Unsupported(request.action.clone())),
    };

    match action {
        ModbusAction::Connect => {
            let host = request.host.as_deref().unwrap_or_default();
            if host.is_empty() {
                return Err(invalid("Host is required for connect action"));
            }
            Ok(Command::Connect {
                host: host.to_string(),
                port: request.port.unwrap_or(DEFAULT_PORT),
            })
        }

        ModbusAction::Disconnect => Ok(Command::Disconnect),

        ModbusAction::Status => Ok(Command::Status),

        ModbusAction::Read(kind) => {
            let (unit_id, address) =
                require_target(request, "Unit ID and address are required for read operations")?;
            let quantity = match request.quantity {
                Some(quantity) => validate_quantity(quantity, MAX_QUANTITY)?,
                None => 1,
            };
            Ok(Command::Read { kind, unit_id, address, quantity })
        }

        ModbusAction::WriteCoil | ModbusAction::WriteRegister => {
            let missing = "Unit ID, address, and value are required for write operations";
            let value = match &request.value {
                Some(value) if request.unit_id.is_some() && request.address.is_some() => value,
                _ => return Err(invalid(missing)),
            };
            let (unit_id, address) = require_target(request, missing)?;

            if action == ModbusAction::WriteCoil {
                return Ok(Command::WriteCoil {
                    unit_id,
                    address,
                    value: coerce_coil_value(value),
                });
            }

            let value = validate_register_value(coerce_register_value(value)?)?;
            Ok(Command::WriteRegister { unit_id, address, value })
        }

        ModbusAction::WriteCoils => {
            let missing = "Unit ID, address, and values are required for writeCoils operation";
            let values = match &request.value {
                Some(value) if request.unit_id.is_some() && request.address.is_some() => value,
                _ => return Err(invalid(missing)),
            };
            let values = values
                .as_array()
                .ok_or_else(|| invalid("Values must be an array for writeCoils operation"))?;
            if values.is_empty() {
                return Err(invalid("Values array cannot be empty"));
            }
            if values.len() > MAX_WRITE_COILS {
                return Err(invalid(format!(
                    "Cannot write more than {} coils at once",
                    MAX_WRITE_COILS
                )));
            }
            let (unit_id, address) = require_target(request, missing)?;

            Ok(Command::WriteCoils {
                unit_id,
                address,
                values: values.iter().map(coerce_coil_value).collect(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::protocol::ReadKind;
    use serde_json::json;

    fn request(value: Value) -> ModbusRequest {
        serde_json::from_value(value).unwrap()
    }

    fn error_of(value: Value) -> String {
        validate(&request(value)).unwrap_err().to_string()
    }

    #[test]
    fn test_connect_requires_host() {
        assert_eq!(error_of(json!({ "action": "connect" })), "Host is required for connect action");
        assert_eq!(
            error_of(json!({ "action": "connect", "host": "" })),
            "Host is required for connect action"
        );
        assert_eq!(
            validate(&request(json!({ "action": "connect", "host": "10.0.0.5" }))).unwrap(),
            Command::Connect { host: "10.0.0.5".to_string(), port: 502 }
        );
    }

    #[test]
    fn test_read_requires_unit_and_address() {
        assert_eq!(
            error_of(json!({ "action": "readCoils", "address": 0 })),
            "Unit ID and address are required for read operations"
        );
        assert_eq!(
            error_of(json!({ "action": "readInputRegisters", "unitId": 1 })),
            "Unit ID and address are required for read operations"
        );
    }

    #[test]
    fn test_read_ranges_checked_in_order() {
        assert_eq!(
            error_of(json!({ "action": "readCoils", "unitId": 256, "address": 70000 })),
            "Unit ID must be between 0 and 255"
        );
        assert_eq!(
            error_of(json!({ "action": "readCoils", "unitId": -1, "address": 0 })),
            "Unit ID must be between 0 and 255"
        );
        assert_eq!(
            error_of(json!({ "action": "readCoils", "unitId": 1, "address": 65536 })),
            "Address must be between 0 and 65535"
        );
        assert_eq!(
            error_of(json!({ "action": "readCoils", "unitId": 1, "address": 0, "quantity": 0 })),
            "Quantity must be between 1 and 125"
        );
        assert_eq!(
            error_of(json!({ "action": "readCoils", "unitId": 1, "address": 0, "quantity": 126 })),
            "Quantity must be between 1 and 125"
        );
    }

    #[test]
    fn test_read_accepts_broadcast_unit_and_defaults_quantity() {
        let command = validate(&request(json!({
            "action": "readHoldingRegisters",
            "unitId": 0,
            "address": 65535
        })))
        .unwrap();
        assert_eq!(
            command,
            Command::Read {
                kind: ReadKind::HoldingRegisters,
                unit_id: 0,
                address: 65535,
                quantity: 1
            }
        );
    }

    #[test]
    fn test_integral_floats_are_integers() {
        let command = validate(&request(json!({
            "action": "readCoils",
            "unitId": 11.0,
            "address": 1000.0,
            "quantity": 4.0
        })))
        .unwrap();
        assert_eq!(
            command,
            Command::Read { kind: ReadKind::Coils, unit_id: 11, address: 1000, quantity: 4 }
        );
    }

    #[test]
    fn test_write_requires_value() {
        assert_eq!(
            error_of(json!({ "action": "writeCoil", "unitId": 1, "address": 1000 })),
            "Unit ID, address, and value are required for write operations"
        );
        assert_eq!(
            error_of(json!({
                "action": "writeRegister", "unitId": 1, "address": 4, "value": null
            })),
            "Unit ID, address, and value are required for write operations"
        );
    }

    #[test]
    fn test_write_coil_truthy_parse() {
        for (value, expected) in [
            (json!(true), true),
            (json!("TRUE"), true),
            (json!(" on "), true),
            (json!("1"), true),
            (json!(1), true),
            (json!(1.0), true),
            (json!(0.0), false),
            (json!(1.5), false),
            (json!(false), false),
            (json!("no"), false),
            (json!(0), false),
            (json!("yes"), false),
        ] {
            let command = validate(&request(json!({
                "action": "writeCoil",
                "unitId": 11,
                "address": 1001,
                "value": value
            })))
            .unwrap();
            assert_eq!(command, Command::WriteCoil { unit_id: 11, address: 1001, value: expected });
        }
    }

    #[test]
    fn test_write_register_value_conversion() {
        assert_eq!(
            error_of(json!({
                "action": "writeRegister", "unitId": 1, "address": 4, "value": "abc"
            })),
            "Value must be a valid number"
        );
        assert_eq!(
            error_of(json!({
                "action": "writeRegister", "unitId": 1, "address": 4, "value": true
            })),
            "Value must be a valid number"
        );
        assert_eq!(
            error_of(json!({
                "action": "writeRegister", "unitId": 1, "address": 4, "value": 65536
            })),
            "Register value must be between 0 and 65535"
        );
        assert_eq!(
            error_of(json!({
                "action": "writeRegister", "unitId": 1, "address": 4, "value": "-3"
            })),
            "Register value must be between 0 and 65535"
        );

        let command = validate(&request(json!({
            "action": "writeRegister",
            "unitId": 247,
            "address": 4,
            "value": "42"
        })))
        .unwrap();
        assert_eq!(command, Command::WriteRegister { unit_id: 247, address: 4, value: 42 });
    }

    #[test]
    fn test_conversion_error_is_typed() {
        let err = validate(&request(json!({
            "action": "writeRegister",
            "unitId": 1,
            "address": 4,
            "value": "abc"
        })))
        .unwrap_err();
        assert!(matches!(err, ModbusError::Conversion(_)));
    }

    #[test]
    fn test_parse_integer_is_lenient() {
        assert_eq!(parse_integer("12abc"), Some(12));
        assert_eq!(parse_integer("  7"), Some(7));
        assert_eq!(parse_integer("+5"), Some(5));
        assert_eq!(parse_integer("-0"), Some(0));
        assert_eq!(parse_integer("1.9"), Some(1));
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("-"), None);
        assert_eq!(parse_integer("x1"), None);
    }

    #[test]
    fn test_numeric_register_values_truncate() {
        assert_eq!(coerce_register_value(&json!(12.9)).unwrap(), 12);
        assert_eq!(coerce_register_value(&json!(300)).unwrap(), 300);
        assert!(coerce_register_value(&json!([1])).is_err());
    }

    #[test]
    fn test_write_coils_rules() {
        assert_eq!(
            error_of(json!({ "action": "writeCoils", "unitId": 1, "address": 0 })),
            "Unit ID, address, and values are required for writeCoils operation"
        );
        assert_eq!(
            error_of(json!({ "action": "writeCoils", "unitId": 1, "address": 0, "value": true })),
            "Values must be an array for writeCoils operation"
        );
        assert_eq!(
            error_of(json!({ "action": "writeCoils", "unitId": 1, "address": 0, "value": [] })),
            "Values array cannot be empty"
        );
        assert_eq!(
            error_of(json!({
                "action": "writeCoils", "unitId": 1, "address": 0, "value": vec![true; 1969]
            })),
            "Cannot write more than 1968 coils at once"
        );
        assert_eq!(
            error_of(json!({
                "action": "writeCoils", "unitId": 300, "address": 0, "value": [true]
            })),
            "Unit ID must be between 0 and 255"
        );

        let command = validate(&request(json!({
            "action": "writeCoils",
            "unitId": 1,
            "address": 0,
            "value": [true, "off", "on"]
        })))
        .unwrap();
        assert_eq!(
            command,
            Command::WriteCoils { unit_id: 1, address: 0, values: vec![true, false, true] }
        );
    }

    #[test]
    fn test_unknown_action_passes_through() {
        assert_eq!(
            validate(&request(json!({ "action": "writeRegisters", "unitId": 999 }))).unwrap(),
            Command::Unsupported("writeRegisters".to_string())
        );
        assert_eq!(validate(&request(json!({ "action": "status" }))).unwrap(), Command::Status);
    }
}
