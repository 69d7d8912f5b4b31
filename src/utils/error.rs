use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModbusError {
    /// Malformed or out-of-range request field. The message is surfaced verbatim.
    #[error("{0}")]
    Validation(String),

    /// Value could not be coerced to the type the action needs.
    #[error("{0}")]
    Conversion(String),

    #[error("Not connected to Modbus server")]
    NotConnected,

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Communication error: {0}")]
    CommunicationError(String),

    #[error("Modbus exception: {0}")]
    Exception(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ModbusError {
    fn from(err: serde_json::Error) -> Self {
        ModbusError::SerializationError(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        ModbusError::CommunicationError(format!("IO error: {}", err))
    }
}

impl From<tokio::time::error::Elapsed> for ModbusError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ModbusError::Timeout
    }
}

impl From<toml::de::Error> for ModbusError {
    fn from(err: toml::de::Error) -> Self {
        ModbusError::ConfigError(format!("TOML parse error: {}", err))
    }
}

impl From<toml::ser::Error> for ModbusError {
    fn from(err: toml::ser::Error) -> Self {
        ModbusError::ConfigError(format!("TOML write error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = ModbusError::Validation("Host is required for connect action".to_string());
        assert_eq!(err.to_string(), "Host is required for connect action");
    }

    #[test]
    fn test_not_connected_message() {
        assert_eq!(ModbusError::NotConnected.to_string(), "Not connected to Modbus server");
    }
}
