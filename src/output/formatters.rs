use chrono::Utc;

use crate::modbus::protocol::{ModbusResponse, ResponseData};

pub trait ResponseFormatter: Send + Sync {
    fn format_response(&self, action: &str, response: &ModbusResponse) -> String;
    fn format_header(&self) -> String;

    fn format(&self, results: &[(String, ModbusResponse)]) -> String {
        let mut output = self.format_header();
        for (action, response) in results {
            output.push_str(&self.format_response(action, response));
        }
        output
    }
}

/// Comma separated values, the way the console results panel shows them.
pub fn format_modbus_data(data: &ResponseData) -> String {
    match data {
        ResponseData::Bits(bits) => join(bits),
        ResponseData::Registers(regs) => join(regs),
    }
}

fn join<T: ToString>(values: &[T]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}

pub fn formatter_for(name: &str) -> Box<dyn ResponseFormatter> {
    match name {
        "json" => Box::new(JsonFormatter),
        "csv" => Box::new(CsvFormatter),
        "hex" => Box::new(HexFormatter),
        _ => Box::new(ConsoleFormatter),
    }
}

pub struct ConsoleFormatter;

impl ResponseFormatter for ConsoleFormatter {
    fn format_response(&self, action: &str, response: &ModbusResponse) -> String {
        let icon = if response.success { "✅" } else { "❌" };
        let mut output = format!("{} {}: {}\n", icon, action, response.summary());

        if let Some(data) = &response.data {
            output.push_str(&format!("   Data: [{}]\n", format_modbus_data(data)));
        }
        if let Some(connected) = response.connected {
            output.push_str(&format!("   Connected: {}\n", connected));
        }
        output
    }

    fn format_header(&self) -> String {
        format!("🚀 Modbus Grid Console - {}\n", Utc::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

pub struct JsonFormatter;

impl ResponseFormatter for JsonFormatter {
    fn format_response(&self, action: &str, response: &ModbusResponse) -> String {
        let json_data = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "action": action,
            "result": response,
        });

        let mut output = serde_json::to_string_pretty(&json_data).unwrap_or_default();
        output.push('\n');
        output
    }

    fn format_header(&self) -> String {
        String::new() // JSON doesn't need headers
    }
}

pub struct CsvFormatter;

impl ResponseFormatter for CsvFormatter {
    fn format_response(&self, action: &str, response: &ModbusResponse) -> String {
        let data = response
            .data
            .as_ref()
            .map(|d| format_modbus_data(d).replace(", ", ";"))
            .unwrap_or_default();
        format!(
            "{},{},{},\"{}\",{}\n",
            Utc::now().to_rfc3339(),
            action,
            response.success,
            response.summary().replace('"', "'"),
            data
        )
    }

    fn format_header(&self) -> String {
        "Timestamp,Action,Success,Message,Data\n".to_string()
    }
}

pub struct HexFormatter;

impl ResponseFormatter for HexFormatter {
    fn format_response(&self, action: &str, response: &ModbusResponse) -> String {
        let mut output = format!("🔍 {}: {}\n", action, response.summary());

        match &response.data {
            Some(ResponseData::Registers(regs)) => {
                for (offset, value) in regs.iter().enumerate() {
                    output.push_str(&format!("  +{:<3} 0x{:04X} ({})\n", offset, value, value));
                }
            }
            Some(ResponseData::Bits(bits)) => {
                let bits: String = bits.iter().map(|b| if *b { '1' } else { '0' }).collect();
                output.push_str(&format!("  bits: {}\n", bits));
            }
            None => {}
        }
        output
    }

    fn format_header(&self) -> String {
        format!("🔍 Hex Data Output - {}\n", Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}
