pub mod formatters;

pub use formatters::{
    format_modbus_data, formatter_for, ConsoleFormatter, CsvFormatter, HexFormatter, JsonFormatter,
    ResponseFormatter,
};
