use anyhow::{anyhow, Context as _, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::info;
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::devices::fixture::{self, LightFixture, CONFIG_UNIT_ID};
use crate::devices::grid::{
    calculate_grid_unit_id, get_grid_position, GridPosition, DEFAULT_INVERSE_GRID_SIZE,
};
use crate::modbus::protocol::{ModbusAction, ModbusRequest, ModbusResponse, ReadKind};
use crate::output::formatter_for;
use crate::services::ModbusService;

pub fn build_cli() -> Command {
    let unit = || {
        Arg::new("unit")
            .long("unit")
            .short('u')
            .help("Modbus unit id (0 broadcasts)")
            .value_parser(value_parser!(i64))
            .required(true)
    };
    let address = || {
        Arg::new("address")
            .long("address")
            .short('a')
            .value_parser(value_parser!(i64))
            .required(true)
    };
    let position = |cmd: Command| {
        cmd.arg(Arg::new("row").long("row").value_parser(value_parser!(u32)).required(true))
            .arg(Arg::new("col").long("col").value_parser(value_parser!(u32)).required(true))
    };
    let broadcast = || {
        Arg::new("broadcast")
            .long("broadcast")
            .help("Address every panel on the bus (unit 0)")
            .action(ArgAction::SetTrue)
    };

    Command::new("modbus-grid-console")
        .version(crate::VERSION)
        .about("Test console for a Modbus TCP lighting-grid controller")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("TOML configuration file")
                .global(true),
        )
        .arg(Arg::new("host").long("host").help("Modbus server host").global(true))
        .arg(
            Arg::new("modbus-port")
                .long("modbus-port")
                .help("Modbus server port")
                .value_parser(value_parser!(u16))
                .global(true),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("Per-request timeout in milliseconds")
                .value_parser(value_parser!(u64))
                .global(true),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .value_parser(["console", "json", "csv", "hex"])
                .default_value("console")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .default_value("info")
                .global(true),
        )
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP API (default)")
                .arg(Arg::new("bind").long("bind").help("Bind address"))
                .arg(Arg::new("port").long("port").short('p').value_parser(value_parser!(u16))),
        )
        .subcommand(
            Command::new("status").about("Connect to the device and report the connection state"),
        )
        .subcommand(
            Command::new("read")
                .about("Read coils, discrete inputs or registers")
                .arg(
                    Arg::new("kind")
                        .long("kind")
                        .short('k')
                        .value_parser(["coils", "discrete", "holding", "input"])
                        .default_value("holding"),
                )
                .arg(unit())
                .arg(address())
                .arg(
                    Arg::new("quantity")
                        .long("quantity")
                        .short('q')
                        .value_parser(value_parser!(i64)),
                ),
        )
        .subcommand(
            Command::new("write-coil")
                .about("Write a single coil (true/1/on switch it on)")
                .arg(unit())
                .arg(address())
                .arg(Arg::new("value").long("value").short('v').required(true)),
        )
        .subcommand(
            Command::new("write-register")
                .about("Write a single holding register")
                .arg(unit())
                .arg(address())
                .arg(Arg::new("value").long("value").short('v').required(true)),
        )
        .subcommand(
            position(Command::new("light").about("Switch one LED of a grid fixture"))
                .arg(Arg::new("led").long("led").value_parser(value_parser!(u16)).required(true))
                .arg(Arg::new("state").long("state").value_parser(["on", "off"]).required(true))
                .arg(broadcast()),
        )
        .subcommand(
            position(
                Command::new("brightness").about("Set LED brightness and save the configuration"),
            )
            .arg(Arg::new("led").long("led").value_parser(value_parser!(u16)).required(true))
            .arg(
                Arg::new("level")
                    .long("level")
                    .value_parser(value_parser!(u16))
                    .required(true),
            )
            .arg(broadcast()),
        )
        .subcommand(
            Command::new("unit-id")
                .about("Assign a new unit id to a panel and save it")
                .arg(
                    Arg::new("current")
                        .long("current")
                        .value_parser(value_parser!(u8))
                        .default_value("247"),
                )
                .arg(Arg::new("new").long("new").value_parser(value_parser!(u8)).required(true)),
        )
        .subcommand(
            Command::new("reset")
                .about("Reset a panel, or every panel when no unit is given")
                .arg(Arg::new("unit").long("unit").short('u').value_parser(value_parser!(u8))),
        )
        .subcommand(
            Command::new("grid")
                .about("Show the unit id for a grid position, or the position for a unit id")
                .arg(Arg::new("row").long("row").value_parser(value_parser!(u32)))
                .arg(Arg::new("col").long("col").value_parser(value_parser!(u32)))
                .arg(Arg::new("unit").long("unit").value_parser(value_parser!(u32)))
                .arg(Arg::new("size").long("size").value_parser(value_parser!(u32))),
        )
}

/// Run the one-shot subcommands. Returns `Ok(false)` when the HTTP server
/// should be started instead.
pub async fn handle_subcommands(
    matches: &ArgMatches,
    config: &Config,
    service: &Arc<ModbusService>,
) -> Result<bool> {
    let (name, sub) = match matches.subcommand() {
        Some(("serve", _)) | None => return Ok(false),
        Some(pair) => pair,
    };

    let formatter = formatter_for(
        sub.get_one::<String>("format")
            .map(String::as_str)
            .unwrap_or("console"),
    );

    if name == "grid" {
        print_grid(sub, config)?;
        return Ok(true);
    }

    let requests = requests_for(name, sub, config)?;

    info!("🔍 Executing {} command...", name);
    let mut results: Vec<(String, ModbusResponse)> = Vec::new();

    let host = config.modbus.default_host.clone();
    let port = config.modbus.default_port;
    let connect = service
        .execute_request(&ModbusRequest::connect(&host, port))
        .await;
    let connected = connect.success;
    results.push(("connect".to_string(), connect));

    if connected {
        if name == "status" {
            results.push(("status".to_string(), service.connections().status().await));
        } else {
            let responses = fixture::apply(service, &requests).await;
            results.extend(requests.iter().map(|r| r.action.clone()).zip(responses));
        }
        service.shutdown().await;
    }

    print!("{}", formatter.format(&results));

    if results.iter().all(|(_, r)| r.success) {
        Ok(true)
    } else {
        Err(anyhow!("{} command failed", name))
    }
}

fn raw_request(action: ModbusAction, sub: &ArgMatches) -> ModbusRequest {
    ModbusRequest {
        unit_id: sub.get_one::<i64>("unit").copied(),
        address: sub.get_one::<i64>("address").copied(),
        ..ModbusRequest::new(action)
    }
}

fn fixture_for(sub: &ArgMatches, config: &Config) -> Result<LightFixture> {
    if sub.get_flag("broadcast") {
        return Ok(LightFixture::broadcast());
    }
    let position = GridPosition::new(
        *sub.get_one::<u32>("row").context("--row is required")?,
        *sub.get_one::<u32>("col").context("--col is required")?,
    );
    Ok(LightFixture::at(position, config.grid.size)?)
}

/// LEDs are numbered from 1 up to the configured count per panel.
fn led_of(sub: &ArgMatches, config: &Config) -> Result<u16> {
    let led = *sub.get_one::<u16>("led").context("--led is required")?;
    if led < 1 || u32::from(led) > config.grid.led_count {
        return Err(anyhow!("LED must be between 1 and {}", config.grid.led_count));
    }
    Ok(led)
}

fn requests_for(name: &str, sub: &ArgMatches, config: &Config) -> Result<Vec<ModbusRequest>> {
    let requests = match name {
        "status" => Vec::new(),
        "read" => {
            let kind = match sub.get_one::<String>("kind").map(String::as_str) {
                Some("coils") => ReadKind::Coils,
                Some("discrete") => ReadKind::DiscreteInputs,
                Some("input") => ReadKind::InputRegisters,
                _ => ReadKind::HoldingRegisters,
            };
            vec![ModbusRequest {
                quantity: sub.get_one::<i64>("quantity").copied(),
                ..raw_request(ModbusAction::Read(kind), sub)
            }]
        }
        "write-coil" | "write-register" => {
            let action = if name == "write-coil" {
                ModbusAction::WriteCoil
            } else {
                ModbusAction::WriteRegister
            };
            vec![ModbusRequest {
                value: sub.get_one::<String>("value").cloned().map(Value::String),
                ..raw_request(action, sub)
            }]
        }
        "light" => {
            let led = led_of(sub, config)?;
            let on = sub.get_one::<String>("state").map(String::as_str) == Some("on");
            vec![fixture_for(sub, config)?.light(led, on)?]
        }
        "brightness" => {
            let led = led_of(sub, config)?;
            let level = *sub.get_one::<u16>("level").context("--level is required")?;
            fixture_for(sub, config)?.set_brightness(led, level)?
        }
        "unit-id" => {
            let current = sub.get_one::<u8>("current").copied().unwrap_or(CONFIG_UNIT_ID);
            let new = *sub.get_one::<u8>("new").context("--new is required")?;
            LightFixture::new(current).change_unit_id(new)
        }
        "reset" => match sub.get_one::<u8>("unit") {
            Some(unit) => LightFixture::new(*unit).reset(),
            None => LightFixture::broadcast().reset(),
        },
        other => return Err(anyhow!("Unknown command: {}", other)),
    };
    Ok(requests)
}

fn print_grid(sub: &ArgMatches, config: &Config) -> Result<()> {
    if let Some(unit) = sub.get_one::<u32>("unit") {
        let size = sub.get_one::<u32>("size").copied().unwrap_or(DEFAULT_INVERSE_GRID_SIZE);
        let position = get_grid_position(*unit, size);
        println!(
            "📍 Unit {} -> row {}, col {} (row-major on a {}-wide grid)",
            unit, position.row, position.col, size
        );
        println!("   This is not the inverse of the row/col unit id encoding.");
        return Ok(());
    }

    let row = *sub.get_one::<u32>("row").context("--row or --unit is required")?;
    let col = *sub.get_one::<u32>("col").context("--col is required with --row")?;
    let size = sub.get_one::<u32>("size").copied().unwrap_or(config.grid.size);
    let unit_id = calculate_grid_unit_id(row, col, size)?;
    println!("📍 Row {}, col {} -> unit {}", row, col, unit_id);
    Ok(())
}

#[cfg(feature = "api")]
pub async fn serve(
    matches: &ArgMatches,
    mut config: Config,
    service: Arc<ModbusService>,
) -> Result<()> {
    use crate::services::ApiService;

    if let Some(("serve", sub)) = matches.subcommand() {
        if let Some(bind) = sub.get_one::<String>("bind") {
            config.server.bind_address = bind.clone();
        }
        if let Some(port) = sub.get_one::<u16>("port") {
            config.server.port = *port;
        }
    }

    let mut api = ApiService::new(config, service);
    api.start().await?;

    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    info!("🛑 Shutdown signal received");

    api.stop().await?;
    Ok(())
}

#[cfg(not(feature = "api"))]
pub async fn serve(
    _matches: &ArgMatches,
    _config: Config,
    _service: Arc<ModbusService>,
) -> Result<()> {
    Err(anyhow!("This build has no HTTP API; rebuild with the `api` feature"))
}
