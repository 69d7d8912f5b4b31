use anyhow::Result;
use env_logger::Env;
use log::{error, info};
use std::sync::Arc;

use modbus_grid_console::{cli, Config, ModbusService};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli::build_cli().get_matches();

    // Global args are propagated down, so the innermost matches see all of them.
    let scoped = matches
        .subcommand()
        .map(|(_, sub)| sub)
        .unwrap_or(&matches);

    let level = scoped
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("info");
    env_logger::init_from_env(Env::default().default_filter_or(level));

    let config = match Config::from_matches(scoped) {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "🖥️  {} v{} ({})",
        config.instance_name, config.version, config.server.environment
    );
    info!(
        "🔌 Modbus target {}:{} (timeout {}ms, {} attempts)",
        config.modbus.default_host,
        config.modbus.default_port,
        config.modbus.timeout_ms,
        config.modbus.connect_attempts
    );

    let service = Arc::new(ModbusService::tcp(&config.modbus));

    if cli::handle_subcommands(&matches, &config, &service).await? {
        return Ok(());
    }

    cli::serve(&matches, config, service).await
}
