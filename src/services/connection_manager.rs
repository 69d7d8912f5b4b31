use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{timeout, Duration};

use crate::config::ModbusConfig;
use crate::modbus::client::{ModbusClientTrait, ModbusConnector};
use crate::modbus::protocol::ModbusResponse;
use crate::utils::error::ModbusError;
use crate::utils::retry::with_retry;

/// The single live connection, with the target it was opened against.
pub struct ActiveConnection {
    pub host: String,
    pub port: u16,
    client: Box<dyn ModbusClientTrait>,
}

impl ActiveConnection {
    pub fn is_open(&self) -> bool {
        self.client.is_open()
    }
}

/// Exclusive access to the connection slot. Holding a session is what makes
/// unit selection and the request that follows one atomic step.
pub struct Session<'a> {
    slot: MutexGuard<'a, Option<ActiveConnection>>,
}

impl Session<'_> {
    pub fn client(&mut self) -> Result<&mut dyn ModbusClientTrait, ModbusError> {
        match self.slot.as_mut() {
            Some(conn) if conn.client.is_open() => Ok(conn.client.as_mut()),
            _ => Err(ModbusError::NotConnected),
        }
    }
}

pub struct ConnectionManager {
    connector: Arc<dyn ModbusConnector>,
    active: Mutex<Option<ActiveConnection>>,
    timeout: Duration,
    connect_attempts: u32,
    retry_delay: Duration,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn ModbusConnector>, config: &ModbusConfig) -> Self {
        Self {
            connector,
            active: Mutex::new(None),
            timeout: config.timeout(),
            connect_attempts: config.connect_attempts,
            retry_delay: config.retry_delay(),
        }
    }

    /// Defaults: 5 s per-call timeout, 3 attempts, 1 s backoff step.
    pub fn with_defaults(connector: Arc<dyn ModbusConnector>) -> Self {
        Self::new(connector, &ModbusConfig::default())
    }

    /// The slot stays unlocked while the handshake retries, so status checks
    /// answer immediately. If two connects race, the last one to finish wins.
    pub async fn connect(&self, host: &str, port: u16) -> ModbusResponse {
        info!("🔌 Attempting to connect to Modbus server {}:{}", host, port);

        let previous = self.active.lock().await.take();
        if let Some(previous) = previous {
            self.close_quietly(previous).await;
        }

        let connector: &dyn ModbusConnector = self.connector.as_ref();
        let limit = self.timeout;
        let result = with_retry(
            move |attempt| async move {
                debug!("Connect attempt {} to {}:{}", attempt, host, port);
                match timeout(limit, connector.connect(host, port)).await {
                    Ok(result) => result,
                    Err(elapsed) => Err(elapsed.into()),
                }
            },
            self.connect_attempts,
            self.retry_delay,
        )
        .await;

        match result {
            Ok(mut client) => {
                client.set_timeout(self.timeout);
                let replaced = self.active.lock().await.replace(ActiveConnection {
                    host: host.to_string(),
                    port,
                    client,
                });
                if let Some(replaced) = replaced {
                    self.close_quietly(replaced).await;
                }
                info!("✅ Connected to Modbus server {}:{}", host, port);
                ModbusResponse::ok(format!("Connected to {}:{}", host, port)).with_connected(true)
            }
            Err(e) => {
                error!("❌ Failed to connect to Modbus server {}:{}: {}", host, port, e);
                ModbusResponse::failure(format!("Failed to connect: {}", e)).with_connected(false)
            }
        }
    }

    async fn close_quietly(&self, mut conn: ActiveConnection) {
        if !conn.is_open() {
            return;
        }
        match conn.client.close().await {
            Ok(()) => info!("🔌 Closed existing connection to {}:{}", conn.host, conn.port),
            Err(e) => warn!(
                "⚠️  Ignoring error while closing connection to {}:{}: {}",
                conn.host, conn.port, e
            ),
        }
    }

    /// Best effort: always reports success.
    pub async fn disconnect(&self) -> ModbusResponse {
        info!("🔌 Disconnecting from Modbus server");

        let conn = self.active.lock().await.take();
        if let Some(conn) = conn {
            self.close_quietly(conn).await;
        }

        ModbusResponse::ok("Disconnected").with_connected(false)
    }

    pub async fn is_connected(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|conn| conn.is_open())
            .unwrap_or(false)
    }

    pub async fn status(&self) -> ModbusResponse {
        ModbusResponse::status(self.is_connected().await)
    }

    /// Target of the open connection, if any.
    pub async fn peer(&self) -> Option<(String, u16)> {
        self.active
            .lock()
            .await
            .as_ref()
            .filter(|conn| conn.is_open())
            .map(|conn| (conn.host.clone(), conn.port))
    }

    pub async fn session(&self) -> Session<'_> {
        Session {
            slot: self.active.lock().await,
        }
    }
}
