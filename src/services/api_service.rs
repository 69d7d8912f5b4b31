use actix_web::{
    http::StatusCode, middleware::Logger, web, App, HttpResponse, HttpServer, Result as ActixResult,
};
use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::modbus::protocol::{ModbusRequest, ModbusResponse};
use crate::services::modbus_service::ModbusService;
use crate::utils::error::ModbusError;

// Health check payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: u64,
    pub version: String,
    pub services: HealthServices,
    pub environment: String,
    pub response_time: String,
}

#[derive(Debug, Serialize)]
pub struct HealthServices {
    pub api: &'static str,
    pub modbus: &'static str,
}

// API Service state
#[derive(Clone)]
pub struct ApiServiceState {
    pub config: Config,
    pub modbus: Arc<ModbusService>,
    pub started_at: Instant,
}

impl ApiServiceState {
    pub fn new(config: Config, modbus: Arc<ModbusService>) -> Self {
        Self {
            config,
            modbus,
            started_at: Instant::now(),
        }
    }
}

// API Service
pub struct ApiService {
    state: ApiServiceState,
    server_handle: Option<actix_web::dev::ServerHandle>,
}

impl ApiService {
    pub fn new(config: Config, modbus: Arc<ModbusService>) -> Self {
        Self {
            state: ApiServiceState::new(config, modbus),
            server_handle: None,
        }
    }

    pub async fn start(&mut self) -> Result<(), ModbusError> {
        let address = self.state.config.server_address();
        info!("🌐 Starting HTTP API server on {}", address);

        let state_data = web::Data::new(self.state.clone());

        let server = HttpServer::new(move || {
            App::new()
                .app_data(state_data.clone())
                .wrap(Logger::default())
                .service(web::scope("/api").configure(configure_routes))
                .configure(configure_routes)
        })
        .bind(&address)?
        .run();

        // Store server handle for graceful shutdown
        self.server_handle = Some(server.handle());

        tokio::spawn(async move {
            if let Err(e) = server.await {
                error!("❌ HTTP API server error: {}", e);
            }
        });

        info!("✅ HTTP API server started successfully on {}", address);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), ModbusError> {
        info!("🛑 Stopping HTTP API server...");

        if let Some(handle) = self.server_handle.take() {
            tokio::select! {
                _ = handle.stop(true) => {
                    info!("✅ HTTP API server stopped gracefully");
                }
                _ = tokio::time::sleep(tokio::time::Duration::from_secs(10)) => {
                    warn!("⚠️  HTTP API server shutdown timeout, forcing stop");
                    handle.stop(false).await;
                }
            }
        }

        self.state.modbus.shutdown().await;
        Ok(())
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/modbus")
            .route(web::post().to(execute_modbus))
            .route(web::get().to(modbus_status)),
    )
    .service(
        web::resource("/health")
            .route(web::get().to(health_check))
            .route(web::head().to(health_head)),
    );
}

/// 200 on success, 400 when a required field was missing, 500 otherwise.
pub fn status_for(response: &ModbusResponse) -> StatusCode {
    if response.success {
        StatusCode::OK
    } else if response.error.as_deref().unwrap_or_default().contains("required") {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

// POST /modbus - Execute one Modbus request
async fn execute_modbus(
    body: web::Bytes,
    state: web::Data<ApiServiceState>,
) -> ActixResult<HttpResponse> {
    let request: ModbusRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            error!("❌ Modbus API error: {}", e);
            let response = ModbusResponse::failure(e.to_string());
            return Ok(HttpResponse::InternalServerError().json(response));
        }
    };

    info!("📝 Received {} request", request.action);
    let result = state.modbus.execute_request(&request).await;

    Ok(HttpResponse::build(status_for(&result)).json(result))
}

// GET /modbus - Connection status
async fn modbus_status(state: web::Data<ApiServiceState>) -> ActixResult<HttpResponse> {
    let connected = state.modbus.is_connected().await;
    Ok(HttpResponse::Ok().json(ModbusResponse::status(connected)))
}

// GET /health - Liveness
async fn health_check(state: web::Data<ApiServiceState>) -> ActixResult<HttpResponse> {
    let start = Instant::now();

    // The console works without a device, so a closed connection is "unknown", not unhealthy.
    let modbus = if state.modbus.is_connected().await { "healthy" } else { "unknown" };

    let health = HealthCheck {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        uptime: state.started_at.elapsed().as_secs(),
        version: state.config.version.clone(),
        services: HealthServices { api: "healthy", modbus },
        environment: state.config.server.environment.clone(),
        response_time: format!("{}ms", start.elapsed().as_millis()),
    };

    Ok(HttpResponse::Ok()
        .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
        .insert_header(("Pragma", "no-cache"))
        .insert_header(("Expires", "0"))
        .json(health))
}

// HEAD /health
async fn health_head() -> HttpResponse {
    HttpResponse::Ok().finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::mock::MockConnector;
    use actix_web::{http::Method, test as actix_test};
    use serde_json::{json, Value};

    fn state() -> web::Data<ApiServiceState> {
        let config = Config::default();
        let modbus = Arc::new(ModbusService::new(Arc::new(MockConnector::new()), &config.modbus));
        web::Data::new(ApiServiceState::new(config, modbus))
    }

    macro_rules! app {
        ($state:expr) => {
            actix_test::init_service(
                App::new()
                    .app_data($state.clone())
                    .service(web::scope("/api").configure(configure_routes))
                    .configure(configure_routes),
            )
            .await
        };
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&ModbusResponse::ok("fine")), StatusCode::OK);
        assert_eq!(
            status_for(&ModbusResponse::failure("Host is required for connect action")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ModbusResponse::failure("Not connected to Modbus server")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn test_missing_host_is_bad_request() {
        let state = state();
        let app = app!(state);

        let req = actix_test::TestRequest::post()
            .uri("/modbus")
            .set_json(json!({ "action": "connect" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(
            body,
            json!({ "success": false, "error": "Host is required for connect action" })
        );
    }

    #[actix_web::test]
    async fn test_not_connected_is_server_error() {
        let state = state();
        let app = app!(state);

        let req = actix_test::TestRequest::post()
            .uri("/modbus")
            .set_json(json!({ "action": "readCoils", "unitId": 11, "address": 1000 }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"], "Not connected to Modbus server");
    }

    #[actix_web::test]
    async fn test_connect_then_status() {
        let state = state();
        let app = app!(state);

        let req = actix_test::TestRequest::post()
            .uri("/api/modbus")
            .set_json(json!({ "action": "connect", "host": "192.168.7.200", "port": 502 }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["message"], "Connected to 192.168.7.200:502");
        assert_eq!(body["connected"], true);

        let req = actix_test::TestRequest::get().uri("/modbus").to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "success": true, "connected": true, "message": "Connected" }));

        let req = actix_test::TestRequest::post()
            .uri("/modbus")
            .set_json(json!({
                "action": "writeRegister",
                "unitId": 37,
                "address": 130,
                "value": "200"
            }))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["message"], "Written 200 to register at address 130");
    }

    #[actix_web::test]
    async fn test_malformed_body_is_server_error() {
        let state = state();
        let app = app!(state);

        let req = actix_test::TestRequest::post()
            .uri("/modbus")
            .insert_header(("content-type", "application/json"))
            .set_payload("{ not json")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn test_health_endpoints() {
        let state = state();
        let app = app!(state);

        let req = actix_test::TestRequest::get().uri("/health").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("cache-control").unwrap(),
            "no-cache, no-store, must-revalidate"
        );
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["services"]["modbus"], "unknown");
        assert_eq!(body["version"], crate::VERSION);
        assert!(body["responseTime"].as_str().unwrap().ends_with("ms"));

        let req = actix_test::TestRequest::default()
            .method(Method::HEAD)
            .uri("/api/health")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
