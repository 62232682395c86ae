//! Portero - Video Intercom Bridge API Server

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hikconnect_client::{CloudClient, LocalClient};
use intercom_core::{CallWatcher, WatcherError};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod websocket;

use config::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub watcher: Arc<CallWatcher>,
}

/// API response wrapper using serde_json::Value for flexibility
#[derive(Serialize)]
struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: Some(serde_json::to_value(data).unwrap_or(serde_json::Value::Null)),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// System info response
#[derive(Serialize)]
struct SystemInfo {
    name: String,
    version: String,
    device_count: usize,
}

/// Get system info
async fn system_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(SystemInfo {
        name: "Portero".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        device_count: state.watcher.device_count(),
    }))
}

/// List all known devices
async fn list_devices(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.watcher.get_devices()))
}

/// Get a specific device
async fn get_device(
    State(state): State<AppState>,
    Path(serial): Path<String>,
) -> impl IntoResponse {
    match state.watcher.get_device(&serial) {
        Some(device) => (StatusCode::OK, Json(ApiResponse::success(device))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Device not found")),
        ),
    }
}

/// Fetch the current call status on demand, outside the poll cycle
async fn call_status(
    State(state): State<AppState>,
    Path(serial): Path<String>,
) -> impl IntoResponse {
    match state.watcher.fetch_now(&serial).await {
        Ok(result) => (StatusCode::OK, Json(ApiResponse::success(result))),
        Err(WatcherError::DeviceNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Device not found")),
        ),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

/// Proxy a camera still image from the device's local API
async fn snapshot(State(state): State<AppState>, Path(serial): Path<String>) -> Response {
    if state.watcher.get_device(&serial).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Device not found")),
        )
            .into_response();
    }

    let Some(local) = state.watcher.local() else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("No local device address configured")),
        )
            .into_response();
    };

    match local.snapshot().await {
        Ok(image) => ([(header::CONTENT_TYPE, "image/jpeg")], image).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::error(e.to_string())),
        )
            .into_response(),
    }
}

/// Re-fetch the cloud device directory
async fn refresh_devices(State(state): State<AppState>) -> impl IntoResponse {
    match state.watcher.refresh().await {
        Ok(count) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "devices": count
            }))),
        ),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

/// Health check
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket::handle_socket(socket, state))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portero_api=debug,hikconnect_client=debug,info".into()),
        )
        .init();

    tracing::info!("Starting Portero API server");

    let config = Config::from_env()?;

    let cloud = CloudClient::new(config.base_url.clone(), config.session_id.clone())?;
    let local = if config.local_enabled() {
        tracing::info!("Local device API enabled at {}", config.local_ip);
        Some(LocalClient::new(
            &config.local_ip,
            &config.local_username,
            &config.local_password,
        )?)
    } else {
        tracing::info!("Local address/password not configured, using cloud API only");
        None
    };

    let watcher = Arc::new(CallWatcher::new(cloud, local, config.poll_interval));

    let count = watcher.refresh().await?;
    tracing::info!("Watching {} intercom device(s)", count);

    let state = AppState { watcher };

    // Build the router
    let app = Router::new()
        .route("/health", get(health))
        .route("/api/v1/system/info", get(system_info))
        .route("/api/v1/devices", get(list_devices))
        .route("/api/v1/devices/refresh", post(refresh_devices))
        .route("/api/v1/devices/:serial", get(get_device))
        .route("/api/v1/devices/:serial/call-status", get(call_status))
        .route("/api/v1/devices/:serial/snapshot", get(snapshot))
        // WebSocket
        .route("/ws", get(ws_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    tracing::info!("Listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
