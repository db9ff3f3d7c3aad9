//! REST API and SSE routes

use crate::bridge::{self, OperationError};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use hb_core::publish::loxone_template as render_loxone_template;
use hb_core::{ClimateRequest, CommandOutcome, VehicleCommand};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// UDP port advertised in the Loxone template when none is configured
const DEFAULT_LOXONE_PORT: u16 = 7888;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let assets = ServeDir::new(&state.public_dir);

    Router::new()
        .route("/api/config", get(get_config).post(update_config))
        .route("/api/state", get(latest_state))
        .route("/api/state/stream", get(state_stream))
        .route("/api/loxone/template", get(loxone_template))
        .route("/status", get(status_cached))
        .route("/status/refresh", get(status_refresh))
        .route("/lock", post(lock))
        .route("/unlock", post(unlock))
        .route("/climate/start", post(climate_start))
        .route("/climate/stop", post(climate_stop))
        .route("/climate/toggle", post(climate_toggle))
        .route("/charge/start", post(charge_start))
        .route("/charge/stop", post(charge_stop))
        .fallback_service(assets)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for OperationError {
    fn into_response(self) -> Response {
        match &self {
            OperationError::Busy => (
                StatusCode::CONFLICT,
                Json(json!({
                    "success": false,
                    "busy": true,
                    "message": self.to_string()
                })),
            )
                .into_response(),
            OperationError::NotReady | OperationError::Failed(_) => failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                self.to_string(),
            ),
        }
    }
}

fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(json!({ "success": false, "error": error.into() }))).into_response()
}

// === Config Endpoints ===

async fn get_config(State(state): State<AppState>) -> Json<Value> {
    let config = state.config.read().await.clone();
    let mqtt_status = state.sinks.mqtt_status().await;

    Json(json!({
        "success": true,
        "config": config,
        "serverInfo": {
            "ip": local_ip().to_string(),
            "port": state.listen_port,
            "version": env!("CARGO_PKG_VERSION"),
            "mqttStatus": mqtt_status.to_string()
        }
    }))
}

async fn update_config(State(state): State<AppState>, Json(patch): Json<Value>) -> Response {
    let mut config = state.config.write().await;

    let updated = match config.merged(&patch) {
        Ok(updated) => updated,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.to_string()),
    };

    if let Err(e) = state.config_store.save(&updated) {
        error!("Failed to save config: {}", e);
        return failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    let restart_required = config.bluelink_user != updated.bluelink_user;

    // Sinks are rebuilt under the config lock so concurrent updates apply in order
    state.sinks.reconfigure(&updated).await;
    *config = updated;
    drop(config);
    info!(restart_required, "Configuration updated");

    Json(json!({ "success": true, "restartRequired": restart_required })).into_response()
}

/// Address of the first non-loopback IPv4 route, loopback when offline
///
/// Connecting a UDP socket only selects a route; nothing is sent.
fn local_ip() -> IpAddr {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

// === Status Endpoints ===

async fn status_cached(State(state): State<AppState>) -> Result<Json<Value>, OperationError> {
    fetch_status(&state, false).await
}

async fn status_refresh(State(state): State<AppState>) -> Result<Json<Value>, OperationError> {
    fetch_status(&state, true).await
}

async fn fetch_status(state: &AppState, refresh: bool) -> Result<Json<Value>, OperationError> {
    let report = bridge::refresh_status(state, refresh).await?;
    Ok(Json(json!({
        "success": true,
        "data": report.snapshot.raw(),
        "state": report.state
    })))
}

async fn latest_state(State(state): State<AppState>) -> Response {
    match state.latest.read().await.as_ref() {
        Some(latest) => Json(json!({ "success": true, "state": latest })).into_response(),
        None => failure(StatusCode::NOT_FOUND, "No status fetched yet"),
    }
}

async fn state_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(canonical) => match serde_json::to_string(&canonical) {
                Ok(json) => Some(Ok(Event::default().data(json))),
                Err(e) => {
                    error!("Failed to serialize state: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Broadcast stream error: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn loxone_template(State(state): State<AppState>) -> impl IntoResponse {
    let port = match state.config.read().await.udp_port {
        0 => DEFAULT_LOXONE_PORT,
        port => port,
    };

    (
        [
            (header::CONTENT_TYPE, "text/xml"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"Hyundai.xml\""),
        ],
        render_loxone_template(port),
    )
}

// === Command Endpoints ===

async fn send_command(
    state: &AppState,
    command: VehicleCommand,
) -> Result<Json<Value>, OperationError> {
    let name = command.name();
    let mut body = json!({ "success": true });
    if let VehicleCommand::StartClimate(request) = &command {
        body["config_sent"] = serde_json::to_value(request).unwrap_or(Value::Null);
    }

    if bridge::run_command(state, command).await? == CommandOutcome::VehicleBusy {
        body["warning"] = json!("Vehicle busy");
        body["command_invoked"] = json!(name);
    }
    Ok(Json(body))
}

async fn lock(State(state): State<AppState>) -> Result<Json<Value>, OperationError> {
    send_command(&state, VehicleCommand::Lock).await
}

async fn unlock(State(state): State<AppState>) -> Result<Json<Value>, OperationError> {
    send_command(&state, VehicleCommand::Unlock).await
}

async fn climate_start(State(state): State<AppState>, body: Bytes) -> Response {
    let body: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(e) => return failure(StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", e)),
        }
    };

    let request = match ClimateRequest::from_body(&body) {
        Ok(request) => request,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.to_string()),
    };

    send_command(&state, VehicleCommand::StartClimate(request))
        .await
        .into_response()
}

async fn climate_stop(State(state): State<AppState>) -> Result<Json<Value>, OperationError> {
    send_command(&state, VehicleCommand::StopClimate).await
}

async fn climate_toggle(State(state): State<AppState>) -> Result<Json<Value>, OperationError> {
    send_command(&state, bridge::toggle_command(state.climate_on())).await
}

async fn charge_start(State(state): State<AppState>) -> Result<Json<Value>, OperationError> {
    send_command(&state, VehicleCommand::StartCharge).await
}

async fn charge_stop(State(state): State<AppState>) -> Result<Json<Value>, OperationError> {
    send_command(&state, VehicleCommand::StopCharge).await
}
