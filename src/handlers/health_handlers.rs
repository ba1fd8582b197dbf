//! Admin endpoints: ping, build-info, the detailed health report, and the
//! binary good-to-go signal.
//!
//! `/__health` always answers 200; the per-check results live in the JSON
//! body. `/__gtg` is the signal load balancers act on, so it flips to 503.

use crate::handlers::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// `GET /__ping` and `GET /ping`.
pub async fn ping() -> &'static str {
    "pong"
}

/// `GET /__build-info` and `GET /build-info`.
pub async fn build_info(State(state): State<AppState>) -> Response {
    Json(json!({
        "name": state.health.app_name,
        "systemCode": state.health.app_system_code,
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
    }))
    .into_response()
}

/// `GET /__health` — the detailed report, always 200.
pub async fn health(State(state): State<AppState>) -> Response {
    Json(state.health.health().await).into_response()
}

/// `GET /__gtg` — 200 `OK` when ready, 503 with the first failure otherwise.
pub async fn good_to_go(State(state): State<AppState>) -> Response {
    let status = state.health.gtg().await;
    let code = if status.good_to_go {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, [(header::CACHE_CONTROL, "no-cache")], status.message).into_response()
}
