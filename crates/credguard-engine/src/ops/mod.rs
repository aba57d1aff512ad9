//! Operational and reporting HTTP endpoints.
//!
//! - `/healthz`                   : liveness
//! - `/metrics`                   : Prometheus text format
//! - `/v1/usage`                  : credential ids with usage data
//! - `/v1/usage` (DELETE)         : drop all usage data
//! - `/v1/usage/*credential_id`   : usage details for one credential

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use credguard_core::CredGuardError;

use crate::app_state::AppState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let extra = state.metrics_extra();
    let body = state.metrics().render(&extra);

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

pub async fn list_usage(State(state): State<AppState>) -> Response {
    Json(state.usage().list_credential_ids()).into_response()
}

pub async fn usage_details(
    State(state): State<AppState>,
    Path(credential_id): Path<String>,
) -> Response {
    Json(state.usage().get(&credential_id)).into_response()
}

pub async fn clear_usage(State(state): State<AppState>) -> Response {
    match state.usage().clear() {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

fn error_response(status: StatusCode, e: &CredGuardError) -> Response {
    let body = json!({
        "error": {
            "code": e.code().as_str(),
            "msg": e.to_string(),
        }
    });
    (status, Json(body)).into_response()
}
