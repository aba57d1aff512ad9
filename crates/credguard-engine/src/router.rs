//! Axum router wiring for the reporting surface.

use axum::{routing::get, Router};

use crate::{app_state::AppState, ops};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .route("/v1/usage", get(ops::list_usage).delete(ops::clear_usage))
        // wildcard: credential ids may contain `/`
        .route("/v1/usage/*credential_id", get(ops::usage_details))
        .with_state(state)
}
