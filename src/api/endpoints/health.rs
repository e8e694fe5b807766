//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub llm_backend: &'static str,
    pub search_backend: &'static str,
}

/// `GET /health`
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let settings = &ctx.core.settings;
    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        llm_backend: settings.llm_backend.as_str(),
        search_backend: settings.search_backend.as_str(),
    })
}
