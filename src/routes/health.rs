use axum::{Json, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{response::ApiResponse, state::AppState};

/// Liveness report. Does not touch the database.
#[derive(Serialize, ToSchema)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub catalog_items: usize,
    /// Open connections in the pool, idle ones included.
    pub db_connections: u32,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "OK", body = ApiResponse<HealthData>),
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthData>> {
    let data = HealthData {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        catalog_items: state.config.catalog.ids().count(),
        db_connections: state.pool.size(),
    };
    Json(ApiResponse::single("Health check", data))
}
