use axum::{
    Json, Router,
    http::{StatusCode, Uri},
    routing::get,
};

use crate::{response::ApiResponse, state::AppState};

pub mod admin;
pub mod auth;
pub mod challenge;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod storefront;

/// Every route of the shop, bound to `state`. Transport layers are added by the binary.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .merge(storefront::router())
        .merge(challenge::router())
        .merge(orders::router())
        .merge(auth::router())
        .merge(admin::router())
        .merge(doc::scalar_docs())
        .fallback(not_found)
        .with_state(state)
}

pub async fn not_found(uri: Uri) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    let body = ApiResponse::single("Not Found", serde_json::json!({ "path": uri.path() }));
    (StatusCode::NOT_FOUND, Json(body))
}
