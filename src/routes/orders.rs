use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    response::Redirect,
    routing::{get, post},
};

use crate::{
    dto::orders::{OrderView, StatusUpdateForm},
    error::AppResult,
    middleware::auth::AdminSession,
    response::ApiResponse,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/view/{token}", get(view_order))
        .route("/update-order-status", post(update_order_status))
}

#[utoipa::path(
    get,
    path = "/view/{token}",
    params(("token" = String, Path, description = "Order session token")),
    responses(
        (status = 200, description = "Order status page", body = ApiResponse<OrderView>),
        (status = 404, description = "Unknown or expired order"),
    ),
    tag = "Orders"
)]
pub async fn view_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> AppResult<Json<ApiResponse<OrderView>>> {
    let is_admin = AdminSession::from_headers(&headers, &state.config.admin).is_some();
    let resp = order_service::view_order(&state, &token, is_admin).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/update-order-status",
    request_body(content = StatusUpdateForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Back to the order page, whether or not the change applied"),
        (status = 400, description = "Missing field"),
    ),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Form(form): Form<StatusUpdateForm>,
) -> AppResult<Redirect> {
    let session_id = form.session_id.clone().unwrap_or_default();
    order_service::update_status_public(&state, form).await?;
    Ok(Redirect::to(&format!("/view/{session_id}")))
}
