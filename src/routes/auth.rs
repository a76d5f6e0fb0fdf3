use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, header},
    response::{AppendHeaders, IntoResponse},
    routing::post,
};

use crate::{
    dto::auth::{LoginRequest, LoginResponse},
    error::{AppError, AppResult},
    middleware::auth::{SESSION_COOKIE, host_allowed},
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/login", post(login))
}

#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Operator session token, also set as a cookie", body = ApiResponse<LoginResponse>),
        (status = 404, description = "Wrong credentials")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    if !host_allowed(&headers, &state.config.admin) {
        return Err(AppError::NotFound);
    }
    let resp = auth_service::login(&state, payload).await?;
    let cookie = format!(
        "{SESSION_COOKIE}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        resp.token,
        state.config.admin.session_ttl.num_seconds()
    );
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(ApiResponse::single("Logged in", resp)),
    ))
}
