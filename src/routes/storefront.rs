use std::collections::HashMap;

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};

use crate::{
    dto::intake::{FormPage, OrderSubmission},
    error::AppResult,
    response::ApiResponse,
    services::intake_service::{self, IntakeOutcome},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(order_form).post(submit_order))
}

/// Client address as reported by the fronting proxy.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    header_value("x-real-ip")
        .or_else(|| {
            header_value("x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .map(str::to_string)
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Fresh order form with a new session token", body = ApiResponse<FormPage>),
    ),
    tag = "Storefront"
)]
pub async fn order_form(State(state): State<AppState>) -> AppResult<Json<ApiResponse<FormPage>>> {
    let page = intake_service::new_form(&state).await?;
    Ok(Json(ApiResponse::single("Order form", page)))
}

#[utoipa::path(
    post,
    path = "/",
    request_body(content = HashMap<String, String>, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Order recorded, redirect to its status page"),
        (status = 400, description = "Missing session token"),
        (status = 422, description = "Form rejected, fresh form with errors", body = ApiResponse<FormPage>),
    ),
    tag = "Storefront"
)]
pub async fn submit_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    let submission = OrderSubmission::from_form(&form, &state.config.catalog);
    let outcome = intake_service::submit_order(&state, submission, client_ip(&headers)).await?;
    Ok(match outcome {
        IntakeOutcome::Placed { session_id, .. } => {
            Redirect::to(&format!("/view/{session_id}")).into_response()
        }
        IntakeOutcome::Rejected(page) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::single("Please correct the highlighted fields", page)),
        )
            .into_response(),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn prefers_real_ip_then_first_forwarded() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("198.51.100.2"));
    }
}
