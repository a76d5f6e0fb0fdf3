use axum::{
    Form, Json, Router,
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
};

use crate::{
    dto::admin::{AdminOrderForm, AdminOverview, InventoryForm, PaymentNotification},
    error::AppResult,
    middleware::auth::AdminSession,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::admin_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin", get(admin_overview))
        .route("/admin/update-order", post(update_order))
        .route("/update-inventory", post(update_inventory))
        .route("/payment-notification-count", get(payment_notification_count))
}

#[utoipa::path(
    get,
    path = "/admin",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders, catalog and stock for operators", body = ApiResponse<AdminOverview>),
        (status = 404, description = "Not an operator"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn admin_overview(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<AdminOverview>>> {
    let resp = admin_service::overview(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/admin/update-order",
    request_body(content = AdminOrderForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Order updated, back to the overview"),
        (status = 400, description = "Missing or malformed field"),
        (status = 404, description = "Not an operator, or unknown order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order(
    State(state): State<AppState>,
    admin: AdminSession,
    Form(form): Form<AdminOrderForm>,
) -> AppResult<Redirect> {
    admin_service::update_order(&state, &admin, form).await?;
    Ok(Redirect::to("/admin"))
}

#[utoipa::path(
    post,
    path = "/update-inventory",
    request_body(content = std::collections::BTreeMap<String, String>, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Stock levels saved, back to the overview"),
        (status = 400, description = "Unknown item or warehouse, or invalid level"),
        (status = 404, description = "Not an operator"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_inventory(
    State(state): State<AppState>,
    admin: AdminSession,
    Form(form): Form<InventoryForm>,
) -> AppResult<Redirect> {
    admin_service::update_inventory(&state, &admin, form).await?;
    Ok(Redirect::to("/admin"))
}

#[utoipa::path(
    get,
    path = "/payment-notification-count",
    responses(
        (status = 200, description = "Orders waiting for payment confirmation", body = ApiResponse<PaymentNotification>),
        (status = 404, description = "Not an operator"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn payment_notification_count(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> AppResult<Json<ApiResponse<PaymentNotification>>> {
    let data = admin_service::payment_notification_count(&state).await?;
    Ok(Json(ApiResponse::single("Payment notifications", data)))
}
