use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    catalog::{CatalogItem, ShippingRates, Warehouse},
    dto::{
        admin::{AdminOrderForm, AdminOverview, PaymentNotification},
        auth::{LoginRequest, LoginResponse},
        intake::FormPage,
        orders::{OrderView, StatusUpdateForm},
    },
    lifecycle::{Deadline, DeadlineKind},
    models::{AdminOrderRow, Order, OrderLine, OrderStatus, ShippingAddress, StatusEntry, StatusLabel},
    response::{ApiResponse, Meta},
    routes::{admin, auth, challenge, health, orders, params, storefront},
    services::stock_service::StockSnapshot,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("Operator token from /admin/login, or the admin_session cookie"))
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        storefront::order_form,
        storefront::submit_order,
        challenge::challenge_image,
        orders::view_order,
        orders::update_order_status,
        auth::login,
        admin::admin_overview,
        admin::update_order,
        admin::update_inventory,
        admin::payment_notification_count
    ),
    components(
        schemas(
            Warehouse,
            ShippingRates,
            CatalogItem,
            OrderStatus,
            StatusLabel,
            StatusEntry,
            ShippingAddress,
            Order,
            OrderLine,
            AdminOrderRow,
            Deadline,
            DeadlineKind,
            StockSnapshot,
            FormPage,
            OrderView,
            StatusUpdateForm,
            AdminOverview,
            AdminOrderForm,
            PaymentNotification,
            LoginRequest,
            LoginResponse,
            params::OrderListQuery,
            Meta,
            ApiResponse<FormPage>,
            ApiResponse<OrderView>,
            ApiResponse<AdminOverview>,
            ApiResponse<PaymentNotification>,
            ApiResponse<LoginResponse>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Storefront", description = "Order form, submission and picture challenge"),
        (name = "Orders", description = "Customer order status"),
        (name = "Auth", description = "Operator login"),
        (name = "Admin", description = "Operator order and stock management"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
