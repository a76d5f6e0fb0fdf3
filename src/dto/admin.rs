use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    catalog::Catalog,
    models::{AdminOrderRow, StatusLabel},
    services::stock_service::StockSnapshot,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminOverview {
    pub orders: Vec<AdminOrderRow>,
    pub catalog: Catalog,
    pub stock: StockSnapshot,
    pub statuses: Vec<StatusLabel>,
}

/// Operator edit of an order; every field must be present, possibly empty.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminOrderForm {
    pub session_id: Option<String>,
    pub reference: Option<String>,
    pub expired: Option<String>,
    pub message: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct PaymentNotification {
    pub count: i64,
    pub message: String,
}

/// Form fields `{item}_{warehouse}` with the new stock level.
pub type InventoryForm = BTreeMap<String, String>;
