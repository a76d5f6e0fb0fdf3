use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    lifecycle::Deadline,
    models::{Order, OrderLine, StatusEntry},
};

/// Everything the order status page shows.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderView {
    pub order: Order,
    pub status: Vec<StatusEntry>,
    pub items: Vec<OrderLine>,
    pub total_price: i64,
    pub payment_link: String,
    pub deadline: Option<Deadline>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusUpdateForm {
    pub session_id: Option<String>,
    pub status: Option<String>,
}
