use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, TransactionTrait};

use crate::{
    catalog::{Catalog, SHIPPING_ITEM},
    dto::orders::{OrderView, StatusUpdateForm},
    entity::{
        InventoryCheckout, Orders,
        inventory_checkout::{Column as CheckoutCol, Model as CheckoutModel},
        orders::{Column as OrderCol, Model as OrderModel},
    },
    error::{AppError, AppResult},
    lifecycle::{self, StatusPoint, customer_may_transition, deadline},
    models::{Order, OrderLine, OrderStatus, ShippingAddress, StatusEntry, is_session_token},
    response::ApiResponse,
    services::lifecycle_service,
    state::AppState,
};

/// Order status page. Expired orders are only visible to operators.
pub async fn view_order(
    state: &AppState,
    session_id: &str,
    is_admin: bool,
) -> AppResult<ApiResponse<OrderView>> {
    let config = &state.config;
    lifecycle_service::sweep(&state.orm, &config.timers, lifecycle::now()).await?;

    let order = Orders::find()
        .filter(OrderCol::SessionId.eq(session_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if order.expired && !is_admin {
        return Err(AppError::NotFound);
    }

    let history = lifecycle_service::history(&state.orm, order.id).await?;
    let checkout = InventoryCheckout::find()
        .filter(CheckoutCol::OrderId.eq(order.id))
        .order_by_asc(CheckoutCol::Id)
        .all(&state.orm)
        .await?;

    let items = order_lines(&config.catalog, checkout);
    let total_price = items.iter().map(OrderLine::subtotal).sum();
    let pending = history.last().and_then(|p| deadline(*p, &config.timers));

    Ok(ApiResponse::single(
        "OK",
        OrderView {
            order: order_from_entity(order)?,
            status: history.into_iter().map(status_entry).collect(),
            items,
            total_price,
            payment_link: config.payment_link.clone(),
            deadline: pending,
        },
    ))
}

/// Customer cancels or reports payment. Returns whether anything changed.
pub async fn update_status_public(state: &AppState, form: StatusUpdateForm) -> AppResult<bool> {
    let session_id = form
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("session_id is required".into()))?;
    if !is_session_token(&session_id) {
        return Err(AppError::BadRequest("invalid session_id".into()));
    }
    let raw_status = form
        .status
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("status is required".into()))?;
    let Some(target) = OrderStatus::parse_code(&raw_status) else {
        return Ok(false);
    };

    let txn = state.orm.begin().await?;
    lifecycle_service::lock_status_tables(&txn).await?;

    let Some(order) = Orders::find()
        .filter(OrderCol::SessionId.eq(session_id.as_str()))
        .one(&txn)
        .await?
    else {
        txn.rollback().await?;
        return Ok(false);
    };

    let current = lifecycle_service::latest(&txn, order.id).await?;
    let Some(current) = current.filter(|p| customer_may_transition(p.status, target)) else {
        txn.rollback().await?;
        tracing::debug!(%session_id, ?target, "customer status change refused");
        return Ok(false);
    };

    let at = lifecycle::next_instant(current.at, lifecycle::now());
    lifecycle_service::append(&txn, order.id, StatusPoint { status: target, at }).await?;
    txn.commit().await?;

    tracing::info!(order_id = order.id, status = target.label(), "customer updated order");
    Ok(true)
}

/// Titles each checkout line and moves the shipping line to the end.
pub fn order_lines(catalog: &Catalog, rows: Vec<CheckoutModel>) -> Vec<OrderLine> {
    let (shipping, mut goods): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .map(|row| OrderLine {
            title: catalog.title_of(&row.item),
            item: row.item,
            quantity: row.quantity,
            price_each: row.price_each,
        })
        .partition(|line| line.item == SHIPPING_ITEM);
    goods.extend(shipping);
    goods
}

pub fn status_entry(point: StatusPoint) -> StatusEntry {
    StatusEntry {
        at: point.at,
        status: point.status,
        code: point.status.code(),
        description: point.status.description().to_string(),
    }
}

pub fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let warehouse = model
        .warehouse
        .parse()
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;
    Ok(Order {
        id: model.id,
        session_id: model.session_id,
        warehouse,
        address: ShippingAddress {
            recipient: model.address_recipient,
            phone: model.address_phone,
            email: model.address_email,
            line1: model.address_line1,
            line2: model.address_line2,
            line3: model.address_line3,
            line4: model.address_line4,
            city: model.address_city,
            zip: model.address_zip,
            country: model.address_country,
        },
        contact: model.contact,
        expired: model.expired,
        ip: model.ip,
        reference: model.reference,
        message: model.message,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, item: &str, quantity: i32, price_each: i64) -> CheckoutModel {
        CheckoutModel {
            id,
            order_id: 1,
            item: item.to_string(),
            quantity,
            price_each,
        }
    }

    #[test]
    fn shipping_line_goes_last_with_titles() {
        let catalog = Catalog::from_json(
            r#"{
                "kiwen": { "title": "Stone", "price": 1200, "shipping": { "US": 300, "INTL": 900 } },
                "lipu": { "title": "Booklet", "price": 800, "shipping": { "US": 100, "INTL": 250 } }
            }"#,
        )
        .unwrap();
        let lines = order_lines(
            &catalog,
            vec![
                row(1, "kiwen", 2, 1200),
                row(2, SHIPPING_ITEM, 1, 700),
                row(3, "lipu", 1, 800),
            ],
        );
        let items: Vec<_> = lines.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(items, vec!["Stone", "Booklet", "Shipping"]);
        let total: i64 = lines.iter().map(OrderLine::subtotal).sum();
        assert_eq!(total, 2 * 1200 + 800 + 700);
    }
}
