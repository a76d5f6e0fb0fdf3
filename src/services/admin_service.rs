use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
    sea_query::OnConflict,
};

use crate::{
    audit,
    catalog::{Catalog, UnknownWarehouse, Warehouse},
    dto::admin::{AdminOrderForm, AdminOverview, InventoryForm, PaymentNotification},
    entity::{
        InventoryList, Orders,
        inventory_list::{ActiveModel as InventoryActive, Column as InventoryCol},
        orders::{ActiveModel as OrderActive, Column as OrderCol},
    },
    error::{AppError, AppResult},
    lifecycle::{self, plan_admin_transition},
    middleware::auth::AdminSession,
    models::{AdminOrderRow, OrderStatus, StatusLabel, is_session_token},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::{
        lifecycle_service,
        stock_service::{StockSnapshot, load_stock},
    },
    state::AppState,
};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    session_id: String,
    warehouse: String,
    expired: bool,
    ip: Option<String>,
    reference: Option<String>,
    message: Option<String>,
    created_at: DateTime<Utc>,
    current_status: Option<i16>,
}

const LISTING_CTE: &str = r#"
    WITH listing AS (
        SELECT o.id, o.session_id, o.warehouse, o.expired, o.ip, o.reference, o.message,
               o.created_at,
               (SELECT s.status FROM status_change s
                WHERE s.order_id = o.id
                ORDER BY s.changed_at DESC, s.id DESC
                LIMIT 1) AS current_status
        FROM orders o
    )
"#;

pub async fn overview(
    state: &AppState,
    query: OrderListQuery,
) -> AppResult<ApiResponse<AdminOverview>> {
    let config = &state.config;
    lifecycle_service::sweep(&state.orm, &config.timers, lifecycle::now()).await?;

    let (page, limit, offset) = query.pagination().normalize();
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "{LISTING_CTE}
        SELECT session_id, warehouse, expired, ip, reference, message, created_at, current_status
        FROM listing
        WHERE ($1::SMALLINT IS NULL OR current_status = $1)
        ORDER BY created_at, id
        LIMIT $2 OFFSET $3"
    ))
    .bind(query.status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(&format!(
        "{LISTING_CTE}
        SELECT COUNT(*) FROM listing
        WHERE ($1::SMALLINT IS NULL OR current_status = $1)"
    ))
    .bind(query.status)
    .fetch_one(&state.pool)
    .await?;

    let orders = rows
        .into_iter()
        .map(|row| AdminOrderRow {
            session_id: row.session_id,
            warehouse: row.warehouse,
            expired: row.expired,
            ip: row.ip,
            reference: row.reference,
            message: row.message,
            status: row.current_status.and_then(OrderStatus::from_code),
            created_at: row.created_at,
        })
        .collect();

    let stock = load_stock(&state.orm, &config.catalog).await?;
    let data = AdminOverview {
        orders,
        catalog: config.catalog.clone(),
        stock,
        statuses: OrderStatus::ALL.into_iter().map(StatusLabel::from).collect(),
    };
    Ok(ApiResponse::success(
        "Orders",
        data,
        Some(Meta::new(page, limit, total.0)),
    ))
}

fn required(field: Option<String>, name: &str) -> AppResult<String> {
    field.ok_or_else(|| AppError::BadRequest(format!("{name} is required")))
}

fn parse_flag(raw: &str) -> AppResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => Err(AppError::BadRequest(format!("invalid expired flag `{other}`"))),
    }
}

fn blank_to_none(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Operator edit: metadata, expiry flag and status in one transaction.
pub async fn update_order(
    state: &AppState,
    admin: &AdminSession,
    form: AdminOrderForm,
) -> AppResult<()> {
    let session_id = required(form.session_id, "session_id")?;
    if !is_session_token(&session_id) {
        return Err(AppError::BadRequest("invalid session_id".into()));
    }
    let reference = blank_to_none(required(form.reference, "reference")?);
    let message = blank_to_none(required(form.message, "message")?);
    let expired = parse_flag(&required(form.expired, "expired")?)?;
    let raw_status = required(form.status, "status")?;
    let target = OrderStatus::parse_code(&raw_status)
        .ok_or_else(|| AppError::BadRequest(format!("invalid status `{raw_status}`")))?;

    let txn = state.orm.begin().await?;
    lifecycle_service::lock_status_tables(&txn).await?;

    let order = Orders::find()
        .filter(OrderCol::SessionId.eq(session_id.as_str()))
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let order_id = order.id;

    let mut active: OrderActive = order.into();
    active.reference = Set(reference);
    active.message = Set(message);
    active.expired = Set(expired);
    active.update(&txn).await?;

    let history = lifecycle_service::history(&txn, order_id).await?;
    if history.is_empty() {
        return Err(AppError::Internal(anyhow::anyhow!(
            "order {order_id} has no status history"
        )));
    }
    let plan = plan_admin_transition(&history, target, lifecycle::now());
    for point in &plan {
        lifecycle_service::append(&txn, order_id, *point).await?;
    }
    txn.commit().await?;

    tracing::info!(
        order_id,
        status = target.label(),
        appended = plan.len(),
        expired,
        "operator updated order"
    );
    audit::record(
        &state.pool,
        &admin.username,
        "order_update",
        "orders",
        serde_json::json!({
            "session_id": session_id,
            "status": target.code(),
            "appended": plan.len(),
            "expired": expired,
        }),
    )
    .await;
    Ok(())
}

/// Parses `{item}_{warehouse}` fields into stock levels, rejecting anything unknown.
pub fn parse_inventory_form(
    form: &InventoryForm,
    catalog: &Catalog,
) -> AppResult<Vec<(String, Warehouse, i32)>> {
    let mut updates = Vec::with_capacity(form.len());
    for (key, raw) in form {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let (item, warehouse) = key
            .rsplit_once('_')
            .ok_or_else(|| AppError::BadRequest(format!("unknown stock field `{key}`")))?;
        if !catalog.contains(item) {
            return Err(AppError::BadRequest(format!("unknown item `{item}`")));
        }
        let warehouse: Warehouse = warehouse
            .parse()
            .map_err(|e: UnknownWarehouse| AppError::BadRequest(e.to_string()))?;
        let quantity = raw
            .parse::<i32>()
            .ok()
            .filter(|q| *q >= 0)
            .ok_or_else(|| AppError::BadRequest(format!("invalid quantity for `{key}`")))?;
        updates.push((item.to_string(), warehouse, quantity));
    }
    Ok(updates)
}

/// Upserts stock levels. A level may not drop below what live orders hold.
pub async fn update_inventory(
    state: &AppState,
    admin: &AdminSession,
    form: InventoryForm,
) -> AppResult<StockSnapshot> {
    let catalog = &state.config.catalog;
    let updates = parse_inventory_form(&form, catalog)?;

    let txn = state.orm.begin().await?;
    txn.execute_unprepared("LOCK TABLE inventory_list IN EXCLUSIVE MODE")
        .await?;
    let before = load_stock(&txn, catalog).await?;
    for (item, warehouse, quantity) in &updates {
        let committed = before.committed(*warehouse, item);
        if i64::from(*quantity) < committed {
            return Err(AppError::BadRequest(format!(
                "{item} in {warehouse} cannot go below the {committed} units held by open orders"
            )));
        }
    }

    for (item, warehouse, quantity) in &updates {
        InventoryList::insert(InventoryActive {
            item: Set(item.clone()),
            warehouse: Set(warehouse.code().to_string()),
            quantity: Set(*quantity),
        })
        .on_conflict(
            OnConflict::columns([InventoryCol::Item, InventoryCol::Warehouse])
                .update_column(InventoryCol::Quantity)
                .to_owned(),
        )
        .exec(&txn)
        .await?;
    }
    let after = load_stock(&txn, catalog).await?;
    txn.commit().await?;

    tracing::info!(rows = updates.len(), "stock levels updated");
    audit::record(
        &state.pool,
        &admin.username,
        "inventory_update",
        "inventory_list",
        serde_json::json!({
            "updates": updates
                .iter()
                .map(|(item, warehouse, quantity)| serde_json::json!({
                    "item": item,
                    "warehouse": warehouse.code(),
                    "quantity": quantity,
                }))
                .collect::<Vec<_>>(),
        }),
    )
    .await;
    Ok(after)
}

pub fn notification_message(count: i64) -> String {
    match count {
        0 => "Nobody has reported a payment.".to_string(),
        1 => "1 customer reported a payment. Please check it.".to_string(),
        n => format!("{n} customers reported a payment. Please check them."),
    }
}

/// Orders whose customers reported payment and await confirmation.
pub async fn payment_notification_count(state: &AppState) -> AppResult<PaymentNotification> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM orders o
        WHERE (
            SELECT s.status FROM status_change s
            WHERE s.order_id = o.id
            ORDER BY s.changed_at DESC, s.id DESC
            LIMIT 1
        ) = $1
        "#,
    )
    .bind(OrderStatus::Paid.code())
    .fetch_one(&state.pool)
    .await?;

    Ok(PaymentNotification {
        count,
        message: notification_message(count),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::from_json(
            r#"{
                "kiwen": { "title": "Stone", "price": 100, "shipping": { "US": 1, "INTL": 2 } },
                "soweli_plush": { "title": "Plush", "price": 50, "shipping": { "US": 1, "INTL": 2 } }
            }"#,
        )
        .unwrap()
    }

    fn form(pairs: &[(&str, &str)]) -> InventoryForm {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_stock_fields() {
        let updates = parse_inventory_form(
            &form(&[("kiwen_US", "10"), ("soweli_plush_INTL", " 4 "), ("kiwen_INTL", "")]),
            &catalog(),
        )
        .unwrap();
        assert_eq!(
            updates,
            vec![
                ("kiwen".to_string(), Warehouse::Us, 10),
                ("soweli_plush".to_string(), Warehouse::Intl, 4),
            ]
        );
    }

    #[test]
    fn rejects_unknown_or_invalid_stock_fields() {
        for pairs in [
            [("rock_US", "1")],
            [("kiwen_MOON", "1")],
            [("kiwen", "1")],
            [("kiwen_US", "-3")],
            [("kiwen_US", "lots")],
        ] {
            assert!(
                matches!(
                    parse_inventory_form(&form(&pairs), &catalog()),
                    Err(AppError::BadRequest(_))
                ),
                "{pairs:?}"
            );
        }
    }

    #[test]
    fn flags_and_blanks() {
        assert!(parse_flag("1").unwrap());
        assert!(parse_flag("TRUE").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("maybe").is_err());
        assert_eq!(blank_to_none("  ".into()), None);
        assert_eq!(blank_to_none(" ref-1 ".into()), Some("ref-1".to_string()));
    }

    #[test]
    fn notification_wording() {
        assert_eq!(notification_message(0), "Nobody has reported a payment.");
        assert!(notification_message(1).starts_with("1 customer "));
        assert!(notification_message(3).starts_with("3 customers "));
    }
}
