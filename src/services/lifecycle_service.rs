use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, FromQueryResult,
    QueryFilter, QueryOrder, Set, Statement, TransactionTrait,
    sea_query::Expr,
};
use sea_orm::ActiveValue::NotSet;

use crate::{
    db::OrmConn,
    entity::{
        Orders, StatusChange,
        orders::Column as OrderCol,
        status_change::{ActiveModel as StatusActive, Column as StatusCol},
    },
    error::{AppError, AppResult},
    lifecycle::{LifecycleTimers, StatusPoint, SweepStep, plan_sweep},
    models::OrderStatus,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub marked_dead: usize,
    pub expired: usize,
}

#[derive(Debug, FromQueryResult)]
struct LatestRow {
    order_id: i64,
    changed_at: sea_orm::prelude::DateTimeWithTimeZone,
    status: i16,
}

const LATEST_LIVE_SQL: &str = r#"
    SELECT DISTINCT ON (s.order_id) s.order_id, s.changed_at, s.status
    FROM status_change s
    JOIN orders o ON o.id = s.order_id
    WHERE NOT o.expired
    ORDER BY s.order_id, s.changed_at DESC, s.id DESC
"#;

fn to_point(status: i16, at: sea_orm::prelude::DateTimeWithTimeZone) -> AppResult<StatusPoint> {
    let status = OrderStatus::from_code(status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown status code {status}")))?;
    Ok(StatusPoint {
        status,
        at: at.with_timezone(&Utc),
    })
}

/// Full status history of an order, oldest first.
pub async fn history<C>(conn: &C, order_id: i64) -> AppResult<Vec<StatusPoint>>
where
    C: ConnectionTrait,
{
    StatusChange::find()
        .filter(StatusCol::OrderId.eq(order_id))
        .order_by_asc(StatusCol::ChangedAt)
        .order_by_asc(StatusCol::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(|row| to_point(row.status, row.changed_at))
        .collect()
}

pub async fn latest<C>(conn: &C, order_id: i64) -> AppResult<Option<StatusPoint>>
where
    C: ConnectionTrait,
{
    StatusChange::find()
        .filter(StatusCol::OrderId.eq(order_id))
        .order_by_desc(StatusCol::ChangedAt)
        .order_by_desc(StatusCol::Id)
        .one(conn)
        .await?
        .map(|row| to_point(row.status, row.changed_at))
        .transpose()
}

pub async fn append<C>(conn: &C, order_id: i64, point: StatusPoint) -> AppResult<()>
where
    C: ConnectionTrait,
{
    StatusActive {
        id: NotSet,
        order_id: Set(order_id),
        changed_at: Set(point.at.into()),
        status: Set(point.status.code()),
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Serializes writers of the status log. Tables are always locked in the
/// order `orders`, `status_change` so writers never deadlock each other.
pub async fn lock_status_tables<C>(conn: &C) -> AppResult<()>
where
    C: ConnectionTrait,
{
    conn.execute_unprepared("LOCK TABLE orders, status_change IN SHARE ROW EXCLUSIVE MODE")
        .await?;
    Ok(())
}

async fn due_plans<C>(
    conn: &C,
    timers: &LifecycleTimers,
    now: DateTime<Utc>,
) -> AppResult<Vec<(i64, Vec<SweepStep>)>>
where
    C: ConnectionTrait,
{
    let rows = LatestRow::find_by_statement(Statement::from_string(
        DbBackend::Postgres,
        LATEST_LIVE_SQL.to_string(),
    ))
    .all(conn)
    .await?;

    let mut plans = Vec::new();
    for row in rows {
        let steps = plan_sweep(to_point(row.status, row.changed_at)?, timers, now);
        if !steps.is_empty() {
            plans.push((row.order_id, steps));
        }
    }
    Ok(plans)
}

/// Applies every stale and expiry transition that is due at `now`.
///
/// The first pass reads without locking; only when something is due does the
/// sweep lock the status tables and re-plan, so concurrent sweeps cannot both
/// append a dead entry for the same order.
pub async fn sweep(
    orm: &OrmConn,
    timers: &LifecycleTimers,
    now: DateTime<Utc>,
) -> AppResult<SweepReport> {
    if due_plans(orm, timers, now).await?.is_empty() {
        return Ok(SweepReport::default());
    }

    let txn = orm.begin().await?;
    lock_status_tables(&txn).await?;

    let mut report = SweepReport::default();
    for (order_id, steps) in due_plans(&txn, timers, now).await? {
        for step in steps {
            match step {
                SweepStep::MarkDead { at } => {
                    append(
                        &txn,
                        order_id,
                        StatusPoint {
                            status: OrderStatus::Dead,
                            at,
                        },
                    )
                    .await?;
                    report.marked_dead += 1;
                    tracing::info!(order_id, %at, "unpaid order went stale");
                }
                SweepStep::Expire => {
                    Orders::update_many()
                        .col_expr(OrderCol::Expired, Expr::value(true))
                        .filter(OrderCol::Id.eq(order_id))
                        .exec(&txn)
                        .await?;
                    report.expired += 1;
                    tracing::info!(order_id, "order expired");
                }
            }
        }
    }

    txn.commit().await?;
    Ok(report)
}
