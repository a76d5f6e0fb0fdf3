use std::collections::BTreeMap;

use sea_orm::{ConnectionTrait, DbBackend, EntityTrait, FromQueryResult, Statement};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    catalog::{Catalog, SHIPPING_ITEM, Warehouse},
    entity::InventoryList,
    error::AppResult,
};

pub type StockLevels = BTreeMap<Warehouse, BTreeMap<String, i64>>;

/// Stock per warehouse: what is on the shelf and what is still free to sell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StockSnapshot {
    #[schema(value_type = Object)]
    pub total: StockLevels,
    #[schema(value_type = Object)]
    pub available: StockLevels,
}

impl StockSnapshot {
    /// Every catalog item in every warehouse at zero.
    pub fn empty(catalog: &Catalog) -> Self {
        let zeros: StockLevels = Warehouse::ALL
            .into_iter()
            .map(|w| (w, catalog.ids().map(|id| (id.to_string(), 0)).collect()))
            .collect();
        Self {
            total: zeros.clone(),
            available: zeros,
        }
    }

    /// `levels` are raw `(item, warehouse, quantity)` stock rows and
    /// `committed` the `(warehouse, item, quantity)` sums held by live orders.
    pub fn compute<L, C>(catalog: &Catalog, levels: L, committed: C) -> Self
    where
        L: IntoIterator<Item = (String, String, i64)>,
        C: IntoIterator<Item = (String, String, i64)>,
    {
        let mut snapshot = Self::empty(catalog);
        for (item, warehouse, quantity) in levels {
            let Ok(warehouse) = warehouse.parse::<Warehouse>() else {
                continue;
            };
            if !catalog.contains(&item) {
                continue;
            }
            snapshot.set(warehouse, &item, quantity);
        }
        for (warehouse, item, quantity) in committed {
            let Ok(warehouse) = warehouse.parse::<Warehouse>() else {
                continue;
            };
            if item == SHIPPING_ITEM || !catalog.contains(&item) {
                continue;
            }
            if let Some(free) = snapshot
                .available
                .get_mut(&warehouse)
                .and_then(|m| m.get_mut(&item))
            {
                *free -= quantity;
            }
        }
        snapshot
    }

    fn set(&mut self, warehouse: Warehouse, item: &str, quantity: i64) {
        for levels in [&mut self.total, &mut self.available] {
            levels
                .entry(warehouse)
                .or_default()
                .insert(item.to_string(), quantity);
        }
    }

    pub fn total(&self, warehouse: Warehouse, item: &str) -> i64 {
        lookup(&self.total, warehouse, item)
    }

    pub fn available(&self, warehouse: Warehouse, item: &str) -> i64 {
        lookup(&self.available, warehouse, item)
    }

    /// Units of `item` held by live orders from `warehouse`.
    pub fn committed(&self, warehouse: Warehouse, item: &str) -> i64 {
        self.total(warehouse, item) - self.available(warehouse, item)
    }
}

fn lookup(levels: &StockLevels, warehouse: Warehouse, item: &str) -> i64 {
    levels
        .get(&warehouse)
        .and_then(|m| m.get(item))
        .copied()
        .unwrap_or(0)
}

#[derive(Debug, FromQueryResult)]
struct CommittedRow {
    warehouse: String,
    item: String,
    quantity: i64,
}

const COMMITTED_SQL: &str = r#"
    SELECT o.warehouse, c.item, SUM(c.quantity)::BIGINT AS quantity
    FROM inventory_checkout c
    JOIN orders o ON o.id = c.order_id
    WHERE c.item <> $1
      AND (
        SELECT s.status FROM status_change s
        WHERE s.order_id = o.id
        ORDER BY s.changed_at DESC, s.id DESC
        LIMIT 1
      ) >= 0
    GROUP BY o.warehouse, c.item
"#;

/// Reads stock through `conn`, which may be a transaction holding the intake lock.
pub async fn load_stock<C>(conn: &C, catalog: &Catalog) -> AppResult<StockSnapshot>
where
    C: ConnectionTrait,
{
    let levels = InventoryList::find()
        .all(conn)
        .await?
        .into_iter()
        .map(|row| (row.item, row.warehouse, i64::from(row.quantity)));

    let committed = CommittedRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        COMMITTED_SQL,
        [SHIPPING_ITEM.into()],
    ))
    .all(conn)
    .await?
    .into_iter()
    .map(|row| (row.warehouse, row.item, row.quantity));

    Ok(StockSnapshot::compute(catalog, levels, committed))
}
