use std::{collections::BTreeMap, fmt, path::Path, str::FromStr};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Item id of the synthetic checkout line that carries the shipping cost.
pub const SHIPPING_ITEM: &str = "shipping";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub enum Warehouse {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "INTL")]
    Intl,
}

impl Warehouse {
    pub const ALL: [Warehouse; 2] = [Warehouse::Us, Warehouse::Intl];

    pub fn code(self) -> &'static str {
        match self {
            Warehouse::Us => "US",
            Warehouse::Intl => "INTL",
        }
    }
}

impl fmt::Display for Warehouse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown warehouse `{0}`")]
pub struct UnknownWarehouse(pub String);

impl FromStr for Warehouse {
    type Err = UnknownWarehouse;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Warehouse::ALL
            .into_iter()
            .find(|w| w.code() == s)
            .ok_or_else(|| UnknownWarehouse(s.to_string()))
    }
}

/// Per-unit shipping cost from each warehouse, in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShippingRates {
    #[serde(rename = "US")]
    pub us: i64,
    #[serde(rename = "INTL")]
    pub intl: i64,
}

impl ShippingRates {
    pub fn for_warehouse(&self, warehouse: Warehouse) -> i64 {
        match warehouse {
            Warehouse::Us => self.us,
            Warehouse::Intl => self.intl,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogItem {
    pub title: String,
    pub price: i64,
    pub shipping: ShippingRates,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("catalog must list at least one item")]
    Empty,

    #[error("item id `{0}` is reserved")]
    ReservedId(String),

    #[error("item `{0}` has a negative price or shipping rate")]
    NegativeAmount(String),
}

/// Goods on sale, keyed by item id.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(transparent)]
pub struct Catalog {
    #[schema(value_type = Object)]
    items: BTreeMap<String, CatalogItem>,
}

impl Catalog {
    pub fn new(items: BTreeMap<String, CatalogItem>) -> Result<Self, CatalogError> {
        if items.is_empty() {
            return Err(CatalogError::Empty);
        }
        for (id, item) in &items {
            if id == SHIPPING_ITEM || id.is_empty() {
                return Err(CatalogError::ReservedId(id.clone()));
            }
            if item.price < 0 || item.shipping.us < 0 || item.shipping.intl < 0 {
                return Err(CatalogError::NegativeAmount(id.clone()));
            }
        }
        Ok(Self { items })
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let items: BTreeMap<String, CatalogItem> = serde_json::from_str(raw)?;
        Self::new(items)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        Ok(Self::from_json(&raw)?)
    }

    pub fn get(&self, id: &str) -> Option<&CatalogItem> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// Display title for a checkout line, including the shipping line.
    pub fn title_of(&self, id: &str) -> String {
        if id == SHIPPING_ITEM {
            return "Shipping".to_string();
        }
        self.items
            .get(id)
            .map(|item| item.title.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = r#"{
        "kiwen": { "title": "Stone", "price": 1200, "shipping": { "US": 300, "INTL": 900 } },
        "lipu": { "title": "Booklet", "price": 800, "shipping": { "US": 100, "INTL": 250 } }
    }"#;

    #[test]
    fn parses_catalog_file() {
        let catalog = Catalog::from_json(RAW).unwrap();
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["kiwen", "lipu"]);
        let kiwen = catalog.get("kiwen").unwrap();
        assert_eq!(kiwen.shipping.for_warehouse(Warehouse::Intl), 900);
        assert_eq!(catalog.title_of("lipu"), "Booklet");
        assert_eq!(catalog.title_of(SHIPPING_ITEM), "Shipping");
    }

    #[test]
    fn rejects_reserved_and_empty_catalogs() {
        assert!(matches!(Catalog::from_json("{}"), Err(CatalogError::Empty)));
        let reserved = r#"{ "shipping": { "title": "x", "price": 1, "shipping": { "US": 0, "INTL": 0 } } }"#;
        assert!(matches!(
            Catalog::from_json(reserved),
            Err(CatalogError::ReservedId(_))
        ));
        let negative = r#"{ "a": { "title": "x", "price": -1, "shipping": { "US": 0, "INTL": 0 } } }"#;
        assert!(matches!(
            Catalog::from_json(negative),
            Err(CatalogError::NegativeAmount(_))
        ));
    }

    #[test]
    fn warehouse_codes_round_trip() {
        assert_eq!("US".parse::<Warehouse>(), Ok(Warehouse::Us));
        assert_eq!("INTL".parse::<Warehouse>(), Ok(Warehouse::Intl));
        assert!("ANTE".parse::<Warehouse>().is_err());
        assert_eq!(Warehouse::Intl.to_string(), "INTL");
    }
}
