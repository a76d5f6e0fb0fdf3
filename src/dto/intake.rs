use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use utoipa::ToSchema;

use crate::{catalog::Catalog, services::stock_service::StockSnapshot};

/// Form field prefix for per-item quantities, e.g. `qty_kiwen`.
pub const QUANTITY_PREFIX: &str = "qty_";

/// Validation messages keyed by form section (`address`, `contact`, `items`, `captcha`).
pub type FieldErrors = BTreeMap<&'static str, String>;

/// Raw order form as posted by the storefront.
#[derive(Debug, Clone, Default)]
pub struct OrderSubmission {
    pub session_id: String,
    pub warehouse: Option<String>,
    pub recipient: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub line3: Option<String>,
    pub line4: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub contact: Option<String>,
    pub challenge: String,
    pub answer: String,
    pub verification: Option<String>,
    /// Raw quantity per catalog item, only for fields that were filled in.
    pub quantities: BTreeMap<String, String>,
}

impl OrderSubmission {
    pub fn from_form(form: &HashMap<String, String>, catalog: &Catalog) -> Self {
        let text = |key: &str| {
            form.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let quantities = catalog
            .ids()
            .filter_map(|id| {
                let raw = text(format!("{QUANTITY_PREFIX}{id}").as_str())?;
                Some((id.to_string(), raw))
            })
            .collect();

        Self {
            session_id: text("session_id").unwrap_or_default(),
            warehouse: text("warehouse"),
            recipient: text("recipient"),
            phone: text("phone"),
            email: text("email"),
            line1: text("line1"),
            line2: text("line2"),
            line3: text("line3"),
            line4: text("line4"),
            city: text("city"),
            zip: text("zip"),
            country: text("country"),
            contact: text("contact"),
            challenge: text("challenge").unwrap_or_default(),
            answer: text("answer").unwrap_or_default(),
            verification: text("verification"),
            quantities,
        }
    }
}

/// Data needed to render a fresh order form.
#[derive(Debug, Serialize, ToSchema)]
pub struct FormPage {
    pub session_id: String,
    pub challenge: String,
    pub catalog: Catalog,
    pub stock: StockSnapshot,
    #[schema(value_type = Object)]
    pub errors: FieldErrors,
}
