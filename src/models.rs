use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::Warehouse;

/// Order lifecycle states, ordered by their stored code.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Dead,
    New,
    Paid,
    PaymentConfirmed,
    ShippedToHub,
    ArrivedAtHub,
    OutForDelivery,
    Delivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Dead,
        OrderStatus::New,
        OrderStatus::Paid,
        OrderStatus::PaymentConfirmed,
        OrderStatus::ShippedToHub,
        OrderStatus::ArrivedAtHub,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ];

    pub fn code(self) -> i16 {
        match self {
            OrderStatus::Dead => -1,
            OrderStatus::New => 0,
            OrderStatus::Paid => 1,
            OrderStatus::PaymentConfirmed => 2,
            OrderStatus::ShippedToHub => 3,
            OrderStatus::ArrivedAtHub => 4,
            OrderStatus::OutForDelivery => 5,
            OrderStatus::Delivered => 6,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Parses the numeric code carried by status forms.
    pub fn parse_code(raw: &str) -> Option<Self> {
        raw.trim().parse::<i16>().ok().and_then(Self::from_code)
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Dead => "dead",
            OrderStatus::New => "new",
            OrderStatus::Paid => "paid",
            OrderStatus::PaymentConfirmed => "payment-confirmed",
            OrderStatus::ShippedToHub => "shipped-to-hub",
            OrderStatus::ArrivedAtHub => "arrived-at-hub",
            OrderStatus::OutForDelivery => "out-for-delivery",
            OrderStatus::Delivered => "delivered",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OrderStatus::Dead => "This order is no longer active.",
            OrderStatus::New => "This order has been placed.",
            OrderStatus::Paid => {
                "You told us the payment was sent. We will check it shortly."
            }
            OrderStatus::PaymentConfirmed => "We have confirmed your payment.",
            OrderStatus::ShippedToHub => "The parcel is on its way to our forwarding hub.",
            OrderStatus::ArrivedAtHub => "The parcel has arrived at our forwarding hub.",
            OrderStatus::OutForDelivery => "The parcel is on its way to you.",
            OrderStatus::Delivered => "You have the parcel. This order is complete.",
        }
    }
}

/// Longest session token accepted from a client.
pub const MAX_SESSION_TOKEN_LEN: usize = 64;

/// Session tokens are opaque but must be safe to echo into a URL path.
pub fn is_session_token(raw: &str) -> bool {
    !raw.is_empty()
        && raw.len() <= MAX_SESSION_TOKEN_LEN
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusLabel {
    pub code: i16,
    pub label: String,
    pub description: String,
}

impl From<OrderStatus> for StatusLabel {
    fn from(status: OrderStatus) -> Self {
        Self {
            code: status.code(),
            label: status.label().to_string(),
            description: status.description().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusEntry {
    pub at: DateTime<Utc>,
    pub status: OrderStatus,
    pub code: i16,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingAddress {
    pub recipient: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub line3: Option<String>,
    pub line4: Option<String>,
    pub city: String,
    pub zip: Option<String>,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Order {
    pub id: i64,
    pub session_id: String,
    pub warehouse: Warehouse,
    pub address: ShippingAddress,
    pub contact: String,
    pub expired: bool,
    pub ip: Option<String>,
    pub reference: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderLine {
    pub item: String,
    pub title: String,
    pub quantity: i32,
    pub price_each: i64,
}

impl OrderLine {
    pub fn subtotal(&self) -> i64 {
        i64::from(self.quantity) * self.price_each
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminOrderRow {
    pub session_id: String,
    pub warehouse: String,
    pub expired: bool,
    pub ip: Option<String>,
    pub reference: Option<String>,
    pub message: Option<String>,
    pub status: Option<OrderStatus>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_both_ways() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(OrderStatus::from_code(7), None);
        assert_eq!(OrderStatus::parse_code("-1"), Some(OrderStatus::Dead));
        assert_eq!(OrderStatus::parse_code(" 6 "), Some(OrderStatus::Delivered));
        assert_eq!(OrderStatus::parse_code("paid"), None);
    }

    #[test]
    fn ordering_follows_codes() {
        let mut sorted = OrderStatus::ALL;
        sorted.sort_by_key(|s| s.code());
        assert_eq!(sorted, OrderStatus::ALL);
        assert!(OrderStatus::Dead < OrderStatus::New);
        assert!(OrderStatus::ShippedToHub > OrderStatus::PaymentConfirmed);
    }

    #[test]
    fn session_tokens_are_url_safe() {
        assert!(is_session_token("0f3c9a6b2d5e4f7a8b1c2d3e4f5a6b7c"));
        assert!(is_session_token("token_123-abc"));
        assert!(!is_session_token(""));
        assert!(!is_session_token("ab\ncd"));
        assert!(!is_session_token("../admin"));
        assert!(!is_session_token("a b"));
        assert!(!is_session_token(&"a".repeat(MAX_SESSION_TOKEN_LEN + 1)));
        assert!(is_session_token(&"a".repeat(MAX_SESSION_TOKEN_LEN)));
    }

    #[test]
    fn line_subtotal_multiplies() {
        let line = OrderLine {
            item: "kiwen".into(),
            title: "Stone".into(),
            quantity: 3,
            price_each: 1200,
        };
        assert_eq!(line.subtotal(), 3600);
    }
}
