//! Order snapshot and fulfillment chain

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Amount;
use crate::{OrderId, ProductId, UserId};

/// Fulfillment status. Forward movement is an ordered chain with no
/// skipping; Cancelled is reachable from any non-terminal state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// The single legal next forward state, if any.
    pub fn next_forward(self) -> Option<OrderStatus> {
        match self {
            Self::Pending => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::Shipped),
            Self::Shipped => Some(Self::Delivered),
            Self::Delivered | Self::Cancelled => None,
        }
    }

    pub fn can_cancel(self) -> bool {
        !self.is_terminal()
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Confirmed => write!(f, "CONFIRMED"),
            Self::Shipped => write!(f, "SHIPPED"),
            Self::Delivered => write!(f, "DELIVERED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A line item with its price frozen at purchase time. Later product price
/// changes never alter historical orders.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub seller_id: UserId,
    pub quantity: u32,
    pub unit_price: Amount,
}

impl OrderItem {
    pub fn line_total(&self) -> Amount {
        self.unit_price.times(self.quantity)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_amount: Amount,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Line items belonging to one seller. A multi-seller order contains
    /// only some items for any given seller.
    pub fn seller_items(&self, seller_id: UserId) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(move |i| i.seller_id == seller_id)
    }

    /// The portion of the order's value attributable to one seller.
    pub fn seller_subtotal(&self, seller_id: UserId) -> Amount {
        self.seller_items(seller_id)
            .fold(Amount::ZERO, |acc, i| acc.plus(i.line_total()))
    }

    /// Sum over all line items. Equals `total_amount` at creation time and
    /// is never used to overwrite it afterwards.
    pub fn items_total(&self) -> Amount {
        self.items
            .iter()
            .fold(Amount::ZERO, |acc, i| acc.plus(i.line_total()))
    }
}
