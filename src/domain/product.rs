//! Product snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::{self, Amount};
use crate::{CategoryId, ProductId, UserId};

/// Moderation state. A product is created `Pending` and becomes publicly
/// listable only once an administrator approves it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ProductStatus {
    pub fn is_pending(self) -> bool {
        self == ProductStatus::Pending
    }

    /// Approved and Rejected are irreversible.
    pub fn is_terminal(self) -> bool {
        !self.is_pending()
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub price: Amount,
    pub original_price: Option<Amount>,
    pub discount_percent: Option<u8>,
    pub stock: u32,
    pub image_urls: Vec<String>,
    pub category_id: Option<CategoryId>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn is_in_stock(&self) -> bool {
        self.stock > 0
    }

    /// The strike-through price: the explicit original price when the seller
    /// set one, otherwise implied from the discount percentage.
    pub fn effective_original_price(&self) -> Option<Amount> {
        self.original_price
            .or_else(|| money::implied_original_price(self.price, self.discount_percent?))
    }

    /// What the buyer saves against the original price, if anything.
    pub fn savings(&self) -> Option<Amount> {
        money::savings(self.effective_original_price()?, self.price)
    }
}
