//! Approval-shaped workflow entities and the wallet snapshot

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Amount;
use crate::{OrderId, ProductId, RequestId, UserId};

/// The shared workflow shape: Pending is the only state a transition is
/// legal from; Approved and Rejected are terminal and irreversible.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Approval {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl Approval {
    pub fn is_pending(self) -> bool {
        self == Approval::Pending
    }

    pub fn is_terminal(self) -> bool {
        !self.is_pending()
    }
}

impl fmt::Display for Approval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// A buyer's pre-order request against an out-of-stock product. Only the
/// owning seller transitions it; approval carries the expected restock date.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StockRequest {
    pub id: RequestId,
    pub product_id: ProductId,
    pub buyer_id: UserId,
    pub quantity: u32,
    pub status: Approval,
    pub expected_completion_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// A buyer's refund request against an order. Approval means the service
/// credits the buyer's wallet; the client never moves the money itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefundRequest {
    pub id: RequestId,
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub amount: Amount,
    pub reason: Option<String>,
    pub status: Approval,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wallet snapshot. The balance is read-only here: after any mutation the
/// client re-fetches rather than computing a new balance locally.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Wallet {
    pub balance: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_is_the_only_open_state() {
        assert!(Approval::Pending.is_pending());
        assert!(!Approval::Pending.is_terminal());
        assert!(Approval::Approved.is_terminal());
        assert!(Approval::Rejected.is_terminal());
    }
}
