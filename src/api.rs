//! Remote service interface
//!
//! Every money- or stock-affecting mutation crosses this seam, and every
//! call is a suspension point. Implementations own transport and schema;
//! the contract here is behavioral: mutations are atomic on the service
//! side, and responses are the sole source of truth.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Order, OrderStatus, Product, RefundRequest, StockRequest, Wallet};
use crate::money::Amount;
use crate::{OrderId, ProductId, RequestId, Result};

/// One purchase line, as the service expects it. Prices are not sent; the
/// service freezes its own current price into the order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DraftItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Payload shared by both checkout paths.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderDraft {
    pub items: Vec<DraftItem>,
    pub shipping_address: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

/// Result of the atomic wallet purchase. A structurally successful response
/// can still report business failure through `success = false`; in that
/// case no money moved and no order exists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurchaseOutcome {
    pub success: bool,
    pub message: String,
    pub order: Option<Order>,
}

/// Aggregate numbers for the admin dashboard.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: u64,
    pub total_products: u64,
    pub total_orders: u64,
    pub pending_products: u64,
    pub total_revenue: Amount,
    pub total_commission_earned: Amount,
}

#[async_trait]
pub trait MarketApi: Send + Sync {
    // -- catalog ----------------------------------------------------------

    async fn product(&self, id: ProductId) -> Result<Product>;
    async fn products(&self) -> Result<Vec<Product>>;
    async fn pending_products(&self) -> Result<Vec<Product>>;

    // -- checkout ---------------------------------------------------------

    /// Atomic: either the wallet is debited, stock decremented for every
    /// item, and the order created, or nothing changed at all.
    async fn purchase_with_wallet(&self, draft: OrderDraft) -> Result<PurchaseOutcome>;

    /// Creates a Pending order with no wallet interaction; payment arrives
    /// out of band and an administrator confirms it later.
    async fn create_order(&self, draft: OrderDraft) -> Result<Order>;

    // -- wallet -----------------------------------------------------------

    async fn my_wallet(&self) -> Result<Wallet>;
    async fn top_up(&self, amount: Amount) -> Result<Wallet>;

    // -- orders -----------------------------------------------------------

    async fn my_orders(&self) -> Result<Vec<Order>>;
    async fn seller_orders(&self) -> Result<Vec<Order>>;
    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order>;

    // -- product moderation -----------------------------------------------

    async fn approve_product(&self, id: ProductId) -> Result<Product>;
    async fn reject_product(&self, id: ProductId) -> Result<Product>;

    // -- stock pre-order requests -----------------------------------------

    async fn create_stock_request(&self, product_id: ProductId, quantity: u32)
        -> Result<StockRequest>;
    async fn approve_stock_request(
        &self,
        id: RequestId,
        expected_completion_date: NaiveDate,
    ) -> Result<StockRequest>;
    async fn reject_stock_request(&self, id: RequestId) -> Result<StockRequest>;
    async fn my_stock_requests(&self) -> Result<Vec<StockRequest>>;
    async fn seller_stock_requests(&self) -> Result<Vec<StockRequest>>;

    // -- refund requests --------------------------------------------------

    /// The service re-rejects amounts above the order total.
    async fn create_refund_request(
        &self,
        order_id: OrderId,
        amount: Amount,
        reason: Option<String>,
    ) -> Result<RefundRequest>;

    /// Approval credits the buyer's wallet exactly once.
    async fn approve_refund_request(&self, id: RequestId) -> Result<RefundRequest>;
    async fn reject_refund_request(&self, id: RequestId) -> Result<RefundRequest>;
    async fn my_refund_requests(&self) -> Result<Vec<RefundRequest>>;
    async fn seller_refund_requests(&self) -> Result<Vec<RefundRequest>>;

    // -- admin ------------------------------------------------------------

    async fn admin_stats(&self) -> Result<AdminStats>;
}
