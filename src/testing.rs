//! In-process market backend
//!
//! Plays the remote authority for the demo binary and the test suite:
//! atomic wallet purchases, exactly-once refund credits, Pending-only
//! workflow transitions. Shared state behind a mutex so several per-user
//! handles can act on one market.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::api::{AdminStats, MarketApi, OrderDraft, PurchaseOutcome};
use crate::domain::{
    Approval, Order, OrderItem, OrderStatus, Product, ProductStatus, RefundRequest, StockRequest,
    Wallet,
};
use crate::money::Amount;
use crate::{MarketError, OrderId, ProductId, RequestId, Result, UserId};

#[derive(Default)]
struct State {
    products: Vec<Product>,
    orders: Vec<Order>,
    wallets: HashMap<UserId, Amount>,
    stock_requests: Vec<StockRequest>,
    refund_requests: Vec<RefundRequest>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// One market, many actors: `as_user` hands out a view bound to a user id,
/// all views sharing the same state.
#[derive(Clone)]
pub struct InMemoryMarket {
    state: Arc<Mutex<State>>,
    user: UserId,
}

impl Default for InMemoryMarket {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMarket {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            user: 0,
        }
    }

    pub fn as_user(&self, user: UserId) -> Self {
        Self {
            state: Arc::clone(&self.state),
            user,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // a poisoned lock still holds consistent data here; recover it
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -- seeding and test hooks -------------------------------------------

    pub fn seed_product(&self, seller_id: UserId, name: &str, price: i64, stock: u32) -> ProductId {
        self.insert_product(seller_id, name, price, stock, ProductStatus::Approved)
    }

    pub fn seed_pending_product(
        &self,
        seller_id: UserId,
        name: &str,
        price: i64,
        stock: u32,
    ) -> ProductId {
        self.insert_product(seller_id, name, price, stock, ProductStatus::Pending)
    }

    fn insert_product(
        &self,
        seller_id: UserId,
        name: &str,
        price: i64,
        stock: u32,
        status: ProductStatus,
    ) -> ProductId {
        let mut s = self.lock();
        let id = s.next_id();
        s.products.push(Product {
            id,
            seller_id,
            name: name.to_string(),
            description: None,
            price: Amount::new(price),
            original_price: None,
            discount_percent: None,
            stock,
            image_urls: Vec::new(),
            category_id: None,
            status,
            created_at: Utc::now(),
        });
        id
    }

    pub fn open_wallet(&self, user: UserId, balance: i64) {
        self.lock().wallets.insert(user, Amount::new(balance));
    }

    pub fn drain_wallet(&self, user: UserId) {
        self.lock().wallets.insert(user, Amount::ZERO);
    }

    pub fn set_stock(&self, product_id: ProductId, stock: u32) {
        let mut s = self.lock();
        if let Some(p) = s.products.iter_mut().find(|p| p.id == product_id) {
            p.stock = stock;
        }
    }
}

#[async_trait]
impl MarketApi for InMemoryMarket {
    async fn product(&self, id: ProductId) -> Result<Product> {
        self.lock()
            .products
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(MarketError::ItemNotFound)
    }

    async fn products(&self) -> Result<Vec<Product>> {
        Ok(self.lock().products.clone())
    }

    async fn pending_products(&self) -> Result<Vec<Product>> {
        Ok(self
            .lock()
            .products
            .iter()
            .filter(|p| p.status == ProductStatus::Pending)
            .cloned()
            .collect())
    }

    async fn purchase_with_wallet(&self, draft: OrderDraft) -> Result<PurchaseOutcome> {
        let mut s = self.lock();

        // validate everything before anything moves
        let mut items = Vec::with_capacity(draft.items.len());
        let mut total = Amount::ZERO;
        for line in &draft.items {
            let Some(product) = s.products.iter().find(|p| p.id == line.product_id) else {
                return Ok(reject("product not found"));
            };
            if product.stock < line.quantity {
                return Ok(reject(&format!("insufficient stock for {}", product.name)));
            }
            items.push(OrderItem {
                product_id: product.id,
                name: product.name.clone(),
                seller_id: product.seller_id,
                quantity: line.quantity,
                unit_price: product.price,
            });
            total = total.plus(product.price.times(line.quantity));
        }
        let balance = s.wallets.get(&self.user).copied().unwrap_or(Amount::ZERO);
        let Some(remaining) = balance.subtract(total) else {
            return Ok(reject("insufficient wallet balance"));
        };

        // commit: debit, decrement, and create together or not at all
        s.wallets.insert(self.user, remaining);
        for line in &draft.items {
            if let Some(product) = s.products.iter_mut().find(|p| p.id == line.product_id) {
                product.stock -= line.quantity;
            }
        }
        let now = Utc::now();
        let id = s.next_id();
        let order = Order {
            id,
            buyer_id: self.user,
            items,
            total_amount: total,
            status: OrderStatus::Pending,
            shipping_address: draft.shipping_address,
            phone: draft.phone,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        };
        s.orders.push(order.clone());
        Ok(PurchaseOutcome {
            success: true,
            message: "order created".into(),
            order: Some(order),
        })
    }

    async fn create_order(&self, draft: OrderDraft) -> Result<Order> {
        let mut s = self.lock();

        let mut items = Vec::with_capacity(draft.items.len());
        let mut total = Amount::ZERO;
        for line in &draft.items {
            let product = s
                .products
                .iter()
                .find(|p| p.id == line.product_id)
                .ok_or(MarketError::ItemNotFound)?;
            if product.stock < line.quantity {
                return Err(MarketError::Rejected(format!(
                    "insufficient stock for {}",
                    product.name
                )));
            }
            items.push(OrderItem {
                product_id: product.id,
                name: product.name.clone(),
                seller_id: product.seller_id,
                quantity: line.quantity,
                unit_price: product.price,
            });
            total = total.plus(product.price.times(line.quantity));
        }
        for line in &draft.items {
            if let Some(product) = s.products.iter_mut().find(|p| p.id == line.product_id) {
                product.stock -= line.quantity;
            }
        }
        let now = Utc::now();
        let id = s.next_id();
        let order = Order {
            id,
            buyer_id: self.user,
            items,
            total_amount: total,
            status: OrderStatus::Pending,
            shipping_address: draft.shipping_address,
            phone: draft.phone,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        };
        s.orders.push(order.clone());
        Ok(order)
    }

    async fn my_wallet(&self) -> Result<Wallet> {
        Ok(Wallet {
            balance: self.lock().wallets.get(&self.user).copied().unwrap_or(Amount::ZERO),
        })
    }

    async fn top_up(&self, amount: Amount) -> Result<Wallet> {
        let mut s = self.lock();
        let balance = s
            .wallets
            .entry(self.user)
            .or_insert(Amount::ZERO)
            .plus(amount);
        s.wallets.insert(self.user, balance);
        Ok(Wallet { balance })
    }

    async fn my_orders(&self) -> Result<Vec<Order>> {
        Ok(self
            .lock()
            .orders
            .iter()
            .filter(|o| o.buyer_id == self.user)
            .cloned()
            .collect())
    }

    async fn seller_orders(&self) -> Result<Vec<Order>> {
        Ok(self
            .lock()
            .orders
            .iter()
            .filter(|o| o.items.iter().any(|i| i.seller_id == self.user))
            .cloned()
            .collect())
    }

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut s = self.lock();
        let order = s
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(MarketError::ItemNotFound)?;
        let legal = order.status.next_forward() == Some(status)
            || (status == OrderStatus::Cancelled && order.status.can_cancel());
        if !legal {
            return Err(MarketError::Rejected(format!(
                "cannot move order from {} to {}",
                order.status, status
            )));
        }
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn approve_product(&self, id: ProductId) -> Result<Product> {
        self.moderate(id, ProductStatus::Approved)
    }

    async fn reject_product(&self, id: ProductId) -> Result<Product> {
        self.moderate(id, ProductStatus::Rejected)
    }

    async fn create_stock_request(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<StockRequest> {
        let mut s = self.lock();
        if !s.products.iter().any(|p| p.id == product_id) {
            return Err(MarketError::ItemNotFound);
        }
        let id = s.next_id();
        let request = StockRequest {
            id,
            product_id,
            buyer_id: self.user,
            quantity,
            status: Approval::Pending,
            expected_completion_date: None,
            created_at: Utc::now(),
        };
        s.stock_requests.push(request.clone());
        Ok(request)
    }

    async fn approve_stock_request(
        &self,
        id: RequestId,
        expected_completion_date: NaiveDate,
    ) -> Result<StockRequest> {
        let mut s = self.lock();
        let request = s
            .stock_requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(MarketError::ItemNotFound)?;
        if !request.status.is_pending() {
            return Err(MarketError::Rejected("request already decided".into()));
        }
        request.status = Approval::Approved;
        request.expected_completion_date = Some(expected_completion_date);
        Ok(request.clone())
    }

    async fn reject_stock_request(&self, id: RequestId) -> Result<StockRequest> {
        let mut s = self.lock();
        let request = s
            .stock_requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(MarketError::ItemNotFound)?;
        if !request.status.is_pending() {
            return Err(MarketError::Rejected("request already decided".into()));
        }
        request.status = Approval::Rejected;
        Ok(request.clone())
    }

    async fn my_stock_requests(&self) -> Result<Vec<StockRequest>> {
        Ok(self
            .lock()
            .stock_requests
            .iter()
            .filter(|r| r.buyer_id == self.user)
            .cloned()
            .collect())
    }

    async fn seller_stock_requests(&self) -> Result<Vec<StockRequest>> {
        let s = self.lock();
        Ok(s.stock_requests
            .iter()
            .filter(|r| {
                s.products
                    .iter()
                    .any(|p| p.id == r.product_id && p.seller_id == self.user)
            })
            .cloned()
            .collect())
    }

    async fn create_refund_request(
        &self,
        order_id: OrderId,
        amount: Amount,
        reason: Option<String>,
    ) -> Result<RefundRequest> {
        let mut s = self.lock();
        let total = s
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .map(|o| o.total_amount)
            .ok_or(MarketError::ItemNotFound)?;
        if amount > total {
            return Err(MarketError::Rejected("amount exceeds order total".into()));
        }
        let now = Utc::now();
        let id = s.next_id();
        let request = RefundRequest {
            id,
            order_id,
            buyer_id: self.user,
            amount,
            reason,
            status: Approval::Pending,
            created_at: now,
            updated_at: now,
        };
        s.refund_requests.push(request.clone());
        Ok(request)
    }

    async fn approve_refund_request(&self, id: RequestId) -> Result<RefundRequest> {
        let mut s = self.lock();
        let request = s
            .refund_requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(MarketError::ItemNotFound)?;
        if !request.status.is_pending() {
            // the pending check is what makes the credit exactly-once
            return Err(MarketError::Rejected("request already decided".into()));
        }
        request.status = Approval::Approved;
        request.updated_at = Utc::now();
        let (buyer, amount) = (request.buyer_id, request.amount);
        let request = request.clone();
        let balance = s.wallets.get(&buyer).copied().unwrap_or(Amount::ZERO);
        s.wallets.insert(buyer, balance.plus(amount));
        Ok(request)
    }

    async fn reject_refund_request(&self, id: RequestId) -> Result<RefundRequest> {
        let mut s = self.lock();
        let request = s
            .refund_requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(MarketError::ItemNotFound)?;
        if !request.status.is_pending() {
            return Err(MarketError::Rejected("request already decided".into()));
        }
        request.status = Approval::Rejected;
        request.updated_at = Utc::now();
        Ok(request.clone())
    }

    async fn my_refund_requests(&self) -> Result<Vec<RefundRequest>> {
        Ok(self
            .lock()
            .refund_requests
            .iter()
            .filter(|r| r.buyer_id == self.user)
            .cloned()
            .collect())
    }

    async fn seller_refund_requests(&self) -> Result<Vec<RefundRequest>> {
        let s = self.lock();
        Ok(s.refund_requests
            .iter()
            .filter(|r| {
                s.orders.iter().any(|o| {
                    o.id == r.order_id && o.items.iter().any(|i| i.seller_id == self.user)
                })
            })
            .cloned()
            .collect())
    }

    async fn admin_stats(&self) -> Result<AdminStats> {
        let s = self.lock();
        let delivered_total: i64 = s
            .orders
            .iter()
            .filter(|o| o.status == OrderStatus::Delivered)
            .map(|o| o.total_amount.minor_units())
            .sum();
        Ok(AdminStats {
            total_users: s.wallets.len() as u64,
            total_products: s.products.len() as u64,
            total_orders: s.orders.len() as u64,
            pending_products: s
                .products
                .iter()
                .filter(|p| p.status == ProductStatus::Pending)
                .count() as u64,
            total_revenue: Amount::new(delivered_total),
            total_commission_earned: Amount::new(delivered_total * 5 / 100),
        })
    }
}

impl InMemoryMarket {
    fn moderate(&self, id: ProductId, target: ProductStatus) -> Result<Product> {
        let mut s = self.lock();
        let product = s
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(MarketError::ItemNotFound)?;
        if !product.status.is_pending() {
            return Err(MarketError::Rejected("product already moderated".into()));
        }
        product.status = target;
        Ok(product.clone())
    }
}

fn reject(message: &str) -> PurchaseOutcome {
    PurchaseOutcome {
        success: false,
        message: message.to_string(),
        order: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DraftItem;

    const BUYER: u64 = 1;
    const SELLER: u64 = 10;

    fn draft(product_id: ProductId, quantity: u32) -> OrderDraft {
        OrderDraft {
            items: vec![DraftItem {
                product_id,
                quantity,
            }],
            shipping_address: "Ulaanbaatar".into(),
            phone: Some("99112233".into()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_wallet_purchase_is_atomic() {
        let market = InMemoryMarket::new();
        let pid = market.seed_product(SELLER, "Felt slippers", 25_000, 3);
        market.open_wallet(BUYER, 10_000);
        let api = market.as_user(BUYER);

        // short balance: nothing moves
        let outcome = api.purchase_with_wallet(draft(pid, 2)).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(api.my_wallet().await.unwrap().balance, Amount::new(10_000));
        assert_eq!(api.product(pid).await.unwrap().stock, 3);

        // covered: debit, decrement, create together
        market.open_wallet(BUYER, 100_000);
        let outcome = api.purchase_with_wallet(draft(pid, 2)).await.unwrap();
        assert!(outcome.success);
        let order = outcome.order.unwrap();
        assert_eq!(order.total_amount, Amount::new(50_000));
        assert_eq!(order.items_total(), order.total_amount);
        assert_eq!(api.my_wallet().await.unwrap().balance, Amount::new(50_000));
        assert_eq!(api.product(pid).await.unwrap().stock, 1);
    }

    #[tokio::test]
    async fn test_refund_credit_is_exactly_once() {
        let market = InMemoryMarket::new();
        let pid = market.seed_product(SELLER, "Felt slippers", 25_000, 3);
        market.open_wallet(BUYER, 100_000);
        let api = market.as_user(BUYER);
        let order = api
            .purchase_with_wallet(draft(pid, 2))
            .await
            .unwrap()
            .order
            .unwrap();

        let request = api
            .create_refund_request(order.id, Amount::new(50_000), None)
            .await
            .unwrap();
        let seller_api = market.as_user(SELLER);
        seller_api.approve_refund_request(request.id).await.unwrap();
        assert_eq!(api.my_wallet().await.unwrap().balance, Amount::new(100_000));

        // a second approval must not credit again
        let err = seller_api.approve_refund_request(request.id).await.unwrap_err();
        assert!(matches!(err, MarketError::Rejected(_)));
        assert_eq!(api.my_wallet().await.unwrap().balance, Amount::new(100_000));
    }

    #[tokio::test]
    async fn test_service_rejects_overlarge_refund() {
        let market = InMemoryMarket::new();
        let pid = market.seed_product(SELLER, "Felt slippers", 25_000, 3);
        market.open_wallet(BUYER, 100_000);
        let api = market.as_user(BUYER);
        let order = api
            .purchase_with_wallet(draft(pid, 1))
            .await
            .unwrap()
            .order
            .unwrap();
        let err = api
            .create_refund_request(order.id, Amount::new(25_001), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_order_status_chain_enforced() {
        let market = InMemoryMarket::new();
        let pid = market.seed_product(SELLER, "Felt slippers", 25_000, 3);
        let api = market.as_user(BUYER);
        let order = api.create_order(draft(pid, 1)).await.unwrap();

        let seller_api = market.as_user(SELLER);
        // skipping a stage is refused
        let err = seller_api
            .update_order_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Rejected(_)));
        let order = seller_api
            .update_order_status(order.id, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
    }
}
