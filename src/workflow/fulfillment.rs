//! Order fulfillment (seller)
//!
//! Unlike the approval workflows this is an ordered chain:
//! Pending → Confirmed → Shipped → Delivered, with Cancelled reachable from
//! any non-terminal state. The board always offers exactly one forward
//! step, never skipping a stage, plus cancellation while that is still
//! legal.

use tracing::info;

use super::{ConfirmGate, InFlight};
use crate::api::MarketApi;
use crate::domain::{Order, OrderStatus};
use crate::session::{Role, Session};
use crate::{MarketError, OrderId, Result};

/// The transitions a role may drive an order through from `status`: the
/// single legal forward state first, then Cancelled while non-terminal.
pub fn allowed_transitions(role: Role, status: OrderStatus) -> Vec<OrderStatus> {
    if !matches!(role, Role::Seller | Role::Admin) {
        return Vec::new();
    }
    let mut targets = Vec::with_capacity(2);
    if let Some(next) = status.next_forward() {
        targets.push(next);
    }
    if status.can_cancel() {
        targets.push(OrderStatus::Cancelled);
    }
    targets
}

/// A queued status change awaiting confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusChange {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

/// The seller's order list with the confirm-then-mutate gate and per-order
/// in-flight guards.
#[derive(Default)]
pub struct FulfillmentBoard {
    orders: Vec<Order>,
    in_flight: InFlight<OrderId>,
    gate: ConfirmGate<StatusChange>,
}

impl FulfillmentBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh<A: MarketApi>(&mut self, api: &A) -> Result<()> {
        self.orders = api.seller_orders().await?;
        Ok(())
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == order_id)
    }

    pub fn is_in_flight(&self, order_id: OrderId) -> bool {
        self.in_flight.contains(order_id)
    }

    /// Queues the single legal forward step for the order.
    pub fn request_advance(&mut self, session: &Session, order_id: OrderId) -> Result<&StatusChange> {
        let order = self.find(order_id)?;
        let next = order
            .status
            .next_forward()
            .ok_or_else(|| MarketError::NoForwardTransition(order.status.to_string()))?;
        self.ensure_legal(session, order_id, next)?;
        Ok(self.gate.request(StatusChange {
            order_id,
            status: next,
        }))
    }

    /// Queues a cancellation; legal from any non-terminal state.
    pub fn request_cancel(&mut self, session: &Session, order_id: OrderId) -> Result<&StatusChange> {
        self.ensure_legal(session, order_id, OrderStatus::Cancelled)?;
        Ok(self.gate.request(StatusChange {
            order_id,
            status: OrderStatus::Cancelled,
        }))
    }

    pub fn pending_confirmation(&self) -> Option<&StatusChange> {
        self.gate.pending()
    }

    pub fn dismiss(&mut self) {
        self.gate.dismiss();
    }

    /// Executes the queued change, then re-fetches the order list; the
    /// response and the refreshed view are the truth, not a local patch.
    pub async fn confirm<A: MarketApi>(&mut self, api: &A, session: &Session) -> Result<Order> {
        let StatusChange { order_id, status } = self.gate.take()?;
        self.ensure_legal(session, order_id, status)?;
        self.in_flight.begin(order_id)?;
        let outcome = api.update_order_status(order_id, status).await;
        self.in_flight.end(order_id);
        let order = outcome?;
        info!(order_id, status = %order.status, "order status updated");
        self.refresh(api).await?;
        Ok(order)
    }

    fn find(&self, order_id: OrderId) -> Result<&Order> {
        self.orders
            .iter()
            .find(|o| o.id == order_id)
            .ok_or(MarketError::ItemNotFound)
    }

    fn ensure_legal(&self, session: &Session, order_id: OrderId, target: OrderStatus) -> Result<()> {
        let order = self.find(order_id)?;
        if !session.can_sell() {
            return Err(MarketError::NotPermitted { role: session.role });
        }
        if !allowed_transitions(session.role, order.status).contains(&target) {
            return Err(MarketError::InvalidTransition {
                from: order.status.to_string(),
                to: target.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{DraftItem, OrderDraft};
    use crate::testing::InMemoryMarket;

    const BUYER: u64 = 1;
    const SELLER: u64 = 10;

    fn seller() -> Session {
        Session::new(SELLER, Role::Seller)
    }

    async fn board_with_order(market: &InMemoryMarket) -> (FulfillmentBoard, OrderId) {
        let pid = market.seed_product(SELLER, "Felt slippers", 2_500_000, 5);
        let api = market.as_user(BUYER);
        let order = api
            .create_order(OrderDraft {
                items: vec![DraftItem {
                    product_id: pid,
                    quantity: 1,
                }],
                shipping_address: "Ulaanbaatar".into(),
                phone: Some("99112233".into()),
                notes: None,
            })
            .await
            .unwrap();
        let mut board = FulfillmentBoard::new();
        board.refresh(&market.as_user(SELLER)).await.unwrap();
        (board, order.id)
    }

    #[test]
    fn test_allowed_transitions_per_state() {
        assert_eq!(
            allowed_transitions(Role::Seller, OrderStatus::Pending),
            vec![OrderStatus::Confirmed, OrderStatus::Cancelled]
        );
        assert_eq!(
            allowed_transitions(Role::Seller, OrderStatus::Confirmed),
            vec![OrderStatus::Shipped, OrderStatus::Cancelled]
        );
        assert_eq!(
            allowed_transitions(Role::Seller, OrderStatus::Shipped),
            vec![OrderStatus::Delivered, OrderStatus::Cancelled]
        );
        assert!(allowed_transitions(Role::Seller, OrderStatus::Delivered).is_empty());
        assert!(allowed_transitions(Role::Seller, OrderStatus::Cancelled).is_empty());
        assert!(allowed_transitions(Role::Buyer, OrderStatus::Pending).is_empty());
    }

    #[tokio::test]
    async fn test_advance_walks_the_chain_without_skipping() {
        let market = InMemoryMarket::new();
        let (mut board, order_id) = board_with_order(&market).await;
        let api = market.as_user(SELLER);

        for expected in [
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            let change = board.request_advance(&seller(), order_id).unwrap();
            assert_eq!(change.status, expected);
            let order = board.confirm(&api, &seller()).await.unwrap();
            assert_eq!(order.status, expected);
        }

        // delivered is terminal; no forward step, no cancellation
        let err = board.request_advance(&seller(), order_id).unwrap_err();
        assert!(matches!(err, MarketError::NoForwardTransition(_)));
        let err = board.request_cancel(&seller(), order_id).unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_cancel_from_mid_chain() {
        let market = InMemoryMarket::new();
        let (mut board, order_id) = board_with_order(&market).await;
        let api = market.as_user(SELLER);

        board.request_advance(&seller(), order_id).unwrap();
        board.confirm(&api, &seller()).await.unwrap(); // Confirmed

        board.request_cancel(&seller(), order_id).unwrap();
        let order = board.confirm(&api, &seller()).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_dismissed_change_does_not_execute() {
        let market = InMemoryMarket::new();
        let (mut board, order_id) = board_with_order(&market).await;
        let api = market.as_user(SELLER);

        board.request_cancel(&seller(), order_id).unwrap();
        assert!(board.pending_confirmation().is_some());
        board.dismiss();
        assert!(board.pending_confirmation().is_none());
        board.refresh(&api).await.unwrap();
        assert_eq!(board.order(order_id).unwrap().status, OrderStatus::Pending);
    }
}
