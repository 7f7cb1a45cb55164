//! Refund requests
//!
//! A buyer may ask for a refund on any non-cancelled order, including
//! after delivery, which is the primary scenario. The seller of the order's
//! items decides; approval means the service credits the buyer's wallet.

use tracing::info;

use super::InFlight;
use crate::api::MarketApi;
use crate::domain::{Approval, Order, OrderStatus, RefundRequest};
use crate::money::Amount;
use crate::session::{Role, Session};
use crate::{MarketError, OrderId, RequestId, Result};

/// Targets the counterparty may drive a Pending request to.
pub fn allowed_transitions(role: Role, status: Approval) -> Vec<Approval> {
    if matches!(role, Role::Seller | Role::Admin) && status.is_pending() {
        vec![Approval::Approved, Approval::Rejected]
    } else {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Buyer side
// ---------------------------------------------------------------------------

/// The buyer's refund requests. Holds the snapshot the duplicate guard
/// checks against: uniqueness per order is enforced here, not presumed of
/// the server.
#[derive(Default)]
pub struct RefundRequestBook {
    requests: Vec<RefundRequest>,
    in_flight: InFlight<OrderId>,
}

impl RefundRequestBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh<A: MarketApi>(&mut self, api: &A) -> Result<()> {
        self.requests = api.my_refund_requests().await?;
        Ok(())
    }

    pub fn requests(&self) -> &[RefundRequest] {
        &self.requests
    }

    pub fn pending_for_order(&self, order_id: OrderId) -> Option<&RefundRequest> {
        self.requests
            .iter()
            .find(|r| r.order_id == order_id && r.status == Approval::Pending)
    }

    /// Validates and submits a refund request. The full order total is an
    /// allowed amount; one minor unit more is not.
    pub async fn submit<A: MarketApi>(
        &mut self,
        api: &A,
        session: &Session,
        order: &Order,
        amount: Amount,
        reason: Option<String>,
    ) -> Result<RefundRequest> {
        if session.role != Role::Buyer {
            return Err(MarketError::NotPermitted { role: session.role });
        }
        if order.status == OrderStatus::Cancelled {
            return Err(MarketError::OrderCancelled(order.id));
        }
        if amount.is_zero() {
            return Err(MarketError::ZeroAmount);
        }
        if amount > order.total_amount {
            return Err(MarketError::RefundExceedsOrderTotal {
                amount,
                total: order.total_amount,
            });
        }
        if self.pending_for_order(order.id).is_some() {
            return Err(MarketError::RefundAlreadyPending(order.id));
        }
        self.in_flight.begin(order.id)?;
        let outcome = api.create_refund_request(order.id, amount, reason).await;
        self.in_flight.end(order.id);
        let request = outcome?;
        info!(order_id = order.id, request_id = request.id, amount = %amount, "refund requested");
        self.refresh(api).await?;
        Ok(request)
    }
}

// ---------------------------------------------------------------------------
// Seller side
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RefundRequestDesk {
    requests: Vec<RefundRequest>,
    in_flight: InFlight<RequestId>,
}

impl RefundRequestDesk {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh<A: MarketApi>(&mut self, api: &A) -> Result<()> {
        self.requests = api.seller_refund_requests().await?;
        Ok(())
    }

    pub fn requests(&self) -> &[RefundRequest] {
        &self.requests
    }

    pub fn is_in_flight(&self, id: RequestId) -> bool {
        self.in_flight.contains(id)
    }

    pub async fn approve<A: MarketApi>(
        &mut self,
        api: &A,
        session: &Session,
        id: RequestId,
    ) -> Result<RefundRequest> {
        self.decide(api, session, id, Approval::Approved).await
    }

    pub async fn reject<A: MarketApi>(
        &mut self,
        api: &A,
        session: &Session,
        id: RequestId,
    ) -> Result<RefundRequest> {
        self.decide(api, session, id, Approval::Rejected).await
    }

    async fn decide<A: MarketApi>(
        &mut self,
        api: &A,
        session: &Session,
        id: RequestId,
        target: Approval,
    ) -> Result<RefundRequest> {
        let request = self
            .requests
            .iter()
            .find(|r| r.id == id)
            .ok_or(MarketError::ItemNotFound)?;
        if !session.can_sell() {
            return Err(MarketError::NotPermitted { role: session.role });
        }
        if !allowed_transitions(session.role, request.status).contains(&target) {
            return Err(MarketError::InvalidTransition {
                from: request.status.to_string(),
                to: target.to_string(),
            });
        }
        self.in_flight.begin(id)?;
        let outcome = match target {
            Approval::Approved => api.approve_refund_request(id).await,
            _ => api.reject_refund_request(id).await,
        };
        self.in_flight.end(id);
        let request = outcome?;
        info!(request_id = id, status = %request.status, "refund request decided");
        self.refresh(api).await?;
        Ok(request)
    }
}
