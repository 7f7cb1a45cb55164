//! Stock pre-order requests
//!
//! A buyer asks for an out-of-stock product to be restocked; the owning
//! seller approves with an expected completion date or rejects.

use chrono::NaiveDate;
use tracing::info;

use super::{ConfirmGate, InFlight};
use crate::api::MarketApi;
use crate::domain::{Approval, Product, StockRequest};
use crate::session::{Role, Session};
use crate::{MarketError, ProductId, RequestId, Result};

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

/// The buyer's own pre-order requests, used both to submit new ones and to
/// decorate product cards with the outcome.
#[derive(Default)]
pub struct StockRequestBook {
    requests: Vec<StockRequest>,
    in_flight: InFlight<ProductId>,
}

impl StockRequestBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh<A: MarketApi>(&mut self, api: &A) -> Result<()> {
        self.requests = api.my_stock_requests().await?;
        Ok(())
    }

    pub fn requests(&self) -> &[StockRequest] {
        &self.requests
    }

    pub fn pending_for(&self, product_id: ProductId) -> Option<&StockRequest> {
        self.requests
            .iter()
            .find(|r| r.product_id == product_id && r.status == Approval::Pending)
    }

    /// An approved request carries the expected restock date the buyer is
    /// shown.
    pub fn approved_for(&self, product_id: ProductId) -> Option<&StockRequest> {
        self.requests
            .iter()
            .find(|r| r.product_id == product_id && r.status == Approval::Approved)
    }

    /// Submits a pre-order request. Legal only for a buyer, against a
    /// product with zero stock, with no Pending request for it outstanding.
    pub async fn submit<A: MarketApi>(
        &mut self,
        api: &A,
        session: &Session,
        product: &Product,
        quantity: u32,
    ) -> Result<StockRequest> {
        if session.role != Role::Buyer {
            return Err(MarketError::NotPermitted { role: session.role });
        }
        if quantity == 0 {
            return Err(MarketError::InvalidQuantity);
        }
        if product.is_in_stock() {
            return Err(MarketError::StockAvailable(product.id));
        }
        if self.pending_for(product.id).is_some() {
            return Err(MarketError::AlreadyRequested(product.id));
        }
        self.in_flight.begin(product.id)?;
        let outcome = api.create_stock_request(product.id, quantity).await;
        self.in_flight.end(product.id);
        let request = outcome?;
        info!(product_id = product.id, request_id = request.id, "pre-order requested");
        self.refresh(api).await?;
        Ok(request)
    }
}

// ---------------------------------------------------------------------------
// Seller side
// ---------------------------------------------------------------------------

/// A queued seller decision. Approval needs the expected completion date
/// the approval dialog collects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeskAction {
    Approve {
        id: RequestId,
        expected_completion_date: NaiveDate,
    },
    Reject {
        id: RequestId,
    },
}

impl DeskAction {
    fn request_id(self) -> RequestId {
        match self {
            Self::Approve { id, .. } | Self::Reject { id } => id,
        }
    }
}

#[derive(Default)]
pub struct StockRequestDesk {
    requests: Vec<StockRequest>,
    in_flight: InFlight<RequestId>,
    gate: ConfirmGate<DeskAction>,
}

impl StockRequestDesk {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh<A: MarketApi>(&mut self, api: &A) -> Result<()> {
        self.requests = api.seller_stock_requests().await?;
        Ok(())
    }

    pub fn pending_requests(&self) -> impl Iterator<Item = &StockRequest> {
        self.requests.iter().filter(|r| r.status.is_pending())
    }

    pub fn processed_requests(&self) -> impl Iterator<Item = &StockRequest> {
        self.requests.iter().filter(|r| r.status.is_terminal())
    }

    pub fn is_in_flight(&self, id: RequestId) -> bool {
        self.in_flight.contains(id)
    }

    /// Queues an approval. The date comes from the dialog; without one the
    /// request cannot be queued at all.
    pub fn request_approve(
        &mut self,
        session: &Session,
        id: RequestId,
        expected_completion_date: Option<NaiveDate>,
    ) -> Result<&DeskAction> {
        let date = expected_completion_date.ok_or(MarketError::MissingCompletionDate)?;
        self.ensure_legal(session, id, Approval::Approved)?;
        Ok(self.gate.request(DeskAction::Approve {
            id,
            expected_completion_date: date,
        }))
    }

    pub fn request_reject(&mut self, session: &Session, id: RequestId) -> Result<&DeskAction> {
        self.ensure_legal(session, id, Approval::Rejected)?;
        Ok(self.gate.request(DeskAction::Reject { id }))
    }

    pub fn pending_confirmation(&self) -> Option<&DeskAction> {
        self.gate.pending()
    }

    pub fn dismiss(&mut self) {
        self.gate.dismiss();
    }

    pub async fn confirm<A: MarketApi>(
        &mut self,
        api: &A,
        session: &Session,
    ) -> Result<StockRequest> {
        let action = self.gate.take()?;
        let id = action.request_id();
        let target = match action {
            DeskAction::Approve { .. } => Approval::Approved,
            DeskAction::Reject { .. } => Approval::Rejected,
        };
        self.ensure_legal(session, id, target)?;
        self.in_flight.begin(id)?;
        let outcome = match action {
            DeskAction::Approve {
                id,
                expected_completion_date,
            } => api.approve_stock_request(id, expected_completion_date).await,
            DeskAction::Reject { id } => api.reject_stock_request(id).await,
        };
        self.in_flight.end(id);
        let request = outcome?;
        info!(request_id = id, status = %request.status, "pre-order request decided");
        self.refresh(api).await?;
        Ok(request)
    }

    fn ensure_legal(&self, session: &Session, id: RequestId, target: Approval) -> Result<()> {
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
        Ok(())
    }
}
