//! Product moderation (admin)
//!
//! Sellers create products in Pending; an administrator's approval makes
//! them publicly listable, a rejection is final.

use tracing::info;

use super::{ConfirmGate, InFlight};
use crate::api::MarketApi;
use crate::domain::{Product, ProductStatus};
use crate::session::{Role, Session};
use crate::{MarketError, ProductId, Result};

/// Moderation targets a role may drive a product to. Empty for everyone but
/// an admin looking at a Pending product.
pub fn allowed_transitions(role: Role, status: ProductStatus) -> Vec<ProductStatus> {
    if role == Role::Admin && status.is_pending() {
        vec![ProductStatus::Approved, ProductStatus::Rejected]
    } else {
        Vec::new()
    }
}

/// A queued moderation decision awaiting confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub product_id: ProductId,
    pub target: ProductStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusFilter {
    Pending,
    Approved,
    Rejected,
    All,
}

impl StatusFilter {
    fn matches(self, status: ProductStatus) -> bool {
        match self {
            Self::Pending => status == ProductStatus::Pending,
            Self::Approved => status == ProductStatus::Approved,
            Self::Rejected => status == ProductStatus::Rejected,
            Self::All => true,
        }
    }
}

/// The admin panel's product list with its per-product in-flight guards and
/// the confirm-then-mutate gate.
#[derive(Default)]
pub struct ModerationQueue {
    products: Vec<Product>,
    in_flight: InFlight<ProductId>,
    gate: ConfirmGate<Verdict>,
}

impl ModerationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh<A: MarketApi>(&mut self, api: &A) -> Result<()> {
        self.products = api.products().await?;
        Ok(())
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn filtered(&self, filter: StatusFilter) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(move |p| filter.matches(p.status))
    }

    pub fn is_in_flight(&self, product_id: ProductId) -> bool {
        self.in_flight.contains(product_id)
    }

    /// Queues an approve/reject decision for confirmation.
    pub fn request(
        &mut self,
        session: &Session,
        product_id: ProductId,
        target: ProductStatus,
    ) -> Result<&Verdict> {
        self.ensure_legal(session, product_id, target)?;
        Ok(self.gate.request(Verdict { product_id, target }))
    }

    pub fn pending_confirmation(&self) -> Option<&Verdict> {
        self.gate.pending()
    }

    pub fn dismiss(&mut self) {
        self.gate.dismiss();
    }

    /// Executes the queued decision. Legality is re-checked against the
    /// current snapshot, since the product may have been decided elsewhere
    /// while the dialog was open.
    pub async fn confirm<A: MarketApi>(&mut self, api: &A, session: &Session) -> Result<Product> {
        let Verdict { product_id, target } = self.gate.take()?;
        self.ensure_legal(session, product_id, target)?;
        self.in_flight.begin(product_id)?;
        let outcome = match target {
            ProductStatus::Approved => api.approve_product(product_id).await,
            ProductStatus::Rejected => api.reject_product(product_id).await,
            ProductStatus::Pending => Err(MarketError::InvalidTransition {
                from: ProductStatus::Pending.to_string(),
                to: ProductStatus::Pending.to_string(),
            }),
        };
        self.in_flight.end(product_id);
        let product = outcome?;
        info!(product_id, status = %product.status, "product moderated");
        // the response settles the item; the list is re-fetched wholesale
        self.refresh(api).await?;
        Ok(product)
    }

    fn ensure_legal(
        &self,
        session: &Session,
        product_id: ProductId,
        target: ProductStatus,
    ) -> Result<()> {
        let product = self
            .products
            .iter()
            .find(|p| p.id == product_id)
            .ok_or(MarketError::ItemNotFound)?;
        if !session.is_admin() {
            return Err(MarketError::NotPermitted { role: session.role });
        }
        if !allowed_transitions(session.role, product.status).contains(&target) {
            return Err(MarketError::InvalidTransition {
                from: product.status.to_string(),
                to: target.to_string(),
            });
        }
        Ok(())
    }
}
