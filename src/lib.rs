//! Bazaar Marketplace Client Core
//!
//! Transactional orchestration logic for a buyer/seller/admin marketplace
//! client. Rendering, transport, and authentication live elsewhere; this
//! crate owns the parts with real invariants and failure modes.
//!
//! ## Features
//! - Shopping cart with persisted price/quantity bookkeeping
//! - Dual-path checkout (wallet debit vs. bank-transfer pending order)
//! - Role-gated approval workflows (moderation, pre-orders, refunds)
//! - Order fulfillment state machine
//! - Seller earnings with a fixed commission split
//!
//! The remote service is the final authority on every money- or
//! stock-affecting mutation; the client computes correct requests, presents
//! correct derived values, and never lets a user action reach an invalid
//! state.

use thiserror::Error;

use crate::money::Amount;

pub mod api;
pub mod cart;
pub mod checkout;
pub mod domain;
pub mod earnings;
pub mod money;
pub mod session;
pub mod testing;
pub mod workflow;

// =============================================================================
// Identifiers
// =============================================================================

// The remote service assigns small integer ids.
pub type ProductId = u64;
pub type OrderId = u64;
pub type UserId = u64;
pub type RequestId = u64;
pub type CategoryId = u64;

// =============================================================================
// Error Types
// =============================================================================

/// Everything that can go wrong in the client core.
///
/// Validation and permission variants are raised before any request is sent;
/// `Rejected` carries a business failure reported by a structurally
/// successful response; `Transport` is everything else.
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("{name} is out of stock")]
    OutOfStock { name: String },

    #[error("shipping address is required")]
    MissingShippingAddress,

    #[error("phone number is required")]
    MissingPhone,

    #[error("wallet balance {balance} does not cover total {total}")]
    InsufficientBalance { balance: Amount, total: Amount },

    #[error("refund amount {amount} exceeds order total {total}")]
    RefundExceedsOrderTotal { amount: Amount, total: Amount },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("order {0} already has a pending refund request")]
    RefundAlreadyPending(OrderId),

    #[error("order {0} is cancelled")]
    OrderCancelled(OrderId),

    #[error("product {0} is still in stock")]
    StockAvailable(ProductId),

    #[error("product {0} already has an outstanding pre-order request")]
    AlreadyRequested(ProductId),

    #[error("an expected completion date is required to approve")]
    MissingCompletionDate,

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("item not found")]
    ItemNotFound,

    #[error("{role} may not perform this transition")]
    NotPermitted { role: crate::session::Role },

    #[error("illegal transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("no forward transition from {0}")]
    NoForwardTransition(String),

    #[error("a request for this action is already in flight")]
    RequestInFlight,

    #[error("nothing awaiting confirmation")]
    NothingPending,

    #[error("rejected by service: {0}")]
    Rejected(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, MarketError>;
