//! Remote-owned entity snapshots
//!
//! The service is the authority for everything in here; the client holds
//! read-only snapshots and re-fetches after any mutation.

pub mod order;
pub mod product;
pub mod request;

pub use order::{Order, OrderItem, OrderStatus};
pub use product::{Product, ProductStatus};
pub use request::{Approval, RefundRequest, StockRequest, Wallet};
