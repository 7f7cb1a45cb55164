//! Checkout orchestrator
//!
//! Validates the cart and shipping input, selects between the two payment
//! paths, issues exactly one purchase request, and reconciles local state
//! only after the service has explicitly confirmed. A single in-flight flag
//! makes the whole flow re-entrant-safe.

use tracing::{info, warn};

use crate::api::{DraftItem, MarketApi, OrderDraft};
use crate::cart::{CartStorage, CartStore};
use crate::domain::{Order, Wallet};
use crate::money::Amount;
use crate::{MarketError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentMethod {
    /// Settled instantly by debiting the buyer's stored balance.
    Wallet,
    /// Produces a Pending order awaiting manual administrator confirmation
    /// of an out-of-band payment.
    BankTransfer,
}

#[derive(Clone, Debug, Default)]
pub struct CheckoutForm {
    pub shipping_address: String,
    pub phone: String,
    pub notes: String,
}

#[derive(Clone, Debug)]
pub struct CheckoutReceipt {
    pub order: Order,
    /// Re-fetched wallet on the wallet path; `None` on bank transfer.
    pub wallet: Option<Wallet>,
}

/// Submission can also be gated in the UI: wallet payment is only offered
/// while the cart total fits the balance.
pub fn can_purchase_with_wallet(total: Amount, balance: Amount) -> bool {
    total <= balance
}

#[derive(Default)]
pub struct Checkout {
    purchasing: bool,
}

impl Checkout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_progress(&self) -> bool {
        self.purchasing
    }

    /// Runs the full checkout. Preconditions are checked before any mutation
    /// is issued, short-circuiting on the first violation: cart non-empty,
    /// fresh stock on every item, shipping address, phone, and (wallet path)
    /// sufficient balance.
    pub async fn submit<A, S>(
        &mut self,
        api: &A,
        cart: &mut CartStore<S>,
        form: &CheckoutForm,
        method: PaymentMethod,
        wallet_balance: Amount,
    ) -> Result<CheckoutReceipt>
    where
        A: MarketApi,
        S: CartStorage,
    {
        if self.purchasing {
            return Err(MarketError::RequestInFlight);
        }
        self.purchasing = true;
        let result = run(api, cart, form, method, wallet_balance).await;
        // released identically on success, rejection, and transport failure
        self.purchasing = false;
        result
    }
}

async fn run<A, S>(
    api: &A,
    cart: &mut CartStore<S>,
    form: &CheckoutForm,
    method: PaymentMethod,
    wallet_balance: Amount,
) -> Result<CheckoutReceipt>
where
    A: MarketApi,
    S: CartStorage,
{
    if cart.is_empty() {
        return Err(MarketError::EmptyCart);
    }

    // quantities may have been clamped since items were added; revalidate
    // against live stock before anything is submitted
    let mut fresh = Vec::with_capacity(cart.item_count());
    for item in cart.items() {
        fresh.push(api.product(item.product_id).await?);
    }
    cart.refresh_stock(&fresh)?;

    if let Some(item) = cart.items().iter().find(|i| i.stock == 0) {
        return Err(MarketError::OutOfStock {
            name: item.name.clone(),
        });
    }
    if form.shipping_address.trim().is_empty() {
        return Err(MarketError::MissingShippingAddress);
    }
    if form.phone.trim().is_empty() {
        return Err(MarketError::MissingPhone);
    }

    let total = cart.total();
    if method == PaymentMethod::Wallet && total > wallet_balance {
        return Err(MarketError::InsufficientBalance {
            balance: wallet_balance,
            total,
        });
    }

    let draft = OrderDraft {
        items: cart
            .items()
            .iter()
            .map(|i| DraftItem {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect(),
        shipping_address: form.shipping_address.trim().to_string(),
        phone: Some(form.phone.trim().to_string()),
        notes: if form.notes.trim().is_empty() {
            None
        } else {
            Some(form.notes.trim().to_string())
        },
    };

    match method {
        PaymentMethod::Wallet => {
            let outcome = api.purchase_with_wallet(draft).await?;
            // a structurally successful response can still carry a business
            // failure; only the explicit flag counts as completion
            if !outcome.success {
                warn!(message = %outcome.message, "wallet purchase rejected");
                return Err(MarketError::Rejected(outcome.message));
            }
            let order = outcome
                .order
                .ok_or_else(|| MarketError::Transport("successful purchase carried no order".into()))?;
            cart.clear()?;
            let wallet = api.my_wallet().await?;
            info!(order_id = order.id, total = %order.total_amount, "wallet purchase settled");
            Ok(CheckoutReceipt {
                order,
                wallet: Some(wallet),
            })
        }
        PaymentMethod::BankTransfer => {
            let order = api.create_order(draft).await?;
            // confirmation is deferred to an administrator; structural
            // success is all there is to wait for
            cart.clear()?;
            info!(order_id = order.id, "bank-transfer order placed");
            Ok(CheckoutReceipt {
                order,
                wallet: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{CartItem, MemoryStorage};
    use crate::testing::InMemoryMarket;

    const BUYER: u64 = 1;
    const SELLER: u64 = 10;

    fn form() -> CheckoutForm {
        CheckoutForm {
            shipping_address: "Ulaanbaatar, SBD, 1st khoroo".into(),
            phone: "99112233".into(),
            notes: String::new(),
        }
    }

    fn cart_with(product_id: u64, price: i64, qty: u32, stock: u32) -> CartStore<MemoryStorage> {
        let mut cart = CartStore::open(MemoryStorage::default()).unwrap();
        cart.add(CartItem {
            product_id,
            name: "Felt slippers".into(),
            unit_price: Amount::new(price),
            quantity: qty,
            stock,
            image_url: None,
        })
        .unwrap();
        cart
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected_first() {
        let market = InMemoryMarket::new().as_user(BUYER);
        let mut cart = CartStore::open(MemoryStorage::default()).unwrap();
        let mut checkout = Checkout::new();
        // address is blank too, but the cart check fires first
        let err = checkout
            .submit(
                &market,
                &mut cart,
                &CheckoutForm::default(),
                PaymentMethod::BankTransfer,
                Amount::ZERO,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::EmptyCart));
        assert!(!checkout.in_progress());
    }

    #[tokio::test]
    async fn test_validation_order_address_then_phone() {
        let market = InMemoryMarket::new();
        let pid = market.seed_product(SELLER, "Felt slippers", 2_500_000, 3);
        let api = market.as_user(BUYER);
        let mut cart = cart_with(pid, 2_500_000, 1, 3);
        let mut checkout = Checkout::new();

        let mut form = CheckoutForm::default();
        let err = checkout
            .submit(&api, &mut cart, &form, PaymentMethod::BankTransfer, Amount::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::MissingShippingAddress));

        form.shipping_address = "Ulaanbaatar".into();
        let err = checkout
            .submit(&api, &mut cart, &form, PaymentMethod::BankTransfer, Amount::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::MissingPhone));
        assert_eq!(cart.item_count(), 1); // nothing was sent, nothing cleared
    }

    #[tokio::test]
    async fn test_stock_revalidated_before_submission() {
        let market = InMemoryMarket::new();
        let pid = market.seed_product(SELLER, "Felt slippers", 2_500_000, 2);
        let api = market.as_user(BUYER);
        let mut cart = cart_with(pid, 2_500_000, 2, 2);
        market.set_stock(pid, 0); // sold out elsewhere meanwhile
        let mut checkout = Checkout::new();
        let err = checkout
            .submit(&api, &mut cart, &form(), PaymentMethod::BankTransfer, Amount::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::OutOfStock { .. }));
    }

    #[tokio::test]
    async fn test_wallet_path_requires_covering_balance() {
        let market = InMemoryMarket::new();
        let pid = market.seed_product(SELLER, "Felt slippers", 2_500_000, 3);
        let api = market.as_user(BUYER);
        let mut cart = cart_with(pid, 2_500_000, 2, 3);
        let mut checkout = Checkout::new();
        let err = checkout
            .submit(
                &api,
                &mut cart,
                &form(),
                PaymentMethod::Wallet,
                Amount::new(4_999_999),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::InsufficientBalance { .. }));
        assert_eq!(cart.item_count(), 1);
        // the guard is free again after the failure
        assert!(!checkout.in_progress());
    }

    #[tokio::test]
    async fn test_business_rejection_leaves_cart_untouched() {
        let market = InMemoryMarket::new();
        let pid = market.seed_product(SELLER, "Felt slippers", 2_500_000, 3);
        market.open_wallet(BUYER, 10_000_000);
        let api = market.as_user(BUYER);
        let mut cart = cart_with(pid, 2_500_000, 2, 3);
        let mut checkout = Checkout::new();
        // local balance snapshot is stale: the wallet was drained remotely
        market.drain_wallet(BUYER);
        let err = checkout
            .submit(
                &api,
                &mut cart,
                &form(),
                PaymentMethod::Wallet,
                Amount::new(10_000_000),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Rejected(_)));
        assert_eq!(cart.item_count(), 1);
        let wallet = api.my_wallet().await.unwrap();
        assert_eq!(wallet.balance, Amount::ZERO); // untouched by the failure
    }

    #[test]
    fn test_wallet_gate_boundary() {
        assert!(can_purchase_with_wallet(Amount::new(100), Amount::new(100)));
        assert!(!can_purchase_with_wallet(Amount::new(101), Amount::new(100)));
    }
}
